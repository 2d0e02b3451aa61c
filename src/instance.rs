use std::sync::mpsc::channel as mpsc_channel;
use std::sync::mpsc::Receiver as MpscReceiver;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use bus::Bus;
use core_affinity::CoreId;
use itertools::Itertools;
use simple_error::{try_with, SimpleError, SimpleResult};
use tracing::info;

use crate::firing_table::TICKS_PER_SECOND;
use crate::network::{build_network, Network};
use crate::neuromodulation::ModulatorTrace;
use crate::params;
use crate::params::SimulationParams;
use crate::partition;
use crate::partition::{PartitionStateSnapshot, Request, SharedState, TickContext};
use crate::state_snapshot::StateSnapshot;
use crate::types::HashMap;

pub fn create_instance(params: SimulationParams) -> Result<Instance, SimpleError> {
    try_with!(
        params::validate_simulation_params(&params),
        "invalid simulation parameters"
    );

    let network = Arc::new(build_network(&params));
    let shared = Arc::new(SharedState::new(&network));

    let num_workers = get_num_workers(&params);

    let mut broadcast_tx = Bus::new(1);
    let (result_tx, result_rx) = mpsc_channel();
    let (snapshot_tx, snapshot_rx) = mpsc_channel();

    let mut partitions = partition::create_partitions(&network, &shared, num_workers);
    let mut join_handles = Vec::new();

    for (thread_id, mut worker_partition) in partitions.drain(..).enumerate() {
        let rx = broadcast_tx.add_rx();
        let result_tx = result_tx.clone();
        let snapshot_tx = snapshot_tx.clone();
        let pin_threads = params.technical_params.pin_threads;

        join_handles.push(thread::spawn(move || {
            if pin_threads {
                core_affinity::set_for_current(CoreId { id: thread_id });
            }

            worker_partition.run(rx, result_tx, snapshot_tx);
        }));
    }

    let group_ids_by_name: HashMap<String, usize> = network
        .groups
        .iter()
        .enumerate()
        .filter(|(_, group)| !group.name.is_empty())
        .map(|(group_id, group)| (group.name.clone(), group_id))
        .collect();

    let num_spike_gen_channels = network
        .groups
        .iter()
        .filter(|group| group.is_spike_generator)
        .map(|group| group.num_neurons())
        .sum();

    info!(
        num_neurons = network.config.num_n,
        num_synapses = network.num_synapses(),
        max_delay = network.config.max_delay,
        num_workers,
        "simulation instance created"
    );

    let modulator_trace = ModulatorTrace::new(network.config.num_groups);

    Ok(Instance {
        network,
        shared,
        broadcast_tx: Some(broadcast_tx),
        result_rx,
        snapshot_rx,
        num_workers,
        num_spike_gen_channels,
        tick_period: 0,
        spike_count_d1_total: 0,
        spike_count_d2_total: 0,
        modulator_trace,
        group_ids_by_name,
        join_handles,
    })
}

fn get_num_workers(params: &SimulationParams) -> usize {
    params
        .technical_params
        .num_threads
        .unwrap_or_else(num_cpus::get)
}

#[derive(Debug, Clone)]
pub struct TickInput {
    /// Channels into the spike-generator bit space; channel `c` drives the
    /// generator neuron with spike-gen offset `c`.
    pub spiking_gen_channels: Vec<usize>,
    /// Rates in Hz per Poisson neuron, indexed by `nid - num_n_reg`.
    pub poisson_rates: Option<Arc<Vec<f32>>>,
    /// External currents per regular neuron.
    pub ext_currents: Option<Arc<Vec<f32>>>,
    pub extract_state_snapshot: bool,
}

static EMPTY_TICK_INPUT: TickInput = TickInput {
    spiking_gen_channels: Vec::new(),
    poisson_rates: None,
    ext_currents: None,
    extract_state_snapshot: false,
};

impl TickInput {
    pub fn new() -> Self {
        EMPTY_TICK_INPUT.clone()
    }

    pub fn from_spiking_gen_channels(channels: &[usize]) -> Self {
        let mut result = EMPTY_TICK_INPUT.clone();
        result.spiking_gen_channels.extend_from_slice(channels);
        result
    }

    pub fn reset(&mut self) {
        self.spiking_gen_channels.clear();
        self.poisson_rates = None;
        self.ext_currents = None;
        self.extract_state_snapshot = false;
    }
}

impl Default for TickInput {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct TickResult {
    pub t: usize,
    pub spiking_nids: Vec<usize>,
    pub synaptic_transmission_count: usize,
    pub state_snapshot: Option<StateSnapshot>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpikeCounts {
    pub d1_second: usize,
    pub d2_second: usize,
    pub d1_total: u64,
    pub d2_total: u64,
}

pub struct Instance {
    network: Arc<Network>,
    shared: Arc<SharedState>,
    broadcast_tx: Option<Bus<Request>>,
    result_rx: MpscReceiver<partition::PhaseResult>,
    snapshot_rx: MpscReceiver<PartitionStateSnapshot>,
    num_workers: usize,
    num_spike_gen_channels: usize,
    tick_period: usize,
    spike_count_d1_total: u64,
    spike_count_d2_total: u64,
    modulator_trace: ModulatorTrace,
    group_ids_by_name: HashMap<String, usize>,
    join_handles: Vec<JoinHandle<()>>,
}

impl Instance {
    pub fn get_num_neurons(&self) -> usize {
        self.network.config.num_n
    }

    pub fn get_num_synapses(&self) -> usize {
        self.network.num_synapses()
    }

    pub fn get_num_groups(&self) -> usize {
        self.network.config.num_groups
    }

    pub fn get_num_spike_gen_channels(&self) -> usize {
        self.num_spike_gen_channels
    }

    pub fn get_tick_period(&self) -> usize {
        self.tick_period
    }

    pub fn group_id_by_name(&self, name: &str) -> Option<usize> {
        self.group_ids_by_name.get(name).copied()
    }

    pub fn dopamine_trace(&self, group_id: usize) -> &[f32] {
        self.modulator_trace.trace(group_id)
    }

    pub fn dopamine_concentration(&self, group_id: usize) -> f32 {
        self.shared.dopamine.concentration(group_id)
    }

    pub fn spike_counts(&self) -> SpikeCounts {
        SpikeCounts {
            d1_second: self.shared.firing.sec_count_d1(),
            d2_second: self.shared.firing.sec_count_d2(),
            d1_total: self.spike_count_d1_total,
            d2_total: self.spike_count_d2_total,
        }
    }

    /// Advances the simulation by one millisecond: detection phase, time
    /// table update, delivery/integration phase, neuromodulator bookkeeping
    /// and at second boundaries the firing-table compaction. A kernel error
    /// fails the tick and poisons the instance.
    pub fn tick(&mut self, tick_input: &TickInput) -> SimpleResult<TickResult> {
        if let Some(error) = self.shared.error.get() {
            return Err(SimpleError::new(format!(
                "instance is corrupt after {}",
                error.as_str()
            )));
        }

        self.validate_tick_input(tick_input)?;

        let t = self.tick_period;
        let ms = t % TICKS_PER_SECOND;

        let ctx = TickContext {
            t,
            spike_gen_bits: Arc::new(self.build_spike_gen_bits(&tick_input.spiking_gen_channels)),
            poisson_rates: tick_input.poisson_rates.clone(),
            ext_currents: tick_input.ext_currents.clone(),
            apply_weight_update: (t + 1) % self.network.config.weight_update_interval == 0,
        };

        let d1_before = self.shared.firing.sec_count_d1();
        let d2_before = self.shared.firing.sec_count_d2();

        self.broadcast(Request::FireAndDecay(ctx.clone()));
        self.collect_phase_results();

        if let Some(error) = self.shared.error.get() {
            return Err(SimpleError::new(error.as_str()));
        }

        self.shared.firing.update_time_tables(ms);

        let spiking_nids = self.collect_spiking_nids(d1_before, d2_before);

        self.broadcast(Request::DeliverAndIntegrate(ctx));
        let synaptic_transmission_count = self.collect_phase_results();

        if let Some(error) = self.shared.error.get() {
            return Err(SimpleError::new(error.as_str()));
        }

        self.shared.dopamine.decay();
        self.modulator_trace.record(t, &self.shared.dopamine);

        if (t + 1) % TICKS_PER_SECOND == 0 {
            let counts = self.shared.firing.shift_second_boundary();
            self.spike_count_d1_total += counts.d1_last_second as u64;
            self.spike_count_d2_total += counts.d2_last_second as u64;
        }

        let state_snapshot = if tick_input.extract_state_snapshot {
            Some(self.extract_state_snapshot())
        } else {
            None
        };

        self.tick_period += 1;

        Ok(TickResult {
            t,
            spiking_nids,
            synaptic_transmission_count,
            state_snapshot,
        })
    }

    /// Tick with no stimulus; panics if the instance has gone corrupt.
    pub fn tick_no_input(&mut self) -> TickResult {
        self.tick(&EMPTY_TICK_INPUT)
            .expect("tick without input failed")
    }

    pub fn tick_no_input_until(&mut self, t: usize) {
        for _ in self.tick_period..t {
            self.tick_no_input();
        }
    }

    fn broadcast(&mut self, request: Request) {
        self.broadcast_tx.as_mut().unwrap().broadcast(request);
    }

    fn collect_phase_results(&self) -> usize {
        let mut synaptic_transmission_count = 0;
        for _ in 0..self.num_workers {
            synaptic_transmission_count += self
                .result_rx
                .recv()
                .unwrap()
                .synaptic_transmission_count;
        }
        synaptic_transmission_count
    }

    fn collect_spiking_nids(&self, d1_before: usize, d2_before: usize) -> Vec<usize> {
        let d1_entries = (d1_before..self.shared.firing.sec_count_d1())
            .map(|index| self.shared.firing.entry_d1(index) as usize);
        let d2_entries = (d2_before..self.shared.firing.sec_count_d2())
            .map(|index| self.shared.firing.entry_d2(index) as usize);

        d1_entries.chain(d2_entries).sorted().collect()
    }

    fn build_spike_gen_bits(&self, channels: &[usize]) -> Vec<u32> {
        if channels.is_empty() {
            return Vec::new();
        }

        let num_words = (self.num_spike_gen_channels + 31) / 32;
        let mut bits = vec![0u32; num_words];

        for channel in channels {
            bits[channel / 32] |= 1 << (channel % 32);
        }

        bits
    }

    fn extract_state_snapshot(&mut self) -> StateSnapshot {
        self.broadcast(Request::ExtractStateSnapshot);

        let mut partition_snapshots = Vec::new();
        for _ in 0..self.num_workers {
            partition_snapshots.push(self.snapshot_rx.recv().unwrap());
        }

        aggregate_state_snapshot(partition_snapshots)
    }

    fn validate_tick_input(&self, tick_input: &TickInput) -> SimpleResult<()> {
        for channel in &tick_input.spiking_gen_channels {
            if *channel >= self.num_spike_gen_channels {
                return Err(SimpleError::new(format!(
                    "Invalid spike generator channel id: {}",
                    channel
                )));
            }
        }

        if let Some(poisson_rates) = &tick_input.poisson_rates {
            if poisson_rates.len() != self.network.config.num_n_pois {
                return Err(SimpleError::new(format!(
                    "Expected {} Poisson rates, got {}",
                    self.network.config.num_n_pois,
                    poisson_rates.len()
                )));
            }
        }

        if let Some(ext_currents) = &tick_input.ext_currents {
            if ext_currents.len() != self.network.config.num_n_reg {
                return Err(SimpleError::new(format!(
                    "Expected {} external currents, got {}",
                    self.network.config.num_n_reg,
                    ext_currents.len()
                )));
            }
        }

        Ok(())
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        // workers park on the bus between phases; closing it ends their
        // request loops
        self.broadcast_tx = None;

        for join_handle in self.join_handles.drain(..) {
            join_handle.join().ok();
        }
    }
}

/// Stitches the per-partition snapshots back into neuron-id order.
fn aggregate_state_snapshot(
    mut partition_snapshots: Vec<PartitionStateSnapshot>,
) -> StateSnapshot {
    partition_snapshots.sort_by_key(|snapshot| snapshot.nid_start);

    let mut aggregated = StateSnapshot {
        neuron_states: Vec::new(),
        synapse_states: Vec::new(),
    };

    for partition_snapshot in partition_snapshots.iter_mut() {
        aggregated
            .neuron_states
            .append(&mut partition_snapshot.neuron_states);
        aggregated
            .synapse_states
            .append(&mut partition_snapshot.synapse_states);
    }

    aggregated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ConnectionParams, GroupParams, GroupType, InitialSynWeight};
    use crate::state_snapshot::{NeuronState, SynapseState};
    use float_cmp::assert_approx_eq;
    use itertools::assert_equal;

    fn chain_instance(weight: f32, delay: usize) -> Instance {
        let mut params = SimulationParams::default();

        let mut post = GroupParams::default();
        post.name = "post".to_string();
        params.groups.push(post);

        let mut gen = GroupParams::default();
        gen.name = "gen".to_string();
        gen.group_type = GroupType::POISSON | GroupType::TARGET_AMPA;
        gen.is_spike_generator = true;
        params.groups.push(gen);

        let mut conn = ConnectionParams::defaults_for_group_ids(1, 0);
        conn.initial_syn_weight = InitialSynWeight::Constant(weight);
        conn.max_syn_weight = weight.max(10.0);
        conn.delay_min = delay;
        conn.delay_max = delay;
        params.connections.push(conn);

        create_instance(params).unwrap()
    }

    #[test]
    fn generator_channel_maps_to_neuron() {
        let mut instance = chain_instance(30.0, 1);

        assert_eq!(instance.get_num_neurons(), 2);
        assert_eq!(instance.get_num_spike_gen_channels(), 1);

        let tick_0_result = instance
            .tick(&TickInput::from_spiking_gen_channels(&[0]))
            .unwrap();

        // the generator neuron fires in the same tick
        assert_equal(tick_0_result.spiking_nids, [1]);
    }

    #[test]
    fn strong_synapse_drives_post_neuron() {
        let mut instance = chain_instance(100.0, 2);

        instance
            .tick(&TickInput::from_spiking_gen_channels(&[0]))
            .unwrap();

        let tick_1_result = instance.tick_no_input();
        assert!(tick_1_result.spiking_nids.is_empty());

        // delivery at tick 2 depolarizes well past threshold; detection picks
        // the spike up one tick later
        instance.tick_no_input();
        let tick_3_result = instance.tick_no_input();

        assert_equal(tick_3_result.spiking_nids, [0]);
    }

    #[test]
    fn transmission_count_reports_deliveries() {
        let mut instance = chain_instance(5.0, 1);

        instance
            .tick(&TickInput::from_spiking_gen_channels(&[0]))
            .unwrap();

        let tick_1_result = instance.tick_no_input();
        assert_eq!(tick_1_result.synaptic_transmission_count, 1);
    }

    #[test]
    fn group_lookup_by_name() {
        let instance = chain_instance(5.0, 1);

        assert_eq!(instance.group_id_by_name("post"), Some(0));
        assert_eq!(instance.group_id_by_name("gen"), Some(1));
        assert_eq!(instance.group_id_by_name("missing"), None);
    }

    #[test]
    fn invalid_tick_input() {
        let mut instance = chain_instance(5.0, 1);

        let result = instance.tick(&TickInput::from_spiking_gen_channels(&[1]));
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().as_str(),
            "Invalid spike generator channel id: 1"
        );

        let mut tick_input = TickInput::new();
        tick_input.poisson_rates = Some(Arc::new(vec![10.0, 10.0]));

        let result = instance.tick(&tick_input);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().as_str(), "Expected 1 Poisson rates, got 2");

        let mut tick_input = TickInput::new();
        tick_input.ext_currents = Some(Arc::new(Vec::new()));

        let result = instance.tick(&tick_input);
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().as_str(),
            "Expected 1 external currents, got 0"
        );
    }

    #[test]
    fn snapshot_through_public_api() {
        let mut instance = chain_instance(7.0, 1);

        let mut tick_input = TickInput::new();
        tick_input.extract_state_snapshot = true;

        let result = instance.tick(&tick_input).unwrap();
        let snapshot = result.state_snapshot.unwrap();

        assert_eq!(snapshot.neuron_states.len(), 2);
        assert_eq!(snapshot.synapse_states.len(), 1);
        assert_approx_eq!(f32, snapshot.synapse_states[0].weight, 7.0);
    }

    #[test]
    fn state_snapshot_aggregation() {
        let partition_snapshot_0 = PartitionStateSnapshot {
            nid_start: 2,
            neuron_states: vec![
                NeuronState {
                    voltage: 2.0,
                    recovery: 0.0,
                    current: 0.0,
                    num_spikes: 0,
                },
                NeuronState {
                    voltage: 3.0,
                    recovery: 0.0,
                    current: 0.0,
                    num_spikes: 0,
                },
            ],
            synapse_states: vec![SynapseState {
                pre_syn_nid: 0,
                post_syn_nid: 2,
                weight: 0.4,
                weight_change: 0.0,
            }],
        };

        let partition_snapshot_1 = PartitionStateSnapshot {
            nid_start: 0,
            neuron_states: vec![
                NeuronState {
                    voltage: 0.0,
                    recovery: 0.0,
                    current: 0.0,
                    num_spikes: 0,
                },
                NeuronState {
                    voltage: 1.0,
                    recovery: 0.0,
                    current: 0.0,
                    num_spikes: 0,
                },
            ],
            synapse_states: vec![SynapseState {
                pre_syn_nid: 2,
                post_syn_nid: 1,
                weight: 0.2,
                weight_change: 0.0,
            }],
        };

        let snapshot =
            aggregate_state_snapshot(vec![partition_snapshot_0, partition_snapshot_1]);

        for (index, neuron_state) in snapshot.neuron_states.iter().enumerate() {
            assert_approx_eq!(f32, neuron_state.voltage, index as f32);
        }

        assert_eq!(snapshot.synapse_states.len(), 2);
        assert_eq!(snapshot.synapse_states[0].post_syn_nid, 1);
        assert_eq!(snapshot.synapse_states[1].post_syn_nid, 2);
    }

    #[test]
    fn multithreaded_instance_ticks() {
        let num_threads = num_cpus::get().min(2);

        let mut params = SimulationParams::default();

        let mut group = GroupParams::default();
        group.name = "a".to_string();
        group.num_neurons = 10;
        params.groups.push(group.clone());

        group.name = "b".to_string();
        params.groups.push(group);

        let mut conn = ConnectionParams::defaults_for_group_ids(0, 1);
        conn.initial_syn_weight = InitialSynWeight::Constant(5.0);
        params.connections.push(conn);

        params.technical_params.num_threads = Some(num_threads);
        params.technical_params.load_buffer_size = 4;

        let mut instance = create_instance(params).unwrap();

        for _ in 0..10 {
            let result = instance.tick_no_input();
            assert!(result.spiking_nids.is_empty());
        }

        assert_eq!(instance.get_tick_period(), 10);
    }
}
