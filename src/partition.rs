use std::sync::mpsc::Sender as MpscSender;
use std::sync::Arc;

use bus::BusReader;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::conductance;
use crate::find_firing;
use crate::firing_table::FiringTables;
use crate::incoming_spikes::IncomingSpikes;
use crate::load_partition::{build_load_partition, LoadEntry};
use crate::network::Network;
use crate::neuromodulation::DopamineField;
use crate::neuron_state;
use crate::short_term_plasticity::StpRing;
use crate::spike_delivery;
use crate::state_snapshot::{NeuronState, SynapseState};
use crate::types::{ErrorFlag, TIME_NEVER};
use crate::util::{calculate_hash, get_worker_range};
use crate::weight_update;

/// State written across partition boundaries. Firing tables and dopamine take
/// concurrent writers; the STP ring is owner-written and any-reader with a
/// host barrier in between.
pub struct SharedState {
    pub firing: FiringTables,
    pub stp: StpRing,
    pub dopamine: DopamineField,
    pub error: ErrorFlag,
}

impl SharedState {
    pub fn new(network: &Network) -> Self {
        Self {
            firing: FiringTables::new(
                network.config.max_delay,
                network.config.max_spikes_d1,
                network.config.max_spikes_d2,
            ),
            stp: StpRing::new(network.config.max_delay, network.config.num_n),
            dopamine: DopamineField::new(
                network.groups.iter().map(|g| g.modulation).collect(),
            ),
            error: ErrorFlag::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Request {
    /// Conductance/STP decay, spike detection, firing-table append, LTP.
    FireAndDecay(TickContext),
    /// Delayed delivery, conductance accumulation, neuron integration, and
    /// the cadenced weight update.
    DeliverAndIntegrate(TickContext),
    ExtractStateSnapshot,
}

#[derive(Debug, Clone)]
pub struct TickContext {
    pub t: usize,
    pub spike_gen_bits: Arc<Vec<u32>>,
    pub poisson_rates: Option<Arc<Vec<f32>>>,
    pub ext_currents: Option<Arc<Vec<f32>>>,
    pub apply_weight_update: bool,
}

#[derive(Debug, Default)]
pub struct PhaseResult {
    pub synaptic_transmission_count: usize,
}

pub struct PartitionStateSnapshot {
    pub nid_start: usize,
    pub neuron_states: Vec<NeuronState>,
    pub synapse_states: Vec<SynapseState>,
}

/// One worker's contiguous share of the neuron id space plus all state owned
/// by those neurons: integrator variables, incoming synapses, the
/// incoming-spike grid and the Poisson generators.
pub struct Partition {
    pub(crate) network: Arc<Network>,
    pub(crate) shared: Arc<SharedState>,
    pub(crate) nid_start: usize,
    pub(crate) nid_end: usize,
    pub(crate) chunks: Vec<LoadEntry>,

    pub(crate) voltage: Vec<f32>,
    pub(crate) recovery: Vec<f32>,
    pub(crate) current: Vec<f32>,
    pub(crate) ext_current: Vec<f32>,
    pub(crate) g_ampa: Vec<f32>,
    pub(crate) g_nmda: Vec<f32>,
    pub(crate) g_nmda_r: Vec<f32>,
    pub(crate) g_nmda_d: Vec<f32>,
    pub(crate) g_gaba_a: Vec<f32>,
    pub(crate) g_gaba_b: Vec<f32>,
    pub(crate) g_gaba_b_r: Vec<f32>,
    pub(crate) g_gaba_b_d: Vec<f32>,
    pub(crate) avg_firing: Vec<f32>,
    pub(crate) last_spike_time: Vec<i64>,
    pub(crate) n_spike_cnt: Vec<u32>,

    /// Global synapse index of this partition's first incoming synapse.
    pub(crate) syn_base: usize,
    pub(crate) wt: Vec<f32>,
    pub(crate) wt_change: Vec<f32>,
    pub(crate) max_syn_wt: Vec<f32>,
    pub(crate) syn_spike_time: Vec<i64>,

    pub(crate) incoming: IncomingSpikes,

    pub(crate) pois_start: usize,
    pub(crate) poisson_rngs: Vec<StdRng>,

    pub(crate) fired_d1: Vec<u32>,
    pub(crate) fired_d2: Vec<u32>,
}

pub fn create_partitions(
    network: &Arc<Network>,
    shared: &Arc<SharedState>,
    num_workers: usize,
) -> Vec<Partition> {
    let chunks = build_load_partition(&network.group_ranges(), network.config.load_buffer_size);

    let mut partitions = Vec::new();

    for worker_id in 0..num_workers {
        let chunk_range = get_worker_range(num_workers, worker_id, chunks.len());
        let worker_chunks: Vec<LoadEntry> = chunks[chunk_range].to_vec();

        let (nid_start, nid_end) = match (worker_chunks.first(), worker_chunks.last()) {
            (Some(first), Some(last)) => (first.start_n(), last.end_n()),
            _ => (0, 0),
        };

        partitions.push(Partition::new(
            Arc::clone(network),
            Arc::clone(shared),
            worker_chunks,
            nid_start,
            nid_end,
        ));
    }

    partitions
}

impl Partition {
    fn new(
        network: Arc<Network>,
        shared: Arc<SharedState>,
        chunks: Vec<LoadEntry>,
        nid_start: usize,
        nid_end: usize,
    ) -> Self {
        let num_local = nid_end - nid_start;

        let mut voltage = vec![0.0; num_local];
        let mut recovery = vec![0.0; num_local];
        let mut avg_firing = vec![0.0; num_local];

        for chunk in &chunks {
            let group = &network.groups[chunk.group_id()];
            let izh = group.izhikevich;

            for nid in chunk.start_n()..chunk.end_n() {
                let local = nid - nid_start;
                voltage[local] = izh.c;
                recovery[local] = izh.b * izh.c;

                if let Some(homeostasis) = &group.homeostasis {
                    avg_firing[local] = homeostasis.base_firing;
                }
            }
        }

        let syn_base = network.cum_pre[nid_start.min(network.config.num_n)];
        let syn_end = network.cum_pre[nid_end];
        let num_syn = syn_end - syn_base;

        let wt = network.init_wt[syn_base..syn_end].to_vec();
        let max_syn_wt = network.max_syn_wt[syn_base..syn_end].to_vec();

        let incoming = IncomingSpikes::new(network.config.max_num_pre_syn, num_local);

        let pois_start = nid_start.max(network.config.num_n_reg);
        let seed = network.config.seed;
        let poisson_rngs = (pois_start..nid_end.max(pois_start))
            .map(|nid| StdRng::seed_from_u64(calculate_hash(&(seed, nid))))
            .collect();

        Self {
            network,
            shared,
            nid_start,
            nid_end,
            chunks,
            voltage,
            recovery,
            current: vec![0.0; num_local],
            ext_current: vec![0.0; num_local],
            g_ampa: vec![0.0; num_local],
            g_nmda: vec![0.0; num_local],
            g_nmda_r: vec![0.0; num_local],
            g_nmda_d: vec![0.0; num_local],
            g_gaba_a: vec![0.0; num_local],
            g_gaba_b: vec![0.0; num_local],
            g_gaba_b_r: vec![0.0; num_local],
            g_gaba_b_d: vec![0.0; num_local],
            avg_firing,
            last_spike_time: vec![TIME_NEVER; num_local],
            n_spike_cnt: vec![0; num_local],
            syn_base,
            wt,
            wt_change: vec![0.0; num_syn],
            max_syn_wt,
            syn_spike_time: vec![TIME_NEVER; num_syn],
            incoming,
            pois_start,
            poisson_rngs,
            fired_d1: Vec::new(),
            fired_d2: Vec::new(),
        }
    }

    pub fn run(
        &mut self,
        mut rx: BusReader<Request>,
        result_tx: MpscSender<PhaseResult>,
        snapshot_tx: MpscSender<PartitionStateSnapshot>,
    ) {
        while let Ok(request) = rx.recv() {
            match request {
                Request::FireAndDecay(ctx) => {
                    self.fire_and_decay(&ctx);
                    result_tx.send(PhaseResult::default()).unwrap();
                }
                Request::DeliverAndIntegrate(ctx) => {
                    let synaptic_transmission_count = self.deliver_and_integrate(&ctx);
                    result_tx
                        .send(PhaseResult {
                            synaptic_transmission_count,
                        })
                        .unwrap();
                }
                Request::ExtractStateSnapshot => {
                    snapshot_tx.send(self.extract_state_snapshot()).unwrap();
                }
            }
        }
    }

    pub(crate) fn fire_and_decay(&mut self, ctx: &TickContext) {
        if let Some(ext_currents) = &ctx.ext_currents {
            let num_n_reg = self.network.config.num_n_reg;
            for nid in self.nid_start..self.nid_end.min(num_n_reg) {
                self.ext_current[nid - self.nid_start] = ext_currents[nid];
            }
        }

        neuron_state::decay_conductances_and_stp(self, ctx.t);
        find_firing::run(self, ctx);
    }

    pub(crate) fn deliver_and_integrate(&mut self, ctx: &TickContext) -> usize {
        if self.shared.error.get().is_some() {
            return 0;
        }

        let synaptic_transmission_count = spike_delivery::run(self, ctx.t);
        conductance::run(self, ctx.t);
        neuron_state::integrate(self);

        if ctx.apply_weight_update {
            weight_update::run(self);
        }

        synaptic_transmission_count
    }

    pub(crate) fn local(&self, nid: usize) -> usize {
        nid - self.nid_start
    }

    /// Partition-local index of synapse `(post, slot)`.
    pub(crate) fn syn_index(&self, post_nid: usize, slot: usize) -> usize {
        self.network.cum_pre[post_nid] - self.syn_base + slot
    }

    pub(crate) fn owns(&self, nid: usize) -> bool {
        nid >= self.nid_start && nid < self.nid_end
    }

    fn extract_state_snapshot(&self) -> PartitionStateSnapshot {
        let neuron_states = (self.nid_start..self.nid_end)
            .map(|nid| {
                let local = self.local(nid);
                NeuronState {
                    voltage: self.voltage[local],
                    recovery: self.recovery[local],
                    current: self.current[local],
                    num_spikes: self.n_spike_cnt[local],
                }
            })
            .collect();

        let synapse_states = (self.nid_start..self.nid_end)
            .flat_map(|post_nid| {
                (0..self.network.n_pre[post_nid] as usize).map(move |slot| {
                    let syn_local = self.syn_index(post_nid, slot);
                    let syn_global = self.network.cum_pre[post_nid] + slot;

                    SynapseState {
                        pre_syn_nid: self.network.pre_synaptic_ids[syn_global] as usize,
                        post_syn_nid: post_nid,
                        weight: self.wt[syn_local],
                        weight_change: self.wt_change[syn_local],
                    }
                })
            })
            .collect();

        PartitionStateSnapshot {
            nid_start: self.nid_start,
            neuron_states,
            synapse_states,
        }
    }

    #[cfg(test)]
    pub(crate) fn get_num_neurons(&self) -> usize {
        self.nid_end - self.nid_start
    }
}
