use rand::distributions::{Bernoulli, Uniform};
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::firing_table::TICKS_PER_SECOND;
use crate::neuromodulation::GroupModulation;
use crate::params::{
    ConnectionParams, EStdpParams, GroupType, IStdpParams, InitialSynWeight, IzhikevichParams,
    SimulationParams, StdpType, StpParams,
};
use crate::util::calculate_hash;

/// Allocation headroom on top of the widest incoming synapse count, carried
/// over from the reference allocation layout.
pub const PRE_SYN_SLACK: usize = 10;

/// Contiguous slice of a presynaptic neuron's targets sharing one conduction
/// delay; `start` is relative to the neuron's block in `post_synaptic_ids`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelaySlice {
    pub start: u32,
    pub len: u32,
}

/// Target entry: the post-neuron and the slot this synapse occupies in the
/// post-neuron's incoming block.
#[derive(Debug, Clone, Copy)]
pub struct PostTarget {
    pub post_nid: u32,
    pub pre_slot: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct HomeostasisConfig {
    pub scale: f32,
    pub avg_time_scale: f32,
    pub avg_time_scale_decay: f32,
    pub base_firing: f32,
}

#[derive(Debug, Clone)]
pub struct GroupConfig {
    pub name: String,
    pub start_n: usize,
    pub end_n: usize,
    pub group_type: GroupType,
    pub izhikevich: IzhikevichParams,
    pub estdp: Option<EStdpParams>,
    pub istdp: Option<IStdpParams>,
    pub stp: Option<StpParams>,
    pub homeostasis: Option<HomeostasisConfig>,
    pub modulation: GroupModulation,
    pub fixed_input_weights: bool,
    pub is_spike_generator: bool,
    /// Offset of this group's first neuron in the spike-generator bit vector.
    pub spike_gen_offset: usize,
    pub max_out_delay: usize,
}

impl GroupConfig {
    pub fn num_neurons(&self) -> usize {
        self.end_n - self.start_n
    }

    /// Unit-delay groups log their spikes in the D1 table.
    pub fn uses_d1(&self) -> bool {
        self.max_out_delay <= 1
    }

    pub fn with_stdp(&self) -> bool {
        self.estdp.is_some() || self.istdp.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    pub plastic: bool,
    pub mul_syn_fast: f32,
    pub mul_syn_slow: f32,
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub num_n: usize,
    pub num_n_reg: usize,
    pub num_n_pois: usize,
    pub num_groups: usize,
    pub max_delay: usize,
    pub max_num_pre_syn: usize,
    pub max_spikes_d1: usize,
    pub max_spikes_d2: usize,
    pub conductances: Option<crate::params::ConductanceParams>,
    pub with_stdp: bool,
    pub with_stp: bool,
    pub with_homeostasis: bool,
    pub testing_phase: bool,
    pub weight_update_interval: usize,
    pub stdp_scale_factor: f32,
    pub wt_change_decay: f32,
    pub load_buffer_size: usize,
    pub seed: u64,
}

/// The full set of immutable arrays consumed by the tick kernels, in the
/// layout the kernels index them.
pub struct Network {
    pub config: NetworkConfig,
    pub groups: Vec<GroupConfig>,
    pub connections: Vec<ConnectionConfig>,
    /// Group id per neuron.
    pub grp_ids: Vec<u16>,
    pub n_pre: Vec<u32>,
    pub n_post: Vec<u32>,
    pub cum_pre: Vec<usize>,
    pub cum_post: Vec<usize>,
    /// Source neuron per `(post, slot)` synapse.
    pub pre_synaptic_ids: Vec<u32>,
    /// Targets per presynaptic neuron, delay-sorted.
    pub post_synaptic_ids: Vec<PostTarget>,
    /// `(max_delay + 1)` delay slices per presynaptic neuron.
    pub post_delay_info: Vec<DelaySlice>,
    /// Connection id per `(post, slot)` synapse.
    pub conn_ids_pre: Vec<u16>,
    pub init_wt: Vec<f32>,
    pub max_syn_wt: Vec<f32>,
    /// Homeostatic targets per regular neuron; zero when disabled.
    pub base_firing: Vec<f32>,
    pub base_firing_inv: Vec<f32>,
}

impl Network {
    pub fn num_synapses(&self) -> usize {
        self.pre_synaptic_ids.len()
    }

    pub fn group_of(&self, nid: usize) -> &GroupConfig {
        &self.groups[self.grp_ids[nid] as usize]
    }

    pub fn delay_slice(&self, pre_nid: usize, delay: usize) -> DelaySlice {
        self.post_delay_info[pre_nid * (self.config.max_delay + 1) + delay]
    }

    pub fn group_ranges(&self) -> Vec<(usize, usize)> {
        self.groups.iter().map(|g| (g.start_n, g.end_n)).collect()
    }
}

struct OutEdge {
    post_nid: usize,
    delay: usize,
    conn_id: usize,
    weight: f32,
    max_weight: f32,
}

pub fn build_network(params: &SimulationParams) -> Network {
    let seed = params.technical_params.seed_override.unwrap_or(0);

    let mut groups = Vec::new();
    let mut grp_ids = Vec::new();
    let mut next_start = 0;
    let mut num_n_pois = 0;
    let mut spike_gen_offset = 0;

    for (group_id, group_params) in params.groups.iter().enumerate() {
        let start_n = next_start;
        next_start += group_params.num_neurons;

        if group_params.group_type.is_poisson() {
            num_n_pois += group_params.num_neurons;
        }

        let homeostasis = group_params.homeostasis.as_ref().map(|h| {
            let horizon_ms = h.avg_time_scale * TICKS_PER_SECOND as f32;
            HomeostasisConfig {
                scale: h.scale,
                avg_time_scale: h.avg_time_scale,
                avg_time_scale_decay: 1.0 - 1.0 / horizon_ms,
                base_firing: h.base_firing,
            }
        });

        let da_modulated = matches!(
            &group_params.estdp,
            Some(EStdpParams {
                stdp_type: StdpType::DopamineModulated,
                ..
            })
        ) || matches!(
            &group_params.istdp,
            Some(IStdpParams {
                stdp_type: StdpType::DopamineModulated,
                ..
            })
        );

        groups.push(GroupConfig {
            name: group_params.name.clone(),
            start_n,
            end_n: next_start,
            group_type: group_params.group_type,
            izhikevich: group_params.izhikevich,
            estdp: group_params.estdp.clone(),
            istdp: group_params.istdp.clone(),
            stp: group_params.stp,
            homeostasis,
            modulation: GroupModulation {
                base_dopamine: group_params.base_dopamine,
                dopamine_decay: group_params.dopamine_decay,
                da_modulated,
            },
            fixed_input_weights: group_params.fixed_input_weights,
            is_spike_generator: group_params.is_spike_generator,
            spike_gen_offset,
            max_out_delay: 1,
        });

        if group_params.is_spike_generator {
            spike_gen_offset += group_params.num_neurons;
        }

        grp_ids.extend(std::iter::repeat(group_id as u16).take(group_params.num_neurons));
    }

    let num_n = next_start;
    let num_n_reg = num_n - num_n_pois;

    // seed generators per synapse candidate so the topology is independent of
    // the thread count and the iteration order
    let mut out_edges: Vec<Vec<OutEdge>> = (0..num_n).map(|_| Vec::new()).collect();
    let mut n_pre = vec![0u32; num_n];

    for (conn_id, conn_params) in params.connections.iter().enumerate() {
        let from = &groups[conn_params.from_group_id];
        let to = &groups[conn_params.to_group_id];
        let sign = if from.group_type.is_inhibitory() {
            -1.0
        } else {
            1.0
        };

        let (from_start, from_end) = (from.start_n, from.end_n);
        let (to_start, to_end) = (to.start_n, to.end_n);

        for pre_nid in from_start..from_end {
            for post_nid in to_start..to_end {
                if pre_nid == post_nid && !conn_params.allow_self_connection {
                    continue;
                }

                let mut rng =
                    StdRng::seed_from_u64(calculate_hash(&(seed, pre_nid, post_nid, conn_id)));

                let is_connection = Bernoulli::new(conn_params.connect_density)
                    .unwrap()
                    .sample(&mut rng);

                if !is_connection {
                    continue;
                }

                let delay = Uniform::new_inclusive(conn_params.delay_min, conn_params.delay_max)
                    .sample(&mut rng);

                let magnitude = match conn_params.initial_syn_weight {
                    InitialSynWeight::Uniform(bound) => {
                        Uniform::new_inclusive(0.0, bound).sample(&mut rng)
                    }
                    InitialSynWeight::Constant(weight) => weight,
                };

                out_edges[pre_nid].push(OutEdge {
                    post_nid,
                    delay,
                    conn_id,
                    weight: sign * magnitude,
                    max_weight: sign * conn_params.max_syn_weight,
                });

                n_pre[post_nid] += 1;
            }
        }
    }

    let max_delay = out_edges
        .iter()
        .flat_map(|edges| edges.iter().map(|edge| edge.delay))
        .max()
        .unwrap_or(1)
        .max(1);

    for edges in out_edges.iter_mut() {
        edges.sort_by_key(|edge| (edge.delay, edge.post_nid));
    }

    for (pre_nid, edges) in out_edges.iter().enumerate() {
        if let Some(longest) = edges.iter().map(|edge| edge.delay).max() {
            let group = &mut groups[grp_ids[pre_nid] as usize];
            group.max_out_delay = group.max_out_delay.max(longest);
        }
    }

    let n_post: Vec<u32> = out_edges.iter().map(|edges| edges.len() as u32).collect();

    let mut cum_pre = vec![0usize; num_n + 1];
    for nid in 0..num_n {
        cum_pre[nid + 1] = cum_pre[nid] + n_pre[nid] as usize;
    }

    let mut cum_post = vec![0usize; num_n + 1];
    for nid in 0..num_n {
        cum_post[nid + 1] = cum_post[nid] + n_post[nid] as usize;
    }

    let num_synapses = cum_pre[num_n];

    let mut pre_synaptic_ids = vec![0u32; num_synapses];
    let mut conn_ids_pre = vec![0u16; num_synapses];
    let mut init_wt = vec![0.0f32; num_synapses];
    let mut max_syn_wt = vec![0.0f32; num_synapses];
    let mut post_synaptic_ids = Vec::with_capacity(num_synapses);
    let mut post_delay_info = vec![DelaySlice::default(); num_n * (max_delay + 1)];
    let mut next_pre_slot = vec![0u32; num_n];

    for (pre_nid, edges) in out_edges.iter().enumerate() {
        let block_start = cum_post[pre_nid];

        for (offset, edge) in edges.iter().enumerate() {
            let slice = &mut post_delay_info[pre_nid * (max_delay + 1) + edge.delay];
            if slice.len == 0 {
                slice.start = offset as u32;
            }
            slice.len += 1;

            let pre_slot = next_pre_slot[edge.post_nid];
            next_pre_slot[edge.post_nid] += 1;

            post_synaptic_ids.push(PostTarget {
                post_nid: edge.post_nid as u32,
                pre_slot,
            });

            let syn_index = cum_pre[edge.post_nid] + pre_slot as usize;
            pre_synaptic_ids[syn_index] = pre_nid as u32;
            conn_ids_pre[syn_index] = edge.conn_id as u16;
            init_wt[syn_index] = edge.weight;
            max_syn_wt[syn_index] = edge.max_weight;

            debug_assert_eq!(block_start + offset, post_synaptic_ids.len() - 1);
        }
    }

    let max_num_pre_syn = n_pre.iter().copied().max().unwrap_or(0) as usize + PRE_SYN_SLACK;

    let mut base_firing = vec![0.0f32; num_n_reg];
    let mut base_firing_inv = vec![0.0f32; num_n_reg];
    for group in &groups {
        if let Some(homeostasis) = &group.homeostasis {
            for nid in group.start_n..group.end_n {
                base_firing[nid] = homeostasis.base_firing;
                base_firing_inv[nid] = 1.0 / homeostasis.base_firing;
            }
        }
    }

    let connections = params
        .connections
        .iter()
        .map(|conn_params| ConnectionConfig {
            plastic: conn_params.plastic,
            mul_syn_fast: conn_params.mul_syn_fast,
            mul_syn_slow: conn_params.mul_syn_slow,
        })
        .collect();

    let config = NetworkConfig {
        num_n,
        num_n_reg,
        num_n_pois,
        num_groups: groups.len(),
        max_delay,
        max_num_pre_syn,
        max_spikes_d1: params
            .max_spikes_d1
            .unwrap_or(TICKS_PER_SECOND * num_n.max(1)),
        max_spikes_d2: params
            .max_spikes_d2
            .unwrap_or(TICKS_PER_SECOND * num_n.max(1)),
        conductances: params.conductances.clone(),
        with_stdp: groups.iter().any(|g| g.with_stdp()),
        with_stp: groups.iter().any(|g| g.stp.is_some()),
        with_homeostasis: groups.iter().any(|g| g.homeostasis.is_some()),
        testing_phase: params.testing_phase,
        weight_update_interval: params.weight_update.interval_ms,
        stdp_scale_factor: params.weight_update.interval_ms as f32 / TICKS_PER_SECOND as f32,
        wt_change_decay: params.weight_update.wt_change_decay,
        load_buffer_size: params.technical_params.load_buffer_size,
        seed,
    };

    Network {
        config,
        groups,
        connections,
        grp_ids,
        n_pre,
        n_post,
        cum_pre,
        cum_post,
        pre_synaptic_ids,
        post_synaptic_ids,
        post_delay_info,
        conn_ids_pre,
        init_wt,
        max_syn_wt,
        base_firing,
        base_firing_inv,
    }
}
