use std::sync::Arc;

use rand::distributions::Uniform;
use rand::prelude::Distribution;

use crate::network::GroupConfig;
use crate::partition::{Partition, TickContext};
use crate::stdp;

/// Fired-neuron buffer depth between firing-table flushes.
pub const FIRE_CHUNK_CNT: usize = 512;

/// Range of the per-tick Poisson draw; a generator with `rate` Hz fires when
/// `r * 1000 / MAX_POISSON_RANGE < rate`.
pub const MAX_POISSON_RANGE: f32 = 1000.0;

/// Spike detection over this partition's chunks: spike-generator bits,
/// Poisson draws and threshold crossings. Fired neurons are appended to the
/// firing tables in batches, their after-spike state is reset and LTP is
/// applied to their plastic incoming synapses.
pub fn run(partition: &mut Partition, ctx: &TickContext) {
    let network = Arc::clone(&partition.network);
    let t = ctx.t;

    for chunk_index in 0..partition.chunks.len() {
        let chunk = partition.chunks[chunk_index];
        let group = &network.groups[chunk.group_id()];

        for nid in chunk.start_n()..chunk.end_n() {
            let fired = if group.group_type.is_poisson() {
                if group.is_spike_generator {
                    spike_gen_bit(ctx, group, nid)
                } else {
                    poisson_draw(partition, ctx, nid)
                }
            } else {
                partition.voltage[partition.local(nid)] >= 30.0
            };

            if !fired {
                continue;
            }

            process_fired(partition, group, nid, t);

            if partition.fired_d1.len() + partition.fired_d2.len() >= FIRE_CHUNK_CNT
                && !flush(partition)
            {
                return;
            }
        }
    }

    flush(partition);
}

fn spike_gen_bit(ctx: &TickContext, group: &GroupConfig, nid: usize) -> bool {
    let index = nid - group.start_n + group.spike_gen_offset;
    let word = index / 32;

    match ctx.spike_gen_bits.get(word) {
        Some(bits) => bits & (1 << (index % 32)) != 0,
        None => false,
    }
}

fn poisson_draw(partition: &mut Partition, ctx: &TickContext, nid: usize) -> bool {
    let rates = match &ctx.poisson_rates {
        Some(rates) => rates,
        None => return false,
    };

    let rate = rates[nid - partition.network.config.num_n_reg];
    if rate <= 0.0 {
        return false;
    }

    let rng = &mut partition.poisson_rngs[nid - partition.pois_start];
    let r = Uniform::new(0.0f32, MAX_POISSON_RANGE).sample(rng);

    r * 1000.0 / MAX_POISSON_RANGE < rate
}

fn process_fired(partition: &mut Partition, group: &GroupConfig, nid: usize, t: usize) {
    let local = partition.local(nid);

    partition.n_spike_cnt[local] += 1;

    if !group.group_type.is_poisson() {
        let izh = group.izhikevich;
        partition.voltage[local] = izh.c;
        partition.recovery[local] += izh.d;

        if group.with_stdp() {
            partition.last_spike_time[local] = t as i64;
        }

        if group.homeostasis.is_some() {
            partition.avg_firing[local] += 1.0;
        }
    }

    if let Some(stp_params) = &group.stp {
        partition.shared.stp.on_spike(t, nid, stp_params);
    }

    if group.uses_d1() {
        partition.fired_d1.push(nid as u32);
    } else {
        partition.fired_d2.push(nid as u32);
    }

    let plasticity_active =
        partition.network.config.with_stdp && !partition.network.config.testing_phase;

    if plasticity_active && group.with_stdp() && !group.group_type.is_poisson() {
        apply_ltp(partition, group, nid, t);
    }
}

/// Potentiation for the freshly fired post-neuron: every plastic incoming
/// synapse whose last arrival precedes this spike contributes per the group's
/// curve for the presynaptic sign.
fn apply_ltp(partition: &mut Partition, group: &GroupConfig, post_nid: usize, t: usize) {
    let network = Arc::clone(&partition.network);

    let num_pre = network.n_pre[post_nid] as usize;
    let block_start = network.cum_pre[post_nid];

    for slot in 0..num_pre {
        let syn_global = block_start + slot;

        let conn = &network.connections[network.conn_ids_pre[syn_global] as usize];
        if !conn.plastic {
            continue;
        }

        let syn_local = partition.syn_index(post_nid, slot);
        let arrival = partition.syn_spike_time[syn_local];
        if arrival > t as i64 {
            continue;
        }

        let dt = t as i64 - arrival;
        let pre_nid = network.pre_synaptic_ids[syn_global] as usize;
        let pre_inhibitory = network.group_of(pre_nid).group_type.is_inhibitory();

        if pre_inhibitory {
            if let Some(istdp) = &group.istdp {
                partition.wt_change[syn_local] += stdp::inhibitory_ltp(dt, &istdp.curve);
            }
        } else if let Some(estdp) = &group.estdp {
            partition.wt_change[syn_local] += stdp::excitatory_ltp(dt, &estdp.curve);
        }
    }
}

/// Reserves ranges in the global firing tables and writes the buffered ids.
/// On overflow the sticky error is raised and the kernel aborts.
fn flush(partition: &mut Partition) -> bool {
    if !partition.fired_d1.is_empty() {
        if let Err(error) = partition.shared.firing.push_d1(&partition.fired_d1) {
            partition.shared.error.raise(error);
            return false;
        }
        partition.fired_d1.clear();
    }

    if !partition.fired_d2.is_empty() {
        if let Err(error) = partition.shared.firing.push_d2(&partition.fired_d2) {
            partition.shared.error.raise(error);
            return false;
        }
        partition.fired_d2.clear();
    }

    true
}
