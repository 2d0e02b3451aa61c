use std::sync::Arc;

use crate::firing_table::TICKS_PER_SECOND;
use crate::network::{DelaySlice, Network};
use crate::params::GroupType;
use crate::partition::Partition;
use crate::stdp;
use crate::types::KernelError;

/// Delayed-spike delivery into this partition's post-neurons.
///
/// The D2 pass walks every active delay and the firing-table window of the
/// tick that delay reaches back to; the D1 pass delivers the previous tick's
/// unit-delay spikes. Each delivery marks the incoming-spike bit, stamps the
/// synaptic arrival time, releases dopamine for TARGET_DA sources and applies
/// LTD. Returns the number of transmissions landed in this partition.
pub fn run(partition: &mut Partition, t: usize) -> usize {
    let network = Arc::clone(&partition.network);
    let ms = t % TICKS_PER_SECOND;

    let mut transmission_count = 0;

    for delay in 1..=network.config.max_delay {
        let window = partition.shared.firing.delivery_window_d2(ms, delay);

        for index in window {
            let pre_nid = partition.shared.firing.entry_d2(index) as usize;
            let slice = network.delay_slice(pre_nid, delay);

            if !deliver_slice(partition, &network, pre_nid, slice, t, &mut transmission_count) {
                return transmission_count;
            }
        }
    }

    let window = partition.shared.firing.delivery_window_d1(ms);

    for index in window {
        let pre_nid = partition.shared.firing.entry_d1(index) as usize;
        let slice = network.delay_slice(pre_nid, 1);

        if !deliver_slice(partition, &network, pre_nid, slice, t, &mut transmission_count) {
            return transmission_count;
        }
    }

    transmission_count
}

fn deliver_slice(
    partition: &mut Partition,
    network: &Network,
    pre_nid: usize,
    slice: DelaySlice,
    t: usize,
    transmission_count: &mut usize,
) -> bool {
    let pre_group = network.group_of(pre_nid);
    let is_da_source = pre_group.group_type.contains(GroupType::TARGET_DA);
    let pre_inhibitory = pre_group.group_type.is_inhibitory();

    let block_start = network.cum_post[pre_nid] + slice.start as usize;
    let block = block_start..block_start + slice.len as usize;

    let plasticity_active = network.config.with_stdp && !network.config.testing_phase;

    for target in &network.post_synaptic_ids[block] {
        let post_nid = target.post_nid as usize;

        if !partition.owns(post_nid) {
            continue;
        }

        let post_group_id = network.grp_ids[post_nid] as usize;
        if post_group_id >= network.groups.len() {
            partition.shared.error.raise(KernelError::CurrentUpdateGroupUnknown);
            return false;
        }

        *transmission_count += 1;

        if is_da_source {
            partition.shared.dopamine.release(post_group_id);
        }

        let slot = target.pre_slot as usize;

        partition
            .incoming
            .mark(slot, post_nid - partition.nid_start);

        let syn_local = partition.syn_index(post_nid, slot);
        partition.syn_spike_time[syn_local] = t as i64;

        let post_group = &network.groups[post_group_id];
        if plasticity_active && post_group.with_stdp() {
            let dt = t as i64 - partition.last_spike_time[partition.local(post_nid)];

            if dt >= 0 {
                if pre_inhibitory {
                    if let Some(istdp) = &post_group.istdp {
                        partition.wt_change[syn_local] += stdp::inhibitory_ltd(dt, &istdp.curve);
                    }
                } else if let Some(estdp) = &post_group.estdp {
                    partition.wt_change[syn_local] += stdp::excitatory_ltd(dt, &estdp.curve);
                }
            }
        }
    }

    true
}
