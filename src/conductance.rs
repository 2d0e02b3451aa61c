use std::sync::Arc;

use crate::incoming_spikes::for_each_set_bit;
use crate::params::GroupType;
use crate::partition::Partition;

/// Per-channel accumulation of this tick's arrived spikes.
///
/// Every regular post-neuron scans its incoming-spike word rows, routes each
/// set slot's weight into the channel sums selected by the presynaptic
/// group's target mask and clears the row. Under CUBA the weights sum
/// directly into the neuron's current.
pub fn run(partition: &mut Partition, t: usize) {
    let network = Arc::clone(&partition.network);
    let conductances = network.config.conductances.clone();

    for chunk_index in 0..partition.chunks.len() {
        let chunk = partition.chunks[chunk_index];
        let group = &network.groups[chunk.group_id()];

        if group.group_type.is_poisson() {
            continue;
        }

        for post_nid in chunk.start_n()..chunk.end_n() {
            let local = partition.local(post_nid);
            let num_rows = (network.n_pre[post_nid] as usize + 31) / 32;
            let block_start = network.cum_pre[post_nid];

            let mut sum_ampa = 0.0f32;
            let mut sum_nmda = 0.0f32;
            let mut sum_gaba_a = 0.0f32;
            let mut sum_gaba_b = 0.0f32;
            let mut sum_current = 0.0f32;

            for row in 0..num_rows {
                let word = partition.incoming.word(row, local);
                if word == 0 {
                    continue;
                }

                for_each_set_bit(word, |bit| {
                    let slot = row * 32 + bit;
                    let syn_global = block_start + slot;
                    let syn_local = partition.syn_index(post_nid, slot);

                    let pre_nid = network.pre_synaptic_ids[syn_global] as usize;
                    let pre_group = network.group_of(pre_nid);

                    let mut weight = partition.wt[syn_local];

                    if let Some(stp_params) = &pre_group.stp {
                        // TODO: compensate for the synapse's conduction delay
                        // when picking the ring slots; this reads the
                        // current-tick pair.
                        weight *= partition.shared.stp.efficacy(t, pre_nid, stp_params);
                    }

                    if conductances.is_some() {
                        let conn =
                            &network.connections[network.conn_ids_pre[syn_global] as usize];
                        let pre_type = pre_group.group_type;

                        if pre_type.contains(GroupType::TARGET_AMPA) {
                            sum_ampa += weight * conn.mul_syn_fast;
                        }
                        if pre_type.contains(GroupType::TARGET_NMDA) {
                            sum_nmda += weight * conn.mul_syn_slow;
                        }
                        if pre_type.contains(GroupType::TARGET_GABA_A) {
                            sum_gaba_a += -weight * conn.mul_syn_fast;
                        }
                        if pre_type.contains(GroupType::TARGET_GABA_B) {
                            sum_gaba_b += -weight * conn.mul_syn_slow;
                        }
                    } else {
                        sum_current += weight;
                    }
                });

                partition.incoming.clear_word(row, local);
            }

            match &conductances {
                Some(conductances) => {
                    partition.g_ampa[local] += sum_ampa;
                    partition.g_gaba_a[local] += sum_gaba_a;

                    if conductances.rise_nmda.is_some() {
                        partition.g_nmda_r[local] += sum_nmda * conductances.scale_nmda;
                        partition.g_nmda_d[local] += sum_nmda * conductances.scale_nmda;
                    } else {
                        partition.g_nmda[local] += sum_nmda;
                    }

                    if conductances.rise_gaba_b.is_some() {
                        partition.g_gaba_b_r[local] += sum_gaba_b * conductances.scale_gaba_b;
                        partition.g_gaba_b_d[local] += sum_gaba_b * conductances.scale_gaba_b;
                    } else {
                        partition.g_gaba_b[local] += sum_gaba_b;
                    }
                }
                None => {
                    partition.current[local] += sum_current;
                }
            }
        }
    }
}
