use std::sync::Arc;

use crate::partition::Partition;

/// Cadenced application of the accumulated weight derivatives.
///
/// The effective derivative is the accumulated `wt_change` scaled to the
/// update cadence, optionally gated by the group's dopamine concentration,
/// folded through the homeostatic scaling term, and finally clipped so the
/// weight keeps the sign of its saturation bound.
pub fn run(partition: &mut Partition) {
    let network = Arc::clone(&partition.network);

    if network.config.testing_phase {
        return;
    }

    let scale_factor = network.config.stdp_scale_factor;
    let wt_change_decay = network.config.wt_change_decay;

    for chunk_index in 0..partition.chunks.len() {
        let chunk = partition.chunks[chunk_index];
        let group = &network.groups[chunk.group_id()];

        if group.group_type.is_poisson() || group.fixed_input_weights {
            continue;
        }

        let homeostasis = group.homeostasis;
        let grp_da = if group.modulation.da_modulated {
            Some(partition.shared.dopamine.concentration(chunk.group_id()))
        } else {
            None
        };

        for post_nid in chunk.start_n()..chunk.end_n() {
            let local = partition.local(post_nid);
            let block_start = network.cum_pre[post_nid];

            for slot in 0..network.n_pre[post_nid] as usize {
                let syn_global = block_start + slot;

                let conn = &network.connections[network.conn_ids_pre[syn_global] as usize];
                if !conn.plastic {
                    continue;
                }

                let syn_local = partition.syn_index(post_nid, slot);

                let mut eff = scale_factor * partition.wt_change[syn_local];
                if let Some(grp_da) = grp_da {
                    eff *= grp_da;
                }

                let weight = partition.wt[syn_local];

                let delta = match &homeostasis {
                    Some(homeostasis) => {
                        let diff = 1.0
                            - partition.avg_firing[local] * network.base_firing_inv[post_nid];
                        let factor = network.base_firing[post_nid]
                            / homeostasis.avg_time_scale
                            / (1.0 + 50.0 * diff.abs());
                        (diff * weight * homeostasis.scale + eff) * factor
                    }
                    None => eff,
                };

                let max_weight = partition.max_syn_wt[syn_local];
                let updated = weight + delta;

                partition.wt[syn_local] = if max_weight > 0.0 {
                    updated.clamp(0.0, max_weight)
                } else {
                    updated.clamp(max_weight, 0.0)
                };

                partition.wt_change[syn_local] *= wt_change_decay;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::build_network;
    use crate::partition::{create_partitions, SharedState};
    use crate::params::{
        ConnectionParams, EStdpCurve, EStdpParams, ExpCurveParams, GroupParams, GroupType,
        HomeostasisParams, InitialSynWeight, SimulationParams, StdpType,
    };
    use float_cmp::assert_approx_eq;

    fn exp_estdp(stdp_type: StdpType) -> EStdpParams {
        EStdpParams {
            curve: EStdpCurve::Exponential(ExpCurveParams {
                alpha_plus: 0.01,
                tau_plus_inv: 0.05,
                alpha_minus: -0.012,
                tau_minus_inv: 0.05,
            }),
            stdp_type,
        }
    }

    fn pair_params(inhibitory_source: bool) -> SimulationParams {
        let mut params = SimulationParams::default();

        let mut post = GroupParams::default();
        post.name = "post".to_string();
        post.estdp = Some(exp_estdp(StdpType::Standard));
        params.groups.push(post);

        let mut pre = GroupParams::default();
        pre.name = "pre".to_string();
        if inhibitory_source {
            pre.group_type = GroupType::TARGET_GABA_A;
        }
        params.groups.push(pre);

        let mut conn = ConnectionParams::defaults_for_group_ids(1, 0);
        conn.initial_syn_weight = InitialSynWeight::Constant(5.0);
        conn.max_syn_weight = 20.0;
        conn.plastic = true;
        params.connections.push(conn);

        params
    }

    fn make_partition(params: &SimulationParams) -> Partition {
        let network = Arc::new(build_network(params));
        let shared = Arc::new(SharedState::new(&network));
        create_partitions(&network, &shared, 1).remove(0)
    }

    #[test]
    fn applies_scaled_derivative() {
        let mut partition = make_partition(&pair_params(false));

        partition.wt_change[0] = 1.5;
        run(&mut partition);

        // cadence 1000 ms, scale factor 1
        assert_approx_eq!(f32, partition.wt[0], 6.5);
        assert_approx_eq!(f32, partition.wt_change[0], 1.5 * 0.9);
    }

    #[test]
    fn excitatory_weight_clipped_to_ceiling() {
        let mut partition = make_partition(&pair_params(false));

        partition.wt_change[0] = 100.0;
        run(&mut partition);

        assert_approx_eq!(f32, partition.wt[0], 20.0);
    }

    #[test]
    fn excitatory_weight_clipped_to_zero() {
        let mut partition = make_partition(&pair_params(false));

        partition.wt_change[0] = -100.0;
        run(&mut partition);

        assert_approx_eq!(f32, partition.wt[0], 0.0);
    }

    #[test]
    fn inhibitory_weight_clipped_to_saturation() {
        let mut params = pair_params(true);
        params.connections[0].max_syn_weight = 20.0;
        params.connections[0].initial_syn_weight = InitialSynWeight::Constant(19.5);

        let mut partition = make_partition(&params);

        // inhibitory synapse carries negative weight and saturation
        assert_approx_eq!(f32, partition.wt[0], -19.5);
        assert_approx_eq!(f32, partition.max_syn_wt[0], -20.0);

        // a derivative that would push the weight to -25
        partition.wt_change[0] = -5.5;
        run(&mut partition);

        assert_approx_eq!(f32, partition.wt[0], -20.0);
    }

    #[test]
    fn inhibitory_weight_clipped_at_zero() {
        let mut partition = make_partition(&pair_params(true));

        partition.wt_change[0] = 100.0;
        run(&mut partition);

        assert_approx_eq!(f32, partition.wt[0], 0.0);
    }

    #[test]
    fn non_plastic_synapses_untouched() {
        let mut params = pair_params(false);
        params.connections[0].plastic = false;

        let mut partition = make_partition(&params);

        partition.wt_change[0] = 1.0;
        run(&mut partition);

        assert_approx_eq!(f32, partition.wt[0], 5.0);
        assert_approx_eq!(f32, partition.wt_change[0], 1.0);
    }

    #[test]
    fn fixed_input_group_untouched() {
        let mut params = pair_params(false);
        params.groups[0].fixed_input_weights = true;

        let mut partition = make_partition(&params);

        partition.wt_change[0] = 1.0;
        run(&mut partition);

        assert_approx_eq!(f32, partition.wt[0], 5.0);
    }

    #[test]
    fn testing_phase_freezes_weights() {
        let mut params = pair_params(false);
        params.testing_phase = true;

        let mut partition = make_partition(&params);

        partition.wt_change[0] = 1.0;
        run(&mut partition);

        assert_approx_eq!(f32, partition.wt[0], 5.0);
        assert_approx_eq!(f32, partition.wt_change[0], 1.0);
    }

    #[test]
    fn homeostasis_pulls_toward_target_rate() {
        let mut params = pair_params(false);
        params.groups[0].homeostasis = Some(HomeostasisParams {
            scale: 0.1,
            avg_time_scale: 10.0,
            base_firing: 10.0,
        });

        let mut partition = make_partition(&params);

        // neuron firing below target: diff > 0 pushes the weight up
        partition.avg_firing[0] = 5.0;
        run(&mut partition);

        let diff = 1.0f32 - 5.0 / 10.0;
        let factor = 10.0 / 10.0 / (1.0 + 50.0 * diff.abs());
        let expected = 5.0 + diff * 5.0 * 0.1 * factor;

        assert_approx_eq!(f32, partition.wt[0], expected);

        // and above target: diff < 0 pushes it down
        let mut partition = make_partition(&params);
        partition.avg_firing[0] = 20.0;
        run(&mut partition);

        assert!(partition.wt[0] < 5.0);
    }

    #[test]
    fn dopamine_gates_the_derivative() {
        let mut params = pair_params(false);
        params.groups[0].estdp = Some(exp_estdp(StdpType::DopamineModulated));

        let network = Arc::new(build_network(&params));
        let shared = Arc::new(SharedState::new(&network));
        let mut partition = create_partitions(&network, &shared, 1).remove(0);

        // baseline concentration 1.0 plus released dopamine
        for _ in 0..5 {
            shared.dopamine.release(0);
        }
        let grp_da = shared.dopamine.concentration(0);

        partition.wt_change[0] = 0.5;
        run(&mut partition);

        assert_approx_eq!(f32, partition.wt[0], 5.0 + grp_da * 0.5);
    }
}
