use std::sync::Arc;

use crate::params::ConductanceParams;
use crate::partition::Partition;

/// Integration sub-steps per simulated millisecond.
pub const COND_INTEGRATION_SCALE: usize = 2;

pub const VOLTAGE_CEIL: f32 = 30.0;
pub const VOLTAGE_FLOOR: f32 = -90.0;

/// First kernel of the tick: conductances of regular COBA neurons decay one
/// step and STP-enabled neurons advance their ring slot.
pub fn decay_conductances_and_stp(partition: &mut Partition, t: usize) {
    let network = Arc::clone(&partition.network);
    let conductances = network.config.conductances.clone();

    for chunk_index in 0..partition.chunks.len() {
        let chunk = partition.chunks[chunk_index];
        let group = &network.groups[chunk.group_id()];

        let decay = conductances
            .as_ref()
            .filter(|_| !group.group_type.is_poisson());

        for nid in chunk.start_n()..chunk.end_n() {
            let local = partition.local(nid);

            if let Some(conductances) = decay {
                decay_neuron_conductances(partition, local, conductances);
            }

            if let Some(stp_params) = &group.stp {
                partition.shared.stp.advance(t, nid, stp_params);
            }
        }
    }
}

fn decay_neuron_conductances(
    partition: &mut Partition,
    local: usize,
    conductances: &ConductanceParams,
) {
    partition.g_ampa[local] *= conductances.decay_ampa;
    partition.g_gaba_a[local] *= conductances.decay_gaba_a;

    if let Some(rise_nmda) = conductances.rise_nmda {
        partition.g_nmda_r[local] *= rise_nmda;
        partition.g_nmda_d[local] *= conductances.decay_nmda;
    } else {
        partition.g_nmda[local] *= conductances.decay_nmda;
    }

    if let Some(rise_gaba_b) = conductances.rise_gaba_b {
        partition.g_gaba_b_r[local] *= rise_gaba_b;
        partition.g_gaba_b_d[local] *= conductances.decay_gaba_b;
    } else {
        partition.g_gaba_b[local] *= conductances.decay_gaba_b;
    }
}

/// Izhikevich state update over the partition's regular neurons. COBA
/// assembles the synaptic current from the channel conductances each
/// sub-step; CUBA consumes the accumulated current and zeroes it. The voltage
/// is clamped into `[-90, 30]` and a ceiling hit ends the sub-step loop so
/// the spike is picked up by the next tick's detection pass.
pub fn integrate(partition: &mut Partition) {
    let network = Arc::clone(&partition.network);
    let conductances = network.config.conductances.clone();

    for chunk_index in 0..partition.chunks.len() {
        let chunk = partition.chunks[chunk_index];
        let group = &network.groups[chunk.group_id()];

        if group.group_type.is_poisson() {
            continue;
        }

        let izh = group.izhikevich;
        let homeostasis = group.homeostasis;

        for nid in chunk.start_n()..chunk.end_n() {
            let local = partition.local(nid);

            let mut v = partition.voltage[local];
            let mut u = partition.recovery[local];
            let ext = partition.ext_current[local];
            let mut total_input = 0.0f32;

            for _ in 0..COND_INTEGRATION_SCALE {
                let i_syn = match &conductances {
                    Some(conductances) => synaptic_current(partition, local, v, conductances),
                    None => partition.current[local],
                };
                total_input = i_syn;

                v += ((0.04 * v + 5.0) * v + 140.0 - u + i_syn + ext)
                    / COND_INTEGRATION_SCALE as f32;
                u += izh.a * (izh.b * v - u) / COND_INTEGRATION_SCALE as f32;

                if v > VOLTAGE_CEIL {
                    v = VOLTAGE_CEIL;
                    break;
                }
                if v < VOLTAGE_FLOOR {
                    v = VOLTAGE_FLOOR;
                }
            }

            partition.voltage[local] = v;
            partition.recovery[local] = u;

            if conductances.is_some() {
                // kept for observation
                partition.current[local] = total_input;
            } else {
                partition.current[local] = 0.0;
            }

            if let Some(homeostasis) = &homeostasis {
                partition.avg_firing[local] *= homeostasis.avg_time_scale_decay;
            }
        }
    }
}

fn synaptic_current(
    partition: &Partition,
    local: usize,
    v: f32,
    conductances: &ConductanceParams,
) -> f32 {
    let nmda_tmp = ((v + 80.0) / 60.0) * ((v + 80.0) / 60.0);

    let g_nmda = if conductances.rise_nmda.is_some() {
        partition.g_nmda_d[local] - partition.g_nmda_r[local]
    } else {
        partition.g_nmda[local]
    };

    let g_gaba_b = if conductances.rise_gaba_b.is_some() {
        partition.g_gaba_b_d[local] - partition.g_gaba_b_r[local]
    } else {
        partition.g_gaba_b[local]
    };

    -(partition.g_ampa[local] * v
        + g_nmda * nmda_tmp / (1.0 + nmda_tmp) * v
        + partition.g_gaba_a[local] * (v + 70.0)
        + g_gaba_b * (v + 90.0))
}
