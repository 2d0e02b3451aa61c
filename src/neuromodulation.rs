use std::sync::atomic::AtomicU32;

use crate::firing_table::TICKS_PER_SECOND;
use crate::util::{atomic_f32_add, atomic_f32_load, atomic_f32_store};

/// Dopamine released into the target group per delivered spike of a
/// DA-sourcing neuron.
pub const DA_RELEASE_PER_SPIKE: f32 = 0.04;

#[derive(Debug, Clone, Copy)]
pub struct GroupModulation {
    pub base_dopamine: f32,
    pub dopamine_decay: f32,
    /// Group runs dopamine-modulated STDP and therefore decays actively.
    pub da_modulated: bool,
}

/// Per-group neuromodulator concentrations. Deliveries from TARGET_DA sources
/// add concurrently from any worker; decay runs host-side between ticks.
pub struct DopamineField {
    concentrations: Vec<AtomicU32>,
    modulation: Vec<GroupModulation>,
}

impl DopamineField {
    pub fn new(modulation: Vec<GroupModulation>) -> Self {
        let concentrations = modulation
            .iter()
            .map(|m| AtomicU32::new(m.base_dopamine.to_bits()))
            .collect();

        Self {
            concentrations,
            modulation,
        }
    }

    pub fn release(&self, group_id: usize) {
        atomic_f32_add(&self.concentrations[group_id], DA_RELEASE_PER_SPIKE);
    }

    pub fn concentration(&self, group_id: usize) -> f32 {
        atomic_f32_load(&self.concentrations[group_id])
    }

    /// Relaxation step of GROUP_STATE_UPDATE: concentrations above baseline
    /// decay geometrically toward it.
    pub fn decay(&self) {
        for (cell, m) in self.concentrations.iter().zip(&self.modulation) {
            if m.da_modulated {
                let concentration = atomic_f32_load(cell);
                if concentration > m.base_dopamine {
                    atomic_f32_store(cell, concentration * m.dopamine_decay);
                }
            }
        }
    }

    pub fn num_groups(&self) -> usize {
        self.modulation.len()
    }
}

/// Per-ms circular log of group concentrations, one second deep.
pub struct ModulatorTrace {
    traces: Vec<Vec<f32>>,
}

impl ModulatorTrace {
    pub fn new(num_groups: usize) -> Self {
        Self {
            traces: vec![vec![0.0; TICKS_PER_SECOND]; num_groups],
        }
    }

    pub fn record(&mut self, t: usize, field: &DopamineField) {
        let slot = t % TICKS_PER_SECOND;
        for (group_id, trace) in self.traces.iter_mut().enumerate() {
            trace[slot] = field.concentration(group_id);
        }
    }

    pub fn trace(&self, group_id: usize) -> &[f32] {
        &self.traces[group_id]
    }
}
