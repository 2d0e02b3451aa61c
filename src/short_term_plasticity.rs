use std::sync::atomic::AtomicU32;

use crate::params::StpParams;
use crate::util::{atomic_f32_load, atomic_f32_store, atomic_f32_vec};

/// Rolling short-term plasticity state: release probability `u` and resource
/// `x` per neuron, with one time slot per tick over a horizon of
/// `max_delay + 1` slots.
///
/// Values sit in relaxed atomics because the owning partition writes them in
/// the detection phase while any partition may read them during conductance
/// accumulation of the following phase.
pub struct StpRing {
    num_slots: usize,
    pitch: usize,
    stpu: Vec<AtomicU32>,
    stpx: Vec<AtomicU32>,
}

impl StpRing {
    pub fn new(max_delay: usize, num_neurons: usize) -> Self {
        let num_slots = max_delay + 1;

        Self {
            num_slots,
            pitch: num_neurons,
            stpu: atomic_f32_vec(num_slots * num_neurons, 0.0),
            stpx: atomic_f32_vec(num_slots * num_neurons, 1.0),
        }
    }

    fn slot(&self, t: usize) -> usize {
        t % self.num_slots
    }

    fn prev_slot(&self, t: usize) -> usize {
        (t + self.num_slots - 1) % self.num_slots
    }

    /// One decay step: `u` relaxes toward zero, `x` recovers toward one.
    pub fn advance(&self, t: usize, nid: usize, params: &StpParams) {
        let plus = self.slot(t) * self.pitch + nid;
        let minus = self.prev_slot(t) * self.pitch + nid;

        let u_prev = atomic_f32_load(&self.stpu[minus]);
        let x_prev = atomic_f32_load(&self.stpx[minus]);

        atomic_f32_store(&self.stpu[plus], u_prev * (1.0 - params.tau_u_inv));
        atomic_f32_store(&self.stpx[plus], x_prev + (1.0 - x_prev) * params.tau_x_inv);
    }

    /// Spike augmentation on top of this tick's decayed values: utilization
    /// jumps, resources are consumed in proportion.
    pub fn on_spike(&self, t: usize, nid: usize, params: &StpParams) {
        let plus = self.slot(t) * self.pitch + nid;
        let minus = self.prev_slot(t) * self.pitch + nid;

        let u_prev = atomic_f32_load(&self.stpu[minus]);
        let x_prev = atomic_f32_load(&self.stpx[minus]);

        let u_now = atomic_f32_load(&self.stpu[plus]) + params.u * (1.0 - u_prev);
        atomic_f32_store(&self.stpu[plus], u_now);

        let x_now = atomic_f32_load(&self.stpx[plus]) - u_now * x_prev;
        atomic_f32_store(&self.stpx[plus], x_now);
    }

    /// Synaptic efficacy factor `A * x[t-1] * u[t]` for a presynaptic neuron.
    pub fn efficacy(&self, t: usize, nid: usize, params: &StpParams) -> f32 {
        let plus = self.slot(t) * self.pitch + nid;
        let minus = self.prev_slot(t) * self.pitch + nid;

        params.a * atomic_f32_load(&self.stpx[minus]) * atomic_f32_load(&self.stpu[plus])
    }

    pub fn u(&self, t: usize, nid: usize) -> f32 {
        atomic_f32_load(&self.stpu[self.slot(t) * self.pitch + nid])
    }

    pub fn x(&self, t: usize, nid: usize) -> f32 {
        atomic_f32_load(&self.stpx[self.slot(t) * self.pitch + nid])
    }
}
