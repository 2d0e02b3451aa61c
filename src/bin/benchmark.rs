use std::sync::Arc;
use std::time::Instant;

use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Poisson;

use synfire::instance::{self, TickInput};
use synfire::params::{
    ConductanceParams, ConnectionParams, EStdpCurve, EStdpParams, ExpCurveParams, GroupParams,
    GroupType, InitialSynWeight, IzhikevichParams, SimulationParams, StdpType,
};

const NUM_EXC: usize = 800;
const NUM_INH: usize = 200;
const NUM_INPUT: usize = 100;

fn get_params() -> SimulationParams {
    let mut params = SimulationParams::default();
    params.conductances = Some(ConductanceParams::default());

    let mut exc = GroupParams::default();
    exc.name = "exc".to_string();
    exc.num_neurons = NUM_EXC;
    exc.izhikevich = IzhikevichParams::regular_spiking();
    exc.estdp = Some(EStdpParams {
        curve: EStdpCurve::Exponential(ExpCurveParams {
            alpha_plus: 0.001,
            tau_plus_inv: 0.05,
            alpha_minus: -0.0012,
            tau_minus_inv: 0.05,
        }),
        stdp_type: StdpType::Standard,
    });
    params.groups.push(exc);

    let mut inh = GroupParams::default();
    inh.name = "inh".to_string();
    inh.num_neurons = NUM_INH;
    inh.group_type = GroupType::TARGET_GABA_A;
    inh.izhikevich = IzhikevichParams::fast_spiking();
    params.groups.push(inh);

    let mut input = GroupParams::default();
    input.name = "input".to_string();
    input.num_neurons = NUM_INPUT;
    input.group_type = GroupType::POISSON | GroupType::TARGET_AMPA;
    params.groups.push(input);

    let mut exc_exc = ConnectionParams::defaults_for_group_ids(0, 0);
    exc_exc.connect_density = 0.1;
    exc_exc.initial_syn_weight = InitialSynWeight::Uniform(6.0);
    exc_exc.max_syn_weight = 10.0;
    exc_exc.delay_min = 1;
    exc_exc.delay_max = 20;
    exc_exc.plastic = true;
    exc_exc.allow_self_connection = false;
    params.connections.push(exc_exc);

    let mut exc_inh = ConnectionParams::defaults_for_group_ids(0, 1);
    exc_inh.connect_density = 0.25;
    exc_inh.initial_syn_weight = InitialSynWeight::Uniform(6.0);
    params.connections.push(exc_inh);

    let mut inh_exc = ConnectionParams::defaults_for_group_ids(1, 0);
    inh_exc.connect_density = 0.25;
    inh_exc.initial_syn_weight = InitialSynWeight::Constant(5.0);
    params.connections.push(inh_exc);

    let mut input_exc = ConnectionParams::defaults_for_group_ids(2, 0);
    input_exc.connect_density = 0.25;
    input_exc.initial_syn_weight = InitialSynWeight::Constant(8.0);
    params.connections.push(input_exc);

    params
}

const SIMULATED_TICKS: usize = 10_000;

fn main() {
    let mut instance = instance::create_instance(get_params()).unwrap();

    let mut rng = StdRng::seed_from_u64(0);
    let rate_dist = Poisson::new(15.0).unwrap();
    let rates: Vec<f32> = (0..NUM_INPUT)
        .map(|_| rate_dist.sample(&mut rng) as f32)
        .collect();

    let mut tick_input = TickInput::new();
    tick_input.poisson_rates = Some(Arc::new(rates));

    let mut total_spikes = 0usize;
    let mut total_transmissions = 0usize;
    // order-sensitive digest of the spike train, to compare runs
    let mut spike_digest = 0u64;

    let started = Instant::now();

    for _ in 0..SIMULATED_TICKS {
        let tick_result = instance.tick(&tick_input).unwrap();

        total_spikes += tick_result.spiking_nids.len();
        total_transmissions += tick_result.synaptic_transmission_count;

        spike_digest = tick_result
            .spiking_nids
            .iter()
            .fold(spike_digest, |digest, nid| {
                digest.wrapping_mul(31).wrapping_add(*nid as u64)
            });
    }

    let seconds = started.elapsed().as_secs_f64();

    eprintln!(
        "simulated {} ticks in {:.3} s ({:.0} ticks/s)",
        SIMULATED_TICKS,
        seconds,
        SIMULATED_TICKS as f64 / seconds
    );
    eprintln!(
        "mean activity: {:.2} spikes/tick across {} neurons",
        total_spikes as f64 / SIMULATED_TICKS as f64,
        instance.get_num_neurons()
    );
    eprintln!(
        "delivered {} synaptic transmissions ({:.3e}/s)",
        total_transmissions,
        total_transmissions as f64 / seconds
    );
    eprintln!("spike digest: {:016x}", spike_digest);
}
