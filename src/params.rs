use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use simple_error::SimpleError;

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct SimulationParams {
    pub groups: Vec<GroupParams>,
    pub connections: Vec<ConnectionParams>,
    /// `Some` selects conductance-based (COBA) synapses, `None` current-based
    /// (CUBA).
    pub conductances: Option<ConductanceParams>,
    /// Per-second firing-table ceilings. Defaults to 1000 spikes per neuron
    /// per second when unset.
    pub max_spikes_d1: Option<usize>,
    pub max_spikes_d2: Option<usize>,
    pub weight_update: WeightUpdateParams,
    /// Freezes all plasticity so recall runs leave weights untouched.
    pub testing_phase: bool,
    pub technical_params: TechnicalParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupParams {
    pub name: String,
    pub num_neurons: usize,
    pub group_type: GroupType,
    pub izhikevich: IzhikevichParams,
    pub estdp: Option<EStdpParams>,
    pub istdp: Option<IStdpParams>,
    pub stp: Option<StpParams>,
    pub homeostasis: Option<HomeostasisParams>,
    pub base_dopamine: f32,
    pub dopamine_decay: f32,
    /// Excludes all incoming synapses of this group from weight updates.
    pub fixed_input_weights: bool,
    /// Poisson group driven by an externally supplied spike bit vector
    /// instead of a rate draw.
    pub is_spike_generator: bool,
}

/// Bitmask describing what a group's neurons are and which post-synaptic
/// channels their spikes feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupType(u32);

impl GroupType {
    pub const POISSON: GroupType = GroupType(1);
    pub const TARGET_AMPA: GroupType = GroupType(1 << 1);
    pub const TARGET_NMDA: GroupType = GroupType(1 << 2);
    pub const TARGET_GABA_A: GroupType = GroupType(1 << 3);
    pub const TARGET_GABA_B: GroupType = GroupType(1 << 4);
    pub const TARGET_DA: GroupType = GroupType(1 << 5);

    pub const EXCITATORY: GroupType = GroupType(1 << 1 | 1 << 2);
    pub const INHIBITORY: GroupType = GroupType(1 << 3 | 1 << 4);

    pub fn contains(self, flags: GroupType) -> bool {
        self.0 & flags.0 == flags.0
    }

    pub fn intersects(self, flags: GroupType) -> bool {
        self.0 & flags.0 != 0
    }

    pub fn is_poisson(self) -> bool {
        self.contains(GroupType::POISSON)
    }

    pub fn is_inhibitory(self) -> bool {
        self.intersects(GroupType::INHIBITORY)
    }
}

impl BitOr for GroupType {
    type Output = GroupType;

    fn bitor(self, rhs: GroupType) -> GroupType {
        GroupType(self.0 | rhs.0)
    }
}

impl BitOrAssign for GroupType {
    fn bitor_assign(&mut self, rhs: GroupType) {
        self.0 |= rhs.0;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IzhikevichParams {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
}

impl IzhikevichParams {
    pub fn regular_spiking() -> Self {
        Self {
            a: 0.02,
            b: 0.2,
            c: -65.0,
            d: 8.0,
        }
    }

    pub fn fast_spiking() -> Self {
        Self {
            a: 0.1,
            b: 0.2,
            c: -65.0,
            d: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EStdpParams {
    pub curve: EStdpCurve,
    pub stdp_type: StdpType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IStdpParams {
    pub curve: IStdpCurve,
    pub stdp_type: StdpType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StdpType {
    Standard,
    DopamineModulated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EStdpCurve {
    Exponential(ExpCurveParams),
    TimingBased(TimingBasedCurveParams),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IStdpCurve {
    Exponential(ExpCurveParams),
    Pulse(PulseCurveParams),
}

/// `alpha_minus` carries its sign: depression contributions are negative for
/// Hebbian curves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExpCurveParams {
    pub alpha_plus: f32,
    pub tau_plus_inv: f32,
    pub alpha_minus: f32,
    pub tau_minus_inv: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimingBasedCurveParams {
    pub alpha_plus: f32,
    pub tau_plus_inv: f32,
    pub alpha_minus: f32,
    pub tau_minus_inv: f32,
    pub gamma: f32,
    pub omega: f32,
    pub kappa: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PulseCurveParams {
    pub beta_ltp: f32,
    pub beta_ltd: f32,
    pub lambda: f32,
    pub delta: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StpParams {
    /// Utilization increment on each presynaptic spike.
    pub u: f32,
    /// Efficacy scale applied on top of `x * u`.
    pub a: f32,
    pub tau_u_inv: f32,
    pub tau_x_inv: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HomeostasisParams {
    pub scale: f32,
    /// Averaging horizon in seconds.
    pub avg_time_scale: f32,
    /// Target firing rate in Hz, also the initial value of the per-neuron
    /// average.
    pub base_firing: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub from_group_id: usize,
    pub to_group_id: usize,
    pub connect_density: f64,
    pub initial_syn_weight: InitialSynWeight,
    /// Weight magnitude ceiling; the builder applies the presynaptic group's
    /// sign.
    pub max_syn_weight: f32,
    pub delay_min: usize,
    pub delay_max: usize,
    pub plastic: bool,
    pub mul_syn_fast: f32,
    pub mul_syn_slow: f32,
    pub allow_self_connection: bool,
}

impl ConnectionParams {
    pub fn defaults_for_group_ids(from_group_id: usize, to_group_id: usize) -> Self {
        Self {
            from_group_id,
            to_group_id,
            connect_density: 1.0,
            initial_syn_weight: InitialSynWeight::Constant(5.0),
            max_syn_weight: 10.0,
            delay_min: 1,
            delay_max: 1,
            plastic: false,
            mul_syn_fast: 1.0,
            mul_syn_slow: 1.0,
            allow_self_connection: true,
        }
    }
}

/// Starting weight magnitude per synapse: either one shared value or a
/// uniform draw from `[0, bound]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InitialSynWeight {
    Uniform(f32),
    Constant(f32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConductanceParams {
    pub decay_ampa: f32,
    pub decay_nmda: f32,
    pub decay_gaba_a: f32,
    pub decay_gaba_b: f32,
    /// Enables the rise/decay NMDA pair; the effective conductance becomes
    /// the difference of the two traces.
    pub rise_nmda: Option<f32>,
    pub scale_nmda: f32,
    pub rise_gaba_b: Option<f32>,
    pub scale_gaba_b: f32,
}

impl Default for ConductanceParams {
    fn default() -> Self {
        Self {
            decay_ampa: 1.0 - 1.0 / 5.0,
            decay_nmda: 1.0 - 1.0 / 150.0,
            decay_gaba_a: 1.0 - 1.0 / 6.0,
            decay_gaba_b: 1.0 - 1.0 / 150.0,
            rise_nmda: None,
            scale_nmda: 1.0,
            rise_gaba_b: None,
            scale_gaba_b: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightUpdateParams {
    /// Cadence of weight application in ms; the effective derivative is
    /// scaled by `interval_ms / 1000`.
    pub interval_ms: usize,
    pub wt_change_decay: f32,
}

impl Default for WeightUpdateParams {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            wt_change_decay: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalParams {
    pub num_threads: Option<usize>,
    pub pin_threads: bool,
    pub seed_override: Option<u64>,
    /// Chunk width of the static-load partition.
    pub load_buffer_size: usize,
}

impl Default for TechnicalParams {
    fn default() -> Self {
        Self {
            num_threads: Some(1),
            pin_threads: false,
            seed_override: None,
            load_buffer_size: 128,
        }
    }
}

impl Default for GroupParams {
    fn default() -> Self {
        Self {
            name: String::new(),
            num_neurons: 1,
            group_type: GroupType::EXCITATORY,
            izhikevich: IzhikevichParams::regular_spiking(),
            estdp: None,
            istdp: None,
            stp: None,
            homeostasis: None,
            base_dopamine: 1.0,
            dopamine_decay: 0.99,
            fixed_input_weights: false,
            is_spike_generator: false,
        }
    }
}

pub fn validate_simulation_params(params: &SimulationParams) -> Result<(), SimpleError> {
    if params.groups.is_empty() {
        return Err(SimpleError::new("at least one group is required"));
    }

    if params.groups.len() > u16::MAX as usize {
        return Err(SimpleError::new("too many groups"));
    }

    if params.connections.len() > u16::MAX as usize {
        return Err(SimpleError::new("too many connections"));
    }

    let mut seen_regular_after_poisson = false;
    for group_params in &params.groups {
        if group_params.group_type.is_poisson() {
            seen_regular_after_poisson = true;
        } else if seen_regular_after_poisson {
            return Err(SimpleError::new(
                "Poisson groups must be declared after all regular groups",
            ));
        }

        validate_group_params(group_params)?;
    }

    for conn_params in &params.connections {
        if conn_params.from_group_id >= params.groups.len() {
            return Err(SimpleError::new(format!(
                "invalid from_group_id: {}",
                conn_params.from_group_id
            )));
        }

        if conn_params.to_group_id >= params.groups.len() {
            return Err(SimpleError::new(format!(
                "invalid to_group_id: {}",
                conn_params.to_group_id
            )));
        }

        if params.groups[conn_params.to_group_id]
            .group_type
            .is_poisson()
        {
            return Err(SimpleError::new(
                "Poisson groups cannot be the target of a connection",
            ));
        }

        validate_connection_params(conn_params)?;
    }

    if let Some(conductances) = &params.conductances {
        validate_conductance_params(conductances)?;
    }

    validate_weight_update_params(&params.weight_update)?;
    validate_technical_params(&params.technical_params)?;

    if let Some(max_spikes_d1) = params.max_spikes_d1 {
        if max_spikes_d1 == 0 {
            return Err(SimpleError::new("max_spikes_d1 must be strictly positive"));
        }
    }

    if let Some(max_spikes_d2) = params.max_spikes_d2 {
        if max_spikes_d2 == 0 {
            return Err(SimpleError::new("max_spikes_d2 must be strictly positive"));
        }
    }

    Ok(())
}

fn validate_group_params(group_params: &GroupParams) -> Result<(), SimpleError> {
    if group_params.num_neurons == 0 {
        return Err(SimpleError::new("num_neurons must be strictly positive"));
    }

    if group_params.group_type.intersects(GroupType::EXCITATORY)
        && group_params.group_type.intersects(GroupType::INHIBITORY)
    {
        return Err(SimpleError::new(
            "a group cannot target both excitatory and inhibitory channels",
        ));
    }

    if group_params.is_spike_generator && !group_params.group_type.is_poisson() {
        return Err(SimpleError::new(
            "spike generator groups must have the POISSON type flag",
        ));
    }

    if group_params.group_type.is_poisson()
        && (group_params.estdp.is_some() || group_params.istdp.is_some())
    {
        return Err(SimpleError::new(
            "Poisson groups cannot have STDP on their inputs",
        ));
    }

    if group_params.base_dopamine < 0.0 {
        return Err(SimpleError::new("base_dopamine must not be negative"));
    }

    if group_params.dopamine_decay <= 0.0 || group_params.dopamine_decay >= 1.0 {
        return Err(SimpleError::new("dopamine_decay must be in (0, 1)"));
    }

    if let Some(estdp) = &group_params.estdp {
        match &estdp.curve {
            EStdpCurve::Exponential(curve) => validate_exp_curve(curve)?,
            EStdpCurve::TimingBased(curve) => validate_timing_based_curve(curve)?,
        }
    }

    if let Some(istdp) = &group_params.istdp {
        match &istdp.curve {
            IStdpCurve::Exponential(curve) => validate_exp_curve(curve)?,
            IStdpCurve::Pulse(curve) => validate_pulse_curve(curve)?,
        }
    }

    if let Some(stp) = &group_params.stp {
        validate_stp_params(stp)?;
    }

    if let Some(homeostasis) = &group_params.homeostasis {
        validate_homeostasis_params(homeostasis)?;
    }

    Ok(())
}

fn validate_exp_curve(curve: &ExpCurveParams) -> Result<(), SimpleError> {
    if curve.tau_plus_inv <= 0.0 || curve.tau_minus_inv <= 0.0 {
        return Err(SimpleError::new(
            "stdp curve: inverse time constants must be strictly positive",
        ));
    }

    if curve.alpha_plus < 0.0 {
        return Err(SimpleError::new("stdp curve: alpha_plus must not be negative"));
    }

    Ok(())
}

fn validate_timing_based_curve(curve: &TimingBasedCurveParams) -> Result<(), SimpleError> {
    validate_exp_curve(&ExpCurveParams {
        alpha_plus: curve.alpha_plus,
        tau_plus_inv: curve.tau_plus_inv,
        alpha_minus: curve.alpha_minus,
        tau_minus_inv: curve.tau_minus_inv,
    })?;

    if curve.gamma < 0.0 {
        return Err(SimpleError::new("stdp curve: gamma must not be negative"));
    }

    if curve.kappa < 0.0 {
        return Err(SimpleError::new("stdp curve: kappa must not be negative"));
    }

    Ok(())
}

fn validate_pulse_curve(curve: &PulseCurveParams) -> Result<(), SimpleError> {
    if curve.beta_ltp < 0.0 || curve.beta_ltd < 0.0 {
        return Err(SimpleError::new(
            "pulse curve: beta_ltp and beta_ltd must not be negative",
        ));
    }

    if curve.lambda > curve.delta {
        return Err(SimpleError::new(
            "pulse curve: lambda must not be greater than delta",
        ));
    }

    Ok(())
}

fn validate_stp_params(stp_params: &StpParams) -> Result<(), SimpleError> {
    if stp_params.u < 0.0 || stp_params.u > 1.0 {
        return Err(SimpleError::new("stp_params: u must be in [0, 1]"));
    }

    if stp_params.a <= 0.0 {
        return Err(SimpleError::new("stp_params: a must be strictly positive"));
    }

    if stp_params.tau_u_inv < 0.0 || stp_params.tau_u_inv > 1.0 {
        return Err(SimpleError::new("stp_params: tau_u_inv must be in [0, 1]"));
    }

    if stp_params.tau_x_inv < 0.0 || stp_params.tau_x_inv > 1.0 {
        return Err(SimpleError::new("stp_params: tau_x_inv must be in [0, 1]"));
    }

    Ok(())
}

fn validate_homeostasis_params(homeostasis: &HomeostasisParams) -> Result<(), SimpleError> {
    if homeostasis.base_firing <= 0.0 {
        return Err(SimpleError::new("base_firing must be strictly positive"));
    }

    if homeostasis.avg_time_scale <= 0.0 {
        return Err(SimpleError::new("avg_time_scale must be strictly positive"));
    }

    if homeostasis.scale < 0.0 {
        return Err(SimpleError::new(
            "homeostasis scale must not be negative",
        ));
    }

    Ok(())
}

fn validate_connection_params(conn_params: &ConnectionParams) -> Result<(), SimpleError> {
    if conn_params.connect_density <= 0.0 || conn_params.connect_density > 1.0 {
        return Err(SimpleError::new("connect_density must be in (0, 1]"));
    }

    if conn_params.delay_min == 0 {
        return Err(SimpleError::new("delay_min must be at least 1"));
    }

    if conn_params.delay_max < conn_params.delay_min {
        return Err(SimpleError::new(
            "delay_max must not be less than delay_min",
        ));
    }

    if conn_params.max_syn_weight <= 0.0 {
        return Err(SimpleError::new("max_syn_weight must be strictly positive"));
    }

    match conn_params.initial_syn_weight {
        InitialSynWeight::Uniform(bound) if bound <= 0.0 => {
            return Err(SimpleError::new(
                "uniform initial weight bound must be strictly positive",
            ));
        }
        InitialSynWeight::Constant(weight) if weight < 0.0 => {
            return Err(SimpleError::new(
                "constant initial weight must not be negative",
            ));
        }
        InitialSynWeight::Constant(weight) if weight > conn_params.max_syn_weight => {
            return Err(SimpleError::new(
                "initial weight must not exceed max_syn_weight",
            ));
        }
        _ => {}
    }

    if conn_params.mul_syn_fast < 0.0 || conn_params.mul_syn_slow < 0.0 {
        return Err(SimpleError::new(
            "synaptic channel multipliers must not be negative",
        ));
    }

    Ok(())
}

fn validate_conductance_params(conductances: &ConductanceParams) -> Result<(), SimpleError> {
    let decays = [
        conductances.decay_ampa,
        conductances.decay_nmda,
        conductances.decay_gaba_a,
        conductances.decay_gaba_b,
    ];

    if decays.iter().any(|decay| *decay <= 0.0 || *decay >= 1.0) {
        return Err(SimpleError::new("conductance decays must be in (0, 1)"));
    }

    for rise in [conductances.rise_nmda, conductances.rise_gaba_b]
        .iter()
        .flatten()
    {
        if *rise <= 0.0 || *rise >= 1.0 {
            return Err(SimpleError::new("conductance rises must be in (0, 1)"));
        }
    }

    if conductances.scale_nmda <= 0.0 || conductances.scale_gaba_b <= 0.0 {
        return Err(SimpleError::new(
            "conductance scales must be strictly positive",
        ));
    }

    Ok(())
}

fn validate_weight_update_params(weight_update: &WeightUpdateParams) -> Result<(), SimpleError> {
    if !matches!(weight_update.interval_ms, 10 | 100 | 1000) {
        return Err(SimpleError::new(
            "weight update interval_ms must be 10, 100 or 1000",
        ));
    }

    if weight_update.wt_change_decay < 0.0 || weight_update.wt_change_decay >= 1.0 {
        return Err(SimpleError::new("wt_change_decay must be in [0, 1)"));
    }

    Ok(())
}

fn validate_technical_params(technical_params: &TechnicalParams) -> Result<(), SimpleError> {
    if let Some(num_threads) = technical_params.num_threads {
        if num_threads == 0 {
            return Err(SimpleError::new("num_threads must be strictly positive"));
        }

        if num_cpus::get() < num_threads {
            return Err(SimpleError::new(
                "num_threads must not be greater than number of available CPUs",
            ));
        }
    }

    if technical_params.load_buffer_size == 0
        || technical_params.load_buffer_size > u16::MAX as usize
    {
        return Err(SimpleError::new(
            "load_buffer_size must be in [1, 65535]",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_util;

    #[test]
    fn valid_params() {
        let params = test_util::get_template_simulation_params();
        assert!(validate_simulation_params(&params).is_ok());
    }

    #[test]
    fn no_groups() {
        let params = SimulationParams::default();
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().as_str(), "at least one group is required");
    }

    #[test]
    fn zero_neurons() {
        let mut params = test_util::get_template_simulation_params();
        params.groups[0].num_neurons = 0;
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().as_str(),
            "num_neurons must be strictly positive"
        );
    }

    #[test]
    fn poisson_group_before_regular_group() {
        let mut params = test_util::get_template_simulation_params();
        params.groups[0].group_type = GroupType::POISSON | GroupType::TARGET_AMPA;
        params.groups[0].estdp = None;
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().as_str(),
            "Poisson groups must be declared after all regular groups"
        );
    }

    #[test]
    fn mixed_excitatory_inhibitory_targets() {
        let mut params = test_util::get_template_simulation_params();
        params.groups[0].group_type = GroupType::TARGET_AMPA | GroupType::TARGET_GABA_A;
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().as_str(),
            "a group cannot target both excitatory and inhibitory channels"
        );
    }

    #[test]
    fn regular_spike_generator() {
        let mut params = test_util::get_template_simulation_params();
        params.groups[0].is_spike_generator = true;
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().as_str(),
            "spike generator groups must have the POISSON type flag"
        );
    }

    #[test]
    fn stdp_on_poisson_group() {
        let mut params = test_util::get_template_simulation_params();
        let poisson_id = params.groups.len() - 1;
        params.groups[poisson_id].estdp = Some(EStdpParams {
            curve: EStdpCurve::Exponential(ExpCurveParams {
                alpha_plus: 0.01,
                tau_plus_inv: 0.05,
                alpha_minus: -0.012,
                tau_minus_inv: 0.05,
            }),
            stdp_type: StdpType::Standard,
        });
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().as_str(),
            "Poisson groups cannot have STDP on their inputs"
        );
    }

    #[test]
    fn dopamine_decay_out_of_range() {
        let mut params = test_util::get_template_simulation_params();
        params.groups[0].dopamine_decay = 1.0;
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().as_str(), "dopamine_decay must be in (0, 1)");
    }

    #[test]
    fn zero_tau_plus_inv() {
        let mut params = test_util::get_template_simulation_params();
        params.groups[0].estdp = Some(EStdpParams {
            curve: EStdpCurve::Exponential(ExpCurveParams {
                alpha_plus: 0.01,
                tau_plus_inv: 0.0,
                alpha_minus: -0.012,
                tau_minus_inv: 0.05,
            }),
            stdp_type: StdpType::Standard,
        });
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().as_str(),
            "stdp curve: inverse time constants must be strictly positive"
        );
    }

    #[test]
    fn pulse_lambda_greater_than_delta() {
        let mut params = test_util::get_template_simulation_params();
        params.groups[1].istdp = Some(IStdpParams {
            curve: IStdpCurve::Pulse(PulseCurveParams {
                beta_ltp: 1.0,
                beta_ltd: 1.2,
                lambda: 12.0,
                delta: 6.0,
            }),
            stdp_type: StdpType::Standard,
        });
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().as_str(),
            "pulse curve: lambda must not be greater than delta"
        );
    }

    #[test]
    fn stp_u_out_of_range() {
        let mut params = test_util::get_template_simulation_params();
        params.groups[0].stp = Some(StpParams {
            u: 1.5,
            a: 1.0,
            tau_u_inv: 0.02,
            tau_x_inv: 0.005,
        });
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().as_str(), "stp_params: u must be in [0, 1]");
    }

    #[test]
    fn zero_base_firing() {
        let mut params = test_util::get_template_simulation_params();
        params.groups[0].homeostasis = Some(HomeostasisParams {
            scale: 0.1,
            avg_time_scale: 10.0,
            base_firing: 0.0,
        });
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().as_str(),
            "base_firing must be strictly positive"
        );
    }

    #[test]
    fn invalid_from_group_id() {
        let mut params = test_util::get_template_simulation_params();
        params.connections[0].from_group_id = 99;
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().as_str(), "invalid from_group_id: 99");
    }

    #[test]
    fn invalid_to_group_id() {
        let mut params = test_util::get_template_simulation_params();
        params.connections[0].to_group_id = 99;
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().as_str(), "invalid to_group_id: 99");
    }

    #[test]
    fn connection_into_poisson_group() {
        let mut params = test_util::get_template_simulation_params();
        let poisson_id = params.groups.len() - 1;
        params.connections[0].to_group_id = poisson_id;
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().as_str(),
            "Poisson groups cannot be the target of a connection"
        );
    }

    #[test]
    fn zero_connect_density() {
        let mut params = test_util::get_template_simulation_params();
        params.connections[0].connect_density = 0.0;
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().as_str(), "connect_density must be in (0, 1]");
    }

    #[test]
    fn zero_delay_min() {
        let mut params = test_util::get_template_simulation_params();
        params.connections[0].delay_min = 0;
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().as_str(), "delay_min must be at least 1");
    }

    #[test]
    fn delay_max_less_than_delay_min() {
        let mut params = test_util::get_template_simulation_params();
        params.connections[0].delay_min = 5;
        params.connections[0].delay_max = 4;
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().as_str(),
            "delay_max must not be less than delay_min"
        );
    }

    #[test]
    fn initial_weight_above_max() {
        let mut params = test_util::get_template_simulation_params();
        params.connections[0].initial_syn_weight = InitialSynWeight::Constant(100.0);
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().as_str(),
            "initial weight must not exceed max_syn_weight"
        );
    }

    #[test]
    fn zero_uniform_initial_weight_bound() {
        let mut params = test_util::get_template_simulation_params();
        params.connections[0].initial_syn_weight = InitialSynWeight::Uniform(0.0);
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().as_str(),
            "uniform initial weight bound must be strictly positive"
        );
    }

    #[test]
    fn negative_constant_initial_weight() {
        let mut params = test_util::get_template_simulation_params();
        params.connections[0].initial_syn_weight = InitialSynWeight::Constant(-1.0);
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().as_str(),
            "constant initial weight must not be negative"
        );
    }

    #[test]
    fn conductance_decay_out_of_range() {
        let mut params = test_util::get_template_simulation_params();
        params.conductances.as_mut().unwrap().decay_ampa = 1.0;
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().as_str(),
            "conductance decays must be in (0, 1)"
        );
    }

    #[test]
    fn invalid_weight_update_interval() {
        let mut params = test_util::get_template_simulation_params();
        params.weight_update.interval_ms = 50;
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().as_str(),
            "weight update interval_ms must be 10, 100 or 1000"
        );
    }

    #[test]
    fn wt_change_decay_out_of_range() {
        let mut params = test_util::get_template_simulation_params();
        params.weight_update.wt_change_decay = 1.0;
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().as_str(), "wt_change_decay must be in [0, 1)");
    }

    #[test]
    fn too_high_num_threads() {
        let mut params = test_util::get_template_simulation_params();
        params.technical_params.num_threads = Some(num_cpus::get() + 1);
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().as_str(),
            "num_threads must not be greater than number of available CPUs"
        );
    }

    #[test]
    fn zero_load_buffer_size() {
        let mut params = test_util::get_template_simulation_params();
        params.technical_params.load_buffer_size = 0;
        let result = validate_simulation_params(&params);

        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().as_str(),
            "load_buffer_size must be in [1, 65535]"
        );
    }
}
