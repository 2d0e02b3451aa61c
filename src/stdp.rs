use crate::params::{EStdpCurve, IStdpCurve, PulseCurveParams};

/// Exponential contributions are cut off once `dt * tau_inv` reaches this
/// value; beyond it the term is numerically irrelevant.
const EXP_WINDOW_GATE: f32 = 25.0;

/// Potentiation for an excitatory synapse whose last presynaptic arrival was
/// `dt >= 0` ticks before the postsynaptic spike.
pub fn excitatory_ltp(dt: i64, curve: &EStdpCurve) -> f32 {
    match curve {
        EStdpCurve::Exponential(params) => {
            gated_exp(dt, params.alpha_plus, params.tau_plus_inv)
        }
        EStdpCurve::TimingBased(params) => {
            let x = dt as f32 * params.tau_plus_inv;
            if x >= EXP_WINDOW_GATE {
                return 0.0;
            }

            let base = params.alpha_plus * (-x).exp();
            if dt as f32 <= params.gamma {
                params.omega + params.kappa * base
            } else {
                -base
            }
        }
    }
}

/// Depression for an excitatory synapse whose spike arrived `dt >= 0` ticks
/// after the last postsynaptic spike. `alpha_minus` carries the sign.
pub fn excitatory_ltd(dt: i64, curve: &EStdpCurve) -> f32 {
    match curve {
        EStdpCurve::Exponential(params) => {
            gated_exp(dt, params.alpha_minus, params.tau_minus_inv)
        }
        EStdpCurve::TimingBased(params) => {
            gated_exp(dt, params.alpha_minus, params.tau_minus_inv)
        }
    }
}

pub fn inhibitory_ltp(dt: i64, curve: &IStdpCurve) -> f32 {
    match curve {
        IStdpCurve::Exponential(params) => {
            gated_exp(dt, params.alpha_plus, params.tau_plus_inv)
        }
        IStdpCurve::Pulse(params) => pulse(dt, params),
    }
}

pub fn inhibitory_ltd(dt: i64, curve: &IStdpCurve) -> f32 {
    match curve {
        IStdpCurve::Exponential(params) => {
            gated_exp(dt, params.alpha_minus, params.tau_minus_inv)
        }
        IStdpCurve::Pulse(params) => pulse(dt, params),
    }
}

fn gated_exp(dt: i64, alpha: f32, tau_inv: f32) -> f32 {
    let x = dt as f32 * tau_inv;
    if x < EXP_WINDOW_GATE {
        alpha * (-x).exp()
    } else {
        0.0
    }
}

/// Anti-Hebbian step curve: near-coincident spikes potentiate, the remainder
/// of the window depresses.
fn pulse(dt: i64, params: &PulseCurveParams) -> f32 {
    let dt = dt as f32;
    if dt <= params.lambda {
        params.beta_ltp
    } else if dt <= params.delta {
        -params.beta_ltd
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ExpCurveParams, TimingBasedCurveParams};
    use float_cmp::assert_approx_eq;

    const EXP_CURVE: ExpCurveParams = ExpCurveParams {
        alpha_plus: 0.01,
        tau_plus_inv: 0.05,
        alpha_minus: -0.012,
        tau_minus_inv: 0.05,
    };

    #[test]
    fn exponential_potentiation() {
        let curve = EStdpCurve::Exponential(EXP_CURVE);

        assert_approx_eq!(f32, excitatory_ltp(0, &curve), 0.01);

        // pre fires at t=100, post at t=110
        assert_approx_eq!(
            f32,
            excitatory_ltp(10, &curve),
            0.01 * (-10.0 * 0.05f32).exp()
        );
    }

    #[test]
    fn exponential_depression_is_negative() {
        let curve = EStdpCurve::Exponential(EXP_CURVE);

        assert_approx_eq!(f32, excitatory_ltd(0, &curve), -0.012);
        assert_approx_eq!(
            f32,
            excitatory_ltd(10, &curve),
            -0.012 * (-0.5f32).exp()
        );
    }

    #[test]
    fn window_gate_cuts_off_stale_pairs() {
        let curve = EStdpCurve::Exponential(EXP_CURVE);

        // 0.05 * 500 = 25 hits the gate
        assert_approx_eq!(f32, excitatory_ltp(500, &curve), 0.0);
        assert_approx_eq!(f32, excitatory_ltd(500, &curve), 0.0);

        assert!(excitatory_ltp(499, &curve) > 0.0);
    }

    #[test]
    fn timing_based_piecewise() {
        let curve = EStdpCurve::TimingBased(TimingBasedCurveParams {
            alpha_plus: 0.1,
            tau_plus_inv: 0.05,
            alpha_minus: -0.12,
            tau_minus_inv: 0.05,
            gamma: 10.0,
            omega: 0.002,
            kappa: 2.0,
        });

        // inside the gamma window: omega plus scaled exponential
        assert_approx_eq!(
            f32,
            excitatory_ltp(4, &curve),
            0.002 + 2.0 * 0.1 * (-0.2f32).exp()
        );

        // outside: negated exponential
        assert_approx_eq!(f32, excitatory_ltp(20, &curve), -0.1 * (-1.0f32).exp());

        // depression stays exponential
        assert_approx_eq!(f32, excitatory_ltd(20, &curve), -0.12 * (-1.0f32).exp());
    }

    #[test]
    fn pulse_steps() {
        let curve = IStdpCurve::Pulse(PulseCurveParams {
            beta_ltp: 1.0,
            beta_ltd: 1.2,
            lambda: 6.0,
            delta: 20.0,
        });

        assert_approx_eq!(f32, inhibitory_ltp(0, &curve), 1.0);
        assert_approx_eq!(f32, inhibitory_ltp(6, &curve), 1.0);
        assert_approx_eq!(f32, inhibitory_ltp(7, &curve), -1.2);
        assert_approx_eq!(f32, inhibitory_ltd(20, &curve), -1.2);
        assert_approx_eq!(f32, inhibitory_ltd(21, &curve), 0.0);
    }

    #[test]
    fn inhibitory_exponential() {
        let curve = IStdpCurve::Exponential(EXP_CURVE);

        assert_approx_eq!(
            f32,
            inhibitory_ltp(5, &curve),
            0.01 * (-0.25f32).exp()
        );
        assert_approx_eq!(
            f32,
            inhibitory_ltd(5, &curve),
            -0.012 * (-0.25f32).exp()
        );
    }
}
