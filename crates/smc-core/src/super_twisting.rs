// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Super-Twisting Sliding-Mode Controller
// ─────────────────────────────────────────────────────────────────────
//! Second-order sliding mode (super-twisting algorithm).
//!
//!   u  = u_eq − K1·|σ|^p·sat(σ/ε) + z − d·σ
//!   ż  = −K2·sat(σ/ε) + k_aw·(u_sat − u)
//!
//! With p = 1/2 and K1 > K2 > 0 the algorithm reaches σ = σ̇ = 0 in
//! finite time. The integral estimate z is clamped to the actuator
//! range so it cannot wind up while the output is saturated.

use ndarray::{Array1, ArrayView2};

use smc_types::validation::{require_gain_count, require_positive};
use smc_types::{
    ControlOutput, History, SmcError, SmcResult, StateVector, SuperTwistingConfig,
    SuperTwistingState, SwitchMethod,
};

use crate::controller::{feasibility_mask, finite_or_zero, SlidingModeController};
use crate::dynamics::DynamicsModel;
use crate::equivalent::EquivalentControl;
use crate::saturation::{clamp_finite, saturate_unchecked};
use crate::surface::LinearSurface;

const NAME: &str = "SuperTwistingSmc";
const SIGNALS: [&str; 4] = ["sigma", "z", "u_eq", "u"];

/// Surface gains `[k1, k2, λ1, λ2]` used when only `[K1, K2]` are given.
pub const DEFAULT_SURFACE_GAINS: [f64; 4] = [5.0, 3.0, 4.0, 4.0];

pub struct SuperTwistingSmc<'m> {
    gains: Vec<f64>,
    alg_gain_k1: f64,
    alg_gain_k2: f64,
    surface: LinearSurface,
    dt: f64,
    max_force: f64,
    damping_gain: f64,
    boundary_layer: f64,
    switch_method: SwitchMethod,
    power_exponent: f64,
    anti_windup_gain: f64,
    equivalent: EquivalentControl,
    dynamics: Option<&'m dyn DynamicsModel>,
}

impl SuperTwistingSmc<'static> {
    pub fn new(config: &SuperTwistingConfig) -> SmcResult<Self> {
        Self::build(config, None)
    }
}

impl<'m> SuperTwistingSmc<'m> {
    pub fn with_dynamics(
        config: &SuperTwistingConfig,
        model: &'m dyn DynamicsModel,
    ) -> SmcResult<Self> {
        Self::build(config, Some(model))
    }

    fn build(
        config: &SuperTwistingConfig,
        dynamics: Option<&'m dyn DynamicsModel>,
    ) -> SmcResult<Self> {
        config.validate()?;
        require_gain_count(&config.gains, NAME, &[2, 6])?;
        let k1_alg = require_positive(config.gains[0], "K1", false)?;
        let k2_alg = require_positive(config.gains[1], "K2", false)?;
        if k1_alg <= k2_alg {
            return Err(SmcError::BoundOrdering(format!(
                "super-twisting requires K1 > K2, got K1={k1_alg}, K2={k2_alg}"
            )));
        }
        let [k1, k2, lambda1, lambda2] = if config.gains.len() == 6 {
            let mut s = [0.0; 4];
            for (slot, (value, name)) in s
                .iter_mut()
                .zip(config.gains[2..].iter().zip(["k1", "k2", "lambda1", "lambda2"]))
            {
                *slot = require_positive(*value, name, false)?;
            }
            s
        } else {
            DEFAULT_SURFACE_GAINS
        };
        let surface = LinearSurface::new(k1, k2, lambda1, lambda2);
        let equivalent = EquivalentControl::new(
            &config.equivalent,
            surface.rate_weights(),
            surface.position_weights(),
            surface.default_controllability_threshold(),
            config.max_force,
        );
        Ok(Self {
            gains: config.gains.clone(),
            alg_gain_k1: k1_alg,
            alg_gain_k2: k2_alg,
            surface,
            dt: config.dt,
            max_force: config.max_force,
            damping_gain: config.damping_gain,
            boundary_layer: config.boundary_layer,
            switch_method: config.switch_method,
            power_exponent: config.power_exponent,
            anti_windup_gain: config.anti_windup_gain,
            equivalent,
            dynamics,
        })
    }

    pub fn surface(&self) -> &LinearSurface {
        &self.surface
    }

    /// Batch feasibility: all gains > 0 and K1 > K2.
    ///
    /// Accepts `[K1, K2]` rows or full six-gain rows.
    pub fn validate_gains(rows: ArrayView2<'_, f64>) -> Array1<bool> {
        feasibility_mask(rows, &[2, 6], |g| {
            g.iter().all(|&v| v > 0.0) && g[0] > g[1]
        })
    }
}

impl SlidingModeController for SuperTwistingSmc<'_> {
    type State = SuperTwistingState;

    fn name(&self) -> &'static str {
        NAME
    }

    fn gains(&self) -> &[f64] {
        &self.gains
    }

    fn max_force(&self) -> f64 {
        self.max_force
    }

    fn dt(&self) -> f64 {
        self.dt
    }

    fn initialize_state(&self) -> SuperTwistingState {
        SuperTwistingState::default()
    }

    fn initialize_history(&self) -> History {
        History::with_signals(&SIGNALS)
    }

    fn compute(
        &self,
        state: &StateVector,
        internal: &SuperTwistingState,
        mut history: History,
    ) -> ControlOutput<SuperTwistingState> {
        let z = clamp_finite(internal.z, self.max_force);

        if !state.is_finite() {
            history.push("sigma", 0.0);
            history.push("z", z);
            history.push("u_eq", 0.0);
            history.push("u", 0.0);
            return ControlOutput {
                u: 0.0,
                state: SuperTwistingState { z, sigma_prev: 0.0 },
                history,
                sigma: 0.0,
            };
        }

        let sigma = finite_or_zero(self.surface.compute(state));
        let sw = saturate_unchecked(sigma, self.boundary_layer, self.switch_method);
        let u_eq = self.equivalent.compute(self.dynamics, state);

        let u_cont = -self.alg_gain_k1 * sigma.abs().powf(self.power_exponent) * sw;
        let u_raw = u_eq + u_cont + z - self.damping_gain * sigma;
        let u = clamp_finite(u_raw, self.max_force);

        let mut z_dot = -self.alg_gain_k2 * sw;
        if self.anti_windup_gain > 0.0 && u != u_raw && u_raw.is_finite() {
            z_dot += self.anti_windup_gain * (u - u_raw);
        }
        let z_next = clamp_finite(z + z_dot * self.dt, self.max_force);

        history.push("sigma", sigma);
        history.push("z", z_next);
        history.push("u_eq", u_eq);
        history.push("u", u);

        ControlOutput {
            u,
            state: SuperTwistingState {
                z: z_next,
                sigma_prev: sigma,
            },
            history,
            sigma,
        }
    }

    fn has_dynamics(&self) -> bool {
        self.dynamics.is_some()
    }

    fn release_dynamics(&mut self) {
        self.dynamics = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn controller(gains: Vec<f64>) -> SuperTwistingSmc<'static> {
        SuperTwistingSmc::new(&SuperTwistingConfig {
            gains,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_force_opposes_surface_far_from_manifold() {
        let c = controller(vec![10.0, 5.0]);
        for sign in [1.0, -1.0] {
            let st = StateVector::new(0.0, sign * 0.3, sign * 0.2, 0.0, sign * 1.0, sign * 0.5);
            let out = c.compute(&st, &c.initialize_state(), c.initialize_history());
            assert!(out.sigma.abs() > 1.0);
            assert_eq!(out.u.signum(), -out.sigma.signum(), "u={} sigma={}", out.u, out.sigma);
        }
    }

    #[test]
    fn test_two_gain_form_uses_default_surface() {
        let c = controller(vec![10.0, 5.0]);
        assert_eq!(c.surface().k1, DEFAULT_SURFACE_GAINS[0]);
        assert_eq!(c.gains(), &[10.0, 5.0]);
    }

    #[test]
    fn test_rejects_k1_not_greater_than_k2() {
        let err = SuperTwistingSmc::new(&SuperTwistingConfig {
            gains: vec![5.0, 5.0],
            ..Default::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, SmcError::BoundOrdering(_)));
    }

    #[test]
    fn test_integral_accumulates_against_sigma() {
        let c = controller(vec![10.0, 5.0]);
        let st = StateVector::new(0.0, 0.1, 0.0, 0.0, 0.5, 0.0);
        let out = c.compute(&st, &c.initialize_state(), History::new());
        assert!(out.state.z < 0.0);
        assert_relative_eq!(out.state.z, -5.0 * c.dt(), epsilon = 1e-6);
        assert_eq!(out.state.sigma_prev, out.sigma);
    }

    #[test]
    fn test_integral_clamped_to_actuator_range() {
        let c = controller(vec![10.0, 5.0]);
        let carried = SuperTwistingState {
            z: 1e6,
            sigma_prev: 0.0,
        };
        let out = c.compute(&StateVector::zeros(), &carried, History::new());
        assert!(out.state.z <= c.max_force());
        assert!(out.u <= c.max_force());
    }

    #[test]
    fn test_anti_windup_pulls_integral_back() {
        let base = SuperTwistingConfig {
            gains: vec![10.0, 5.0],
            max_force: 10.0,
            ..Default::default()
        };
        let plain = SuperTwistingSmc::new(&base).unwrap();
        let aw = SuperTwistingSmc::new(&SuperTwistingConfig {
            anti_windup_gain: 50.0,
            ..base
        })
        .unwrap();
        let st = StateVector::new(0.0, -1.0, -1.0, 0.0, -5.0, -5.0);
        let carried = SuperTwistingState {
            z: 5.0,
            sigma_prev: 0.0,
        };
        let a = plain.compute(&st, &carried, History::new());
        let b = aw.compute(&st, &carried, History::new());
        assert_eq!(a.u, 10.0);
        assert!(b.state.z < a.state.z, "aw z={} plain z={}", b.state.z, a.state.z);
    }

    #[test]
    fn test_non_finite_state() {
        let c = controller(vec![10.0, 5.0]);
        let st = StateVector::new(0.0, 0.0, f64::NEG_INFINITY, 0.0, 0.0, 0.0);
        let out = c.compute(&st, &c.initialize_state(), History::new());
        assert_eq!(out.u, 0.0);
    }

    #[test]
    fn test_validate_gains_rejects_k1_le_k2() {
        let rows = array![[10.0, 5.0], [5.0, 5.0], [4.0, 5.0], [10.0, -1.0]];
        assert_eq!(
            SuperTwistingSmc::validate_gains(rows.view()),
            array![true, false, false, false]
        );
        let full = array![[25.0, 10.0, 15.0, 12.0, 20.0, 15.0], [10.0, 25.0, 15.0, 12.0, 20.0, 15.0]];
        assert_eq!(SuperTwistingSmc::validate_gains(full.view()), array![true, false]);
    }
}
