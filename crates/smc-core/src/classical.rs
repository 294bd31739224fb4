// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Classical Sliding-Mode Controller
// ─────────────────────────────────────────────────────────────────────
//! Static-gain SMC with a boundary layer.
//!
//!   u = u_eq − K·sat(σ/ε_eff) − kd·σ,   ε_eff = ε + slope·|σ|
//!
//! Each term is bounded on its own and the sum is saturated to the
//! actuator limit. Inside the hysteresis band `|σ| < ratio·ε_eff` the
//! switching term is held at zero.

use ndarray::{Array1, ArrayView2};

use smc_types::validation::{require_gain_count, require_positive};
use smc_types::{
    ClassicalConfig, ClassicalState, ControlOutput, History, SmcResult, StateVector,
    SwitchMethod,
};

use crate::controller::{feasibility_mask, finite_or_zero, SlidingModeController};
use crate::dynamics::DynamicsModel;
use crate::equivalent::EquivalentControl;
use crate::saturation::{clamp_finite, saturate_unchecked};
use crate::surface::LinearSurface;

const NAME: &str = "ClassicalSmc";
const SIGNALS: [&str; 4] = ["sigma", "u_eq", "u_sw", "u"];

pub struct ClassicalSmc<'m> {
    gains: [f64; 6],
    switch_gain: f64,
    kd: f64,
    max_force: f64,
    boundary_layer: f64,
    boundary_layer_slope: f64,
    hysteresis_ratio: f64,
    switch_method: SwitchMethod,
    dt: f64,
    surface: LinearSurface,
    equivalent: EquivalentControl,
    dynamics: Option<&'m dyn DynamicsModel>,
}

impl ClassicalSmc<'static> {
    /// Model-free controller; the equivalent-control term is zero.
    pub fn new(config: &ClassicalConfig) -> SmcResult<Self> {
        Self::build(config, None)
    }
}

impl<'m> ClassicalSmc<'m> {
    /// Controller borrowing a dynamics model for the equivalent-control term.
    pub fn with_dynamics(config: &ClassicalConfig, model: &'m dyn DynamicsModel) -> SmcResult<Self> {
        Self::build(config, Some(model))
    }

    fn build(config: &ClassicalConfig, dynamics: Option<&'m dyn DynamicsModel>) -> SmcResult<Self> {
        config.validate()?;
        let gains = Self::check_gains(&config.gains)?;
        let [k1, k2, lambda1, lambda2, switch_gain, kd] = gains;
        let surface = LinearSurface::new(k1, k2, lambda1, lambda2);
        let equivalent = EquivalentControl::new(
            &config.equivalent,
            surface.rate_weights(),
            surface.position_weights(),
            surface.default_controllability_threshold(),
            config.max_force,
        );
        Ok(Self {
            gains,
            switch_gain,
            kd,
            max_force: config.max_force,
            boundary_layer: config.boundary_layer,
            boundary_layer_slope: config.boundary_layer_slope,
            hysteresis_ratio: config.hysteresis_ratio,
            switch_method: config.switch_method,
            dt: config.dt,
            surface,
            equivalent,
            dynamics,
        })
    }

    fn check_gains(gains: &[f64]) -> SmcResult<[f64; 6]> {
        require_gain_count(gains, NAME, &[6])?;
        for (value, name) in gains.iter().zip(["k1", "k2", "lambda1", "lambda2", "K"]) {
            require_positive(*value, name, false)?;
        }
        require_positive(gains[5], "kd", true)?;
        let mut out = [0.0; 6];
        out.copy_from_slice(gains);
        Ok(out)
    }

    pub fn surface(&self) -> &LinearSurface {
        &self.surface
    }

    /// Batch feasibility: `[k1, k2, λ1, λ2, K] > 0` and `kd >= 0`.
    pub fn validate_gains(rows: ArrayView2<'_, f64>) -> Array1<bool> {
        feasibility_mask(rows, &[6], |g| {
            g.iter().take(5).all(|&v| v > 0.0) && g[5] >= 0.0
        })
    }

    /// Effective boundary width, widened with |σ|.
    #[inline]
    fn effective_boundary(&self, sigma: f64) -> f64 {
        self.boundary_layer + self.boundary_layer_slope * sigma.abs()
    }
}

impl SlidingModeController for ClassicalSmc<'_> {
    type State = ClassicalState;

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

    fn initialize_state(&self) -> ClassicalState {
        ClassicalState
    }

    fn initialize_history(&self) -> History {
        History::with_signals(&SIGNALS)
    }

    fn compute(
        &self,
        state: &StateVector,
        _internal: &ClassicalState,
        mut history: History,
    ) -> ControlOutput<ClassicalState> {
        let sigma = finite_or_zero(self.surface.compute(state));

        let u = if state.is_finite() {
            let eps = self.effective_boundary(sigma);
            let sw = if sigma.abs() < self.hysteresis_ratio * eps {
                0.0
            } else {
                saturate_unchecked(sigma, eps, self.switch_method)
            };
            let u_eq = self.equivalent.compute(self.dynamics, state);
            let u_sw = -self.switch_gain * sw;
            let u_d = clamp_finite(-self.kd * sigma, self.max_force);
            history.push("u_eq", u_eq);
            history.push("u_sw", u_sw);
            clamp_finite(u_eq + u_sw + u_d, self.max_force)
        } else {
            history.push("u_eq", 0.0);
            history.push("u_sw", 0.0);
            0.0
        };

        history.push("sigma", sigma);
        history.push("u", u);

        ControlOutput {
            u,
            state: ClassicalState,
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
    use crate::dynamics::{ExternalDynamics, PhysicsMatrices};
    use nalgebra::{Matrix3, Vector3};
    use ndarray::array;
    use smc_types::SmcError;

    fn controller() -> ClassicalSmc<'static> {
        ClassicalSmc::new(&ClassicalConfig::default()).unwrap()
    }

    #[test]
    fn test_zero_state_gives_zero_force() {
        let c = ClassicalSmc::new(&ClassicalConfig {
            gains: vec![10.0, 8.0, 15.0, 12.0, 50.0, 5.0],
            ..Default::default()
        })
        .unwrap();
        let out = c.compute(&StateVector::zeros(), &ClassicalState, c.initialize_history());
        assert!(out.u.abs() < 1e-6, "u={}", out.u);
        assert_eq!(out.sigma, 0.0);
    }

    #[test]
    fn test_force_opposes_surface() {
        let c = controller();
        let st = StateVector::new(0.0, 0.05, 0.0, 0.0, 0.2, 0.0);
        let out = c.compute(&st, &ClassicalState, History::new());
        assert!(out.sigma > 0.0);
        assert!(out.u < 0.0, "u={}", out.u);
    }

    #[test]
    fn test_force_saturated() {
        let c = controller();
        let st = StateVector::new(0.0, 1.0, -1.0, 0.0, 50.0, 40.0);
        let out = c.compute(&st, &ClassicalState, History::new());
        assert_eq!(out.u.abs(), c.max_force());
    }

    #[test]
    fn test_hysteresis_freezes_switching() {
        let c = ClassicalSmc::new(&ClassicalConfig {
            hysteresis_ratio: 0.5,
            boundary_layer: 0.1,
            gains: vec![1.0, 1.0, 1.0, 1.0, 50.0, 0.0],
            ..Default::default()
        })
        .unwrap();
        // σ = 0.02 < 0.5 · 0.1
        let st = StateVector::new(0.0, 0.0, 0.0, 0.0, 0.02, 0.0);
        let out = c.compute(&st, &ClassicalState, History::new());
        assert_eq!(out.u, 0.0);
        assert_eq!(out.history.last("u_sw"), Some(0.0));
    }

    #[test]
    fn test_boundary_slope_softens_switching() {
        let narrow = controller();
        let wide = ClassicalSmc::new(&ClassicalConfig {
            boundary_layer_slope: 5.0,
            ..Default::default()
        })
        .unwrap();
        let st = StateVector::new(0.0, 0.0, 0.0, 0.0, 0.01, 0.0);
        let a = narrow.compute(&st, &ClassicalState, History::new());
        let b = wide.compute(&st, &ClassicalState, History::new());
        assert!(b.history.last("u_sw").unwrap().abs() < a.history.last("u_sw").unwrap().abs());
    }

    #[test]
    fn test_non_finite_state_gives_zero() {
        let c = controller();
        let st = StateVector::new(0.0, f64::NAN, 0.0, 0.0, f64::INFINITY, 0.0);
        let out = c.compute(&st, &ClassicalState, History::new());
        assert_eq!(out.u, 0.0);
        assert!(out.sigma.is_finite());
    }

    #[test]
    fn test_rejects_non_positive_gain() {
        let err = ClassicalSmc::new(&ClassicalConfig {
            gains: vec![10.0, 0.0, 15.0, 12.0, 50.0, 5.0],
            ..Default::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, SmcError::InvalidParameter { ref name, .. } if name == "k2"));
    }

    #[test]
    fn test_accepts_zero_damping() {
        assert!(ClassicalSmc::new(&ClassicalConfig {
            gains: vec![10.0, 8.0, 15.0, 12.0, 50.0, 0.0],
            ..Default::default()
        })
        .is_ok());
    }

    #[test]
    fn test_validate_gains_batch() {
        let rows = array![
            [10.0, 8.0, 15.0, 12.0, 50.0, 5.0],
            [10.0, 8.0, 15.0, 12.0, 50.0, 0.0],
            [10.0, -8.0, 15.0, 12.0, 50.0, 5.0],
            [10.0, 8.0, 15.0, 12.0, 50.0, -1.0],
        ];
        assert_eq!(
            ClassicalSmc::validate_gains(rows.view()),
            array![true, true, false, false]
        );
    }

    #[test]
    fn test_equivalent_control_with_model_and_release() {
        let model = ExternalDynamics::new(|_| {
            Ok(PhysicsMatrices {
                inertia: Matrix3::new(2.0, 1.0, 0.0, 1.0, 2.0, 0.0, 0.0, 0.0, 1.0),
                coriolis: Matrix3::zeros(),
                gravity: Vector3::new(0.0, -3.0, -1.0),
            })
        });
        let cfg = ClassicalConfig::default();
        let mut c = ClassicalSmc::with_dynamics(&cfg, &model).unwrap();
        assert!(c.has_dynamics());
        let out = c.compute(&StateVector::zeros(), &ClassicalState, History::new());
        assert!(out.history.last("u_eq").unwrap() != 0.0);

        c.release_dynamics();
        assert!(!c.has_dynamics());
        let out = c.compute(&StateVector::zeros(), &ClassicalState, History::new());
        assert_eq!(out.history.last("u_eq"), Some(0.0));
        assert_eq!(out.u, 0.0);
    }
}
