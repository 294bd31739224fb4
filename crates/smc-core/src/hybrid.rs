// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Hybrid Adaptive Super-Twisting Controller
// ─────────────────────────────────────────────────────────────────────
//! Super-twisting law with two adaptive gains.
//!
//!   u = u_eq − k1·√|σ|·sat(σ/ε) + u_int − d·σ + u_cart
//!   u̇_int = −k2·sat(σ/ε)
//!   k̇_i = γ_i·|σ|·|σ|/(|σ| + ε_t) − leak·(k_i − k_i,0)
//!
//! Outside the dead-zone both gains adapt with a self-tapering rate
//! that vanishes near the surface. Inside it, switching, adaptation
//! and integration are all frozen. A PD cart-recentering term fades
//! in between two cart-displacement thresholds.
//!
//! Once the nominal step is complete it is handed to
//! [`EmergencyGuard`], which may override it.

use ndarray::{Array1, ArrayView2};

use smc_types::validation::{require_len, require_positive};
use smc_types::{
    ControlOutput, History, HybridConfig, HybridState, SmcResult, StateVector, SwitchMethod,
};

use crate::controller::{feasibility_mask, finite_or_zero, SlidingModeController};
use crate::dynamics::DynamicsModel;
use crate::emergency::{EmergencyGuard, HybridStep};
use crate::equivalent::EquivalentControl;
use crate::saturation::{clamp_finite, ramp, saturate_unchecked, smooth_sign};
use crate::surface::HybridSurface;

const NAME: &str = "HybridAdaptiveStaSmc";
const SIGNALS: [&str; 8] = [
    "k1",
    "k2",
    "u_int",
    "sigma",
    "u",
    "u_eq",
    "recenter",
    "emergency_reset",
];

pub struct HybridAdaptiveStaSmc<'m> {
    gains: [f64; 4],
    surface: HybridSurface,
    config: HybridConfig,
    equivalent: EquivalentControl,
    guard: EmergencyGuard,
    dynamics: Option<&'m dyn DynamicsModel>,
}

/// Auxiliary signals of the nominal law, recorded but not guarded.
struct NominalExtras {
    u_eq: f64,
    recenter: f64,
}

impl HybridAdaptiveStaSmc<'static> {
    pub fn new(config: &HybridConfig) -> SmcResult<Self> {
        Self::build(config, None)
    }
}

impl<'m> HybridAdaptiveStaSmc<'m> {
    pub fn with_dynamics(config: &HybridConfig, model: &'m dyn DynamicsModel) -> SmcResult<Self> {
        Self::build(config, Some(model))
    }

    fn build(config: &HybridConfig, dynamics: Option<&'m dyn DynamicsModel>) -> SmcResult<Self> {
        config.validate()?;
        require_len(&config.gains, NAME, 4)?;
        let mut gains = [0.0; 4];
        for ((slot, value), name) in gains
            .iter_mut()
            .zip(&config.gains)
            .zip(["c1", "lambda1", "c2", "lambda2"])
        {
            *slot = require_positive(*value, name, false)?;
        }
        let [c1, lambda1, c2, lambda2] = gains;
        let surface = HybridSurface {
            c1,
            lambda1,
            c2,
            lambda2,
            relative: config.use_relative_surface,
            cart_gain: config.cart_gain,
            cart_lambda: config.cart_lambda,
        };
        let (rate_weights, position_weights) = surface.weights();
        let equivalent = EquivalentControl::new(
            &config.equivalent,
            rate_weights,
            position_weights,
            surface.default_controllability_threshold(),
            config.max_force,
        );
        Ok(Self {
            gains,
            surface,
            config: config.clone(),
            equivalent,
            guard: EmergencyGuard::new(config),
            dynamics,
        })
    }

    pub fn surface(&self) -> &HybridSurface {
        &self.surface
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    /// Batch feasibility: all four surface gains strictly positive.
    pub fn validate_gains(rows: ArrayView2<'_, f64>) -> Array1<bool> {
        feasibility_mask(rows, &[4], |g| g.iter().all(|&v| v > 0.0))
    }

    /// One adaptive-gain update outside the dead-zone.
    #[inline]
    fn adapt(&self, k: f64, gamma: f64, k_init: f64, k_max: f64, abs_sigma: f64) -> f64 {
        let cfg = &self.config;
        let taper = smooth_sign(abs_sigma, cfg.taper_eps);
        let dk = (gamma * abs_sigma * taper - cfg.gain_leak * (k - k_init))
            .clamp(-cfg.adapt_rate_limit, cfg.adapt_rate_limit);
        (k + dk * cfg.dt).clamp(0.0, k_max)
    }

    /// PD cart-centering force and its ramp factor.
    #[inline]
    fn recentering(&self, state: &StateVector) -> (f64, f64) {
        let cfg = &self.config;
        let r = ramp(state.x().abs(), cfg.recenter_low, cfg.recenter_high);
        let u = -r * (cfg.cart_p_gain * state.x() + cfg.cart_p_damping * state.x_dot());
        (u, r)
    }

    /// Nominal law, steps 1–7. May return non-finite signals; the
    /// guard deals with them.
    fn nominal_step(&self, state: &StateVector, internal: &HybridState) -> (HybridStep, NominalExtras) {
        let cfg = &self.config;
        let sigma = self.surface.compute(state);
        let abs_sigma = sigma.abs();
        // NaN passes through the clamp and is left to the guard.
        let k1_prev = internal.k1.clamp(0.0, cfg.k1_max);
        let k2_prev = internal.k2.clamp(0.0, cfg.k2_max);

        let (k1, k2, sat, u_int_next) = if abs_sigma <= cfg.dead_zone {
            (k1_prev, k2_prev, 0.0, internal.u_int)
        } else {
            let k1 = self.adapt(k1_prev, cfg.gamma1, cfg.k1_init, cfg.k1_max, abs_sigma);
            let k2 = self.adapt(k2_prev, cfg.gamma2, cfg.k2_init, cfg.k2_max, abs_sigma);
            let sat = saturate_unchecked(sigma, cfg.sat_soft_width, SwitchMethod::Linear);
            let u_int = (internal.u_int - k2 * sat * cfg.dt).clamp(-cfg.u_int_max, cfg.u_int_max);
            (k1, k2, sat, u_int)
        };

        let u_eq = self.equivalent.compute(self.dynamics, state);
        let (u_cart, recenter) = self.recentering(state);
        let u_base = u_eq - k1 * abs_sigma.sqrt() * sat - cfg.damping_gain * sigma + u_cart;

        let mut u_int = u_int_next;
        let mut u_raw = u_base + u_int;
        if u_raw.abs() > cfg.max_force {
            u_int = internal.u_int;
            u_raw = u_base + u_int;
        }

        let step = HybridStep {
            u: clamp_finite(u_raw, cfg.max_force),
            u_raw,
            k1,
            k2,
            u_int,
            sigma,
        };
        (step, NominalExtras { u_eq, recenter })
    }
}

impl SlidingModeController for HybridAdaptiveStaSmc<'_> {
    type State = HybridState;

    fn name(&self) -> &'static str {
        NAME
    }

    fn gains(&self) -> &[f64] {
        &self.gains
    }

    fn max_force(&self) -> f64 {
        self.config.max_force
    }

    fn dt(&self) -> f64 {
        self.config.dt
    }

    fn initialize_state(&self) -> HybridState {
        HybridState {
            k1: self.config.k1_init,
            k2: self.config.k2_init,
            u_int: 0.0,
        }
    }

    fn initialize_history(&self) -> History {
        History::with_signals(&SIGNALS)
    }

    fn compute(
        &self,
        state: &StateVector,
        internal: &HybridState,
        mut history: History,
    ) -> ControlOutput<HybridState> {
        let (nominal, extras) = self.nominal_step(state, internal);
        let (step, trigger) = self.guard.apply(state, nominal);

        let u_eq = finite_or_zero(extras.u_eq);
        let recenter = finite_or_zero(extras.recenter);
        history.push("k1", step.k1);
        history.push("k2", step.k2);
        history.push("u_int", step.u_int);
        history.push("sigma", step.sigma);
        history.push("u", step.u);
        history.push("u_eq", u_eq);
        history.push("recenter", recenter);
        history.push("emergency_reset", if trigger.is_some() { 1.0 } else { 0.0 });

        ControlOutput {
            u: step.u,
            state: HybridState {
                k1: step.k1,
                k2: step.k2,
                u_int: step.u_int,
            },
            history,
            sigma: step.sigma,
        }
    }

    fn has_dynamics(&self) -> bool {
        self.dynamics.is_some()
    }

    fn release_dynamics(&mut self) {
        self.dynamics = None;
    }
}
