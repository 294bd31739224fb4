// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Adaptive Sliding-Mode Controller
// ─────────────────────────────────────────────────────────────────────
//! Single-gain adaptive SMC.
//!
//! The switching gain K follows
//!
//!   dK/dt = γ·|σ|·[|σ| > δ] − leak·(K − K_init),   |dK/dt| <= rate_limit
//!
//! and is integrated with the controller time step, then clamped to
//! `[K_min, K_max]`. Inside the dead-zone δ only the leak acts, so
//! chatter around the surface cannot wind the gain up.
//!
//!   u = −K·sat(σ/ε) − α·σ

use ndarray::{Array1, ArrayView2};

use smc_types::validation::{require_gain_count, require_positive};
use smc_types::{
    AdaptiveConfig, AdaptiveState, ControlOutput, History, SmcResult, StateVector, SwitchMethod,
};

use crate::controller::{feasibility_mask, finite_or_zero, SlidingModeController};
use crate::saturation::{clamp_finite, saturate_unchecked};
use crate::surface::LinearSurface;

const NAME: &str = "AdaptiveSmc";
const SIGNALS: [&str; 6] = ["K", "sigma", "u_sw", "dK", "time_in_sliding", "u"];

#[derive(Debug, Clone)]
pub struct AdaptiveSmc {
    gains: [f64; 5],
    gamma: f64,
    surface: LinearSurface,
    dt: f64,
    max_force: f64,
    leak_rate: f64,
    adapt_rate_limit: f64,
    k_min: f64,
    k_max: f64,
    k_init: f64,
    dead_zone: f64,
    boundary_layer: f64,
    switch_method: SwitchMethod,
    alpha: f64,
}

impl AdaptiveSmc {
    pub fn new(config: &AdaptiveConfig) -> SmcResult<Self> {
        config.validate()?;
        require_gain_count(&config.gains, NAME, &[5])?;
        for (value, name) in config.gains.iter().zip(["k1", "k2", "lambda1", "lambda2", "gamma"]) {
            require_positive(*value, name, false)?;
        }
        let mut gains = [0.0; 5];
        gains.copy_from_slice(&config.gains);
        let [k1, k2, lambda1, lambda2, gamma] = gains;
        Ok(Self {
            gains,
            gamma,
            surface: LinearSurface::new(k1, k2, lambda1, lambda2),
            dt: config.dt,
            max_force: config.max_force,
            leak_rate: config.leak_rate,
            adapt_rate_limit: config.adapt_rate_limit,
            k_min: config.k_min,
            k_max: config.k_max,
            k_init: config.k_init,
            dead_zone: config.dead_zone,
            boundary_layer: config.boundary_layer,
            switch_method: config.switch_method,
            alpha: config.alpha,
        })
    }

    /// Batch feasibility: all five gains strictly positive.
    pub fn validate_gains(rows: ArrayView2<'_, f64>) -> Array1<bool> {
        feasibility_mask(rows, &[5], |g| g.iter().all(|&v| v > 0.0))
    }

    pub fn surface(&self) -> &LinearSurface {
        &self.surface
    }

    pub fn k_bounds(&self) -> (f64, f64) {
        (self.k_min, self.k_max)
    }

    /// Adaptation rate for one step, before integration.
    #[inline]
    fn gain_rate(&self, sigma: f64, k: f64) -> f64 {
        let leak = self.leak_rate * (k - self.k_init);
        if sigma.abs() <= self.dead_zone {
            return -leak;
        }
        (self.gamma * sigma.abs() - leak).clamp(-self.adapt_rate_limit, self.adapt_rate_limit)
    }
}

impl SlidingModeController for AdaptiveSmc {
    type State = AdaptiveState;

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

    fn initialize_state(&self) -> AdaptiveState {
        AdaptiveState {
            k: self.k_init,
            last_u: 0.0,
            time_in_sliding: 0.0,
        }
    }

    fn initialize_history(&self) -> History {
        History::with_signals(&SIGNALS)
    }

    fn compute(
        &self,
        state: &StateVector,
        internal: &AdaptiveState,
        mut history: History,
    ) -> ControlOutput<AdaptiveState> {
        // A corrupted carried gain restarts from the nominal value.
        let k_prev = if internal.k.is_finite() {
            internal.k.clamp(self.k_min, self.k_max)
        } else {
            self.k_init
        };

        if !state.is_finite() {
            let next = AdaptiveState {
                k: k_prev,
                last_u: 0.0,
                time_in_sliding: 0.0,
            };
            history.push("K", k_prev);
            history.push("sigma", 0.0);
            history.push("u_sw", 0.0);
            history.push("dK", 0.0);
            history.push("time_in_sliding", 0.0);
            history.push("u", 0.0);
            return ControlOutput {
                u: 0.0,
                state: next,
                history,
                sigma: 0.0,
            };
        }

        let sigma = finite_or_zero(self.surface.compute(state));
        let sw = saturate_unchecked(sigma, self.boundary_layer, self.switch_method);

        let dk = self.gain_rate(sigma, k_prev);
        let k_next = (k_prev + dk * self.dt).clamp(self.k_min, self.k_max);

        let u_sw = -k_next * sw;
        let u = clamp_finite(u_sw - self.alpha * sigma, self.max_force);

        let time_in_sliding = if sigma.abs() <= self.boundary_layer {
            finite_or_zero(internal.time_in_sliding) + self.dt
        } else {
            0.0
        };

        history.push("K", k_next);
        history.push("sigma", sigma);
        history.push("u_sw", u_sw);
        history.push("dK", dk);
        history.push("time_in_sliding", time_in_sliding);
        history.push("u", u);

        ControlOutput {
            u,
            state: AdaptiveState {
                k: k_next,
                last_u: u,
                time_in_sliding,
            },
            history,
            sigma,
        }
    }

    fn has_dynamics(&self) -> bool {
        false
    }

    fn release_dynamics(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn controller(cfg: AdaptiveConfig) -> AdaptiveSmc {
        AdaptiveSmc::new(&cfg).unwrap()
    }

    /// State with σ = k1·θ̇1 for zero angles.
    fn state_with_sigma(c: &AdaptiveSmc, sigma: f64) -> StateVector {
        StateVector::new(0.0, 0.0, 0.0, 0.0, sigma / c.surface().k1, 0.0)
    }

    #[test]
    fn test_dead_zone_leak_only_at_nominal_gain() {
        let c = controller(AdaptiveConfig {
            dead_zone: 0.01,
            ..Default::default()
        });
        let st = state_with_sigma(&c, 0.005);
        let init = c.initialize_state();
        let out = c.compute(&st, &init, c.initialize_history());
        assert_relative_eq!(out.sigma, 0.005, epsilon = 1e-12);
        let dk = out.history.last("dK").unwrap();
        assert_eq!(dk, -0.01 * (init.k - 10.0));
        assert_eq!(out.state.k, init.k);
    }

    #[test]
    fn test_dead_zone_leak_only_off_nominal() {
        let c = controller(AdaptiveConfig {
            dead_zone: 0.01,
            leak_rate: 0.5,
            ..Default::default()
        });
        let st = state_with_sigma(&c, 0.005);
        let carried = AdaptiveState {
            k: 20.0,
            last_u: 0.0,
            time_in_sliding: 0.0,
        };
        let out = c.compute(&st, &carried, History::new());
        assert_eq!(out.history.last("dK").unwrap(), -0.5 * (20.0 - 10.0));
        assert!(out.state.k < 20.0);
    }

    #[test]
    fn test_gain_grows_outside_dead_zone() {
        let c = controller(AdaptiveConfig::default());
        let st = state_with_sigma(&c, 0.5);
        let init = c.initialize_state();
        let out = c.compute(&st, &init, History::new());
        assert!(out.state.k > init.k);
        assert_relative_eq!(out.history.last("dK").unwrap(), 1.0 * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_rate_limit() {
        let c = controller(AdaptiveConfig {
            adapt_rate_limit: 2.0,
            ..Default::default()
        });
        let st = state_with_sigma(&c, 100.0);
        let out = c.compute(&st, &c.initialize_state(), History::new());
        assert_eq!(out.history.last("dK").unwrap(), 2.0);
    }

    #[test]
    fn test_gain_stays_within_bounds_over_many_steps() {
        let c = controller(AdaptiveConfig {
            k_max: 12.0,
            adapt_rate_limit: 1000.0,
            gains: vec![10.0, 8.0, 5.0, 4.0, 500.0],
            ..Default::default()
        });
        let (k_min, k_max) = c.k_bounds();
        let mut internal = c.initialize_state();
        let mut history = History::disabled();
        for i in 0..2000 {
            let s = ((i as f64) * 0.37).sin() * 3.0;
            let out = c.compute(&state_with_sigma(&c, s), &internal, history);
            assert!(out.state.k >= k_min && out.state.k <= k_max, "K={}", out.state.k);
            internal = out.state;
            history = out.history;
        }
    }

    #[test]
    fn test_dwell_timer() {
        let c = controller(AdaptiveConfig {
            boundary_layer: 0.1,
            ..Default::default()
        });
        let inside = state_with_sigma(&c, 0.05);
        let outside = state_with_sigma(&c, 0.5);
        let s1 = c.compute(&inside, &c.initialize_state(), History::new()).state;
        let s2 = c.compute(&inside, &s1, History::new()).state;
        assert_relative_eq!(s2.time_in_sliding, 2.0 * c.dt(), epsilon = 1e-15);
        let s3 = c.compute(&outside, &s2, History::new()).state;
        assert_eq!(s3.time_in_sliding, 0.0);
    }

    #[test]
    fn test_force_bounded_and_opposes_sigma() {
        let c = controller(AdaptiveConfig::default());
        let st = StateVector::new(0.0, 0.5, 0.5, 0.0, 30.0, 30.0);
        let out = c.compute(&st, &c.initialize_state(), History::new());
        assert!(out.u.abs() <= c.max_force());
        assert!(out.u < 0.0);
        assert_eq!(out.state.last_u, out.u);
    }

    #[test]
    fn test_non_finite_state_and_gain_recover() {
        let c = controller(AdaptiveConfig::default());
        let st = StateVector::new(f64::NAN, 0.0, 0.0, 0.0, 0.0, 0.0);
        let bad = AdaptiveState {
            k: f64::NAN,
            last_u: f64::NAN,
            time_in_sliding: f64::NAN,
        };
        let out = c.compute(&st, &bad, History::new());
        assert_eq!(out.u, 0.0);
        assert_eq!(out.state.k, 10.0);
    }

    #[test]
    fn test_validate_gains_batch() {
        let rows = array![[10.0, 8.0, 5.0, 4.0, 1.0], [10.0, 8.0, 5.0, 4.0, 0.0]];
        assert_eq!(AdaptiveSmc::validate_gains(rows.view()), array![true, false]);
    }
}
