// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Trajectory Cost
// ─────────────────────────────────────────────────────────────────────
//! Scalar cost of a closed-loop run, minimised by the optimizer.
//!
//!   J = w_x·∫ xᵀQx dt + w_u·∫ u² dt + w_du·Σ (Δu)² + w_σ·∫ σ² dt
//!       + P·(1 + remaining) if the run diverged
//!
//! The divergence term grows with how early the run failed, so an
//! optimizer still sees a gradient between two unstable candidates.

use serde::{Deserialize, Serialize};

use smc_types::validation::require_positive;
use smc_types::SmcResult;

use crate::simulation::Trajectory;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostWeights {
    /// Per-component weights Q on `[x, θ1, θ2, ẋ, θ̇1, θ̇2]`.
    pub state_weights: [f64; 6],
    pub state_error: f64,
    pub control_effort: f64,
    pub control_rate: f64,
    pub sliding: f64,
    /// Added once when a run diverges, scaled by `1 + remaining fraction`.
    pub instability_penalty: f64,
    /// Cost assigned to candidates that fail feasibility or construction.
    pub infeasible_penalty: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            state_weights: [1.0, 10.0, 10.0, 0.1, 0.5, 0.5],
            state_error: 50.0,
            control_effort: 0.2,
            control_rate: 0.1,
            sliding: 0.1,
            instability_penalty: 1e3,
            infeasible_penalty: 1e6,
        }
    }
}

impl CostWeights {
    pub fn validate(&self) -> SmcResult<()> {
        for w in self.state_weights {
            require_positive(w, "state_weights", true)?;
        }
        require_positive(self.state_error, "state_error", true)?;
        require_positive(self.control_effort, "control_effort", true)?;
        require_positive(self.control_rate, "control_rate", true)?;
        require_positive(self.sliding, "sliding", true)?;
        require_positive(self.instability_penalty, "instability_penalty", true)?;
        require_positive(self.infeasible_penalty, "infeasible_penalty", false)?;
        Ok(())
    }
}

/// Cost of one trajectory; never NaN.
pub fn trajectory_cost(traj: &Trajectory, weights: &CostWeights) -> f64 {
    let dt = traj.dt;

    let state_ise: f64 = traj
        .states
        .iter()
        .skip(1)
        .map(|s| {
            s.0.iter()
                .zip(&weights.state_weights)
                .map(|(v, q)| q * v * v)
                .sum::<f64>()
        })
        .sum::<f64>()
        * dt;
    let effort: f64 = traj.controls.iter().map(|u| u * u).sum::<f64>() * dt;
    let rate: f64 = traj
        .controls
        .windows(2)
        .map(|w| (w[1] - w[0]).powi(2))
        .sum();
    let sliding: f64 = traj.sigmas.iter().map(|s| s * s).sum::<f64>() * dt;

    let mut cost = weights.state_error * state_ise
        + weights.control_effort * effort
        + weights.control_rate * rate
        + weights.sliding * sliding;
    if traj.diverged {
        cost += weights.instability_penalty * (1.0 + traj.remaining_fraction());
    }
    if cost.is_finite() {
        cost
    } else {
        weights.infeasible_penalty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use smc_types::{History, StateVector};

    fn traj(states: Vec<StateVector>, controls: Vec<f64>, diverged: bool, planned: usize) -> Trajectory {
        let n = controls.len();
        Trajectory {
            dt: 0.1,
            planned_steps: planned,
            times: (0..states.len()).map(|i| i as f64 * 0.1).collect(),
            states,
            controls,
            sigmas: vec![0.0; n],
            diverged,
            history: History::disabled(),
        }
    }

    #[test]
    fn test_zero_trajectory_costs_nothing() {
        let t = traj(vec![StateVector::zeros(); 3], vec![0.0; 2], false, 2);
        assert_eq!(trajectory_cost(&t, &CostWeights::default()), 0.0);
    }

    #[test]
    fn test_terms() {
        let weights = CostWeights {
            state_weights: [0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            state_error: 1.0,
            control_effort: 1.0,
            control_rate: 1.0,
            sliding: 0.0,
            ..Default::default()
        };
        let s = StateVector::new(0.0, 2.0, 0.0, 0.0, 0.0, 0.0);
        let t = traj(vec![StateVector::zeros(), s, s], vec![1.0, 3.0], false, 2);
        // states: 2·(2²)·0.1 = 0.8; effort: (1 + 9)·0.1 = 1.0; rate: (3-1)² = 4
        assert_relative_eq!(trajectory_cost(&t, &weights), 0.8 + 1.0 + 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_early_divergence_costs_more() {
        let w = CostWeights::default();
        let early = traj(vec![StateVector::zeros(); 2], vec![0.0], true, 10);
        let late = traj(vec![StateVector::zeros(); 10], vec![0.0; 9], true, 10);
        let stable = traj(vec![StateVector::zeros(); 11], vec![0.0; 10], false, 10);
        let (e, l, s) = (
            trajectory_cost(&early, &w),
            trajectory_cost(&late, &w),
            trajectory_cost(&stable, &w),
        );
        assert!(e > l && l > s, "{e} {l} {s}");
    }

    #[test]
    fn test_non_finite_maps_to_penalty() {
        let w = CostWeights::default();
        let s = StateVector::new(f64::INFINITY, 0.0, 0.0, 0.0, 0.0, 0.0);
        let t = traj(vec![StateVector::zeros(), s], vec![0.0], true, 1);
        assert_eq!(trajectory_cost(&t, &w), w.infeasible_penalty);
    }

    #[test]
    fn test_weights_validate() {
        CostWeights::default().validate().unwrap();
        let bad = CostWeights {
            control_effort: -1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
