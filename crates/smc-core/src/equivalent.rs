// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Equivalent-Control Solver
// ─────────────────────────────────────────────────────────────────────
//! Model-based feed-forward term shared by the classical,
//! super-twisting and hybrid laws.
//!
//! With σ = L·q̇ + P·q, setting σ̇ = 0 on `M·q̈ + C·q̇ + G = B·u` gives
//!
//!   u_eq = (L·M⁻¹·(C·q̇ + G) − P·q̇) / (L·M⁻¹·B)
//!
//! Both `M⁻¹` products come from one LU factorisation of the
//! regularised inertia matrix; no explicit inverse is formed. Every
//! failure (query error, singular factorisation, poor controllability,
//! non-finite result) degrades the term to zero and is never surfaced.

use nalgebra::{Matrix3, Vector3};

use smc_types::{EquivalentControlConfig, StateVector};

use crate::dynamics::DynamicsModel;

#[derive(Debug, Clone, PartialEq)]
pub struct EquivalentControl {
    enabled: bool,
    regularization: f64,
    controllability_threshold: f64,
    limit: f64,
    rate_weights: Vector3<f64>,
    position_weights: Vector3<f64>,
}

impl EquivalentControl {
    /// Build from the surface weights `σ = L·q̇ + P·q`.
    ///
    /// `default_threshold` applies when the config leaves the
    /// controllability threshold unset.
    pub fn new(
        config: &EquivalentControlConfig,
        rate_weights: [f64; 3],
        position_weights: [f64; 3],
        default_threshold: f64,
        max_force: f64,
    ) -> Self {
        Self {
            enabled: config.enabled,
            regularization: config.regularization,
            controllability_threshold: config
                .controllability_threshold
                .unwrap_or(default_threshold),
            limit: config.eq_clamp_factor * max_force,
            rate_weights: Vector3::from(rate_weights),
            position_weights: Vector3::from(position_weights),
        }
    }

    /// Feed-forward force, or 0.0 when no model is attached or the solve degrades.
    pub fn compute(&self, model: Option<&dyn DynamicsModel>, state: &StateVector) -> f64 {
        if !self.enabled {
            return 0.0;
        }
        let Some(model) = model else {
            return 0.0;
        };
        if !state.is_finite() {
            return 0.0;
        }

        let matrices = match model.physics_matrices(state) {
            Ok(m) if m.is_finite() => m,
            Ok(_) => {
                log::debug!("equivalent control: non-finite physics matrices, suppressing");
                return 0.0;
            }
            Err(e) => {
                log::debug!("equivalent control: dynamics query failed ({e}), suppressing");
                return 0.0;
            }
        };

        let m_reg = matrices.inertia + Matrix3::identity() * self.regularization;
        let lu = m_reg.lu();
        let q_dot = Vector3::from(state.velocities());
        let b = Vector3::new(1.0, 0.0, 0.0);
        let rhs = matrices.coriolis * q_dot + matrices.gravity;

        let (Some(minv_b), Some(minv_rhs)) = (lu.solve(&b), lu.solve(&rhs)) else {
            log::debug!("equivalent control: singular inertia matrix, suppressing");
            return 0.0;
        };

        let controllability = self.rate_weights.dot(&minv_b);
        if !controllability.is_finite() || controllability.abs() < self.controllability_threshold
        {
            return 0.0;
        }

        let u_eq = (self.rate_weights.dot(&minv_rhs) - self.position_weights.dot(&q_dot))
            / controllability;
        if !u_eq.is_finite() {
            log::debug!("equivalent control: non-finite result, suppressing");
            return 0.0;
        }
        u_eq.clamp(-self.limit, self.limit)
    }
}
