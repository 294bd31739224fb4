// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Dynamics Model Interface
// ─────────────────────────────────────────────────────────────────────
//! Narrow query interface to the plant model used by the
//! equivalent-control solver.
//!
//! The plant obeys `M(q)·q̈ + C(q, q̇)·q̇ + G(q) = B·u` with
//! `q = [x, θ1, θ2]` and `B = [1, 0, 0]ᵀ`. Implementations must be
//! query-only: controllers evaluated in parallel may share one model.

use nalgebra::{Matrix3, Vector3};

use smc_types::{SmcResult, StateVector};

/// Inertia matrix, Coriolis/damping matrix and gravity vector at one state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsMatrices {
    pub inertia: Matrix3<f64>,
    pub coriolis: Matrix3<f64>,
    pub gravity: Vector3<f64>,
}

impl PhysicsMatrices {
    pub fn is_finite(&self) -> bool {
        self.inertia.iter().all(|v| v.is_finite())
            && self.coriolis.iter().all(|v| v.is_finite())
            && self.gravity.iter().all(|v| v.is_finite())
    }
}

/// Plant model queried once per control step.
pub trait DynamicsModel: Send + Sync {
    fn physics_matrices(&self, state: &StateVector) -> SmcResult<PhysicsMatrices>;
}

type PhysicsFn = Box<dyn Fn(&StateVector) -> SmcResult<PhysicsMatrices> + Send + Sync>;

/// Dynamics model that delegates to a function, for plants that live
/// outside this workspace.
pub struct ExternalDynamics {
    query_fn: PhysicsFn,
}

impl ExternalDynamics {
    pub fn new(
        query_fn: impl Fn(&StateVector) -> SmcResult<PhysicsMatrices> + Send + Sync + 'static,
    ) -> Self {
        Self {
            query_fn: Box::new(query_fn),
        }
    }
}

impl DynamicsModel for ExternalDynamics {
    fn physics_matrices(&self, state: &StateVector) -> SmcResult<PhysicsMatrices> {
        (self.query_fn)(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smc_types::SmcError;

    #[test]
    fn test_external_dynamics_delegates() {
        let model = ExternalDynamics::new(|s| {
            Ok(PhysicsMatrices {
                inertia: Matrix3::identity() * (1.0 + s.x()),
                coriolis: Matrix3::zeros(),
                gravity: Vector3::zeros(),
            })
        });
        let m = model
            .physics_matrices(&StateVector::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(m.inertia[(0, 0)], 2.0);
        assert!(m.is_finite());
    }

    #[test]
    fn test_external_dynamics_propagates_failure() {
        let model = ExternalDynamics::new(|_| Err(SmcError::Numerical("no model".into())));
        assert!(model.physics_matrices(&StateVector::zeros()).is_err());
    }
}
