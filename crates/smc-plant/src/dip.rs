// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Double Inverted Pendulum Dynamics
// ─────────────────────────────────────────────────────────────────────
//! Lagrangian model of the cart with two serially linked pendulums,
//! angles measured from upright:
//!
//!   M(q)·q̈ + C(q, q̇)·q̇ + G(q) = [u, 0, 0]ᵀ
//!
//!   M = ⎡ h1       h2·c1     h3·c2    ⎤
//!       ⎢ h2·c1    h4        h5·c12   ⎥
//!       ⎣ h3·c2    h5·c12    h6       ⎦
//!
//!   C = ⎡ b0   −h2·s1·θ̇1    −h3·s2·θ̇2  ⎤
//!       ⎢ 0     b1          h5·s12·θ̇2  ⎥
//!       ⎣ 0    −h5·s12·θ̇1    b2        ⎦
//!
//!   G = [0, −h7·s1, −h8·s2]ᵀ
//!
//! with c12 = cos(θ1 − θ2), s12 = sin(θ1 − θ2) and the lumped
//! coefficients h1..h8 computed once from [`DipParams`].

use nalgebra::{Matrix3, Vector3};

use smc_core::{DynamicsModel, PhysicsMatrices};
use smc_types::{SmcError, SmcResult, StateVector};

use crate::params::DipParams;

#[derive(Debug, Clone, PartialEq)]
pub struct DoubleInvertedPendulum {
    params: DipParams,
    h: [f64; 8],
}

impl DoubleInvertedPendulum {
    pub fn new(params: DipParams) -> SmcResult<Self> {
        params.validate()?;
        let p = &params;
        let (m0, m1, m2) = (p.cart_mass, p.link1_mass, p.link2_mass);
        let (l1, lc1, lc2) = (p.link1_length, p.link1_com, p.link2_com);
        let h = [
            m0 + m1 + m2,
            m1 * lc1 + m2 * l1,
            m2 * lc2,
            m1 * lc1 * lc1 + m2 * l1 * l1 + p.link1_inertia,
            m2 * lc2 * l1,
            m2 * lc2 * lc2 + p.link2_inertia,
            (m1 * lc1 + m2 * l1) * p.gravity,
            m2 * lc2 * p.gravity,
        ];
        Ok(Self { params, h })
    }

    pub fn params(&self) -> &DipParams {
        &self.params
    }

    pub fn inertia_matrix(&self, state: &StateVector) -> Matrix3<f64> {
        let [h1, h2, h3, h4, h5, h6, _, _] = self.h;
        let (c1, c2) = (state.theta1().cos(), state.theta2().cos());
        let c12 = (state.theta1() - state.theta2()).cos();
        Matrix3::new(
            h1,
            h2 * c1,
            h3 * c2,
            h2 * c1,
            h4,
            h5 * c12,
            h3 * c2,
            h5 * c12,
            h6,
        )
    }

    /// Coriolis/centrifugal matrix with viscous friction on the diagonal.
    pub fn coriolis_matrix(&self, state: &StateVector) -> Matrix3<f64> {
        let [_, h2, h3, _, h5, _, _, _] = self.h;
        let p = &self.params;
        let (s1, s2) = (state.theta1().sin(), state.theta2().sin());
        let s12 = (state.theta1() - state.theta2()).sin();
        let (w1, w2) = (state.theta1_dot(), state.theta2_dot());
        Matrix3::new(
            p.cart_friction,
            -h2 * s1 * w1,
            -h3 * s2 * w2,
            0.0,
            p.joint1_friction,
            h5 * s12 * w2,
            0.0,
            -h5 * s12 * w1,
            p.joint2_friction,
        )
    }

    pub fn gravity_vector(&self, state: &StateVector) -> Vector3<f64> {
        let [.., h7, h8] = self.h;
        Vector3::new(0.0, -h7 * state.theta1().sin(), -h8 * state.theta2().sin())
    }

    /// Generalized accelerations `q̈` for cart force `u`.
    pub fn accelerations(&self, state: &StateVector, u: f64) -> SmcResult<Vector3<f64>> {
        if !state.is_finite() || !u.is_finite() {
            return Err(SmcError::Numerical(format!(
                "non-finite plant input (state={:?}, u={u})",
                state.0
            )));
        }
        let q_dot = Vector3::from(state.velocities());
        let rhs = Vector3::new(u, 0.0, 0.0)
            - self.coriolis_matrix(state) * q_dot
            - self.gravity_vector(state);
        let q_ddot = self
            .inertia_matrix(state)
            .lu()
            .solve(&rhs)
            .ok_or_else(|| SmcError::Numerical("singular inertia matrix".into()))?;
        if q_ddot.iter().any(|v| !v.is_finite()) {
            return Err(SmcError::Numerical("non-finite accelerations".into()));
        }
        Ok(q_ddot)
    }

    fn derivative(&self, state: &StateVector, u: f64) -> SmcResult<[f64; 6]> {
        let a = self.accelerations(state, u)?;
        let v = state.velocities();
        Ok([v[0], v[1], v[2], a[0], a[1], a[2]])
    }

    /// One classical Runge–Kutta step with `u` held over the interval.
    pub fn rk4_step(&self, state: &StateVector, u: f64, dt: f64) -> SmcResult<StateVector> {
        let offset = |k: &[f64; 6], scale: f64| {
            let mut s = state.0;
            for (x, d) in s.iter_mut().zip(k) {
                *x += scale * d;
            }
            StateVector(s)
        };
        let k1 = self.derivative(state, u)?;
        let k2 = self.derivative(&offset(&k1, 0.5 * dt), u)?;
        let k3 = self.derivative(&offset(&k2, 0.5 * dt), u)?;
        let k4 = self.derivative(&offset(&k3, dt), u)?;

        let mut next = state.0;
        for i in 0..6 {
            next[i] += dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
        }
        let next = StateVector(next);
        if !next.is_finite() {
            return Err(SmcError::Numerical("integration produced non-finite state".into()));
        }
        Ok(next)
    }

    /// Kinetic plus potential energy, potential measured from the pivot height.
    pub fn total_energy(&self, state: &StateVector) -> f64 {
        let [.., h7, h8] = self.h;
        let q_dot = Vector3::from(state.velocities());
        let kinetic = 0.5 * q_dot.dot(&(self.inertia_matrix(state) * q_dot));
        let potential = h7 * state.theta1().cos() + h8 * state.theta2().cos();
        kinetic + potential
    }
}

impl DynamicsModel for DoubleInvertedPendulum {
    fn physics_matrices(&self, state: &StateVector) -> SmcResult<PhysicsMatrices> {
        Ok(PhysicsMatrices {
            inertia: self.inertia_matrix(state),
            coriolis: self.coriolis_matrix(state),
            gravity: self.gravity_vector(state),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use smc_core::{ClassicalSmc, SlidingModeController};
    use smc_types::{ClassicalConfig, History};

    fn plant() -> DoubleInvertedPendulum {
        DoubleInvertedPendulum::new(DipParams::default()).unwrap()
    }

    #[test]
    fn test_upright_is_equilibrium() {
        let a = plant().accelerations(&StateVector::zeros(), 0.0).unwrap();
        assert!(a.norm() < 1e-12);
    }

    #[test]
    fn test_tilt_falls_further() {
        let st = StateVector::new(0.0, 0.05, 0.0, 0.0, 0.0, 0.0);
        let a = plant().accelerations(&st, 0.0).unwrap();
        assert!(a[1] > 0.0, "θ̈1 = {}", a[1]);
    }

    #[test]
    fn test_force_accelerates_cart() {
        let a = plant().accelerations(&StateVector::zeros(), 5.0).unwrap();
        assert!(a[0] > 0.0);
        assert!(a[1] < 0.0, "links lag behind the cart");
    }

    #[test]
    fn test_inertia_symmetric_positive_definite() {
        let st = StateVector::new(0.3, 0.4, -0.7, 0.0, 1.0, -2.0);
        let m = plant().inertia_matrix(&st);
        assert_eq!(m, m.transpose());
        assert!(m.cholesky().is_some());
    }

    #[test]
    fn test_energy_conserved_without_friction() {
        let p = DoubleInvertedPendulum::new(DipParams::default().frictionless()).unwrap();
        let mut st = StateVector::new(0.0, 0.1, -0.05, 0.0, 0.0, 0.0);
        let e0 = p.total_energy(&st);
        for _ in 0..200 {
            st = p.rk4_step(&st, 0.0, 1e-3).unwrap();
        }
        assert_relative_eq!(p.total_energy(&st), e0, epsilon = 1e-7);
    }

    #[test]
    fn test_friction_dissipates() {
        let p = plant();
        let mut st = StateVector::new(0.0, 0.0, 0.0, 1.0, 0.0, 0.0);
        let e0 = p.total_energy(&st);
        for _ in 0..200 {
            st = p.rk4_step(&st, 0.0, 1e-3).unwrap();
        }
        assert!(p.total_energy(&st) < e0);
    }

    #[test]
    fn test_non_finite_input_is_error() {
        let st = StateVector::new(f64::NAN, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(matches!(
            plant().rk4_step(&st, 0.0, 1e-3),
            Err(SmcError::Numerical(_))
        ));
        assert!(plant().accelerations(&StateVector::zeros(), f64::INFINITY).is_err());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let bad = DipParams {
            cart_mass: 0.0,
            ..Default::default()
        };
        assert!(DoubleInvertedPendulum::new(bad).is_err());
    }

    #[test]
    fn test_equivalent_control_counteracts_gravity() {
        let p = plant();
        let cfg = ClassicalConfig::default();
        let with_model = ClassicalSmc::with_dynamics(&cfg, &p).unwrap();
        let st = StateVector::new(0.0, 0.05, 0.02, 0.0, 0.0, 0.0);
        let out = with_model.compute(&st, &with_model.initialize_state(), History::new());
        let u_eq = out.history.last("u_eq").unwrap();
        assert!(u_eq.is_finite());
        assert!(u_eq != 0.0);
        assert!(u_eq.abs() <= 5.0 * cfg.max_force);
    }
}
