// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Sliding Surfaces
// ─────────────────────────────────────────────────────────────────────
//! Scalar manifolds σ(state) driven to zero by the control laws.
//!
//! `LinearSurface` is shared by the classical, adaptive and
//! super-twisting laws:
//!
//!   σ = k1·(θ̇1 + λ1·θ1) + k2·(θ̇2 + λ2·θ2)
//!
//! `HybridSurface` adds a relative second-joint formulation and an
//! optional cart term:
//!
//!   σ = c1·(θ̇1 + λ1·θ1) + c2·(θ̇2' + λ2·θ2') − κ·(ẋ + λx·x)
//!
//! where θ2' is θ2 (absolute) or θ2 − θ1 (relative).

use smc_types::StateVector;

/// Linear combination of joint rates and angles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearSurface {
    pub k1: f64,
    pub k2: f64,
    pub lambda1: f64,
    pub lambda2: f64,
}

impl LinearSurface {
    pub fn new(k1: f64, k2: f64, lambda1: f64, lambda2: f64) -> Self {
        Self {
            k1,
            k2,
            lambda1,
            lambda2,
        }
    }

    #[inline]
    pub fn compute(&self, state: &StateVector) -> f64 {
        self.k1 * (state.theta1_dot() + self.lambda1 * state.theta1())
            + self.k2 * (state.theta2_dot() + self.lambda2 * state.theta2())
    }

    /// Weights `L` on q̇ such that σ = L·q̇ + P·q.
    pub fn rate_weights(&self) -> [f64; 3] {
        [0.0, self.k1, self.k2]
    }

    /// Weights `P` on q such that σ = L·q̇ + P·q.
    pub fn position_weights(&self) -> [f64; 3] {
        [0.0, self.k1 * self.lambda1, self.k2 * self.lambda2]
    }

    /// Default controllability threshold: a fixed fraction of the rate weights.
    pub fn default_controllability_threshold(&self) -> f64 {
        0.05 * (self.k1.abs() + self.k2.abs())
    }
}

/// Surface used by the hybrid adaptive super-twisting law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridSurface {
    pub c1: f64,
    pub lambda1: f64,
    pub c2: f64,
    pub lambda2: f64,
    /// Express the second joint relative to the first.
    pub relative: bool,
    /// Weight of the cart term subtracted from the pendulum term (0 disables).
    pub cart_gain: f64,
    pub cart_lambda: f64,
}

impl HybridSurface {
    #[inline]
    pub fn compute(&self, state: &StateVector) -> f64 {
        let (th2, th2_dot) = if self.relative {
            (
                state.theta2() - state.theta1(),
                state.theta2_dot() - state.theta1_dot(),
            )
        } else {
            (state.theta2(), state.theta2_dot())
        };
        let pendulum = self.c1 * (state.theta1_dot() + self.lambda1 * state.theta1())
            + self.c2 * (th2_dot + self.lambda2 * th2);
        if self.cart_gain == 0.0 {
            return pendulum;
        }
        pendulum - self.cart_gain * (state.x_dot() + self.cart_lambda * state.x())
    }

    /// σ = L·q̇ + P·q, returned as `(L, P)`.
    pub fn weights(&self) -> ([f64; 3], [f64; 3]) {
        let (l1, l2) = if self.relative {
            (self.c1 - self.c2, self.c2)
        } else {
            (self.c1, self.c2)
        };
        let (p1, p2) = if self.relative {
            (
                self.c1 * self.lambda1 - self.c2 * self.lambda2,
                self.c2 * self.lambda2,
            )
        } else {
            (self.c1 * self.lambda1, self.c2 * self.lambda2)
        };
        (
            [-self.cart_gain, l1, l2],
            [-self.cart_gain * self.cart_lambda, p1, p2],
        )
    }

    pub fn default_controllability_threshold(&self) -> f64 {
        0.05 * (self.c1.abs() + self.c2.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
    }

    #[test]
    fn test_linear_surface_zero_at_origin() {
        let s = LinearSurface::new(10.0, 8.0, 15.0, 12.0);
        assert_eq!(s.compute(&StateVector::zeros()), 0.0);
    }

    #[test]
    fn test_linear_surface_value() {
        let s = LinearSurface::new(2.0, 3.0, 4.0, 5.0);
        let st = StateVector::new(9.0, 0.1, 0.2, 7.0, 1.0, -1.0);
        // 2(1 + 0.4) + 3(-1 + 1.0) = 2.8
        assert_relative_eq!(s.compute(&st), 2.8, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_weights_reproduce_sigma() {
        let s = LinearSurface::new(2.0, 3.0, 4.0, 5.0);
        let st = StateVector::new(0.3, 0.1, -0.2, 0.4, 1.5, -0.7);
        let sigma = dot(s.rate_weights(), st.velocities()) + dot(s.position_weights(), st.positions());
        assert_relative_eq!(sigma, s.compute(&st), epsilon = 1e-12);
    }

    #[test]
    fn test_hybrid_relative_differs_from_absolute() {
        let mut s = HybridSurface {
            c1: 5.0,
            lambda1: 2.0,
            c2: 3.0,
            lambda2: 1.0,
            relative: false,
            cart_gain: 0.0,
            cart_lambda: 1.0,
        };
        let st = StateVector::new(0.0, 0.2, 0.1, 0.0, 0.3, 0.4);
        let abs = s.compute(&st);
        s.relative = true;
        let rel = s.compute(&st);
        // absolute: 5(0.3+0.4) + 3(0.4+0.1) = 5.0; relative: 5(0.7) + 3(0.1 - 0.1) = 3.5
        assert_relative_eq!(abs, 5.0, epsilon = 1e-12);
        assert_relative_eq!(rel, 3.5, epsilon = 1e-12);
    }

    #[test]
    fn test_hybrid_cart_term_is_subtracted() {
        let s = HybridSurface {
            c1: 1.0,
            lambda1: 1.0,
            c2: 1.0,
            lambda2: 1.0,
            relative: false,
            cart_gain: 0.5,
            cart_lambda: 2.0,
        };
        let st = StateVector::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);
        assert_relative_eq!(s.compute(&st), -0.5 * (1.0 + 2.0), epsilon = 1e-12);
    }

    #[test]
    fn test_hybrid_weights_reproduce_sigma() {
        for relative in [false, true] {
            let s = HybridSurface {
                c1: 4.0,
                lambda1: 2.5,
                c2: 1.5,
                lambda2: 3.0,
                relative,
                cart_gain: 0.2,
                cart_lambda: 0.7,
            };
            let st = StateVector::new(0.3, 0.1, -0.2, 0.4, 1.5, -0.7);
            let (l, p) = s.weights();
            let sigma = dot(l, st.velocities()) + dot(p, st.positions());
            assert_relative_eq!(sigma, s.compute(&st), epsilon = 1e-12);
        }
    }
}
