// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Emergency Guard
// ─────────────────────────────────────────────────────────────────────
//! Post-hoc override for the hybrid adaptive super-twisting law.
//!
//! The guard inspects a finished nominal step and, if any signal is
//! non-finite or far outside its nominal bound, replaces the step
//! with a safe one: zero force, adaptive gains shrunk to a small
//! fraction of their initial values, integral cleared, σ clamped.
//!
//! The override applies to the inspected step only. There is no latch:
//! the next step runs the nominal law from the reset state.

use std::fmt;

use smc_types::{EmergencyLimits, HybridConfig, StateVector};

/// Signals of one hybrid step, before or after the guard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridStep {
    /// Saturated force.
    pub u: f64,
    /// Force before saturation.
    pub u_raw: f64,
    pub k1: f64,
    pub k2: f64,
    pub u_int: f64,
    pub sigma: f64,
}

/// First condition that tripped the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyTrigger {
    NonFiniteState,
    NonFiniteSignal,
    ForceExcess,
    GainExcess,
    IntegralExcess,
    SurfaceExcess,
    PositionExcess,
    VelocityExcess,
}

impl fmt::Display for EmergencyTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NonFiniteState => "non-finite plant state",
            Self::NonFiniteSignal => "non-finite control signal",
            Self::ForceExcess => "raw force beyond limit",
            Self::GainExcess => "adaptive gain beyond limit",
            Self::IntegralExcess => "integral term beyond limit",
            Self::SurfaceExcess => "sliding surface beyond limit",
            Self::PositionExcess => "position norm beyond limit",
            Self::VelocityExcess => "velocity norm beyond limit",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmergencyGuard {
    limits: EmergencyLimits,
    max_force: f64,
    k1_max: f64,
    k2_max: f64,
    u_int_max: f64,
    k1_init: f64,
    k2_init: f64,
}

impl EmergencyGuard {
    pub fn new(config: &HybridConfig) -> Self {
        Self {
            limits: config.emergency.clone(),
            max_force: config.max_force,
            k1_max: config.k1_max,
            k2_max: config.k2_max,
            u_int_max: config.u_int_max,
            k1_init: config.k1_init,
            k2_init: config.k2_init,
        }
    }

    /// First tripped condition for this step, if any.
    pub fn check(&self, state: &StateVector, step: &HybridStep) -> Option<EmergencyTrigger> {
        let l = &self.limits;
        if !state.is_finite() {
            return Some(EmergencyTrigger::NonFiniteState);
        }
        let signals = [step.u, step.u_raw, step.k1, step.k2, step.u_int, step.sigma];
        if signals.iter().any(|v| !v.is_finite()) {
            return Some(EmergencyTrigger::NonFiniteSignal);
        }
        if step.u_raw.abs() > l.force_factor * self.max_force {
            return Some(EmergencyTrigger::ForceExcess);
        }
        if step.k1 > l.gain_factor * self.k1_max || step.k2 > l.gain_factor * self.k2_max {
            return Some(EmergencyTrigger::GainExcess);
        }
        if step.u_int.abs() > l.gain_factor * self.u_int_max {
            return Some(EmergencyTrigger::IntegralExcess);
        }
        if step.sigma.abs() > l.surface_limit {
            return Some(EmergencyTrigger::SurfaceExcess);
        }
        if state.position_norm() > l.position_limit {
            return Some(EmergencyTrigger::PositionExcess);
        }
        if state.velocity_norm() > l.velocity_limit {
            return Some(EmergencyTrigger::VelocityExcess);
        }
        None
    }

    /// Safe replacement for a tripped step.
    pub fn reset(&self, step: &HybridStep) -> HybridStep {
        let sigma = if step.sigma.is_nan() {
            0.0
        } else {
            step.sigma.clamp(-self.limits.sigma_clamp, self.limits.sigma_clamp)
        };
        HybridStep {
            u: 0.0,
            u_raw: 0.0,
            k1: self.limits.reset_fraction * self.k1_init,
            k2: self.limits.reset_fraction * self.k2_init,
            u_int: 0.0,
            sigma,
        }
    }

    /// Check the step and override it when tripped.
    pub fn apply(
        &self,
        state: &StateVector,
        step: HybridStep,
    ) -> (HybridStep, Option<EmergencyTrigger>) {
        match self.check(state, &step) {
            Some(trigger) => {
                log::warn!(
                    "hybrid SMC emergency reset: {trigger} (u_raw={}, k1={}, k2={}, u_int={}, sigma={})",
                    step.u_raw,
                    step.k1,
                    step.k2,
                    step.u_int,
                    step.sigma
                );
                (self.reset(&step), Some(trigger))
            }
            None => (step, None),
        }
    }
}
