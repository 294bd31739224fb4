// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Controller Factory
// ─────────────────────────────────────────────────────────────────────
//! Runtime selection of a control law.
//!
//! `ControllerKind` carries the per-variant metadata an optimizer needs
//! (gain count, defaults, search box, feasibility predicate).
//! `AnyController` / `AnyState` dispatch the per-step interface by
//! enum, for callers that choose the variant from configuration.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};

use smc_types::{
    AdaptiveState, ClassicalState, ControlOutput, FlatState, History, HybridState, KernelConfig,
    SmcError, SmcResult, StateVector, SuperTwistingState,
};

use crate::adaptive::AdaptiveSmc;
use crate::classical::ClassicalSmc;
use crate::controller::SlidingModeController;
use crate::dynamics::DynamicsModel;
use crate::hybrid::HybridAdaptiveStaSmc;
use crate::super_twisting::SuperTwistingSmc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    Classical,
    Adaptive,
    SuperTwisting,
    Hybrid,
}

impl ControllerKind {
    pub const ALL: [ControllerKind; 4] = [
        Self::Classical,
        Self::Adaptive,
        Self::SuperTwisting,
        Self::Hybrid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classical => "classical_smc",
            Self::Adaptive => "adaptive_smc",
            Self::SuperTwisting => "sta_smc",
            Self::Hybrid => "hybrid_adaptive_sta_smc",
        }
    }

    /// Length of the gain vector searched by an optimizer.
    pub fn n_gains(&self) -> usize {
        match self {
            Self::Classical => 6,
            Self::Adaptive => 5,
            Self::SuperTwisting => 6,
            Self::Hybrid => 4,
        }
    }

    pub fn default_gains(&self) -> Vec<f64> {
        let config = KernelConfig::default();
        match self {
            Self::Classical => config.classical.gains,
            Self::Adaptive => config.adaptive.gains,
            Self::SuperTwisting => config.super_twisting.gains,
            Self::Hybrid => config.hybrid.gains,
        }
    }

    /// PSO search box `(lower, upper)`, one entry per gain.
    pub fn gain_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        match self {
            Self::Classical => (
                vec![1.0, 1.0, 1.0, 1.0, 5.0, 0.1],
                vec![100.0, 100.0, 20.0, 20.0, 150.0, 10.0],
            ),
            Self::Adaptive => (
                vec![2.0, 2.0, 1.0, 1.0, 0.5],
                vec![40.0, 40.0, 15.0, 15.0, 10.0],
            ),
            Self::SuperTwisting => (
                vec![3.0, 2.0, 2.0, 2.0, 0.5, 0.5],
                vec![50.0, 30.0, 30.0, 30.0, 20.0, 20.0],
            ),
            Self::Hybrid => (vec![2.0, 0.5, 2.0, 0.5], vec![30.0, 20.0, 30.0, 20.0]),
        }
    }

    /// Batch feasibility for this variant.
    pub fn validate_gains(&self, rows: ArrayView2<'_, f64>) -> Array1<bool> {
        match self {
            Self::Classical => ClassicalSmc::validate_gains(rows),
            Self::Adaptive => AdaptiveSmc::validate_gains(rows),
            Self::SuperTwisting => SuperTwistingSmc::validate_gains(rows),
            Self::Hybrid => HybridAdaptiveStaSmc::validate_gains(rows),
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControllerKind {
    type Err = SmcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "classical" | "classical_smc" => Ok(Self::Classical),
            "adaptive" | "adaptive_smc" => Ok(Self::Adaptive),
            "super_twisting" | "sta" | "sta_smc" => Ok(Self::SuperTwisting),
            "hybrid" | "hybrid_adaptive_sta_smc" => Ok(Self::Hybrid),
            other => Err(SmcError::Config(format!("unknown controller '{other}'"))),
        }
    }
}

/// Internal state of any variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnyState {
    Classical(ClassicalState),
    Adaptive(AdaptiveState),
    SuperTwisting(SuperTwistingState),
    Hybrid(HybridState),
}

impl AnyState {
    pub fn kind(&self) -> ControllerKind {
        match self {
            Self::Classical(_) => ControllerKind::Classical,
            Self::Adaptive(_) => ControllerKind::Adaptive,
            Self::SuperTwisting(_) => ControllerKind::SuperTwisting,
            Self::Hybrid(_) => ControllerKind::Hybrid,
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        match self {
            Self::Classical(s) => s.to_vec(),
            Self::Adaptive(s) => s.to_vec(),
            Self::SuperTwisting(s) => s.to_vec(),
            Self::Hybrid(s) => s.to_vec(),
        }
    }

    /// Rebuild from a flat slice; the length must match the variant.
    pub fn from_slice(kind: ControllerKind, values: &[f64]) -> SmcResult<Self> {
        Ok(match kind {
            ControllerKind::Classical => Self::Classical(ClassicalState::from_slice(values)?),
            ControllerKind::Adaptive => Self::Adaptive(AdaptiveState::from_slice(values)?),
            ControllerKind::SuperTwisting => {
                Self::SuperTwisting(SuperTwistingState::from_slice(values)?)
            }
            ControllerKind::Hybrid => Self::Hybrid(HybridState::from_slice(values)?),
        })
    }
}

/// Enum-dispatched controller.
pub enum AnyController<'m> {
    Classical(ClassicalSmc<'m>),
    Adaptive(AdaptiveSmc),
    SuperTwisting(SuperTwistingSmc<'m>),
    Hybrid(HybridAdaptiveStaSmc<'m>),
}

impl AnyController<'static> {
    /// Model-free controller from the matching config section.
    pub fn from_config(kind: ControllerKind, config: &KernelConfig) -> SmcResult<Self> {
        Self::build(kind, config, None, None)
    }

    /// Model-free controller with gains replacing the config section's.
    pub fn with_gains(
        kind: ControllerKind,
        config: &KernelConfig,
        gains: &[f64],
    ) -> SmcResult<Self> {
        Self::build(kind, config, Some(gains), None)
    }
}

impl<'m> AnyController<'m> {
    /// General constructor; `gains` overrides the config section and
    /// `model` is borrowed for the equivalent-control term.
    ///
    /// The adaptive law has no feed-forward term and ignores `model`.
    pub fn build(
        kind: ControllerKind,
        config: &KernelConfig,
        gains: Option<&[f64]>,
        model: Option<&'m dyn DynamicsModel>,
    ) -> SmcResult<Self> {
        macro_rules! with_gains {
            ($section:expr) => {{
                let mut section = $section.clone();
                if let Some(g) = gains {
                    section.gains = g.to_vec();
                }
                section
            }};
        }
        Ok(match kind {
            ControllerKind::Classical => {
                let cfg = with_gains!(config.classical);
                Self::Classical(match model {
                    Some(m) => ClassicalSmc::with_dynamics(&cfg, m)?,
                    None => ClassicalSmc::new(&cfg)?,
                })
            }
            ControllerKind::Adaptive => {
                let cfg = with_gains!(config.adaptive);
                Self::Adaptive(AdaptiveSmc::new(&cfg)?)
            }
            ControllerKind::SuperTwisting => {
                let cfg = with_gains!(config.super_twisting);
                Self::SuperTwisting(match model {
                    Some(m) => SuperTwistingSmc::with_dynamics(&cfg, m)?,
                    None => SuperTwistingSmc::new(&cfg)?,
                })
            }
            ControllerKind::Hybrid => {
                let cfg = with_gains!(config.hybrid);
                Self::Hybrid(match model {
                    Some(m) => HybridAdaptiveStaSmc::with_dynamics(&cfg, m)?,
                    None => HybridAdaptiveStaSmc::new(&cfg)?,
                })
            }
        })
    }

    pub fn kind(&self) -> ControllerKind {
        match self {
            Self::Classical(_) => ControllerKind::Classical,
            Self::Adaptive(_) => ControllerKind::Adaptive,
            Self::SuperTwisting(_) => ControllerKind::SuperTwisting,
            Self::Hybrid(_) => ControllerKind::Hybrid,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Classical(c) => c.name(),
            Self::Adaptive(c) => c.name(),
            Self::SuperTwisting(c) => c.name(),
            Self::Hybrid(c) => c.name(),
        }
    }

    pub fn gains(&self) -> &[f64] {
        match self {
            Self::Classical(c) => c.gains(),
            Self::Adaptive(c) => c.gains(),
            Self::SuperTwisting(c) => c.gains(),
            Self::Hybrid(c) => c.gains(),
        }
    }

    pub fn max_force(&self) -> f64 {
        match self {
            Self::Classical(c) => c.max_force(),
            Self::Adaptive(c) => c.max_force(),
            Self::SuperTwisting(c) => c.max_force(),
            Self::Hybrid(c) => c.max_force(),
        }
    }

    pub fn dt(&self) -> f64 {
        match self {
            Self::Classical(c) => c.dt(),
            Self::Adaptive(c) => c.dt(),
            Self::SuperTwisting(c) => c.dt(),
            Self::Hybrid(c) => c.dt(),
        }
    }

    pub fn initialize_state(&self) -> AnyState {
        match self {
            Self::Classical(c) => AnyState::Classical(c.initialize_state()),
            Self::Adaptive(c) => AnyState::Adaptive(c.initialize_state()),
            Self::SuperTwisting(c) => AnyState::SuperTwisting(c.initialize_state()),
            Self::Hybrid(c) => AnyState::Hybrid(c.initialize_state()),
        }
    }

    pub fn initialize_history(&self) -> History {
        match self {
            Self::Classical(c) => c.initialize_history(),
            Self::Adaptive(c) => c.initialize_history(),
            Self::SuperTwisting(c) => c.initialize_history(),
            Self::Hybrid(c) => c.initialize_history(),
        }
    }

    /// One control step. Fails only if `internal` belongs to another variant.
    pub fn compute(
        &self,
        state: &StateVector,
        internal: &AnyState,
        history: History,
    ) -> SmcResult<ControlOutput<AnyState>> {
        fn lift<S>(out: ControlOutput<S>, wrap: fn(S) -> AnyState) -> ControlOutput<AnyState> {
            ControlOutput {
                u: out.u,
                state: wrap(out.state),
                history: out.history,
                sigma: out.sigma,
            }
        }
        match (self, internal) {
            (Self::Classical(c), AnyState::Classical(s)) => {
                Ok(lift(c.compute(state, s, history), AnyState::Classical))
            }
            (Self::Adaptive(c), AnyState::Adaptive(s)) => {
                Ok(lift(c.compute(state, s, history), AnyState::Adaptive))
            }
            (Self::SuperTwisting(c), AnyState::SuperTwisting(s)) => {
                Ok(lift(c.compute(state, s, history), AnyState::SuperTwisting))
            }
            (Self::Hybrid(c), AnyState::Hybrid(s)) => {
                Ok(lift(c.compute(state, s, history), AnyState::Hybrid))
            }
            (c, s) => Err(SmcError::StateMismatch {
                controller: c.name(),
                got: s.kind().as_str(),
            }),
        }
    }

    /// One control step on a flat internal state, as used across the FFI boundary.
    pub fn compute_flat(
        &self,
        state: &[f64],
        internal: &[f64],
        history: History,
    ) -> SmcResult<ControlOutput<Vec<f64>>> {
        let state = StateVector::from_slice(state)?;
        let internal = AnyState::from_slice(self.kind(), internal)?;
        let out = self.compute(&state, &internal, history)?;
        Ok(ControlOutput {
            u: out.u,
            state: out.state.to_vec(),
            history: out.history,
            sigma: out.sigma,
        })
    }

    pub fn has_dynamics(&self) -> bool {
        match self {
            Self::Classical(c) => c.has_dynamics(),
            Self::Adaptive(c) => c.has_dynamics(),
            Self::SuperTwisting(c) => c.has_dynamics(),
            Self::Hybrid(c) => c.has_dynamics(),
        }
    }

    pub fn release_dynamics(&mut self) {
        match self {
            Self::Classical(c) => c.release_dynamics(),
            Self::Adaptive(c) => c.release_dynamics(),
            Self::SuperTwisting(c) => c.release_dynamics(),
            Self::Hybrid(c) => c.release_dynamics(),
        }
    }
}
