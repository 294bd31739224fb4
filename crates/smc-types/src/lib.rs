// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Type definitions, configuration, parameter validation and error
//! hierarchy for the sliding-mode control kernel of the double
//! inverted pendulum.

pub mod config;
pub mod error;
pub mod state;
pub mod validation;

pub use config::{
    AdaptiveConfig, ClassicalConfig, EmergencyLimits, EquivalentControlConfig, HybridConfig,
    KernelConfig, SuperTwistingConfig, SwitchMethod,
};
pub use error::{SmcError, SmcResult};
pub use state::{
    AdaptiveState, ClassicalState, ControlOutput, FlatState, History, HybridState, StateVector,
    SuperTwistingState,
};
