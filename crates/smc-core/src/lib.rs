// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Control Laws
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Sliding-mode control laws for a cart with two pivoted links.
//!
//! Four per-step evaluators share one set of numerical primitives:
//! saturation, sliding surfaces and a regularised equivalent-control
//! solve against an optional borrowed plant model.
//!
//! # Safety Invariants
//!
//! 1. **Bounded output**: every `compute` returns a finite force with
//!    `|u| <= max_force`, for any input state including NaN and ±∞.
//!
//! 2. **No hidden state**: controllers are immutable after construction.
//!    Adaptive gains and integrals live in the caller-owned state record,
//!    so identical inputs give identical outputs.
//!
//! 3. **Degradation, not failure**: a failed, singular or poorly
//!    controllable dynamics query drops the feed-forward term to zero.
//!    Nothing inside a step returns an error.
//!
//! 4. **Guard after the law**: the hybrid emergency override inspects a
//!    finished nominal step and is never interleaved with it.

pub mod adaptive;
pub mod classical;
pub mod controller;
pub mod dynamics;
pub mod emergency;
pub mod equivalent;
pub mod factory;
pub mod hybrid;
pub mod saturation;
pub mod super_twisting;
pub mod surface;

pub use adaptive::AdaptiveSmc;
pub use classical::ClassicalSmc;
pub use controller::SlidingModeController;
pub use dynamics::{DynamicsModel, ExternalDynamics, PhysicsMatrices};
pub use emergency::{EmergencyGuard, EmergencyTrigger, HybridStep};
pub use equivalent::EquivalentControl;
pub use factory::{AnyController, AnyState, ControllerKind};
pub use hybrid::HybridAdaptiveStaSmc;
pub use saturation::{ramp, saturate, smooth_sign};
pub use super_twisting::SuperTwistingSmc;
pub use surface::{HybridSurface, LinearSurface};
