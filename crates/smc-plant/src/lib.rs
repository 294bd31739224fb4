// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Reference Plant
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Double inverted pendulum on a cart: physical parameters, the
//! `M·q̈ + C·q̇ + G = B·u` model used by the equivalent-control solver,
//! and a fixed-step RK4 integrator for closed-loop simulation.

pub mod dip;
pub mod params;

pub use dip::DoubleInvertedPendulum;
pub use params::DipParams;
