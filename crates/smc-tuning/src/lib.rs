// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Gain Tuning Support
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Everything an external particle-swarm optimizer needs around the
//! control laws: closed-loop simulation against the reference plant,
//! a scalar cost, a parallel batch evaluator that screens candidates
//! with the feasibility predicate first, and crash-safe checkpoints.
//!
//! The swarm update itself lives with the optimizer.

pub mod checkpoint;
pub mod cost;
pub mod evaluator;
pub mod simulation;

pub use checkpoint::{CheckpointConfig, CheckpointManager, PsoCheckpoint};
pub use cost::{trajectory_cost, CostWeights};
pub use evaluator::CandidateEvaluator;
pub use simulation::{simulate, SimulationSettings, Trajectory};
