// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Controller Interface
// ─────────────────────────────────────────────────────────────────────
//! Common per-step interface of the four sliding-mode laws.
//!
//! `compute` takes `&self`: a controller holds only its validated
//! gains and an optional borrowed dynamics model, so the same
//! inputs always produce the same output and instances can be shared
//! across threads. Everything that evolves over time lives in the
//! caller-owned `State` record and the `History` passed through.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

use smc_types::{ControlOutput, FlatState, History, StateVector};

pub trait SlidingModeController: Send + Sync {
    /// Fixed-shape internal state threaded between steps.
    type State: FlatState + Copy + PartialEq + std::fmt::Debug + Send + Sync;

    fn name(&self) -> &'static str;

    fn gains(&self) -> &[f64];

    fn n_gains(&self) -> usize {
        self.gains().len()
    }

    fn max_force(&self) -> f64;

    fn dt(&self) -> f64;

    /// Internal state for the first step.
    fn initialize_state(&self) -> Self::State;

    /// Recording history with this controller's signals registered.
    fn initialize_history(&self) -> History;

    /// Evaluate the control law once.
    ///
    /// Never fails and never returns a non-finite force:
    /// `|output.u| <= max_force()` for every input.
    fn compute(
        &self,
        state: &StateVector,
        internal: &Self::State,
        history: History,
    ) -> ControlOutput<Self::State>;

    fn has_dynamics(&self) -> bool;

    /// Drop the borrowed dynamics model; later steps run model-free.
    fn release_dynamics(&mut self);
}

/// Apply a row predicate to a batch of candidate gain vectors.
///
/// Rows whose width is not in `widths` are infeasible.
pub(crate) fn feasibility_mask(
    rows: ArrayView2<'_, f64>,
    widths: &[usize],
    predicate: impl Fn(ArrayView1<'_, f64>) -> bool,
) -> Array1<bool> {
    if !widths.contains(&rows.ncols()) {
        return Array1::from_elem(rows.nrows(), false);
    }
    rows.map_axis(Axis(1), |row| {
        row.iter().all(|g| g.is_finite()) && predicate(row)
    })
}

/// Report a non-finite σ as 0 so telemetry and callers never see NaN.
#[inline]
pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
