// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — PyO3 FFI Bindings
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
// Note: #[deny(unsafe_code)] not applied — PyO3 proc macros generate
// unsafe blocks internally. All hand-written code in this crate is safe.
//! Python-callable wrappers around the SMC kernel.
//!
//! Exposes `SmcController`, `CandidateEvaluator`, `CheckpointManager`
//! and the per-variant gain helpers to Python via PyO3.
//!
//! # FFI Safety
//!
//! - Every kernel error surfaces as `ValueError`; nothing panics across the boundary.
//! - Internal state crosses as a flat list and is shape-checked on entry.
//! - Controllers built here are model-free; the equivalent-control
//!   term is available through `CandidateEvaluator`, which owns its plant.
//! - Batch evaluation releases the GIL while the rayon pool runs.
//!
//! Install: `pip install -e crates/smc-ffi` (requires maturin).
//!
//! Usage from Python:
//! ```python
//! from smc_kernel import SmcController
//!
//! ctrl = SmcController("hybrid_adaptive_sta_smc")
//! out = ctrl.compute([0.0, 0.1, 0.05, 0.0, 0.0, 0.0])
//! out = ctrl.compute(next_state, out["state"], out["history"])
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use ndarray::Array2;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use smc_core::{AnyController, ControllerKind};
use smc_plant::{DipParams, DoubleInvertedPendulum};
use smc_tuning::{
    CandidateEvaluator, CheckpointConfig, CheckpointManager, CostWeights, PsoCheckpoint,
    SimulationSettings,
};
use smc_types::{History, KernelConfig, SmcError, SmcResult, StateVector};

fn value_err(e: SmcError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn parse_kind(kind: &str) -> PyResult<ControllerKind> {
    kind.parse().map_err(value_err)
}

fn parse_config(config_json: Option<&str>) -> PyResult<KernelConfig> {
    let config = match config_json {
        Some(json) => KernelConfig::from_json(json).map_err(value_err)?,
        None => KernelConfig::default(),
    };
    config.validate().map_err(value_err)?;
    Ok(config)
}

/// Rows of a Python list-of-lists as a dense matrix; ragged input is an error.
fn rows_to_array(rows: Vec<Vec<f64>>) -> PyResult<Array2<f64>> {
    let n = rows.len();
    let width = rows.first().map_or(0, Vec::len);
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(PyValueError::new_err(format!(
            "row {i} has {} entries, expected {width}",
            row.len()
        )));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n, width), flat).map_err(|e| PyValueError::new_err(e.to_string()))
}

// ─── SmcController ──────────────────────────────────────────────────

/// One sliding-mode controller. State and history are threaded by the caller.
#[pyclass(name = "SmcController")]
struct PySmcController {
    inner: AnyController<'static>,
}

#[pymethods]
impl PySmcController {
    /// `kind` accepts `classical_smc`, `adaptive_smc`, `sta_smc`,
    /// `hybrid_adaptive_sta_smc` or their short forms.
    #[new]
    #[pyo3(signature = (kind, gains = None, config_json = None))]
    fn new(kind: &str, gains: Option<Vec<f64>>, config_json: Option<&str>) -> PyResult<Self> {
        let kind = parse_kind(kind)?;
        let config = parse_config(config_json)?;
        let inner =
            AnyController::build(kind, &config, gains.as_deref(), None).map_err(value_err)?;
        Ok(Self { inner })
    }

    #[getter]
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    #[getter]
    fn gains(&self) -> Vec<f64> {
        self.inner.gains().to_vec()
    }

    #[getter]
    fn n_gains(&self) -> usize {
        self.inner.gains().len()
    }

    #[getter]
    fn max_force(&self) -> f64 {
        self.inner.max_force()
    }

    #[getter]
    fn dt(&self) -> f64 {
        self.inner.dt()
    }

    fn initialize_state(&self) -> Vec<f64> {
        self.inner.initialize_state().to_vec()
    }

    fn initialize_history(&self) -> BTreeMap<String, Vec<f64>> {
        self.inner.initialize_history().into_inner()
    }

    /// One control step.
    ///
    /// Returns `{"u", "state", "sigma", "history"}`. Omitting `internal`
    /// starts from the initial state; omitting `history` records nothing.
    #[pyo3(signature = (state, internal = None, history = None))]
    fn compute(
        &self,
        state: Vec<f64>,
        internal: Option<Vec<f64>>,
        history: Option<BTreeMap<String, Vec<f64>>>,
    ) -> PyResult<PyObject> {
        let internal = internal.unwrap_or_else(|| self.initialize_state());
        let history = history.map_or_else(History::disabled, History::from);
        let out = self
            .inner
            .compute_flat(&state, &internal, history)
            .map_err(value_err)?;
        Python::with_gil(|py| {
            let dict = PyDict::new(py);
            dict.set_item("u", out.u)?;
            dict.set_item("state", out.state)?;
            dict.set_item("sigma", out.sigma)?;
            dict.set_item("history", out.history.into_inner())?;
            Ok(dict.into())
        })
    }

    fn __repr__(&self) -> String {
        format!(
            "SmcController({}, gains={:?}, max_force={})",
            self.inner.name(),
            self.inner.gains(),
            self.inner.max_force()
        )
    }
}

// ─── Gain helpers ───────────────────────────────────────────────────

/// Per-row feasibility of candidate gain vectors.
#[pyfunction]
fn validate_gains(kind: &str, rows: Vec<Vec<f64>>) -> PyResult<Vec<bool>> {
    let kind = parse_kind(kind)?;
    let rows = rows_to_array(rows)?;
    Ok(kind.validate_gains(rows.view()).to_vec())
}

/// PSO search box `(lower, upper)`.
#[pyfunction]
fn gain_bounds(kind: &str) -> PyResult<(Vec<f64>, Vec<f64>)> {
    Ok(parse_kind(kind)?.gain_bounds())
}

#[pyfunction]
fn default_gains(kind: &str) -> PyResult<Vec<f64>> {
    Ok(parse_kind(kind)?.default_gains())
}

// ─── CandidateEvaluator ─────────────────────────────────────────────

/// Closed-loop cost of candidate gains against the reference pendulum.
#[pyclass(name = "CandidateEvaluator")]
struct PyCandidateEvaluator {
    kind: ControllerKind,
    config: KernelConfig,
    plant: DoubleInvertedPendulum,
    initial_states: Vec<StateVector>,
    settings: SimulationSettings,
    weights: CostWeights,
    equivalent_control: bool,
}

impl PyCandidateEvaluator {
    fn evaluator(&self) -> SmcResult<CandidateEvaluator<'_>> {
        let mut eval = CandidateEvaluator::new(self.kind, self.config.clone(), &self.plant)?
            .with_settings(self.settings.clone())?
            .with_weights(self.weights.clone())?
            .with_equivalent_control(self.equivalent_control);
        if !self.initial_states.is_empty() {
            eval = eval.with_initial_states(self.initial_states.clone())?;
        }
        Ok(eval)
    }
}

#[pymethods]
impl PyCandidateEvaluator {
    #[new]
    #[pyo3(signature = (
        kind,
        config_json = None,
        plant_json = None,
        initial_states = None,
        duration = 5.0,
        equivalent_control = false,
    ))]
    fn new(
        kind: &str,
        config_json: Option<&str>,
        plant_json: Option<&str>,
        initial_states: Option<Vec<Vec<f64>>>,
        duration: f64,
        equivalent_control: bool,
    ) -> PyResult<Self> {
        let kind = parse_kind(kind)?;
        let config = parse_config(config_json)?;
        let params = match plant_json {
            Some(json) => DipParams::from_json(json).map_err(value_err)?,
            None => DipParams::default(),
        };
        let plant = DoubleInvertedPendulum::new(params).map_err(value_err)?;
        let initial_states = initial_states
            .unwrap_or_default()
            .iter()
            .map(|s| StateVector::from_slice(s))
            .collect::<SmcResult<Vec<_>>>()
            .map_err(value_err)?;
        let settings = SimulationSettings {
            duration,
            ..Default::default()
        };
        settings.validate().map_err(value_err)?;
        Ok(Self {
            kind,
            config,
            plant,
            initial_states,
            settings,
            weights: CostWeights::default(),
            equivalent_control,
        })
    }

    fn evaluate(&self, gains: Vec<f64>) -> PyResult<f64> {
        Ok(self.evaluator().map_err(value_err)?.evaluate(&gains))
    }

    /// Costs for a swarm, one per row. Infeasible rows get the penalty.
    fn evaluate_batch(&self, py: Python<'_>, rows: Vec<Vec<f64>>) -> PyResult<Vec<f64>> {
        let rows = rows_to_array(rows)?;
        let eval = self.evaluator().map_err(value_err)?;
        let costs = py.allow_threads(|| eval.evaluate_batch(rows.view()));
        Ok(costs.to_vec())
    }

    #[getter]
    fn infeasible_penalty(&self) -> f64 {
        self.weights.infeasible_penalty
    }
}

// ─── CheckpointManager ──────────────────────────────────────────────

/// Crash-safe PSO checkpoint store.
#[pyclass(name = "CheckpointManager")]
struct PyCheckpointManager {
    inner: CheckpointManager,
}

fn checkpoint_to_dict(py: Python<'_>, cp: PsoCheckpoint) -> PyResult<PyObject> {
    let dict = PyDict::new(py);
    dict.set_item("iteration", cp.iteration)?;
    dict.set_item("controller", cp.controller.as_str())?;
    dict.set_item("positions", cp.positions)?;
    dict.set_item("velocities", cp.velocities)?;
    dict.set_item("personal_best_positions", cp.personal_best_positions)?;
    dict.set_item("personal_best_costs", cp.personal_best_costs)?;
    dict.set_item("global_best_position", cp.global_best_position)?;
    dict.set_item("global_best_cost", cp.global_best_cost)?;
    dict.set_item("cost_history", cp.cost_history)?;
    dict.set_item("timestamp", cp.timestamp)?;
    dict.set_item("metadata", cp.metadata)?;
    Ok(dict.into())
}

#[pymethods]
impl PyCheckpointManager {
    #[new]
    #[pyo3(signature = (dir, interval = 10, max_checkpoints = 5, prefix = "pso_checkpoint"))]
    fn new(dir: PathBuf, interval: usize, max_checkpoints: usize, prefix: &str) -> PyResult<Self> {
        let inner = CheckpointManager::new(CheckpointConfig {
            dir,
            interval,
            max_checkpoints,
            prefix: prefix.to_string(),
        })
        .map_err(value_err)?;
        Ok(Self { inner })
    }

    fn should_checkpoint(&self, iteration: usize) -> bool {
        self.inner.should_checkpoint(iteration)
    }

    /// Durably persist one iteration; returns the checkpoint path.
    #[pyo3(signature = (
        iteration,
        controller,
        positions,
        velocities,
        personal_best_positions,
        personal_best_costs,
        global_best_position,
        global_best_cost,
        cost_history = Vec::new(),
        metadata = None,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn save(
        &self,
        iteration: usize,
        controller: &str,
        positions: Vec<Vec<f64>>,
        velocities: Vec<Vec<f64>>,
        personal_best_positions: Vec<Vec<f64>>,
        personal_best_costs: Vec<f64>,
        global_best_position: Vec<f64>,
        global_best_cost: f64,
        cost_history: Vec<f64>,
        metadata: Option<BTreeMap<String, String>>,
    ) -> PyResult<String> {
        let checkpoint = PsoCheckpoint {
            iteration,
            controller: parse_kind(controller)?,
            positions,
            velocities,
            personal_best_positions,
            personal_best_costs,
            global_best_position,
            global_best_cost,
            cost_history,
            timestamp: 0,
            metadata: metadata.unwrap_or_default(),
        };
        let path = self.inner.save(&checkpoint).map_err(value_err)?;
        Ok(path.display().to_string())
    }

    /// Newest readable checkpoint as a dict, or None.
    fn load_latest(&self, py: Python<'_>) -> PyResult<Option<PyObject>> {
        match self.inner.load_latest().map_err(value_err)? {
            Some(cp) => Ok(Some(checkpoint_to_dict(py, cp)?)),
            None => Ok(None),
        }
    }

    /// `(iteration, path)` pairs, oldest first.
    fn list(&self) -> PyResult<Vec<(usize, String)>> {
        Ok(self
            .inner
            .list()
            .map_err(value_err)?
            .into_iter()
            .map(|(it, path)| (it, path.display().to_string()))
            .collect())
    }

    fn clear(&self) -> PyResult<usize> {
        self.inner.clear().map_err(value_err)
    }
}

// ─── Module ─────────────────────────────────────────────────────────

#[pymodule]
fn smc_kernel(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Control laws
    m.add_class::<PySmcController>()?;
    m.add_function(wrap_pyfunction!(validate_gains, m)?)?;
    m.add_function(wrap_pyfunction!(gain_bounds, m)?)?;
    m.add_function(wrap_pyfunction!(default_gains, m)?)?;
    // Tuning
    m.add_class::<PyCandidateEvaluator>()?;
    m.add_class::<PyCheckpointManager>()?;
    Ok(())
}
