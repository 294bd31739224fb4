// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Candidate Evaluator
// ─────────────────────────────────────────────────────────────────────
//! Batch cost evaluation for a swarm of candidate gain vectors.
//!
//! Rows are screened with the variant's feasibility predicate first;
//! infeasible rows get the penalty cost without being simulated. The
//! rest run in parallel on the rayon pool, each with its own controller
//! instance. All instances borrow the same query-only plant.

use ndarray::{Array1, ArrayView2};
use rayon::prelude::*;

use smc_core::{AnyController, ControllerKind, DynamicsModel};
use smc_plant::DoubleInvertedPendulum;
use smc_types::{KernelConfig, SmcError, SmcResult, StateVector};

use crate::cost::{trajectory_cost, CostWeights};
use crate::simulation::{simulate, SimulationSettings};

pub struct CandidateEvaluator<'p> {
    kind: ControllerKind,
    config: KernelConfig,
    plant: &'p DoubleInvertedPendulum,
    initial_states: Vec<StateVector>,
    settings: SimulationSettings,
    weights: CostWeights,
    use_model: bool,
}

impl<'p> CandidateEvaluator<'p> {
    pub fn new(
        kind: ControllerKind,
        config: KernelConfig,
        plant: &'p DoubleInvertedPendulum,
    ) -> SmcResult<Self> {
        config.validate()?;
        Ok(Self {
            kind,
            config,
            plant,
            initial_states: vec![StateVector::new(0.0, 0.1, 0.05, 0.0, 0.0, 0.0)],
            settings: SimulationSettings::default(),
            weights: CostWeights::default(),
            use_model: false,
        })
    }

    /// Replace the initial-condition set. It must not be empty.
    pub fn with_initial_states(mut self, states: Vec<StateVector>) -> SmcResult<Self> {
        if states.is_empty() {
            return Err(SmcError::Config(
                "candidate evaluation needs at least one initial state".into(),
            ));
        }
        self.initial_states = states;
        Ok(self)
    }

    pub fn with_settings(mut self, settings: SimulationSettings) -> SmcResult<Self> {
        settings.validate()?;
        self.settings = settings;
        Ok(self)
    }

    pub fn with_weights(mut self, weights: CostWeights) -> SmcResult<Self> {
        weights.validate()?;
        self.weights = weights;
        Ok(self)
    }

    /// Let controllers use the plant for their equivalent-control term.
    pub fn with_equivalent_control(mut self, enabled: bool) -> Self {
        self.use_model = enabled;
        self
    }

    pub fn kind(&self) -> ControllerKind {
        self.kind
    }

    pub fn weights(&self) -> &CostWeights {
        &self.weights
    }

    /// Mean cost over the initial states for one gain vector.
    ///
    /// Construction failure costs `infeasible_penalty`.
    pub fn evaluate(&self, gains: &[f64]) -> f64 {
        let model: Option<&dyn DynamicsModel> = if self.use_model {
            Some(self.plant)
        } else {
            None
        };
        let mut controller = match AnyController::build(self.kind, &self.config, Some(gains), model)
        {
            Ok(c) => c,
            Err(e) => {
                log::debug!("{}: rejecting candidate {gains:?}: {e}", self.kind);
                return self.weights.infeasible_penalty;
            }
        };

        let mut total = 0.0;
        for initial in &self.initial_states {
            total += match simulate(&controller, self.plant, initial, &self.settings) {
                Ok(traj) => trajectory_cost(&traj, &self.weights),
                Err(e) => {
                    log::debug!("{}: simulation failed for {gains:?}: {e}", self.kind);
                    self.weights.infeasible_penalty
                }
            };
        }
        controller.release_dynamics();
        total / self.initial_states.len() as f64
    }

    /// Costs for every row of `rows`, in row order.
    pub fn evaluate_batch(&self, rows: ArrayView2<'_, f64>) -> Array1<f64> {
        let feasible = self.kind.validate_gains(rows);
        let candidates: Vec<(bool, Vec<f64>)> = rows
            .outer_iter()
            .zip(feasible.iter())
            .map(|(row, &ok)| (ok, row.to_vec()))
            .collect();

        let costs: Vec<f64> = candidates
            .par_iter()
            .map(|(ok, gains)| {
                if *ok {
                    self.evaluate(gains)
                } else {
                    self.weights.infeasible_penalty
                }
            })
            .collect();
        Array1::from(costs)
    }
}
