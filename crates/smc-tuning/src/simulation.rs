// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Closed-Loop Simulation
// ─────────────────────────────────────────────────────────────────────
//! Fixed-step closed loop: one controller step, then one RK4 plant
//! step with the force held, at the controller's `dt`.
//!
//! A run ends early, flagged `diverged`, when the plant integration
//! fails or the state leaves the configured envelope.

use serde::{Deserialize, Serialize};

use smc_core::AnyController;
use smc_plant::DoubleInvertedPendulum;
use smc_types::validation::require_positive;
use smc_types::{History, SmcError, SmcResult, StateVector};

/// Upper bound on control steps in one run.
pub const MAX_SIMULATION_STEPS: usize = 10_000_000;

/// Preallocation cap for trajectory buffers; longer runs grow on demand.
const PREALLOCATED_STEPS: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Simulated time (s).
    pub duration: f64,
    /// Envelope on |x| (m).
    pub position_limit: f64,
    /// Envelope on |θ1| and |θ2| (rad).
    pub angle_limit: f64,
    /// Keep the controller's telemetry in the trajectory.
    pub record_history: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            duration: 5.0,
            position_limit: 10.0,
            angle_limit: std::f64::consts::FRAC_PI_2,
            record_history: false,
        }
    }
}

impl SimulationSettings {
    pub fn validate(&self) -> SmcResult<()> {
        require_positive(self.duration, "duration", false)?;
        require_positive(self.position_limit, "position_limit", false)?;
        require_positive(self.angle_limit, "angle_limit", false)?;
        Ok(())
    }

    /// Number of control steps `duration` spans at `dt`.
    pub fn planned_steps(&self, dt: f64) -> SmcResult<usize> {
        self.validate()?;
        require_positive(dt, "dt", false)?;
        let steps = (self.duration / dt).round();
        if !(steps <= MAX_SIMULATION_STEPS as f64) {
            return Err(SmcError::Config(format!(
                "duration {} at dt {dt} exceeds {MAX_SIMULATION_STEPS} steps",
                self.duration
            )));
        }
        Ok(steps as usize)
    }

    fn within_envelope(&self, s: &StateVector) -> bool {
        s.is_finite()
            && s.x().abs() <= self.position_limit
            && s.theta1().abs() <= self.angle_limit
            && s.theta2().abs() <= self.angle_limit
    }
}

/// Sampled closed-loop run. `states` has one more entry than `controls`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub dt: f64,
    /// Steps requested by the settings; fewer were taken if `diverged`.
    pub planned_steps: usize,
    pub times: Vec<f64>,
    pub states: Vec<StateVector>,
    pub controls: Vec<f64>,
    pub sigmas: Vec<f64>,
    pub diverged: bool,
    pub history: History,
}

impl Trajectory {
    /// Number of control steps taken.
    pub fn steps(&self) -> usize {
        self.controls.len()
    }

    pub fn final_state(&self) -> Option<&StateVector> {
        self.states.last()
    }

    /// Fraction of the planned horizon that was not simulated.
    pub fn remaining_fraction(&self) -> f64 {
        if self.planned_steps == 0 {
            return 0.0;
        }
        1.0 - self.steps() as f64 / self.planned_steps as f64
    }
}

/// Run `controller` against `plant` from `initial`.
///
/// Fails only if the settings are invalid or the controller is handed
/// a state record of another variant; plant trouble ends the run with
/// `diverged` set.
pub fn simulate(
    controller: &AnyController<'_>,
    plant: &DoubleInvertedPendulum,
    initial: &StateVector,
    settings: &SimulationSettings,
) -> SmcResult<Trajectory> {
    let dt = controller.dt();
    let planned_steps = settings.planned_steps(dt)?;
    let capacity = planned_steps.min(PREALLOCATED_STEPS);

    let mut traj = Trajectory {
        dt,
        planned_steps,
        times: Vec::with_capacity(capacity + 1),
        states: Vec::with_capacity(capacity + 1),
        controls: Vec::with_capacity(capacity),
        sigmas: Vec::with_capacity(capacity),
        diverged: !settings.within_envelope(initial),
        history: History::disabled(),
    };
    traj.times.push(0.0);
    traj.states.push(*initial);
    if traj.diverged {
        return Ok(traj);
    }

    let mut state = *initial;
    let mut internal = controller.initialize_state();
    let mut history = if settings.record_history {
        controller.initialize_history()
    } else {
        History::disabled()
    };

    for step in 0..planned_steps {
        let out = controller.compute(&state, &internal, history)?;
        internal = out.state;
        history = out.history;
        traj.controls.push(out.u);
        traj.sigmas.push(out.sigma);

        state = match plant.rk4_step(&state, out.u, dt) {
            Ok(next) => next,
            Err(e) => {
                log::debug!("{}: plant integration failed at step {step}: {e}", controller.name());
                traj.diverged = true;
                break;
            }
        };
        traj.times.push((step + 1) as f64 * dt);
        traj.states.push(state);
        if !settings.within_envelope(&state) {
            traj.diverged = true;
            break;
        }
    }

    traj.history = history;
    Ok(traj)
}
