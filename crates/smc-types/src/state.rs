// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — State, History and Output Records
// ─────────────────────────────────────────────────────────────────────
//! Plain data records exchanged with the control laws.
//!
//! Internal controller state is always owned by the caller and threaded
//! explicitly from one step to the next. Each controller variant has its
//! own fixed-shape record; the flat `Vec<f64>` form exists only for the
//! FFI boundary and checkpoints, and converting back from a slice of the
//! wrong length is an error rather than a best-effort guess.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{SmcError, SmcResult};

/// Plant state `[x, θ1, θ2, ẋ, θ̇1, θ̇2]`.
///
/// Angles are measured from the upright equilibrium.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StateVector(pub [f64; 6]);

impl StateVector {
    pub const fn new(
        x: f64,
        theta1: f64,
        theta2: f64,
        x_dot: f64,
        theta1_dot: f64,
        theta2_dot: f64,
    ) -> Self {
        Self([x, theta1, theta2, x_dot, theta1_dot, theta2_dot])
    }

    pub const fn zeros() -> Self {
        Self([0.0; 6])
    }

    pub fn from_slice(values: &[f64]) -> SmcResult<Self> {
        let arr: [f64; 6] = values.try_into().map_err(|_| SmcError::StateShape {
            controller: "StateVector",
            expected: 6,
            got: values.len(),
        })?;
        Ok(Self(arr))
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.0[0]
    }
    #[inline]
    pub fn theta1(&self) -> f64 {
        self.0[1]
    }
    #[inline]
    pub fn theta2(&self) -> f64 {
        self.0[2]
    }
    #[inline]
    pub fn x_dot(&self) -> f64 {
        self.0[3]
    }
    #[inline]
    pub fn theta1_dot(&self) -> f64 {
        self.0[4]
    }
    #[inline]
    pub fn theta2_dot(&self) -> f64 {
        self.0[5]
    }

    /// Generalized coordinates `q = [x, θ1, θ2]`.
    #[inline]
    pub fn positions(&self) -> [f64; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    /// Generalized velocities `q̇ = [ẋ, θ̇1, θ̇2]`.
    #[inline]
    pub fn velocities(&self) -> [f64; 3] {
        [self.0[3], self.0[4], self.0[5]]
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    pub fn position_norm(&self) -> f64 {
        self.positions().iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    pub fn velocity_norm(&self) -> f64 {
        self.velocities().iter().map(|v| v * v).sum::<f64>().sqrt()
    }
}

impl From<[f64; 6]> for StateVector {
    fn from(values: [f64; 6]) -> Self {
        Self(values)
    }
}

/// Append-only telemetry: signal name → time series.
///
/// A disabled history accepts pushes and drops them, so the control
/// laws can record unconditionally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    enabled: bool,
    series: BTreeMap<String, Vec<f64>>,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    /// Empty, recording history.
    pub fn new() -> Self {
        Self {
            enabled: true,
            series: BTreeMap::new(),
        }
    }

    /// History that discards every sample.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            series: BTreeMap::new(),
        }
    }

    /// Recording history with the given signals pre-registered.
    pub fn with_signals(names: &[&str]) -> Self {
        let mut h = Self::new();
        for name in names {
            h.series.entry((*name).to_string()).or_default();
        }
        h
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn push(&mut self, name: &str, value: f64) {
        if !self.enabled {
            return;
        }
        match self.series.get_mut(name) {
            Some(series) => series.push(value),
            None => {
                self.series.insert(name.to_string(), vec![value]);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(Vec::as_slice)
    }

    /// Most recent sample of a signal.
    pub fn last(&self, name: &str) -> Option<f64> {
        self.series.get(name).and_then(|s| s.last().copied())
    }

    pub fn len(&self, name: &str) -> usize {
        self.series.get(name).map_or(0, Vec::len)
    }

    pub fn signals(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(Vec::is_empty)
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<f64>> {
        self.series
    }
}

impl From<BTreeMap<String, Vec<f64>>> for History {
    fn from(series: BTreeMap<String, Vec<f64>>) -> Self {
        Self {
            enabled: true,
            series,
        }
    }
}

/// Result of one control step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlOutput<S> {
    /// Commanded cart force (N), always within `[-max_force, max_force]`.
    pub u: f64,
    /// Internal state to pass into the next step.
    pub state: S,
    /// Telemetry, returned to the caller after this step's samples.
    pub history: History,
    /// Sliding-surface value for this step.
    pub sigma: f64,
}

/// Flat conversion for the per-variant internal-state records.
pub trait FlatState: Sized {
    const LEN: usize;
    const NAME: &'static str;

    fn to_vec(&self) -> Vec<f64>;
    fn from_values(values: &[f64]) -> Self;

    fn from_slice(values: &[f64]) -> SmcResult<Self> {
        if values.len() != Self::LEN {
            return Err(SmcError::StateShape {
                controller: Self::NAME,
                expected: Self::LEN,
                got: values.len(),
            });
        }
        Ok(Self::from_values(values))
    }
}

/// The classical law carries no state between steps.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassicalState;

impl FlatState for ClassicalState {
    const LEN: usize = 0;
    const NAME: &'static str = "ClassicalSmc";

    fn to_vec(&self) -> Vec<f64> {
        Vec::new()
    }

    fn from_values(_values: &[f64]) -> Self {
        ClassicalState
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveState {
    /// Adaptive switching gain K.
    pub k: f64,
    /// Force commanded on the previous step.
    pub last_u: f64,
    /// Continuous time spent inside the boundary layer (s).
    pub time_in_sliding: f64,
}

impl FlatState for AdaptiveState {
    const LEN: usize = 3;
    const NAME: &'static str = "AdaptiveSmc";

    fn to_vec(&self) -> Vec<f64> {
        vec![self.k, self.last_u, self.time_in_sliding]
    }

    fn from_values(v: &[f64]) -> Self {
        Self {
            k: v[0],
            last_u: v[1],
            time_in_sliding: v[2],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SuperTwistingState {
    /// Integral (disturbance) estimate z.
    pub z: f64,
    /// Sliding-surface value of the previous step.
    pub sigma_prev: f64,
}

impl FlatState for SuperTwistingState {
    const LEN: usize = 2;
    const NAME: &'static str = "SuperTwistingSmc";

    fn to_vec(&self) -> Vec<f64> {
        vec![self.z, self.sigma_prev]
    }

    fn from_values(v: &[f64]) -> Self {
        Self {
            z: v[0],
            sigma_prev: v[1],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridState {
    pub k1: f64,
    pub k2: f64,
    /// Super-twisting integral term.
    pub u_int: f64,
}

impl FlatState for HybridState {
    const LEN: usize = 3;
    const NAME: &'static str = "HybridAdaptiveStaSmc";

    fn to_vec(&self) -> Vec<f64> {
        vec![self.k1, self.k2, self.u_int]
    }

    fn from_values(v: &[f64]) -> Self {
        Self {
            k1: v[0],
            k2: v[1],
            u_int: v[2],
        }
    }
}
