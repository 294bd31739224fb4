// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all SMC kernel failures.
///
/// Only construction, configuration and I/O paths return these. The
/// per-step control laws never fail: numerical trouble inside a step is
/// absorbed locally and the commanded force degrades to a finite value.
#[derive(Error, Debug)]
pub enum SmcError {
    /// Gain vector has the wrong number of entries for the controller.
    #[error("{controller} expects {expected} gains, got {got}")]
    InvalidGainCount {
        controller: &'static str,
        expected: String,
        got: usize,
    },

    /// A scalar parameter violates its constraint.
    #[error("parameter '{name}' must be {constraint}, got {value}")]
    InvalidParameter {
        name: String,
        constraint: String,
        value: f64,
    },

    /// Two related bounds are ordered inconsistently (min > max, low >= high, ...).
    #[error("bound ordering error: {0}")]
    BoundOrdering(String),

    /// Flat internal-state slice does not match the controller's state record.
    #[error("{controller} state expects {expected} values, got {got}")]
    StateShape {
        controller: &'static str,
        expected: usize,
        got: usize,
    },

    /// Internal-state record belongs to a different controller variant.
    #[error("{controller} cannot step with {got} state")]
    StateMismatch {
        controller: &'static str,
        got: &'static str,
    },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Numerical error (NaN/Inf, singular matrix) outside the control laws.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Checkpoint persistence failure.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SmcResult<T> = Result<T, SmcError>;
