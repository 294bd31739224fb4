// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Parameter Validator
// ─────────────────────────────────────────────────────────────────────
//! Pure construction-time checks.
//!
//! Every failure names the parameter, the violated constraint and the
//! offending value so a bad tuning candidate or config file is obvious
//! from the message alone.

use crate::error::{SmcError, SmcResult};

fn invalid(name: &str, constraint: impl Into<String>, value: f64) -> SmcError {
    SmcError::InvalidParameter {
        name: name.to_string(),
        constraint: constraint.into(),
        value,
    }
}

/// Require a finite value.
pub fn require_finite(value: f64, name: &str) -> SmcResult<f64> {
    if !value.is_finite() {
        return Err(invalid(name, "finite", value));
    }
    Ok(value)
}

/// Require `value > 0` (or `value >= 0` when `allow_zero`).
///
/// NaN and infinities are rejected.
pub fn require_positive(value: f64, name: &str, allow_zero: bool) -> SmcResult<f64> {
    require_finite(value, name)?;
    if allow_zero {
        if value < 0.0 {
            return Err(invalid(name, ">= 0", value));
        }
    } else if value <= 0.0 {
        return Err(invalid(name, "> 0", value));
    }
    Ok(value)
}

/// Require `min <= value <= max` (inclusive) or `min < value < max`.
pub fn require_in_range(
    value: f64,
    name: &str,
    min: f64,
    max: f64,
    inclusive: bool,
) -> SmcResult<f64> {
    require_finite(value, name)?;
    let ok = if inclusive {
        (min..=max).contains(&value)
    } else {
        value > min && value < max
    };
    if !ok {
        let constraint = if inclusive {
            format!("in [{min}, {max}]")
        } else {
            format!("in ({min}, {max})")
        };
        return Err(invalid(name, constraint, value));
    }
    Ok(value)
}

/// Require a probability in [0, 1].
pub fn require_probability(value: f64, name: &str) -> SmcResult<f64> {
    require_in_range(value, name, 0.0, 1.0, true)
}

/// Require `lower <= upper` for a pair of related bounds.
pub fn require_ordered(
    lower: f64,
    lower_name: &str,
    upper: f64,
    upper_name: &str,
    strict: bool,
) -> SmcResult<()> {
    let ok = if strict { lower < upper } else { lower <= upper };
    if !ok {
        let op = if strict { "<" } else { "<=" };
        return Err(SmcError::BoundOrdering(format!(
            "{lower_name} ({lower}) must be {op} {upper_name} ({upper})"
        )));
    }
    Ok(())
}

/// Require an exact gain-vector length.
pub fn require_gain_count(
    gains: &[f64],
    controller: &'static str,
    allowed: &[usize],
) -> SmcResult<()> {
    if !allowed.contains(&gains.len()) {
        let expected = allowed
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(" or ");
        return Err(SmcError::InvalidGainCount {
            controller,
            expected,
            got: gains.len(),
        });
    }
    Ok(())
}

/// Require a vector of exactly `expected` values.
pub fn require_len(values: &[f64], name: &'static str, expected: usize) -> SmcResult<()> {
    require_gain_count(values, name, &[expected])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_accepts_positive() {
        assert_eq!(require_positive(2.5, "k1", false).unwrap(), 2.5);
    }

    #[test]
    fn test_positive_rejects_zero_unless_allowed() {
        assert!(require_positive(0.0, "kd", false).is_err());
        assert_eq!(require_positive(0.0, "kd", true).unwrap(), 0.0);
    }

    #[test]
    fn test_positive_rejects_negative_and_nan() {
        assert!(require_positive(-1.0, "kd", true).is_err());
        assert!(require_positive(f64::NAN, "kd", true).is_err());
        assert!(require_positive(f64::INFINITY, "kd", false).is_err());
    }

    #[test]
    fn test_error_names_parameter() {
        let err = require_positive(-3.0, "leak_rate", false).unwrap_err();
        match err {
            SmcError::InvalidParameter { name, constraint, value } => {
                assert_eq!(name, "leak_rate");
                assert_eq!(constraint, "> 0");
                assert_eq!(value, -3.0);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_range_inclusive_and_exclusive() {
        assert!(require_in_range(1.0, "p", 0.0, 1.0, true).is_ok());
        assert!(require_in_range(1.0, "p", 0.0, 1.0, false).is_err());
        assert!(require_in_range(0.5, "p", 0.0, 1.0, false).is_ok());
        assert!(require_in_range(-0.1, "p", 0.0, 1.0, true).is_err());
    }

    #[test]
    fn test_probability() {
        assert!(require_probability(0.05, "reset_fraction").is_ok());
        assert!(require_probability(1.2, "reset_fraction").is_err());
    }

    #[test]
    fn test_ordered() {
        assert!(require_ordered(0.1, "K_min", 10.0, "K_max", false).is_ok());
        assert!(require_ordered(1.0, "low", 1.0, "high", false).is_ok());
        let err = require_ordered(1.0, "low", 1.0, "high", true).unwrap_err();
        assert!(matches!(err, SmcError::BoundOrdering(_)));
    }

    #[test]
    fn test_gain_count() {
        assert!(require_gain_count(&[1.0; 6], "ClassicalSmc", &[6]).is_ok());
        let err = require_gain_count(&[1.0; 3], "SuperTwistingSmc", &[2, 6]).unwrap_err();
        assert_eq!(err.to_string(), "SuperTwistingSmc expects 2 or 6 gains, got 3");
    }

    #[test]
    fn test_len() {
        assert!(require_len(&[1.0; 4], "HybridAdaptiveStaSmc", 4).is_ok());
        assert!(require_len(&[1.0; 5], "HybridAdaptiveStaSmc", 4).is_err());
    }
}
