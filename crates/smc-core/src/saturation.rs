// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Saturation / Switching Functions
// ─────────────────────────────────────────────────────────────────────
//! Bounded continuous approximations of `sign(σ)`.
//!
//! The boundary-layer width is validated strictly positive when a
//! controller is constructed, so the hot path never divides by zero.

use smc_types::{SmcError, SmcResult, SwitchMethod};

/// Continuous approximation of `sign(sigma)` with boundary width `epsilon`.
///
/// Returns a value in [-1, 1]. NaN input maps to 0, ±∞ to ±1.
/// Fails only if `epsilon` is not a finite positive number.
pub fn saturate(sigma: f64, epsilon: f64, method: SwitchMethod) -> SmcResult<f64> {
    if !(epsilon.is_finite() && epsilon > 0.0) {
        return Err(SmcError::InvalidParameter {
            name: "boundary_layer".into(),
            constraint: "> 0".into(),
            value: epsilon,
        });
    }
    Ok(saturate_unchecked(sigma, epsilon, method))
}

/// [`saturate`] without the width check, for widths validated at construction.
#[inline]
pub fn saturate_unchecked(sigma: f64, epsilon: f64, method: SwitchMethod) -> f64 {
    if sigma.is_nan() {
        return 0.0;
    }
    if sigma.is_infinite() {
        return sigma.signum();
    }
    let ratio = sigma / epsilon;
    match method {
        SwitchMethod::Tanh => ratio.tanh(),
        SwitchMethod::Linear => ratio.clamp(-1.0, 1.0),
    }
}

/// Smooth sign `x / (|x| + eps)`. The hybrid law tapers its adaptation rate with it.
#[inline]
pub fn smooth_sign(x: f64, eps: f64) -> f64 {
    if x.is_nan() {
        return 0.0;
    }
    if x.is_infinite() {
        return x.signum();
    }
    x / (x.abs() + eps)
}

/// Linear hysteresis ramp: 0 at or below `low`, 1 at or above `high`.
#[inline]
pub fn ramp(value: f64, low: f64, high: f64) -> f64 {
    if !value.is_finite() {
        return if value == f64::INFINITY { 1.0 } else { 0.0 };
    }
    if value <= low {
        0.0
    } else if value >= high {
        1.0
    } else {
        (value - low) / (high - low)
    }
}

/// Clamp to `[-limit, limit]`, mapping NaN to 0.
#[inline]
pub fn clamp_finite(value: f64, limit: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-limit, limit)
    }
}
