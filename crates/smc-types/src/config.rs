// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Controller Configuration
// ─────────────────────────────────────────────────────────────────────
//! Explicit configuration records for the four control laws.
//!
//! Each record is self-contained: the controller built from it never
//! consults process-wide defaults. `validate()` enforces every scalar
//! constraint and bound ordering; gain-specific positivity is checked
//! again by the controller constructor since gains may come from an
//! optimizer rather than a config file.

use serde::{Deserialize, Serialize};

use crate::error::{SmcError, SmcResult};
use crate::validation::{
    require_gain_count, require_in_range, require_ordered, require_positive,
};

/// Continuous approximation used for `sign(σ)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchMethod {
    /// `tanh(σ/ε)`.
    #[default]
    Tanh,
    /// `clamp(σ/ε, -1, 1)`.
    Linear,
}

impl std::str::FromStr for SwitchMethod {
    type Err = SmcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tanh" | "smooth" => Ok(Self::Tanh),
            "linear" | "sat" => Ok(Self::Linear),
            other => Err(SmcError::Config(format!(
                "unknown switch method '{other}' (expected 'tanh' or 'linear')"
            ))),
        }
    }
}

/// Model-based feed-forward settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquivalentControlConfig {
    /// Compute the feed-forward term when a dynamics model is attached.
    pub enabled: bool,
    /// Diagonal bias added to the inertia matrix before solving.
    pub regularization: f64,
    /// Minimum |L·M⁻¹·B| before the feed-forward term is suppressed.
    /// `None` derives it as `0.05 · (k1 + k2)` from the surface gains.
    pub controllability_threshold: Option<f64>,
    /// Feed-forward magnitude is clamped to `eq_clamp_factor · max_force`.
    pub eq_clamp_factor: f64,
}

impl Default for EquivalentControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            regularization: 1e-10,
            controllability_threshold: None,
            eq_clamp_factor: 5.0,
        }
    }
}

impl EquivalentControlConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> SmcResult<()> {
        require_positive(self.regularization, "regularization", true)?;
        if let Some(t) = self.controllability_threshold {
            require_positive(t, "controllability_threshold", true)?;
        }
        require_positive(self.eq_clamp_factor, "eq_clamp_factor", false)?;
        Ok(())
    }
}

/// Classical (static-gain) SMC.
///
/// Gains: `[k1, k2, λ1, λ2, K, kd]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassicalConfig {
    pub gains: Vec<f64>,
    pub max_force: f64,
    pub boundary_layer: f64,
    /// Boundary width grows as `boundary_layer + slope·|σ|`.
    pub boundary_layer_slope: f64,
    /// Switching term is frozen while `|σ| < ratio · ε_eff`. 0 disables.
    pub hysteresis_ratio: f64,
    pub switch_method: SwitchMethod,
    pub dt: f64,
    pub equivalent: EquivalentControlConfig,
}

impl Default for ClassicalConfig {
    fn default() -> Self {
        Self {
            gains: vec![10.0, 8.0, 15.0, 12.0, 50.0, 5.0],
            max_force: 150.0,
            boundary_layer: 0.02,
            boundary_layer_slope: 0.0,
            hysteresis_ratio: 0.0,
            switch_method: SwitchMethod::Tanh,
            dt: 0.001,
            equivalent: EquivalentControlConfig::default(),
        }
    }
}

impl ClassicalConfig {
    pub fn validate(&self) -> SmcResult<()> {
        require_gain_count(&self.gains, "ClassicalSmc", &[6])?;
        require_positive(self.max_force, "max_force", false)?;
        require_positive(self.boundary_layer, "boundary_layer", false)?;
        require_positive(self.boundary_layer_slope, "boundary_layer_slope", true)?;
        require_in_range(self.hysteresis_ratio, "hysteresis_ratio", 0.0, 1.0, true)?;
        if self.hysteresis_ratio >= 1.0 {
            return Err(SmcError::InvalidParameter {
                name: "hysteresis_ratio".into(),
                constraint: "< 1".into(),
                value: self.hysteresis_ratio,
            });
        }
        require_positive(self.dt, "dt", false)?;
        self.equivalent.validate()
    }
}

/// Adaptive-gain SMC.
///
/// Gains: `[k1, k2, λ1, λ2, γ]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    pub gains: Vec<f64>,
    pub dt: f64,
    pub max_force: f64,
    /// Pulls K back toward `k_init`.
    pub leak_rate: f64,
    /// Bound on |dK/dt|.
    pub adapt_rate_limit: f64,
    pub k_min: f64,
    pub k_max: f64,
    pub k_init: f64,
    /// Adaptation growth is disabled while `|σ| <= dead_zone`.
    pub dead_zone: f64,
    pub boundary_layer: f64,
    pub switch_method: SwitchMethod,
    /// Proportional weight on σ.
    pub alpha: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            gains: vec![10.0, 8.0, 5.0, 4.0, 1.0],
            dt: 0.001,
            max_force: 150.0,
            leak_rate: 0.01,
            adapt_rate_limit: 10.0,
            k_min: 0.1,
            k_max: 100.0,
            k_init: 10.0,
            dead_zone: 0.01,
            boundary_layer: 0.1,
            switch_method: SwitchMethod::Tanh,
            alpha: 0.5,
        }
    }
}

impl AdaptiveConfig {
    pub fn validate(&self) -> SmcResult<()> {
        require_gain_count(&self.gains, "AdaptiveSmc", &[5])?;
        require_positive(self.dt, "dt", false)?;
        require_positive(self.max_force, "max_force", false)?;
        require_positive(self.leak_rate, "leak_rate", true)?;
        require_positive(self.adapt_rate_limit, "adapt_rate_limit", false)?;
        require_positive(self.k_min, "k_min", false)?;
        require_positive(self.k_max, "k_max", false)?;
        require_positive(self.k_init, "k_init", false)?;
        require_ordered(self.k_min, "k_min", self.k_max, "k_max", false)?;
        require_ordered(self.k_min, "k_min", self.k_init, "k_init", false)?;
        require_ordered(self.k_init, "k_init", self.k_max, "k_max", false)?;
        require_positive(self.dead_zone, "dead_zone", true)?;
        require_positive(self.boundary_layer, "boundary_layer", false)?;
        require_positive(self.alpha, "alpha", true)?;
        Ok(())
    }
}

/// Second-order super-twisting SMC.
///
/// Gains: `[K1, K2, k1, k2, λ1, λ2]`, or `[K1, K2]` with default
/// surface gains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuperTwistingConfig {
    pub gains: Vec<f64>,
    pub dt: f64,
    pub max_force: f64,
    pub damping_gain: f64,
    pub boundary_layer: f64,
    pub switch_method: SwitchMethod,
    /// Exponent on |σ| in the continuous term; 0.5 is the classical algorithm.
    pub power_exponent: f64,
    /// Back-calculation gain on `(u_sat - u_raw)`; 0 disables.
    pub anti_windup_gain: f64,
    pub equivalent: EquivalentControlConfig,
}

impl Default for SuperTwistingConfig {
    fn default() -> Self {
        Self {
            gains: vec![25.0, 10.0, 15.0, 12.0, 20.0, 15.0],
            dt: 0.001,
            max_force: 150.0,
            damping_gain: 0.0,
            boundary_layer: 0.01,
            switch_method: SwitchMethod::Tanh,
            power_exponent: 0.5,
            anti_windup_gain: 0.0,
            equivalent: EquivalentControlConfig::default(),
        }
    }
}

impl SuperTwistingConfig {
    pub fn validate(&self) -> SmcResult<()> {
        require_gain_count(&self.gains, "SuperTwistingSmc", &[2, 6])?;
        require_positive(self.dt, "dt", false)?;
        require_positive(self.max_force, "max_force", false)?;
        require_positive(self.damping_gain, "damping_gain", true)?;
        require_positive(self.boundary_layer, "boundary_layer", false)?;
        require_in_range(self.power_exponent, "power_exponent", 0.0, 1.0, false)?;
        require_positive(self.anti_windup_gain, "anti_windup_gain", true)?;
        self.equivalent.validate()
    }
}

/// Thresholds for the hybrid controller's emergency override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyLimits {
    /// Trigger when |u_raw| exceeds `force_factor · max_force`.
    pub force_factor: f64,
    /// Trigger when an adaptive gain or the integral exceeds `gain_factor ·` its bound.
    pub gain_factor: f64,
    pub surface_limit: f64,
    pub position_limit: f64,
    pub velocity_limit: f64,
    /// Adaptive gains are reset to this fraction of their initial values.
    pub reset_fraction: f64,
    /// σ reported by a reset step is clamped to `±sigma_clamp`.
    pub sigma_clamp: f64,
}

impl Default for EmergencyLimits {
    fn default() -> Self {
        Self {
            force_factor: 20.0,
            gain_factor: 1.5,
            surface_limit: 100.0,
            position_limit: 10.0,
            velocity_limit: 50.0,
            reset_fraction: 0.05,
            sigma_clamp: 1.0,
        }
    }
}

impl EmergencyLimits {
    pub fn validate(&self) -> SmcResult<()> {
        require_positive(self.force_factor, "emergency.force_factor", false)?;
        require_positive(self.gain_factor, "emergency.gain_factor", false)?;
        if self.force_factor < 1.0 || self.gain_factor < 1.0 {
            return Err(SmcError::BoundOrdering(format!(
                "emergency factors must be >= 1 (force_factor={}, gain_factor={})",
                self.force_factor, self.gain_factor
            )));
        }
        require_positive(self.surface_limit, "emergency.surface_limit", false)?;
        require_positive(self.position_limit, "emergency.position_limit", false)?;
        require_positive(self.velocity_limit, "emergency.velocity_limit", false)?;
        require_in_range(self.reset_fraction, "emergency.reset_fraction", 0.0, 0.05, true)?;
        require_positive(self.sigma_clamp, "emergency.sigma_clamp", false)?;
        Ok(())
    }
}

/// Hybrid adaptive super-twisting SMC.
///
/// Gains: `[c1, λ1, c2, λ2]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    pub gains: Vec<f64>,
    pub dt: f64,
    pub max_force: f64,
    pub k1_init: f64,
    pub k2_init: f64,
    pub gamma1: f64,
    pub gamma2: f64,
    /// Adaptation and switching are frozen while `|σ| <= dead_zone`.
    pub dead_zone: f64,
    /// Soft-saturation width; must be >= `dead_zone`.
    pub sat_soft_width: f64,
    /// Express the second joint relative to the first in σ.
    pub use_relative_surface: bool,
    pub damping_gain: f64,
    pub adapt_rate_limit: f64,
    pub k1_max: f64,
    pub k2_max: f64,
    pub u_int_max: f64,
    pub gain_leak: f64,
    /// ε in the self-tapering factor `|σ| / (|σ| + ε)`.
    pub taper_eps: f64,
    /// Cart term subtracted from σ: `cart_gain · (ẋ + cart_lambda · x)`.
    pub cart_gain: f64,
    pub cart_lambda: f64,
    /// PD recentering force gains.
    pub cart_p_gain: f64,
    pub cart_p_damping: f64,
    /// Recentering ramps from 0 at `recenter_low` to 1 at `recenter_high` (|x|, m).
    pub recenter_low: f64,
    pub recenter_high: f64,
    pub equivalent: EquivalentControlConfig,
    pub emergency: EmergencyLimits,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            gains: vec![18.0, 12.0, 8.0, 6.0],
            dt: 0.001,
            max_force: 150.0,
            k1_init: 4.0,
            k2_init: 0.4,
            gamma1: 2.0,
            gamma2: 0.5,
            dead_zone: 0.05,
            sat_soft_width: 0.05,
            use_relative_surface: false,
            damping_gain: 3.0,
            adapt_rate_limit: 5.0,
            k1_max: 50.0,
            k2_max: 50.0,
            u_int_max: 50.0,
            gain_leak: 1e-3,
            taper_eps: 0.05,
            cart_gain: 0.0,
            cart_lambda: 1.0,
            cart_p_gain: 1.5,
            cart_p_damping: 0.5,
            recenter_low: 0.1,
            recenter_high: 0.5,
            equivalent: EquivalentControlConfig::disabled(),
            emergency: EmergencyLimits::default(),
        }
    }
}

impl HybridConfig {
    pub fn validate(&self) -> SmcResult<()> {
        require_gain_count(&self.gains, "HybridAdaptiveStaSmc", &[4])?;
        require_positive(self.dt, "dt", false)?;
        require_positive(self.max_force, "max_force", false)?;
        require_positive(self.k1_init, "k1_init", true)?;
        require_positive(self.k2_init, "k2_init", true)?;
        require_positive(self.gamma1, "gamma1", false)?;
        require_positive(self.gamma2, "gamma2", false)?;
        require_positive(self.dead_zone, "dead_zone", true)?;
        require_positive(self.sat_soft_width, "sat_soft_width", false)?;
        require_ordered(self.dead_zone, "dead_zone", self.sat_soft_width, "sat_soft_width", false)?;
        require_positive(self.damping_gain, "damping_gain", true)?;
        require_positive(self.adapt_rate_limit, "adapt_rate_limit", false)?;
        require_positive(self.k1_max, "k1_max", false)?;
        require_positive(self.k2_max, "k2_max", false)?;
        require_ordered(self.k1_init, "k1_init", self.k1_max, "k1_max", false)?;
        require_ordered(self.k2_init, "k2_init", self.k2_max, "k2_max", false)?;
        require_positive(self.u_int_max, "u_int_max", false)?;
        require_positive(self.gain_leak, "gain_leak", true)?;
        require_positive(self.taper_eps, "taper_eps", false)?;
        require_positive(self.cart_gain, "cart_gain", true)?;
        require_positive(self.cart_lambda, "cart_lambda", true)?;
        require_positive(self.cart_p_gain, "cart_p_gain", true)?;
        require_positive(self.cart_p_damping, "cart_p_damping", true)?;
        require_positive(self.recenter_low, "recenter_low", true)?;
        require_positive(self.recenter_high, "recenter_high", false)?;
        require_ordered(self.recenter_low, "recenter_low", self.recenter_high, "recenter_high", true)?;
        self.equivalent.validate()?;
        self.emergency.validate()
    }
}

/// All controller sections of a run configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub classical: ClassicalConfig,
    pub adaptive: AdaptiveConfig,
    pub super_twisting: SuperTwistingConfig,
    pub hybrid: HybridConfig,
}

impl KernelConfig {
    pub fn validate(&self) -> SmcResult<()> {
        self.classical.validate()?;
        self.adaptive.validate()?;
        self.super_twisting.validate()?;
        self.hybrid.validate()
    }

    /// Load from JSON string. Missing sections and fields take defaults.
    pub fn from_json(json: &str) -> SmcResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| SmcError::Config(format!("JSON parse error: {e}")))
    }

    pub fn to_json(&self) -> SmcResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        KernelConfig::default().validate().unwrap();
    }

    #[test]
    fn test_classical_rejects_zero_boundary() {
        let cfg = ClassicalConfig {
            boundary_layer: 0.0,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("boundary_layer"), "{err}");
    }

    #[test]
    fn test_classical_rejects_wrong_gain_count() {
        let cfg = ClassicalConfig {
            gains: vec![1.0; 5],
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(SmcError::InvalidGainCount { .. })));
    }

    #[test]
    fn test_adaptive_rejects_inverted_bounds() {
        let cfg = AdaptiveConfig {
            k_min: 50.0,
            k_max: 10.0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(SmcError::BoundOrdering(_))));
    }

    #[test]
    fn test_adaptive_rejects_k_init_outside_bounds() {
        let cfg = AdaptiveConfig {
            k_init: 500.0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(SmcError::BoundOrdering(_))));
    }

    #[test]
    fn test_super_twisting_accepts_two_gains() {
        let cfg = SuperTwistingConfig {
            gains: vec![10.0, 5.0],
            ..Default::default()
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn test_super_twisting_exponent_open_interval() {
        let cfg = SuperTwistingConfig {
            power_exponent: 1.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_hybrid_soft_width_below_dead_zone() {
        let cfg = HybridConfig {
            sat_soft_width: 0.01,
            dead_zone: 0.05,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, SmcError::BoundOrdering(_)), "{err}");
        assert!(err.to_string().contains("sat_soft_width"));
    }

    #[test]
    fn test_hybrid_recenter_thresholds_must_be_strict() {
        let cfg = HybridConfig {
            recenter_low: 0.5,
            recenter_high: 0.5,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(SmcError::BoundOrdering(_))));
    }

    #[test]
    fn test_emergency_reset_fraction_capped() {
        let limits = EmergencyLimits {
            reset_fraction: 0.2,
            ..Default::default()
        };
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_switch_method_parse() {
        assert_eq!("tanh".parse::<SwitchMethod>().unwrap(), SwitchMethod::Tanh);
        assert_eq!("Linear".parse::<SwitchMethod>().unwrap(), SwitchMethod::Linear);
        assert!("sign".parse::<SwitchMethod>().is_err());
    }

    #[test]
    fn test_kernel_config_partial_json() {
        let json = r#"{"hybrid": {"dead_zone": 0.02, "use_relative_surface": true},
                       "super_twisting": {"gains": [10.0, 5.0], "switch_method": "linear"}}"#;
        let cfg = KernelConfig::from_json(json).unwrap();
        assert_eq!(cfg.hybrid.dead_zone, 0.02);
        assert!(cfg.hybrid.use_relative_surface);
        assert_eq!(cfg.super_twisting.gains, vec![10.0, 5.0]);
        assert_eq!(cfg.super_twisting.switch_method, SwitchMethod::Linear);
        assert_eq!(cfg.classical, ClassicalConfig::default());
        cfg.validate().unwrap();
    }

    #[test]
    fn test_kernel_config_bad_json() {
        let err = KernelConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, SmcError::Config(_)));
    }

    #[test]
    fn test_kernel_config_json_roundtrip() {
        let cfg = KernelConfig::default();
        let back = KernelConfig::from_json(&cfg.to_json().unwrap()).unwrap();
        assert_eq!(cfg, back);
    }
}
