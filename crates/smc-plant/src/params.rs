// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — Plant Parameters
// ─────────────────────────────────────────────────────────────────────
//! Physical parameters of the cart and the two links.
//!
//! Links are rigid bodies with their centre of mass at `com` from the
//! lower pivot and moment of inertia `inertia` about that centre.

use serde::{Deserialize, Serialize};

use smc_types::validation::{require_in_range, require_positive};
use smc_types::{SmcError, SmcResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DipParams {
    pub cart_mass: f64,
    pub link1_mass: f64,
    pub link2_mass: f64,
    pub link1_length: f64,
    pub link2_length: f64,
    pub link1_com: f64,
    pub link2_com: f64,
    pub link1_inertia: f64,
    pub link2_inertia: f64,
    pub gravity: f64,
    /// Viscous friction on the cart (N·s/m).
    pub cart_friction: f64,
    /// Viscous friction at each joint (N·m·s/rad).
    pub joint1_friction: f64,
    pub joint2_friction: f64,
}

impl Default for DipParams {
    fn default() -> Self {
        Self {
            cart_mass: 1.0,
            link1_mass: 0.1,
            link2_mass: 0.1,
            link1_length: 0.5,
            link2_length: 0.5,
            link1_com: 0.25,
            link2_com: 0.25,
            link1_inertia: 0.1 * 0.5 * 0.5 / 12.0,
            link2_inertia: 0.1 * 0.5 * 0.5 / 12.0,
            gravity: 9.81,
            cart_friction: 0.2,
            joint1_friction: 0.005,
            joint2_friction: 0.004,
        }
    }
}

impl DipParams {
    pub fn validate(&self) -> SmcResult<()> {
        require_positive(self.cart_mass, "cart_mass", false)?;
        require_positive(self.link1_mass, "link1_mass", false)?;
        require_positive(self.link2_mass, "link2_mass", false)?;
        require_positive(self.link1_length, "link1_length", false)?;
        require_positive(self.link2_length, "link2_length", false)?;
        require_in_range(self.link1_com, "link1_com", 0.0, self.link1_length, true)?;
        require_in_range(self.link2_com, "link2_com", 0.0, self.link2_length, true)?;
        require_positive(self.link1_inertia, "link1_inertia", true)?;
        require_positive(self.link2_inertia, "link2_inertia", true)?;
        require_positive(self.gravity, "gravity", false)?;
        require_positive(self.cart_friction, "cart_friction", true)?;
        require_positive(self.joint1_friction, "joint1_friction", true)?;
        require_positive(self.joint2_friction, "joint2_friction", true)?;
        Ok(())
    }

    /// Same plant with all friction removed.
    pub fn frictionless(&self) -> Self {
        Self {
            cart_friction: 0.0,
            joint1_friction: 0.0,
            joint2_friction: 0.0,
            ..self.clone()
        }
    }

    pub fn from_json(json: &str) -> SmcResult<Self> {
        let params: Self = serde_json::from_str(json)
            .map_err(|e| SmcError::Config(format!("plant parameters: {e}")))?;
        params.validate()?;
        Ok(params)
    }
}
