//! Grow volume dimensions and unit normalization
//!
//! Every internal computation works in feet. Metric volumes are converted on
//! the way in with a fixed factor of 30.48 cm per foot.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Centimetres per foot
pub const CM_PER_FOOT: f32 = 30.48;

/// Unit system a volume was entered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    /// Feet
    #[default]
    Imperial,
    /// Centimetres
    Metric,
}

impl UnitSystem {
    /// Convert a length in this unit to feet
    pub fn to_feet(self, value: f32) -> f32 {
        match self {
            UnitSystem::Imperial => value,
            UnitSystem::Metric => value / CM_PER_FOOT,
        }
    }

    /// Convert a length in feet back to this unit
    pub fn from_feet(self, feet: f32) -> f32 {
        match self {
            UnitSystem::Imperial => feet,
            UnitSystem::Metric => feet * CM_PER_FOOT,
        }
    }
}

/// A rectangular growing volume (tent or room)
///
/// `width` runs along X, `depth` along Y and `height` is vertical (Z).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub width: f32,
    pub depth: f32,
    pub height: f32,
    #[serde(default)]
    pub unit: UnitSystem,
}

impl Volume {
    /// Create a volume in the given unit system
    pub fn new(width: f32, depth: f32, height: f32, unit: UnitSystem) -> Self {
        Self {
            width,
            depth,
            height,
            unit,
        }
    }

    /// Create a volume measured in feet
    pub fn feet(width: f32, depth: f32, height: f32) -> Self {
        Self::new(width, depth, height, UnitSystem::Imperial)
    }

    /// Create a volume measured in centimetres
    pub fn centimetres(width: f32, depth: f32, height: f32) -> Self {
        Self::new(width, depth, height, UnitSystem::Metric)
    }

    /// Dimensions converted to feet as (width, depth, height)
    pub fn dimensions_ft(&self) -> Vec3 {
        Vec3::new(
            self.unit.to_feet(self.width),
            self.unit.to_feet(self.depth),
            self.unit.to_feet(self.height),
        )
    }

    /// Whether every dimension is finite and strictly positive
    ///
    /// Invalid volumes are never an error: they simply produce empty fields.
    pub fn is_valid(&self) -> bool {
        [self.width, self.depth, self.height]
            .iter()
            .all(|d| d.is_finite() && *d > 0.0)
    }

    /// Floor area in square feet
    pub fn footprint_sq_ft(&self) -> f32 {
        let d = self.dimensions_ft();
        d.x * d.y
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::feet(4.0, 4.0, 6.0)
    }
}

/// Map a simulation point (Z-up) into render space (Y-up)
///
/// X stays width, Y becomes height and Z becomes depth.
pub fn to_render_space(p: Vec3) -> Vec3 {
    Vec3::new(p.x, p.z, p.y)
}
