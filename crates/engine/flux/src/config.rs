//! Scene configuration
//!
//! A scene file describes everything a simulation needs:
//! - Volume dimensions and unit system
//! - Light sources with their placements
//! - Optional sensor grid for measured fields
//! - Growth stage target, radiometric model and sampling resolutions
//!
//! Lengths in the file are in the volume's unit and converted to feet here.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::{GrowthStage, StageTarget};
use crate::classify::DEFAULT_VOXEL_RESOLUTION;
use crate::error::{Error, Result};
use crate::field::Resolution;
use crate::light::{LightInstance, LightSource, DEFAULT_BEAM_ANGLE};
use crate::model::{BasicCosineModel, EnhancedModel, FieldModel};
use crate::sensor::SensorGrid;
use crate::units::Volume;

/// Scene stored in a TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Light-to-floor distance in volume units (default: volume height)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mounting_height: Option<f32>,
    /// Overrides the stage photoperiod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photoperiod_hours: Option<f32>,
    #[serde(default)]
    pub volume: Volume,
    #[serde(default)]
    pub stage: StageConfig,
    /// Measured readings; when present they replace the simulated field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensors: Option<SensorGrid>,
    #[serde(default)]
    pub field_resolution: Resolution,
    #[serde(default = "default_voxel_resolution")]
    pub voxel_resolution: Resolution,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub lights: Vec<LightConfig>,
}

fn default_voxel_resolution() -> Resolution {
    DEFAULT_VOXEL_RESOLUTION
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            mounting_height: None,
            photoperiod_hours: None,
            volume: Volume::default(),
            stage: StageConfig::default(),
            sensors: None,
            field_resolution: Resolution::default(),
            voxel_resolution: DEFAULT_VOXEL_RESOLUTION,
            model: ModelConfig::default(),
            lights: Vec::new(),
        }
    }
}

/// A light source as written in a scene file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightConfig {
    pub name: String,
    pub max_intensity: f32,
    #[serde(default = "default_beam_angle")]
    pub beam_angle: f32,
    /// Calibration height in volume units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_height: Option<f32>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub instances: Vec<LightInstance>,
}

fn default_beam_angle() -> f32 {
    DEFAULT_BEAM_ANGLE
}

fn default_quantity() -> u32 {
    1
}

impl LightConfig {
    fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::InvalidLight {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.max_intensity.is_finite() || self.max_intensity < 0.0 {
            return Err(self.invalid(format!(
                "max_intensity {} must be a non-negative number",
                self.max_intensity
            )));
        }
        if !(0.0..=180.0).contains(&self.beam_angle) {
            return Err(self.invalid(format!(
                "beam_angle {} must be between 0 and 180 degrees",
                self.beam_angle
            )));
        }
        if let Some(h) = self.reference_height {
            if !h.is_finite() || h <= 0.0 {
                return Err(self.invalid(format!("reference_height {h} must be positive")));
            }
        }
        if self.quantity == 0 {
            return Err(self.invalid("quantity must be at least 1"));
        }
        for (i, inst) in self.instances.iter().enumerate() {
            let in_range = |v: f32| (0.0..=1.0).contains(&v);
            if !in_range(inst.normalized_x()) || !in_range(inst.normalized_y()) {
                return Err(self.invalid(format!(
                    "instance {i} at ({}, {}) lies outside the footprint",
                    inst.normalized_x(), inst.normalized_y()
                )));
            }
        }
        Ok(())
    }

    /// Convert to a light source, lengths taken in the volume's unit
    pub fn to_light(&self, volume: &Volume) -> Result<LightSource> {
        self.validate()?;
        let mut light = LightSource::new(self.name.clone(), self.max_intensity)
            .with_beam_angle(self.beam_angle)
            .with_quantity(self.quantity);
        if let Some(h) = self.reference_height {
            light = light.with_reference_height(volume.unit.to_feet(h));
        }
        for inst in &self.instances {
            light.add_instance(
                LightInstance::new(inst.normalized_x(), inst.normalized_y()).with_rotation(inst.rotation),
            );
        }
        Ok(light)
    }

    /// Inverse of [`to_light`](Self::to_light)
    pub fn from_light(light: &LightSource, volume: &Volume) -> Self {
        Self {
            name: light.name().to_string(),
            max_intensity: light.max_intensity(),
            beam_angle: light.beam_angle(),
            reference_height: light
                .mounting_height_reference()
                .map(|ft| volume.unit.from_feet(ft)),
            quantity: light.quantity(),
            instances: light.instances().to_vec(),
        }
    }
}

/// Growth stage: a preset name or a custom band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageConfig {
    Preset { preset: String },
    Custom(StageTarget),
}

impl Default for StageConfig {
    fn default() -> Self {
        StageConfig::Preset {
            preset: GrowthStage::Vegetative.name().to_string(),
        }
    }
}

impl StageConfig {
    pub fn target(&self) -> Result<StageTarget> {
        match self {
            StageConfig::Preset { preset } => Ok(GrowthStage::from_name(preset)?.target()),
            StageConfig::Custom(target) => {
                if !(target.min_ppfd >= 0.0 && target.max_ppfd >= target.min_ppfd) {
                    return Err(Error::UnknownStage(format!(
                        "{}: band {}..{} is not a valid range",
                        target.name, target.min_ppfd, target.max_ppfd
                    )));
                }
                Ok(target.clone())
            }
        }
    }
}

/// Radiometric model selection and tuning constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// "basic" or "enhanced"
    #[serde(default = "default_model_kind")]
    pub kind: String,
    #[serde(default = "default_edge_softness")]
    pub edge_softness_deg: f32,
    #[serde(default = "default_cutoff_exponent")]
    pub cutoff_exponent: f32,
}

fn default_model_kind() -> String {
    "enhanced".to_string()
}

fn default_edge_softness() -> f32 {
    EnhancedModel::default().edge_softness_deg
}

fn default_cutoff_exponent() -> f32 {
    EnhancedModel::default().cutoff_exponent
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: default_model_kind(),
            edge_softness_deg: default_edge_softness(),
            cutoff_exponent: default_cutoff_exponent(),
        }
    }
}

impl ModelConfig {
    pub fn to_model(&self) -> Result<FieldModel> {
        match self.kind.to_ascii_lowercase().as_str() {
            "basic" | "cosine" => Ok(FieldModel::Basic(BasicCosineModel)),
            "enhanced" => {
                if !self.edge_softness_deg.is_finite() || self.edge_softness_deg < 0.0 {
                    return Err(Error::InvalidModel(format!(
                        "edge_softness_deg {} must be non-negative",
                        self.edge_softness_deg
                    )));
                }
                if !self.cutoff_exponent.is_finite() || self.cutoff_exponent <= 0.0 {
                    return Err(Error::InvalidModel(format!(
                        "cutoff_exponent {} must be positive",
                        self.cutoff_exponent
                    )));
                }
                Ok(FieldModel::Enhanced(EnhancedModel {
                    edge_softness_deg: self.edge_softness_deg,
                    cutoff_exponent: self.cutoff_exponent,
                }))
            }
            other => Err(Error::InvalidModel(format!("unknown model kind '{other}'"))),
        }
    }
}

impl SceneConfig {
    /// Parse a scene from TOML and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SceneConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a scene file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), lights = config.lights.len(), "loaded scene");
        Ok(config)
    }

    /// Write the scene as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check every part that can be wrong; degenerate volumes are allowed
    pub fn validate(&self) -> Result<()> {
        for light in &self.lights {
            light.validate()?;
        }
        if let Some(grid) = &self.sensors {
            grid.validate()?;
        }
        self.stage.target()?;
        self.model.to_model()?;
        Ok(())
    }

    pub fn light_sources(&self) -> Result<Vec<LightSource>> {
        self.lights.iter().map(|l| l.to_light(&self.volume)).collect()
    }

    /// Mounting height converted to feet
    pub fn mounting_height_ft(&self) -> Option<f32> {
        self.mounting_height.map(|h| self.volume.unit.to_feet(h))
    }

    /// Stage target with any photoperiod override applied
    pub fn stage_target(&self) -> Result<StageTarget> {
        let target = self.stage.target()?;
        Ok(match self.photoperiod_hours {
            Some(hours) => target.with_photoperiod(hours),
            None => target,
        })
    }

    pub fn field_model(&self) -> Result<FieldModel> {
        self.model.to_model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::UnitSystem;

    const SCENE: &str = r#"
mounting_height = 2.0

[volume]
width = 4.0
depth = 4.0
height = 6.0

[stage]
preset = "flowering"

[[lights]]
name = "bar"
max_intensity = 900.0
reference_height = 1.5
quantity = 2

[[lights.instances]]
normalized_x = 0.25
normalized_y = 0.5

[[lights.instances]]
normalized_x = 0.75
normalized_y = 0.5
rotation = 90.0
"#;

    #[test]
    fn test_default_config() {
        let config = SceneConfig::default();
        assert!(config.lights.is_empty());
        assert_eq!(config.voxel_resolution, DEFAULT_VOXEL_RESOLUTION);
        assert_eq!(config.stage_target().unwrap().name, "vegetative");
        assert!(matches!(config.field_model().unwrap(), FieldModel::Enhanced(_)));
    }

    #[test]
    fn test_parse_scene() {
        let config = SceneConfig::from_toml_str(SCENE).unwrap();
        let lights = config.light_sources().unwrap();
        assert_eq!(lights.len(), 1);
        assert_eq!(lights[0].fixture_count(), 4);
        assert_eq!(lights[0].beam_angle(), DEFAULT_BEAM_ANGLE);
        assert_eq!(lights[0].instances()[1].rotation, 90.0);
        assert_eq!(config.mounting_height_ft(), Some(2.0));
        assert_eq!(config.stage_target().unwrap().max_ppfd, 900.0);
        assert_eq!(config.field_resolution, Resolution::default());
    }

    #[test]
    fn test_metric_heights_convert() {
        let mut config = SceneConfig::from_toml_str(SCENE).unwrap();
        config.volume = Volume::centimetres(120.0, 120.0, 180.0);
        config.mounting_height = Some(60.96);
        config.lights[0].reference_height = Some(30.48);
        assert!((config.mounting_height_ft().unwrap() - 2.0).abs() < 1e-5);
        let lights = config.light_sources().unwrap();
        assert!((lights[0].mounting_height_reference().unwrap() - 1.0).abs() < 1e-5);
        assert_eq!(config.volume.unit, UnitSystem::Metric);
    }

    #[test]
    fn test_custom_stage() {
        let toml = r#"
[stage]
name = "lettuce"
min_ppfd = 150.0
max_ppfd = 250.0
photoperiod_hours = 16.0
"#;
        let config = SceneConfig::from_toml_str(toml).unwrap();
        let target = config.stage_target().unwrap();
        assert_eq!(target.name, "lettuce");
        assert_eq!(target.photoperiod_hours, 16.0);
    }

    #[test]
    fn test_photoperiod_override() {
        let mut config = SceneConfig::from_toml_str(SCENE).unwrap();
        config.photoperiod_hours = Some(14.0);
        assert_eq!(config.stage_target().unwrap().photoperiod_hours, 14.0);
    }

    #[test]
    fn test_rejects_unknown_stage() {
        let err = SceneConfig::from_toml_str("[stage]\npreset = \"fruiting\"\n").unwrap_err();
        assert!(matches!(err, Error::UnknownStage(_)));
    }

    #[test]
    fn test_rejects_bad_light() {
        let toml = r#"
[[lights]]
name = "broken"
max_intensity = -10.0
"#;
        let err = SceneConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, Error::InvalidLight { ref name, .. } if name == "broken"));

        let toml = r#"
[[lights]]
name = "wide"
max_intensity = 10.0
beam_angle = 200.0
"#;
        assert!(SceneConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_rejects_bad_model() {
        let err = SceneConfig::from_toml_str("[model]\nkind = \"raytraced\"\n").unwrap_err();
        assert!(matches!(err, Error::InvalidModel(_)));
        let err = SceneConfig::from_toml_str("[model]\ncutoff_exponent = 0.0\n").unwrap_err();
        assert!(matches!(err, Error::InvalidModel(_)));
        let basic = SceneConfig::from_toml_str("[model]\nkind = \"basic\"\n").unwrap();
        assert_eq!(basic.field_model().unwrap(), FieldModel::Basic(BasicCosineModel));
    }

    #[test]
    fn test_rejects_bad_sensors() {
        let toml = "[sensors]\nrows = 2\ncols = 2\nvalues = [1.0, 2.0]\n";
        let err = SceneConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, Error::InvalidSensorGrid(_)));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            SceneConfig::from_toml_str("volume = 3"),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn test_light_round_trip() {
        let volume = Volume::centimetres(100.0, 100.0, 200.0);
        let light = LightSource::new("p", 600.0).with_reference_height(1.0).at(0.5, 0.5);
        let cfg = LightConfig::from_light(&light, &volume);
        assert!((cfg.reference_height.unwrap() - 30.48).abs() < 1e-4);
        let back = cfg.to_light(&volume).unwrap();
        assert_eq!(back.instances(), light.instances());
    }
}
