//! Radiometric models: intensity contributed by one fixture at one point
//!
//! Both models are deterministic pure functions of the light, its position and
//! the target point. The field is the linear superposition of every
//! contribution; there is no occlusion and no multi-bounce.
//!
//! The enhanced model's cutoff band and exponent are empirical tuning
//! constants chosen for visually plausible falloff, not physical law.

use glam::Vec3;

use crate::light::LightSource;

/// Distances below this (feet) count as coincident with the source
const COINCIDENT_EPSILON: f32 = 1e-4;

/// Vertical distance floor (feet) for the inverse-square height correction
const MIN_VERTICAL_FT: f32 = 0.05;

/// Strategy for evaluating a single fixture's contribution
pub trait RadiometricModel {
    /// Non-negative PPFD contributed at `target` by one fixture of `light`
    /// hanging at `source`
    fn contribution(&self, light: &LightSource, source: Vec3, target: Vec3) -> f32;

    /// Angle from nadir (degrees) beyond which `contribution` is exactly zero
    ///
    /// Samplers may skip lights past this angle without changing results.
    fn cutoff_angle(&self, light: &LightSource) -> f32;
}

/// Lambertian cosine falloff with optional inverse-square height correction
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BasicCosineModel;

/// Cosine falloff plus a smooth cutoff outside half the beam angle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhancedModel {
    /// Width in degrees of the band past the beam edge over which light fades out
    pub edge_softness_deg: f32,
    /// Exponent applied to the smoothstep fade
    pub cutoff_exponent: f32,
}

impl Default for EnhancedModel {
    fn default() -> Self {
        Self {
            edge_softness_deg: 15.0,
            cutoff_exponent: 2.0,
        }
    }
}

/// Model selected at runtime
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldModel {
    Basic(BasicCosineModel),
    Enhanced(EnhancedModel),
}

impl Default for FieldModel {
    fn default() -> Self {
        FieldModel::Enhanced(EnhancedModel::default())
    }
}

/// Where a target sits relative to a source
#[derive(Debug, Clone, Copy)]
struct Incidence {
    horizontal: f32,
    vertical: f32,
}

impl Incidence {
    fn between(source: Vec3, target: Vec3) -> Self {
        let delta = target - source;
        Self {
            horizontal: (delta.x * delta.x + delta.y * delta.y).sqrt(),
            vertical: source.z - target.z,
        }
    }

    fn is_coincident(&self) -> bool {
        self.horizontal < COINCIDENT_EPSILON && self.vertical.abs() < COINCIDENT_EPSILON
    }

    /// cos(atan(horizontal / vertical))
    fn cosine(&self) -> f32 {
        self.vertical / (self.horizontal * self.horizontal + self.vertical * self.vertical).sqrt()
    }

    /// Angle from nadir in degrees
    fn angle_deg(&self) -> f32 {
        self.horizontal.atan2(self.vertical).to_degrees()
    }
}

/// Inverse-square scaling of a calibrated intensity to a new height
pub fn height_correction(reference: Option<f32>, vertical: f32) -> f32 {
    match reference {
        Some(reference) => {
            let ratio = reference / vertical.max(MIN_VERTICAL_FT);
            ratio * ratio
        }
        None => 1.0,
    }
}

/// Hermite smoothstep, degrading to a hard step when the edges coincide
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Shared cosine term; `Err` carries a final value that skips the beam cutoff
fn cosine_term(light: &LightSource, incidence: &Incidence) -> Result<f32, f32> {
    if incidence.is_coincident() {
        return Err(light.max_intensity());
    }
    if incidence.vertical <= 0.0 {
        return Err(0.0);
    }
    let scale = height_correction(light.mounting_height_reference(), incidence.vertical);
    Ok(light.max_intensity() * scale * incidence.cosine())
}

impl RadiometricModel for BasicCosineModel {
    fn contribution(&self, light: &LightSource, source: Vec3, target: Vec3) -> f32 {
        let incidence = Incidence::between(source, target);
        match cosine_term(light, &incidence) {
            Ok(value) => value.max(0.0),
            Err(early) => early,
        }
    }

    fn cutoff_angle(&self, _light: &LightSource) -> f32 {
        90.0
    }
}

impl RadiometricModel for EnhancedModel {
    fn contribution(&self, light: &LightSource, source: Vec3, target: Vec3) -> f32 {
        let incidence = Incidence::between(source, target);
        let value = match cosine_term(light, &incidence) {
            Ok(value) => value,
            Err(early) => return early,
        };

        let half = light.half_angle();
        let angle = incidence.angle_deg();
        if angle <= half {
            return value.max(0.0);
        }

        let fade = 1.0 - smoothstep(half, half + self.edge_softness_deg.max(0.0), angle);
        (value * fade.powf(self.cutoff_exponent)).max(0.0)
    }

    fn cutoff_angle(&self, light: &LightSource) -> f32 {
        (light.half_angle() + self.edge_softness_deg.max(0.0)).min(90.0)
    }
}

impl RadiometricModel for FieldModel {
    fn contribution(&self, light: &LightSource, source: Vec3, target: Vec3) -> f32 {
        match self {
            FieldModel::Basic(m) => m.contribution(light, source, target),
            FieldModel::Enhanced(m) => m.contribution(light, source, target),
        }
    }

    fn cutoff_angle(&self, light: &LightSource) -> f32 {
        match self {
            FieldModel::Basic(m) => m.cutoff_angle(light),
            FieldModel::Enhanced(m) => m.cutoff_angle(light),
        }
    }
}

/// Angle from nadir (degrees) of `target` as seen from `source`
pub fn incidence_angle(source: Vec3, target: Vec3) -> f32 {
    Incidence::between(source, target).angle_deg()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light() -> LightSource {
        LightSource::new("test", 800.0).with_beam_angle(120.0)
    }

    #[test]
    fn test_nadir_is_full_intensity() {
        let source = Vec3::new(1.0, 1.0, 2.0);
        let target = Vec3::new(1.0, 1.0, 0.0);
        let basic = BasicCosineModel.contribution(&light(), source, target);
        let enhanced = EnhancedModel::default().contribution(&light(), source, target);
        assert!((basic - 800.0).abs() < 1e-3);
        assert!((enhanced - 800.0).abs() < 1e-3);
    }

    #[test]
    fn test_height_correction() {
        let l = light().with_reference_height(1.0);
        let source = Vec3::new(0.0, 0.0, 2.0);
        let v = BasicCosineModel.contribution(&l, source, Vec3::ZERO);
        // Twice the reference height: a quarter of the intensity
        assert!((v - 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_coincident_returns_max() {
        let l = light().with_reference_height(1.0);
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(EnhancedModel::default().contribution(&l, p, p), 800.0);
        assert_eq!(BasicCosineModel.contribution(&l, p, p), 800.0);
    }

    #[test]
    fn test_above_source_is_dark() {
        let source = Vec3::new(0.0, 0.0, 1.0);
        let target = Vec3::new(0.5, 0.0, 2.0);
        assert_eq!(EnhancedModel::default().contribution(&light(), source, target), 0.0);
    }

    #[test]
    fn test_cosine_law() {
        let source = Vec3::new(0.0, 0.0, 1.0);
        // 45 degrees off nadir
        let target = Vec3::new(1.0, 0.0, 0.0);
        let v = BasicCosineModel.contribution(&light(), source, target);
        assert!((v - 800.0 * std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-2);
    }

    #[test]
    fn test_smooth_cutoff_outside_beam() {
        let narrow = LightSource::new("spot", 1000.0).with_beam_angle(60.0);
        let model = EnhancedModel::default();
        let source = Vec3::new(0.0, 0.0, 1.0);

        // 40 degrees: inside the 30..45 fade band
        let x = 40f32.to_radians().tan();
        let fading = model.contribution(&narrow, source, Vec3::new(x, 0.0, 0.0));
        let unfaded = BasicCosineModel.contribution(&narrow, source, Vec3::new(x, 0.0, 0.0));
        assert!(fading > 0.0 && fading < unfaded);

        // 60 degrees: beyond the band
        let far = 60f32.to_radians().tan();
        assert_eq!(model.contribution(&narrow, source, Vec3::new(far, 0.0, 0.0)), 0.0);
        assert_eq!(model.cutoff_angle(&narrow), 45.0);
    }

    #[test]
    fn test_cutoff_fade_is_squared() {
        let narrow = LightSource::new("spot", 1000.0).with_beam_angle(60.0);
        let source = Vec3::new(0.0, 0.0, 1.0);
        let target = Vec3::new(40f32.to_radians().tan(), 0.0, 0.0);

        let fade = 1.0 - smoothstep(30.0, 45.0, 40.0);
        let expected = 40f32.to_radians().cos() * 1000.0 * fade * fade;
        let v = EnhancedModel::default().contribution(&narrow, source, target);
        assert!((v - expected).abs() < 1e-2, "{v} vs {expected}");
    }

    #[test]
    fn test_configured_exponent_applies() {
        let narrow = LightSource::new("spot", 1000.0).with_beam_angle(60.0);
        let source = Vec3::new(0.0, 0.0, 1.0);
        let target = Vec3::new(40f32.to_radians().tan(), 0.0, 0.0);

        let linear = crate::config::ModelConfig {
            cutoff_exponent: 1.0,
            ..Default::default()
        }
        .to_model()
        .unwrap();
        let squared = crate::config::ModelConfig::default().to_model().unwrap();

        let fade = 1.0 - smoothstep(30.0, 45.0, 40.0);
        let unfaded = 40f32.to_radians().cos() * 1000.0;
        let a = linear.contribution(&narrow, source, target);
        let b = squared.contribution(&narrow, source, target);
        assert!((a - unfaded * fade).abs() < 1e-2);
        assert!(a > b);
    }

    #[test]
    fn test_smoothstep() {
        assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
        assert!((smoothstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-6);
        assert_eq!(smoothstep(1.0, 1.0, 0.5), 0.0);
        assert_eq!(smoothstep(1.0, 1.0, 1.5), 1.0);
    }

    #[test]
    fn test_field_model_dispatch() {
        let source = Vec3::new(0.0, 0.0, 1.0);
        let target = Vec3::new(0.3, 0.2, 0.0);
        let l = light();
        assert_eq!(
            FieldModel::default().contribution(&l, source, target),
            EnhancedModel::default().contribution(&l, source, target)
        );
        assert_eq!(
            FieldModel::Basic(BasicCosineModel).contribution(&l, source, target),
            BasicCosineModel.contribution(&l, source, target)
        );
    }
}
