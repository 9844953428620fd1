//! Light source definitions and their placements in the grow footprint

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Default full cone angle of a fixture, in degrees
pub const DEFAULT_BEAM_ANGLE: f32 = 120.0;

/// One placement of a fixture within the footprint
///
/// Coordinates are normalized to the volume footprint: (0, 0) is one corner,
/// (1, 1) the opposite one. Rotation is in degrees about the vertical axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightInstance {
    normalized_x: f32,
    normalized_y: f32,
    #[serde(default)]
    pub rotation: f32,
}

impl LightInstance {
    /// Create a placement, clamping coordinates into [0, 1]
    pub fn new(normalized_x: f32, normalized_y: f32) -> Self {
        Self {
            normalized_x: clamp_unit(normalized_x),
            normalized_y: clamp_unit(normalized_y),
            rotation: 0.0,
        }
    }

    pub fn normalized_x(&self) -> f32 {
        self.normalized_x
    }

    pub fn normalized_y(&self) -> f32 {
        self.normalized_y
    }

    /// Set rotation in degrees (builder pattern)
    pub fn with_rotation(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }

    /// Move the placement, clamping into the footprint
    pub fn move_to(&mut self, normalized_x: f32, normalized_y: f32) {
        self.normalized_x = clamp_unit(normalized_x);
        self.normalized_y = clamp_unit(normalized_y);
    }

    /// Physical position in feet for a footprint of `width` x `depth` at `height`
    pub fn position(&self, width: f32, depth: f32, height: f32) -> Vec3 {
        Vec3::new(
            self.normalized_x * width,
            self.normalized_y * depth,
            height,
        )
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.5
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// A fixture model and every place it is hung
///
/// `max_intensity` is the PPFD directly beneath the fixture at
/// `mounting_height_reference` (feet). `quantity` stacks identical fixtures on
/// every placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightSource {
    name: String,
    max_intensity: f32,
    beam_angle: f32,
    mounting_height_reference: Option<f32>,
    instances: Vec<LightInstance>,
    quantity: u32,
}

impl LightSource {
    /// Create a light with no placements yet
    ///
    /// Negative or non-finite intensities are clamped to zero.
    pub fn new(name: impl Into<String>, max_intensity: f32) -> Self {
        Self {
            name: name.into(),
            max_intensity: non_negative(max_intensity),
            beam_angle: DEFAULT_BEAM_ANGLE,
            mounting_height_reference: None,
            instances: Vec::new(),
            quantity: 1,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_intensity(&self) -> f32 {
        self.max_intensity
    }

    /// Full cone angle in degrees
    pub fn beam_angle(&self) -> f32 {
        self.beam_angle
    }

    /// Half of the cone angle, in degrees
    pub fn half_angle(&self) -> f32 {
        self.beam_angle * 0.5
    }

    /// Height in feet at which `max_intensity` was measured
    pub fn mounting_height_reference(&self) -> Option<f32> {
        self.mounting_height_reference
    }

    pub fn instances(&self) -> &[LightInstance] {
        &self.instances
    }

    /// Mutable placements, for drag interactions
    pub fn instances_mut(&mut self) -> &mut [LightInstance] {
        &mut self.instances
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Set the beam angle in degrees, clamped to [0, 180] (builder pattern)
    pub fn with_beam_angle(mut self, degrees: f32) -> Self {
        self.beam_angle = non_negative(degrees).min(180.0);
        self
    }

    /// Set the calibration height in feet (builder pattern)
    pub fn with_reference_height(mut self, feet: f32) -> Self {
        self.mounting_height_reference = (feet.is_finite() && feet > 0.0).then_some(feet);
        self
    }

    /// Set how many fixtures hang at each placement (builder pattern)
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Add a placement (builder pattern)
    pub fn with_instance(mut self, instance: LightInstance) -> Self {
        self.instances.push(instance);
        self
    }

    /// Add an unrotated placement at normalized coordinates (builder pattern)
    pub fn at(self, normalized_x: f32, normalized_y: f32) -> Self {
        self.with_instance(LightInstance::new(normalized_x, normalized_y))
    }

    /// Add a placement
    pub fn add_instance(&mut self, instance: LightInstance) {
        self.instances.push(instance);
    }

    /// Remove a placement by index, returning it if it existed
    pub fn remove_instance(&mut self, index: usize) -> Option<LightInstance> {
        (index < self.instances.len()).then(|| self.instances.remove(index))
    }

    /// Total number of fixtures this source contributes
    pub fn fixture_count(&self) -> usize {
        self.instances.len() * self.quantity as usize
    }
}

fn non_negative(v: f32) -> f32 {
    if v.is_finite() {
        v.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_clamping() {
        let inst = LightInstance::new(-0.5, 1.7);
        assert_eq!(inst.normalized_x, 0.0);
        assert_eq!(inst.normalized_y, 1.0);
    }

    #[test]
    fn test_mutable_access_keeps_footprint() {
        let mut light = LightSource::new("a", 1.0).at(0.5, 0.5);
        let inst = &mut light.instances_mut()[0];
        inst.move_to(5.0, -2.0);
        inst.rotation = 45.0;
        assert_eq!(light.instances()[0].normalized_x(), 1.0);
        assert_eq!(light.instances()[0].normalized_y(), 0.0);
        assert_eq!(light.instances()[0].position(4.0, 4.0, 2.0), Vec3::new(4.0, 0.0, 2.0));
    }

    #[test]
    fn test_invariants_hold_for_bad_input() {
        let light = LightSource::new("bad", -50.0).with_beam_angle(-10.0);
        assert_eq!(light.max_intensity(), 0.0);
        assert_eq!(light.beam_angle(), 0.0);

        let wide = LightSource::new("wide", 100.0).with_beam_angle(400.0);
        assert_eq!(wide.beam_angle(), 180.0);
    }

    #[test]
    fn test_builder() {
        let light = LightSource::new("bar", 1000.0)
            .with_reference_height(1.5)
            .with_quantity(2)
            .at(0.25, 0.5)
            .at(0.75, 0.5);

        assert_eq!(light.instances().len(), 2);
        assert_eq!(light.fixture_count(), 4);
        assert_eq!(light.mounting_height_reference(), Some(1.5));
        assert_eq!(light.half_angle(), 60.0);
    }

    #[test]
    fn test_position() {
        let inst = LightInstance::new(0.5, 0.25);
        let p = inst.position(4.0, 8.0, 3.0);
        assert_eq!(p, Vec3::new(2.0, 2.0, 3.0));
    }

    #[test]
    fn test_remove_instance() {
        let mut light = LightSource::new("a", 1.0).at(0.1, 0.1);
        assert!(light.remove_instance(3).is_none());
        assert!(light.remove_instance(0).is_some());
        assert!(light.instances().is_empty());
    }
}
