//! Shared scene lighting for the shaded views
//!
//! Voxels and the displaced surface use the same single directional light
//! so switching modes keeps the perceived shape consistent.

use glam::Vec3;

/// Directional light, normalize(0.4, 1.0, 0.6)
pub const LIGHT_DIR: Vec3 = Vec3::new(0.324_443, 0.811_107, 0.486_664);

pub const AMBIENT: f32 = 0.35;

pub const DIFFUSE_STRENGTH: f32 = 0.65;

/// Clear color; dark so additive beams stay readable
pub const BACKGROUND_COLOR: Vec3 = Vec3::new(0.06, 0.07, 0.09);
