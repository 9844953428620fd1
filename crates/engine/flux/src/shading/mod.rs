//! Surface and beam shading functions
//!
//! Each shading function has a CPU reference implementation, used by tests and
//! image export, and emits the equivalent GLSL for the GL renderers. Both
//! paths share the constants defined here so the mapping stays identical.

mod glsl;

use glam::Vec3;

use crate::model::smoothstep;
use crate::units::Volume;

pub use glsl::{glsl_float, heatmap_glsl, DISPLACEMENT_SCALE_UNIFORM};

/// Heatmap gradient stops, evenly spaced over [0, 1]
pub const HEATMAP_STOPS: [Vec3; 7] = [
    Vec3::new(0.0, 0.0, 0.35),  // dark blue
    Vec3::new(0.0, 0.3, 1.0),   // blue
    Vec3::new(0.0, 0.8, 0.2),   // green
    Vec3::new(0.6, 0.9, 0.0),   // yellow-green
    Vec3::new(1.0, 0.55, 0.0),  // orange
    Vec3::new(1.0, 0.0, 0.0),   // red
    Vec3::new(1.0, 1.0, 1.0),   // white
];

/// Sample the heatmap gradient; `t` is clamped to [0, 1]
pub fn heatmap(t: f32) -> Vec3 {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let segments = (HEATMAP_STOPS.len() - 1) as f32;
    let scaled = t * segments;
    let i = (scaled.floor() as usize).min(HEATMAP_STOPS.len() - 2);
    let f = scaled - i as f32;
    HEATMAP_STOPS[i].lerp(HEATMAP_STOPS[i + 1], f)
}

/// Displacement and coloring of the heatmap surface
pub trait SurfaceShader {
    /// Height offset for a normalized intensity in [0, 1]
    fn displacement(&self, normalized: f32) -> f32;

    /// Color for a displaced elevation
    fn color(&self, elevation: f32) -> Vec3;

    /// GLSL defining `float displace(float n)` and `vec3 surface_color(float elevation)`
    fn glsl_functions(&self) -> String;
}

/// Opacity of a point inside a beam cone
pub trait BeamShader {
    /// `radial` is the distance from the axis over the local cone radius,
    /// `along` runs from 0 at the apex to 1 at the base
    fn alpha(&self, radial: f32, along: f32) -> f32;

    /// GLSL defining `float beam_alpha(float radial, float along)`
    fn glsl_functions(&self) -> String;
}

/// Heightfield shading: displacement along the normal plus a gradient color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatmapSurface {
    pub displacement_scale: f32,
}

impl HeatmapSurface {
    pub fn new(displacement_scale: f32) -> Self {
        Self { displacement_scale }
    }

    /// Surface scaled to half the volume height
    pub fn for_volume(volume: &Volume) -> Self {
        Self::new(volume.dimensions_ft().z * 0.5)
    }
}

impl SurfaceShader for HeatmapSurface {
    fn displacement(&self, normalized: f32) -> f32 {
        normalized.clamp(0.0, 1.0) * self.displacement_scale
    }

    fn color(&self, elevation: f32) -> Vec3 {
        let range = self.displacement_scale * 0.5;
        if range <= 0.0 {
            return HEATMAP_STOPS[0];
        }
        heatmap(elevation / range)
    }

    fn glsl_functions(&self) -> String {
        glsl::heatmap_surface(self)
    }
}

/// Radial smooth edge times a linear fade away from the source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamFalloff {
    /// Opacity on the axis right at the apex
    pub base_opacity: f32,
    /// Radial fraction where the edge fade begins
    pub edge_start: f32,
}

impl Default for BeamFalloff {
    fn default() -> Self {
        Self {
            base_opacity: 0.18,
            edge_start: 0.35,
        }
    }
}

impl BeamFalloff {
    pub fn new(base_opacity: f32, edge_start: f32) -> Self {
        Self {
            base_opacity: base_opacity.clamp(0.0, 1.0),
            edge_start: edge_start.clamp(0.0, 0.99),
        }
    }
}

impl BeamShader for BeamFalloff {
    fn alpha(&self, radial: f32, along: f32) -> f32 {
        let edge = 1.0 - smoothstep(self.edge_start, 1.0, radial);
        let fade = 1.0 - along.clamp(0.0, 1.0);
        edge * fade * self.base_opacity
    }

    fn glsl_functions(&self) -> String {
        glsl::beam_falloff(self)
    }
}
