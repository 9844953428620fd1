//! Coarse normalized field for the displaced heatmap surface
//!
//! The field is resampled on a small fixed grid and normalized against its own
//! peak. The texels are uploaded as a single-channel float texture; a finely
//! subdivided plane is displaced by sampling it in the vertex stage.

use glam::{Vec2, Vec3};
use tracing::debug;

use crate::field::{compute_field_with, FieldSample, Resolution};
use crate::light::LightSource;
use crate::model::{FieldModel, RadiometricModel};
use crate::shading::SurfaceShader;
use crate::units::Volume;

/// Texels per axis of the displacement texture
pub const DISPLACEMENT_RESOLUTION: usize = 8;

/// Normalized intensity texels, row-major (rows along depth)
#[derive(Debug, Clone, PartialEq)]
pub struct DisplacementField {
    cols: usize,
    rows: usize,
    texels: Vec<f32>,
    peak: f32,
}

impl DisplacementField {
    /// Resample the canopy-plane field at the fixed texture resolution
    pub fn compute(volume: &Volume, lights: &[LightSource], mounting_height: Option<f32>) -> Self {
        Self::compute_with(&FieldModel::default(), volume, lights, mounting_height)
    }

    pub fn compute_with<M: RadiometricModel>(
        model: &M,
        volume: &Volume,
        lights: &[LightSource],
        mounting_height: Option<f32>,
    ) -> Self {
        let sample = compute_field_with(model, volume, lights, Self::resolution(), mounting_height);
        Self::from_sample(&sample)
    }

    /// Grid the field is resampled on
    pub fn resolution() -> Resolution {
        Resolution::grid(DISPLACEMENT_RESOLUTION, DISPLACEMENT_RESOLUTION)
    }

    /// Normalize the first layer of any sample
    pub fn from_sample(sample: &FieldSample) -> Self {
        let values = sample.layer(0);
        let peak = values.iter().copied().fold(0.0, f32::max);
        let texels = if peak > 0.0 {
            values.iter().map(|v| (v / peak).clamp(0.0, 1.0)).collect()
        } else {
            vec![0.0; values.len()]
        };
        debug!(cols = sample.cols(), rows = sample.rows(), peak, "built displacement field");
        Self {
            cols: sample.cols(),
            rows: sample.rows(),
            texels,
            peak,
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Normalized values in [0, 1]
    pub fn texels(&self) -> &[f32] {
        &self.texels
    }

    /// Intensity that maps to 1.0
    pub fn peak(&self) -> f32 {
        self.peak
    }

    pub fn is_empty(&self) -> bool {
        self.texels.is_empty()
    }

    /// Texture coordinate that lands plane coordinate `u` on grid node centres
    ///
    /// Node `i` of `n` sits at `u = i / (n - 1)` on the plane but at texel
    /// centre `(i + 0.5) / n` in the texture.
    pub fn texcoord(u: f32, n: usize) -> f32 {
        if n <= 1 {
            return 0.5;
        }
        (u.clamp(0.0, 1.0) * (n - 1) as f32 + 0.5) / n as f32
    }

    /// Bilinear lookup with GL `LINEAR` filtering and clamp-to-edge wrapping
    pub fn sample_texture(&self, s: f32, t: f32) -> f32 {
        if self.texels.is_empty() {
            return 0.0;
        }
        let (x0, x1, fx) = linear_taps(s, self.cols);
        let (y0, y1, fy) = linear_taps(t, self.rows);
        let at = |x: usize, y: usize| self.texels[y * self.cols + x];
        let top = at(x0, y0) + (at(x1, y0) - at(x0, y0)) * fx;
        let bottom = at(x0, y1) + (at(x1, y1) - at(x0, y1)) * fx;
        top + (bottom - top) * fy
    }

    /// Normalized intensity at plane coordinates (u, v) in [0, 1]
    pub fn sample_plane(&self, u: f32, v: f32) -> f32 {
        self.sample_texture(Self::texcoord(u, self.cols), Self::texcoord(v, self.rows))
    }
}

fn linear_taps(coord: f32, n: usize) -> (usize, usize, f32) {
    let x = (coord * n as f32 - 0.5).clamp(0.0, (n - 1) as f32);
    let i0 = x.floor() as usize;
    let i1 = (i0 + 1).min(n - 1);
    (i0, i1, x - i0 as f32)
}

/// Flat subdivided plane on the floor, in Y-up render space
///
/// Spans `[0, width] x [0, depth]` in X/Z with UVs over [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneMesh {
    pub positions: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
}

impl PlaneMesh {
    pub fn subdivided(width: f32, depth: f32, segments: u32) -> Self {
        let segments = segments.max(1);
        let side = segments + 1;
        let mut positions = Vec::with_capacity((side * side) as usize);
        let mut uvs = Vec::with_capacity((side * side) as usize);

        for j in 0..side {
            let v = j as f32 / segments as f32;
            for i in 0..side {
                let u = i as f32 / segments as f32;
                positions.push(Vec3::new(u * width, 0.0, v * depth));
                uvs.push(Vec2::new(u, v));
            }
        }

        let mut indices = Vec::with_capacity((segments * segments * 6) as usize);
        for j in 0..segments {
            for i in 0..segments {
                let a = j * side + i;
                let b = a + 1;
                let c = a + side;
                let d = c + 1;
                // Counter-clockwise seen from +Y
                indices.extend_from_slice(&[a, c, b, b, c, d]);
            }
        }

        Self {
            positions,
            uvs,
            indices,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Interleaved `[px, py, pz, u, v]` per vertex
    pub fn interleaved(&self) -> Vec<f32> {
        self.positions
            .iter()
            .zip(&self.uvs)
            .flat_map(|(p, uv)| [p.x, p.y, p.z, uv.x, uv.y])
            .collect()
    }

    /// Vertex positions after displacement, as the vertex stage computes them
    pub fn displaced(&self, field: &DisplacementField, shader: &impl SurfaceShader) -> Vec<Vec3> {
        self.positions
            .iter()
            .zip(&self.uvs)
            .map(|(p, uv)| *p + Vec3::Y * shader.displacement(field.sample_plane(uv.x, uv.y)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shading::HeatmapSurface;

    fn sample_2x2() -> DisplacementField {
        let sample = FieldSample::from_values(
            Resolution::grid(2, 2),
            Vec3::ONE,
            vec![0.0, 100.0, 200.0, 400.0],
        );
        DisplacementField::from_sample(&sample)
    }

    #[test]
    fn test_normalized_to_own_peak() {
        let field = sample_2x2();
        assert_eq!(field.peak(), 400.0);
        assert_eq!(field.texels(), &[0.0, 0.25, 0.5, 1.0]);
    }

    #[test]
    fn test_dark_field_is_flat() {
        let field = DisplacementField::compute(&Volume::default(), &[], None);
        assert_eq!(field.texels().len(), 64);
        assert!(field.texels().iter().all(|t| *t == 0.0));
    }

    #[test]
    fn test_computed_peak_is_one() {
        let light = LightSource::new("p", 700.0).at(0.5, 0.5);
        let field = DisplacementField::compute(&Volume::default(), &[light], None);
        let max = field.texels().iter().copied().fold(0.0, f32::max);
        assert_eq!(max, 1.0);
    }

    #[test]
    fn test_plane_samples_hit_nodes() {
        let field = sample_2x2();
        assert!((field.sample_plane(0.0, 0.0) - 0.0).abs() < 1e-6);
        assert!((field.sample_plane(1.0, 0.0) - 0.25).abs() < 1e-6);
        assert!((field.sample_plane(1.0, 1.0) - 1.0).abs() < 1e-6);
        assert!((field.sample_plane(0.5, 0.5) - 0.4375).abs() < 1e-6);
    }

    #[test]
    fn test_texture_clamps_to_edge() {
        let field = sample_2x2();
        assert_eq!(field.sample_texture(-1.0, -1.0), 0.0);
        assert_eq!(field.sample_texture(0.1, 0.1), 0.0);
        assert_eq!(field.sample_texture(2.0, 2.0), 1.0);
    }

    #[test]
    fn test_plane_mesh() {
        let mesh = PlaneMesh::subdivided(4.0, 2.0, 4);
        assert_eq!(mesh.vertex_count(), 25);
        assert_eq!(mesh.indices.len(), 4 * 4 * 6);
        assert_eq!(mesh.positions[24], Vec3::new(4.0, 0.0, 2.0));
        assert_eq!(mesh.interleaved().len(), 25 * 5);
        assert!(mesh.indices.iter().all(|i| (*i as usize) < mesh.vertex_count()));
    }

    #[test]
    fn test_displaced_mesh() {
        let field = sample_2x2();
        let mesh = PlaneMesh::subdivided(1.0, 1.0, 1);
        let displaced = mesh.displaced(&field, &HeatmapSurface::new(2.0));
        assert_eq!(displaced[3].y, 2.0);
        assert_eq!(displaced[0].y, 0.0);
    }
}
