//! Beam cone geometry for the volumetric beam view
//!
//! One cone per light instance, hanging from the fixture down to the floor.
//! A [`BeamSet`] depends only on the layout, never on time, so it is rebuilt
//! when the configuration changes and reused every frame otherwise.

use std::f32::consts::TAU;

use glam::{Mat4, Quat, Vec3};
use tracing::debug;

use crate::field::{resolve_mount, SimulationKey};
use crate::light::LightSource;
use crate::units::{to_render_space, Volume};

/// Half angles are capped below 90 degrees so the radius stays finite
const MAX_HALF_ANGLE_DEG: f32 = 89.0;

/// Cone for a single fixture placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beam {
    /// Fixture position in feet (Z up)
    pub apex: Vec3,
    /// Distance from the fixture to the floor
    pub height: f32,
    /// Base radius, `tan(beam_angle / 2) * height`
    pub radius: f32,
    /// Rotation about the vertical axis in degrees
    pub rotation: f32,
    /// Output relative to the strongest beam in the set, in [0, 1]
    pub weight: f32,
}

impl Beam {
    pub fn new(apex: Vec3, height: f32, beam_angle: f32, rotation: f32) -> Self {
        let half = (beam_angle * 0.5).clamp(0.0, MAX_HALF_ANGLE_DEG);
        let height = height.max(0.0);
        Self {
            apex,
            height,
            radius: half.to_radians().tan() * height,
            rotation,
            weight: 1.0,
        }
    }

    /// Maps the unit cone (apex at origin, base at y = -1, radius 1) into
    /// render space
    pub fn transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::new(self.radius, self.height, self.radius),
            Quat::from_rotation_y(self.rotation.to_radians()),
            to_render_space(self.apex),
        )
    }
}

/// Every beam of a layout plus the key it was built from
#[derive(Debug, Clone, PartialEq)]
pub struct BeamSet {
    beams: Vec<Beam>,
    key: SimulationKey,
}

impl BeamSet {
    pub fn build(volume: &Volume, lights: &[LightSource], mounting_height: Option<f32>) -> Self {
        let key = SimulationKey::for_layout(volume, lights, mounting_height);
        if !volume.is_valid() {
            return Self {
                beams: Vec::new(),
                key,
            };
        }

        let mount = resolve_mount(volume, mounting_height);
        let dims = volume.dimensions_ft();
        let strongest = lights
            .iter()
            .map(|l| l.max_intensity() * l.quantity() as f32)
            .fold(0.0, f32::max);

        let mut beams = Vec::new();
        for light in lights {
            let output = light.max_intensity() * light.quantity() as f32;
            let weight = if strongest > 0.0 { output / strongest } else { 0.0 };
            for inst in light.instances() {
                let apex = inst.position(dims.x, dims.y, mount);
                let mut beam = Beam::new(apex, mount, light.beam_angle(), inst.rotation);
                beam.weight = weight;
                beams.push(beam);
            }
        }
        debug!(beams = beams.len(), mount, "built beam set");
        Self { beams, key }
    }

    pub fn beams(&self) -> &[Beam] {
        &self.beams
    }

    pub fn key(&self) -> SimulationKey {
        self.key
    }

    pub fn len(&self) -> usize {
        self.beams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beams.is_empty()
    }

    /// Per-instance transforms, column-major, ready for upload
    pub fn instance_matrices(&self) -> Vec<[f32; 16]> {
        self.beams.iter().map(|b| b.transform().to_cols_array()).collect()
    }
}

/// Open unit cone: apex at the origin, base ring of radius 1 at y = -1
#[derive(Debug, Clone, PartialEq)]
pub struct ConeMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    /// 0 at the apex, 1 at the base
    pub along: Vec<f32>,
    pub indices: Vec<u32>,
}

impl ConeMesh {
    pub fn unit(segments: u32) -> Self {
        let segments = segments.max(3);
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut along = Vec::new();

        // Ring, with a duplicated seam vertex
        for i in 0..=segments {
            let theta = i as f32 / segments as f32 * TAU;
            let (s, c) = theta.sin_cos();
            positions.push(Vec3::new(c, -1.0, s));
            normals.push(Vec3::new(c, 1.0, s).normalize());
            along.push(1.0);
        }

        // One apex per segment so each face gets a sensible normal
        let apex_base = segments + 1;
        for i in 0..segments {
            let theta = (i as f32 + 0.5) / segments as f32 * TAU;
            let (s, c) = theta.sin_cos();
            positions.push(Vec3::ZERO);
            normals.push(Vec3::new(c, 1.0, s).normalize());
            along.push(0.0);
        }

        let mut indices = Vec::with_capacity(segments as usize * 3);
        for i in 0..segments {
            indices.extend_from_slice(&[apex_base + i, i + 1, i]);
        }

        Self {
            positions,
            normals,
            along,
            indices,
        }
    }

    /// Interleaved `[px, py, pz, nx, ny, nz, along]` per vertex
    pub fn interleaved(&self) -> Vec<f32> {
        self.positions
            .iter()
            .zip(&self.normals)
            .zip(&self.along)
            .flat_map(|((p, n), a)| [p.x, p.y, p.z, n.x, n.y, n.z, *a])
            .collect()
    }
}
