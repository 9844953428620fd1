//! Instanced voxel renderer
//!
//! One cube mesh, one instance per classified voxel. The full sorted list is
//! uploaded when the session recomputes it; each frame draws only the
//! revealed prefix, so the reveal animation costs a single uniform-free
//! instance-count change.

use std::sync::Arc;

use flux::{to_render_space, ClassifiedVoxel, FieldSession};
use glam::Vec3;
use glow::*;
use tracing::{debug, info, warn};

use crate::error::{RenderError, Result};
use crate::lighting::{AMBIENT, DIFFUSE_STRENGTH, LIGHT_DIR};
use crate::renderer::{FieldRenderer, FrameContext, VisualizationMode};
use crate::shader_utils::{assemble, create_program};

/// Floats per instance: centre (3), color (3), opacity (1)
pub const INSTANCE_FLOATS: usize = 7;

/// Fraction of a cell the drawn cube fills, leaving gaps between voxels
pub const VOXEL_FILL: f32 = 0.9;

/// Interleave voxels as `[cx, cy, cz, r, g, b, a]` in render space
pub fn pack_instances(voxels: &[ClassifiedVoxel]) -> Vec<f32> {
    let mut data = Vec::with_capacity(voxels.len() * INSTANCE_FLOATS);
    for voxel in voxels {
        let p = to_render_space(voxel.position);
        data.extend_from_slice(&[
            p.x,
            p.y,
            p.z,
            voxel.color.x,
            voxel.color.y,
            voxel.color.z,
            voxel.opacity,
        ]);
    }
    data
}

/// Unit cube centred on the origin: 24 vertices `[px, py, pz, nx, ny, nz]`, 36 indices
pub fn cube_mesh() -> (Vec<f32>, Vec<u32>) {
    const FACES: [(Vec3, Vec3, Vec3); 6] = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];
    let mut vertices = Vec::with_capacity(24 * 6);
    let mut indices = Vec::with_capacity(36);
    for (face, (normal, u, v)) in FACES.iter().enumerate() {
        let base = (face * 4) as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let p = (*normal + *u * su + *v * sv) * 0.5;
            vertices.extend_from_slice(&[p.x, p.y, p.z, normal.x, normal.y, normal.z]);
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

/// Index of the nearest visible voxel hit by a ray
///
/// `cell` is the voxel size in render space.
pub fn pick_voxel(voxels: &[ClassifiedVoxel], cell: Vec3, origin: Vec3, dir: Vec3) -> Option<usize> {
    let half = cell * 0.5 * VOXEL_FILL;
    let inv = dir.recip();
    let mut best: Option<(usize, f32)> = None;
    for (i, voxel) in voxels.iter().enumerate() {
        let centre = to_render_space(voxel.position);
        let t0 = (centre - half - origin) * inv;
        let t1 = (centre + half - origin) * inv;
        let near = t0.min(t1).max_element();
        let far = t0.max(t1).min_element();
        if near.is_nan() || far.is_nan() || far < near.max(0.0) {
            continue;
        }
        let t = near.max(0.0);
        if best.is_none_or(|(_, bt)| t < bt) {
            best = Some((i, t));
        }
    }
    best.map(|(i, _)| i)
}

/// Draws the revealed prefix of the session's voxel list
pub struct VoxelRenderer {
    program: Option<NativeProgram>,
    vao: Option<NativeVertexArray>,
    mesh_vbo: Option<NativeBuffer>,
    mesh_ebo: Option<NativeBuffer>,
    instance_vbo: Option<NativeBuffer>,
    index_count: i32,
    /// List currently in the instance buffer
    uploaded: Option<Arc<Vec<ClassifiedVoxel>>>,
    /// Instances drawn last frame
    drawn: usize,
}

impl Default for VoxelRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl VoxelRenderer {
    pub fn new() -> Self {
        Self {
            program: None,
            vao: None,
            mesh_vbo: None,
            mesh_ebo: None,
            instance_vbo: None,
            index_count: 0,
            uploaded: None,
            drawn: 0,
        }
    }

    pub fn drawn(&self) -> usize {
        self.drawn
    }

    /// # Safety
    ///
    /// Must be called with an active GL context on the current thread.
    pub unsafe fn init_gl(&mut self, gl: &Context) -> Result<()> {
        unsafe {
            let program = create_program(
                gl,
                &assemble(VERTEX_DECLARATIONS, "", VERTEX_BODY),
                &assemble(FRAGMENT_DECLARATIONS, "", FRAGMENT_BODY),
            )?;
            self.program = Some(program);

            let (vertices, indices) = cube_mesh();

            let vao = gl
                .create_vertex_array()
                .map_err(RenderError::resource("voxel VAO"))?;
            gl.bind_vertex_array(Some(vao));

            let mesh_vbo = gl
                .create_buffer()
                .map_err(RenderError::resource("voxel mesh VBO"))?;
            gl.bind_buffer(ARRAY_BUFFER, Some(mesh_vbo));
            gl.buffer_data_u8_slice(ARRAY_BUFFER, bytemuck::cast_slice(&vertices), STATIC_DRAW);

            // Position (location 0), normal (location 1)
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 3, FLOAT, false, 24, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 3, FLOAT, false, 24, 12);

            let mesh_ebo = gl
                .create_buffer()
                .map_err(RenderError::resource("voxel mesh EBO"))?;
            gl.bind_buffer(ELEMENT_ARRAY_BUFFER, Some(mesh_ebo));
            gl.buffer_data_u8_slice(ELEMENT_ARRAY_BUFFER, bytemuck::cast_slice(&indices), STATIC_DRAW);

            let instance_vbo = gl
                .create_buffer()
                .map_err(RenderError::resource("voxel instance VBO"))?;
            gl.bind_buffer(ARRAY_BUFFER, Some(instance_vbo));
            let stride = (INSTANCE_FLOATS * 4) as i32;
            // Centre (2), color (3), opacity (4), one step per instance
            gl.enable_vertex_attrib_array(2);
            gl.vertex_attrib_pointer_f32(2, 3, FLOAT, false, stride, 0);
            gl.vertex_attrib_divisor(2, 1);
            gl.enable_vertex_attrib_array(3);
            gl.vertex_attrib_pointer_f32(3, 3, FLOAT, false, stride, 12);
            gl.vertex_attrib_divisor(3, 1);
            gl.enable_vertex_attrib_array(4);
            gl.vertex_attrib_pointer_f32(4, 1, FLOAT, false, stride, 24);
            gl.vertex_attrib_divisor(4, 1);

            gl.bind_vertex_array(None);
            gl.bind_buffer(ARRAY_BUFFER, None);

            self.vao = Some(vao);
            self.mesh_vbo = Some(mesh_vbo);
            self.mesh_ebo = Some(mesh_ebo);
            self.instance_vbo = Some(instance_vbo);
            self.index_count = indices.len() as i32;
            self.uploaded = None;

            info!("voxel renderer initialized");
            Ok(())
        }
    }

    /// Replace the instance buffer when the session produced a new list
    unsafe fn sync_instances(&mut self, gl: &Context, voxels: &Arc<Vec<ClassifiedVoxel>>) {
        unsafe {
            if self.uploaded.as_ref().is_some_and(|u| Arc::ptr_eq(u, voxels)) {
                return;
            }
            let Some(vbo) = self.instance_vbo else { return };
            let data = pack_instances(voxels);
            gl.bind_buffer(ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(ARRAY_BUFFER, bytemuck::cast_slice(&data), STATIC_DRAW);
            gl.bind_buffer(ARRAY_BUFFER, None);
            debug!(count = voxels.len(), "uploaded voxel instances");
            self.uploaded = Some(Arc::clone(voxels));
        }
    }

    /// # Safety
    ///
    /// Must be called with an active GL context on the current thread.
    pub unsafe fn render(
        &mut self,
        gl: &Context,
        session: &mut FieldSession,
        frame: &FrameContext,
    ) -> Result<()> {
        unsafe {
            let (Some(program), Some(vao)) = (self.program, self.vao) else {
                return Err(RenderError::NotInitialized);
            };

            let reveal = session.tick(frame.dt);
            self.sync_instances(gl, &reveal.voxels);
            self.drawn = reveal.visible().len();
            if self.drawn == 0 {
                return Ok(());
            }

            let cell = to_render_space(session.voxel_cell_size()) * VOXEL_FILL;
            let highlight = session
                .hover_index()
                .filter(|i| *i < self.drawn)
                .map_or(-1, |i| i as i32);

            gl.use_program(Some(program));
            gl.enable(DEPTH_TEST);
            gl.depth_func(LESS);
            // Translucent cells must not hide each other
            gl.depth_mask(false);
            gl.enable(BLEND);
            gl.blend_func(SRC_ALPHA, ONE_MINUS_SRC_ALPHA);
            gl.enable(CULL_FACE);
            gl.cull_face(BACK);
            gl.front_face(CCW);

            let view_proj = frame.camera.view_projection(frame.width, frame.height);
            let loc = gl.get_uniform_location(program, "u_view_proj");
            gl.uniform_matrix_4_f32_slice(loc.as_ref(), false, view_proj.as_ref());
            let loc = gl.get_uniform_location(program, "u_cell_size");
            gl.uniform_3_f32(loc.as_ref(), cell.x, cell.y, cell.z);
            let loc = gl.get_uniform_location(program, "u_light_dir");
            gl.uniform_3_f32(loc.as_ref(), LIGHT_DIR.x, LIGHT_DIR.y, LIGHT_DIR.z);
            let loc = gl.get_uniform_location(program, "u_ambient");
            gl.uniform_1_f32(loc.as_ref(), AMBIENT);
            let loc = gl.get_uniform_location(program, "u_diffuse");
            gl.uniform_1_f32(loc.as_ref(), DIFFUSE_STRENGTH);
            let loc = gl.get_uniform_location(program, "u_highlight");
            gl.uniform_1_i32(loc.as_ref(), highlight);

            gl.bind_vertex_array(Some(vao));
            gl.draw_elements_instanced(TRIANGLES, self.index_count, UNSIGNED_INT, 0, self.drawn as i32);
            gl.bind_vertex_array(None);

            gl.disable(CULL_FACE);
            gl.disable(BLEND);
            gl.depth_mask(true);
            gl.use_program(None);
            Ok(())
        }
    }

    /// # Safety
    ///
    /// Must be called with an active GL context on the current thread.
    pub unsafe fn destroy_gl(&mut self, gl: &Context) {
        unsafe {
            if let Some(vao) = self.vao.take() {
                gl.delete_vertex_array(vao);
            }
            for buffer in [self.mesh_vbo.take(), self.mesh_ebo.take(), self.instance_vbo.take()]
                .into_iter()
                .flatten()
            {
                gl.delete_buffer(buffer);
            }
            if let Some(program) = self.program.take() {
                gl.delete_program(program);
            }
            self.uploaded = None;
            self.drawn = 0;
        }
    }
}

impl FieldRenderer for VoxelRenderer {
    fn name(&self) -> &str {
        "Voxel Renderer"
    }

    fn mode(&self) -> VisualizationMode {
        VisualizationMode::Voxels
    }

    fn init_gl(&mut self, gl: &Context) -> Result<()> {
        unsafe { VoxelRenderer::init_gl(self, gl) }
    }

    fn destroy_gl(&mut self, gl: &Context) {
        unsafe { VoxelRenderer::destroy_gl(self, gl) }
    }

    fn is_initialized(&self) -> bool {
        self.program.is_some()
    }

    fn render(&mut self, gl: &Context, session: &mut FieldSession, frame: &FrameContext) -> Result<()> {
        unsafe { VoxelRenderer::render(self, gl, session, frame) }
    }
}

impl Drop for VoxelRenderer {
    fn drop(&mut self) {
        if self.program.is_some() || self.vao.is_some() || self.instance_vbo.is_some() {
            warn!("VoxelRenderer dropped without calling destroy_gl()");
        }
    }
}

const VERTEX_DECLARATIONS: &str = r#"
layout(location = 0) in vec3 a_position;
layout(location = 1) in vec3 a_normal;
layout(location = 2) in vec3 a_centre;
layout(location = 3) in vec3 a_color;
layout(location = 4) in float a_opacity;

uniform mat4 u_view_proj;
uniform vec3 u_cell_size;
uniform int u_highlight;

out vec3 v_normal;
out vec4 v_color;
flat out int v_highlighted;
"#;

const VERTEX_BODY: &str = r#"
void main() {
    vec3 world = a_centre + a_position * u_cell_size;
    v_normal = a_normal;
    v_color = vec4(a_color, a_opacity);
    v_highlighted = gl_InstanceID == u_highlight ? 1 : 0;
    gl_Position = u_view_proj * vec4(world, 1.0);
}
"#;

const FRAGMENT_DECLARATIONS: &str = r#"
in vec3 v_normal;
in vec4 v_color;
flat in int v_highlighted;

uniform vec3 u_light_dir;
uniform float u_ambient;
uniform float u_diffuse;

out vec4 FragColor;
"#;

const FRAGMENT_BODY: &str = r#"
void main() {
    float diffuse = max(dot(normalize(v_normal), u_light_dir), 0.0);
    vec3 color = v_color.rgb * (u_ambient + u_diffuse * diffuse);
    float alpha = v_color.a;
    if (v_highlighted == 1) {
        color = mix(color, vec3(1.0), 0.5);
        alpha = max(alpha, 0.85);
    }
    FragColor = vec4(color, alpha);
}
"#;
