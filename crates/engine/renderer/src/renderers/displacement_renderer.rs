//! Heatmap surface displaced by field intensity
//!
//! The session's normalized 8x8 field lives in a single-channel float
//! texture. A finely subdivided floor plane samples it in the vertex stage
//! and rises by `displace(n)`; the fragment stage colors by elevation. Both
//! functions come from [`flux::SurfaceShader::glsl_functions`], so the GPU
//! output matches the CPU reference exactly.

use std::sync::Arc;

use flux::{
    DisplacementField, FieldSession, HeatmapSurface, PlaneMesh, SurfaceShader,
    DISPLACEMENT_SCALE_UNIFORM,
};
use glam::Vec2;
use glow::*;
use tracing::{debug, info, warn};

use crate::error::{RenderError, Result};
use crate::lighting::{AMBIENT, DIFFUSE_STRENGTH, LIGHT_DIR};
use crate::renderer::{FieldRenderer, FrameContext, VisualizationMode};
use crate::shader_utils::{assemble, create_program};

/// Plane subdivisions per side
pub const PLANE_SEGMENTS: u32 = 64;

/// Vertex and fragment sources for a surface shader
pub fn surface_sources(shader: &impl SurfaceShader) -> (String, String) {
    let functions = shader.glsl_functions();
    (
        assemble(VERTEX_DECLARATIONS, &functions, VERTEX_BODY),
        assemble(FRAGMENT_DECLARATIONS, &functions, FRAGMENT_BODY),
    )
}

/// Draws the session's displacement field as a heatmap surface
pub struct DisplacementRenderer {
    program: Option<NativeProgram>,
    vao: Option<NativeVertexArray>,
    vbo: Option<NativeBuffer>,
    ebo: Option<NativeBuffer>,
    texture: Option<NativeTexture>,
    index_count: i32,
    /// Footprint the plane mesh was built for, feet
    plane_size: Option<Vec2>,
    uploaded: Option<Arc<DisplacementField>>,
    /// Modulate the gradient by directional lighting
    shaded: bool,
}

impl Default for DisplacementRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplacementRenderer {
    pub fn new() -> Self {
        Self {
            program: None,
            vao: None,
            vbo: None,
            ebo: None,
            texture: None,
            index_count: 0,
            plane_size: None,
            uploaded: None,
            shaded: false,
        }
    }

    /// Enable directional lighting over the gradient
    ///
    /// Off by default, so pixels carry the exact `surface_color` value.
    pub fn set_shaded(&mut self, shaded: bool) {
        self.shaded = shaded;
    }

    pub fn is_shaded(&self) -> bool {
        self.shaded
    }

    /// `(ambient, diffuse)` uniforms for the current shading setting
    pub fn lighting_terms(&self) -> (f32, f32) {
        if self.shaded {
            (AMBIENT, DIFFUSE_STRENGTH)
        } else {
            (1.0, 0.0)
        }
    }

    /// # Safety
    ///
    /// Must be called with an active GL context on the current thread.
    pub unsafe fn init_gl(&mut self, gl: &Context) -> Result<()> {
        unsafe {
            // The scale is a uniform, so any surface instance yields the same source
            let (vertex, fragment) = surface_sources(&HeatmapSurface::new(1.0));
            let program = create_program(gl, &vertex, &fragment)?;
            self.program = Some(program);

            let vao = gl
                .create_vertex_array()
                .map_err(RenderError::resource("surface VAO"))?;
            let vbo = gl
                .create_buffer()
                .map_err(RenderError::resource("surface VBO"))?;
            let ebo = gl
                .create_buffer()
                .map_err(RenderError::resource("surface EBO"))?;

            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(ARRAY_BUFFER, Some(vbo));
            // Position (location 0), plane uv (location 1)
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 3, FLOAT, false, 20, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 2, FLOAT, false, 20, 12);
            gl.bind_buffer(ELEMENT_ARRAY_BUFFER, Some(ebo));
            gl.bind_vertex_array(None);
            gl.bind_buffer(ARRAY_BUFFER, None);

            let texture = gl
                .create_texture()
                .map_err(RenderError::resource("displacement texture"))?;
            gl.bind_texture(TEXTURE_2D, Some(texture));
            gl.tex_parameter_i32(TEXTURE_2D, TEXTURE_MIN_FILTER, LINEAR as i32);
            gl.tex_parameter_i32(TEXTURE_2D, TEXTURE_MAG_FILTER, LINEAR as i32);
            gl.tex_parameter_i32(TEXTURE_2D, TEXTURE_WRAP_S, CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(TEXTURE_2D, TEXTURE_WRAP_T, CLAMP_TO_EDGE as i32);
            gl.bind_texture(TEXTURE_2D, None);

            self.vao = Some(vao);
            self.vbo = Some(vbo);
            self.ebo = Some(ebo);
            self.texture = Some(texture);
            self.plane_size = None;
            self.uploaded = None;

            info!("displacement renderer initialized");
            Ok(())
        }
    }

    /// Rebuild the plane when the footprint changed
    unsafe fn sync_plane(&mut self, gl: &Context, size: Vec2) {
        unsafe {
            if self.plane_size == Some(size) {
                return;
            }
            let (Some(vao), Some(vbo)) = (self.vao, self.vbo) else { return };
            let mesh = PlaneMesh::subdivided(size.x, size.y, PLANE_SEGMENTS);
            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(ARRAY_BUFFER, bytemuck::cast_slice(&mesh.interleaved()), STATIC_DRAW);
            // The element binding is part of the VAO
            gl.buffer_data_u8_slice(
                ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(&mesh.indices),
                STATIC_DRAW,
            );
            gl.bind_vertex_array(None);
            gl.bind_buffer(ARRAY_BUFFER, None);
            self.index_count = mesh.indices.len() as i32;
            self.plane_size = Some(size);
            debug!(width = size.x, depth = size.y, "rebuilt surface plane");
        }
    }

    /// Re-upload the texture when the session produced a new field
    unsafe fn sync_texture(&mut self, gl: &Context, field: &Arc<DisplacementField>) {
        unsafe {
            if self.uploaded.as_ref().is_some_and(|u| Arc::ptr_eq(u, field)) {
                return;
            }
            let Some(texture) = self.texture else { return };
            gl.bind_texture(TEXTURE_2D, Some(texture));
            gl.pixel_store_i32(UNPACK_ALIGNMENT, 4);
            // R16F is filterable under GLES 3.0 and accepts float uploads
            gl.tex_image_2d(
                TEXTURE_2D,
                0,
                R16F as i32,
                field.cols() as i32,
                field.rows() as i32,
                0,
                RED,
                FLOAT,
                PixelUnpackData::Slice(Some(bytemuck::cast_slice(field.texels()))),
            );
            gl.bind_texture(TEXTURE_2D, None);
            debug!(peak = field.peak(), "uploaded displacement texture");
            self.uploaded = Some(Arc::clone(field));
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
            let (Some(program), Some(vao), Some(texture)) = (self.program, self.vao, self.texture) else {
                return Err(RenderError::NotInitialized);
            };

            let volume = *session.volume();
            let dims = volume.dimensions_ft();
            if !volume.is_valid() {
                return Ok(());
            }
            self.sync_plane(gl, Vec2::new(dims.x, dims.y));
            let field = session.displacement();
            if field.is_empty() {
                return Ok(());
            }
            self.sync_texture(gl, &field);

            let surface = HeatmapSurface::for_volume(&volume);

            gl.use_program(Some(program));
            gl.enable(DEPTH_TEST);
            gl.depth_func(LESS);
            gl.disable(CULL_FACE);

            gl.active_texture(TEXTURE0);
            gl.bind_texture(TEXTURE_2D, Some(texture));
            let loc = gl.get_uniform_location(program, "u_field");
            gl.uniform_1_i32(loc.as_ref(), 0);
            let loc = gl.get_uniform_location(program, "u_texel_count");
            gl.uniform_2_f32(loc.as_ref(), field.cols() as f32, field.rows() as f32);
            let loc = gl.get_uniform_location(program, "u_plane_size");
            gl.uniform_2_f32(loc.as_ref(), dims.x, dims.y);
            let loc = gl.get_uniform_location(program, DISPLACEMENT_SCALE_UNIFORM);
            gl.uniform_1_f32(loc.as_ref(), surface.displacement_scale);

            let view_proj = frame.camera.view_projection(frame.width, frame.height);
            let loc = gl.get_uniform_location(program, "u_view_proj");
            gl.uniform_matrix_4_f32_slice(loc.as_ref(), false, view_proj.as_ref());
            let loc = gl.get_uniform_location(program, "u_light_dir");
            gl.uniform_3_f32(loc.as_ref(), LIGHT_DIR.x, LIGHT_DIR.y, LIGHT_DIR.z);
            let (ambient, diffuse) = self.lighting_terms();
            let loc = gl.get_uniform_location(program, "u_ambient");
            gl.uniform_1_f32(loc.as_ref(), ambient);
            let loc = gl.get_uniform_location(program, "u_diffuse");
            gl.uniform_1_f32(loc.as_ref(), diffuse);

            gl.bind_vertex_array(Some(vao));
            gl.draw_elements(TRIANGLES, self.index_count, UNSIGNED_INT, 0);
            gl.bind_vertex_array(None);

            gl.bind_texture(TEXTURE_2D, None);
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
            for buffer in [self.vbo.take(), self.ebo.take()].into_iter().flatten() {
                gl.delete_buffer(buffer);
            }
            if let Some(texture) = self.texture.take() {
                gl.delete_texture(texture);
            }
            if let Some(program) = self.program.take() {
                gl.delete_program(program);
            }
            self.plane_size = None;
            self.uploaded = None;
        }
    }
}

impl FieldRenderer for DisplacementRenderer {
    fn name(&self) -> &str {
        "Displacement Renderer"
    }

    fn mode(&self) -> VisualizationMode {
        VisualizationMode::Displacement
    }

    fn init_gl(&mut self, gl: &Context) -> Result<()> {
        unsafe { DisplacementRenderer::init_gl(self, gl) }
    }

    fn destroy_gl(&mut self, gl: &Context) {
        unsafe { DisplacementRenderer::destroy_gl(self, gl) }
    }

    fn is_initialized(&self) -> bool {
        self.program.is_some()
    }

    fn render(&mut self, gl: &Context, session: &mut FieldSession, frame: &FrameContext) -> Result<()> {
        unsafe { DisplacementRenderer::render(self, gl, session, frame) }
    }
}

impl Drop for DisplacementRenderer {
    fn drop(&mut self) {
        if self.program.is_some() || self.vao.is_some() || self.texture.is_some() {
            warn!("DisplacementRenderer dropped without calling destroy_gl()");
        }
    }
}

const VERTEX_DECLARATIONS: &str = r#"
layout(location = 0) in vec3 a_position;
layout(location = 1) in vec2 a_uv;

uniform mat4 u_view_proj;
uniform sampler2D u_field;
uniform vec2 u_texel_count;
uniform float u_displacement_scale;
uniform vec2 u_plane_size;

out float v_elevation;
out vec3 v_normal;
"#;

const VERTEX_BODY: &str = r#"
// Plane coordinate to texel-centre aligned texture coordinate
vec2 field_coord(vec2 uv) {
    vec2 n = max(u_texel_count, vec2(2.0));
    return (clamp(uv, 0.0, 1.0) * (n - 1.0) + 0.5) / n;
}

float height_at(vec2 uv) {
    return displace(texture(u_field, field_coord(uv)).r);
}

void main() {
    float h = height_at(a_uv);
    vec2 delta = vec2(1.0 / 64.0);
    float hx = height_at(a_uv + vec2(delta.x, 0.0)) - height_at(a_uv - vec2(delta.x, 0.0));
    float hz = height_at(a_uv + vec2(0.0, delta.y)) - height_at(a_uv - vec2(0.0, delta.y));
    vec3 tangent_x = vec3(2.0 * delta.x * u_plane_size.x, hx, 0.0);
    vec3 tangent_z = vec3(0.0, hz, 2.0 * delta.y * u_plane_size.y);
    v_normal = normalize(cross(tangent_z, tangent_x));
    v_elevation = h;
    gl_Position = u_view_proj * vec4(a_position + vec3(0.0, h, 0.0), 1.0);
}
"#;

const FRAGMENT_DECLARATIONS: &str = r#"
in float v_elevation;
in vec3 v_normal;

uniform float u_displacement_scale;
uniform vec3 u_light_dir;
uniform float u_ambient;
uniform float u_diffuse;

out vec4 FragColor;
"#;

const FRAGMENT_BODY: &str = r#"
void main() {
    float diffuse = abs(dot(normalize(v_normal), u_light_dir));
    vec3 color = surface_color(v_elevation) * (u_ambient + u_diffuse * diffuse);
    FragColor = vec4(color, 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_include_surface_functions() {
        let (vertex, fragment) = surface_sources(&HeatmapSurface::new(2.0));
        for src in [&vertex, &fragment] {
            assert!(src.starts_with("#version 300 es"));
            assert!(src.contains("float displace(float n)"));
            assert!(src.contains("vec3 surface_color(float elevation)"));
            assert!(src.contains("uniform float u_displacement_scale;"));
        }
        // Declarations precede the generated functions that use them
        let uniform = vertex.find("uniform float u_displacement_scale").unwrap();
        let func = vertex.find("float displace(float n)").unwrap();
        assert!(uniform < func);
        assert!(vertex.contains("height_at"));
        assert!(fragment.contains("surface_color(v_elevation)"));
    }

    #[test]
    fn test_unshaded_by_default() {
        let mut renderer = DisplacementRenderer::new();
        assert!(!renderer.is_shaded());
        // ambient 1 and diffuse 0 leave surface_color untouched
        assert_eq!(renderer.lighting_terms(), (1.0, 0.0));
        assert!(FRAGMENT_BODY.contains("surface_color(v_elevation) * (u_ambient + u_diffuse * diffuse)"));

        renderer.set_shaded(true);
        assert_eq!(renderer.lighting_terms(), (AMBIENT, DIFFUSE_STRENGTH));
    }

    #[test]
    fn test_field_coord_matches_cpu_texcoord() {
        // The shader's field_coord repeats DisplacementField::texcoord
        let n = flux::DISPLACEMENT_RESOLUTION;
        for (u, expected) in [(0.0, 0.5 / 8.0), (1.0, 7.5 / 8.0), (0.5, 4.0 / 8.0)] {
            assert!((DisplacementField::texcoord(u, n) - expected).abs() < 1e-6);
        }
        assert!(VERTEX_BODY.contains("(clamp(uv, 0.0, 1.0) * (n - 1.0) + 0.5) / n"));
    }
}
