//! Additive light cones, one per fixture
//!
//! Beam geometry depends only on the light layout. The instance buffer is
//! rebuilt when the session's [`BeamSet`] key changes and is otherwise left
//! untouched from frame to frame.

use flux::{BeamFalloff, BeamSet, BeamShader, ConeMesh, FieldSession, SimulationKey};
use glam::Vec3;
use glow::*;
use tracing::{debug, info, warn};

use crate::error::{RenderError, Result};
use crate::renderer::{FieldRenderer, FrameContext, VisualizationMode};
use crate::shader_utils::{assemble, create_program};

/// Floats per instance: model matrix (16), weight (1)
pub const BEAM_INSTANCE_FLOATS: usize = 17;

/// Segments around the cone
pub const CONE_SEGMENTS: u32 = 48;

/// Warm white
pub const BEAM_COLOR: Vec3 = Vec3::new(1.0, 0.93, 0.8);

/// Column-major model matrix followed by the relative weight, per beam
pub fn pack_beam_instances(beams: &BeamSet) -> Vec<f32> {
    let mut data = Vec::with_capacity(beams.len() * BEAM_INSTANCE_FLOATS);
    for beam in beams.beams() {
        data.extend_from_slice(&beam.transform().to_cols_array());
        data.push(beam.weight);
    }
    data
}

/// Radial coordinate the fragment stage derives from the view direction
///
/// Silhouette edges, where the surface is seen edge-on, read as the outside
/// of the beam (1); surfaces facing the viewer read as its axis (0).
pub fn view_radial(normal: Vec3, to_eye: Vec3) -> f32 {
    let n = normal.normalize_or_zero();
    let v = to_eye.normalize_or_zero();
    (1.0 - n.dot(v).abs()).clamp(0.0, 1.0)
}

/// Vertex and fragment sources for a beam shader
pub fn beam_sources(shader: &impl BeamShader) -> (String, String) {
    (
        assemble(VERTEX_DECLARATIONS, "", VERTEX_BODY),
        assemble(FRAGMENT_DECLARATIONS, &shader.glsl_functions(), FRAGMENT_BODY),
    )
}

/// Draws one translucent cone per light instance with additive blending
pub struct BeamRenderer {
    falloff: BeamFalloff,
    program: Option<NativeProgram>,
    vao: Option<NativeVertexArray>,
    mesh_vbo: Option<NativeBuffer>,
    mesh_ebo: Option<NativeBuffer>,
    instance_vbo: Option<NativeBuffer>,
    index_count: i32,
    instance_count: i32,
    uploaded: Option<SimulationKey>,
}

impl Default for BeamRenderer {
    fn default() -> Self {
        Self::new(BeamFalloff::default())
    }
}

impl BeamRenderer {
    pub fn new(falloff: BeamFalloff) -> Self {
        Self {
            falloff,
            program: None,
            vao: None,
            mesh_vbo: None,
            mesh_ebo: None,
            instance_vbo: None,
            index_count: 0,
            instance_count: 0,
            uploaded: None,
        }
    }

    pub fn falloff(&self) -> BeamFalloff {
        self.falloff
    }

    /// Key of the beam set currently on the GPU
    pub fn uploaded_key(&self) -> Option<SimulationKey> {
        self.uploaded
    }

    /// # Safety
    ///
    /// Must be called with an active GL context on the current thread.
    pub unsafe fn init_gl(&mut self, gl: &Context) -> Result<()> {
        unsafe {
            let (vertex, fragment) = beam_sources(&self.falloff);
            let program = create_program(gl, &vertex, &fragment)?;
            self.program = Some(program);

            let cone = ConeMesh::unit(CONE_SEGMENTS);

            let vao = gl
                .create_vertex_array()
                .map_err(RenderError::resource("beam VAO"))?;
            gl.bind_vertex_array(Some(vao));

            let mesh_vbo = gl
                .create_buffer()
                .map_err(RenderError::resource("beam mesh VBO"))?;
            gl.bind_buffer(ARRAY_BUFFER, Some(mesh_vbo));
            gl.buffer_data_u8_slice(ARRAY_BUFFER, bytemuck::cast_slice(&cone.interleaved()), STATIC_DRAW);
            // Position (0), normal (1), along (2)
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 3, FLOAT, false, 28, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 3, FLOAT, false, 28, 12);
            gl.enable_vertex_attrib_array(2);
            gl.vertex_attrib_pointer_f32(2, 1, FLOAT, false, 28, 24);

            let mesh_ebo = gl
                .create_buffer()
                .map_err(RenderError::resource("beam mesh EBO"))?;
            gl.bind_buffer(ELEMENT_ARRAY_BUFFER, Some(mesh_ebo));
            gl.buffer_data_u8_slice(ELEMENT_ARRAY_BUFFER, bytemuck::cast_slice(&cone.indices), STATIC_DRAW);

            let instance_vbo = gl
                .create_buffer()
                .map_err(RenderError::resource("beam instance VBO"))?;
            gl.bind_buffer(ARRAY_BUFFER, Some(instance_vbo));
            let stride = (BEAM_INSTANCE_FLOATS * 4) as i32;
            // Model matrix columns occupy locations 3..=6, weight is 7
            for column in 0..4u32 {
                let location = 3 + column;
                gl.enable_vertex_attrib_array(location);
                gl.vertex_attrib_pointer_f32(location, 4, FLOAT, false, stride, (column * 16) as i32);
                gl.vertex_attrib_divisor(location, 1);
            }
            gl.enable_vertex_attrib_array(7);
            gl.vertex_attrib_pointer_f32(7, 1, FLOAT, false, stride, 64);
            gl.vertex_attrib_divisor(7, 1);

            gl.bind_vertex_array(None);
            gl.bind_buffer(ARRAY_BUFFER, None);

            self.vao = Some(vao);
            self.mesh_vbo = Some(mesh_vbo);
            self.mesh_ebo = Some(mesh_ebo);
            self.instance_vbo = Some(instance_vbo);
            self.index_count = cone.indices.len() as i32;
            self.uploaded = None;

            info!(segments = CONE_SEGMENTS, "beam renderer initialized");
            Ok(())
        }
    }

    unsafe fn sync_instances(&mut self, gl: &Context, beams: &BeamSet) {
        unsafe {
            if self.uploaded == Some(beams.key()) {
                return;
            }
            let Some(vbo) = self.instance_vbo else { return };
            let data = pack_beam_instances(beams);
            gl.bind_buffer(ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(ARRAY_BUFFER, bytemuck::cast_slice(&data), STATIC_DRAW);
            gl.bind_buffer(ARRAY_BUFFER, None);
            self.instance_count = beams.len() as i32;
            self.uploaded = Some(beams.key());
            debug!(count = beams.len(), "uploaded beam instances");
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

            let beams = session.beams();
            self.sync_instances(gl, &beams);
            if self.instance_count == 0 {
                return Ok(());
            }

            gl.use_program(Some(program));
            gl.enable(DEPTH_TEST);
            gl.depth_func(LESS);
            // Overlapping cones accumulate light
            gl.depth_mask(false);
            gl.enable(BLEND);
            gl.blend_func(ONE, ONE);
            gl.disable(CULL_FACE);

            let view_proj = frame.camera.view_projection(frame.width, frame.height);
            let loc = gl.get_uniform_location(program, "u_view_proj");
            gl.uniform_matrix_4_f32_slice(loc.as_ref(), false, view_proj.as_ref());
            let eye = frame.camera.position;
            let loc = gl.get_uniform_location(program, "u_camera_pos");
            gl.uniform_3_f32(loc.as_ref(), eye.x, eye.y, eye.z);
            let loc = gl.get_uniform_location(program, "u_beam_color");
            gl.uniform_3_f32(loc.as_ref(), BEAM_COLOR.x, BEAM_COLOR.y, BEAM_COLOR.z);

            gl.bind_vertex_array(Some(vao));
            gl.draw_elements_instanced(TRIANGLES, self.index_count, UNSIGNED_INT, 0, self.instance_count);
            gl.bind_vertex_array(None);

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
            self.instance_count = 0;
        }
    }
}

impl FieldRenderer for BeamRenderer {
    fn name(&self) -> &str {
        "Beam Renderer"
    }

    fn mode(&self) -> VisualizationMode {
        VisualizationMode::Beams
    }

    fn init_gl(&mut self, gl: &Context) -> Result<()> {
        unsafe { BeamRenderer::init_gl(self, gl) }
    }

    fn destroy_gl(&mut self, gl: &Context) {
        unsafe { BeamRenderer::destroy_gl(self, gl) }
    }

    fn is_initialized(&self) -> bool {
        self.program.is_some()
    }

    fn render(&mut self, gl: &Context, session: &mut FieldSession, frame: &FrameContext) -> Result<()> {
        unsafe { BeamRenderer::render(self, gl, session, frame) }
    }
}

impl Drop for BeamRenderer {
    fn drop(&mut self) {
        if self.program.is_some() || self.vao.is_some() || self.instance_vbo.is_some() {
            warn!("BeamRenderer dropped without calling destroy_gl()");
        }
    }
}

const VERTEX_DECLARATIONS: &str = r#"
layout(location = 0) in vec3 a_position;
layout(location = 1) in vec3 a_normal;
layout(location = 2) in float a_along;
layout(location = 3) in mat4 a_model;
layout(location = 7) in float a_weight;

uniform mat4 u_view_proj;

out vec3 v_world;
out vec3 v_normal;
out float v_along;
out float v_weight;
"#;

const VERTEX_BODY: &str = r#"
void main() {
    vec4 world = a_model * vec4(a_position, 1.0);
    v_world = world.xyz;
    v_normal = transpose(inverse(mat3(a_model))) * a_normal;
    v_along = a_along;
    v_weight = a_weight;
    gl_Position = u_view_proj * world;
}
"#;

const FRAGMENT_DECLARATIONS: &str = r#"
in vec3 v_world;
in vec3 v_normal;
in float v_along;
in float v_weight;

uniform vec3 u_camera_pos;
uniform vec3 u_beam_color;

out vec4 FragColor;
"#;

const FRAGMENT_BODY: &str = r#"
void main() {
    vec3 to_eye = normalize(u_camera_pos - v_world);
    // Stands in for distance from the cone axis: 0 facing the eye, 1 at the silhouette
    float radial = clamp(1.0 - abs(dot(normalize(v_normal), to_eye)), 0.0, 1.0);
    float alpha = beam_alpha(radial, v_along) * v_weight;
    FragColor = vec4(u_beam_color * alpha, alpha);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use flux::{LightSource, Volume};

    fn two_fixtures() -> BeamSet {
        let lights = vec![
            LightSource::new("bar", 600.0).at(0.25, 0.5),
            LightSource::new("spot", 300.0).with_beam_angle(60.0).at(0.75, 0.5),
        ];
        BeamSet::build(&Volume::feet(4.0, 4.0, 6.0), &lights, Some(3.0))
    }

    #[test]
    fn test_pack_matrix_then_weight() {
        let beams = two_fixtures();
        let data = pack_beam_instances(&beams);
        assert_eq!(data.len(), 2 * BEAM_INSTANCE_FLOATS);
        for (chunk, beam) in data.chunks(BEAM_INSTANCE_FLOATS).zip(beams.beams()) {
            assert_eq!(&chunk[..16], &beam.transform().to_cols_array());
            assert_eq!(chunk[16], beam.weight);
        }
        // Weights are relative to the strongest fixture
        assert_eq!(data[16], 1.0);
        assert!((data[BEAM_INSTANCE_FLOATS + 16] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_view_radial_edges() {
        assert_eq!(view_radial(Vec3::Z, Vec3::Z), 0.0);
        assert_eq!(view_radial(Vec3::Z, Vec3::NEG_Z), 0.0);
        assert!((view_radial(Vec3::X, Vec3::Z) - 1.0).abs() < 1e-6);
        assert_eq!(view_radial(Vec3::ZERO, Vec3::Z), 1.0);
        // The fragment stage computes the same term
        assert!(FRAGMENT_BODY.contains("clamp(1.0 - abs(dot(normalize(v_normal), to_eye)), 0.0, 1.0)"));
    }

    #[test]
    fn test_fragment_uses_falloff_constants() {
        let falloff = BeamFalloff::new(0.3, 0.5);
        let (vertex, fragment) = beam_sources(&falloff);
        assert!(vertex.contains("layout(location = 3) in mat4 a_model;"));
        assert!(fragment.contains("float beam_alpha(float radial, float along)"));
        assert!(fragment.contains("smoothstep(0.5, 1.0, radial)"));
        let func = fragment.find("float beam_alpha").unwrap();
        let main = fragment.find("void main").unwrap();
        assert!(func < main);
    }

    #[test]
    fn test_axis_is_brighter_than_edge() {
        let falloff = BeamFalloff::default();
        let axis = falloff.alpha(view_radial(Vec3::Z, Vec3::Z), 0.2);
        let edge = falloff.alpha(view_radial(Vec3::X, Vec3::Z), 0.2);
        assert!(axis > edge);
        assert_eq!(edge, 0.0);
    }
}
