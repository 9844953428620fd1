//! GL visualization of flux fields
//!
//! Three views of the same [`flux::FieldSession`], all drawn with `glow`
//! against OpenGL ES 3.0 / WebGL 2:
//!
//! - **voxels**: classified cells as translucent instanced cubes, revealed
//!   brightest first by the session's reveal animator
//! - **surface**: a floor plane displaced and colored by normalized intensity
//! - **beams**: additive cones approximating each fixture's light volume
//!
//! # Architecture
//!
//! - **camera**: orbit camera in Y-up render space
//! - **renderer**: [`FieldRenderer`] trait and [`VisualizationMode`]
//! - **renderers**: one implementation per mode
//! - **view**: [`FieldView`] mode switching, hover picking, framebuffer capture
//!
//! Shading math is not written here: shaders splice in the GLSL that
//! [`flux::SurfaceShader`] and [`flux::BeamShader`] generate, so the GPU and
//! the CPU reference agree by construction.

pub mod camera;
pub mod error;
pub mod lighting;
pub mod renderer;
pub mod renderers;
pub mod shader_utils;
pub mod view;

pub use camera::{Camera, OrbitController, OrbitControllerConfig, DEFAULT_VFOV};
pub use error::{RenderError, Result};
pub use lighting::{AMBIENT, BACKGROUND_COLOR, DIFFUSE_STRENGTH, LIGHT_DIR};
pub use renderer::{FieldRenderer, FrameContext, VisualizationMode};
pub use renderers::{BeamRenderer, DisplacementRenderer, VoxelRenderer};
pub use view::{hover_at, read_framebuffer, save_framebuffer, FieldView};
