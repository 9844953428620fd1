//! GL implementations of the visualization modes
//!
//! - [`VoxelRenderer`] - instanced translucent cubes, drawn in reveal order
//! - [`DisplacementRenderer`] - heatmap surface displaced by intensity
//! - [`BeamRenderer`] - additive light cones per fixture
//!
//! Each implements [`crate::FieldRenderer`]: `init_gl`, then `render` every
//! frame, then `destroy_gl` before drop.

pub mod beam_renderer;
pub mod displacement_renderer;
pub mod voxel_renderer;

pub use beam_renderer::BeamRenderer;
pub use displacement_renderer::DisplacementRenderer;
pub use voxel_renderer::VoxelRenderer;
