//! Common interface of the visualization modes

use flux::FieldSession;
use glow::*;

use crate::camera::Camera;
use crate::error::Result;

/// Which view of the field is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VisualizationMode {
    /// Classified voxels, revealed brightest first
    #[default]
    Voxels,
    /// Heatmap surface displaced by intensity
    Displacement,
    /// Additive light cones per fixture
    Beams,
}

impl VisualizationMode {
    pub const ALL: [VisualizationMode; 3] = [
        VisualizationMode::Voxels,
        VisualizationMode::Displacement,
        VisualizationMode::Beams,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            VisualizationMode::Voxels => "voxels",
            VisualizationMode::Displacement => "surface",
            VisualizationMode::Beams => "beams",
        }
    }

    /// Cycle to the next mode
    pub fn next(self) -> Self {
        match self {
            VisualizationMode::Voxels => VisualizationMode::Displacement,
            VisualizationMode::Displacement => VisualizationMode::Beams,
            VisualizationMode::Beams => VisualizationMode::Voxels,
        }
    }
}

/// Per-frame inputs shared by every mode
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub camera: &'a Camera,
    pub width: i32,
    pub height: i32,
    /// Seconds since the previous frame
    pub dt: f32,
}

impl FrameContext<'_> {
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// A GL visualization of a [`FieldSession`]
///
/// Renderers own their GL objects between `init_gl` and `destroy_gl`. Every
/// `render` call pulls the session's memoized outputs and re-uploads only
/// what changed since the previous frame.
pub trait FieldRenderer {
    fn name(&self) -> &str;

    fn mode(&self) -> VisualizationMode;

    /// Create programs, buffers and textures
    ///
    /// Requires a valid GL context to be current on the calling thread.
    fn init_gl(&mut self, gl: &Context) -> Result<()>;

    /// Release every GL object
    fn destroy_gl(&mut self, gl: &Context);

    fn is_initialized(&self) -> bool;

    /// Sync GPU data with the session and draw into the bound framebuffer
    fn render(&mut self, gl: &Context, session: &mut FieldSession, frame: &FrameContext) -> Result<()>;
}
