//! Mode switching and frame output

use flux::{to_render_space, FieldSession};
use glam::Vec2;
use glow::*;
use tracing::{debug, info};

use crate::camera::Camera;
use crate::error::Result;
use crate::lighting::BACKGROUND_COLOR;
use crate::renderer::{FieldRenderer, FrameContext, VisualizationMode};
use crate::renderers::voxel_renderer::pick_voxel;
use crate::renderers::{BeamRenderer, DisplacementRenderer, VoxelRenderer};

/// All three renderers behind a single active mode
pub struct FieldView {
    mode: VisualizationMode,
    voxels: VoxelRenderer,
    surface: DisplacementRenderer,
    beams: BeamRenderer,
}

impl Default for FieldView {
    fn default() -> Self {
        Self::new(VisualizationMode::default())
    }
}

impl FieldView {
    pub fn new(mode: VisualizationMode) -> Self {
        Self {
            mode,
            voxels: VoxelRenderer::new(),
            surface: DisplacementRenderer::new(),
            beams: BeamRenderer::default(),
        }
    }

    pub fn mode(&self) -> VisualizationMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: VisualizationMode) {
        if mode != self.mode {
            debug!(mode = mode.label(), "visualization mode changed");
        }
        self.mode = mode;
    }

    /// Light the displacement surface instead of drawing the flat gradient
    pub fn set_surface_shading(&mut self, shaded: bool) {
        self.surface.set_shaded(shaded);
    }

    fn active(&mut self) -> &mut dyn FieldRenderer {
        match self.mode {
            VisualizationMode::Voxels => &mut self.voxels,
            VisualizationMode::Displacement => &mut self.surface,
            VisualizationMode::Beams => &mut self.beams,
        }
    }

    fn all(&mut self) -> [&mut dyn FieldRenderer; 3] {
        [&mut self.voxels, &mut self.surface, &mut self.beams]
    }

    pub fn init_gl(&mut self, gl: &Context) -> Result<()> {
        for renderer in self.all() {
            renderer.init_gl(gl)?;
        }
        info!("field view ready");
        Ok(())
    }

    pub fn destroy_gl(&mut self, gl: &Context) {
        for renderer in self.all() {
            renderer.destroy_gl(gl);
        }
    }

    /// Clear the bound framebuffer and draw the active mode
    pub fn render(
        &mut self,
        gl: &Context,
        session: &mut FieldSession,
        camera: &Camera,
        width: i32,
        height: i32,
        dt: f32,
    ) -> Result<()> {
        unsafe {
            gl.viewport(0, 0, width, height);
            gl.clear_color(BACKGROUND_COLOR.x, BACKGROUND_COLOR.y, BACKGROUND_COLOR.z, 1.0);
            gl.clear(COLOR_BUFFER_BIT | DEPTH_BUFFER_BIT);
        }
        let frame = FrameContext {
            camera,
            width,
            height,
            dt,
        };
        self.active().render(gl, session, &frame)
    }

    /// Voxels drawn by the last voxel-mode frame
    pub fn revealed(&self) -> usize {
        self.voxels.drawn()
    }
}

/// Update the session's hover from a pointer position
///
/// Only revealed voxels can be hovered. Returns the hovered index.
pub fn hover_at(session: &mut FieldSession, camera: &Camera, pixel: Vec2, width: i32, height: i32) -> Option<usize> {
    let (origin, dir) = camera.screen_ray(pixel, width, height);
    let cell = to_render_space(session.voxel_cell_size());
    let voxels = session.voxels();
    let visible = session.reveal().visible(&voxels);
    let hit = pick_voxel(visible, cell, origin, dir);
    session.hover(hit);
    hit
}

/// Read the bound framebuffer back as top-down RGB rows
///
/// # Safety
///
/// Must be called with an active GL context on the current thread.
pub unsafe fn read_framebuffer(gl: &Context, width: u32, height: u32) -> Vec<u8> {
    let mut pixels = vec![0u8; (width * height * 4) as usize];
    unsafe {
        gl.read_pixels(
            0,
            0,
            width as i32,
            height as i32,
            RGBA,
            UNSIGNED_BYTE,
            PixelPackData::Slice(Some(&mut pixels)),
        );
    }
    flip_rgba_to_rgb(&pixels, width as usize, height as usize)
}

/// Save the bound framebuffer as an image file
///
/// # Safety
///
/// Must be called with an active GL context on the current thread.
pub unsafe fn save_framebuffer(gl: &Context, width: u32, height: u32, path: &str) -> Result<()> {
    let rgb = unsafe { read_framebuffer(gl, width, height) };
    image::save_buffer(path, &rgb, width, height, image::ColorType::Rgb8)?;
    info!(path, width, height, "saved framebuffer");
    Ok(())
}

/// Drop alpha and flip rows; GL's origin is bottom-left
fn flip_rgba_to_rgb(pixels: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(width * height * 3);
    for row in pixels.chunks_exact(width * 4).take(height).rev() {
        for rgba in row.chunks_exact(4) {
            out.extend_from_slice(&rgba[..3]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux::{LightSource, Volume};

    #[test]
    fn test_flip_rows() {
        // 1x2: bottom red, top green
        let pixels = [255, 0, 0, 255, 0, 255, 0, 255];
        assert_eq!(flip_rgba_to_rgb(&pixels, 1, 2), vec![0, 255, 0, 255, 0, 0]);
    }

    #[test]
    fn test_mode_switch() {
        let mut view = FieldView::default();
        assert_eq!(view.mode(), VisualizationMode::Voxels);
        view.set_mode(VisualizationMode::Beams);
        assert_eq!(view.mode(), VisualizationMode::Beams);
        assert_eq!(view.active().mode(), VisualizationMode::Beams);
        assert!(!view.active().is_initialized());
        assert_eq!(VisualizationMode::Beams.next(), VisualizationMode::Voxels);

        view.set_surface_shading(true);
        assert!(view.surface.is_shaded());
    }

    #[test]
    fn test_hover_needs_reveal() {
        let light = LightSource::new("panel", 900.0).at(0.5, 0.5);
        let mut session = FieldSession::new(Volume::feet(4.0, 4.0, 6.0), vec![light]);
        // Straight down onto a cell column next to the fixture
        let camera = Camera::look_at(glam::Vec3::new(1.85, 20.0, 1.86), glam::Vec3::new(1.85, 0.0, 1.85));

        // Nothing revealed yet
        assert_eq!(hover_at(&mut session, &camera, Vec2::new(400.0, 300.0), 800, 600), None);

        session.tick(0.0);
        let hit = hover_at(&mut session, &camera, Vec2::new(400.0, 300.0), 800, 600);
        assert!(hit.is_some());
        assert_eq!(session.hover_index(), hit);
        assert!(session.hovered().is_some());
    }
}
