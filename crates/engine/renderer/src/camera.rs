//! Orbit camera around a grow volume
//!
//! Render space is Y-up (see [`flux::to_render_space`]): X is width, Z is
//! depth, and the floor sits at y = 0. The camera looks along its local -Z.

use flux::Volume;
use glam::{Mat3, Mat4, Quat, Vec2, Vec3};

/// Default vertical field of view: 50 degrees
pub const DEFAULT_VFOV: f32 = 50.0 * std::f32::consts::PI / 180.0;

/// Elevation limit for orbiting, short of the poles
const MAX_ELEVATION: f32 = 85.0 * std::f32::consts::PI / 180.0;

const NEAR: f32 = 0.05;
const FAR: f32 = 500.0;

/// Perspective camera with a cached orbit target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub rotation: Quat,
    /// Vertical field of view in radians
    pub vfov: f32,
    pub target: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self::look_at(Vec3::new(6.0, 5.0, 6.0), Vec3::ZERO)
    }
}

impl Camera {
    pub fn look_at(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            rotation: look_rotation(position, target),
            vfov: DEFAULT_VFOV,
            target,
        }
    }

    /// Three-quarter view of the whole volume from the front right
    pub fn framing(volume: &Volume) -> Self {
        let dims = volume.dimensions_ft();
        let size = Vec3::new(dims.x, dims.z, dims.y);
        let target = size * Vec3::new(0.5, 0.4, 0.5);
        let radius = size.length().max(1.0);
        let direction = Vec3::new(0.9, 0.7, 1.2).normalize();
        Self::look_at(target + direction * radius * 1.4, target)
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), self.up())
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };
        Mat4::perspective_rh_gl(self.vfov, aspect, NEAR, FAR)
    }

    /// Combined projection and view for a viewport
    pub fn view_projection(&self, width: i32, height: i32) -> Mat4 {
        let aspect = width as f32 / height.max(1) as f32;
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// World-space ray through a pixel, origin at the camera
    ///
    /// `pixel` is measured from the top-left corner.
    pub fn screen_ray(&self, pixel: Vec2, width: i32, height: i32) -> (Vec3, Vec3) {
        let w = width.max(1) as f32;
        let h = height.max(1) as f32;
        let ndc = Vec2::new(2.0 * pixel.x / w - 1.0, 1.0 - 2.0 * pixel.y / h);
        let inv = self.view_projection(width, height).inverse();
        let near = inv.project_point3(ndc.extend(-1.0));
        let far = inv.project_point3(ndc.extend(1.0));
        (self.position, (far - near).normalize_or_zero())
    }

    /// Orbit around the target: yaw about world Y, then pitch about the local right axis
    pub fn orbit(&mut self, yaw_delta: f32, pitch_delta: f32) {
        let offset = self.position - self.target;
        let distance = offset.length();
        if distance <= f32::EPSILON {
            return;
        }

        let horizontal = Vec2::new(offset.x, offset.z).length();
        let elevation = (offset.y.atan2(horizontal) + pitch_delta).clamp(-MAX_ELEVATION, MAX_ELEVATION);
        let azimuth = offset.z.atan2(offset.x) - yaw_delta;

        let (sin_e, cos_e) = elevation.sin_cos();
        let (sin_a, cos_a) = azimuth.sin_cos();
        let offset = Vec3::new(cos_e * cos_a, sin_e, cos_e * sin_a) * distance;

        self.position = self.target + offset;
        self.rotation = look_rotation(self.position, self.target);
    }

    /// Move toward (positive) or away from the target, clamped to a range
    pub fn dolly(&mut self, delta: f32, min_distance: f32, max_distance: f32) {
        let to_target = self.target - self.position;
        let distance = to_target.length();
        if distance <= f32::EPSILON {
            return;
        }
        let new_distance = (distance - delta).clamp(min_distance, max_distance);
        self.position = self.target - to_target * (new_distance / distance);
    }
}

fn look_rotation(position: Vec3, target: Vec3) -> Quat {
    let forward = (target - position).normalize_or_zero();
    if forward == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let right = forward.cross(Vec3::Y).normalize_or_zero();
    if right == Vec3::ZERO {
        // Looking straight up or down
        return Quat::from_rotation_arc(Vec3::NEG_Z, forward);
    }
    let up = right.cross(forward);
    Quat::from_mat3(&Mat3::from_cols(right, up, -forward))
}

/// Mouse sensitivities and zoom limits for orbit control
#[derive(Debug, Clone)]
pub struct OrbitControllerConfig {
    /// Radians per pixel of drag
    pub mouse_sensitivity: f32,
    /// Feet per scroll unit
    pub zoom_sensitivity: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for OrbitControllerConfig {
    fn default() -> Self {
        Self {
            mouse_sensitivity: 0.005,
            zoom_sensitivity: 0.25,
            min_distance: 1.0,
            max_distance: 80.0,
        }
    }
}

/// Turns pointer input into camera motion
#[derive(Debug, Clone, Default)]
pub struct OrbitController {
    pub config: OrbitControllerConfig,
}

impl OrbitController {
    pub fn new(config: OrbitControllerConfig) -> Self {
        Self { config }
    }

    /// Drag by a pixel delta
    pub fn drag(&self, camera: &mut Camera, delta: Vec2) {
        let s = self.config.mouse_sensitivity;
        camera.orbit(delta.x * s, delta.y * s);
    }

    /// Scroll by wheel units, positive zooms in
    pub fn scroll(&self, camera: &mut Camera, delta: f32) {
        camera.dolly(
            delta * self.config.zoom_sensitivity,
            self.config.min_distance,
            self.config.max_distance,
        );
    }

    /// Re-centre on a new volume, keeping the viewing direction
    pub fn retarget(&self, camera: &mut Camera, volume: &Volume) {
        let framed = Camera::framing(volume);
        let distance = (camera.position - camera.target).length();
        let direction = (camera.position - camera.target).normalize_or_zero();
        camera.target = framed.target;
        if direction == Vec3::ZERO || distance <= f32::EPSILON {
            *camera = framed;
            return;
        }
        camera.position = framed.target + direction * distance;
        camera.rotation = look_rotation(camera.position, camera.target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_look_at_faces_target() {
        let camera = Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        assert!((camera.forward() - Vec3::NEG_Z).length() < 1e-5);
        assert!(camera.up().y > 0.99);
    }

    #[test]
    fn test_framing_sees_centre() {
        let volume = Volume::feet(4.0, 2.0, 6.0);
        let camera = Camera::framing(&volume);
        assert_eq!(camera.target, Vec3::new(2.0, 2.4, 1.0));

        // The target projects to the middle of the screen
        let clip = camera.view_projection(800, 600) * camera.target.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
    }

    #[test]
    fn test_orbit_keeps_distance_and_clamps() {
        let mut camera = Camera::look_at(Vec3::new(5.0, 0.0, 0.0), Vec3::ZERO);
        camera.orbit(0.3, 0.0);
        assert!((camera.position.length() - 5.0).abs() < 1e-4);
        assert!(camera.position.z.abs() > 0.1);

        camera.orbit(0.0, 10.0);
        let elevation = camera.position.y.atan2(Vec2::new(camera.position.x, camera.position.z).length());
        assert!(elevation <= MAX_ELEVATION + 1e-4);
        assert!((camera.forward() - (-camera.position).normalize()).length() < 1e-4);
    }

    #[test]
    fn test_dolly_clamps() {
        let mut camera = Camera::look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);
        camera.dolly(100.0, 1.0, 50.0);
        assert!((camera.position.z - 1.0).abs() < 1e-5);
        camera.dolly(-100.0, 1.0, 50.0);
        assert!((camera.position.z - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_centre_ray_is_forward() {
        let camera = Camera::framing(&Volume::default());
        let (origin, dir) = camera.screen_ray(Vec2::new(400.0, 300.0), 800, 600);
        assert_eq!(origin, camera.position);
        assert!((dir - camera.forward()).length() < 1e-3);
    }

    #[test]
    fn test_controller_scroll() {
        let controller = OrbitController::default();
        let mut camera = Camera::look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);
        controller.scroll(&mut camera, 4.0);
        assert!((camera.position.z - 9.0).abs() < 1e-5);
    }
}
