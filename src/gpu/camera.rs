//! Orbit camera for the viewer.

use glam::{Mat4, Vec3};

const MIN_PITCH: f32 = -1.5;
const MAX_PITCH: f32 = 1.5;

/// Orbit camera looking at the particle cloud.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Horizontal rotation angle in radians.
    pub yaw: f32,
    /// Vertical rotation angle in radians.
    pub pitch: f32,
    /// Distance from the target point.
    pub distance: f32,
    /// Point the camera orbits around.
    pub target: Vec3,
    min_distance: f32,
    max_distance: f32,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.3,
            distance: 3.0,
            target: Vec3::ZERO,
            min_distance: 0.5,
            max_distance: 20.0,
        }
    }

    /// Fit the orbit to a cloud of the given radius.
    pub fn frame_radius(&mut self, radius: f32) {
        let radius = if radius.is_finite() && radius > 0.0 { radius } else { 1.0 };
        self.distance = radius * 2.5;
        self.min_distance = radius * 0.25;
        self.max_distance = radius * 8.0;
    }

    /// Rotate by a mouse drag in pixels.
    pub fn orbit(&mut self, dx: f32, dy: f32) {
        self.yaw -= dx * 0.005;
        self.pitch = (self.pitch + dy * 0.005).clamp(MIN_PITCH, MAX_PITCH);
    }

    /// Move toward (positive) or away from the target.
    pub fn zoom(&mut self, scroll: f32) {
        let step = self.distance * 0.1;
        self.distance = (self.distance - scroll * step).clamp(self.min_distance, self.max_distance);
    }

    /// Far clip plane that keeps the whole orbit range visible.
    pub fn far_plane(&self) -> f32 {
        self.max_distance * 2.0
    }

    /// Calculate the camera's world position.
    pub fn position(&self) -> Vec3 {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        self.target + Vec3::new(x, y, z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_keeps_distance() {
        let mut camera = Camera::new();
        camera.orbit(120.0, -40.0);
        assert!((camera.position().length() - camera.distance).abs() < 1e-4);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = Camera::new();
        camera.orbit(0.0, 10_000.0);
        assert_eq!(camera.pitch, MAX_PITCH);
    }

    #[test]
    fn test_frame_radius_bounds_zoom() {
        let mut camera = Camera::new();
        camera.frame_radius(10.0);
        assert_eq!(camera.distance, 25.0);
        for _ in 0..200 {
            camera.zoom(5.0);
        }
        assert_eq!(camera.distance, 2.5);
        for _ in 0..200 {
            camera.zoom(-5.0);
        }
        assert_eq!(camera.distance, 80.0);
        assert!(camera.far_plane() > camera.distance);
    }
}
