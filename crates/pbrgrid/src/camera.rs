use glam::{Mat4, Vec3};
use sceneconfig::CameraConfig;

/// Perspective camera looking at a fixed target.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    aspect: f32,
}

impl Camera {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            position: Vec3::from(config.position),
            target: Vec3::from(config.target),
            fov_y: config.fov_y_degrees.to_radians(),
            near: config.near,
            far: config.far,
            aspect: 1.0,
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    /// Right-handed projection with a `0..1` depth range.
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    /// World-to-clip matrix.
    pub fn local_to_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::from_config(&CameraConfig::default())
    }

    #[test]
    fn target_projects_to_centre() {
        let mut camera = camera();
        camera.set_aspect(16.0 / 9.0);
        let clip = camera.local_to_projection() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-6 && ndc.y.abs() < 1e-6);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn wider_aspect_squeezes_x() {
        let mut camera = camera();
        let point = glam::Vec4::new(0.5, 0.0, 0.0, 1.0);
        camera.set_aspect(1.0);
        let square = camera.local_to_projection() * point;
        camera.set_aspect(2.0);
        let wide = camera.local_to_projection() * point;
        assert!((wide.x / wide.w * 2.0 - square.x / square.w).abs() < 1e-5);
    }

    #[test]
    fn ignores_degenerate_aspect() {
        let mut camera = camera();
        camera.set_aspect(0.0);
        camera.set_aspect(f32::NAN);
        assert_eq!(camera.aspect(), 1.0);
    }
}
