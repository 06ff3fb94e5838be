use glam::{Mat4, Quat, Vec3};

/// Translation, rotation, and scale of one object in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn at(position: impl Into<Vec3>) -> Self {
        Self {
            position: position.into(),
            ..Self::default()
        }
    }

    /// Local-to-world matrix: scale, then rotate, then translate.
    pub fn combine(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}
