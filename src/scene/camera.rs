use std::borrow::Cow;

use glam::{Affine3A, Mat4, Vec3};
use uuid::Uuid;

use crate::resources::version_tracker::ChangeTracker;

#[derive(Debug, Clone)]
pub struct Camera {
    pub uuid: Uuid,
    pub name: Cow<'static, str>,

    // === 投影属性 (Projection Only) ===
    pub projection_type: ProjectionType,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub ortho_size: f32,

    /// Views rendered in one pass (2 for stereo multiview).
    pub view_count: u32,

    // 缓存的矩阵
    pub(crate) position: Vec3,
    pub(crate) view_matrix: Mat4,
    pub(crate) projection_matrix: Mat4,
    pub(crate) view_projection_matrix: Mat4,

    /// Bumped whenever the cached matrices change.
    tracker: ChangeTracker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionType {
    Perspective,
    Orthographic,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new_perspective(60.0, 1.0, 0.1, 1000.0)
    }
}

impl Camera {
    #[must_use]
    pub fn new_perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self {
            uuid: Uuid::new_v4(),
            name: Cow::Borrowed("Camera"),
            projection_type: ProjectionType::Perspective,
            fov: fov.to_radians(),
            aspect,
            near,
            far,
            ortho_size: 10.0,
            view_count: 1,

            position: Vec3::ZERO,
            projection_matrix: Mat4::IDENTITY,
            view_matrix: Mat4::IDENTITY,
            view_projection_matrix: Mat4::IDENTITY,
            tracker: ChangeTracker::new(),
        };

        cam.update_projection_matrix();
        cam
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection_matrix = match self.projection_type {
            ProjectionType::Perspective => {
                Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
            }
            ProjectionType::Orthographic => {
                let w = self.ortho_size * self.aspect;
                let h = self.ortho_size;
                Mat4::orthographic_rh(-w, w, -h, h, self.near, self.far)
            }
        };
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
        self.tracker.changed();
    }

    pub fn update_view_projection(&mut self, world_transform: &Affine3A) {
        self.position = Vec3::from(world_transform.translation);
        self.view_matrix = Mat4::from(*world_transform).inverse();
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
        self.tracker.changed();
    }

    #[must_use]
    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    #[inline]
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.view_projection_matrix
    }

    /// Far plane distance used by logarithmic depth.
    #[must_use]
    pub fn max_z(&self) -> f32 {
        self.far
    }

    #[must_use]
    pub fn is_multiview(&self) -> bool {
        self.view_count > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_follows_world_transform() {
        let mut cam = Camera::default();
        cam.update_view_projection(&Affine3A::from_translation(Vec3::new(0.0, 2.0, 5.0)));
        assert_eq!(cam.position(), Vec3::new(0.0, 2.0, 5.0));

        let origin = cam.view_matrix().transform_point3(Vec3::new(0.0, 2.0, 5.0));
        assert!(origin.abs_diff_eq(Vec3::ZERO, 1e-5));
    }
}
