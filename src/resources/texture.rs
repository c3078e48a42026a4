//! Texture descriptors as seen by the material core.
//!
//! Pixel data lives elsewhere; the shading core only needs to know whether a
//! texture can be sampled yet, how its coordinates are produced, and the few
//! format traits that change the generated shader.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use glam::{Mat3, Mat4, Vec2, Vec3};
use uuid::Uuid;

// ============================================================================
// 1. Coordinates Mode
// ============================================================================

/// How texture coordinates are generated for a texture.
///
/// Raw mode numbers from older content map through [`CoordinatesMode::from_raw`];
/// unknown numbers are kept as [`CoordinatesMode::Legacy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CoordinatesMode {
    #[default]
    Explicit,
    Spherical,
    Planar,
    Cubic,
    Projection,
    Skybox,
    InverseCubic,
    Equirectangular,
    FixedEquirectangular,
    FixedEquirectangularMirrored,
    Legacy(u32),
}

impl CoordinatesMode {
    /// Every named mode, in raw-number order.
    pub const ALL: [CoordinatesMode; 10] = [
        Self::Explicit,
        Self::Spherical,
        Self::Planar,
        Self::Cubic,
        Self::Projection,
        Self::Skybox,
        Self::InverseCubic,
        Self::Equirectangular,
        Self::FixedEquirectangular,
        Self::FixedEquirectangularMirrored,
    ];

    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self::ALL
            .get(raw as usize)
            .copied()
            .unwrap_or(Self::Legacy(raw))
    }
}

// ============================================================================
// 2. Texture Transform
// ============================================================================

/// UV transform applied before sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureTransform {
    pub offset: Vec2,
    pub repeat: Vec2,
    pub rotation: f32,
    pub center: Vec2,
}

impl Default for TextureTransform {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            repeat: Vec2::ONE,
            rotation: 0.0,
            center: Vec2::new(0.5, 0.5),
        }
    }
}

impl TextureTransform {
    /// 3x3 UV transform matrix.
    #[must_use]
    pub fn get_matrix(&self) -> Mat3 {
        let c = self.rotation.cos();
        let s = self.rotation.sin();
        let ox = self.offset.x;
        let oy = self.offset.y;
        let rx = self.repeat.x;
        let ry = self.repeat.y;
        let cx = self.center.x;
        let cy = self.center.y;

        Mat3::from_cols_array(&[
            c * rx,
            s * rx,
            0.0,
            -s * ry,
            c * ry,
            0.0,
            (c * -cx + s * -cy + cx) * rx + ox,
            (-s * -cx + c * -cy + cy) * ry + oy,
            1.0,
        ])
    }

    /// The matrix in the 4x4 layout uniform blocks expect.
    #[must_use]
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_mat3(self.get_matrix())
    }

    /// `true` when sampling needs no transform at all.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.offset == Vec2::ZERO && self.repeat == Vec2::ONE && self.rotation == 0.0
    }
}

// ============================================================================
// 3. Texture
// ============================================================================

/// Loading state of a texture's GPU resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoadState {
    Loading = 0,
    Ready = 1,
    Failed = 2,
}

impl LoadState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Ready,
            2 => Self::Failed,
            _ => Self::Loading,
        }
    }
}

/// Shared reference to a texture.
pub type TextureRef = Arc<Texture>;

#[derive(Debug)]
pub struct Texture {
    pub uuid: Uuid,
    pub name: String,

    state: AtomicU8,

    /// Blocking textures hold back the whole material until they load.
    pub is_blocking: bool,

    pub coordinates_mode: CoordinatesMode,
    pub coordinates_index: u32,
    pub level: f32,
    pub transform: TextureTransform,
    /// Allows sampling straight from a UV channel when no transform applies.
    pub optimize_uv_allocation: bool,

    pub has_alpha: bool,
    pub get_alpha_from_rgb: bool,
    pub gamma_space: bool,
    pub is_rgbd: bool,
    pub is_cube: bool,
    pub is_3d: bool,
    pub invert_z: bool,
    pub lod_generation_in_alpha: bool,
    pub linear_specular_lod: bool,

    /// Local cube-map projection box.
    pub bounding_box_size: Option<Vec3>,
    pub bounding_box_position: Vec3,
}

impl Texture {
    /// A texture whose resource is already resident.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self::with_state(name, LoadState::Ready)
    }

    /// A texture still being fetched.
    #[must_use]
    pub fn pending(name: &str) -> Self {
        Self::with_state(name, LoadState::Loading)
    }

    fn with_state(name: &str, state: LoadState) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            state: AtomicU8::new(state as u8),
            is_blocking: true,
            coordinates_mode: CoordinatesMode::Explicit,
            coordinates_index: 0,
            level: 1.0,
            transform: TextureTransform::default(),
            optimize_uv_allocation: true,
            has_alpha: false,
            get_alpha_from_rgb: false,
            gamma_space: true,
            is_rgbd: false,
            is_cube: false,
            is_3d: false,
            invert_z: false,
            lod_generation_in_alpha: false,
            linear_specular_lod: false,
            bounding_box_size: None,
            bounding_box_position: Vec3::ZERO,
        }
    }

    /// Helper: a resident cube texture addressed with cubic coordinates.
    #[must_use]
    pub fn new_cube(name: &str) -> Self {
        let mut tex = Self::new(name);
        tex.is_cube = true;
        tex.coordinates_mode = CoordinatesMode::Cubic;
        tex.gamma_space = false;
        tex
    }

    #[must_use]
    pub fn into_ref(self) -> TextureRef {
        Arc::new(self)
    }

    #[inline]
    #[must_use]
    pub fn load_state(&self) -> LoadState {
        LoadState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Blocking readiness: the resource is resident.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.load_state() == LoadState::Ready
    }

    /// Non-blocking readiness: resident, or allowed to be skipped until it is.
    #[inline]
    #[must_use]
    pub fn is_ready_or_not_blocking(&self) -> bool {
        !self.is_blocking || self.is_ready()
    }

    /// Called by the loader once the resource is resident.
    pub fn mark_ready(&self) {
        self.state.store(LoadState::Ready as u8, Ordering::Release);
    }

    pub fn mark_failed(&self) {
        self.state.store(LoadState::Failed as u8, Ordering::Release);
    }

    /// `true` when the shader may sample UV channel `coordinates_index` directly.
    #[must_use]
    pub fn can_use_direct_uv(&self) -> bool {
        self.optimize_uv_allocation && self.transform.is_identity()
    }

    /// Texture matrix as a 4x4 uniform value.
    #[must_use]
    pub fn texture_matrix(&self) -> Mat4 {
        self.transform.to_mat4()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_variants() {
        let mut tex = Texture::pending("albedo");
        assert!(!tex.is_ready());
        assert!(!tex.is_ready_or_not_blocking());

        tex.is_blocking = false;
        assert!(tex.is_ready_or_not_blocking());

        tex.mark_ready();
        assert!(tex.is_ready());
    }

    #[test]
    fn test_direct_uv_requires_identity_transform() {
        let mut tex = Texture::new("detail");
        assert!(tex.can_use_direct_uv());

        tex.transform.repeat = Vec2::new(2.0, 2.0);
        assert!(!tex.can_use_direct_uv());
    }

    #[test]
    fn test_coordinates_mode_from_raw() {
        assert_eq!(CoordinatesMode::from_raw(3), CoordinatesMode::Cubic);
        assert_eq!(CoordinatesMode::from_raw(6), CoordinatesMode::InverseCubic);
        assert_eq!(CoordinatesMode::from_raw(42), CoordinatesMode::Legacy(42));
    }

    #[test]
    fn test_identity_transform_matrix() {
        let m = TextureTransform::default().get_matrix();
        assert!(m.abs_diff_eq(Mat3::IDENTITY, 1e-6));
    }
}
