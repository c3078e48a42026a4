//! 材质核心 (Material Core)
//!
//! 一个泛型 [`Material<P>`] 承载所有材质族共用的流程：
//! - 每个子网格 (submesh) 一个 [`DrawWrapper`]，持有 DefineSet 与当前 effect
//! - `is_ready_for_sub_mesh`: 宏准备 → 序列化 → 效果查找/编译（见 `resolver`）
//! - `bind_for_sub_mesh`: 分层的 uniform 重绑定（见 `binder`）
//!
//! 材质族之间的差异（着色器名、纹理槽表、私有宏与 uniform）全部由
//! [`MaterialProfile`] 提供。

pub mod background;
pub mod bind;
mod binder;
pub mod draw_wrapper;
pub mod fresnel;
mod macros;
pub mod pbr;
pub mod prepare;
pub mod profile;
mod resolver;
pub mod standard;

pub use background::BackgroundProfile;
pub use draw_wrapper::DrawWrapper;
pub use fresnel::FresnelParameters;
pub use pbr::PbrProfile;
pub use profile::{
    BindContext, EffectInterface, MaterialProfile, PrepareContext, SlotDesc, SlotReadiness,
};
pub use standard::StandardProfile;

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::renderer::pipeline::EffectId;
use crate::resources::capabilities::RenderCapabilities;
use crate::resources::mesh::{Mesh, SubMeshKey};
use crate::resources::shader_defines::{DefineSet, DirtyFlags};
use crate::resources::uniform_buffer::UniformBuffer;

pub type StandardMaterial = Material<StandardProfile>;
pub type BackgroundMaterial = Material<BackgroundProfile>;
pub type PbrMaterial = Material<PbrProfile>;

// ============================================================================
// Settings
// ============================================================================

/// Explicit render-pass bucket; `None` lets the profile decide from its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransparencyMode {
    Opaque,
    AlphaTest,
    AlphaBlend,
    AlphaTestAndBlend,
}

impl TransparencyMode {
    #[inline]
    #[must_use]
    pub fn is_blend(self) -> bool {
        matches!(self, Self::AlphaBlend | Self::AlphaTestAndBlend)
    }

    #[inline]
    #[must_use]
    pub fn is_test(self) -> bool {
        matches!(self, Self::AlphaTest | Self::AlphaTestAndBlend)
    }
}

/// Scalar state shared by every material family.
///
/// | Field                      | Default |
/// |----------------------------|---------|
/// | `alpha`                    | 1.0     |
/// | `alpha_cut_off`            | 0.4     |
/// | `fog_enabled`              | true    |
/// | `max_simultaneous_lights`  | 4       |
/// | `allow_shader_hot_swapping`| true    |
/// | `back_face_culling`        | true    |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialSettings {
    pub alpha: f32,
    pub transparency_mode: Option<TransparencyMode>,
    pub force_alpha_test: bool,
    pub alpha_cut_off: f32,
    pub point_size: f32,
    pub points_cloud: bool,
    pub fog_enabled: bool,
    pub disable_lighting: bool,
    pub max_simultaneous_lights: u32,
    pub allow_shader_hot_swapping: bool,
    pub use_logarithmic_depth: bool,
    pub back_face_culling: bool,
}

impl Default for MaterialSettings {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            transparency_mode: None,
            force_alpha_test: false,
            alpha_cut_off: 0.4,
            point_size: 1.0,
            points_cloud: false,
            fog_enabled: true,
            disable_lighting: false,
            max_simultaneous_lights: 4,
            allow_shader_hot_swapping: true,
            use_logarithmic_depth: false,
            back_face_culling: true,
        }
    }
}

// ============================================================================
// Hooks & statistics
// ============================================================================

pub type CompiledHook = Box<dyn FnMut(EffectId) + Send>;
pub type ErrorHook = Box<dyn FnMut(EffectId, &str) + Send>;

#[derive(Default)]
pub(crate) struct MaterialHooks {
    pub(crate) on_compiled: Option<CompiledHook>,
    pub(crate) on_error: Option<ErrorHook>,
}

impl fmt::Debug for MaterialHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterialHooks")
            .field("on_compiled", &self.on_compiled.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Work counters, mostly useful to assert that short-circuits hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialStats {
    /// Full define preparation passes.
    pub define_passes: u64,
    /// Effect lookups issued for a dirty define set.
    pub effect_requests: u64,
    /// Binds that rewrote material block values.
    pub material_binds: u64,
    /// Binds that resent per-frame values.
    pub frame_binds: u64,
}

// ============================================================================
// Material
// ============================================================================

#[derive(Debug)]
pub struct Material<P: MaterialProfile> {
    pub uuid: Uuid,
    pub name: String,

    settings: MaterialSettings,
    frozen: bool,
    profile: P,
    capabilities: Arc<RenderCapabilities>,

    ubo: UniformBuffer,
    layout_built: bool,

    wrappers: FxHashMap<SubMeshKey, DrawWrapper>,
    hooks: MaterialHooks,
    stats: MaterialStats,
}

impl<P: MaterialProfile> Material<P> {
    pub(crate) fn from_parts(
        name: String,
        profile: P,
        settings: MaterialSettings,
        capabilities: Arc<RenderCapabilities>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name,
            settings,
            frozen: false,
            profile,
            capabilities,
            ubo: UniformBuffer::new("Material"),
            layout_built: false,
            wrappers: FxHashMap::default(),
            hooks: MaterialHooks::default(),
            stats: MaterialStats::default(),
        }
    }

    // ─── Profile ─────────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn profile(&self) -> &P {
        &self.profile
    }

    /// Mutable profile access. Concerns touched by the edits are pushed into
    /// every submesh when the guard drops.
    pub fn profile_mut(&mut self) -> ProfileGuard<'_, P> {
        ProfileGuard {
            profile: &mut self.profile,
            wrappers: &mut self.wrappers,
        }
    }

    #[inline]
    #[must_use]
    pub fn capabilities(&self) -> &Arc<RenderCapabilities> {
        &self.capabilities
    }

    // ─── Settings ────────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &MaterialSettings {
        &self.settings
    }

    /// Raises `concern` on every submesh and forces the next bind to rewrite
    /// material values.
    fn mark_all(&mut self, concern: DirtyFlags) {
        for wrapper in self.wrappers.values_mut() {
            if !concern.is_empty() {
                wrapper.defines.mark_as(concern);
            }
            wrapper.force_rebind_on_next_call = true;
        }
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        if self.settings.alpha != alpha {
            self.settings.alpha = alpha;
            self.mark_all(DirtyFlags::MISC | DirtyFlags::TEXTURES | DirtyFlags::PREPASS);
        }
    }

    pub fn set_transparency_mode(&mut self, mode: Option<TransparencyMode>) {
        if self.settings.transparency_mode != mode {
            self.settings.transparency_mode = mode;
            self.mark_all(DirtyFlags::MISC | DirtyFlags::TEXTURES | DirtyFlags::PREPASS);
        }
    }

    pub fn set_force_alpha_test(&mut self, force: bool) {
        if self.settings.force_alpha_test != force {
            self.settings.force_alpha_test = force;
            self.mark_all(DirtyFlags::MISC);
        }
    }

    pub fn set_alpha_cut_off(&mut self, cut_off: f32) {
        if self.settings.alpha_cut_off != cut_off {
            self.settings.alpha_cut_off = cut_off;
            self.mark_all(DirtyFlags::MISC);
        }
    }

    pub fn set_fog_enabled(&mut self, enabled: bool) {
        if self.settings.fog_enabled != enabled {
            self.settings.fog_enabled = enabled;
            self.mark_all(DirtyFlags::MISC);
        }
    }

    pub fn set_points_cloud(&mut self, enabled: bool) {
        if self.settings.points_cloud != enabled {
            self.settings.points_cloud = enabled;
            self.mark_all(DirtyFlags::MISC);
        }
    }

    /// Uniform only; no define depends on it.
    pub fn set_point_size(&mut self, size: f32) {
        if self.settings.point_size != size {
            self.settings.point_size = size;
            self.mark_all(DirtyFlags::empty());
        }
    }

    pub fn set_use_logarithmic_depth(&mut self, enabled: bool) {
        if self.settings.use_logarithmic_depth != enabled {
            self.settings.use_logarithmic_depth = enabled;
            self.mark_all(DirtyFlags::MISC);
        }
    }

    pub fn set_disable_lighting(&mut self, disable: bool) {
        if self.settings.disable_lighting != disable {
            self.settings.disable_lighting = disable;
            self.mark_all(DirtyFlags::LIGHTS);
        }
    }

    /// Light define keys are fixed per define set, so every submesh starts over.
    pub fn set_max_simultaneous_lights(&mut self, max: u32) {
        if self.settings.max_simultaneous_lights != max {
            self.settings.max_simultaneous_lights = max;
            self.wrappers.clear();
        }
    }

    /// Read by the next readiness check; no define depends on it.
    pub fn set_allow_shader_hot_swapping(&mut self, allow: bool) {
        self.settings.allow_shader_hot_swapping = allow;
    }

    /// `TWOSIDEDLIGHTING` follows culling, so the texture pass runs again.
    pub fn set_back_face_culling(&mut self, enabled: bool) {
        if self.settings.back_face_culling != enabled {
            self.settings.back_face_culling = enabled;
            self.mark_all(DirtyFlags::TEXTURES);
        }
    }

    // ─── Freezing ────────────────────────────────────────────────────────────

    /// Frozen materials skip define preparation once a submesh was ready, and
    /// skip material uniform writes while the block is in sync.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }

    #[inline]
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    // ─── Hooks ───────────────────────────────────────────────────────────────

    /// Called once when an effect first becomes ready for a submesh.
    pub fn set_on_compiled(&mut self, hook: impl FnMut(EffectId) + Send + 'static) {
        self.hooks.on_compiled = Some(Box::new(hook));
    }

    /// Called once per failed permutation with the compiler diagnostic.
    pub fn set_on_error(&mut self, hook: impl FnMut(EffectId, &str) + Send + 'static) {
        self.hooks.on_error = Some(Box::new(hook));
    }

    // ─── Alpha queries ───────────────────────────────────────────────────────

    #[must_use]
    pub fn need_alpha_blending(&self) -> bool {
        self.profile.need_alpha_blending(&self.settings)
    }

    #[must_use]
    pub fn need_alpha_testing(&self) -> bool {
        self.profile.need_alpha_testing(&self.settings)
    }

    /// Blending for one mesh: also considers visibility and vertex alpha.
    #[must_use]
    pub fn need_alpha_blending_for_mesh(&self, mesh: &Mesh) -> bool {
        self.profile
            .need_alpha_blending_for_mesh(&self.settings, mesh.state())
    }

    // ─── Submesh state ───────────────────────────────────────────────────────

    #[must_use]
    pub fn draw_wrapper(&self, mesh: &Mesh, sub_mesh: u32) -> Option<&DrawWrapper> {
        self.wrappers.get(&mesh.sub_mesh(sub_mesh))
    }

    #[must_use]
    pub fn sub_mesh_defines(&self, mesh: &Mesh, sub_mesh: u32) -> Option<&DefineSet> {
        self.draw_wrapper(mesh, sub_mesh).map(DrawWrapper::defines)
    }

    /// Effect the submesh currently draws with.
    #[must_use]
    pub fn current_effect(&self, mesh: &Mesh, sub_mesh: u32) -> Option<EffectId> {
        self.draw_wrapper(mesh, sub_mesh).and_then(DrawWrapper::effect)
    }

    /// Forgets a submesh; a compile still pending for it is simply abandoned.
    pub fn release_sub_mesh(&mut self, mesh: &Mesh, sub_mesh: u32) -> bool {
        self.wrappers.remove(&mesh.sub_mesh(sub_mesh)).is_some()
    }

    #[must_use]
    pub fn sub_mesh_count(&self) -> usize {
        self.wrappers.len()
    }

    #[inline]
    #[must_use]
    pub fn uniform_buffer(&self) -> &UniformBuffer {
        &self.ubo
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> MaterialStats {
        self.stats
    }
}

// ============================================================================
// Profile guard
// ============================================================================

pub struct ProfileGuard<'a, P: MaterialProfile> {
    profile: &'a mut P,
    wrappers: &'a mut FxHashMap<SubMeshKey, DrawWrapper>,
}

impl<P: MaterialProfile> Deref for ProfileGuard<'_, P> {
    type Target = P;
    fn deref(&self) -> &Self::Target {
        self.profile
    }
}

impl<P: MaterialProfile> DerefMut for ProfileGuard<'_, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.profile
    }
}

impl<P: MaterialProfile> Drop for ProfileGuard<'_, P> {
    fn drop(&mut self) {
        // Value-only edits still have to reach frozen, in-sync blocks.
        let dirty = self.profile.take_dirty();
        for wrapper in self.wrappers.values_mut() {
            if !dirty.is_empty() {
                wrapper.defines.mark_as(dirty);
            }
            wrapper.force_rebind_on_next_call = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparency_mode_buckets() {
        assert!(TransparencyMode::AlphaTestAndBlend.is_blend());
        assert!(TransparencyMode::AlphaTestAndBlend.is_test());
        assert!(!TransparencyMode::Opaque.is_blend());
        assert!(!TransparencyMode::AlphaBlend.is_test());
    }

    #[test]
    fn test_settings_from_partial_json() {
        let settings: MaterialSettings =
            serde_json::from_str(r#"{ "alpha": 0.5, "transparency_mode": "AlphaTest" }"#).unwrap();
        assert_eq!(settings.alpha, 0.5);
        assert_eq!(settings.transparency_mode, Some(TransparencyMode::AlphaTest));
        assert_eq!(settings.max_simultaneous_lights, 4);
        assert!(settings.fog_enabled);
    }
}
