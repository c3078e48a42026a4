//! Material Profiles
//!
//! A [`MaterialProfile`] is everything that distinguishes one material family
//! from another: its shader, its texture slot table, its own defines and
//! uniforms, its fallbacks and its alpha rules. The define/effect/bind
//! machinery in [`Material`](super::Material) is shared by every profile.

use std::fmt::Debug;

use crate::renderer::backend::EngineCaps;
use crate::renderer::pipeline::FallbackChain;
use crate::resources::capabilities::{CapabilityFlags, RenderCapabilities};
use crate::resources::material::MaterialSettings;
use crate::resources::mesh::{Mesh, MeshState};
use crate::resources::shader_defines::{DefineSet, DefineSetBuilder, DirtyFlags};
use crate::resources::texture::TextureRef;
use crate::resources::uniform_buffer::UniformBuffer;
use crate::scene::Scene;

/// Readiness a slot's texture must reach before the submesh can draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotReadiness {
    /// A not-blocking texture may be skipped until it is resident.
    NotBlocking,
    /// The texture must be resident (normal maps, BRDF lookup tables).
    MustBeReady,
}

/// Static description of one texture slot.
#[derive(Debug)]
pub struct SlotDesc {
    /// Presence define, e.g. `DIFFUSE`.
    pub define: &'static str,
    /// `xxxDIRECTUV` define for UV-mapped slots; `None` for environment maps.
    pub direct_uv: Option<&'static str>,
    /// Capability switch gating the slot.
    pub capability: CapabilityFlags,
    pub sampler: &'static str,
    /// `vec2(coordinatesIndex, level)` block entry.
    pub infos: Option<&'static str>,
    /// Texture matrix block entry.
    pub matrix: Option<&'static str>,
    pub readiness: SlotReadiness,
    /// Only usable when the backend supports standard derivatives.
    pub needs_derivatives: bool,
}

impl SlotDesc {
    /// Slot is allowed by the capability switches and the backend.
    #[must_use]
    pub fn is_enabled(&self, capabilities: &RenderCapabilities, caps: &EngineCaps) -> bool {
        capabilities.is_enabled(self.capability) && (!self.needs_derivatives || caps.standard_derivatives)
    }
}

/// Inputs shared by every define preparation pass.
#[derive(Clone, Copy)]
pub struct PrepareContext<'a> {
    pub scene: &'a Scene,
    pub mesh: &'a Mesh,
    pub settings: &'a MaterialSettings,
    pub capabilities: &'a RenderCapabilities,
    pub caps: &'a EngineCaps,
}

impl PrepareContext<'_> {
    #[inline]
    #[must_use]
    pub fn mesh_state(&self) -> &MeshState {
        self.mesh.state()
    }
}

/// Inputs of the bind passes.
#[derive(Clone, Copy)]
pub struct BindContext<'a> {
    pub scene: &'a Scene,
    pub mesh: &'a Mesh,
    pub defines: &'a DefineSet,
    pub settings: &'a MaterialSettings,
    pub capabilities: &'a RenderCapabilities,
    pub caps: &'a EngineCaps,
}

/// Attribute, uniform and sampler names declared to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectInterface {
    pub attributes: Vec<String>,
    pub uniforms: Vec<String>,
    pub samplers: Vec<String>,
    pub uniform_blocks: Vec<String>,
}

impl EffectInterface {
    pub fn attribute(&mut self, name: impl Into<String>) {
        push_unique(&mut self.attributes, name.into());
    }

    pub fn uniform(&mut self, name: impl Into<String>) {
        push_unique(&mut self.uniforms, name.into());
    }

    pub fn uniforms(&mut self, names: &[&str]) {
        for name in names {
            self.uniform(*name);
        }
    }

    pub fn sampler(&mut self, name: impl Into<String>) {
        push_unique(&mut self.samplers, name.into());
    }
}

fn push_unique(list: &mut Vec<String>, name: String) {
    if !list.contains(&name) {
        list.push(name);
    }
}

/// Material family plugged into the shared define/effect/bind core.
pub trait MaterialProfile: Debug + Send + Sync + 'static {
    /// Shader family compiled for this profile.
    fn shader_name(&self) -> &'static str;

    /// Registers the profile's own define keys (slot defines are added by the core).
    fn register_defines(&self, builder: &mut DefineSetBuilder);

    /// Visits every texture slot in table order with its current texture.
    fn visit_slots(&self, scene: &Scene, visitor: &mut dyn FnMut(&'static SlotDesc, Option<&TextureRef>));

    /// Extra readiness checks outside the slot table.
    fn textures_ready(&self, _ctx: &PrepareContext<'_>) -> bool {
        true
    }

    /// Texture-dependent defines; runs after the slot pass while textures are dirty.
    fn prepare_texture_defines(&self, defines: &mut DefineSet, ctx: &PrepareContext<'_>);

    /// Remaining profile defines (fresnel, profile misc); runs on every pass.
    fn prepare_defines(&self, defines: &mut DefineSet, ctx: &PrepareContext<'_>);

    /// Declares the profile's material block entries (slot entries are added by the core).
    fn build_uniform_layout(&self, ubo: &mut UniformBuffer);

    fn collect_interface(&self, defines: &DefineSet, iface: &mut EffectInterface);

    fn add_fallbacks(&self, defines: &DefineSet, chain: &mut FallbackChain);

    /// Writes material block values; skipped on frozen, in-sync blocks.
    fn bind_material(&self, ubo: &mut UniformBuffer, ctx: &BindContext<'_>);

    /// Values that change per frame.
    fn bind_frame(&self, _ubo: &mut UniformBuffer, _ctx: &BindContext<'_>) {}

    /// Profile-specific reasons to blend (opacity map, alpha from diffuse, opacity fresnel).
    fn has_alpha_sources(&self) -> bool;

    /// Whether the base color texture carries usable alpha.
    fn has_alpha_channel(&self) -> bool;

    fn disable_alpha_blending(&self) -> bool {
        false
    }

    fn specular_supported(&self) -> bool {
        true
    }

    fn can_render_to_mrt(&self) -> bool {
        true
    }

    fn uses_vertex_colors(&self) -> bool {
        true
    }

    fn uses_morph_targets(&self) -> bool {
        true
    }

    /// Concerns invalidated by profile edits since the last call.
    fn take_dirty(&mut self) -> DirtyFlags;

    // ─── Alpha rules ─────────────────────────────────────────────────────────

    fn need_alpha_blending(&self, settings: &MaterialSettings) -> bool {
        if let Some(mode) = settings.transparency_mode {
            return mode.is_blend();
        }
        if self.disable_alpha_blending() {
            return false;
        }
        settings.alpha < 1.0 || self.has_alpha_sources()
    }

    fn need_alpha_testing(&self, settings: &MaterialSettings) -> bool {
        if settings.force_alpha_test {
            return true;
        }
        match settings.transparency_mode {
            Some(mode) => mode.is_test(),
            None => self.has_alpha_channel(),
        }
    }

    fn need_alpha_blending_for_mesh(&self, settings: &MaterialSettings, mesh: &MeshState) -> bool {
        if let Some(mode) = settings.transparency_mode {
            return mode.is_blend();
        }
        if mesh.visibility < 1.0 {
            return true;
        }
        if self.disable_alpha_blending() {
            return false;
        }
        mesh.has_vertex_alpha || self.need_alpha_blending(settings)
    }

    /// Alpha testing is turned on when the mesh does not blend.
    fn should_turn_alpha_test_on(&self, settings: &MaterialSettings, mesh: &MeshState) -> bool {
        settings.force_alpha_test
            || (!self.need_alpha_blending_for_mesh(settings, mesh) && self.need_alpha_testing(settings))
    }
}

/// Adds `define` at `rank` when it is set.
pub(crate) fn fallback_if_set(defines: &DefineSet, chain: &mut FallbackChain, rank: u32, define: &str) {
    if defines.is_set(define) {
        chain.add_fallback(rank, define);
    }
}
