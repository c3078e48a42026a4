use glam::Vec2;

use super::PbrFeature;
use crate::impl_profile_api;
use crate::renderer::pipeline::FallbackChain;
use crate::resources::capabilities::CapabilityFlags;
use crate::resources::material::profile::{BindContext, PrepareContext, SlotDesc, fallback_if_set};
use crate::resources::material::standard::uv_slot;
use crate::resources::mesh::VertexAttributes;
use crate::resources::shader_defines::{DefineSet, DefineSetBuilder, DirtyFlags};
use crate::resources::texture::TextureRef;
use crate::resources::uniform_buffer::UniformBuffer;

static ANISOTROPY_SLOT: SlotDesc = uv_slot(
    "ANISOTROPIC_TEXTURE",
    "ANISOTROPIC_TEXTUREDIRECTUV",
    CapabilityFlags::ANISOTROPIC_TEXTURE,
    "anisotropySampler",
    "vAnisotropyInfos",
    "anisotropyMatrix",
);

const DEFINES: &[&str] = &["ANISOTROPIC", "ANISOTROPIC_LEGACY"];

/// Stretched highlights along a tangent direction.
#[derive(Debug, Clone)]
pub struct AnisotropyFeature {
    is_enabled: bool,
    intensity: f32,
    direction: Vec2,
    legacy: bool,

    texture: Option<TextureRef>,

    dirty: DirtyFlags,
}

impl Default for AnisotropyFeature {
    fn default() -> Self {
        Self {
            is_enabled: false,
            intensity: 1.0,
            direction: Vec2::X,
            legacy: false,
            texture: None,
            dirty: DirtyFlags::empty(),
        }
    }
}

impl_profile_api!(
    AnisotropyFeature,
    textures: [
        (texture, ANISOTROPY_SLOT, "Direction in RG, strength in B."),
    ],
    params: [
        (is_enabled, bool, DirtyFlags::TEXTURES, "Enables the lobe."),
        (intensity,  f32,  DirtyFlags::empty(),  "Anisotropy strength."),
        (direction,  Vec2, DirtyFlags::empty(),  "Tangent-space direction."),
        (legacy,     bool, DirtyFlags::TEXTURES, "Pre-glTF anisotropy model."),
    ]
);

impl AnisotropyFeature {
    /// Sets the direction from an angle in radians.
    pub fn set_angle(&mut self, angle: f32) {
        self.set_direction(Vec2::from_angle(angle));
    }
}

impl PbrFeature for AnisotropyFeature {
    fn register_defines(&self, builder: &mut DefineSetBuilder) {
        builder.flags(DEFINES, DirtyFlags::TEXTURES);
    }

    fn visit_slots(&self, visitor: &mut dyn FnMut(&'static SlotDesc, Option<&TextureRef>)) {
        if self.is_enabled {
            self.visit_slot_table(visitor);
        } else {
            self.visit_slot_table(&mut |desc, _| visitor(desc, None));
        }
    }

    fn prepare_defines(&self, defines: &mut DefineSet, ctx: &PrepareContext<'_>) {
        // Tangent frames are derived from UVs.
        let has_uvs = ctx.mesh_state().attributes.contains(VertexAttributes::UV1);
        let on = self.is_enabled && has_uvs;
        if self.is_enabled && !has_uvs {
            log::debug!("Anisotropy disabled on `{}`: mesh has no UVs", ctx.mesh.name);
        }
        defines.set("ANISOTROPIC", on);
        defines.set("ANISOTROPIC_LEGACY", on && self.legacy);
        if on {
            defines.hints_mut().need_uvs = true;
        }
    }

    fn build_uniform_layout(&self, ubo: &mut UniformBuffer) {
        ubo.add_uniform("vAnisotropy", 3);
    }

    fn bind(&self, ubo: &mut UniformBuffer, ctx: &BindContext<'_>) {
        if ctx.defines.is_set("ANISOTROPIC") {
            let dir = self.direction.normalize_or_zero();
            ubo.update_float3("vAnisotropy", dir.x, dir.y, self.intensity);
        }
    }

    fn add_fallbacks(&self, defines: &DefineSet, chain: &mut FallbackChain) {
        fallback_if_set(defines, chain, 1, "ANISOTROPIC");
    }

    fn take_dirty(&mut self) -> DirtyFlags {
        self.take_dirty_flags()
    }
}
