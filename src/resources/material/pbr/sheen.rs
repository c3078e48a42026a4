use glam::Vec3;

use super::PbrFeature;
use crate::impl_profile_api;
use crate::renderer::pipeline::FallbackChain;
use crate::resources::capabilities::CapabilityFlags;
use crate::resources::material::profile::{BindContext, PrepareContext, SlotDesc, fallback_if_set};
use crate::resources::material::standard::uv_slot;
use crate::resources::shader_defines::{DefineSet, DefineSetBuilder, DirtyFlags};
use crate::resources::texture::TextureRef;
use crate::resources::uniform_buffer::UniformBuffer;

static SHEEN_SLOT: SlotDesc = uv_slot(
    "SHEEN_TEXTURE",
    "SHEEN_TEXTUREDIRECTUV",
    CapabilityFlags::SHEEN_TEXTURE,
    "sheenSampler",
    "vSheenInfos",
    "sheenMatrix",
);
static SHEEN_ROUGHNESS_SLOT: SlotDesc = uv_slot(
    "SHEEN_TEXTURE_ROUGHNESS",
    "SHEEN_TEXTURE_ROUGHNESSDIRECTUV",
    CapabilityFlags::SHEEN_TEXTURE,
    "sheenRoughnessSampler",
    "vSheenRoughnessInfos",
    "sheenRoughnessMatrix",
);

const DEFINES: &[&str] = &[
    "SHEEN",
    "SHEEN_LINKWITHALBEDO",
    "SHEEN_ROUGHNESS",
    "SHEEN_ALBEDOSCALING",
    "SHEEN_USE_ROUGHNESS_FROM_MAINTEXTURE",
    "SHEEN_GAMMATEXTURE",
];

/// Retro-reflective fabric lobe.
#[derive(Debug, Clone)]
pub struct SheenFeature {
    is_enabled: bool,
    link_sheen_with_albedo: bool,
    intensity: f32,
    color: Vec3,
    roughness: Option<f32>,
    albedo_scaling: bool,
    use_roughness_from_main_texture: bool,

    texture: Option<TextureRef>,
    texture_roughness: Option<TextureRef>,

    dirty: DirtyFlags,
}

impl Default for SheenFeature {
    fn default() -> Self {
        Self {
            is_enabled: false,
            link_sheen_with_albedo: false,
            intensity: 1.0,
            color: Vec3::ONE,
            roughness: None,
            albedo_scaling: false,
            use_roughness_from_main_texture: true,
            texture: None,
            texture_roughness: None,
            dirty: DirtyFlags::empty(),
        }
    }
}

impl_profile_api!(
    SheenFeature,
    textures: [
        (texture,           SHEEN_SLOT,           "Sheen color, roughness in alpha."),
        (texture_roughness, SHEEN_ROUGHNESS_SLOT, "Separate roughness map."),
    ],
    params: [
        (is_enabled,                      bool,        DirtyFlags::TEXTURES, "Enables the lobe."),
        (link_sheen_with_albedo,          bool,        DirtyFlags::TEXTURES, "Tint sheen with albedo."),
        (intensity,                       f32,         DirtyFlags::empty(),  "Sheen intensity."),
        (color,                           Vec3,        DirtyFlags::empty(),  "Sheen color."),
        (roughness,                       Option<f32>, DirtyFlags::TEXTURES, "Own roughness; base roughness when unset."),
        (albedo_scaling,                  bool,        DirtyFlags::TEXTURES, "Energy-conserving albedo scaling."),
        (use_roughness_from_main_texture, bool,        DirtyFlags::TEXTURES, "Roughness read from the sheen map alpha."),
    ]
);

impl PbrFeature for SheenFeature {
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

    fn prepare_defines(&self, defines: &mut DefineSet, _ctx: &PrepareContext<'_>) {
        let on = self.is_enabled;
        defines.set("SHEEN", on);
        defines.set("SHEEN_LINKWITHALBEDO", on && self.link_sheen_with_albedo);
        defines.set("SHEEN_ROUGHNESS", on && self.roughness.is_some());
        defines.set("SHEEN_ALBEDOSCALING", on && self.albedo_scaling);
        defines.set(
            "SHEEN_USE_ROUGHNESS_FROM_MAINTEXTURE",
            on && self.use_roughness_from_main_texture,
        );
        defines.set(
            "SHEEN_GAMMATEXTURE",
            defines.is_set("SHEEN_TEXTURE") && self.texture.as_ref().is_some_and(|t| t.gamma_space),
        );
    }

    fn build_uniform_layout(&self, ubo: &mut UniformBuffer) {
        ubo.add_uniform("vSheenColor", 4);
        ubo.add_uniform("vSheenRoughness", 1);
    }

    fn bind(&self, ubo: &mut UniformBuffer, ctx: &BindContext<'_>) {
        if !ctx.defines.is_set("SHEEN") {
            return;
        }
        ubo.update_color4("vSheenColor", self.color, self.intensity);
        if let Some(roughness) = self.roughness {
            ubo.update_float("vSheenRoughness", roughness);
        }
    }

    fn add_fallbacks(&self, defines: &DefineSet, chain: &mut FallbackChain) {
        fallback_if_set(defines, chain, 1, "SHEEN");
    }

    fn take_dirty(&mut self) -> DirtyFlags {
        self.take_dirty_flags()
    }
}
