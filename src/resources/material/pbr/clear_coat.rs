use glam::Vec3;

use super::PbrFeature;
use crate::impl_profile_api;
use crate::renderer::pipeline::FallbackChain;
use crate::resources::capabilities::CapabilityFlags;
use crate::resources::material::profile::{
    BindContext, PrepareContext, SlotDesc, SlotReadiness, fallback_if_set,
};
use crate::resources::material::standard::uv_slot;
use crate::resources::shader_defines::{DefineSet, DefineSetBuilder, DirtyFlags};
use crate::resources::texture::TextureRef;
use crate::resources::uniform_buffer::UniformBuffer;

static CLEAR_COAT_SLOT: SlotDesc = uv_slot(
    "CLEARCOAT_TEXTURE",
    "CLEARCOAT_TEXTUREDIRECTUV",
    CapabilityFlags::CLEAR_COAT_TEXTURE,
    "clearCoatSampler",
    "vClearCoatInfos",
    "clearCoatMatrix",
);
static CLEAR_COAT_ROUGHNESS_SLOT: SlotDesc = uv_slot(
    "CLEARCOAT_TEXTURE_ROUGHNESS",
    "CLEARCOAT_TEXTURE_ROUGHNESSDIRECTUV",
    CapabilityFlags::CLEAR_COAT_TEXTURE,
    "clearCoatRoughnessSampler",
    "vClearCoatRoughnessInfos",
    "clearCoatRoughnessMatrix",
);
static CLEAR_COAT_BUMP_SLOT: SlotDesc = SlotDesc {
    readiness: SlotReadiness::MustBeReady,
    needs_derivatives: true,
    ..uv_slot(
        "CLEARCOAT_BUMP",
        "CLEARCOAT_BUMPDIRECTUV",
        CapabilityFlags::CLEAR_COAT_BUMP_TEXTURE,
        "clearCoatBumpSampler",
        "vClearCoatBumpInfos",
        "clearCoatBumpMatrix",
    )
};
static CLEAR_COAT_TINT_SLOT: SlotDesc = uv_slot(
    "CLEARCOAT_TINT_TEXTURE",
    "CLEARCOAT_TINT_TEXTUREDIRECTUV",
    CapabilityFlags::CLEAR_COAT_TINT_TEXTURE,
    "clearCoatTintSampler",
    "vClearCoatTintInfos",
    "clearCoatTintMatrix",
);

const DEFINES: &[&str] = &[
    "CLEARCOAT",
    "CLEARCOAT_DEFAULTIOR",
    "CLEARCOAT_USE_ROUGHNESS_FROM_MAINTEXTURE",
    "CLEARCOAT_TEXTURE_ROUGHNESS_IDENTICAL",
    "CLEARCOAT_REMAP_F0",
    "CLEARCOAT_TINT",
    "CLEARCOAT_TINT_GAMMATEXTURE",
];

/// Index of refraction of a typical varnish.
const DEFAULT_IOR: f32 = 1.5;

/// Thin dielectric layer over the base.
#[derive(Debug, Clone)]
pub struct ClearCoatFeature {
    is_enabled: bool,
    intensity: f32,
    roughness: f32,
    index_of_refraction: f32,
    remap_f0_on_interface_change: bool,
    use_roughness_from_main_texture: bool,
    is_tint_enabled: bool,
    tint_color: Vec3,
    tint_color_at_distance: f32,
    tint_thickness: f32,

    texture: Option<TextureRef>,
    texture_roughness: Option<TextureRef>,
    bump_texture: Option<TextureRef>,
    tint_texture: Option<TextureRef>,

    dirty: DirtyFlags,
}

impl Default for ClearCoatFeature {
    fn default() -> Self {
        Self {
            is_enabled: false,
            intensity: 1.0,
            roughness: 0.0,
            index_of_refraction: DEFAULT_IOR,
            remap_f0_on_interface_change: true,
            use_roughness_from_main_texture: true,
            is_tint_enabled: false,
            tint_color: Vec3::ONE,
            tint_color_at_distance: 1.0,
            tint_thickness: 1.0,
            texture: None,
            texture_roughness: None,
            bump_texture: None,
            tint_texture: None,
            dirty: DirtyFlags::empty(),
        }
    }
}

impl_profile_api!(
    ClearCoatFeature,
    textures: [
        (texture,           CLEAR_COAT_SLOT,           "Intensity in red, roughness in green."),
        (texture_roughness, CLEAR_COAT_ROUGHNESS_SLOT, "Separate roughness map."),
        (bump_texture,      CLEAR_COAT_BUMP_SLOT,      "Coat normal map."),
        (tint_texture,      CLEAR_COAT_TINT_SLOT,      "Tint color and thickness."),
    ],
    params: [
        (is_enabled,                      bool, DirtyFlags::TEXTURES, "Enables the coat."),
        (intensity,                       f32,  DirtyFlags::empty(),  "Coat intensity."),
        (roughness,                       f32,  DirtyFlags::empty(),  "Coat roughness."),
        (index_of_refraction,             f32,  DirtyFlags::TEXTURES, "Coat index of refraction."),
        (remap_f0_on_interface_change,    bool, DirtyFlags::TEXTURES, "Remap base F0 under the coat."),
        (use_roughness_from_main_texture, bool, DirtyFlags::TEXTURES, "Roughness read from the coat map green channel."),
        (is_tint_enabled,                 bool, DirtyFlags::TEXTURES, "Tint light crossing the coat."),
        (tint_color,                      Vec3, DirtyFlags::empty(),  "Tint color."),
        (tint_color_at_distance,          f32,  DirtyFlags::empty(),  "Distance at which the tint color is reached."),
        (tint_thickness,                  f32,  DirtyFlags::empty(),  "Coat thickness."),
    ]
);

impl PbrFeature for ClearCoatFeature {
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
        defines.set("CLEARCOAT", on);
        defines.set(
            "CLEARCOAT_DEFAULTIOR",
            on && (self.index_of_refraction - DEFAULT_IOR).abs() < f32::EPSILON,
        );
        defines.set("CLEARCOAT_REMAP_F0", on && self.remap_f0_on_interface_change);

        let main = defines.is_set("CLEARCOAT_TEXTURE");
        let separate = defines.is_set("CLEARCOAT_TEXTURE_ROUGHNESS");
        defines.set(
            "CLEARCOAT_USE_ROUGHNESS_FROM_MAINTEXTURE",
            on && main && self.use_roughness_from_main_texture,
        );
        let identical = match (&self.texture, &self.texture_roughness) {
            (Some(a), Some(b)) => std::sync::Arc::ptr_eq(a, b),
            _ => false,
        };
        defines.set(
            "CLEARCOAT_TEXTURE_ROUGHNESS_IDENTICAL",
            on && main && separate && identical,
        );

        let tint = on && self.is_tint_enabled;
        defines.set("CLEARCOAT_TINT", tint);
        defines.set(
            "CLEARCOAT_TINT_GAMMATEXTURE",
            tint && defines.is_set("CLEARCOAT_TINT_TEXTURE")
                && self.tint_texture.as_ref().is_some_and(|t| t.gamma_space),
        );
    }

    fn build_uniform_layout(&self, ubo: &mut UniformBuffer) {
        ubo.add_uniform("vClearCoatParams", 2);
        ubo.add_uniform("vClearCoatRefractionParams", 4);
        ubo.add_uniform("vClearCoatTangentSpaceParams", 2);
        ubo.add_uniform("vClearCoatTintParams", 4);
        ubo.add_uniform("clearCoatColorAtDistance", 1);
    }

    fn bind(&self, ubo: &mut UniformBuffer, ctx: &BindContext<'_>) {
        if !ctx.defines.is_set("CLEARCOAT") {
            return;
        }
        ubo.update_float2("vClearCoatParams", self.intensity, self.roughness);

        // Fresnel at the coat/base interface, then the air/coat one.
        let a = 1.0 - self.index_of_refraction;
        let b = 1.0 + self.index_of_refraction;
        let f0 = (-a / b).powi(2);
        let eta = 1.0 / self.index_of_refraction;
        ubo.update_float4("vClearCoatRefractionParams", f0, eta, a, b);

        if ctx.defines.is_set("CLEARCOAT_BUMP") {
            ubo.update_float2("vClearCoatTangentSpaceParams", 1.0, 1.0);
        }
        if ctx.defines.is_set("CLEARCOAT_TINT") {
            ubo.update_color4("vClearCoatTintParams", self.tint_color, self.tint_thickness.max(0.0));
            ubo.update_float("clearCoatColorAtDistance", self.tint_color_at_distance.max(0.00001));
        }
    }

    fn add_fallbacks(&self, defines: &DefineSet, chain: &mut FallbackChain) {
        fallback_if_set(defines, chain, 0, "CLEARCOAT_BUMP");
        fallback_if_set(defines, chain, 1, "CLEARCOAT_TINT");
        fallback_if_set(defines, chain, 2, "CLEARCOAT");
    }

    fn take_dirty(&mut self) -> DirtyFlags {
        self.take_dirty_flags()
    }
}
