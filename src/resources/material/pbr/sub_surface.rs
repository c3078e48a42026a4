use glam::{Vec3, Vec4};

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

static THICKNESS_SLOT: SlotDesc = uv_slot(
    "SS_THICKNESSANDMASK_TEXTURE",
    "SS_THICKNESSANDMASK_TEXTUREDIRECTUV",
    CapabilityFlags::THICKNESS_TEXTURE,
    "thicknessSampler",
    "vThicknessInfos",
    "thicknessMatrix",
);
static REFRACTION_INTENSITY_SLOT: SlotDesc = uv_slot(
    "SS_REFRACTIONINTENSITY_TEXTURE",
    "SS_REFRACTIONINTENSITY_TEXTUREDIRECTUV",
    CapabilityFlags::REFRACTION_INTENSITY_TEXTURE,
    "refractionIntensitySampler",
    "vRefractionIntensityInfos",
    "refractionIntensityMatrix",
);
static TRANSLUCENCY_INTENSITY_SLOT: SlotDesc = uv_slot(
    "SS_TRANSLUCENCYINTENSITY_TEXTURE",
    "SS_TRANSLUCENCYINTENSITY_TEXTUREDIRECTUV",
    CapabilityFlags::TRANSLUCENCY_INTENSITY_TEXTURE,
    "translucencyIntensitySampler",
    "vTranslucencyIntensityInfos",
    "translucencyIntensityMatrix",
);
static TRANSLUCENCY_COLOR_SLOT: SlotDesc = uv_slot(
    "SS_TRANSLUCENCYCOLOR_TEXTURE",
    "SS_TRANSLUCENCYCOLOR_TEXTUREDIRECTUV",
    CapabilityFlags::TRANSLUCENCY_COLOR_TEXTURE,
    "translucencyColorSampler",
    "vTranslucencyColorInfos",
    "translucencyColorMatrix",
);
/// `vRefractionInfos` is a vec4 here, declared by the feature itself.
static REFRACTION_SLOT: SlotDesc = SlotDesc {
    define: "SS_REFRACTIONMAP",
    direct_uv: None,
    capability: CapabilityFlags::REFRACTION_TEXTURE,
    sampler: "refractionSampler",
    infos: None,
    matrix: Some("refractionMatrix"),
    readiness: SlotReadiness::NotBlocking,
    needs_derivatives: false,
};

const DEFINES: &[&str] = &[
    "SUBSURFACE",
    "SS_REFRACTION",
    "SS_TRANSLUCENCY",
    "SS_SCATTERING",
    "SS_REFRACTIONMAP_3D",
    "SS_REFRACTIONMAP_OPPOSITEZ",
    "SS_LODINREFRACTIONALPHA",
    "SS_GAMMAREFRACTION",
    "SS_RGBDREFRACTION",
    "SS_LINEARSPECULARREFRACTION",
    "SS_LINKREFRACTIONTOTRANSPARENCY",
    "SS_ALBEDOFORREFRACTIONTINT",
    "SS_ALBEDOFORTRANSLUCENCYTINT",
    "SS_USE_LOCAL_REFRACTIONMAP_CUBIC",
    "SS_USE_THICKNESS_AS_DEPTH",
    "SS_MASK_FROM_THICKNESS_TEXTURE",
    "SS_USE_GLTF_TEXTURES",
];

/// Refraction, translucency and scattering through the volume.
#[derive(Debug, Clone)]
pub struct SubSurfaceFeature {
    is_refraction_enabled: bool,
    is_translucency_enabled: bool,
    is_scattering_enabled: bool,
    refraction_intensity: f32,
    translucency_intensity: f32,
    index_of_refraction: f32,
    invert_refraction_y: bool,
    link_refraction_with_transparency: bool,
    minimum_thickness: f32,
    maximum_thickness: f32,
    use_thickness_as_depth: bool,
    use_mask_from_thickness_texture: bool,
    use_gltf_style_textures: bool,
    use_albedo_to_tint_refraction: bool,
    use_albedo_to_tint_translucency: bool,
    tint_color: Vec3,
    tint_color_at_distance: f32,
    diffusion_distance: Vec3,
    translucency_color: Vec3,

    thickness_texture: Option<TextureRef>,
    refraction_intensity_texture: Option<TextureRef>,
    translucency_intensity_texture: Option<TextureRef>,
    translucency_color_texture: Option<TextureRef>,
    refraction_texture: Option<TextureRef>,

    dirty: DirtyFlags,
}

impl Default for SubSurfaceFeature {
    fn default() -> Self {
        Self {
            is_refraction_enabled: false,
            is_translucency_enabled: false,
            is_scattering_enabled: false,
            refraction_intensity: 1.0,
            translucency_intensity: 1.0,
            index_of_refraction: 1.5,
            invert_refraction_y: false,
            link_refraction_with_transparency: false,
            minimum_thickness: 0.0,
            maximum_thickness: 1.0,
            use_thickness_as_depth: false,
            use_mask_from_thickness_texture: false,
            use_gltf_style_textures: true,
            use_albedo_to_tint_refraction: false,
            use_albedo_to_tint_translucency: false,
            tint_color: Vec3::ONE,
            tint_color_at_distance: 1.0,
            diffusion_distance: Vec3::ONE,
            translucency_color: Vec3::ONE,
            thickness_texture: None,
            refraction_intensity_texture: None,
            translucency_intensity_texture: None,
            translucency_color_texture: None,
            refraction_texture: None,
            dirty: DirtyFlags::empty(),
        }
    }
}

impl_profile_api!(
    SubSurfaceFeature,
    textures: [
        (thickness_texture,              THICKNESS_SLOT,              "Thickness in green, mask in red."),
        (refraction_intensity_texture,   REFRACTION_INTENSITY_SLOT,   "Refraction intensity."),
        (translucency_intensity_texture, TRANSLUCENCY_INTENSITY_SLOT, "Translucency intensity."),
        (translucency_color_texture,     TRANSLUCENCY_COLOR_SLOT,     "Translucency color."),
        (refraction_texture,             REFRACTION_SLOT,             "Scene behind the surface."),
    ],
    params: [
        (is_refraction_enabled,             bool, DirtyFlags::TEXTURES, "Enables refraction."),
        (is_translucency_enabled,           bool, DirtyFlags::TEXTURES, "Enables translucency."),
        (is_scattering_enabled,             bool, DirtyFlags::TEXTURES, "Enables scattering."),
        (refraction_intensity,              f32,  DirtyFlags::empty(),  "Refraction strength."),
        (translucency_intensity,            f32,  DirtyFlags::empty(),  "Translucency strength."),
        (index_of_refraction,               f32,  DirtyFlags::empty(),  "Volume index of refraction."),
        (invert_refraction_y,               bool, DirtyFlags::empty(),  "Flip the refraction lookup."),
        (link_refraction_with_transparency, bool, DirtyFlags::TEXTURES, "Refraction replaces alpha blending."),
        (minimum_thickness,                 f32,  DirtyFlags::empty(),  "Thickness at 0."),
        (maximum_thickness,                 f32,  DirtyFlags::empty(),  "Thickness at 1."),
        (use_thickness_as_depth,            bool, DirtyFlags::TEXTURES, "Thickness also drives refraction depth."),
        (use_mask_from_thickness_texture,   bool, DirtyFlags::TEXTURES, "Intensity mask in the thickness map."),
        (use_gltf_style_textures,           bool, DirtyFlags::TEXTURES, "glTF channel layout for intensity maps."),
        (use_albedo_to_tint_refraction,     bool, DirtyFlags::TEXTURES, "Albedo tints refraction."),
        (use_albedo_to_tint_translucency,   bool, DirtyFlags::TEXTURES, "Albedo tints translucency."),
        (tint_color,                        Vec3, DirtyFlags::empty(),  "Volume tint."),
        (tint_color_at_distance,            f32,  DirtyFlags::empty(),  "Distance at which the tint is reached."),
        (diffusion_distance,                Vec3, DirtyFlags::empty(),  "Per-channel scattering distance."),
        (translucency_color,                Vec3, DirtyFlags::empty(),  "Translucency tint."),
    ]
);

impl SubSurfaceFeature {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.is_refraction_enabled || self.is_translucency_enabled || self.is_scattering_enabled
    }

    /// Refraction linked to transparency draws opaque.
    #[must_use]
    pub fn disables_alpha_blending(&self) -> bool {
        self.is_refraction_enabled && self.link_refraction_with_transparency
    }
}

#[inline]
fn gate(on: bool, texture: &Option<TextureRef>) -> Option<&TextureRef> {
    texture.as_ref().filter(|_| on)
}

impl PbrFeature for SubSurfaceFeature {
    fn register_defines(&self, builder: &mut DefineSetBuilder) {
        builder.flags(DEFINES, DirtyFlags::TEXTURES);
    }

    fn visit_slots(&self, visitor: &mut dyn FnMut(&'static SlotDesc, Option<&TextureRef>)) {
        let refraction = self.is_refraction_enabled;
        let translucency = self.is_translucency_enabled;
        visitor(&THICKNESS_SLOT, gate(self.is_enabled(), &self.thickness_texture));
        visitor(&REFRACTION_INTENSITY_SLOT, gate(refraction, &self.refraction_intensity_texture));
        visitor(&TRANSLUCENCY_INTENSITY_SLOT, gate(translucency, &self.translucency_intensity_texture));
        visitor(&TRANSLUCENCY_COLOR_SLOT, gate(translucency, &self.translucency_color_texture));
        visitor(&REFRACTION_SLOT, gate(refraction, &self.refraction_texture));
    }

    fn prepare_defines(&self, defines: &mut DefineSet, ctx: &PrepareContext<'_>) {
        let refraction = self.is_refraction_enabled;
        let translucency = self.is_translucency_enabled;
        defines.set("SUBSURFACE", self.is_enabled());
        defines.set("SS_REFRACTION", refraction);
        defines.set("SS_TRANSLUCENCY", translucency);
        defines.set("SS_SCATTERING", self.is_scattering_enabled);
        defines.set("SS_LINKREFRACTIONTOTRANSPARENCY", self.disables_alpha_blending());
        defines.set("SS_ALBEDOFORREFRACTIONTINT", refraction && self.use_albedo_to_tint_refraction);
        defines.set(
            "SS_ALBEDOFORTRANSLUCENCYTINT",
            translucency && self.use_albedo_to_tint_translucency,
        );
        defines.set("SS_USE_THICKNESS_AS_DEPTH", refraction && self.use_thickness_as_depth);
        defines.set(
            "SS_MASK_FROM_THICKNESS_TEXTURE",
            defines.is_set("SS_THICKNESSANDMASK_TEXTURE") && self.use_mask_from_thickness_texture,
        );
        defines.set("SS_USE_GLTF_TEXTURES", self.is_enabled() && self.use_gltf_style_textures);

        let map = self
            .refraction_texture
            .as_ref()
            .filter(|_| defines.is_set("SS_REFRACTIONMAP"));
        let opposite_z = map.is_some_and(|t| if ctx.scene.right_handed() { !t.invert_z } else { t.invert_z });
        defines.set("SS_REFRACTIONMAP_3D", map.is_some_and(|t| t.is_cube));
        defines.set("SS_REFRACTIONMAP_OPPOSITEZ", opposite_z);
        defines.set("SS_LODINREFRACTIONALPHA", map.is_some_and(|t| t.lod_generation_in_alpha));
        defines.set("SS_GAMMAREFRACTION", map.is_some_and(|t| t.gamma_space));
        defines.set("SS_RGBDREFRACTION", map.is_some_and(|t| t.is_rgbd));
        defines.set("SS_LINEARSPECULARREFRACTION", map.is_some_and(|t| t.linear_specular_lod));
        defines.set(
            "SS_USE_LOCAL_REFRACTIONMAP_CUBIC",
            map.is_some_and(|t| t.is_cube && t.bounding_box_size.is_some()),
        );
    }

    fn build_uniform_layout(&self, ubo: &mut UniformBuffer) {
        ubo.add_uniform("vSubSurfaceIntensity", 3);
        ubo.add_uniform("vThicknessParam", 2);
        ubo.add_uniform("vTintColor", 4);
        ubo.add_uniform("vDiffusionDistance", 3);
        ubo.add_uniform("vTranslucencyColor", 4);
        ubo.add_uniform("vRefractionInfos", 4);
        ubo.add_uniform("vRefractionMicrosurfaceInfos", 3);
    }

    fn bind(&self, ubo: &mut UniformBuffer, ctx: &BindContext<'_>) {
        if !ctx.defines.is_set("SUBSURFACE") {
            return;
        }
        ubo.update_float3(
            "vSubSurfaceIntensity",
            self.refraction_intensity,
            self.translucency_intensity,
            0.0,
        );
        ubo.update_float2(
            "vThicknessParam",
            self.minimum_thickness,
            self.maximum_thickness - self.minimum_thickness,
        );
        ubo.update_color4("vTintColor", self.tint_color, self.tint_color_at_distance.max(0.00001));
        ubo.update_vec3("vDiffusionDistance", self.diffusion_distance);
        ubo.update_color4("vTranslucencyColor", self.translucency_color, 1.0);

        if let Some(map) = self
            .refraction_texture
            .as_ref()
            .filter(|_| ctx.defines.is_set("SS_REFRACTIONMAP"))
        {
            let invert = if self.invert_refraction_y { -1.0 } else { 1.0 };
            ubo.update_vec4(
                "vRefractionInfos",
                Vec4::new(map.level, 1.0 / self.index_of_refraction, invert, 0.0),
            );
            let size = map.bounding_box_size.map_or(1.0, |s| s.max_element());
            ubo.update_float3("vRefractionMicrosurfaceInfos", size, 0.8, 0.0);
        }
    }

    fn add_fallbacks(&self, defines: &DefineSet, chain: &mut FallbackChain) {
        fallback_if_set(defines, chain, 0, "SS_SCATTERING");
        fallback_if_set(defines, chain, 1, "SS_TRANSLUCENCY");
        fallback_if_set(defines, chain, 2, "SS_REFRACTION");
    }

    fn take_dirty(&mut self) -> DirtyFlags {
        self.take_dirty_flags()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::texture::Texture;

    #[test]
    fn test_disabled_lobes_hide_their_textures() {
        let mut feature = SubSurfaceFeature::default();
        feature.set_refraction_intensity_texture(Some(Texture::new("ri").into_ref()));
        feature.set_translucency_color_texture(Some(Texture::new("tc").into_ref()));

        let mut visible = Vec::new();
        feature.visit_slots(&mut |desc, tex| {
            if tex.is_some() {
                visible.push(desc.define);
            }
        });
        assert!(visible.is_empty());

        feature.set_is_refraction_enabled(true);
        visible.clear();
        feature.visit_slots(&mut |desc, tex| {
            if tex.is_some() {
                visible.push(desc.define);
            }
        });
        assert_eq!(visible, vec!["SS_REFRACTIONINTENSITY_TEXTURE"]);
    }
}
