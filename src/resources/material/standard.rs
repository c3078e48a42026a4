use glam::Vec3;

use crate::impl_profile_api;
use crate::renderer::pipeline::FallbackChain;
use crate::resources::capabilities::CapabilityFlags;
use crate::resources::material::fresnel::FresnelParameters;
use crate::resources::material::TransparencyMode;
use crate::resources::material::prepare::reflection;
use crate::resources::material::profile::{
    BindContext, EffectInterface, MaterialProfile, PrepareContext, SlotDesc, SlotReadiness,
    fallback_if_set,
};
use crate::resources::shader_defines::{DefineSet, DefineSetBuilder, DirtyFlags};
use crate::resources::texture::TextureRef;
use crate::resources::uniform_buffer::UniformBuffer;
use crate::scene::Scene;

pub(crate) const fn uv_slot(
    define: &'static str,
    direct_uv: &'static str,
    capability: CapabilityFlags,
    sampler: &'static str,
    infos: &'static str,
    matrix: &'static str,
) -> SlotDesc {
    SlotDesc {
        define,
        direct_uv: Some(direct_uv),
        capability,
        sampler,
        infos: Some(infos),
        matrix: Some(matrix),
        readiness: SlotReadiness::NotBlocking,
        needs_derivatives: false,
    }
}

pub(crate) static DIFFUSE_SLOT: SlotDesc = uv_slot(
    "DIFFUSE",
    "DIFFUSEDIRECTUV",
    CapabilityFlags::DIFFUSE_TEXTURE,
    "diffuseSampler",
    "vDiffuseInfos",
    "diffuseMatrix",
);
static DETAIL_SLOT: SlotDesc = uv_slot(
    "DETAIL",
    "DETAILDIRECTUV",
    CapabilityFlags::DETAIL_TEXTURE,
    "detailSampler",
    "vDetailInfos",
    "detailMatrix",
);
pub(crate) static AMBIENT_SLOT: SlotDesc = uv_slot(
    "AMBIENT",
    "AMBIENTDIRECTUV",
    CapabilityFlags::AMBIENT_TEXTURE,
    "ambientSampler",
    "vAmbientInfos",
    "ambientMatrix",
);
pub(crate) static OPACITY_SLOT: SlotDesc = uv_slot(
    "OPACITY",
    "OPACITYDIRECTUV",
    CapabilityFlags::OPACITY_TEXTURE,
    "opacitySampler",
    "vOpacityInfos",
    "opacityMatrix",
);
pub(crate) static REFLECTION_SLOT: SlotDesc = SlotDesc {
    define: "REFLECTION",
    direct_uv: None,
    capability: CapabilityFlags::REFLECTION_TEXTURE,
    sampler: "reflectionSampler",
    infos: Some("vReflectionInfos"),
    matrix: Some("reflectionMatrix"),
    readiness: SlotReadiness::NotBlocking,
    needs_derivatives: false,
};
pub(crate) static EMISSIVE_SLOT: SlotDesc = uv_slot(
    "EMISSIVE",
    "EMISSIVEDIRECTUV",
    CapabilityFlags::EMISSIVE_TEXTURE,
    "emissiveSampler",
    "vEmissiveInfos",
    "emissiveMatrix",
);
static SPECULAR_SLOT: SlotDesc = uv_slot(
    "SPECULAR",
    "SPECULARDIRECTUV",
    CapabilityFlags::SPECULAR_TEXTURE,
    "specularSampler",
    "vSpecularInfos",
    "specularMatrix",
);
pub(crate) static BUMP_SLOT: SlotDesc = SlotDesc {
    readiness: SlotReadiness::MustBeReady,
    needs_derivatives: true,
    ..uv_slot(
        "BUMP",
        "BUMPDIRECTUV",
        CapabilityFlags::BUMP_TEXTURE,
        "bumpSampler",
        "vBumpInfos",
        "bumpMatrix",
    )
};
pub(crate) static LIGHTMAP_SLOT: SlotDesc = uv_slot(
    "LIGHTMAP",
    "LIGHTMAPDIRECTUV",
    CapabilityFlags::LIGHTMAP_TEXTURE,
    "lightmapSampler",
    "vLightmapInfos",
    "lightmapMatrix",
);
static REFRACTION_SLOT: SlotDesc = SlotDesc {
    define: "REFRACTION",
    direct_uv: None,
    capability: CapabilityFlags::REFRACTION_TEXTURE,
    sampler: "refractionSampler",
    infos: Some("vRefractionInfos"),
    matrix: Some("refractionMatrix"),
    readiness: SlotReadiness::NotBlocking,
    needs_derivatives: false,
};

const TEXTURE_DEFINES: &[&str] = &[
    "ALPHAFROMDIFFUSE",
    "SPECULAROVERALPHA",
    "REFLECTIONOVERALPHA",
    "EMISSIVEASILLUMINATION",
    "LINKEMISSIVEWITHDIFFUSE",
    "GLOSSINESS",
    "PARALLAX",
    "PARALLAXOCCLUSION",
    "OBJECTSPACE_NORMALMAP",
    "TWOSIDEDLIGHTING",
    "INVERTNORMALMAPX",
    "INVERTNORMALMAPY",
    "USELIGHTMAPASSHADOWMAP",
    "RGBDLIGHTMAP",
    "REFRACTIONMAP_3D",
    "RGBDREFRACTION",
];

const FRESNEL_DEFINES: &[&str] = &[
    "FRESNEL",
    "DIFFUSEFRESNEL",
    "OPACITYFRESNEL",
    "REFLECTIONFRESNEL",
    "REFRACTIONFRESNEL",
    "EMISSIVEFRESNEL",
    "REFLECTIONFRESNELFROMSPECULAR",
];

/// Classic Blinn-Phong material family (`default` shader).
#[derive(Debug, Clone)]
pub struct StandardProfile {
    diffuse_texture: Option<TextureRef>,
    detail_texture: Option<TextureRef>,
    ambient_texture: Option<TextureRef>,
    opacity_texture: Option<TextureRef>,
    reflection_texture: Option<TextureRef>,
    emissive_texture: Option<TextureRef>,
    specular_texture: Option<TextureRef>,
    bump_texture: Option<TextureRef>,
    lightmap_texture: Option<TextureRef>,
    refraction_texture: Option<TextureRef>,

    ambient_color: Vec3,
    diffuse_color: Vec3,
    specular_color: Vec3,
    emissive_color: Vec3,
    specular_power: f32,

    use_alpha_from_diffuse_texture: bool,
    use_emissive_as_illumination: bool,
    link_emissive_with_diffuse: bool,
    use_specular_over_alpha: bool,
    use_reflection_over_alpha: bool,
    use_glossiness_from_specular_map_alpha: bool,
    use_parallax: bool,
    use_parallax_occlusion: bool,
    parallax_scale_bias: f32,
    use_object_space_normal_map: bool,
    two_sided_lighting: bool,
    invert_normal_map_x: bool,
    invert_normal_map_y: bool,
    use_lightmap_as_shadowmap: bool,
    index_of_refraction: f32,
    invert_refraction_y: bool,

    diffuse_fresnel: Option<FresnelParameters>,
    opacity_fresnel: Option<FresnelParameters>,
    reflection_fresnel: Option<FresnelParameters>,
    refraction_fresnel: Option<FresnelParameters>,
    emissive_fresnel: Option<FresnelParameters>,
    use_reflection_fresnel_from_specular: bool,

    dirty: DirtyFlags,
}

impl Default for StandardProfile {
    fn default() -> Self {
        Self {
            diffuse_texture: None,
            detail_texture: None,
            ambient_texture: None,
            opacity_texture: None,
            reflection_texture: None,
            emissive_texture: None,
            specular_texture: None,
            bump_texture: None,
            lightmap_texture: None,
            refraction_texture: None,
            ambient_color: Vec3::ZERO,
            diffuse_color: Vec3::ONE,
            specular_color: Vec3::ONE,
            emissive_color: Vec3::ZERO,
            specular_power: 64.0,
            use_alpha_from_diffuse_texture: false,
            use_emissive_as_illumination: false,
            link_emissive_with_diffuse: false,
            use_specular_over_alpha: false,
            use_reflection_over_alpha: false,
            use_glossiness_from_specular_map_alpha: false,
            use_parallax: false,
            use_parallax_occlusion: false,
            parallax_scale_bias: 0.05,
            use_object_space_normal_map: false,
            two_sided_lighting: false,
            invert_normal_map_x: false,
            invert_normal_map_y: false,
            use_lightmap_as_shadowmap: false,
            index_of_refraction: 0.98,
            invert_refraction_y: true,
            diffuse_fresnel: None,
            opacity_fresnel: None,
            reflection_fresnel: None,
            refraction_fresnel: None,
            emissive_fresnel: None,
            use_reflection_fresnel_from_specular: false,
            dirty: DirtyFlags::empty(),
        }
    }
}

impl_profile_api!(
    StandardProfile,
    textures: [
        (diffuse_texture,    DIFFUSE_SLOT,    "Base color; alpha may drive transparency."),
        (detail_texture,     DETAIL_SLOT,     "Detail map blended over the base color."),
        (ambient_texture,    AMBIENT_SLOT,    "Ambient occlusion."),
        (opacity_texture,    OPACITY_SLOT,    "Opacity; forces alpha blending."),
        (reflection_texture, REFLECTION_SLOT, "Environment reflection."),
        (emissive_texture,   EMISSIVE_SLOT,   "Emissive color."),
        (specular_texture,   SPECULAR_SLOT,   "Specular color, glossiness in alpha."),
        (bump_texture,       BUMP_SLOT,       "Normal map. Must be resident before drawing."),
        (lightmap_texture,   LIGHTMAP_SLOT,   "Baked lighting."),
        (refraction_texture, REFRACTION_SLOT, "Refraction source."),
    ],
    params: [
        (ambient_color,  Vec3, DirtyFlags::empty(), "Ambient color."),
        (diffuse_color,  Vec3, DirtyFlags::empty(), "Diffuse color."),
        (specular_color, Vec3, DirtyFlags::empty(), "Specular color."),
        (emissive_color, Vec3, DirtyFlags::empty(), "Emissive color."),
        (specular_power, f32,  DirtyFlags::empty(), "Specular exponent."),
        (use_alpha_from_diffuse_texture, bool, DirtyFlags::TEXTURES, "Take opacity from the diffuse alpha."),
        (use_emissive_as_illumination,   bool, DirtyFlags::TEXTURES, "Emissive map acts as illumination."),
        (link_emissive_with_diffuse,     bool, DirtyFlags::TEXTURES, "Emissive multiplies diffuse."),
        (use_specular_over_alpha,        bool, DirtyFlags::TEXTURES, "Specular is kept on transparent parts."),
        (use_reflection_over_alpha,      bool, DirtyFlags::TEXTURES, "Reflection is kept on transparent parts."),
        (use_glossiness_from_specular_map_alpha, bool, DirtyFlags::TEXTURES, "Glossiness from the specular map alpha."),
        (use_parallax,                   bool, DirtyFlags::TEXTURES, "Parallax mapping from the bump map."),
        (use_parallax_occlusion,         bool, DirtyFlags::TEXTURES, "Parallax occlusion mapping."),
        (parallax_scale_bias,            f32,  DirtyFlags::empty(),  "Parallax depth scale."),
        (use_object_space_normal_map,    bool, DirtyFlags::TEXTURES, "Bump map holds object-space normals."),
        (two_sided_lighting,             bool, DirtyFlags::TEXTURES, "Light back faces when culling is off."),
        (invert_normal_map_x,            bool, DirtyFlags::TEXTURES, "Flip the normal map X channel."),
        (invert_normal_map_y,            bool, DirtyFlags::TEXTURES, "Flip the normal map Y channel."),
        (use_lightmap_as_shadowmap,      bool, DirtyFlags::TEXTURES, "Lightmap only darkens."),
        (index_of_refraction,            f32,  DirtyFlags::empty(),  "Refraction index."),
        (invert_refraction_y,            bool, DirtyFlags::empty(),  "Flip the refraction lookup."),
        (diffuse_fresnel,    Option<FresnelParameters>, DirtyFlags::FRESNEL, "Diffuse fresnel."),
        (opacity_fresnel,    Option<FresnelParameters>, DirtyFlags::FRESNEL, "Opacity fresnel; forces alpha blending."),
        (reflection_fresnel, Option<FresnelParameters>, DirtyFlags::FRESNEL, "Reflection fresnel."),
        (refraction_fresnel, Option<FresnelParameters>, DirtyFlags::FRESNEL, "Refraction fresnel."),
        (emissive_fresnel,   Option<FresnelParameters>, DirtyFlags::FRESNEL, "Emissive fresnel."),
        (use_reflection_fresnel_from_specular, bool, DirtyFlags::FRESNEL, "Reflection fresnel scaled by specular."),
    ]
);

impl StandardProfile {
    fn uses_alpha_from_diffuse(&self, ctx: &PrepareContext<'_>) -> bool {
        self.use_alpha_from_diffuse_texture
            && self.diffuse_texture.as_ref().is_some_and(|t| t.has_alpha)
            && ctx.settings.transparency_mode != Some(TransparencyMode::Opaque)
    }
}

impl MaterialProfile for StandardProfile {
    fn shader_name(&self) -> &'static str {
        "default"
    }

    fn register_defines(&self, builder: &mut DefineSetBuilder) {
        reflection::register_defines(builder);
        builder
            .flags(TEXTURE_DEFINES, DirtyFlags::TEXTURES)
            .flags(FRESNEL_DEFINES, DirtyFlags::FRESNEL);
    }

    fn visit_slots(&self, _scene: &Scene, visitor: &mut dyn FnMut(&'static SlotDesc, Option<&TextureRef>)) {
        self.visit_slot_table(visitor);
    }

    fn prepare_texture_defines(&self, defines: &mut DefineSet, ctx: &PrepareContext<'_>) {
        let reflection = self
            .reflection_texture
            .as_deref()
            .filter(|_| defines.is_set("REFLECTION"));
        reflection::prepare_reflection_defines(defines, reflection, ctx.scene.right_handed());

        let bump = defines.is_set("BUMP");
        defines.set("PARALLAX", bump && self.use_parallax);
        defines.set("PARALLAXOCCLUSION", bump && self.use_parallax && self.use_parallax_occlusion);
        defines.set("OBJECTSPACE_NORMALMAP", bump && self.use_object_space_normal_map);
        defines.set("INVERTNORMALMAPX", bump && self.invert_normal_map_x);
        defines.set("INVERTNORMALMAPY", bump && self.invert_normal_map_y);

        let specular = defines.is_set("SPECULAR");
        defines.set("GLOSSINESS", specular && self.use_glossiness_from_specular_map_alpha);

        let lightmap = self.lightmap_texture.as_ref().filter(|_| defines.is_set("LIGHTMAP"));
        defines.set("USELIGHTMAPASSHADOWMAP", lightmap.is_some() && self.use_lightmap_as_shadowmap);
        defines.set("RGBDLIGHTMAP", lightmap.is_some_and(|t| t.is_rgbd));

        let refraction = self.refraction_texture.as_ref().filter(|_| defines.is_set("REFRACTION"));
        defines.set("REFRACTIONMAP_3D", refraction.is_some_and(|t| t.is_cube));
        defines.set("RGBDREFRACTION", refraction.is_some_and(|t| t.is_rgbd));

        defines.set("ALPHAFROMDIFFUSE", self.uses_alpha_from_diffuse(ctx));
        defines.set("SPECULAROVERALPHA", self.use_specular_over_alpha);
        defines.set("REFLECTIONOVERALPHA", self.use_reflection_over_alpha);
        defines.set("EMISSIVEASILLUMINATION", self.use_emissive_as_illumination);
        defines.set("LINKEMISSIVEWITHDIFFUSE", self.link_emissive_with_diffuse);
        defines.set(
            "TWOSIDEDLIGHTING",
            !ctx.settings.back_face_culling && self.two_sided_lighting,
        );

        defines.hints_mut().textures_need_normals = reflection.is_some() || bump || refraction.is_some();
    }

    fn prepare_defines(&self, defines: &mut DefineSet, ctx: &PrepareContext<'_>) {
        if !defines.is_concern_dirty(DirtyFlags::FRESNEL) {
            return;
        }
        let enabled = ctx.capabilities.is_enabled(CapabilityFlags::FRESNEL);
        let on = |params: Option<FresnelParameters>| enabled && FresnelParameters::active(params).is_some();

        let diffuse = on(self.diffuse_fresnel);
        let opacity = on(self.opacity_fresnel);
        let reflection = on(self.reflection_fresnel);
        let refraction = on(self.refraction_fresnel);
        let emissive = on(self.emissive_fresnel);
        let any = diffuse || opacity || reflection || refraction || emissive;

        defines.set("DIFFUSEFRESNEL", diffuse);
        defines.set("OPACITYFRESNEL", opacity);
        defines.set("REFLECTIONFRESNEL", reflection);
        defines.set("REFRACTIONFRESNEL", refraction);
        defines.set("EMISSIVEFRESNEL", emissive);
        defines.set(
            "REFLECTIONFRESNELFROMSPECULAR",
            reflection && self.use_reflection_fresnel_from_specular,
        );
        defines.set("FRESNEL", any);
        defines.hints_mut().profile_need_normals = any;
    }

    fn build_uniform_layout(&self, ubo: &mut UniformBuffer) {
        ubo.add_uniform("vAmbientColor", 3);
        ubo.add_uniform("vDiffuseColor", 4);
        ubo.add_uniform("vSpecularColor", 4);
        ubo.add_uniform("vEmissiveColor", 3);
        ubo.add_uniform("vTangentSpaceParams", 2);
        ubo.add_uniform("parallaxScaleBias", 1);
        ubo.add_uniform("vRefractionParams", 4);
        ubo.add_uniform("diffuseLeftColor", 4);
        ubo.add_uniform("diffuseRightColor", 4);
        ubo.add_uniform("opacityParts", 4);
        ubo.add_uniform("reflectionLeftColor", 4);
        ubo.add_uniform("reflectionRightColor", 4);
        ubo.add_uniform("refractionLeftColor", 4);
        ubo.add_uniform("refractionRightColor", 4);
        ubo.add_uniform("emissiveLeftColor", 4);
        ubo.add_uniform("emissiveRightColor", 4);
    }

    fn collect_interface(&self, _defines: &DefineSet, _iface: &mut EffectInterface) {}

    fn add_fallbacks(&self, defines: &DefineSet, chain: &mut FallbackChain) {
        for define in [
            "REFLECTION",
            "SPECULAR",
            "BUMP",
            "PARALLAXOCCLUSION",
            "SPECULAROVERALPHA",
            "SPECULARTERM",
        ] {
            fallback_if_set(defines, chain, 0, define);
        }
        fallback_if_set(defines, chain, 1, "PARALLAX");
        fallback_if_set(defines, chain, 1, "DIFFUSEFRESNEL");
        fallback_if_set(defines, chain, 2, "OPACITYFRESNEL");
        fallback_if_set(defines, chain, 3, "REFLECTIONFRESNEL");
        fallback_if_set(defines, chain, 4, "EMISSIVEFRESNEL");
        fallback_if_set(defines, chain, 4, "FRESNEL");
    }

    fn bind_material(&self, ubo: &mut UniformBuffer, ctx: &BindContext<'_>) {
        let defines = ctx.defines;

        if defines.is_set("FRESNEL") {
            if let Some(p) = FresnelParameters::active(self.diffuse_fresnel) {
                p.bind_colors(ubo, "diffuseLeftColor", "diffuseRightColor");
            }
            if let Some(p) = FresnelParameters::active(self.opacity_fresnel) {
                p.bind_parts(ubo, "opacityParts");
            }
            if let Some(p) = FresnelParameters::active(self.reflection_fresnel) {
                p.bind_colors(ubo, "reflectionLeftColor", "reflectionRightColor");
            }
            if let Some(p) = FresnelParameters::active(self.refraction_fresnel) {
                p.bind_colors(ubo, "refractionLeftColor", "refractionRightColor");
            }
            if let Some(p) = FresnelParameters::active(self.emissive_fresnel) {
                p.bind_colors(ubo, "emissiveLeftColor", "emissiveRightColor");
            }
        }

        if defines.is_set("BUMP") {
            let x = if self.invert_normal_map_x { -1.0 } else { 1.0 };
            let y = if self.invert_normal_map_y { -1.0 } else { 1.0 };
            ubo.update_float2("vTangentSpaceParams", x, y);
            ubo.update_float("parallaxScaleBias", self.parallax_scale_bias);
        }
        if let Some(tex) = self.refraction_texture.as_ref().filter(|_| defines.is_set("REFRACTION")) {
            let invert = if self.invert_refraction_y { -1.0 } else { 1.0 };
            ubo.update_float4("vRefractionParams", tex.level, self.index_of_refraction, 0.0, invert);
        }

        ubo.update_color3("vAmbientColor", self.ambient_color);
        ubo.update_color4("vDiffuseColor", self.diffuse_color, ctx.settings.alpha);
        if defines.is_set("SPECULARTERM") {
            ubo.update_color4("vSpecularColor", self.specular_color, self.specular_power);
        }
        ubo.update_color3("vEmissiveColor", self.emissive_color);
    }

    fn has_alpha_sources(&self) -> bool {
        self.opacity_texture.is_some()
            || (self.use_alpha_from_diffuse_texture && self.has_alpha_channel())
            || FresnelParameters::active(self.opacity_fresnel).is_some()
    }

    fn has_alpha_channel(&self) -> bool {
        self.diffuse_texture.as_ref().is_some_and(|t| t.has_alpha)
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
    fn test_texture_setter_marks_textures_once() {
        let mut profile = StandardProfile::default();
        let tex = Texture::new("diffuse").into_ref();
        profile.set_diffuse_texture(Some(tex.clone()));
        assert_eq!(profile.take_dirty(), DirtyFlags::TEXTURES);

        profile.set_diffuse_texture(Some(tex));
        assert!(profile.take_dirty().is_empty());
    }

    #[test]
    fn test_uniform_only_params_leave_defines_clean() {
        let mut profile = StandardProfile::default();
        profile.set_diffuse_color(Vec3::new(1.0, 0.0, 0.0));
        profile.set_specular_power(32.0);
        assert!(profile.take_dirty().is_empty());

        profile.set_emissive_fresnel(Some(FresnelParameters::default()));
        assert_eq!(profile.take_dirty(), DirtyFlags::FRESNEL);
    }

    #[test]
    fn test_alpha_sources() {
        let mut profile = StandardProfile::default();
        assert!(!profile.has_alpha_sources());
        profile.set_opacity_fresnel(Some(FresnelParameters::default()));
        assert!(profile.has_alpha_sources());

        profile.set_opacity_fresnel(Some(FresnelParameters {
            is_enabled: false,
            ..Default::default()
        }));
        assert!(!profile.has_alpha_sources());
    }
}
