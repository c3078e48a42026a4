//! Physically based material.
//!
//! The base layer (albedo, metallic/roughness or specular/glossiness,
//! environment BRDF) lives in [`PbrProfile`]. Optional lobes are separate
//! features stored as public fields, each tracking its own dirt:
//!
//! ```text
//! PbrProfile
//!  ├── clear_coat    CLEARCOAT_*
//!  ├── sheen         SHEEN_*
//!  ├── anisotropy    ANISOTROPIC_*
//!  ├── iridescence   IRIDESCENCE_*
//!  └── sub_surface   SS_*
//! ```

mod anisotropy;
mod clear_coat;
mod iridescence;
mod sheen;
mod sub_surface;

pub use anisotropy::AnisotropyFeature;
pub use clear_coat::ClearCoatFeature;
pub use iridescence::IridescenceFeature;
pub use sheen::SheenFeature;
pub use sub_surface::SubSurfaceFeature;

use glam::{Vec3, Vec4};

use crate::impl_profile_api;
use crate::renderer::pipeline::FallbackChain;
use crate::resources::capabilities::CapabilityFlags;
use crate::resources::material::TransparencyMode;
use crate::resources::material::prepare::reflection;
use crate::resources::material::profile::{
    BindContext, EffectInterface, MaterialProfile, PrepareContext, SlotDesc, SlotReadiness,
    fallback_if_set,
};
use crate::resources::material::standard::{
    AMBIENT_SLOT, BUMP_SLOT, EMISSIVE_SLOT, LIGHTMAP_SLOT, OPACITY_SLOT, REFLECTION_SLOT, uv_slot,
};
use crate::resources::shader_defines::{DefineSet, DefineSetBuilder, DirtyFlags};
use crate::resources::texture::TextureRef;
use crate::resources::uniform_buffer::UniformBuffer;
use crate::scene::Scene;

/// An optional lobe layered on the PBR base.
pub(crate) trait PbrFeature {
    fn register_defines(&self, builder: &mut DefineSetBuilder);

    /// Visits the feature's slots; textures are hidden while it is disabled.
    fn visit_slots(&self, visitor: &mut dyn FnMut(&'static SlotDesc, Option<&TextureRef>));

    /// Runs with the texture pass.
    fn prepare_defines(&self, defines: &mut DefineSet, ctx: &PrepareContext<'_>);

    fn build_uniform_layout(&self, ubo: &mut UniformBuffer);

    fn bind(&self, ubo: &mut UniformBuffer, ctx: &BindContext<'_>);

    fn add_fallbacks(&self, defines: &DefineSet, chain: &mut FallbackChain);

    fn take_dirty(&mut self) -> DirtyFlags;
}

static ALBEDO_SLOT: SlotDesc = uv_slot(
    "ALBEDO",
    "ALBEDODIRECTUV",
    CapabilityFlags::DIFFUSE_TEXTURE,
    "albedoSampler",
    "vAlbedoInfos",
    "albedoMatrix",
);
static REFLECTIVITY_SLOT: SlotDesc = uv_slot(
    "REFLECTIVITY",
    "REFLECTIVITYDIRECTUV",
    CapabilityFlags::SPECULAR_TEXTURE,
    "reflectivitySampler",
    "vReflectivityInfos",
    "reflectivityMatrix",
);
static METALLIC_REFLECTANCE_SLOT: SlotDesc = uv_slot(
    "METALLIC_REFLECTANCE",
    "METALLIC_REFLECTANCEDIRECTUV",
    CapabilityFlags::SPECULAR_TEXTURE,
    "metallicReflectanceSampler",
    "vMetallicReflectanceInfos",
    "metallicReflectanceMatrix",
);
static REFLECTANCE_SLOT: SlotDesc = uv_slot(
    "REFLECTANCE",
    "REFLECTANCEDIRECTUV",
    CapabilityFlags::SPECULAR_TEXTURE,
    "reflectanceSampler",
    "vReflectanceInfos",
    "reflectanceMatrix",
);
static MICROSURFACE_SLOT: SlotDesc = uv_slot(
    "MICROSURFACEMAP",
    "MICROSURFACEMAPDIRECTUV",
    CapabilityFlags::SPECULAR_TEXTURE,
    "microSurfaceSampler",
    "vMicroSurfaceSamplerInfos",
    "microSurfaceSamplerMatrix",
);
static ENVIRONMENT_BRDF_SLOT: SlotDesc = SlotDesc {
    define: "ENVIRONMENTBRDF",
    direct_uv: None,
    capability: CapabilityFlags::REFLECTION_TEXTURE,
    sampler: "environmentBrdfSampler",
    infos: None,
    matrix: None,
    readiness: SlotReadiness::MustBeReady,
    needs_derivatives: false,
};

const TEXTURE_DEFINES: &[&str] = &[
    "GAMMAALBEDO",
    "ALPHAFROMALBEDO",
    "METALLICWORKFLOW",
    "ROUGHNESSSTOREINMETALMAPALPHA",
    "ROUGHNESSSTOREINMETALMAPGREEN",
    "METALLNESSSTOREINMETALMAPBLUE",
    "AOSTOREINMETALMAPRED",
    "METALLIC_REFLECTANCE_USE_ALPHA_ONLY",
    "MICROSURFACEFROMREFLECTIVITYMAP",
    "AMBIENTINGRAYSCALE",
    "SPECULAROVERALPHA",
    "RADIANCEOVERALPHA",
    "HORIZONOCCLUSION",
    "RADIANCEOCCLUSION",
    "SPECULARAA",
    "PARALLAX",
    "PARALLAXOCCLUSION",
    "OBJECTSPACE_NORMALMAP",
    "INVERTNORMALMAPX",
    "INVERTNORMALMAPY",
    "TWOSIDEDLIGHTING",
    "USELIGHTMAPASSHADOWMAP",
    "RGBDLIGHTMAP",
    "ENVIRONMENTBRDF_RGBD",
    "FORCEIRRADIANCEINFRAGMENT",
];

const MISC_DEFINES: &[&str] = &[
    "USEPHYSICALLIGHTFALLOFF",
    "USEGLTFLIGHTFALLOFF",
    "BRDF_V_HEIGHT_CORRELATED",
    "MS_BRDF_ENERGY_CONSERVATION",
    "SPHERICAL_HARMONICS",
    "SPECULAR_GLOSSINESS_ENERGY_CONSERVATION",
    "UNLIT",
];

/// Physically based material family (`pbr` shader).
#[derive(Debug, Clone)]
pub struct PbrProfile {
    albedo_texture: Option<TextureRef>,
    ambient_texture: Option<TextureRef>,
    opacity_texture: Option<TextureRef>,
    reflection_texture: Option<TextureRef>,
    emissive_texture: Option<TextureRef>,
    reflectivity_texture: Option<TextureRef>,
    metallic_reflectance_texture: Option<TextureRef>,
    reflectance_texture: Option<TextureRef>,
    micro_surface_texture: Option<TextureRef>,
    bump_texture: Option<TextureRef>,
    lightmap_texture: Option<TextureRef>,

    albedo_color: Vec3,
    reflectivity_color: Vec3,
    reflection_color: Vec3,
    emissive_color: Vec3,
    ambient_color: Vec3,
    micro_surface: f32,
    metallic: Option<f32>,
    roughness: Option<f32>,
    metallic_f0_factor: f32,
    metallic_reflectance_color: Vec3,
    index_of_refraction: f32,
    ambient_texture_strength: f32,
    direct_intensity: f32,
    emissive_intensity: f32,
    environment_intensity: f32,
    specular_intensity: f32,
    parallax_scale_bias: f32,

    use_alpha_from_albedo_texture: bool,
    use_roughness_from_metallic_texture_alpha: bool,
    use_roughness_from_metallic_texture_green: bool,
    use_metallness_from_metallic_texture_blue: bool,
    use_ambient_occlusion_from_metallic_texture_red: bool,
    use_only_metallic_from_metallic_reflectance_texture: bool,
    use_micro_surface_from_reflectivity_map_alpha: bool,
    use_ambient_in_grayscale: bool,
    use_specular_over_alpha: bool,
    use_radiance_over_alpha: bool,
    use_horizon_occlusion: bool,
    use_radiance_occlusion: bool,
    enable_specular_anti_aliasing: bool,
    use_parallax: bool,
    use_parallax_occlusion: bool,
    use_object_space_normal_map: bool,
    invert_normal_map_x: bool,
    invert_normal_map_y: bool,
    two_sided_lighting: bool,
    use_lightmap_as_shadowmap: bool,
    force_irradiance_in_fragment: bool,
    use_environment_brdf: bool,

    use_physical_light_falloff: bool,
    use_gltf_light_falloff: bool,
    use_smith_visibility_height_correlated: bool,
    use_energy_conservation: bool,
    use_spherical_harmonics: bool,
    unlit: bool,

    pub clear_coat: ClearCoatFeature,
    pub sheen: SheenFeature,
    pub anisotropy: AnisotropyFeature,
    pub iridescence: IridescenceFeature,
    pub sub_surface: SubSurfaceFeature,

    dirty: DirtyFlags,
}

impl Default for PbrProfile {
    fn default() -> Self {
        Self {
            albedo_texture: None,
            ambient_texture: None,
            opacity_texture: None,
            reflection_texture: None,
            emissive_texture: None,
            reflectivity_texture: None,
            metallic_reflectance_texture: None,
            reflectance_texture: None,
            micro_surface_texture: None,
            bump_texture: None,
            lightmap_texture: None,
            albedo_color: Vec3::ONE,
            reflectivity_color: Vec3::ONE,
            reflection_color: Vec3::ONE,
            emissive_color: Vec3::ZERO,
            ambient_color: Vec3::ZERO,
            micro_surface: 1.0,
            metallic: None,
            roughness: None,
            metallic_f0_factor: 1.0,
            metallic_reflectance_color: Vec3::ONE,
            index_of_refraction: 1.5,
            ambient_texture_strength: 1.0,
            direct_intensity: 1.0,
            emissive_intensity: 1.0,
            environment_intensity: 1.0,
            specular_intensity: 1.0,
            parallax_scale_bias: 0.05,
            use_alpha_from_albedo_texture: false,
            use_roughness_from_metallic_texture_alpha: true,
            use_roughness_from_metallic_texture_green: false,
            use_metallness_from_metallic_texture_blue: false,
            use_ambient_occlusion_from_metallic_texture_red: false,
            use_only_metallic_from_metallic_reflectance_texture: false,
            use_micro_surface_from_reflectivity_map_alpha: false,
            use_ambient_in_grayscale: false,
            use_specular_over_alpha: true,
            use_radiance_over_alpha: true,
            use_horizon_occlusion: true,
            use_radiance_occlusion: true,
            enable_specular_anti_aliasing: false,
            use_parallax: false,
            use_parallax_occlusion: false,
            use_object_space_normal_map: false,
            invert_normal_map_x: false,
            invert_normal_map_y: false,
            two_sided_lighting: false,
            use_lightmap_as_shadowmap: false,
            force_irradiance_in_fragment: false,
            use_environment_brdf: true,
            use_physical_light_falloff: true,
            use_gltf_light_falloff: false,
            use_smith_visibility_height_correlated: true,
            use_energy_conservation: true,
            use_spherical_harmonics: true,
            unlit: false,
            clear_coat: ClearCoatFeature::default(),
            sheen: SheenFeature::default(),
            anisotropy: AnisotropyFeature::default(),
            iridescence: IridescenceFeature::default(),
            sub_surface: SubSurfaceFeature::default(),
            dirty: DirtyFlags::empty(),
        }
    }
}

impl_profile_api!(
    PbrProfile,
    textures: [
        (albedo_texture,               ALBEDO_SLOT,               "Base color."),
        (ambient_texture,              AMBIENT_SLOT,              "Ambient occlusion."),
        (opacity_texture,              OPACITY_SLOT,              "Opacity; forces alpha blending."),
        (reflection_texture,           REFLECTION_SLOT,           "Environment; the scene environment is used when unset."),
        (emissive_texture,             EMISSIVE_SLOT,             "Emissive color."),
        (reflectivity_texture,         REFLECTIVITY_SLOT,         "Metallic/roughness or specular/glossiness map."),
        (metallic_reflectance_texture, METALLIC_REFLECTANCE_SLOT, "F0 color and factor."),
        (reflectance_texture,          REFLECTANCE_SLOT,          "F0 color only."),
        (micro_surface_texture,        MICROSURFACE_SLOT,         "Glossiness."),
        (bump_texture,                 BUMP_SLOT,                 "Normal map. Must be resident before drawing."),
        (lightmap_texture,             LIGHTMAP_SLOT,             "Baked lighting."),
    ],
    params: [
        (albedo_color,               Vec3,        DirtyFlags::empty(),  "Base color."),
        (reflectivity_color,         Vec3,        DirtyFlags::empty(),  "Specular color in the specular workflow."),
        (reflection_color,           Vec3,        DirtyFlags::empty(),  "Environment tint."),
        (emissive_color,             Vec3,        DirtyFlags::empty(),  "Emissive color."),
        (ambient_color,              Vec3,        DirtyFlags::empty(),  "Ambient color."),
        (micro_surface,              f32,         DirtyFlags::empty(),  "Glossiness in the specular workflow."),
        (metallic,                   Option<f32>, DirtyFlags::TEXTURES, "Metalness; any value selects the metallic workflow."),
        (roughness,                  Option<f32>, DirtyFlags::TEXTURES, "Roughness; any value selects the metallic workflow."),
        (metallic_f0_factor,         f32,         DirtyFlags::empty(),  "F0 factor for dielectrics."),
        (metallic_reflectance_color, Vec3,        DirtyFlags::empty(),  "F0 color for dielectrics."),
        (index_of_refraction,        f32,         DirtyFlags::empty(),  "Index of refraction."),
        (ambient_texture_strength,   f32,         DirtyFlags::empty(),  "Ambient occlusion strength."),
        (direct_intensity,           f32,         DirtyFlags::empty(),  "Direct lighting scale."),
        (emissive_intensity,         f32,         DirtyFlags::empty(),  "Emissive scale."),
        (environment_intensity,      f32,         DirtyFlags::empty(),  "Environment lighting scale."),
        (specular_intensity,         f32,         DirtyFlags::empty(),  "Specular scale."),
        (parallax_scale_bias,        f32,         DirtyFlags::empty(),  "Parallax depth scale."),
        (use_alpha_from_albedo_texture,                       bool, DirtyFlags::TEXTURES, "Take opacity from the albedo alpha."),
        (use_roughness_from_metallic_texture_alpha,           bool, DirtyFlags::TEXTURES, "Roughness in the metallic map alpha."),
        (use_roughness_from_metallic_texture_green,           bool, DirtyFlags::TEXTURES, "Roughness in the metallic map green."),
        (use_metallness_from_metallic_texture_blue,           bool, DirtyFlags::TEXTURES, "Metalness in the metallic map blue."),
        (use_ambient_occlusion_from_metallic_texture_red,     bool, DirtyFlags::TEXTURES, "Occlusion in the metallic map red."),
        (use_only_metallic_from_metallic_reflectance_texture, bool, DirtyFlags::TEXTURES, "Read only the factor from the metallic reflectance map."),
        (use_micro_surface_from_reflectivity_map_alpha,       bool, DirtyFlags::TEXTURES, "Glossiness in the reflectivity map alpha."),
        (use_ambient_in_grayscale,                            bool, DirtyFlags::TEXTURES, "Ambient map is grayscale."),
        (use_specular_over_alpha,                             bool, DirtyFlags::TEXTURES, "Specular is kept on transparent parts."),
        (use_radiance_over_alpha,                             bool, DirtyFlags::TEXTURES, "Radiance is kept on transparent parts."),
        (use_horizon_occlusion,                               bool, DirtyFlags::TEXTURES, "Horizon occlusion from the normal map."),
        (use_radiance_occlusion,                              bool, DirtyFlags::TEXTURES, "Radiance occlusion from the ambient map."),
        (enable_specular_anti_aliasing,                       bool, DirtyFlags::TEXTURES, "Geometric specular anti-aliasing."),
        (use_parallax,                                        bool, DirtyFlags::TEXTURES, "Parallax mapping from the bump map."),
        (use_parallax_occlusion,                              bool, DirtyFlags::TEXTURES, "Parallax occlusion mapping."),
        (use_object_space_normal_map,                         bool, DirtyFlags::TEXTURES, "Bump map holds object-space normals."),
        (invert_normal_map_x,                                 bool, DirtyFlags::TEXTURES, "Flip the normal map X channel."),
        (invert_normal_map_y,                                 bool, DirtyFlags::TEXTURES, "Flip the normal map Y channel."),
        (two_sided_lighting,                                  bool, DirtyFlags::TEXTURES, "Light back faces when culling is off."),
        (use_lightmap_as_shadowmap,                           bool, DirtyFlags::TEXTURES, "Lightmap only darkens."),
        (force_irradiance_in_fragment,                        bool, DirtyFlags::TEXTURES, "Evaluate irradiance per fragment."),
        (use_environment_brdf,                                bool, DirtyFlags::TEXTURES, "Sample the scene BRDF lookup table."),
        (use_physical_light_falloff,             bool, DirtyFlags::MISC, "Inverse-square light falloff."),
        (use_gltf_light_falloff,                 bool, DirtyFlags::MISC, "glTF light falloff."),
        (use_smith_visibility_height_correlated, bool, DirtyFlags::MISC, "Height-correlated Smith visibility."),
        (use_energy_conservation,                bool, DirtyFlags::MISC, "Multi-scattering energy conservation."),
        (use_spherical_harmonics,                bool, DirtyFlags::MISC, "Irradiance from spherical harmonics."),
        (unlit,                                  bool, DirtyFlags::MISC, "Skip lighting entirely."),
    ]
);

impl PbrProfile {
    fn effective_reflection<'a>(&'a self, scene: &'a Scene) -> Option<&'a TextureRef> {
        self.reflection_texture
            .as_ref()
            .or(scene.environment().environment_texture.as_ref())
    }

    fn environment_brdf<'a>(&self, scene: &'a Scene) -> Option<&'a TextureRef> {
        if self.use_environment_brdf {
            scene.environment().environment_brdf_texture.as_ref()
        } else {
            None
        }
    }

    /// Metallic/roughness workflow when either value is given.
    #[must_use]
    pub fn is_metallic_workflow(&self) -> bool {
        self.metallic.is_some() || self.roughness.is_some()
    }

    fn features(&self) -> [&dyn PbrFeature; 5] {
        [
            &self.clear_coat,
            &self.sheen,
            &self.anisotropy,
            &self.iridescence,
            &self.sub_surface,
        ]
    }

    fn prepare_workflow_defines(&self, defines: &mut DefineSet) {
        let metallic_workflow = self.is_metallic_workflow();
        let reflectivity = defines.is_set("REFLECTIVITY");
        let metal_map = reflectivity && metallic_workflow;

        defines.set("METALLICWORKFLOW", metallic_workflow);
        defines.set(
            "ROUGHNESSSTOREINMETALMAPALPHA",
            metal_map && self.use_roughness_from_metallic_texture_alpha,
        );
        defines.set(
            "ROUGHNESSSTOREINMETALMAPGREEN",
            metal_map
                && !self.use_roughness_from_metallic_texture_alpha
                && self.use_roughness_from_metallic_texture_green,
        );
        defines.set(
            "METALLNESSSTOREINMETALMAPBLUE",
            metal_map && self.use_metallness_from_metallic_texture_blue,
        );
        defines.set(
            "AOSTOREINMETALMAPRED",
            metal_map && self.use_ambient_occlusion_from_metallic_texture_red,
        );
        defines.set(
            "MICROSURFACEFROMREFLECTIVITYMAP",
            reflectivity && !metallic_workflow && self.use_micro_surface_from_reflectivity_map_alpha,
        );
        defines.set(
            "METALLIC_REFLECTANCE_USE_ALPHA_ONLY",
            defines.is_set("METALLIC_REFLECTANCE") && self.use_only_metallic_from_metallic_reflectance_texture,
        );
    }

    fn prepare_bump_defines(&self, defines: &mut DefineSet, ctx: &PrepareContext<'_>) {
        let bump = defines.is_set("BUMP");
        defines.set("PARALLAX", bump && self.use_parallax);
        defines.set("PARALLAXOCCLUSION", bump && self.use_parallax && self.use_parallax_occlusion);
        defines.set("OBJECTSPACE_NORMALMAP", bump && self.use_object_space_normal_map);
        defines.set("INVERTNORMALMAPX", bump && self.invert_normal_map_x);
        defines.set("INVERTNORMALMAPY", bump && self.invert_normal_map_y);
        defines.set("HORIZONOCCLUSION", bump && self.use_horizon_occlusion);
        defines.set(
            "SPECULARAA",
            ctx.caps.standard_derivatives && self.enable_specular_anti_aliasing,
        );
    }
}

impl MaterialProfile for PbrProfile {
    fn shader_name(&self) -> &'static str {
        "pbr"
    }

    fn register_defines(&self, builder: &mut DefineSetBuilder) {
        reflection::register_defines(builder);
        builder
            .flags(TEXTURE_DEFINES, DirtyFlags::TEXTURES)
            .flags(MISC_DEFINES, DirtyFlags::MISC);
        for feature in self.features() {
            feature.register_defines(builder);
        }
    }

    fn visit_slots(&self, scene: &Scene, visitor: &mut dyn FnMut(&'static SlotDesc, Option<&TextureRef>)) {
        visitor(&ALBEDO_SLOT, self.albedo_texture.as_ref());
        visitor(&AMBIENT_SLOT, self.ambient_texture.as_ref());
        visitor(&OPACITY_SLOT, self.opacity_texture.as_ref());
        visitor(&REFLECTION_SLOT, self.effective_reflection(scene));
        visitor(&EMISSIVE_SLOT, self.emissive_texture.as_ref());
        visitor(&REFLECTIVITY_SLOT, self.reflectivity_texture.as_ref());
        visitor(&METALLIC_REFLECTANCE_SLOT, self.metallic_reflectance_texture.as_ref());
        visitor(&REFLECTANCE_SLOT, self.reflectance_texture.as_ref());
        visitor(&MICROSURFACE_SLOT, self.micro_surface_texture.as_ref());
        visitor(&BUMP_SLOT, self.bump_texture.as_ref());
        visitor(&LIGHTMAP_SLOT, self.lightmap_texture.as_ref());
        visitor(&ENVIRONMENT_BRDF_SLOT, self.environment_brdf(scene));
        for feature in self.features() {
            feature.visit_slots(visitor);
        }
    }

    fn prepare_texture_defines(&self, defines: &mut DefineSet, ctx: &PrepareContext<'_>) {
        let reflection = self
            .effective_reflection(ctx.scene)
            .map(|t| &**t)
            .filter(|_| defines.is_set("REFLECTION"));
        reflection::prepare_reflection_defines(defines, reflection, ctx.scene.right_handed());

        let albedo = self.albedo_texture.as_ref().filter(|_| defines.is_set("ALBEDO"));
        defines.set("GAMMAALBEDO", albedo.is_some_and(|t| t.gamma_space));
        defines.set(
            "ALPHAFROMALBEDO",
            albedo.is_some_and(|t| t.has_alpha)
                && self.use_alpha_from_albedo_texture
                && ctx.settings.transparency_mode != Some(TransparencyMode::Opaque),
        );

        self.prepare_workflow_defines(defines);
        self.prepare_bump_defines(defines, ctx);

        defines.set(
            "AMBIENTINGRAYSCALE",
            defines.is_set("AMBIENT") && self.use_ambient_in_grayscale,
        );
        defines.set(
            "RADIANCEOCCLUSION",
            defines.is_set("AMBIENT") && self.use_radiance_occlusion,
        );
        defines.set("SPECULAROVERALPHA", self.use_specular_over_alpha);
        defines.set("RADIANCEOVERALPHA", self.use_radiance_over_alpha);
        defines.set(
            "TWOSIDEDLIGHTING",
            !ctx.settings.back_face_culling && self.two_sided_lighting,
        );
        defines.set("FORCEIRRADIANCEINFRAGMENT", self.force_irradiance_in_fragment);

        let lightmap = self.lightmap_texture.as_ref().filter(|_| defines.is_set("LIGHTMAP"));
        defines.set("USELIGHTMAPASSHADOWMAP", lightmap.is_some() && self.use_lightmap_as_shadowmap);
        defines.set("RGBDLIGHTMAP", lightmap.is_some_and(|t| t.is_rgbd));

        let brdf = self
            .environment_brdf(ctx.scene)
            .filter(|_| defines.is_set("ENVIRONMENTBRDF"));
        defines.set("ENVIRONMENTBRDF_RGBD", brdf.is_some_and(|t| t.is_rgbd));

        for feature in self.features() {
            feature.prepare_defines(defines, ctx);
        }

        defines.hints_mut().textures_need_normals = true;
    }

    fn prepare_defines(&self, defines: &mut DefineSet, _ctx: &PrepareContext<'_>) {
        defines.set("UNLIT", self.unlit);
        defines.set("USEPHYSICALLIGHTFALLOFF", self.use_physical_light_falloff && !self.use_gltf_light_falloff);
        defines.set("USEGLTFLIGHTFALLOFF", self.use_gltf_light_falloff);
        defines.set("BRDF_V_HEIGHT_CORRELATED", self.use_smith_visibility_height_correlated);
        defines.set(
            "MS_BRDF_ENERGY_CONSERVATION",
            self.use_energy_conservation && defines.is_set("ENVIRONMENTBRDF"),
        );
        defines.set(
            "SPECULAR_GLOSSINESS_ENERGY_CONSERVATION",
            self.use_energy_conservation && !self.is_metallic_workflow(),
        );
        defines.set(
            "SPHERICAL_HARMONICS",
            self.use_spherical_harmonics && defines.is_set("REFLECTION"),
        );
        defines.hints_mut().profile_need_normals = true;
    }

    fn build_uniform_layout(&self, ubo: &mut UniformBuffer) {
        ubo.add_uniform("vAlbedoColor", 4);
        ubo.add_uniform("vLightingIntensity", 4);
        ubo.add_uniform("vReflectivityColor", 4);
        ubo.add_uniform("vMetallicReflectanceFactors", 4);
        ubo.add_uniform("vEmissiveColor", 3);
        ubo.add_uniform("vAmbientColor", 3);
        ubo.add_uniform("vAmbientStrength", 1);
        ubo.add_uniform("vReflectionColor", 3);
        ubo.add_uniform("vReflectionMicrosurfaceInfos", 3);
        ubo.add_uniform("vTangentSpaceParams", 2);
        ubo.add_uniform("parallaxScaleBias", 1);
        ubo.add_uniform("alphaCutOff", 1);
        for feature in self.features() {
            feature.build_uniform_layout(ubo);
        }
    }

    fn collect_interface(&self, _defines: &DefineSet, iface: &mut EffectInterface) {
        iface.uniforms(&["vSphericalL00", "vSphericalL1_1", "vSphericalL10", "vSphericalL11"]);
    }

    fn add_fallbacks(&self, defines: &DefineSet, chain: &mut FallbackChain) {
        for define in [
            "ENVIRONMENTBRDF",
            "BUMP",
            "PARALLAXOCCLUSION",
            "SPECULAROVERALPHA",
            "RADIANCEOVERALPHA",
            "SPECULARAA",
            "MS_BRDF_ENERGY_CONSERVATION",
        ] {
            fallback_if_set(defines, chain, 0, define);
        }
        fallback_if_set(defines, chain, 1, "PARALLAX");
        for feature in self.features() {
            feature.add_fallbacks(defines, chain);
        }
    }

    fn bind_material(&self, ubo: &mut UniformBuffer, ctx: &BindContext<'_>) {
        let defines = ctx.defines;

        if defines.is_set("REFLECTION") {
            ubo.update_color3("vReflectionColor", self.reflection_color);
            let size = self
                .effective_reflection(ctx.scene)
                .and_then(|t| t.bounding_box_size)
                .map_or(1.0, |s| s.max_element());
            ubo.update_float3("vReflectionMicrosurfaceInfos", size, 0.8, 0.0);
        }
        if defines.is_set("BUMP") {
            let x = if self.invert_normal_map_x { -1.0 } else { 1.0 };
            let y = if self.invert_normal_map_y { -1.0 } else { 1.0 };
            ubo.update_float2("vTangentSpaceParams", x, y);
            ubo.update_float("parallaxScaleBias", self.parallax_scale_bias);
        }
        if defines.is_set("AMBIENT") {
            ubo.update_float("vAmbientStrength", self.ambient_texture_strength);
        }

        if self.is_metallic_workflow() {
            ubo.update_float4(
                "vReflectivityColor",
                self.metallic.unwrap_or(1.0),
                self.roughness.unwrap_or(1.0),
                0.0,
                0.0,
            );
            let f0 = ((self.index_of_refraction - 1.0) / (self.index_of_refraction + 1.0)).powi(2);
            ubo.update_vec4(
                "vMetallicReflectanceFactors",
                (self.metallic_reflectance_color * f0).extend(self.metallic_f0_factor),
            );
        } else {
            ubo.update_color4("vReflectivityColor", self.reflectivity_color, self.micro_surface);
        }

        ubo.update_color3("vEmissiveColor", self.emissive_color);
        ubo.update_color3("vAmbientColor", self.ambient_color);
        ubo.update_color4("vAlbedoColor", self.albedo_color, ctx.settings.alpha);
        ubo.update_vec4(
            "vLightingIntensity",
            Vec4::new(
                self.direct_intensity,
                self.emissive_intensity,
                self.environment_intensity,
                self.specular_intensity,
            ),
        );
        ubo.update_float("alphaCutOff", ctx.settings.alpha_cut_off);

        for feature in self.features() {
            feature.bind(ubo, ctx);
        }
    }

    fn has_alpha_sources(&self) -> bool {
        self.has_alpha_channel()
    }

    fn has_alpha_channel(&self) -> bool {
        self.albedo_texture
            .as_ref()
            .is_some_and(|t| t.has_alpha && self.use_alpha_from_albedo_texture)
            || self.opacity_texture.is_some()
    }

    fn disable_alpha_blending(&self) -> bool {
        self.sub_surface.disables_alpha_blending()
    }

    fn take_dirty(&mut self) -> DirtyFlags {
        let mut dirty = self.take_dirty_flags();
        dirty |= self.clear_coat.take_dirty();
        dirty |= self.sheen.take_dirty();
        dirty |= self.anisotropy.take_dirty();
        dirty |= self.iridescence.take_dirty();
        dirty |= self.sub_surface.take_dirty();
        dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::material::MaterialSettings;
    use crate::resources::texture::Texture;

    #[test]
    fn test_feature_edits_reach_profile_dirt() {
        let mut profile = PbrProfile::default();
        profile.clear_coat.set_is_enabled(true);
        profile.sheen.set_intensity(0.5);
        assert_eq!(profile.take_dirty(), DirtyFlags::TEXTURES);
        assert!(profile.take_dirty().is_empty());
    }

    #[test]
    fn test_metallic_workflow_selection() {
        let mut profile = PbrProfile::default();
        assert!(!profile.is_metallic_workflow());
        profile.set_roughness(Some(0.4));
        assert!(profile.is_metallic_workflow());
        assert_eq!(profile.take_dirty(), DirtyFlags::TEXTURES);
    }

    #[test]
    fn test_refraction_link_disables_blending() {
        let mut profile = PbrProfile::default();
        let settings = MaterialSettings {
            alpha: 0.5,
            ..Default::default()
        };
        assert!(profile.need_alpha_blending(&settings));

        profile.sub_surface.set_is_refraction_enabled(true);
        profile.sub_surface.set_link_refraction_with_transparency(true);
        assert!(!profile.need_alpha_blending(&settings));
    }

    #[test]
    fn test_alpha_from_albedo_requires_opt_in() {
        let mut profile = PbrProfile::default();
        let mut tex = Texture::new("albedo");
        tex.has_alpha = true;
        profile.set_albedo_texture(Some(tex.into_ref()));
        assert!(!profile.has_alpha_channel());

        profile.set_use_alpha_from_albedo_texture(true);
        assert!(profile.has_alpha_channel());
    }
}
