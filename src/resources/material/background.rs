//! Background / skybox / ground material.
//!
//! Only two slots. The reflection slot falls back to the scene's
//! environment texture when the profile has none of its own.

use glam::{Vec3, Vec4};

use crate::impl_profile_api;
use crate::renderer::pipeline::FallbackChain;
use crate::resources::material::MaterialSettings;
use crate::resources::material::prepare::reflection;
use crate::resources::material::profile::{
    BindContext, EffectInterface, MaterialProfile, PrepareContext, SlotDesc, fallback_if_set,
};
use crate::resources::material::standard::{DIFFUSE_SLOT, REFLECTION_SLOT};
use crate::resources::shader_defines::{DefineSet, DefineSetBuilder, DirtyFlags};
use crate::resources::texture::TextureRef;
use crate::resources::uniform_buffer::UniformBuffer;
use crate::scene::Scene;

const BACKGROUND_DEFINES: &[&str] = &[
    "DIFFUSEHASALPHA",
    "GAMMADIFFUSE",
    "OPACITYFRESNEL",
    "REFLECTIONBLUR",
    "REFLECTIONFRESNEL",
    "REFLECTIONFALLOFF",
    "REFLECTIONBGR",
    "EQUIRECTANGULAR_RELFECTION_FOV",
    "TEXTURELODSUPPORT",
    "PREMULTIPLYALPHA",
    "USERGBCOLOR",
    "USEHIGHLIGHTANDSHADOWCOLORSINSHADER",
    "BACKMAT_SHADOWONLY",
    "NOISE",
    "PROJECTED_GROUND",
];

#[derive(Debug, Clone)]
pub struct BackgroundProfile {
    diffuse_texture: Option<TextureRef>,
    reflection_texture: Option<TextureRef>,

    primary_color: Vec3,
    primary_color_shadow_level: f32,
    primary_color_highlight_level: f32,
    shadow_level: f32,
    shadow_only: bool,
    reflection_blur: f32,
    reflection_fresnel: bool,
    reflection_falloff_distance: f32,
    reflection_amount: f32,
    reflection_reflectance0: f32,
    reflection_reflectance90: f32,
    reflection_bgr: bool,
    use_equirectangular_fov: bool,
    fov_multiplier: f32,
    opacity_fresnel: bool,
    enable_noise: bool,
    use_rgb_color: bool,
    premultiply_alpha: bool,
    scene_center: Vec3,
    enable_ground_projection: bool,
    projected_ground_radius: f32,
    projected_ground_height: f32,

    dirty: DirtyFlags,
}

impl Default for BackgroundProfile {
    fn default() -> Self {
        Self {
            diffuse_texture: None,
            reflection_texture: None,
            primary_color: Vec3::ONE,
            primary_color_shadow_level: 0.0,
            primary_color_highlight_level: 0.0,
            shadow_level: 0.0,
            shadow_only: false,
            reflection_blur: 0.0,
            reflection_fresnel: false,
            reflection_falloff_distance: 0.0,
            reflection_amount: 1.0,
            reflection_reflectance0: 0.05,
            reflection_reflectance90: 0.5,
            reflection_bgr: false,
            use_equirectangular_fov: false,
            fov_multiplier: 1.0,
            opacity_fresnel: true,
            enable_noise: false,
            use_rgb_color: true,
            premultiply_alpha: false,
            scene_center: Vec3::ZERO,
            enable_ground_projection: false,
            projected_ground_radius: 1000.0,
            projected_ground_height: 10.0,
            dirty: DirtyFlags::empty(),
        }
    }
}

impl_profile_api!(
    BackgroundProfile,
    textures: [
        (diffuse_texture,    DIFFUSE_SLOT,    "Ground or backdrop texture."),
        (reflection_texture, REFLECTION_SLOT, "Reflection; the scene environment is used when unset."),
    ],
    params: [
        (primary_color,                 Vec3, DirtyFlags::empty(),  "Tint of the background."),
        (primary_color_shadow_level,    f32,  DirtyFlags::TEXTURES, "Shadow tint strength."),
        (primary_color_highlight_level, f32,  DirtyFlags::TEXTURES, "Highlight tint strength."),
        (shadow_level,                  f32,  DirtyFlags::empty(),  "How dark received shadows are."),
        (shadow_only,                   bool, DirtyFlags::TEXTURES, "Only render received shadows."),
        (reflection_blur,               f32,  DirtyFlags::TEXTURES, "Reflection blur amount."),
        (reflection_fresnel,            bool, DirtyFlags::TEXTURES, "Fade reflection with view angle."),
        (reflection_falloff_distance,   f32,  DirtyFlags::TEXTURES, "Reflection falloff; 0 disables it."),
        (reflection_amount,             f32,  DirtyFlags::empty(),  "Reflection strength."),
        (reflection_reflectance0,       f32,  DirtyFlags::empty(),  "Reflectance at normal incidence."),
        (reflection_reflectance90,      f32,  DirtyFlags::empty(),  "Reflectance at grazing incidence."),
        (reflection_bgr,                bool, DirtyFlags::TEXTURES, "Reflection stored as BGR."),
        (use_equirectangular_fov,       bool, DirtyFlags::TEXTURES, "Scale equirectangular lookups by FOV."),
        (fov_multiplier,                f32,  DirtyFlags::empty(),  "FOV scale."),
        (opacity_fresnel,               bool, DirtyFlags::TEXTURES, "Fade diffuse alpha with view angle."),
        (enable_noise,                  bool, DirtyFlags::TEXTURES, "Dither to hide banding."),
        (use_rgb_color,                 bool, DirtyFlags::TEXTURES, "Use primary color as plain RGB."),
        (premultiply_alpha,             bool, DirtyFlags::TEXTURES, "Output premultiplied alpha."),
        (scene_center,                  Vec3, DirtyFlags::empty(),  "Center of the background dome."),
        (enable_ground_projection,      bool, DirtyFlags::TEXTURES, "Project the environment on a ground."),
        (projected_ground_radius,       f32,  DirtyFlags::empty(),  "Projected ground radius."),
        (projected_ground_height,       f32,  DirtyFlags::empty(),  "Projected ground height."),
    ]
);

impl BackgroundProfile {
    fn effective_reflection<'a>(&'a self, scene: &'a Scene) -> Option<&'a TextureRef> {
        self.reflection_texture
            .as_ref()
            .or(scene.environment().environment_texture.as_ref())
    }

    fn primary_shadow_color(&self) -> Vec3 {
        self.primary_color * self.primary_color_shadow_level
    }
}

impl MaterialProfile for BackgroundProfile {
    fn shader_name(&self) -> &'static str {
        "background"
    }

    fn register_defines(&self, builder: &mut DefineSetBuilder) {
        reflection::register_defines(builder);
        builder.flags(BACKGROUND_DEFINES, DirtyFlags::TEXTURES);
    }

    fn visit_slots(&self, scene: &Scene, visitor: &mut dyn FnMut(&'static SlotDesc, Option<&TextureRef>)) {
        visitor(&DIFFUSE_SLOT, self.diffuse_texture.as_ref());
        visitor(&REFLECTION_SLOT, self.effective_reflection(scene));
    }

    fn prepare_texture_defines(&self, defines: &mut DefineSet, ctx: &PrepareContext<'_>) {
        let diffuse = self.diffuse_texture.as_ref().filter(|_| defines.is_set("DIFFUSE"));
        defines.set("DIFFUSEHASALPHA", diffuse.is_some_and(|t| t.has_alpha));
        defines.set("GAMMADIFFUSE", diffuse.is_some_and(|t| t.gamma_space));
        defines.set("OPACITYFRESNEL", diffuse.is_some() && self.opacity_fresnel);

        let reflection = self
            .effective_reflection(ctx.scene)
            .map(|t| &**t)
            .filter(|_| defines.is_set("REFLECTION"));
        reflection::prepare_reflection_defines(defines, reflection, ctx.scene.right_handed());
        let has_reflection = reflection.is_some();
        defines.set("REFLECTIONBLUR", has_reflection && self.reflection_blur > 0.0);
        defines.set("REFLECTIONFRESNEL", has_reflection && self.reflection_fresnel);
        defines.set(
            "REFLECTIONFALLOFF",
            has_reflection && self.reflection_fresnel && self.reflection_falloff_distance > 0.0,
        );
        defines.set("REFLECTIONBGR", has_reflection && self.reflection_bgr);
        defines.set(
            "EQUIRECTANGULAR_RELFECTION_FOV",
            has_reflection && self.use_equirectangular_fov,
        );
        defines.set("TEXTURELODSUPPORT", has_reflection && ctx.caps.texture_lod);

        defines.set("PREMULTIPLYALPHA", self.premultiply_alpha);
        defines.set("USERGBCOLOR", self.use_rgb_color);
        defines.set(
            "USEHIGHLIGHTANDSHADOWCOLORSINSHADER",
            !self.use_rgb_color
                && (self.primary_color_shadow_level != 0.0 || self.primary_color_highlight_level != 0.0),
        );
        defines.set("BACKMAT_SHADOWONLY", self.shadow_only);
        defines.set("NOISE", self.enable_noise);
        defines.set("PROJECTED_GROUND", self.enable_ground_projection);

        defines.hints_mut().textures_need_normals = has_reflection;
    }

    fn prepare_defines(&self, _defines: &mut DefineSet, _ctx: &PrepareContext<'_>) {}

    fn build_uniform_layout(&self, ubo: &mut UniformBuffer) {
        ubo.add_uniform("vPrimaryColor", 4);
        ubo.add_uniform("vPrimaryColorShadow", 4);
        ubo.add_uniform("vReflectionMicrosurfaceInfos", 3);
        ubo.add_uniform("fFovMultiplier", 1);
        ubo.add_uniform("shadowLevel", 1);
        ubo.add_uniform("alpha", 1);
        ubo.add_uniform("vBackgroundCenter", 3);
        ubo.add_uniform("vReflectionControl", 4);
        ubo.add_uniform("projectedGroundInfos", 2);
    }

    fn collect_interface(&self, _defines: &DefineSet, _iface: &mut EffectInterface) {}

    fn add_fallbacks(&self, defines: &DefineSet, chain: &mut FallbackChain) {
        fallback_if_set(defines, chain, 0, "NOISE");
        fallback_if_set(defines, chain, 0, "PROJECTED_GROUND");
        fallback_if_set(defines, chain, 1, "REFLECTIONFRESNEL");
        fallback_if_set(defines, chain, 1, "REFLECTIONBLUR");
    }

    fn bind_material(&self, ubo: &mut UniformBuffer, ctx: &BindContext<'_>) {
        let defines = ctx.defines;
        if let Some(tex) = self
            .effective_reflection(ctx.scene)
            .filter(|_| defines.is_set("REFLECTION"))
        {
            // (size, blur, lod offset)
            let size = tex.bounding_box_size.map_or(1.0, |s| s.max_element());
            ubo.update_float3("vReflectionMicrosurfaceInfos", size, self.reflection_blur, 0.0);
        }
        if defines.is_set("REFLECTIONFRESNEL") {
            ubo.update_vec4(
                "vReflectionControl",
                Vec4::new(
                    self.reflection_reflectance0,
                    self.reflection_reflectance90,
                    self.reflection_falloff_distance,
                    self.reflection_amount,
                ),
            );
        }
        if defines.is_set("PROJECTED_GROUND") {
            ubo.update_float2(
                "projectedGroundInfos",
                self.projected_ground_radius,
                self.projected_ground_height,
            );
        }

        ubo.update_color4("vPrimaryColor", self.primary_color, 1.0);
        ubo.update_color4("vPrimaryColorShadow", self.primary_shadow_color(), 1.0);
        ubo.update_float("fFovMultiplier", self.fov_multiplier);
        ubo.update_float("alpha", ctx.settings.alpha);
        ubo.update_vec3("vBackgroundCenter", self.scene_center);
    }

    fn bind_frame(&self, ubo: &mut UniformBuffer, _ctx: &BindContext<'_>) {
        ubo.update_float("shadowLevel", self.shadow_level);
    }

    fn has_alpha_sources(&self) -> bool {
        self.diffuse_texture
            .as_ref()
            .is_some_and(|t| t.has_alpha || self.opacity_fresnel)
    }

    fn has_alpha_channel(&self) -> bool {
        self.diffuse_texture.as_ref().is_some_and(|t| t.has_alpha)
    }

    fn need_alpha_testing(&self, _settings: &MaterialSettings) -> bool {
        true
    }

    fn specular_supported(&self) -> bool {
        false
    }

    fn uses_vertex_colors(&self) -> bool {
        false
    }

    fn uses_morph_targets(&self) -> bool {
        false
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
    fn test_alpha_rules() {
        let mut profile = BackgroundProfile::default();
        let settings = MaterialSettings::default();
        assert!(profile.need_alpha_testing(&settings));
        assert!(!profile.need_alpha_blending(&settings));

        // Opacity fresnel is on by default, so any diffuse texture blends.
        profile.set_diffuse_texture(Some(Texture::new("ground").into_ref()));
        assert!(profile.need_alpha_blending(&settings));

        profile.set_opacity_fresnel(false);
        assert!(!profile.need_alpha_blending(&settings));
    }

    #[test]
    fn test_reflection_falls_back_to_environment() {
        let mut scene = Scene::new();
        let profile = BackgroundProfile::default();
        assert!(profile.effective_reflection(&scene).is_none());

        scene.environment_mut().environment_texture = Some(Texture::new_cube("env").into_ref());
        assert_eq!(
            profile.effective_reflection(&scene).map(|t| t.name.as_str()),
            Some("env")
        );
    }
}
