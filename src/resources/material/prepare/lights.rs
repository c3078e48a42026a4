//! Light defines, interface and uniforms.
//!
//! Lights are taken in scene order among those affecting the mesh and
//! truncated at the material's `max_simultaneous_lights`. Indices past the
//! last active light are cleared so a removed light never lingers.

use glam::{Vec2, Vec3, Vec4};

use crate::resources::material::profile::{EffectInterface, PrepareContext};
use crate::resources::mesh::MeshState;
use crate::resources::shader_defines::{DefineSet, DefineSetBuilder, DirtyFlags};
use crate::resources::uniform_buffer::{UniformBuffer, UniformValue};
use crate::scene::{Light, LightFalloff, LightKind, LightmapMode, Scene, ShadowFilter, ShadowQuality};

const LIGHT_TYPES: [&str; 4] = ["DIRLIGHT", "POINTLIGHT", "SPOTLIGHT", "HEMILIGHT"];

const SHADOW_DEFINES: [&str; 9] = [
    "SHADOW",
    "SHADOWPCF",
    "SHADOWPCSS",
    "SHADOWPOISSON",
    "SHADOWESM",
    "SHADOWCLOSEESM",
    "SHADOWCUBE",
    "SHADOWLOWQUALITY",
    "SHADOWMEDIUMQUALITY",
];

const FALLOFF_DEFINES: [&str; 3] = [
    "LIGHT_FALLOFF_PHYSICAL",
    "LIGHT_FALLOFF_GLTF",
    "LIGHT_FALLOFF_STANDARD",
];

const LIGHTMAP_DEFINES: [&str; 2] = ["LIGHTMAPEXCLUDED", "LIGHTMAPNOSPECULAR"];

pub fn register_defines(builder: &mut DefineSetBuilder, max_lights: u32) {
    for index in 0..max_lights {
        builder.flag(&format!("LIGHT{index}"), DirtyFlags::LIGHTS);
        for prefix in LIGHT_TYPES
            .iter()
            .chain(&SHADOW_DEFINES)
            .chain(&FALLOFF_DEFINES)
            .chain(&LIGHTMAP_DEFINES)
        {
            builder.flag(&format!("{prefix}{index}"), DirtyFlags::LIGHTS);
        }
    }
    builder.flags(
        &["SPECULARTERM", "SHADOWS", "SHADOWFLOAT", "LIGHTMAPEXCLUDED"],
        DirtyFlags::LIGHTS,
    );
}

#[derive(Debug, Default)]
struct LightsState {
    need_normals: bool,
    specular: bool,
    shadows: bool,
    lightmap: bool,
}

/// Lights affecting `mesh`, in scene order, capped at `max_lights`.
pub fn active_lights<'a>(
    scene: &'a Scene,
    mesh: uuid::Uuid,
    max_lights: u32,
) -> impl Iterator<Item = &'a Light> + 'a {
    scene
        .lights()
        .iter()
        .filter(move |light| light.affects(mesh))
        .take(max_lights as usize)
}

/// Writes the light defines. Returns whether normals are needed.
///
/// Skipped while lights are clean; the previous answer is returned.
pub fn prepare_defines_for_lights(
    defines: &mut DefineSet,
    ctx: &PrepareContext<'_>,
    max_lights: u32,
    specular_supported: bool,
) -> bool {
    if !defines.is_concern_dirty(DirtyFlags::LIGHTS) {
        return defines.hints().lights_need_normals;
    }

    let scene = ctx.scene;
    let mut state = LightsState::default();
    let mut count = 0;
    if scene.lights_enabled() && !ctx.settings.disable_lighting {
        for light in active_lights(scene, ctx.mesh.uuid, max_lights) {
            prepare_light(defines, scene, ctx.mesh_state(), light, count, specular_supported, &mut state);
            count += 1;
        }
    }

    defines.set("SPECULARTERM", state.specular);
    defines.set("SHADOWS", state.shadows);

    for index in count..max_lights {
        defines.set(&format!("LIGHT{index}"), false);
        for prefix in LIGHT_TYPES
            .iter()
            .chain(&SHADOW_DEFINES)
            .chain(&FALLOFF_DEFINES)
            .chain(&LIGHTMAP_DEFINES)
        {
            defines.set(&format!("{prefix}{index}"), false);
        }
    }

    let caps = ctx.caps;
    let float_shadows = (caps.texture_float_render && caps.texture_float_linear_filtering)
        || (caps.texture_half_float_render && caps.texture_half_float_linear_filtering);
    defines.set("SHADOWFLOAT", state.shadows && float_shadows);
    defines.set("LIGHTMAPEXCLUDED", state.lightmap);

    defines.hints_mut().lights_need_normals = state.need_normals;
    state.need_normals
}

fn prepare_light(
    defines: &mut DefineSet,
    scene: &Scene,
    mesh: &MeshState,
    light: &Light,
    index: u32,
    specular_supported: bool,
    state: &mut LightsState,
) {
    state.need_normals = true;
    defines.set(&format!("LIGHT{index}"), true);

    let kind = light.type_define();
    for ty in LIGHT_TYPES {
        defines.set(&format!("{ty}{index}"), ty == kind);
    }

    let falloff = match light.falloff {
        LightFalloff::Default => None,
        LightFalloff::Physical => Some("LIGHT_FALLOFF_PHYSICAL"),
        LightFalloff::Gltf => Some("LIGHT_FALLOFF_GLTF"),
        LightFalloff::Standard => Some("LIGHT_FALLOFF_STANDARD"),
    };
    for name in FALLOFF_DEFINES {
        defines.set(&format!("{name}{index}"), falloff == Some(name));
    }

    if specular_supported && light.specular != Vec3::ZERO {
        state.specular = true;
    }

    let shadow = light
        .active_shadow()
        .filter(|_| mesh.receive_shadows && scene.shadows_enabled());
    let mut active = [false; SHADOW_DEFINES.len()];
    if let Some(shadow) = shadow {
        state.shadows = true;
        let filtered = matches!(shadow.filter, ShadowFilter::Pcf | ShadowFilter::Pcss);
        active = [
            true,
            shadow.filter == ShadowFilter::Pcf,
            shadow.filter == ShadowFilter::Pcss,
            shadow.filter == ShadowFilter::Poisson,
            shadow.filter == ShadowFilter::Esm,
            shadow.filter == ShadowFilter::CloseEsm,
            light.is_point(),
            filtered && shadow.quality == ShadowQuality::Low,
            filtered && shadow.quality == ShadowQuality::Medium,
        ];
    }
    for (name, on) in SHADOW_DEFINES.iter().zip(active) {
        defines.set(&format!("{name}{index}"), on);
    }

    let excluded = light.lightmap_mode != LightmapMode::Default;
    state.lightmap |= excluded;
    defines.set(&format!("LIGHTMAPEXCLUDED{index}"), excluded);
    defines.set(
        &format!("LIGHTMAPNOSPECULAR{index}"),
        light.lightmap_mode == LightmapMode::ShadowsOnly,
    );
}

/// Uniform and sampler names of every active light index.
pub fn prepare_uniforms_and_samplers_for_lights(
    defines: &DefineSet,
    iface: &mut EffectInterface,
    max_lights: u32,
) {
    for index in 0..max_lights {
        if !defines.is_set(&format!("LIGHT{index}")) {
            break;
        }
        for name in [
            "vLightData",
            "vLightDiffuse",
            "vLightSpecular",
            "vLightDirection",
            "vLightFalloff",
            "vLightGround",
            "lightMatrix",
            "shadowsInfo",
            "depthValues",
        ] {
            iface.uniform(format!("{name}{index}"));
        }
        iface.sampler(format!("shadowSampler{index}"));
        iface.sampler(format!("depthSampler{index}"));
    }
}

/// Sends per-light values for every light index enabled in `defines`.
pub fn bind_lights(
    scene: &Scene,
    mesh: uuid::Uuid,
    defines: &DefineSet,
    ubo: &mut UniformBuffer,
    max_lights: u32,
    specular_supported: bool,
) {
    for (index, light) in active_lights(scene, mesh, max_lights).enumerate() {
        if !defines.is_set(&format!("LIGHT{index}")) {
            break;
        }
        let diffuse = light.color * light.intensity;
        match &light.kind {
            LightKind::Directional(dir) => {
                ubo.set_uniform(&format!("vLightData{index}"), UniformValue::Vec4(dir.direction.extend(1.0)));
                ubo.set_uniform(&format!("vLightDiffuse{index}"), UniformValue::Vec4(diffuse.extend(f32::MAX)));
            }
            LightKind::Point(point) => {
                ubo.set_uniform(&format!("vLightData{index}"), UniformValue::Vec4(light.position.extend(0.0)));
                ubo.set_uniform(&format!("vLightDiffuse{index}"), UniformValue::Vec4(diffuse.extend(point.range)));
            }
            LightKind::Spot(spot) => {
                ubo.set_uniform(&format!("vLightData{index}"), UniformValue::Vec4(light.position.extend(0.0)));
                ubo.set_uniform(&format!("vLightDiffuse{index}"), UniformValue::Vec4(diffuse.extend(spot.range)));
                ubo.set_uniform(
                    &format!("vLightDirection{index}"),
                    UniformValue::Vec4(spot.direction.normalize_or_zero().extend((spot.outer_cone * 0.5).cos())),
                );
            }
            LightKind::Hemispheric(hemi) => {
                ubo.set_uniform(
                    &format!("vLightData{index}"),
                    UniformValue::Vec4(hemi.direction.normalize_or_zero().extend(0.0)),
                );
                ubo.set_uniform(&format!("vLightDiffuse{index}"), UniformValue::Vec4(diffuse.extend(f32::MAX)));
                ubo.set_uniform(
                    &format!("vLightGround{index}"),
                    UniformValue::Vec3(hemi.ground_color * light.intensity),
                );
            }
        }
        if specular_supported {
            ubo.set_uniform(
                &format!("vLightSpecular{index}"),
                UniformValue::Vec4((light.specular * light.intensity).extend(0.0)),
            );
        }

        if defines.is_set(&format!("SHADOW{index}")) {
            if let Some(shadow) = light.active_shadow() {
                ubo.set_uniform(
                    &format!("shadowsInfo{index}"),
                    UniformValue::Vec4(Vec4::new(
                        shadow.darkness,
                        1.0 / shadow.map_size.max(1) as f32,
                        shadow.bias,
                        shadow.normal_bias,
                    )),
                );
                let camera = &scene.camera;
                ubo.set_uniform(
                    &format!("depthValues{index}"),
                    UniformValue::Vec2(Vec2::new(camera.near, camera.near + camera.far)),
                );
                ubo.set_texture(&format!("shadowSampler{index}"), shadow.map.as_ref());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::EngineCaps;
    use crate::resources::capabilities::RenderCapabilities;
    use crate::resources::material::MaterialSettings;
    use crate::resources::mesh::Mesh;
    use crate::scene::ShadowConfig;

    fn defines(max_lights: u32) -> DefineSet {
        let mut b = DefineSet::builder();
        register_defines(&mut b, max_lights);
        b.build()
    }

    fn run(scene: &Scene, mesh: &Mesh, defines: &mut DefineSet, max_lights: u32) -> bool {
        let settings = MaterialSettings::default();
        let capabilities = RenderCapabilities::default();
        let caps = EngineCaps::default();
        let ctx = PrepareContext {
            scene,
            mesh,
            settings: &settings,
            capabilities: &capabilities,
            caps: &caps,
        };
        prepare_defines_for_lights(defines, &ctx, max_lights, true)
    }

    #[test]
    fn test_truncated_at_cap() {
        let mut scene = Scene::new();
        for _ in 0..6 {
            scene.add_light(Light::new_point(Vec3::ONE, 1.0, 10.0));
        }
        let mesh = Mesh::new("m");
        let mut defines = defines(4);

        assert!(run(&scene, &mesh, &mut defines, 4));
        for i in 0..4 {
            assert!(defines.is_set(&format!("LIGHT{i}")));
            assert!(defines.is_set(&format!("POINTLIGHT{i}")));
        }
        assert!(!defines.contains("LIGHT4"));
    }

    #[test]
    fn test_stale_indices_cleared() {
        let mut scene = Scene::new();
        scene.add_light(Light::new_directional(Vec3::ONE, 1.0));
        scene.add_light(Light::new_point(Vec3::ONE, 1.0, 5.0));
        let mesh = Mesh::new("m");
        let mut defines = defines(4);
        run(&scene, &mesh, &mut defines, 4);
        assert!(defines.is_set("LIGHT1"));
        defines.mark_as_processed();

        scene.lights_mut().pop();
        defines.mark_as(DirtyFlags::LIGHTS);
        run(&scene, &mesh, &mut defines, 4);
        assert!(defines.is_set("DIRLIGHT0"));
        assert!(!defines.is_set("LIGHT1"));
        assert!(!defines.is_set("POINTLIGHT1"));
    }

    #[test]
    fn test_shadow_filter_defines() {
        let mut scene = Scene::new();
        let shadow = ShadowConfig {
            filter: ShadowFilter::Pcss,
            quality: ShadowQuality::Low,
            ..Default::default()
        };
        scene.add_light(Light::new_point(Vec3::ONE, 1.0, 5.0).with_shadows(shadow));
        let mut mesh = Mesh::new("m");
        mesh.state_mut().receive_shadows = true;
        let mut defines = defines(2);
        run(&scene, &mesh, &mut defines, 2);

        assert!(defines.is_set("SHADOWS"));
        assert!(defines.is_set("SHADOW0"));
        assert!(defines.is_set("SHADOWPCSS0"));
        assert!(defines.is_set("SHADOWLOWQUALITY0"));
        assert!(defines.is_set("SHADOWCUBE0"));
        assert!(!defines.is_set("SHADOWPCF0"));
        assert!(defines.is_set("SHADOWFLOAT"));
    }

    #[test]
    fn test_clean_lights_return_cached_answer() {
        let scene = Scene::new();
        let mesh = Mesh::new("m");
        let mut defines = defines(1);
        defines.hints_mut().lights_need_normals = true;
        defines.mark_as_processed();
        assert!(run(&scene, &mesh, &mut defines, 1));
    }
}
