//! Shared binders: values every profile sends the same way.

use glam::{Vec2, Vec4};

use crate::resources::material::prepare::frame_bound::CLIP_PLANE_DEFINES;
use crate::resources::material::profile::{EffectInterface, MaterialProfile};
use crate::resources::mesh::MeshState;
use crate::resources::shader_defines::DefineSet;
use crate::resources::uniform_buffer::{UniformBuffer, UniformValue};
use crate::scene::Scene;

const CLIP_PLANE_UNIFORMS: [&str; 6] = [
    "vClipPlane",
    "vClipPlane2",
    "vClipPlane3",
    "vClipPlane4",
    "vClipPlane5",
    "vClipPlane6",
];

/// Loose uniforms and samplers every permutation may declare.
pub fn collect_common_interface(defines: &DefineSet, iface: &mut EffectInterface) {
    iface.uniforms(&[
        "world",
        "view",
        "viewProjection",
        "vEyePosition",
        "visibility",
        "vFogInfos",
        "vFogColor",
        "logarithmicDepthConstant",
        "mBones",
        "boneTextureWidth",
        "morphTargetInfluences",
    ]);
    for (define, uniform) in CLIP_PLANE_DEFINES.iter().zip(CLIP_PLANE_UNIFORMS) {
        if defines.is_set(define) {
            iface.uniform(uniform);
        }
    }
    if defines.is_set("BONETEXTURE") {
        iface.sampler("boneSampler");
    }
    if defines.is_set("MORPHTARGETS_TEXTURE") {
        iface.sampler("morphTargets");
    }
}

pub fn bind_clip_planes(scene: &Scene, ubo: &mut UniformBuffer) {
    for (plane, name) in scene.environment().clip_planes.iter().zip(CLIP_PLANE_UNIFORMS) {
        if let Some(plane) = plane {
            ubo.set_uniform(name, UniformValue::Vec4(*plane));
        }
    }
}

pub fn bind_eye_position(scene: &Scene, ubo: &mut UniformBuffer) {
    ubo.set_uniform(
        "vEyePosition",
        UniformValue::Vec4(scene.camera.position().extend(1.0)),
    );
}

pub fn bind_fog(scene: &Scene, defines: &DefineSet, ubo: &mut UniformBuffer) {
    if !defines.is_set("FOG") {
        return;
    }
    let fog = &scene.environment().fog;
    ubo.set_uniform(
        "vFogInfos",
        UniformValue::Vec4(Vec4::new(fog.mode.shader_value(), fog.start, fog.end, fog.density)),
    );
    ubo.set_uniform("vFogColor", UniformValue::Vec3(fog.color));
}

/// `2 / log2(maxZ + 1)`, the logarithmic depth scale.
pub fn bind_log_depth(scene: &Scene, defines: &DefineSet, ubo: &mut UniformBuffer) {
    if !defines.is_set("LOGARITHMICDEPTH") {
        return;
    }
    let constant = 2.0 / (scene.camera.max_z() + 1.0).log2();
    ubo.set_uniform("logarithmicDepthConstant", UniformValue::Float(constant));
}

/// Bone matrices for GPU skinning; nothing when the effect skins on the CPU.
pub fn bind_bones(mesh: &MeshState, defines: &DefineSet, ubo: &mut UniformBuffer, forced_to_cpu: bool) {
    if forced_to_cpu || defines.int("NUM_BONE_INFLUENCERS") <= 0 {
        return;
    }
    let Some(skeleton) = &mesh.skeleton else {
        return;
    };
    if defines.is_set("BONETEXTURE") {
        let width = (skeleton.bone_count() + 1) as f32 * 4.0;
        ubo.set_uniform("boneTextureWidth", UniformValue::Float(width));
    } else {
        ubo.set_uniform("mBones", UniformValue::Mat4Array(skeleton.bone_matrices.clone()));
    }
}

pub fn bind_morph_targets(mesh: &MeshState, defines: &DefineSet, ubo: &mut UniformBuffer) {
    if defines.int("NUM_MORPH_INFLUENCERS") <= 0 {
        return;
    }
    if let Some(morph) = &mesh.morph_targets {
        ubo.set_uniform(
            "morphTargetInfluences",
            UniformValue::FloatArray(morph.influences.to_vec()),
        );
    }
}

// ─── Texture slots ───────────────────────────────────────────────────────────

/// Adds each slot's infos and matrix entries to the material block.
pub fn add_slot_uniforms<P: MaterialProfile + ?Sized>(profile: &P, scene: &Scene, ubo: &mut UniformBuffer) {
    profile.visit_slots(scene, &mut |desc, _| {
        if let Some(infos) = desc.infos {
            ubo.add_uniform(infos, 2);
        }
        if let Some(matrix) = desc.matrix {
            ubo.add_uniform(matrix, 16);
        }
    });
}

pub fn collect_slot_samplers<P: MaterialProfile + ?Sized>(
    profile: &P,
    scene: &Scene,
    defines: &DefineSet,
    iface: &mut EffectInterface,
) {
    profile.visit_slots(scene, &mut |desc, _| {
        if defines.is_set(desc.define) {
            iface.sampler(desc.sampler);
        }
    });
}

/// Binds every present slot: sampler, `vec2(coordinatesIndex, level)` and matrix.
pub fn bind_texture_slots<P: MaterialProfile + ?Sized>(
    profile: &P,
    scene: &Scene,
    defines: &DefineSet,
    ubo: &mut UniformBuffer,
) {
    profile.visit_slots(scene, &mut |desc, texture| {
        let Some(texture) = texture.filter(|_| defines.is_set(desc.define)) else {
            return;
        };
        ubo.set_texture(desc.sampler, Some(texture));
        if let Some(infos) = desc.infos {
            let info = Vec2::new(texture.coordinates_index as f32, texture.level);
            ubo.update_float2(infos, info.x, info.y);
        }
        if let Some(matrix) = desc.matrix {
            ubo.update_matrix(matrix, &texture.texture_matrix());
        }
    });
}
