//! Vertex attribute defines and attribute lists.
//!
//! Normals and UVs are only requested when an earlier pass asked for them
//! (see [`PrepareHints`](crate::resources::shader_defines::PrepareHints)); the
//! pass re-runs whenever those requests change even if the mesh did not.

use crate::renderer::pipeline::FallbackChain;
use crate::resources::material::profile::EffectInterface;
use crate::resources::mesh::{MeshState, VertexAttributes};
use crate::resources::shader_defines::{DefineSet, DefineSetBuilder, DirtyFlags};

const UV_DEFINES: [&str; 6] = ["UV1", "UV2", "UV3", "UV4", "UV5", "UV6"];

pub fn register_defines(builder: &mut DefineSetBuilder) {
    builder
        .flags(&["NORMAL", "TANGENT"], DirtyFlags::ATTRIBUTES)
        .flags(&UV_DEFINES, DirtyFlags::ATTRIBUTES)
        .flags(&["VERTEXCOLOR", "VERTEXALPHA"], DirtyFlags::ATTRIBUTES)
        .int("NUM_BONE_INFLUENCERS", 0, DirtyFlags::ATTRIBUTES)
        .int("BonesPerMesh", 0, DirtyFlags::ATTRIBUTES)
        .flag("BONETEXTURE", DirtyFlags::ATTRIBUTES)
        .flags(
            &[
                "MORPHTARGETS",
                "MORPHTARGETS_NORMAL",
                "MORPHTARGETS_TANGENT",
                "MORPHTARGETS_UV",
                "MORPHTARGETS_TEXTURE",
            ],
            DirtyFlags::ATTRIBUTES,
        )
        .int("NUM_MORPH_INFLUENCERS", 0, DirtyFlags::ATTRIBUTES);
}

/// Returns `false` when nothing needed recomputing.
pub fn prepare_defines_for_attributes(
    defines: &mut DefineSet,
    mesh: &MeshState,
    use_vertex_color: bool,
    use_bones: bool,
    use_morph_targets: bool,
) -> bool {
    let hints = defines.hints();
    let need_normals = hints.need_normals();
    let need_uvs = hints.need_uvs;
    if !defines.is_concern_dirty(DirtyFlags::ATTRIBUTES)
        && need_normals == hints.normals
        && need_uvs == hints.uvs
    {
        return false;
    }
    {
        let hints = defines.hints_mut();
        hints.normals = need_normals;
        hints.uvs = need_uvs;
    }

    defines.set("NORMAL", need_normals && mesh.has(VertexAttributes::NORMAL));
    defines.set("TANGENT", need_normals && mesh.has(VertexAttributes::TANGENT));
    for (channel, name) in (1..).zip(UV_DEFINES) {
        defines.set(name, need_uvs && mesh.has(VertexAttributes::uv(channel)));
    }

    if use_vertex_color {
        let colors = mesh.use_vertex_colors && mesh.has(VertexAttributes::COLOR);
        defines.set("VERTEXCOLOR", colors);
        defines.set("VERTEXALPHA", colors && mesh.has_vertex_alpha);
    }
    if use_bones {
        prepare_defines_for_bones(defines, mesh);
    }
    if use_morph_targets {
        prepare_defines_for_morph_targets(defines, mesh);
    }
    true
}

pub fn prepare_defines_for_bones(defines: &mut DefineSet, mesh: &MeshState) {
    match mesh.skeleton.as_ref().filter(|_| mesh.uses_gpu_bones()) {
        Some(skeleton) => {
            defines.set("NUM_BONE_INFLUENCERS", mesh.num_bone_influencers);
            if skeleton.use_texture_for_matrices {
                defines.set("BONETEXTURE", true);
                defines.set("BonesPerMesh", 0);
            } else {
                defines.set("BONETEXTURE", false);
                defines.set("BonesPerMesh", skeleton.bone_count() as u32 + 1);
            }
        }
        None => {
            defines.set("NUM_BONE_INFLUENCERS", 0);
            defines.set("BonesPerMesh", 0);
            defines.set("BONETEXTURE", false);
        }
    }
}

pub fn prepare_defines_for_morph_targets(defines: &mut DefineSet, mesh: &MeshState) {
    match &mesh.morph_targets {
        Some(morph) => {
            let influencers = morph.num_influencers();
            let uv1 = defines.is_set("UV1");
            let tangent = defines.is_set("TANGENT");
            let normal = defines.is_set("NORMAL");
            defines.set("MORPHTARGETS_UV", morph.supports_uvs && uv1);
            defines.set("MORPHTARGETS_TANGENT", morph.supports_tangents && tangent);
            defines.set("MORPHTARGETS_NORMAL", morph.supports_normals && normal);
            defines.set("MORPHTARGETS", influencers > 0);
            defines.set("NUM_MORPH_INFLUENCERS", influencers);
            defines.set("MORPHTARGETS_TEXTURE", morph.use_texture_for_targets);
        }
        None => {
            for name in [
                "MORPHTARGETS",
                "MORPHTARGETS_NORMAL",
                "MORPHTARGETS_TANGENT",
                "MORPHTARGETS_UV",
                "MORPHTARGETS_TEXTURE",
            ] {
                defines.set(name, false);
            }
            defines.set("NUM_MORPH_INFLUENCERS", 0);
        }
    }
}

// ─── Attribute lists ─────────────────────────────────────────────────────────

/// Vertex attributes read by the permutation in `defines`.
pub fn collect_attributes(defines: &DefineSet, chain: &mut FallbackChain, iface: &mut EffectInterface) {
    iface.attribute("position");
    if defines.is_set("NORMAL") {
        iface.attribute("normal");
    }
    if defines.is_set("TANGENT") {
        iface.attribute("tangent");
    }
    for (channel, name) in (1..).zip(UV_DEFINES) {
        if defines.is_set(name) {
            iface.attribute(if channel == 1 { "uv".to_string() } else { format!("uv{channel}") });
        }
    }
    if defines.is_set("VERTEXCOLOR") {
        iface.attribute("color");
    }
    prepare_attributes_for_bones(defines, chain, iface);
    prepare_attributes_for_instances(defines, iface);
    prepare_attributes_for_morph_targets(defines, iface);
}

/// Skinning streams; also allows the effect to degrade to CPU skinning.
pub fn prepare_attributes_for_bones(defines: &DefineSet, chain: &mut FallbackChain, iface: &mut EffectInterface) {
    let influencers = defines.int("NUM_BONE_INFLUENCERS");
    if influencers <= 0 {
        return;
    }
    chain.add_cpu_skinning_fallback(0);
    iface.attribute("matricesIndices");
    iface.attribute("matricesWeights");
    if influencers > 4 {
        iface.attribute("matricesIndicesExtra");
        iface.attribute("matricesWeightsExtra");
    }
}

pub fn prepare_attributes_for_instances(defines: &DefineSet, iface: &mut EffectInterface) {
    if defines.is_set("INSTANCES") || defines.is_set("THIN_INSTANCES") {
        for column in 0..4 {
            iface.attribute(format!("world{column}"));
        }
    }
    if defines.is_set("INSTANCESCOLOR") {
        iface.attribute("instanceColor");
    }
}

pub fn prepare_attributes_for_morph_targets(defines: &DefineSet, iface: &mut EffectInterface) {
    if defines.is_set("MORPHTARGETS_TEXTURE") {
        return;
    }
    for target in 0..defines.int("NUM_MORPH_INFLUENCERS").max(0) {
        iface.attribute(format!("position{target}"));
        if defines.is_set("MORPHTARGETS_NORMAL") {
            iface.attribute(format!("normal{target}"));
        }
        if defines.is_set("MORPHTARGETS_TANGENT") {
            iface.attribute(format!("tangent{target}"));
        }
        if defines.is_set("MORPHTARGETS_UV") {
            iface.attribute(format!("uv_{target}"));
        }
    }
}
