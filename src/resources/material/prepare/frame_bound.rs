//! Defines re-evaluated on every readiness check.
//!
//! These keys belong to no concern: a change only re-raises the aggregate
//! dirty bit so the permutation is re-resolved.

use crate::resources::mesh::{MeshState, VertexAttributes};
use crate::resources::shader_defines::{DefineSet, DefineSetBuilder, DirtyFlags};
use crate::scene::Scene;

pub const CLIP_PLANE_DEFINES: [&str; 6] = [
    "CLIPPLANE",
    "CLIPPLANE2",
    "CLIPPLANE3",
    "CLIPPLANE4",
    "CLIPPLANE5",
    "CLIPPLANE6",
];

pub fn register_defines(builder: &mut DefineSetBuilder) {
    builder
        .flags(&CLIP_PLANE_DEFINES, DirtyFlags::empty())
        .flags(
            &[
                "DEPTHPREPASS",
                "USE_REVERSE_DEPTHBUFFER",
                "INSTANCES",
                "THIN_INSTANCES",
                "INSTANCESCOLOR",
            ],
            DirtyFlags::empty(),
        );
}

/// Returns whether anything changed; a change marks `defines` unprocessed.
pub fn prepare_defines_for_frame_bound_values(
    defines: &mut DefineSet,
    scene: &Scene,
    mesh: &MeshState,
    use_instances: bool,
) -> bool {
    let mut changed = false;
    for (name, plane) in CLIP_PLANE_DEFINES.iter().zip(&scene.environment().clip_planes) {
        changed |= defines.set(name, plane.is_some());
    }
    changed |= defines.set("DEPTHPREPASS", !scene.color_write);
    changed |= defines.set("USE_REVERSE_DEPTHBUFFER", scene.use_reverse_depth_buffer);

    let thin_instances = mesh.has_thin_instances();
    changed |= defines.set("INSTANCES", use_instances);
    changed |= defines.set("THIN_INSTANCES", thin_instances);
    changed |= defines.set(
        "INSTANCESCOLOR",
        (use_instances || thin_instances) && mesh.has(VertexAttributes::INSTANCE_COLOR),
    );

    if changed {
        defines.mark_as_unprocessed();
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_change_marks_unprocessed_only() {
        let mut b = DefineSet::builder();
        register_defines(&mut b);
        let mut defines = b.build();
        defines.mark_as_processed();

        let mut scene = Scene::new();
        let mesh = MeshState::default();
        assert!(!prepare_defines_for_frame_bound_values(&mut defines, &scene, &mesh, false));
        assert!(!defines.is_dirty());

        scene.environment_mut().clip_planes[2] = Some(Vec4::new(0.0, 1.0, 0.0, 0.0));
        assert!(prepare_defines_for_frame_bound_values(&mut defines, &scene, &mesh, true));
        assert!(defines.is_set("CLIPPLANE3"));
        assert!(defines.is_set("INSTANCES"));
        assert!(defines.is_dirty());
        assert!(!defines.is_concern_dirty(DirtyFlags::CONCERNS));
    }
}
