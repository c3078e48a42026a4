//! Prepass (multiple render target) defines.
//!
//! `PREPASS_<KIND>_INDEX` holds the attachment's MRT slot, `-1` when the
//! prepass renderer does not produce that kind.

use crate::resources::shader_defines::{DefineSet, DefineSetBuilder, DirtyFlags};
use crate::scene::{PrepassTextureKind, Scene};

pub fn register_defines(builder: &mut DefineSetBuilder) {
    builder
        .flag("PREPASS", DirtyFlags::PREPASS)
        .int("SCENE_MRT_COUNT", 0, DirtyFlags::PREPASS);
    for kind in PrepassTextureKind::ALL {
        let suffix = kind.define_suffix();
        builder
            .flag(&format!("PREPASS_{suffix}"), DirtyFlags::PREPASS)
            .int(&format!("PREPASS_{suffix}_INDEX"), -1, DirtyFlags::PREPASS);
    }
}

pub fn prepare_defines_for_prepass(defines: &mut DefineSet, scene: &Scene, can_render_to_mrt: bool) {
    if !defines.is_concern_dirty(DirtyFlags::PREPASS) {
        return;
    }
    let previous = defines.is_set("PREPASS");

    match scene
        .environment()
        .active_prepass()
        .filter(|_| can_render_to_mrt)
    {
        Some(prepass) => {
            defines.set("PREPASS", true);
            defines.set("SCENE_MRT_COUNT", prepass.mrt_count() as u32);
            for kind in PrepassTextureKind::ALL {
                let suffix = kind.define_suffix();
                let index = prepass.index_of(kind);
                defines.set(&format!("PREPASS_{suffix}"), index.is_some());
                defines.set(
                    &format!("PREPASS_{suffix}_INDEX"),
                    index.map_or(-1, |i| i as i32),
                );
            }
        }
        None => {
            defines.set("PREPASS", false);
            defines.set("SCENE_MRT_COUNT", 0);
            for kind in PrepassTextureKind::ALL {
                let suffix = kind.define_suffix();
                defines.set(&format!("PREPASS_{suffix}"), false);
                defines.set(&format!("PREPASS_{suffix}_INDEX"), -1);
            }
        }
    }

    if defines.is_set("PREPASS") != previous {
        defines.mark_as_unprocessed();
        defines.mark_as(DirtyFlags::IMAGE_PROCESSING);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::PrepassConfig;

    #[test]
    fn test_indices_follow_attachments() {
        let mut b = DefineSet::builder();
        register_defines(&mut b);
        let mut defines = b.build();

        let mut scene = Scene::new();
        scene.environment_mut().prepass = Some(PrepassConfig {
            enabled: true,
            attachments: vec![PrepassTextureKind::Depth, PrepassTextureKind::Normal],
        });

        prepare_defines_for_prepass(&mut defines, &scene, true);
        assert!(defines.is_set("PREPASS"));
        assert_eq!(defines.int("SCENE_MRT_COUNT"), 3);
        assert_eq!(defines.int("PREPASS_DEPTH_INDEX"), 1);
        assert_eq!(defines.int("PREPASS_NORMAL_INDEX"), 2);
        assert_eq!(defines.int("PREPASS_ALBEDO_INDEX"), -1);
        assert!(!defines.is_set("PREPASS_ALBEDO"));

        let serialized = defines.serialize();
        assert!(serialized.contains("#define PREPASS_DEPTH_INDEX 1\n"));
        assert!(!serialized.contains("PREPASS_ALBEDO_INDEX"));
    }

    #[test]
    fn test_no_mrt_disables_prepass() {
        let mut b = DefineSet::builder();
        register_defines(&mut b);
        let mut defines = b.build();

        let mut scene = Scene::new();
        scene.environment_mut().prepass = Some(PrepassConfig {
            enabled: true,
            attachments: vec![PrepassTextureKind::Depth],
        });
        prepare_defines_for_prepass(&mut defines, &scene, false);
        assert!(!defines.is_set("PREPASS"));
    }
}
