//! Multiview rendering define.

use crate::renderer::backend::EngineCaps;
use crate::resources::shader_defines::{DefineSet, DefineSetBuilder, DirtyFlags};
use crate::scene::Scene;

pub fn register_defines(builder: &mut DefineSetBuilder) {
    builder.flag("MULTIVIEW", DirtyFlags::empty());
}

/// `MULTIVIEW` follows the active camera; a change marks `defines` unprocessed.
pub fn prepare_defines_for_multiview(defines: &mut DefineSet, scene: &Scene, caps: &EngineCaps) -> bool {
    let multiview = caps.multiview && scene.camera.is_multiview();
    let changed = defines.set("MULTIVIEW", multiview);
    if changed {
        defines.mark_as_unprocessed();
    }
    changed
}
