//! Order-independent transparency defines.

use crate::renderer::backend::EngineCaps;
use crate::resources::shader_defines::{DefineSet, DefineSetBuilder, DirtyFlags};
use crate::scene::Scene;

pub fn register_defines(builder: &mut DefineSetBuilder) {
    builder.flags(
        &[
            "ORDER_INDEPENDENT_TRANSPARENCY",
            "ORDER_INDEPENDENT_TRANSPARENCY_16BITS",
        ],
        DirtyFlags::empty(),
    );
}

/// Enabled for blended submeshes while the scene renders with OIT.
pub fn prepare_defines_for_oit(
    defines: &mut DefineSet,
    scene: &Scene,
    caps: &EngineCaps,
    need_alpha_blending: bool,
) -> bool {
    let oit = scene.environment().order_independent_transparency && need_alpha_blending;
    let mut changed = defines.set("ORDER_INDEPENDENT_TRANSPARENCY", oit);
    changed |= defines.set(
        "ORDER_INDEPENDENT_TRANSPARENCY_16BITS",
        oit && !caps.texture_float_linear_filtering,
    );
    if changed {
        defines.mark_as_unprocessed();
    }
    changed
}
