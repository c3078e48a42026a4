//! Miscellaneous material defines: depth mode, point size, fog, scaling and
//! alpha testing.

use crate::resources::material::profile::PrepareContext;
use crate::resources::shader_defines::{DefineSet, DefineSetBuilder, DirtyFlags, format_float_define};

pub fn register_defines(builder: &mut DefineSetBuilder) {
    builder
        .flags(
            &["LOGARITHMICDEPTH", "POINTSIZE", "FOG", "NONUNIFORMSCALING", "ALPHATEST"],
            DirtyFlags::MISC,
        )
        .string("ALPHATESTVALUE", "0.4", DirtyFlags::MISC);
}

/// Fog applies when the material, the mesh and the scene all allow it.
#[must_use]
pub fn fog_state(ctx: &PrepareContext<'_>) -> bool {
    ctx.settings.fog_enabled && ctx.mesh_state().apply_fog && ctx.scene.environment().fog.is_enabled()
}

pub fn prepare_defines_for_misc(defines: &mut DefineSet, ctx: &PrepareContext<'_>, alpha_test: bool) {
    if !defines.is_concern_dirty(DirtyFlags::MISC) {
        return;
    }
    let settings = ctx.settings;
    defines.set("LOGARITHMICDEPTH", settings.use_logarithmic_depth);
    defines.set(
        "POINTSIZE",
        settings.points_cloud || ctx.scene.environment().force_points_cloud,
    );
    defines.set("FOG", fog_state(ctx));
    defines.set("NONUNIFORMSCALING", ctx.mesh_state().non_uniform_scaling);
    defines.set("ALPHATEST", alpha_test);
    defines.set("ALPHATESTVALUE", format_float_define(settings.alpha_cut_off));
}
