//! Texture slot defines.
//!
//! Works over any profile's slot table. A read-only pre-check runs first so a
//! submesh that cannot draw yet leaves its defines untouched; then each slot
//! writes its presence define, its `xxxDIRECTUV` index and the `MAINUVn`
//! channel it samples.

use crate::resources::material::profile::{MaterialProfile, PrepareContext, SlotDesc, SlotReadiness};
use crate::resources::shader_defines::{DefineSet, DefineSetBuilder, DirtyFlags};
use crate::resources::texture::{Texture, TextureRef};
use crate::scene::Scene;

pub const MAIN_UV_COUNT: u32 = 6;

/// Registers `MAINUV1..6` plus every slot's presence and direct-UV defines.
pub fn register_slot_defines<P: MaterialProfile + ?Sized>(
    profile: &P,
    scene: &Scene,
    builder: &mut DefineSetBuilder,
) {
    for channel in 1..=MAIN_UV_COUNT {
        builder.flag(&format!("MAINUV{channel}"), DirtyFlags::TEXTURES);
    }
    profile.visit_slots(scene, &mut |desc, _| {
        builder.flag(desc.define, DirtyFlags::TEXTURES);
        if let Some(direct_uv) = desc.direct_uv {
            builder.int(direct_uv, 0, DirtyFlags::TEXTURES);
        }
    });
}

#[inline]
fn slot_ready(desc: &SlotDesc, texture: &Texture) -> bool {
    match desc.readiness {
        SlotReadiness::MustBeReady => texture.is_ready(),
        SlotReadiness::NotBlocking => texture.is_ready_or_not_blocking(),
    }
}

/// `false` when an enabled slot's texture cannot be used yet.
///
/// Never mutates `defines`.
#[must_use]
pub fn check_slots_ready<P: MaterialProfile + ?Sized>(profile: &P, ctx: &PrepareContext<'_>) -> bool {
    let mut ready = true;
    profile.visit_slots(ctx.scene, &mut |desc, texture| {
        let Some(texture) = texture else { return };
        if desc.is_enabled(ctx.capabilities, ctx.caps) && !slot_ready(desc, texture) {
            log::trace!("Slot {} waiting for `{}`", desc.define, texture.name);
            ready = false;
        }
    });
    ready
}

/// Writes every slot's defines. Returns `true` when a not-blocking texture
/// was left out because it is still loading.
pub fn prepare_texture_slots<P: MaterialProfile + ?Sized>(
    profile: &P,
    defines: &mut DefineSet,
    ctx: &PrepareContext<'_>,
) -> bool {
    let mut main_uvs = [false; MAIN_UV_COUNT as usize];
    let mut need_uvs = false;
    let mut deferred = false;

    profile.visit_slots(ctx.scene, &mut |desc, texture| {
        let usable = texture.filter(|_| desc.is_enabled(ctx.capabilities, ctx.caps));
        match usable {
            Some(texture) if texture.is_ready() => {
                defines.set(desc.define, true);
                if let Some(direct_uv) = desc.direct_uv {
                    need_uvs = true;
                    defines.set(direct_uv, merged_uv(texture, &mut main_uvs));
                }
            }
            Some(_) => {
                deferred = true;
                clear_slot(defines, desc);
            }
            None => clear_slot(defines, desc),
        }
    });

    for (channel, used) in (1..=MAIN_UV_COUNT).zip(main_uvs) {
        defines.set(&format!("MAINUV{channel}"), used);
    }
    defines.hints_mut().need_uvs = need_uvs;
    deferred
}

fn clear_slot(defines: &mut DefineSet, desc: &SlotDesc) {
    defines.set(desc.define, false);
    if let Some(direct_uv) = desc.direct_uv {
        defines.set(direct_uv, 0);
    }
}

/// Direct-UV value of a texture: `coordinates_index + 1` when it can sample
/// its channel directly, else `0` (a texture matrix is applied).
fn merged_uv(texture: &TextureRef, main_uvs: &mut [bool; MAIN_UV_COUNT as usize]) -> i32 {
    if !texture.can_use_direct_uv() {
        return 0;
    }
    let index = texture.coordinates_index as usize;
    if let Some(used) = main_uvs.get_mut(index) {
        *used = true;
    }
    texture.coordinates_index as i32 + 1
}
