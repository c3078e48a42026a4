//! Per-draw uniform binding.
//!
//! Two tiers sit on top of the always-sent mesh values (world matrix, bones):
//! - material values, skipped while a frozen material's block is in sync and
//!   the bound program did not change;
//! - per-frame values (lights, view, fog), skipped for such frozen materials
//!   only while scene lights, environment, image processing and camera stay
//!   at the versions last sent.
//!
//! The block is flushed on every call.

use glam::Mat4;

use crate::renderer::RenderContext;
use crate::resources::material::bind;
use crate::resources::material::prepare::lights;
use crate::resources::material::profile::{BindContext, MaterialProfile};
use crate::resources::material::Material;
use crate::resources::mesh::Mesh;
use crate::resources::uniform_buffer::UniformValue;

impl<P: MaterialProfile> Material<P> {
    /// Sends everything `sub_mesh` needs to be drawn with `world`.
    ///
    /// Does nothing until [`is_ready_for_sub_mesh`](Self::is_ready_for_sub_mesh)
    /// resolved a compiled effect for the submesh.
    pub fn bind_for_sub_mesh(
        &mut self,
        ctx: &mut RenderContext<'_>,
        mesh: &Mesh,
        sub_mesh: u32,
        world: &Mat4,
    ) {
        let Self {
            profile,
            settings,
            frozen,
            capabilities,
            ubo,
            wrappers,
            stats,
            ..
        } = self;
        let frozen = *frozen;

        let Some(wrapper) = wrappers.get_mut(&mesh.sub_mesh(sub_mesh)) else {
            log::warn!("bind_for_sub_mesh on {}#{} before any readiness check", mesh.name, sub_mesh);
            return;
        };
        let Some(effect) = wrapper.effect else {
            return;
        };
        let Some(program) = ctx.effects.program(effect) else {
            log::trace!("Effect #{} not compiled; bind skipped", effect.index());
            return;
        };

        let scene = ctx.scene;
        let caps = *ctx.backend.caps();
        let mesh_state = mesh.state();
        let frame_moved = wrapper.frame_inputs_moved(scene);
        let defines = &wrapper.defines;

        let switched = ubo.bind_to_effect(program, ctx.backend);

        ubo.set_uniform("world", UniformValue::Mat4(*world));
        ubo.set_uniform("visibility", UniformValue::Float(mesh_state.visibility));
        bind::bind_bones(mesh_state, defines, ubo, ctx.effects.bones_forced_to_cpu(effect));

        let must_rebind = switched
            || !(ubo.use_ubo() && frozen && ubo.is_sync() && !wrapper.force_rebind_on_next_call);
        let bind_ctx = BindContext {
            scene,
            mesh,
            defines,
            settings,
            capabilities: &**capabilities,
            caps: &caps,
        };

        if must_rebind {
            stats.material_binds += 1;
            ubo.set_uniform(
                "viewProjection",
                UniformValue::Mat4(scene.camera.view_projection_matrix()),
            );
            ubo.update_float("pointSize", settings.point_size);
            bind::bind_texture_slots(&*profile, scene, defines, ubo);
            profile.bind_material(ubo, &bind_ctx);
            bind::bind_clip_planes(scene, ubo);
            bind::bind_eye_position(scene, ubo);
        }

        if must_rebind || !frozen || frame_moved {
            stats.frame_binds += 1;
            if !must_rebind {
                // Camera-dependent values of the skipped material tier.
                ubo.set_uniform(
                    "viewProjection",
                    UniformValue::Mat4(scene.camera.view_projection_matrix()),
                );
                bind::bind_eye_position(scene, ubo);
            }
            if !settings.disable_lighting {
                lights::bind_lights(
                    scene,
                    mesh.uuid,
                    defines,
                    ubo,
                    settings.max_simultaneous_lights,
                    profile.specular_supported(),
                );
            }
            ubo.set_uniform("view", UniformValue::Mat4(scene.camera.view_matrix()));
            bind::bind_fog(scene, defines, ubo);
            bind::bind_morph_targets(mesh_state, defines, ubo);
            bind::bind_log_depth(scene, defines, ubo);
            scene.image_processing().bind(defines, ubo);
            profile.bind_frame(ubo, &bind_ctx);
        }

        ubo.update(ctx.backend);
        wrapper.force_rebind_on_next_call = false;
    }
}
