//! Effect resolution per submesh.
//!
//! ```text
//! no wrapper ──► defines stale ──► compiling ──► ready
//!                     ▲                │           │
//!                     └── hot swap ────┘           │
//!                     └────────── concern dirt ◄───┘
//! ```
//!
//! A readiness check never blocks: a texture still loading or a program still
//! compiling answers `false` and the caller asks again next frame.

use crate::renderer::RenderContext;
use crate::renderer::pipeline::{
    EffectId, EffectRequest, EffectStatus, FallbackChain, handle_fallbacks_for_shadows,
};
use crate::resources::image_processing::ImageProcessingConfiguration;
use crate::resources::material::bind;
use crate::resources::material::prepare::{
    attributes, frame_bound, lights, misc, multiview, oit, prepass, register_common_defines, textures,
};
use crate::resources::material::profile::{
    EffectInterface, MaterialProfile, PrepareContext, fallback_if_set,
};
use crate::resources::material::{DrawWrapper, Material, MaterialHooks};
use crate::resources::mesh::Mesh;
use crate::resources::shader_defines::{DefineSet, DirtyFlags};
use crate::resources::uniform_buffer::UniformBuffer;
use crate::scene::Scene;

impl<P: MaterialProfile> Material<P> {
    /// Whether `sub_mesh` of `mesh` can be drawn with this material now.
    ///
    /// Refreshes the submesh's defines, requests the matching effect and
    /// advances its compilation. Frozen materials answer from the previous
    /// result without any define work once the submesh was ready.
    pub fn is_ready_for_sub_mesh(
        &mut self,
        ctx: &mut RenderContext<'_>,
        mesh: &Mesh,
        sub_mesh: u32,
        use_instances: bool,
    ) -> bool {
        let key = mesh.sub_mesh(sub_mesh);

        if let Some(wrapper) = self.wrappers.get(&key) {
            if self.frozen
                && wrapper.was_previously_ready
                && wrapper.was_previously_using_instances == Some(use_instances)
                && wrapper.effect.is_some_and(|effect| ctx.effects.contains(effect))
            {
                return true;
            }
        }

        let scene = ctx.scene;
        let caps = *ctx.backend.caps();
        if !self.layout_built {
            let use_ubo = ctx.settings.use_uniform_buffers && caps.uniform_buffers;
            self.build_uniform_layout(scene, use_ubo);
        }

        let Self {
            profile,
            settings,
            frozen,
            capabilities,
            ubo,
            wrappers,
            hooks,
            stats,
            ..
        } = self;
        let profile = &*profile;
        let settings = &*settings;
        let capabilities = &**capabilities;

        let wrapper = wrappers.entry(key).or_insert_with(|| {
            let defines = build_define_set(profile, scene, settings.max_simultaneous_lights);
            capabilities.subscribe(&defines);
            log::debug!(
                "Submesh {}#{} attached to `{}` ({} defines)",
                mesh.name,
                sub_mesh,
                profile.shader_name(),
                defines.len()
            );
            DrawWrapper::new(defines)
        });

        if wrapper.effect.is_some_and(|effect| !ctx.effects.contains(effect)) {
            log::debug!("Effect cache was reset; submesh {}#{} starts over", mesh.name, sub_mesh);
            wrapper.reset_effect();
        }

        wrapper.sync_versions(scene, mesh);

        let render_id = scene.render_id();
        if !ctx.settings.check_ready_on_every_call
            && wrapper.was_previously_ready
            && wrapper.validated_render_id == Some(render_id)
            && wrapper.was_previously_using_instances == Some(use_instances)
            && !wrapper.defines.is_dirty()
        {
            return true;
        }

        stats.define_passes += 1;

        let prep = PrepareContext {
            scene,
            mesh,
            settings,
            capabilities,
            caps: &caps,
        };
        let mesh_state = mesh.state();
        let defines = &mut wrapper.defines;

        // ─── Textures ────────────────────────────────────────────────────────
        let mut deferred = false;
        if defines.is_concern_dirty(DirtyFlags::TEXTURES) {
            if !textures::check_slots_ready(profile, &prep) || !profile.textures_ready(&prep) {
                wrapper.was_previously_ready = false;
                return false;
            }
            deferred = textures::prepare_texture_slots(profile, defines, &prep);
            profile.prepare_texture_defines(defines, &prep);
        }

        // ─── Scene-driven passes ─────────────────────────────────────────────
        let max_lights = settings.max_simultaneous_lights;
        lights::prepare_defines_for_lights(defines, &prep, max_lights, profile.specular_supported());

        multiview::prepare_defines_for_multiview(defines, scene, &caps);
        let blending = profile.need_alpha_blending_for_mesh(settings, mesh_state);
        let oit_enabled = scene.environment().order_independent_transparency && blending;
        let can_render_to_mrt = profile.can_render_to_mrt() && !oit_enabled && caps.max_draw_buffers > 1;
        prepass::prepare_defines_for_prepass(defines, scene, can_render_to_mrt);
        oit::prepare_defines_for_oit(defines, scene, &caps, blending);

        if defines.is_concern_dirty(DirtyFlags::IMAGE_PROCESSING) {
            let image_processing = scene.image_processing();
            if !image_processing.is_ready(capabilities) {
                wrapper.was_previously_ready = false;
                return false;
            }
            image_processing.prepare_defines(defines, capabilities, false);
        }

        profile.prepare_defines(defines, &prep);

        let alpha_test = profile.should_turn_alpha_test_on(settings, mesh_state);
        misc::prepare_defines_for_misc(defines, &prep, alpha_test);
        frame_bound::prepare_defines_for_frame_bound_values(defines, scene, mesh_state, use_instances);
        attributes::prepare_defines_for_attributes(
            defines,
            mesh_state,
            profile.uses_vertex_colors(),
            true,
            profile.uses_morph_targets(),
        );

        // ─── Effect request ──────────────────────────────────────────────────
        let mut polled: Option<(EffectId, EffectStatus)> = None;
        if defines.is_dirty() {
            let serialized = defines.serialize();
            defines.mark_as_processed();
            stats.effect_requests += 1;

            let shader = profile.shader_name();
            let effect = match ctx.effects.lookup(shader, &serialized) {
                Some(effect) => effect,
                None => {
                    let request = build_request(profile, scene, defines, ubo, max_lights, serialized);
                    ctx.effects.get_or_create(request)
                }
            };
            let status = ctx.effects.poll(effect, ctx.shaders, ctx.backend);

            let previous = wrapper.effect.filter(|prev| *prev != effect);
            match (&status, previous) {
                (EffectStatus::Failed { diagnostic }, Some(previous)) => {
                    report_failure(wrapper, hooks, effect, diagnostic);
                    log::warn!("Keeping effect #{} after failed replacement", previous.index());
                    wrapper.pending_effect = None;
                    wrapper.hot_swap_frames = 0;
                }
                (status, Some(previous))
                    if status.is_pending() && settings.allow_shader_hot_swapping =>
                {
                    wrapper.pending_effect = Some(effect);
                    wrapper.hot_swap_frames += 1;
                    if wrapper.hot_swap_frames > ctx.settings.max_hot_swap_frames {
                        log::warn!(
                            "Effect #{} still compiling after {} frames; dropping #{}",
                            effect.index(),
                            ctx.settings.max_hot_swap_frames,
                            previous.index()
                        );
                        wrapper.set_effect(effect);
                    } else {
                        log::trace!("Hot swap: drawing #{} while #{} compiles", previous.index(), effect.index());
                        wrapper.defines.mark_as_unprocessed();
                    }
                }
                _ => wrapper.set_effect(effect),
            }
            polled = Some((effect, status));
        }

        // ─── Current effect ──────────────────────────────────────────────────
        let ready = match wrapper.effect {
            Some(effect) => {
                let status = match polled {
                    Some((id, status)) if id == effect => status,
                    _ => ctx.effects.poll(effect, ctx.shaders, ctx.backend),
                };
                settle(wrapper, hooks, ctx, effect, status)
            }
            None => false,
        };

        let hot_swapping = wrapper.pending_effect.is_some();
        if deferred {
            wrapper.defines.mark_as(DirtyFlags::TEXTURES);
        }
        wrapper.was_previously_ready = ready && !deferred && !(hot_swapping && *frozen);
        if wrapper.was_previously_using_instances.is_some_and(|was| was != use_instances) {
            wrapper.force_rebind_on_next_call = true;
        }
        wrapper.was_previously_using_instances = Some(use_instances);
        if ready {
            wrapper.validated_render_id = Some(render_id);
        }
        ready
    }

    fn build_uniform_layout(&mut self, scene: &Scene, use_ubo: bool) {
        self.ubo.set_use_ubo(use_ubo);
        bind::add_slot_uniforms(&self.profile, scene, &mut self.ubo);
        self.ubo.add_uniform("pointSize", 1);
        self.profile.build_uniform_layout(&mut self.ubo);
        self.ubo.create();
        self.layout_built = true;
        log::debug!(
            "Material block for `{}`: {} bytes, {}",
            self.name,
            self.ubo.byte_len(),
            if use_ubo { "uniform buffer" } else { "loose uniforms" }
        );
    }
}

/// Every define key a submesh of `profile` can use, in serialization order.
pub(crate) fn build_define_set<P: MaterialProfile + ?Sized>(
    profile: &P,
    scene: &Scene,
    max_lights: u32,
) -> DefineSet {
    let mut builder = DefineSet::builder();
    textures::register_slot_defines(profile, scene, &mut builder);
    profile.register_defines(&mut builder);
    register_common_defines(&mut builder, max_lights);
    builder.build()
}

fn build_request<P: MaterialProfile + ?Sized>(
    profile: &P,
    scene: &Scene,
    defines: &DefineSet,
    ubo: &UniformBuffer,
    max_lights: u32,
    serialized: String,
) -> EffectRequest {
    let mut fallbacks = FallbackChain::new();
    let mut iface = EffectInterface::default();

    attributes::collect_attributes(defines, &mut fallbacks, &mut iface);
    bind::collect_common_interface(defines, &mut iface);
    for name in ubo.uniform_names() {
        iface.uniform(name);
    }
    bind::collect_slot_samplers(profile, scene, defines, &mut iface);
    lights::prepare_uniforms_and_samplers_for_lights(defines, &mut iface, max_lights);

    let mut uniforms = Vec::new();
    let mut samplers = Vec::new();
    ImageProcessingConfiguration::collect_interface(&mut uniforms, &mut samplers);
    iface.uniforms(&uniforms);
    for sampler in samplers {
        iface.sampler(sampler);
    }
    profile.collect_interface(defines, &mut iface);

    add_common_fallbacks(defines, &mut fallbacks, max_lights);
    profile.add_fallbacks(defines, &mut fallbacks);

    if ubo.use_ubo() {
        iface.uniform_blocks.push(ubo.label().to_string());
    }

    EffectRequest {
        shader: profile.shader_name().to_string(),
        defines: serialized,
        attributes: iface.attributes,
        uniforms: iface.uniforms,
        samplers: iface.samplers,
        uniform_blocks: iface.uniform_blocks,
        fallbacks,
    }
}

fn add_common_fallbacks(defines: &DefineSet, chain: &mut FallbackChain, max_lights: u32) {
    fallback_if_set(defines, chain, 0, "POINTSIZE");
    fallback_if_set(defines, chain, 0, "LOGARITHMICDEPTH");
    fallback_if_set(defines, chain, 0, "MULTIVIEW");
    fallback_if_set(defines, chain, 1, "FOG");
    handle_fallbacks_for_shadows(defines, chain, max_lights, 0);
}

/// Applies the outcome of polling the submesh's current effect.
fn settle(
    wrapper: &mut DrawWrapper,
    hooks: &mut MaterialHooks,
    ctx: &RenderContext<'_>,
    effect: EffectId,
    status: EffectStatus,
) -> bool {
    match status {
        EffectStatus::Ready(_) => {
            if wrapper.compiled_notified != Some(effect) {
                wrapper.compiled_notified = Some(effect);
                if let Some(hook) = hooks.on_compiled.as_mut() {
                    hook(effect);
                }
            }
            wrapper.last_ready_effect = Some(effect);
            true
        }
        EffectStatus::Failed { diagnostic } => {
            report_failure(wrapper, hooks, effect, &diagnostic);
            match wrapper
                .last_ready_effect
                .filter(|last| *last != effect && ctx.effects.is_ready(*last))
            {
                Some(last) => {
                    log::warn!("Falling back to effect #{}", last.index());
                    wrapper.set_effect(last);
                    true
                }
                None => false,
            }
        }
        EffectStatus::AwaitingSource | EffectStatus::Compiling => false,
    }
}

/// Invokes `on_error` once per failed effect.
fn report_failure(wrapper: &mut DrawWrapper, hooks: &mut MaterialHooks, effect: EffectId, diagnostic: &str) {
    if wrapper.reported_failures.contains(&effect) {
        return;
    }
    wrapper.reported_failures.push(effect);
    log::warn!("Effect #{} failed: {diagnostic}", effect.index());
    if let Some(hook) = hooks.on_error.as_mut() {
        hook(effect, diagnostic);
    }
}
