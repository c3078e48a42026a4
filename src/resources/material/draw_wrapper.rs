//! Per-submesh draw state.
//!
//! A [`DrawWrapper`] pairs the submesh's [`DefineSet`] with the effect it draws
//! with, plus the bookkeeping the readiness state machine needs between frames.

use smallvec::SmallVec;

use crate::renderer::pipeline::EffectId;
use crate::resources::mesh::Mesh;
use crate::resources::shader_defines::{DefineSet, DirtyFlags};
use crate::scene::Scene;

/// Last observed version of each external state source.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SeenVersions {
    lights: u64,
    environment: u64,
    image_processing: u64,
    mesh: u64,
}

/// Scene versions the per-frame uniforms were last sent for.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BoundVersions {
    lights: u64,
    environment: u64,
    image_processing: u64,
    camera: u64,
}

impl BoundVersions {
    /// Records the current versions; `true` when any moved since the last bind.
    fn sync(&mut self, scene: &Scene) -> bool {
        let lights = scene.lights_tracker().sync(&mut self.lights);
        let environment = scene.environment_tracker().sync(&mut self.environment);
        let image_processing = scene.image_processing_tracker().sync(&mut self.image_processing);
        let camera = scene.camera.tracker().sync(&mut self.camera);
        lights || environment || image_processing || camera
    }
}

#[derive(Debug)]
pub struct DrawWrapper {
    pub(crate) defines: DefineSet,
    pub(crate) effect: Option<EffectId>,
    /// Effect compiling behind a hot-swapped previous one.
    pub(crate) pending_effect: Option<EffectId>,
    pub(crate) last_ready_effect: Option<EffectId>,
    pub(crate) hot_swap_frames: u32,

    pub(crate) was_previously_ready: bool,
    pub(crate) was_previously_using_instances: Option<bool>,
    pub(crate) force_rebind_on_next_call: bool,
    pub(crate) validated_render_id: Option<u64>,

    pub(crate) compiled_notified: Option<EffectId>,
    pub(crate) reported_failures: SmallVec<[EffectId; 2]>,

    seen: SeenVersions,
    bound: BoundVersions,
}

impl DrawWrapper {
    pub(crate) fn new(defines: DefineSet) -> Self {
        Self {
            defines,
            effect: None,
            pending_effect: None,
            last_ready_effect: None,
            hot_swap_frames: 0,
            was_previously_ready: false,
            was_previously_using_instances: None,
            force_rebind_on_next_call: false,
            validated_render_id: None,
            compiled_notified: None,
            reported_failures: SmallVec::new(),
            seen: SeenVersions::default(),
            bound: BoundVersions::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn defines(&self) -> &DefineSet {
        &self.defines
    }

    #[inline]
    #[must_use]
    pub fn effect(&self) -> Option<EffectId> {
        self.effect
    }

    #[inline]
    #[must_use]
    pub fn pending_effect(&self) -> Option<EffectId> {
        self.pending_effect
    }

    #[inline]
    #[must_use]
    pub fn was_previously_ready(&self) -> bool {
        self.was_previously_ready
    }

    /// Switches to `effect`; a different effect forces a full rebind.
    pub(crate) fn set_effect(&mut self, effect: EffectId) {
        if self.effect != Some(effect) {
            self.effect = Some(effect);
            self.force_rebind_on_next_call = true;
        }
        self.pending_effect = None;
        self.hot_swap_frames = 0;
    }

    /// Forgets a handle invalidated by an effect cache reset.
    pub(crate) fn reset_effect(&mut self) {
        self.effect = None;
        self.pending_effect = None;
        self.last_ready_effect = None;
        self.hot_swap_frames = 0;
        self.was_previously_ready = false;
        self.compiled_notified = None;
        self.reported_failures.clear();
        self.defines.mark_as_unprocessed();
    }

    /// Whether lights, environment, image processing or the camera moved
    /// since the last bind of this submesh.
    pub(crate) fn frame_inputs_moved(&mut self, scene: &Scene) -> bool {
        self.bound.sync(scene)
    }

    /// Turns external version changes into concern dirt.
    pub(crate) fn sync_versions(&mut self, scene: &Scene, mesh: &Mesh) {
        let mut concern = DirtyFlags::empty();
        if scene.lights_tracker().sync(&mut self.seen.lights) {
            concern |= DirtyFlags::LIGHTS;
        }
        if scene.environment_tracker().sync(&mut self.seen.environment) {
            concern |= DirtyFlags::MISC | DirtyFlags::TEXTURES | DirtyFlags::PREPASS;
        }
        if scene.image_processing_tracker().sync(&mut self.seen.image_processing) {
            concern |= DirtyFlags::IMAGE_PROCESSING;
        }
        if mesh.tracker().sync(&mut self.seen.mesh) {
            concern |= DirtyFlags::ATTRIBUTES | DirtyFlags::LIGHTS | DirtyFlags::MISC | DirtyFlags::TEXTURES;
        }
        if !concern.is_empty() {
            log::trace!("External state changed: {concern:?}");
            self.defines.mark_as(concern);
        }
    }
}
