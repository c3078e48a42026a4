//! Renderer front
//!
//! Owns the pieces shared by every material: settings, the capability
//! configuration, the effect cache, the shader library and the backend.
//! Each frame it lends them to materials as a [`RenderContext`].
//!
//! ```rust,ignore
//! let mut renderer = Renderer::new(HeadlessBackend::new(), RendererSettings::default())?;
//! renderer.register_shader("default", ShaderSource::new(vs, fs))?;
//!
//! let mut material = renderer.material_builder(StandardProfile::default()).build(renderer.shaders())?;
//! let mut ctx = renderer.context(&scene);
//! if material.is_ready_for_sub_mesh(&mut ctx, &mesh, 0, false) {
//!     material.bind_for_sub_mesh(&mut ctx, &mesh, 0, &world);
//! }
//! ```

pub mod backend;
pub mod headless;
pub mod pipeline;
pub mod settings;

use std::sync::Arc;

pub use backend::{
    EngineCaps, ProgramHandle, ProgramSource, ProgramStatus, ProgramTicket, ShaderBackend,
    ShaderLanguage,
};
pub use headless::{BackendStats, HeadlessBackend};
pub use settings::RendererSettings;

use crate::errors::Result;
use crate::renderer::pipeline::{EffectCache, ShaderLibrary, ShaderSource};
use crate::resources::capabilities::RenderCapabilities;
use crate::resources::material::MaterialProfile;
use crate::resources::material_builder::MaterialBuilder;
use crate::scene::Scene;
use crate::utils::interner;

/// Per-frame view over the renderer handed to materials.
pub struct RenderContext<'a> {
    pub scene: &'a Scene,
    pub settings: &'a RendererSettings,
    pub effects: &'a mut EffectCache,
    pub shaders: &'a mut ShaderLibrary,
    pub backend: &'a mut dyn ShaderBackend,
}

pub struct Renderer<B: ShaderBackend> {
    settings: RendererSettings,
    capabilities: Arc<RenderCapabilities>,
    effects: EffectCache,
    shaders: ShaderLibrary,
    backend: B,
}

impl<B: ShaderBackend> Renderer<B> {
    pub fn new(backend: B, mut settings: RendererSettings) -> Result<Self> {
        if settings.use_uniform_buffers && !backend.caps().uniform_buffers {
            log::info!("Backend has no uniform buffer support; material blocks disabled");
            settings.use_uniform_buffers = false;
        }
        interner::preload_common_defines();

        Ok(Self {
            capabilities: Arc::new(RenderCapabilities::new(&settings.capabilities)),
            effects: EffectCache::new(settings.shader_language),
            shaders: ShaderLibrary::new()?,
            settings,
            backend,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Shared capability configuration; hand it to every material.
    #[must_use]
    pub fn capabilities(&self) -> &Arc<RenderCapabilities> {
        &self.capabilities
    }

    #[must_use]
    pub fn shaders(&self) -> &ShaderLibrary {
        &self.shaders
    }

    pub fn shaders_mut(&mut self) -> &mut ShaderLibrary {
        &mut self.shaders
    }

    pub fn register_shader(&mut self, name: &str, source: ShaderSource) -> Result<()> {
        self.shaders.register(name, source)
    }

    #[must_use]
    pub fn effects(&self) -> &EffectCache {
        &self.effects
    }

    /// Clearing the cache makes every material request its effects again.
    pub fn effects_mut(&mut self) -> &mut EffectCache {
        &mut self.effects
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// A builder already wired to this renderer's capability configuration.
    #[must_use]
    pub fn material_builder<P: MaterialProfile>(&self, profile: P) -> MaterialBuilder<P> {
        MaterialBuilder::new(profile).capabilities(Arc::clone(&self.capabilities))
    }

    pub fn context<'a>(&'a mut self, scene: &'a Scene) -> RenderContext<'a> {
        RenderContext {
            scene,
            settings: &self.settings,
            effects: &mut self.effects,
            shaders: &mut self.shaders,
            backend: &mut self.backend,
        }
    }
}
