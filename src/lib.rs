#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod utils;

pub use errors::{MythError, Result};
pub use renderer::{EngineCaps, HeadlessBackend, RenderContext, Renderer, RendererSettings, ShaderBackend};
pub use renderer::pipeline::{EffectCache, EffectId, EffectStatus, FallbackChain, ShaderLibrary, ShaderSource};
pub use resources::{
    BackgroundMaterial, BackgroundProfile, CapabilityFlags, DefineSet, DirtyFlags, Material,
    MaterialBuilder, MaterialProfile, MaterialSettings, Mesh, PbrMaterial, PbrProfile,
    RenderCapabilities, StandardMaterial, StandardProfile, Texture, TextureRef, TransparencyMode,
};
pub use scene::{Camera, Light, Scene};
pub use utils::interner;
