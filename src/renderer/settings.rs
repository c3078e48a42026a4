//! Renderer Settings
//!
//! Global configuration for the shading core, consumed when a
//! [`Renderer`](crate::renderer::Renderer) is created. Settings are plain
//! serde data so hosts can keep them next to the rest of their configuration.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use myth_shading::renderer::{RendererSettings, ShaderLanguage};
//!
//! let settings = RendererSettings {
//!     shader_language: ShaderLanguage::Wgsl,
//!     max_hot_swap_frames: 30,
//!     ..Default::default()
//! };
//!
//! // or from JSON, missing fields fall back to the defaults
//! let settings = RendererSettings::from_json(r#"{ "use_uniform_buffers": false }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{MythError, Result};
use crate::renderer::backend::ShaderLanguage;
use crate::resources::capabilities::CapabilitySettings;

/// Global configuration for renderer initialization.
///
/// # Fields
///
/// | Field                       | Description                                        | Default |
/// |-----------------------------|----------------------------------------------------|---------|
/// | `shader_language`           | Language of generated program sources              | `Glsl`  |
/// | `use_uniform_buffers`       | Upload material blocks instead of loose uniforms   | `true`  |
/// | `max_hot_swap_frames`       | Frames a stale effect may stand in for a new one   | `60`    |
/// | `check_ready_on_every_call` | Disable the same-frame readiness shortcut          | `false` |
/// | `capabilities`              | Initial capability switches                        | all on  |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub shader_language: ShaderLanguage,

    /// Material uniforms live in one block per material.
    ///
    /// Forced off when the backend reports no uniform-buffer support. Without
    /// blocks every material uniform is re-sent after a program switch and the
    /// frozen-material bind shortcut never applies.
    pub use_uniform_buffers: bool,

    /// Consecutive frames a submesh may keep drawing with its previous effect
    /// while the replacement compiles.
    ///
    /// Once exceeded the replacement is adopted and the submesh reports
    /// not-ready until it finishes, so a permanently slow compile cannot pin
    /// stale shading forever.
    pub max_hot_swap_frames: u32,

    /// Re-run readiness checks even when a submesh was already validated
    /// during the current render id.
    pub check_ready_on_every_call: bool,

    pub capabilities: CapabilitySettings,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            shader_language: ShaderLanguage::Glsl,
            use_uniform_buffers: true,
            max_hot_swap_frames: 60,
            check_ready_on_every_call: false,
            capabilities: CapabilitySettings::default(),
        }
    }
}

impl RendererSettings {
    /// Decodes settings from JSON; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| MythError::InvalidSettings(err.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| MythError::InvalidSettings(err.to_string()))
    }
}
