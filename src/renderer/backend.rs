//! Shader Backend Abstraction
//!
//! The only path from the shading core to a GPU driver. Program compilation
//! is asynchronous: [`ShaderBackend::compile_program`] returns a ticket that is
//! polled once per readiness check until it resolves.
//!
//! Attribute locations, texture units and binding slots are the backend's
//! business; the core only hands over names.

use serde::{Deserialize, Serialize};

use crate::resources::texture::Texture;
use crate::resources::uniform_buffer::{UniformBlockId, UniformValue};

/// Ticket of an in-flight program compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramTicket(pub u64);

/// Handle to a linked GPU program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u64);

/// Compilation progress reported by [`ShaderBackend::poll_program`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramStatus {
    Pending,
    Ready(ProgramHandle),
    /// Compile or link failed; carries the driver diagnostic.
    Failed(String),
}

/// Target shading language of the generated sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShaderLanguage {
    #[default]
    Glsl,
    Wgsl,
}

/// Everything a backend needs to build one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSource {
    /// Shader family name, e.g. `"default"` or `"pbr"`.
    pub name: String,
    pub vertex: String,
    pub fragment: String,
    /// The `#define` header already prepended to both stages.
    pub defines: String,
    pub attributes: Vec<String>,
    pub uniforms: Vec<String>,
    pub samplers: Vec<String>,
    pub uniform_blocks: Vec<String>,
    pub language: ShaderLanguage,
}

/// Device feature set relevant to define preparation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineCaps {
    pub standard_derivatives: bool,
    pub texture_lod: bool,
    pub uniform_buffers: bool,
    pub multiview: bool,
    pub texture_float_render: bool,
    pub texture_float_linear_filtering: bool,
    pub texture_half_float_render: bool,
    pub texture_half_float_linear_filtering: bool,
    pub max_draw_buffers: u32,
}

impl Default for EngineCaps {
    fn default() -> Self {
        Self {
            standard_derivatives: true,
            texture_lod: true,
            uniform_buffers: true,
            multiview: false,
            texture_float_render: true,
            texture_float_linear_filtering: true,
            texture_half_float_render: true,
            texture_half_float_linear_filtering: true,
            max_draw_buffers: 8,
        }
    }
}

/// GPU driver seam.
pub trait ShaderBackend {
    fn caps(&self) -> &EngineCaps;

    /// Starts compiling `source`; never blocks.
    fn compile_program(&mut self, source: &ProgramSource) -> ProgramTicket;

    fn poll_program(&mut self, ticket: ProgramTicket) -> ProgramStatus;

    /// Replaces the whole contents of a uniform block.
    fn upload_uniform_block(&mut self, block: UniformBlockId, data: &[u8]);

    fn bind_uniform_block(&mut self, program: ProgramHandle, block: UniformBlockId, name: &str);

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: &UniformValue);

    /// Binds `texture` to sampler `name`; `None` unbinds.
    fn set_texture(&mut self, program: ProgramHandle, name: &str, texture: Option<&Texture>);
}
