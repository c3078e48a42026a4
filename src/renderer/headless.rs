//! Headless Backend
//!
//! A recording [`ShaderBackend`] with no GPU behind it. Compilation resolves
//! after a configurable number of polls; programs whose define header contains
//! a rejected define fail with a diagnostic, which exercises fallback chains.
//! Every upload and binding is recorded for inspection.

use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::renderer::backend::{
    EngineCaps, ProgramHandle, ProgramSource, ProgramStatus, ProgramTicket, ShaderBackend,
};
use crate::resources::texture::Texture;
use crate::resources::uniform_buffer::{UniformBlockId, UniformValue};

/// Traffic counters of a [`HeadlessBackend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub programs_compiled: u64,
    pub programs_failed: u64,
    pub block_uploads: u64,
    pub block_binds: u64,
    pub uniform_writes: u64,
    pub texture_binds: u64,
}

#[derive(Debug)]
struct CompileJob {
    remaining_polls: u32,
    outcome: ProgramStatus,
}

#[derive(Debug, Default)]
pub struct HeadlessBackend {
    caps: EngineCaps,
    latency: u32,
    rejected_defines: Vec<String>,

    next_ticket: u64,
    next_program: u64,
    jobs: FxHashMap<ProgramTicket, CompileJob>,
    compiled: Vec<ProgramSource>,

    blocks: FxHashMap<UniformBlockId, Vec<u8>>,
    uniforms: FxHashMap<(ProgramHandle, String), UniformValue>,
    textures: FxHashMap<(ProgramHandle, String), Option<Uuid>>,

    stats: BackendStats,
}

impl HeadlessBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_caps(caps: EngineCaps) -> Self {
        Self {
            caps,
            ..Self::default()
        }
    }

    /// Polls a compilation needs before it resolves; `0` resolves on the first poll.
    pub fn set_latency(&mut self, polls: u32) {
        self.latency = polls;
    }

    /// Programs defining `name` fail to compile from now on.
    pub fn reject_define(&mut self, name: &str) {
        self.rejected_defines.push(name.to_string());
    }

    pub fn clear_rejections(&mut self) {
        self.rejected_defines.clear();
    }

    pub fn caps_mut(&mut self) -> &mut EngineCaps {
        &mut self.caps
    }

    /// Every program source handed to [`ShaderBackend::compile_program`], in order.
    #[must_use]
    pub fn compiled_sources(&self) -> &[ProgramSource] {
        &self.compiled
    }

    #[must_use]
    pub fn stats(&self) -> BackendStats {
        self.stats
    }

    #[must_use]
    pub fn block_contents(&self, block: UniformBlockId) -> Option<&[u8]> {
        self.blocks.get(&block).map(Vec::as_slice)
    }

    #[must_use]
    pub fn uniform(&self, program: ProgramHandle, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(&(program, name.to_string()))
    }

    /// Texture currently bound to sampler `name`; `Some(None)` when explicitly unbound.
    #[must_use]
    pub fn bound_texture(&self, program: ProgramHandle, name: &str) -> Option<Option<Uuid>> {
        self.textures.get(&(program, name.to_string())).copied()
    }

    fn rejection(&self, defines: &str) -> Option<&str> {
        self.rejected_defines
            .iter()
            .find(|name| {
                defines.lines().any(|line| {
                    line.strip_prefix("#define ")
                        .and_then(|rest| rest.split_whitespace().next())
                        .is_some_and(|defined| defined == name.as_str())
                })
            })
            .map(String::as_str)
    }
}

impl ShaderBackend for HeadlessBackend {
    fn caps(&self) -> &EngineCaps {
        &self.caps
    }

    fn compile_program(&mut self, source: &ProgramSource) -> ProgramTicket {
        self.next_ticket += 1;
        let ticket = ProgramTicket(self.next_ticket);

        let outcome = match self.rejection(&source.defines) {
            Some(define) => {
                ProgramStatus::Failed(format!("{}: unsupported feature `{define}`", source.name))
            }
            None => {
                self.next_program += 1;
                ProgramStatus::Ready(ProgramHandle(self.next_program))
            }
        };
        log::trace!("Headless compile #{} of `{}` -> {outcome:?}", ticket.0, source.name);

        self.jobs.insert(
            ticket,
            CompileJob {
                remaining_polls: self.latency,
                outcome,
            },
        );
        self.compiled.push(source.clone());
        self.stats.programs_compiled += 1;
        ticket
    }

    fn poll_program(&mut self, ticket: ProgramTicket) -> ProgramStatus {
        let Some(job) = self.jobs.get_mut(&ticket) else {
            return ProgramStatus::Failed(format!("unknown program ticket {}", ticket.0));
        };
        if job.remaining_polls > 0 {
            job.remaining_polls -= 1;
            return ProgramStatus::Pending;
        }
        if matches!(job.outcome, ProgramStatus::Failed(_)) {
            self.stats.programs_failed += 1;
        }
        job.outcome.clone()
    }

    fn upload_uniform_block(&mut self, block: UniformBlockId, data: &[u8]) {
        self.blocks.insert(block, data.to_vec());
        self.stats.block_uploads += 1;
    }

    fn bind_uniform_block(&mut self, program: ProgramHandle, block: UniformBlockId, name: &str) {
        log::trace!("Bind block {} as `{name}` on program {}", block.0, program.0);
        self.stats.block_binds += 1;
    }

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: &UniformValue) {
        self.uniforms
            .insert((program, name.to_string()), value.clone());
        self.stats.uniform_writes += 1;
    }

    fn set_texture(&mut self, program: ProgramHandle, name: &str, texture: Option<&Texture>) {
        self.textures
            .insert((program, name.to_string()), texture.map(|t| t.uuid));
        self.stats.texture_binds += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::ShaderLanguage;

    fn source(defines: &str) -> ProgramSource {
        ProgramSource {
            name: "default".into(),
            vertex: String::new(),
            fragment: String::new(),
            defines: defines.into(),
            attributes: Vec::new(),
            uniforms: Vec::new(),
            samplers: Vec::new(),
            uniform_blocks: Vec::new(),
            language: ShaderLanguage::Glsl,
        }
    }

    #[test]
    fn test_latency_delays_resolution() {
        let mut backend = HeadlessBackend::new();
        backend.set_latency(2);
        let ticket = backend.compile_program(&source(""));

        assert_eq!(backend.poll_program(ticket), ProgramStatus::Pending);
        assert_eq!(backend.poll_program(ticket), ProgramStatus::Pending);
        assert!(matches!(backend.poll_program(ticket), ProgramStatus::Ready(_)));
    }

    #[test]
    fn test_rejection_matches_whole_define_names() {
        let mut backend = HeadlessBackend::new();
        backend.reject_define("FOG");

        let ok = backend.compile_program(&source("#define FOGGY\n"));
        assert!(matches!(backend.poll_program(ok), ProgramStatus::Ready(_)));

        let rejected = backend.compile_program(&source("#define DIFFUSE\n#define FOG\n"));
        assert!(matches!(backend.poll_program(rejected), ProgramStatus::Failed(_)));
        assert_eq!(backend.stats().programs_compiled, 2);
    }

    #[test]
    fn test_caps_snapshot_is_a_copy() {
        let mut backend = HeadlessBackend::new();
        let snapshot = *backend.caps();
        backend.caps_mut().texture_lod = false;

        assert!(snapshot.texture_lod);
        assert_ne!(snapshot, *backend.caps());
    }
}
