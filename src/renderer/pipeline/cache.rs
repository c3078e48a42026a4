//! Effect Cache
//!
//! Central owner of every shader permutation. Effects are stored in a
//! contiguous `Vec` and addressed through lightweight [`EffectId`] handles;
//! a hash lookup keyed by (shader family, xxh3-128 of the define string)
//! guarantees one entry per permutation, shared by every submesh asking for it.
//!
//! # Entry lifecycle
//!
//! ```text
//! AwaitingSource ──(source loaded)──► Compiling ──► Ready
//!       ▲                                 │
//!       └──────(fallback reduced)─────────┤
//!                                         └──(chain exhausted)──► Failed
//! ```
//!
//! Creating an entry never compiles. [`EffectCache::poll`] advances it: it
//! first asks the [`ShaderLibrary`] for the family's source, then hands the
//! rendered program to the backend and polls the ticket. A driver failure
//! consumes the entry's [`FallbackChain`] until a reduced permutation
//! compiles or nothing is left to strip.

use rustc_hash::FxHashMap;
use xxhash_rust::xxh3::xxh3_128;

use crate::renderer::backend::{
    ProgramHandle, ProgramSource, ProgramStatus, ProgramTicket, ShaderBackend, ShaderLanguage,
};
use crate::renderer::pipeline::effect_id::EffectId;
use crate::renderer::pipeline::fallbacks::FallbackChain;
use crate::renderer::pipeline::shader_library::{ShaderLibrary, SourceState};
use crate::utils::interner::{self, Symbol};

/// Everything needed to create an effect.
#[derive(Debug, Clone, Default)]
pub struct EffectRequest {
    pub shader: String,
    /// Serialized define set; part of the cache key.
    pub defines: String,
    pub attributes: Vec<String>,
    pub uniforms: Vec<String>,
    pub samplers: Vec<String>,
    pub uniform_blocks: Vec<String>,
    pub fallbacks: FallbackChain,
}

/// Externally visible state of an effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectStatus {
    /// Waiting for the shader family's source to be imported.
    AwaitingSource,
    Compiling,
    Ready(ProgramHandle),
    Failed { diagnostic: String },
}

impl EffectStatus {
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::AwaitingSource | Self::Compiling)
    }
}

#[derive(Debug)]
enum EntryState {
    AwaitingSource,
    Compiling(ProgramTicket),
    Ready(ProgramHandle),
    Failed(String),
}

#[derive(Debug)]
struct EffectEntry {
    shader: Symbol,
    /// Permutation currently compiled; differs from the key after fallbacks.
    defines: String,
    request: EffectRequest,
    state: EntryState,
    compile_attempts: u32,
}

impl EffectEntry {
    fn status(&self) -> EffectStatus {
        match &self.state {
            EntryState::AwaitingSource => EffectStatus::AwaitingSource,
            EntryState::Compiling(_) => EffectStatus::Compiling,
            EntryState::Ready(handle) => EffectStatus::Ready(*handle),
            EntryState::Failed(diagnostic) => EffectStatus::Failed {
                diagnostic: diagnostic.clone(),
            },
        }
    }
}

/// Central effect storage and deduplication cache.
#[derive(Debug)]
pub struct EffectCache {
    // ---- Storage (contiguous, indexed by Id) ----
    entries: Vec<EffectEntry>,
    // ---- Canonical lookup ((family, define hash) → Id) ----
    lookup: FxHashMap<(Symbol, u128), EffectId>,

    epoch: u32,
    language: ShaderLanguage,
}

impl Default for EffectCache {
    fn default() -> Self {
        Self::new(ShaderLanguage::default())
    }
}

impl EffectCache {
    #[must_use]
    pub fn new(language: ShaderLanguage) -> Self {
        Self {
            entries: Vec::with_capacity(64),
            lookup: FxHashMap::default(),
            epoch: 0,
            language,
        }
    }

    #[inline]
    fn entry(&self, id: EffectId) -> Option<&EffectEntry> {
        if id.epoch != self.epoch {
            return None;
        }
        self.entries.get(id.index())
    }

    /// `false` for handles issued before the last [`clear`](Self::clear).
    #[must_use]
    pub fn contains(&self, id: EffectId) -> bool {
        self.entry(id).is_some()
    }

    // ── Lookup & creation ────────────────────────────────────────────────────

    #[must_use]
    pub fn lookup(&self, shader: &str, defines: &str) -> Option<EffectId> {
        let shader = interner::get(shader)?;
        self.lookup
            .get(&(shader, xxh3_128(defines.as_bytes())))
            .copied()
    }

    /// Returns the effect for the request's permutation, creating it when absent.
    ///
    /// A new entry starts in `AwaitingSource`; nothing is compiled until the
    /// next [`poll`](Self::poll).
    pub fn get_or_create(&mut self, request: EffectRequest) -> EffectId {
        let shader = interner::intern(&request.shader);
        let key = (shader, xxh3_128(request.defines.as_bytes()));
        if let Some(&id) = self.lookup.get(&key) {
            return id;
        }

        let id = EffectId {
            index: self.entries.len() as u32,
            epoch: self.epoch,
        };
        log::debug!(
            "New effect #{} for `{}` ({} defines)",
            id.index,
            request.shader,
            request.defines.lines().count()
        );
        self.entries.push(EffectEntry {
            shader,
            defines: request.defines.clone(),
            request,
            state: EntryState::AwaitingSource,
            compile_attempts: 0,
        });
        self.lookup.insert(key, id);
        id
    }

    // ── Progress ─────────────────────────────────────────────────────────────

    /// Advances the effect as far as it can go without blocking.
    pub fn poll(
        &mut self,
        id: EffectId,
        shaders: &mut ShaderLibrary,
        backend: &mut dyn ShaderBackend,
    ) -> EffectStatus {
        if id.epoch != self.epoch {
            return EffectStatus::Failed {
                diagnostic: "stale effect handle".to_string(),
            };
        }
        let language = self.language;
        let Some(entry) = self.entries.get_mut(id.index()) else {
            return EffectStatus::Failed {
                diagnostic: "unknown effect handle".to_string(),
            };
        };

        loop {
            match entry.state {
                EntryState::AwaitingSource => {
                    let name = interner::resolve(entry.shader);
                    match shaders.ensure_loaded(name) {
                        SourceState::Loading => return EffectStatus::AwaitingSource,
                        SourceState::Missing => {
                            entry.state = EntryState::Failed(format!(
                                "shader family `{name}` is not registered"
                            ));
                        }
                        SourceState::Ready => {
                            match shaders.generate(name, &entry.defines, language) {
                                Ok(generated) => {
                                    let source = ProgramSource {
                                        name: name.to_string(),
                                        vertex: generated.vertex,
                                        fragment: generated.fragment,
                                        defines: entry.defines.clone(),
                                        attributes: entry.request.attributes.clone(),
                                        uniforms: entry.request.uniforms.clone(),
                                        samplers: entry.request.samplers.clone(),
                                        uniform_blocks: entry.request.uniform_blocks.clone(),
                                        language,
                                    };
                                    entry.compile_attempts += 1;
                                    entry.state =
                                        EntryState::Compiling(backend.compile_program(&source));
                                }
                                Err(err) => {
                                    entry.state = EntryState::Failed(err.to_string());
                                }
                            }
                        }
                    }
                }
                EntryState::Compiling(ticket) => match backend.poll_program(ticket) {
                    ProgramStatus::Pending => return EffectStatus::Compiling,
                    ProgramStatus::Ready(handle) => {
                        log::debug!(
                            "Effect #{} ready after {} attempt(s)",
                            id.index,
                            entry.compile_attempts
                        );
                        entry.state = EntryState::Ready(handle);
                    }
                    ProgramStatus::Failed(diagnostic) => {
                        match entry.request.fallbacks.reduce(&entry.defines) {
                            Some(reduced) => {
                                log::warn!(
                                    "Effect #{} failed to compile, retrying with fallbacks: {diagnostic}",
                                    id.index
                                );
                                entry.defines = reduced;
                                entry.state = EntryState::AwaitingSource;
                            }
                            None => {
                                log::warn!("Effect #{} failed to compile: {diagnostic}", id.index);
                                entry.state = EntryState::Failed(diagnostic);
                            }
                        }
                    }
                },
                EntryState::Ready(_) | EntryState::Failed(_) => return entry.status(),
            }
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Current state without advancing it.
    #[must_use]
    pub fn status(&self, id: EffectId) -> Option<EffectStatus> {
        self.entry(id).map(EffectEntry::status)
    }

    #[must_use]
    pub fn is_ready(&self, id: EffectId) -> bool {
        self.entry(id)
            .is_some_and(|e| matches!(e.state, EntryState::Ready(_)))
    }

    #[must_use]
    pub fn program(&self, id: EffectId) -> Option<ProgramHandle> {
        match self.entry(id)?.state {
            EntryState::Ready(handle) => Some(handle),
            _ => None,
        }
    }

    /// Define string of the permutation being compiled (after fallbacks).
    #[must_use]
    pub fn defines(&self, id: EffectId) -> Option<&str> {
        self.entry(id).map(|e| e.defines.as_str())
    }

    #[must_use]
    pub fn shader_name(&self, id: EffectId) -> Option<&'static str> {
        self.entry(id).map(|e| interner::resolve(e.shader))
    }

    /// The CPU-skinning fallback produced this effect.
    #[must_use]
    pub fn bones_forced_to_cpu(&self, id: EffectId) -> bool {
        self.entry(id)
            .is_some_and(|e| e.request.fallbacks.bones_forced_to_cpu())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every effect. Outstanding handles become stale.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lookup.clear();
        self.epoch = self.epoch.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::headless::HeadlessBackend;
    use crate::renderer::pipeline::shader_library::ShaderSource;

    fn library() -> ShaderLibrary {
        let mut lib = ShaderLibrary::new().unwrap();
        lib.register("default", ShaderSource::new("void main() {}", "void main() {}"))
            .unwrap();
        lib
    }

    fn request(defines: &str) -> EffectRequest {
        EffectRequest {
            shader: "default".into(),
            defines: defines.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_one_entry_per_permutation() {
        let mut cache = EffectCache::default();
        let a = cache.get_or_create(request("#define DIFFUSE\n"));
        let b = cache.get_or_create(request("#define DIFFUSE\n"));
        let c = cache.get_or_create(request("#define FOG\n"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup("default", "#define FOG\n"), Some(c));
    }

    #[test]
    fn test_creation_does_not_compile() {
        let mut cache = EffectCache::default();
        let mut shaders = library();
        let mut backend = HeadlessBackend::new();

        let id = cache.get_or_create(request(""));
        assert_eq!(cache.status(id), Some(EffectStatus::AwaitingSource));
        assert_eq!(backend.stats().programs_compiled, 0);

        assert!(cache.poll(id, &mut shaders, &mut backend).is_ready());
        assert_eq!(backend.stats().programs_compiled, 1);
    }

    #[test]
    fn test_fallback_recompiles_reduced_permutation() {
        let mut cache = EffectCache::default();
        let mut shaders = library();
        let mut backend = HeadlessBackend::new();
        backend.reject_define("FOG");

        let mut req = request("#define DIFFUSE\n#define FOG\n");
        req.fallbacks.add_fallback(0, "FOG");
        let id = cache.get_or_create(req);

        assert!(cache.poll(id, &mut shaders, &mut backend).is_ready());
        assert_eq!(cache.defines(id), Some("#define DIFFUSE\n"));
        assert_eq!(backend.stats().programs_compiled, 2);
    }

    #[test]
    fn test_missing_family_fails() {
        let mut cache = EffectCache::default();
        let mut shaders = library();
        let mut backend = HeadlessBackend::new();

        let id = cache.get_or_create(EffectRequest {
            shader: "unregistered".into(),
            ..Default::default()
        });
        assert!(cache.poll(id, &mut shaders, &mut backend).is_failed());
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let mut cache = EffectCache::default();
        let id = cache.get_or_create(request(""));
        cache.clear();
        assert!(!cache.contains(id));
        let fresh = cache.get_or_create(request(""));
        assert_ne!(id, fresh);
    }
}
