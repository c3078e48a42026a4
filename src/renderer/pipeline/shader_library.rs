//! Shader Template Library
//!
//! Owns the minijinja environment holding every registered shader family.
//! Each family registers two templates, `{name}.vert` and `{name}.frag`.
//!
//! ## Two registration modes
//!
//! | Method | Use case |
//! |--------|----------|
//! | [`ShaderLibrary::register`]          | Sources available at startup |
//! | [`ShaderLibrary::register_deferred`] | Sources imported asynchronously; the returned sender delivers them later |
//!
//! Program creation for a family only starts once
//! [`ShaderLibrary::ensure_loaded`] reports [`SourceState::Ready`].
//!
//! ## Template syntax
//!
//! | Construct  | Delimiters    |
//! |------------|---------------|
//! | Blocks     | `{$ ... $}`   |
//! | Variables  | `{{ ... }}`   |
//! | Line stmts | `$$ ...`      |

use minijinja::{Environment, UndefinedBehavior, syntax::SyntaxConfig};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::errors::Result;
use crate::renderer::backend::ShaderLanguage;
use crate::renderer::pipeline::shader_gen::{GeneratedSource, ShaderGenerator};
use crate::utils::interner::{self, Symbol};

/// Vertex and fragment template text of one shader family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSource {
    #[must_use]
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }
}

/// Availability of a shader family's source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Ready,
    /// Registered as deferred; the import has not delivered yet.
    Loading,
    Missing,
}

pub struct ShaderLibrary {
    env: Environment<'static>,
    loaded: FxHashSet<Symbol>,
    pending: FxHashMap<Symbol, flume::Receiver<ShaderSource>>,
}

impl std::fmt::Debug for ShaderLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderLibrary")
            .field("loaded", &self.loaded.len())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl ShaderLibrary {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();

        let syntax = SyntaxConfig::builder()
            .block_delimiters("{$", "$}")
            .variable_delimiters("{{", "}}")
            .line_statement_prefix("$$")
            .build()?;

        env.set_syntax(syntax);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_undefined_behavior(UndefinedBehavior::SemiStrict);

        Ok(Self {
            env,
            loaded: FxHashSet::default(),
            pending: FxHashMap::default(),
        })
    }

    /// Registers (or replaces) a family whose source is already available.
    pub fn register(&mut self, name: &str, source: ShaderSource) -> Result<()> {
        self.env
            .add_template_owned(format!("{name}.vert"), source.vertex)?;
        self.env
            .add_template_owned(format!("{name}.frag"), source.fragment)?;

        let sym = interner::intern(name);
        self.pending.remove(&sym);
        self.loaded.insert(sym);
        log::debug!("Shader family `{name}` registered");
        Ok(())
    }

    /// Declares a family whose source arrives later through the returned sender.
    pub fn register_deferred(&mut self, name: &str) -> flume::Sender<ShaderSource> {
        let (tx, rx) = flume::bounded(1);
        self.pending.insert(interner::intern(name), rx);
        tx
    }

    /// First phase of program acquisition: makes sure the family's source is loaded.
    pub fn ensure_loaded(&mut self, name: &str) -> SourceState {
        let Some(sym) = interner::get(name) else {
            return SourceState::Missing;
        };
        if self.loaded.contains(&sym) {
            return SourceState::Ready;
        }
        let Some(rx) = self.pending.get(&sym) else {
            return SourceState::Missing;
        };

        match rx.try_recv() {
            Ok(source) => match self.register(name, source) {
                Ok(()) => SourceState::Ready,
                Err(err) => {
                    log::error!("Shader family `{name}` failed to register: {err}");
                    self.pending.remove(&sym);
                    SourceState::Missing
                }
            },
            Err(flume::TryRecvError::Empty) => SourceState::Loading,
            Err(flume::TryRecvError::Disconnected) => {
                log::warn!("Source import for shader family `{name}` was abandoned");
                self.pending.remove(&sym);
                SourceState::Missing
            }
        }
    }

    /// `true` for loaded families and families still being imported.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        interner::get(name)
            .is_some_and(|sym| self.loaded.contains(&sym) || self.pending.contains_key(&sym))
    }

    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        interner::get(name).is_some_and(|sym| self.loaded.contains(&sym))
    }

    /// Renders both stages of `name` for the given define header.
    pub fn generate(
        &self,
        name: &str,
        defines: &str,
        language: ShaderLanguage,
    ) -> Result<GeneratedSource> {
        ShaderGenerator::generate(&self.env, name, defines, language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deferred_source_becomes_ready() {
        let mut library = ShaderLibrary::new().unwrap();
        let tx = library.register_deferred("late");

        assert!(library.contains("late"));
        assert_eq!(library.ensure_loaded("late"), SourceState::Loading);

        tx.send(ShaderSource::new("void main() {}", "void main() {}"))
            .unwrap();
        assert_eq!(library.ensure_loaded("late"), SourceState::Ready);
        assert!(library.is_loaded("late"));
    }

    #[test]
    fn test_abandoned_import_is_missing() {
        let mut library = ShaderLibrary::new().unwrap();
        drop(library.register_deferred("abandoned"));
        assert_eq!(library.ensure_loaded("abandoned"), SourceState::Missing);
        assert!(!library.contains("abandoned"));
    }

    #[test]
    fn test_unknown_family_is_missing() {
        let mut library = ShaderLibrary::new().unwrap();
        assert_eq!(library.ensure_loaded("never-registered"), SourceState::Missing);
    }

    #[test]
    fn test_invalid_template_is_rejected() {
        let mut library = ShaderLibrary::new().unwrap();
        let result = library.register("broken", ShaderSource::new("{$ if $}", ""));
        assert!(result.is_err());
    }
}
