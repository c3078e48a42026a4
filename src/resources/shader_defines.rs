//! Shader Define Set
//!
//! A [`DefineSet`] is the shader permutation key of one submesh: an ordered,
//! fixed collection of boolean / integer / string defines whose serialization
//! (`#define NAME[ VALUE]\n` per active entry) selects the compiled program.
//!
//! # Architecture
//!
//! - Keys are registered once through a [`DefineSetBuilder`]; no key can be
//!   added after [`DefineSetBuilder::build`], only values change.
//! - Names are interned [`Symbol`]s so lookups are integer comparisons.
//! - Every key belongs to one *concern* ([`DirtyFlags`]). Writing a new value
//!   raises that concern's bit plus the aggregate [`DirtyFlags::DIRTY`] bit.
//! - The dirty bits live in a shared [`DirtyState`] so the render capability
//!   registry can invalidate every live set without owning it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use myth_shading::resources::{DefineSet, DirtyFlags};
//!
//! let mut builder = DefineSet::builder();
//! builder.flag("DIFFUSE", DirtyFlags::TEXTURES)
//!        .int("NUM_BONE_INFLUENCERS", 0, DirtyFlags::ATTRIBUTES);
//! let mut defines = builder.build();
//!
//! defines.set("DIFFUSE", true);
//! defines.mark_as_processed();
//! assert_eq!(defines.last_processed(), Some("#define DIFFUSE\n"));
//! ```

use std::borrow::Cow;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use xxhash_rust::xxh3::xxh3_128;

use crate::utils::interner::{self, Symbol};

bitflags! {
    /// Per-concern invalidation bits of a [`DefineSet`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct DirtyFlags: u32 {
        const TEXTURES         = 1 << 0;
        const LIGHTS           = 1 << 1;
        const FRESNEL          = 1 << 2;
        const IMAGE_PROCESSING = 1 << 3;
        const MISC             = 1 << 4;
        const ATTRIBUTES       = 1 << 5;
        const PREPASS          = 1 << 6;

        /// Every concern bit.
        const CONCERNS = Self::TEXTURES.bits()
            | Self::LIGHTS.bits()
            | Self::FRESNEL.bits()
            | Self::IMAGE_PROCESSING.bits()
            | Self::MISC.bits()
            | Self::ATTRIBUTES.bits()
            | Self::PREPASS.bits();

        /// Aggregate bit: the set must be (re)processed before the next draw.
        const DIRTY = 1 << 31;
    }
}

/// Atomic dirty bitset shared between a [`DefineSet`] and the subscribers
/// allowed to invalidate it.
#[derive(Debug)]
pub struct DirtyState(AtomicU32);

impl DirtyState {
    #[must_use]
    pub fn new(flags: DirtyFlags) -> Self {
        Self(AtomicU32::new(flags.bits()))
    }

    /// Raises `concern` together with the aggregate bit.
    #[inline]
    pub fn mark(&self, concern: DirtyFlags) {
        self.0
            .fetch_or((concern | DirtyFlags::DIRTY).bits(), Ordering::Relaxed);
    }

    #[inline]
    #[must_use]
    pub fn load(&self) -> DirtyFlags {
        DirtyFlags::from_bits_retain(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    fn clear(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

// ─── Values ──────────────────────────────────────────────────────────────────

/// Value of a single define.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DefineValue {
    Bool(bool),
    Int(i32),
    Str(Cow<'static, str>),
}

impl DefineValue {
    /// `true` for set flags, non-zero integers and non-empty strings.
    #[inline]
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Str(s) => !s.is_empty(),
        }
    }

    #[inline]
    fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl From<bool> for DefineValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for DefineValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for DefineValue {
    fn from(value: u32) -> Self {
        Self::Int(i32::try_from(value).unwrap_or(i32::MAX))
    }
}

impl From<&'static str> for DefineValue {
    fn from(value: &'static str) -> Self {
        Self::Str(Cow::Borrowed(value))
    }
}

impl From<String> for DefineValue {
    fn from(value: String) -> Self {
        Self::Str(Cow::Owned(value))
    }
}

/// Formats a float for use as a define value.
///
/// The result always parses as a float literal in generated shader source:
/// `0.0` becomes `"0."`, `0.5` stays `"0.5"`.
#[must_use]
pub fn format_float_define(value: f32) -> String {
    let mut text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        text.push('.');
    }
    text
}

// ─── Builder ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct DefineEntry {
    name: Symbol,
    concern: DirtyFlags,
    default: DefineValue,
    value: DefineValue,
}

/// Registers the fixed key set of a [`DefineSet`].
///
/// Registering a name twice keeps the first registration, so shared families
/// can be requested by several contributors.
#[derive(Debug, Default)]
pub struct DefineSetBuilder {
    entries: Vec<DefineEntry>,
    index: FxHashMap<Symbol, usize>,
}

impl DefineSetBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: Symbol, default: DefineValue, concern: DirtyFlags) -> &mut Self {
        if self.index.contains_key(&name) {
            return self;
        }
        self.index.insert(name, self.entries.len());
        self.entries.push(DefineEntry {
            name,
            concern,
            value: default.clone(),
            default,
        });
        self
    }

    /// Registers a boolean define, default `false`.
    pub fn flag(&mut self, name: &str, concern: DirtyFlags) -> &mut Self {
        self.push(interner::intern(name), DefineValue::Bool(false), concern)
    }

    /// Registers several boolean defines owned by the same concern.
    pub fn flags(&mut self, names: &[&str], concern: DirtyFlags) -> &mut Self {
        for name in names {
            self.flag(name, concern);
        }
        self
    }

    pub fn flag_symbol(&mut self, name: Symbol, concern: DirtyFlags) -> &mut Self {
        self.push(name, DefineValue::Bool(false), concern)
    }

    /// Registers an integer define; it serializes only while it differs from `default`.
    pub fn int(&mut self, name: &str, default: i32, concern: DirtyFlags) -> &mut Self {
        self.push(interner::intern(name), DefineValue::Int(default), concern)
    }

    /// Registers a string define; it serializes while non-empty.
    pub fn string(&mut self, name: &str, default: &'static str, concern: DirtyFlags) -> &mut Self {
        self.push(
            interner::intern(name),
            DefineValue::Str(Cow::Borrowed(default)),
            concern,
        )
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        interner::get(name).is_some_and(|sym| self.index.contains_key(&sym))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freezes the key set. The new set starts with every concern dirty.
    #[must_use]
    pub fn build(self) -> DefineSet {
        DefineSet {
            entries: self.entries,
            index: self.index,
            dirty: Arc::new(DirtyState::new(DirtyFlags::all())),
            last_processed: None,
            fingerprint: None,
            hints: PrepareHints::default(),
        }
    }
}

// ─── DefineSet ───────────────────────────────────────────────────────────────

/// Normal / UV requirements gathered while preparing defines.
///
/// Each pass records its own normal request so a pass that is skipped keeps
/// its previous answer. `normals` and `uvs` remember what the attribute pass
/// last applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareHints {
    pub lights_need_normals: bool,
    pub textures_need_normals: bool,
    pub profile_need_normals: bool,
    pub need_uvs: bool,
    pub normals: bool,
    pub uvs: bool,
}

impl PrepareHints {
    #[inline]
    #[must_use]
    pub fn need_normals(&self) -> bool {
        self.lights_need_normals || self.textures_need_normals || self.profile_need_normals
    }
}

/// Ordered, fixed-key define collection with per-concern dirty tracking.
#[derive(Debug)]
pub struct DefineSet {
    entries: Vec<DefineEntry>,
    index: FxHashMap<Symbol, usize>,
    dirty: Arc<DirtyState>,
    last_processed: Option<String>,
    fingerprint: Option<u128>,
    hints: PrepareHints,
}

impl DefineSet {
    #[must_use]
    pub fn builder() -> DefineSetBuilder {
        DefineSetBuilder::new()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    fn slot(&self, name: &str) -> Option<usize> {
        interner::get(name).and_then(|sym| self.index.get(&sym).copied())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.slot(name).is_some()
    }

    /// Current value of a registered define.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DefineValue> {
        self.slot(name).map(|idx| &self.entries[idx].value)
    }

    /// `true` when the define is registered and truthy.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some_and(DefineValue::is_truthy)
    }

    #[inline]
    #[must_use]
    pub fn is_set_symbol(&self, name: Symbol) -> bool {
        self.index
            .get(&name)
            .is_some_and(|&idx| self.entries[idx].value.is_truthy())
    }

    /// Integer value, `0` for unregistered or non-integer defines.
    #[must_use]
    pub fn int(&self, name: &str) -> i32 {
        match self.get(name) {
            Some(DefineValue::Int(v)) => *v,
            _ => 0,
        }
    }

    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(DefineValue::Str(s)) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// Stores `value`; returns whether it changed.
    ///
    /// A change raises the entry's concern bit plus the aggregate bit.
    /// Writing an unregistered name is a programming error: it is logged
    /// and ignored.
    pub fn set(&mut self, name: &str, value: impl Into<DefineValue>) -> bool {
        let value = value.into();
        match interner::get(name) {
            Some(sym) => self.set_symbol(sym, value),
            None => {
                log::error!("Define `{name}` is not registered for this material");
                false
            }
        }
    }

    pub fn set_symbol(&mut self, name: Symbol, value: impl Into<DefineValue>) -> bool {
        let value = value.into();
        let Some(&idx) = self.index.get(&name) else {
            log::error!(
                "Define `{}` is not registered for this material",
                interner::resolve(name)
            );
            return false;
        };
        self.store(idx, value)
    }

    /// Like [`set`](Self::set), silently skipping names this set never registered.
    pub fn set_if_registered(&mut self, name: &str, value: impl Into<DefineValue>) -> bool {
        match self.slot(name) {
            Some(idx) => self.store(idx, value.into()),
            None => false,
        }
    }

    fn store(&mut self, idx: usize, value: DefineValue) -> bool {
        let entry = &mut self.entries[idx];
        if entry.value == value {
            return false;
        }
        if !entry.value.same_kind(&value) {
            log::error!(
                "Define `{}` expects {:?}-kind values, got {:?}",
                interner::resolve(entry.name),
                entry.default,
                value
            );
            return false;
        }
        entry.value = value;
        self.dirty.mark(entry.concern);
        true
    }

    /// Restores every registered default and raises every dirty bit.
    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.value = entry.default.clone();
        }
        self.hints = PrepareHints::default();
        self.mark_all_as_dirty();
    }

    // ─── Dirty tracking ──────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load().contains(DirtyFlags::DIRTY)
    }

    #[inline]
    #[must_use]
    pub fn dirty_flags(&self) -> DirtyFlags {
        self.dirty.load()
    }

    /// `true` when any bit of `concern` is raised.
    #[inline]
    #[must_use]
    pub fn is_concern_dirty(&self, concern: DirtyFlags) -> bool {
        self.dirty.load().intersects(concern)
    }

    #[inline]
    pub fn mark_as(&self, concern: DirtyFlags) {
        self.dirty.mark(concern);
    }

    #[inline]
    pub fn mark_all_as_dirty(&self) {
        self.dirty.mark(DirtyFlags::CONCERNS);
    }

    /// Clears every dirty bit and snapshots the current serialization.
    pub fn mark_as_processed(&mut self) {
        let serialized = self.serialize();
        self.fingerprint = Some(xxh3_128(serialized.as_bytes()));
        self.last_processed = Some(serialized);
        self.dirty.clear();
    }

    /// Re-raises only the aggregate bit, forcing another pass next frame.
    #[inline]
    pub fn mark_as_unprocessed(&self) {
        self.dirty.mark(DirtyFlags::empty());
    }

    /// Serialization captured by the last [`mark_as_processed`](Self::mark_as_processed).
    #[must_use]
    pub fn last_processed(&self) -> Option<&str> {
        self.last_processed.as_deref()
    }

    /// xxh3-128 of [`last_processed`](Self::last_processed).
    #[must_use]
    pub fn fingerprint(&self) -> Option<u128> {
        self.fingerprint
    }

    #[must_use]
    pub fn hints(&self) -> PrepareHints {
        self.hints
    }

    pub(crate) fn hints_mut(&mut self) -> &mut PrepareHints {
        &mut self.hints
    }

    pub(crate) fn dirty_state(&self) -> &Arc<DirtyState> {
        &self.dirty
    }

    // ─── Serialization ───────────────────────────────────────────────────────

    /// Canonical `#define` block in declaration order.
    ///
    /// Flags appear when true, integers when they differ from their registered
    /// default, strings when non-empty.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(self.entries.len() * 8);
        for entry in &self.entries {
            let name = interner::resolve(entry.name);
            match (&entry.value, &entry.default) {
                (DefineValue::Bool(true), _) => {
                    let _ = writeln!(out, "#define {name}");
                }
                (DefineValue::Int(v), DefineValue::Int(d)) if v != d => {
                    let _ = writeln!(out, "#define {name} {v}");
                }
                (DefineValue::Str(s), _) if !s.is_empty() => {
                    let _ = writeln!(out, "#define {name} {s}");
                }
                _ => {}
            }
        }
        out
    }

    /// Iterate all defines in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &DefineValue)> + '_ {
        self.entries
            .iter()
            .map(|e| (interner::resolve(e.name), &e.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DefineSet {
        let mut b = DefineSet::builder();
        b.flag("DIFFUSE", DirtyFlags::TEXTURES)
            .flag("FOG", DirtyFlags::MISC)
            .int("NUM_BONE_INFLUENCERS", 0, DirtyFlags::ATTRIBUTES)
            .int("PREPASS_DEPTH_INDEX", -1, DirtyFlags::PREPASS)
            .string("ALPHATESTVALUE", "0.5", DirtyFlags::MISC);
        b.build()
    }

    #[test]
    fn test_new_set_starts_dirty() {
        let defines = sample();
        assert!(defines.is_dirty());
        assert!(defines.is_concern_dirty(DirtyFlags::TEXTURES));
    }

    #[test]
    fn test_set_unchanged_is_noop() {
        let mut defines = sample();
        defines.mark_as_processed();
        assert!(!defines.set("DIFFUSE", false));
        assert!(!defines.is_dirty());
    }

    #[test]
    fn test_mark_as_processed_twice_is_stable() {
        let mut defines = sample();
        defines.set("DIFFUSE", true);
        defines.mark_as_processed();
        let fingerprint = defines.fingerprint();

        defines.mark_as_processed();
        assert!(!defines.is_dirty());
        assert_eq!(defines.fingerprint(), fingerprint);
        assert_eq!(defines.last_processed(), Some("#define DIFFUSE\n#define ALPHATESTVALUE 0.5\n"));
    }

    #[test]
    fn test_set_marks_owning_concern() {
        let mut defines = sample();
        defines.mark_as_processed();
        assert!(defines.set("FOG", true));
        assert!(defines.is_dirty());
        assert!(defines.is_concern_dirty(DirtyFlags::MISC));
        assert!(!defines.is_concern_dirty(DirtyFlags::TEXTURES));
    }

    #[test]
    fn test_serialize_policy() {
        let mut defines = sample();
        defines.set("DIFFUSE", true);
        defines.set("NUM_BONE_INFLUENCERS", 4);
        assert_eq!(
            defines.serialize(),
            "#define DIFFUSE\n#define NUM_BONE_INFLUENCERS 4\n#define ALPHATESTVALUE 0.5\n"
        );

        defines.set("PREPASS_DEPTH_INDEX", 2);
        assert!(defines.serialize().contains("#define PREPASS_DEPTH_INDEX 2\n"));
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let mut defines = sample();
        assert!(!defines.set("DIFFUSE", 3));
        assert_eq!(defines.get("DIFFUSE"), Some(&DefineValue::Bool(false)));
    }

    #[test]
    fn test_unregistered_define_is_ignored() {
        let mut defines = sample();
        assert!(!defines.set("NOT_A_DEFINE_OF_THIS_SET", true));
        assert!(defines.get("NOT_A_DEFINE_OF_THIS_SET").is_none());
        assert!(!defines.set_if_registered("ALSO_NOT_REGISTERED", true));
    }

    #[test]
    fn test_unprocessed_keeps_concern_bits_clear() {
        let mut defines = sample();
        defines.mark_as_processed();
        defines.mark_as_unprocessed();
        assert!(defines.is_dirty());
        assert!(!defines.is_concern_dirty(DirtyFlags::CONCERNS));
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut defines = sample();
        defines.set("DIFFUSE", true);
        defines.set("ALPHATESTVALUE", "0.");
        defines.mark_as_processed();

        defines.reset();
        assert!(!defines.is_set("DIFFUSE"));
        assert_eq!(defines.string("ALPHATESTVALUE"), Some("0.5"));
        assert_eq!(defines.dirty_flags(), DirtyFlags::all());
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let mut b = DefineSet::builder();
        b.int("COUNT", 1, DirtyFlags::MISC).flag("COUNT", DirtyFlags::TEXTURES);
        assert_eq!(b.len(), 1);
        let defines = b.build();
        assert_eq!(defines.int("COUNT"), 1);
    }

    #[test]
    fn test_format_float_define() {
        assert_eq!(format_float_define(0.0), "0.");
        assert_eq!(format_float_define(0.5), "0.5");
        assert_eq!(format_float_define(1.0), "1.");
        assert_eq!(format_float_define(0.25), "0.25");
    }
}
