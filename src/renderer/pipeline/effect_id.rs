//! Strongly-typed effect handles.
//!
//! Thin `Copy` wrapper around an index into the central [`EffectCache`]
//! storage array. The cache epoch is carried along so handles issued before
//! [`EffectCache::clear`] are recognised as stale instead of aliasing new
//! entries.
//!
//! [`EffectCache`]: super::cache::EffectCache
//! [`EffectCache::clear`]: super::cache::EffectCache::clear

/// Handle to a cached effect (one shader permutation).
///
/// Returned by [`EffectCache::get_or_create`](super::cache::EffectCache::get_or_create).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectId {
    pub(crate) index: u32,
    pub(crate) epoch: u32,
}

impl EffectId {
    /// Raw index into the effect storage array.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.index as usize
    }
}
