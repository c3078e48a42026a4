//! Render Capability Configuration
//!
//! Application-wide switches such as "diffuse textures are enabled". Flipping a
//! switch invalidates every live [`DefineSet`] that subscribed to the
//! configuration, so the next readiness check recompiles without the feature.
//!
//! The configuration is an explicit object shared through an `Arc` and handed
//! to materials at construction; tests can build their own isolated instance.
//!
//! | Flag                          | Concern invalidated |
//! |-------------------------------|---------------------|
//! | `FRESNEL`                     | `FRESNEL`           |
//! | every other flag              | `TEXTURES`          |

use std::sync::Weak;
use std::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::resources::shader_defines::{DefineSet, DirtyFlags, DirtyState};

bitflags! {
    /// Independently toggleable texture / feature switches. All default to enabled.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CapabilityFlags: u32 {
        const DIFFUSE_TEXTURE                 = 1 << 0;
        const DETAIL_TEXTURE                  = 1 << 1;
        const DECAL_MAP                       = 1 << 2;
        const AMBIENT_TEXTURE                 = 1 << 3;
        const OPACITY_TEXTURE                 = 1 << 4;
        const REFLECTION_TEXTURE              = 1 << 5;
        const EMISSIVE_TEXTURE                = 1 << 6;
        const SPECULAR_TEXTURE                = 1 << 7;
        const BUMP_TEXTURE                    = 1 << 8;
        const LIGHTMAP_TEXTURE                = 1 << 9;
        const REFRACTION_TEXTURE              = 1 << 10;
        const COLOR_GRADING_TEXTURE           = 1 << 11;
        const FRESNEL                         = 1 << 12;
        const CLEAR_COAT_TEXTURE              = 1 << 13;
        const CLEAR_COAT_BUMP_TEXTURE         = 1 << 14;
        const CLEAR_COAT_TINT_TEXTURE         = 1 << 15;
        const SHEEN_TEXTURE                   = 1 << 16;
        const ANISOTROPIC_TEXTURE             = 1 << 17;
        const THICKNESS_TEXTURE               = 1 << 18;
        const REFRACTION_INTENSITY_TEXTURE    = 1 << 19;
        const TRANSLUCENCY_INTENSITY_TEXTURE  = 1 << 20;
        const TRANSLUCENCY_COLOR_TEXTURE      = 1 << 21;
        const IRIDESCENCE_TEXTURE             = 1 << 22;
    }
}

impl Default for CapabilityFlags {
    fn default() -> Self {
        Self::all()
    }
}

impl CapabilityFlags {
    /// Concern raised on subscribers when this flag changes.
    #[must_use]
    pub fn concern(self) -> DirtyFlags {
        if self == Self::FRESNEL {
            DirtyFlags::FRESNEL
        } else {
            DirtyFlags::TEXTURES
        }
    }
}

/// Serializable snapshot used to construct a [`RenderCapabilities`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilitySettings {
    /// Initially enabled switches.
    pub enabled: CapabilityFlags,
    /// When set, the refraction-intensity switch reads the thickness switch
    /// instead of its own state, reproducing a long-standing upstream quirk
    /// for content tuned against it.
    pub legacy_refraction_intensity_alias: bool,
}

impl Default for CapabilitySettings {
    fn default() -> Self {
        Self {
            enabled: CapabilityFlags::all(),
            legacy_refraction_intensity_alias: false,
        }
    }
}

/// Shared capability configuration with synchronous invalidation fan-out.
#[derive(Debug)]
pub struct RenderCapabilities {
    flags: AtomicU32,
    legacy_refraction_intensity_alias: bool,
    subscribers: Mutex<Vec<Weak<DirtyState>>>,
}

impl Default for RenderCapabilities {
    fn default() -> Self {
        Self::new(&CapabilitySettings::default())
    }
}

impl RenderCapabilities {
    #[must_use]
    pub fn new(settings: &CapabilitySettings) -> Self {
        Self {
            flags: AtomicU32::new(settings.enabled.bits()),
            legacy_refraction_intensity_alias: settings.legacy_refraction_intensity_alias,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    fn raw(&self) -> CapabilityFlags {
        CapabilityFlags::from_bits_truncate(self.flags.load(Ordering::Relaxed))
    }

    /// Returns whether every switch in `flag` is enabled.
    #[must_use]
    pub fn is_enabled(&self, flag: CapabilityFlags) -> bool {
        let mut query = flag;
        if self.legacy_refraction_intensity_alias
            && query.contains(CapabilityFlags::REFRACTION_INTENSITY_TEXTURE)
        {
            query.remove(CapabilityFlags::REFRACTION_INTENSITY_TEXTURE);
            query.insert(CapabilityFlags::THICKNESS_TEXTURE);
        }
        self.raw().contains(query)
    }

    /// Snapshot of every switch.
    #[must_use]
    pub fn flags(&self) -> CapabilityFlags {
        self.raw()
    }

    /// Enables or disables `flag`. A change invalidates every subscriber.
    pub fn set(&self, flag: CapabilityFlags, enabled: bool) {
        let bits = flag.bits();
        let previous = if enabled {
            self.flags.fetch_or(bits, Ordering::Relaxed)
        } else {
            self.flags.fetch_and(!bits, Ordering::Relaxed)
        };
        let flipped = if enabled { bits & !previous } else { bits & previous };
        let changed = CapabilityFlags::from_bits_truncate(flipped);
        if changed.is_empty() {
            return;
        }

        let mut concern = DirtyFlags::empty();
        for single in changed.iter() {
            concern |= single.concern();
        }
        log::debug!("Capability {changed:?} set to {enabled}");
        self.notify_changed(concern);
    }

    /// Raises `concern` on every live subscriber and prunes dropped ones.
    pub fn notify_changed(&self, concern: DirtyFlags) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|weak| match weak.upgrade() {
            Some(state) => {
                state.mark(concern);
                true
            }
            None => false,
        });
    }

    /// Registers `defines` for invalidation broadcasts.
    pub fn subscribe(&self, defines: &DefineSet) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|weak| weak.strong_count() > 0);
        subscribers.push(std::sync::Arc::downgrade(defines.dirty_state()));
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracked_set() -> DefineSet {
        let mut b = DefineSet::builder();
        b.flag("DIFFUSE", DirtyFlags::TEXTURES)
            .flag("FRESNEL", DirtyFlags::FRESNEL);
        let mut defines = b.build();
        defines.mark_as_processed();
        defines
    }

    #[test]
    fn test_defaults_all_enabled() {
        let caps = RenderCapabilities::default();
        assert!(caps.is_enabled(CapabilityFlags::all()));
    }

    #[test]
    fn test_change_invalidates_textures() {
        let caps = RenderCapabilities::default();
        let defines = tracked_set();
        caps.subscribe(&defines);

        caps.set(CapabilityFlags::BUMP_TEXTURE, false);
        assert!(defines.is_concern_dirty(DirtyFlags::TEXTURES));
        assert!(!defines.is_concern_dirty(DirtyFlags::FRESNEL));
    }

    #[test]
    fn test_fresnel_flag_invalidates_fresnel() {
        let caps = RenderCapabilities::default();
        let defines = tracked_set();
        caps.subscribe(&defines);

        caps.set(CapabilityFlags::FRESNEL, false);
        assert!(defines.is_concern_dirty(DirtyFlags::FRESNEL));
        assert!(!defines.is_concern_dirty(DirtyFlags::TEXTURES));
    }

    #[test]
    fn test_unchanged_set_does_not_notify() {
        let caps = RenderCapabilities::default();
        let defines = tracked_set();
        caps.subscribe(&defines);

        caps.set(CapabilityFlags::DIFFUSE_TEXTURE, true);
        assert!(!defines.is_dirty());
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let caps = RenderCapabilities::default();
        let kept = tracked_set();
        caps.subscribe(&kept);
        {
            let dropped = tracked_set();
            caps.subscribe(&dropped);
            assert_eq!(caps.subscriber_count(), 2);
        }
        caps.set(CapabilityFlags::SHEEN_TEXTURE, false);
        assert_eq!(caps.subscriber_count(), 1);
    }

    #[test]
    fn test_refraction_intensity_alias() {
        let mut settings = CapabilitySettings::default();
        let caps = RenderCapabilities::new(&settings);
        caps.set(CapabilityFlags::THICKNESS_TEXTURE, false);
        assert!(caps.is_enabled(CapabilityFlags::REFRACTION_INTENSITY_TEXTURE));

        settings.legacy_refraction_intensity_alias = true;
        let legacy = RenderCapabilities::new(&settings);
        legacy.set(CapabilityFlags::THICKNESS_TEXTURE, false);
        assert!(!legacy.is_enabled(CapabilityFlags::REFRACTION_INTENSITY_TEXTURE));
    }
}
