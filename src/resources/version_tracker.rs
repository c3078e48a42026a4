//! Version counters for scene and mesh state.
//!
//! Scene lights, environment and image-processing state as well as mesh
//! geometry are handed out through [`MutGuard`]s. Dropping a guard bumps the
//! owning [`ChangeTracker`]; draw wrappers compare the counters they last saw
//! to decide which define concerns to invalidate.

/// Monotonic change counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeTracker {
    version: u64,
}

impl ChangeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self { version: 0 }
    }

    /// Marks as modified.
    pub fn changed(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Compares against a previously observed version and records the current one.
    ///
    /// Returns `true` when the tracker moved since `seen` was recorded.
    pub fn sync(&self, seen: &mut u64) -> bool {
        let moved = *seen != self.version;
        *seen = self.version;
        moved
    }
}

/// Mutable guard: bumps the tracker when the borrow ends.
pub struct MutGuard<'a, T> {
    data: &'a mut T,
    tracker: &'a mut ChangeTracker,
}

impl<'a, T> MutGuard<'a, T> {
    pub fn new(data: &'a mut T, tracker: &'a mut ChangeTracker) -> Self {
        Self { data, tracker }
    }
}

impl<T> std::ops::Deref for MutGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.data
    }
}

impl<T> std::ops::DerefMut for MutGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data
    }
}

impl<T> Drop for MutGuard<'_, T> {
    fn drop(&mut self) {
        self.tracker.changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_bumps_on_drop() {
        let mut value = 1_u32;
        let mut tracker = ChangeTracker::new();
        {
            let mut guard = MutGuard::new(&mut value, &mut tracker);
            *guard = 2;
        }
        assert_eq!(value, 2);
        assert_eq!(tracker.version(), 1);
    }

    #[test]
    fn test_sync_reports_movement_once() {
        let mut tracker = ChangeTracker::new();
        let mut seen = 0;
        assert!(!tracker.sync(&mut seen));

        tracker.changed();
        assert!(tracker.sync(&mut seen));
        assert!(!tracker.sync(&mut seen));
    }
}
