//! Multi-record selection.
//!
//! The tracker is a plain id set; it does not know about the cache. Keeping
//! it a subset of the cached ids is the job of whoever mutates the record
//! list: the cache calls [`SelectionTracker::reconcile`] after every change
//! that can remove records, and `SyncStore` refuses to select unknown ids.
//!
//! The set sits behind a synchronous lock that is never held across an
//! await, so the cache can purge stale ids in the same critical section that
//! replaces its records.

use parking_lot::RwLock;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Default)]
pub struct SelectionTracker {
    selected: RwLock<HashSet<String>>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `id`. Returns true if it is now selected.
    pub fn toggle(&self, id: &str) -> bool {
        let mut selected = self.selected.write();
        if selected.remove(id) {
            false
        } else {
            selected.insert(id.to_string());
            true
        }
    }

    /// Replace the selection with exactly `ids`.
    pub fn select_all<I, S>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selected = self.selected.write();
        *selected = ids.into_iter().map(Into::into).collect();
        selected.len()
    }

    pub fn clear(&self) {
        self.selected.write().clear();
    }

    /// Drop `id` if present.
    pub fn remove(&self, id: &str) -> bool {
        self.selected.write().remove(id)
    }

    /// Drop every selected id that is not in `valid_ids`. Returns how many
    /// were purged.
    pub fn reconcile<'a, I>(&self, valid_ids: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let valid: HashSet<&str> = valid_ids.into_iter().collect();
        let mut selected = self.selected.write();
        let before = selected.len();
        selected.retain(|id| valid.contains(id.as_str()));
        let purged = before - selected.len();
        if purged > 0 {
            debug!(purged, "dropped stale ids from selection");
        }
        purged
    }

    pub fn contains(&self, id: &str) -> bool {
        self.selected.read().contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.read().is_empty()
    }

    /// Snapshot of the selected ids, sorted for stable output.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.selected.read().iter().cloned().collect();
        ids.sort();
        ids
    }
}
