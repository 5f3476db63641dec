use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// Keys currently being processed. A second request for a held key is
/// refused instead of waiting.
#[derive(Default)]
pub struct SubmissionLocks {
    held: Mutex<HashSet<String>>,
}

/// Releases its key on drop.
pub struct SubmissionGuard<'a> {
    locks: &'a SubmissionLocks,
    key: String,
}

impl SubmissionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn held(&self) -> MutexGuard<'_, HashSet<String>> {
        match self.held.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn try_acquire(&self, key: impl Into<String>) -> Option<SubmissionGuard<'_>> {
        let key = key.into();
        if !self.held().insert(key.clone()) {
            return None;
        }
        Some(SubmissionGuard { locks: self, key })
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held().contains(key)
    }
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        self.locks.held().remove(&self.key);
    }
}
