use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Serialises state transitions per entity key within the process.
///
/// Repositories additionally reject stale writes, so a second process racing on
/// the same row still fails with a conflict rather than overwriting.
#[derive(Debug, Default)]
pub(crate) struct TransitionLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TransitionLocks {
    pub(crate) fn slot(&self, key: &str) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Slots for several keys in a stable order so callers never deadlock.
    pub(crate) fn slots<'a, I>(&self, keys: I) -> Vec<Arc<Mutex<()>>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut keys: Vec<&str> = keys.into_iter().collect();
        keys.sort_unstable();
        keys.dedup();
        keys.into_iter().map(|key| self.slot(key)).collect()
    }
}

pub(crate) fn hold(slot: &Mutex<()>) -> MutexGuard<'_, ()> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
