//! Per-key mutual exclusion
//!
//! Operations touching the same key are serialized while unrelated keys proceed in
//! parallel. Entries are reference counted and removed once nobody holds or waits
//! on them, so the registry only grows with the number of keys in use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slots = HashMap<String, Arc<AsyncMutex<()>>>;

/// Registry of independent locks addressed by string key
#[derive(Clone, Default)]
pub struct KeyedLock {
    slots: Arc<Mutex<Slots>>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until the caller holds exclusive access for `key`
    ///
    /// The lock is released when the returned guard is dropped.
    pub async fn acquire(&self, key: &str) -> KeyedLockGuard {
        let slot = {
            let mut slots = lock_slots(&self.slots);
            slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let guard = slot.clone().lock_owned().await;
        tracing::debug!(key, "Keyed lock acquired");

        KeyedLockGuard {
            key: key.to_string(),
            slots: self.slots.clone(),
            slot,
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or waited on
    pub fn len(&self) -> usize {
        lock_slots(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// The map is only touched for short, non-panicking critical sections; a poisoned
// mutex still holds a consistent map.
fn lock_slots(slots: &Mutex<Slots>) -> MutexGuard<'_, Slots> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Exclusive access to one key of a [`KeyedLock`]
pub struct KeyedLockGuard {
    key: String,
    slots: Arc<Mutex<Slots>>,
    slot: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyedLockGuard {
    fn drop(&mut self) {
        let mut slots = lock_slots(&self.slots);
        self.guard.take();

        // Clones of the slot are only made under the map lock, so one held by the
        // map and one by us means nobody else is waiting.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
        tracing::debug!(key = %self.key, "Keyed lock released");
    }
}
