// Per-path async mutexes so read-modify-write sequences on one document are
// linearized. Different paths never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use folio_common::path::DocPath;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct PathLocks {
    slots: Mutex<HashMap<DocPath, Arc<AsyncMutex<()>>>>,
}

/// Held locks; released on drop.
#[derive(Debug)]
pub struct PathGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, path: &DocPath) -> PathGuard {
        let slot = self.slot(path);
        PathGuard { _guards: vec![slot.lock_owned().await] }
    }

    /// Locks two paths in a fixed order so concurrent renames cannot deadlock.
    pub async fn lock_pair(&self, a: &DocPath, b: &DocPath) -> PathGuard {
        if a == b {
            return self.lock(a).await;
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let first = self.slot(first).lock_owned().await;
        let second = self.slot(second).lock_owned().await;
        PathGuard { _guards: vec![first, second] }
    }

    /// Number of tracked slots (idle ones are pruned lazily).
    pub fn tracked(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }

    fn slot(&self, path: &DocPath) -> Arc<AsyncMutex<()>> {
        let mut slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Only this map holds an idle slot, so strong_count == 1 means unused.
        slots.retain(|key, slot| key == path || Arc::strong_count(slot) > 1);
        Arc::clone(slots.entry(path.clone()).or_default())
    }
}
