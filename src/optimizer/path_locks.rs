//! Per-path serialization: two optimizations of the same file never overlap.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

type Slot = Arc<tokio::sync::Mutex<()>>;

/// Lock table keyed by resolved file path
#[derive(Default)]
pub struct PathLocks {
    slots: Mutex<HashMap<PathBuf, Slot>>,
}

/// Held while one file is being optimized, the table entry is dropped with the last holder
pub struct PathGuard<'a> {
    locks: &'a PathLocks,
    key: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, path: &Path) -> PathGuard<'_> {
        let key = tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf());

        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            slots.entry(key.clone()).or_default().clone()
        };
        if slot.try_lock().is_err() {
            debug!("Waiting for in-flight optimization of {}", key.display());
        }
        let guard = slot.lock_owned().await;

        PathGuard {
            locks: self,
            key,
            guard: Some(guard),
        }
    }

    /// Paths with a lock entry
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        let mut slots = self.locks.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.guard.take();
        if slots.get(&self.key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(&self.key);
        }
    }
}
