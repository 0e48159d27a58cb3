//! Per-yacht critical sections for admission.
//!
//! One [`tokio::sync::Mutex`] per yacht id, created on first use. Requests
//! for different yachts never contend; requests for the same yacht run
//! their check-and-insert one at a time.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::domain::YachtId;

/// Lazily populated map of yacht locks.
///
/// The outer [`RwLock`] only guards the map itself and is never held across
/// an await on the inner mutex.
#[derive(Debug, Default)]
pub struct YachtLocks {
    locks: RwLock<HashMap<YachtId, Arc<Mutex<()>>>>,
}

impl YachtLocks {
    /// Creates an empty lock map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `yacht_id`.
    ///
    /// The section lasts until the returned guard is dropped.
    pub async fn lock(&self, yacht_id: YachtId) -> OwnedMutexGuard<()> {
        let existing = self.locks.read().await.get(&yacht_id).cloned();
        let lock = match existing {
            Some(lock) => lock,
            None => Arc::clone(self.locks.write().await.entry(yacht_id).or_default()),
        };
        lock.lock_owned().await
    }

    /// Returns the number of yachts seen so far.
    pub async fn len(&self) -> usize {
        self.locks.read().await.len()
    }

    /// Returns `true` if no yacht has been locked yet.
    pub async fn is_empty(&self) -> bool {
        self.locks.read().await.is_empty()
    }
}
