//! Per-post mutual exclusion for cache fills.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock table keyed by post id. Entries live only while someone holds or waits on them.
#[derive(Clone, Default)]
pub struct PostLocks {
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl PostLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, post_id: i64) -> PostLockGuard {
        let lock = self
            .locks
            .entry(post_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = Arc::clone(&lock).lock_owned().await;
        PostLockGuard {
            post_id,
            guard: Some(guard),
            lock,
            locks: Arc::clone(&self.locks),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

pub struct PostLockGuard {
    post_id: i64,
    guard: Option<OwnedMutexGuard<()>>,
    lock: Arc<Mutex<()>>,
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl Drop for PostLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Table entry plus our own handle; any extra reference is a waiter.
        self.locks
            .remove_if(&self.post_id, |_, lock| {
                Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
            });
    }
}
