// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The in-memory partition-lock registry.
//!
//! Prevents concurrent processing of work items that share a partition key.
//! Single-process only — no distributed coordination, no fairness, no TTL.
//! A caller that fails to acquire a key retries on its own schedule.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Concurrent map from partition key to a lock cell.
///
/// `try_acquire` and `release` are total, non-blocking operations. Cells are
/// created lazily on first `try_acquire` and never removed — cardinality is
/// bounded only by the number of distinct partition keys ever seen. Eviction
/// is an open question this crate does not answer (see `DESIGN.md`).
#[derive(Debug, Default)]
pub struct PartitionLockRegistry {
    cells: DashMap<String, Arc<AtomicBool>>,
}

impl PartitionLockRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cells: DashMap::new(),
        }
    }

    /// Attempts to acquire the lock for `key`.
    ///
    /// Returns `true` the first time it observes `key` in the free state and
    /// atomically transitions it to held; returns `false` if another caller
    /// already holds it. Never blocks.
    pub fn try_acquire(&self, key: &str) -> bool {
        let cell = self
            .cells
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)));
        cell.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Releases the lock for `key`.
    ///
    /// Idempotent: releasing an unheld or never-seen key is a no-op (logged
    /// at debug level), not an error — every exit path of the caller is free
    /// to call this unconditionally.
    pub fn release(&self, key: &str) {
        match self.cells.get(key) {
            Some(cell) => {
                cell.store(false, Ordering::Release);
            }
            None => {
                tracing::debug!(partition_key = key, "release of unknown partition key, ignoring");
            }
        }
    }

    /// Returns `true` if `key` is currently held.
    #[must_use]
    pub fn is_held(&self, key: &str) -> bool {
        self.cells
            .get(key)
            .map(|cell| cell.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Number of distinct partition keys ever observed by this registry.
    ///
    /// Exposed so an embedder can monitor cardinality growth and decide
    /// whether to introduce a TTL/LRU eviction policy of their own.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// `true` if no partition key has ever been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;
    use std::thread;

    #[test]
    fn single_client_reacquire() {
        let registry = PartitionLockRegistry::new();
        assert!(registry.try_acquire("C1"));
        assert!(!registry.try_acquire("C1"));
        registry.release("C1");
        assert!(registry.try_acquire("C1"));
    }

    #[test]
    fn release_of_unknown_key_is_a_no_op() {
        let registry = PartitionLockRegistry::new();
        registry.release("never-seen");
        assert!(registry.try_acquire("never-seen"));
    }

    #[test]
    fn release_is_idempotent() {
        let registry = PartitionLockRegistry::new();
        assert!(registry.try_acquire("K"));
        registry.release("K");
        registry.release("K");
        assert!(registry.try_acquire("K"));
    }

    #[test]
    fn distinct_keys_do_not_interfere() {
        let registry = PartitionLockRegistry::new();
        assert!(registry.try_acquire("A"));
        assert!(registry.try_acquire("B"));
        assert_eq!(registry.len(), 2);
    }

    /// Under concurrent acquire/release on one key, the count of
    /// successful acquires minus releases is always in {0, 1}.
    #[test]
    fn mutual_exclusion_under_contention() {
        let registry = StdArc::new(PartitionLockRegistry::new());
        let successes = StdArc::new(std::sync::atomic::AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                let successes = successes.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        if registry.try_acquire("shared") {
                            successes.fetch_add(1, Ordering::SeqCst);
                            // Simulate a short in-flight window before release.
                            thread::yield_now();
                            registry.release("shared");
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(successes.load(Ordering::SeqCst) > 0);
        assert!(!registry.is_held("shared"));
    }
}
