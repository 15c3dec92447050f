// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The guard that ties a partition lock's lifetime to the last clone of
//! the group it was acquired for.
//!
//! A poll tick's batch is split into groups by partition key; `tryAcquire`
//! runs once per group, but `release` must run once, after the *last* item
//! in that group has been fully processed downstream. A refcounted guard
//! models that directly: every item in the group carries a clone of the
//! same `Arc<ReleaseGuard>`, and the partition lock is released when the
//! refcount drops to zero, i.e. when the last item is dropped by whatever
//! finished processing it.

use partition_core::{PartitionLockRegistry, Partitionable};
use std::ops::Deref;
use std::sync::Arc;

struct ReleaseGuard {
    registry: Arc<PartitionLockRegistry>,
    key: String,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}

/// A value that still holds its partition lock.
///
/// Derefs to `T` so downstream code (grouping, handler dispatch) can mostly
/// ignore the wrapper; the lock is released automatically once every clone
/// of this item sharing the same group has been dropped.
pub struct Gated<T> {
    value: T,
    _guard: Arc<ReleaseGuard>,
}

impl<T> Gated<T> {
    pub(crate) fn new_group(
        registry: Arc<PartitionLockRegistry>,
        key: String,
        values: Vec<T>,
    ) -> Vec<Self> {
        let guard = Arc::new(ReleaseGuard { registry, key });
        values
            .into_iter()
            .map(|value| Self {
                value,
                _guard: guard.clone(),
            })
            .collect()
    }

    /// Unwraps the inner value, dropping the lock guard immediately.
    ///
    /// Only appropriate once the caller is certain no further
    /// lock-respecting processing is needed for this item.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: Clone> Clone for Gated<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            _guard: self._guard.clone(),
        }
    }
}

impl<T: Partitionable> Partitionable for Gated<T> {
    fn client_id(&self) -> &str {
        self.value.client_id()
    }

    fn account_id(&self) -> &str {
        self.value.account_id()
    }

    fn operation(&self) -> &str {
        self.value.operation()
    }
}

impl<T> Deref for Gated<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Gated<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gated").field("value", &self.value).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_releases_only_after_every_clone_in_the_group_drops() {
        let registry = Arc::new(PartitionLockRegistry::new());
        assert!(registry.try_acquire("k"));

        let group = Gated::new_group(registry.clone(), "k".to_string(), vec![1, 2, 3]);
        let mut iter = group.into_iter();
        let first = iter.next().unwrap();
        let second = iter.next().unwrap();
        let third = iter.next().unwrap();

        assert!(registry.is_held("k"));
        drop(first);
        assert!(registry.is_held("k"));
        drop(second);
        assert!(registry.is_held("k"));
        drop(third);
        assert!(!registry.is_held("k"));
    }
}
