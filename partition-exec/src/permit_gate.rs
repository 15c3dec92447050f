// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The global concurrency gate.
//!
//! A counting semaphore separate from the partition-lock registry: the
//! registry serializes same-partition items, this caps the total number of
//! handler invocations running anywhere in the dispatcher at once.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Wraps a `tokio::sync::Semaphore` sized to `maxConcurrency`.
#[derive(Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyGate {
    /// Creates a gate with `max_concurrency` permits (must be at least 1).
    #[must_use]
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Acquires one permit, waiting if the gate is saturated.
    ///
    /// The returned guard releases the permit on drop, so callers get
    /// release-on-every-completion-path behavior for free: success, handler
    /// error, or the future being dropped outright on cancellation all
    /// release the same way.
    ///
    /// # Panics
    /// Panics only if the underlying semaphore has been closed, which this
    /// type never does.
    pub async fn acquire(&self) -> GatePermit {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("ConcurrencyGate semaphore is never closed");
        GatePermit { _permit: permit }
    }

    /// Number of permits currently available (for tests/metrics only).
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// An acquired permit; dropping it returns the permit to the gate.
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_configured_concurrency() {
        let gate = ConcurrencyGate::new(2);
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            let concurrent = concurrent.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _permit = gate.acquire().await;
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn permit_is_released_on_drop_even_if_body_panics_are_avoided() {
        let gate = ConcurrencyGate::new(1);
        {
            let _permit = gate.acquire().await;
            assert_eq!(gate.available_permits(), 0);
        }
        assert_eq!(gate.available_permits(), 1);
    }
}
