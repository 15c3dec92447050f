// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A fake review queue standing in for the real persistence layer: an
//! in-memory, idempotent "fetch next batch" / "mark processed" pair.

use partition_core::WorkItem;
use std::collections::VecDeque;
use std::sync::Mutex;

pub struct FakeReviewStore {
    unprocessed: Mutex<VecDeque<WorkItem>>,
}

impl FakeReviewStore {
    pub fn seeded() -> Self {
        let items = vec![
            WorkItem::new("r1", "acme", "acct-1", "download", "review.download", b"r1".to_vec()),
            WorkItem::new("r2", "acme", "acct-1", "download", "review.download", b"r2".to_vec()),
            WorkItem::new("r3", "acme", "acct-1", "annotate", "review.annotate", b"r3".to_vec()),
            WorkItem::new("r4", "acme", "acct-2", "download", "review.download", b"r4".to_vec()),
            WorkItem::new("r5", "acme", "acct-2", "publish", "review.publish", b"r5".to_vec()),
        ];
        Self {
            unprocessed: Mutex::new(items.into_iter().collect()),
        }
    }

    /// Blocking fetch: pops up to `max_batch` still-unprocessed items.
    ///
    /// Idempotent with respect to its own invocations: an item stays in the
    /// queue (and will be returned again) until [`mark_processed`] removes
    /// it, mirroring the "same unprocessed item returned across ticks"
    /// contract.
    ///
    /// [`mark_processed`]: Self::mark_processed
    pub fn fetch_batch(&self, max_batch: usize) -> Vec<WorkItem> {
        let queue = self.unprocessed.lock().unwrap();
        queue.iter().take(max_batch).cloned().collect()
    }

    /// Called by a handler after it successfully processes `id`. The
    /// dispatcher itself never calls this.
    pub fn mark_processed(&self, id: &str) {
        let mut queue = self.unprocessed.lock().unwrap();
        queue.retain(|item| item.id != id);
    }
}
