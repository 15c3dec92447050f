// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A thin adapter around an externally-driven push source: the same
//! partition gate as [`PollingPublisher`](crate::polling::PollingPublisher),
//! minus polling, batching, and the blocking executor.

use crate::gated::Gated;
use partition_core::PartitionLockRegistry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

type PartitionKeyOf<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;
type ItemFilter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// An externally-driven publisher: the integrator calls [`offer`](Self::offer)
/// once per delivered item instead of this crate polling for batches.
pub struct PushPublisher<T> {
    registry: Arc<PartitionLockRegistry>,
    partition_key_of: PartitionKeyOf<T>,
    item_filter: Option<ItemFilter<T>>,
    tx: mpsc::UnboundedSender<Gated<T>>,
    rx: Option<mpsc::UnboundedReceiver<Gated<T>>>,
}

impl<T> PushPublisher<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(
        registry: Arc<PartitionLockRegistry>,
        partition_key_of: impl Fn(&T) -> String + Send + Sync + 'static,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            registry,
            partition_key_of: Arc::new(partition_key_of),
            item_filter: None,
            tx,
            rx: Some(rx),
        }
    }

    #[must_use]
    pub fn with_item_filter(mut self, f: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.item_filter = Some(Arc::new(f));
        self
    }

    /// Takes the stream of items that clear the gate. Only one consumer is
    /// supported per publisher; calling this twice returns `None` the
    /// second time.
    pub fn take_stream(&mut self) -> Option<UnboundedReceiverStream<Gated<T>>> {
        self.rx.take().map(UnboundedReceiverStream::new)
    }

    /// Delivers `item` from the external source.
    ///
    /// Returns `true` if it entered the pipeline (passed the filter and
    /// acquired its partition lock), `false` if it was gated out — dropped
    /// silently, per the push-source contract; requeue/NACK decisions are
    /// the integrator's, not this crate's.
    pub fn offer(&self, item: T) -> bool {
        if let Some(filter) = &self.item_filter {
            if !filter(&item) {
                return false;
            }
        }

        let key = (self.partition_key_of)(&item);
        if !self.registry.try_acquire(&key) {
            return false;
        }

        let gated = Gated::new_group(self.registry.clone(), key, vec![item])
            .into_iter()
            .next()
            .expect("new_group with one value yields exactly one item");

        self.tx.send(gated).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[derive(Clone)]
    struct Item {
        key: String,
    }

    #[tokio::test]
    async fn offer_returns_false_when_the_gate_is_held() {
        let registry = Arc::new(PartitionLockRegistry::new());
        assert!(registry.try_acquire("k"));
        let publisher = PushPublisher::new(registry, |i: &Item| i.key.clone());
        assert!(!publisher.offer(Item { key: "k".into() }));
    }

    #[tokio::test]
    async fn offer_returns_true_and_forwards_on_success() {
        let registry = Arc::new(PartitionLockRegistry::new());
        let mut publisher = PushPublisher::new(registry, |i: &Item| i.key.clone());
        let mut stream = publisher.take_stream().unwrap();

        assert!(publisher.offer(Item { key: "k".into() }));
        let received = stream.next().await.unwrap();
        assert_eq!(received.key, "k");
    }

    #[tokio::test]
    async fn item_filter_rejects_before_the_gate() {
        let registry = Arc::new(PartitionLockRegistry::new());
        let publisher =
            PushPublisher::new(registry.clone(), |i: &Item| i.key.clone()).with_item_filter(|_| false);
        assert!(!publisher.offer(Item { key: "k".into() }));
        assert!(!registry.is_held("k"));
    }
}
