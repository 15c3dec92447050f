// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Keyed stream grouping: the same primitive backs `groupBy(accountId)` and
//! the nested `groupBy(isDownload)` inside each account lane.
//!
//! A background task pulls from one upstream stream, computes a key per
//! item, and fans each item out to that key's [`Broadcaster`]. New keys are
//! announced on a channel so a caller can spawn a worker lane per key on
//! demand, instead of needing to know the key space in advance.

use dashmap::DashMap;
use futures::stream::{Stream, StreamExt};
use partition_core::{Broadcaster, BroadcasterStream, DispatchError, StreamItem};
use std::hash::Hash;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// One newly-observed key and the stream of items routed to it.
pub struct NewGroup<K, T> {
    pub key: K,
    pub items: BroadcasterStream<T>,
}

/// Handle to a running grouping task.
///
/// Dropping this handle aborts the routing task; subscribers already
/// holding a [`BroadcasterStream`] simply see their stream end.
pub struct GroupedStream<K, T> {
    new_groups: async_channel::Receiver<NewGroup<K, T>>,
    task: JoinHandle<()>,
}

impl<K, T> Drop for GroupedStream<K, T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl<K, T> GroupedStream<K, T> {
    /// Stream of groups as their first item arrives.
    ///
    /// Each [`NewGroup`] is yielded exactly once, the moment its key is
    /// first observed; the caller is expected to immediately spawn a
    /// consumer for it (the routing task does not buffer past broadcaster
    /// capacity if nobody is subscribed).
    ///
    /// Borrows rather than consumes `self`: the routing task keeps running
    /// for as long as the `GroupedStream` handle is kept alive, regardless
    /// of how many times (or whether) this is called.
    pub fn new_groups(&self) -> impl Stream<Item = NewGroup<K, T>> {
        self.new_groups.clone()
    }
}

/// Routes `upstream` into per-key sub-streams.
///
/// `key_of` is called once per item. An upstream terminal error is
/// broadcast to every group that currently has subscribers and ends the
/// routing task; groups with no subscribers yet simply never see it.
pub fn group_by<S, K, T, F>(mut upstream: S, key_of: F) -> GroupedStream<K, T>
where
    S: Stream<Item = StreamItem<T>> + Unpin + Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    F: Fn(&T) -> K + Send + 'static,
{
    let (announce_tx, announce_rx) = async_channel::unbounded();
    let groups: Arc<DashMap<K, Broadcaster<T>>> = Arc::new(DashMap::new());

    let task = tokio::spawn(async move {
        while let Some(item) = upstream.next().await {
            match item {
                StreamItem::Value(value) => {
                    let key = key_of(&value);
                    route_value(&groups, &announce_tx, key, value).await;
                }
                StreamItem::Error(err) => {
                    broadcast_error(&groups, err);
                    break;
                }
            }
        }
    });

    GroupedStream {
        new_groups: announce_rx,
        task,
    }
}

async fn route_value<K, T>(
    groups: &Arc<DashMap<K, Broadcaster<T>>>,
    announce_tx: &async_channel::Sender<NewGroup<K, T>>,
    key: K,
    value: T,
) where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    if let Some(broadcaster) = groups.get(&key) {
        broadcaster.send(value);
        return;
    }

    let broadcaster = Broadcaster::new();
    let subscription = broadcaster
        .subscribe()
        .expect("freshly created broadcaster is never closed");
    broadcaster.send(value);
    groups.insert(key.clone(), broadcaster);

    // A subscriber that never shows up (nobody reads `new_groups()`) just
    // leaks a broadcaster entry with an unread subscription; acceptable for
    // a process-lifetime registry with a bounded key space.
    let _ = announce_tx
        .send(NewGroup {
            key,
            items: subscription,
        })
        .await;
}

fn broadcast_error<K, T>(groups: &DashMap<K, Broadcaster<T>>, err: DispatchError)
where
    K: Eq + Hash,
    T: Clone,
{
    for entry in groups.iter() {
        entry.value().error(err.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn routes_items_to_their_key_and_announces_new_keys_once() {
        let items = vec![
            StreamItem::Value(("A", 1)),
            StreamItem::Value(("B", 2)),
            StreamItem::Value(("A", 3)),
        ];
        let grouped = group_by(stream::iter(items), |(k, _): &(&str, i32)| *k);

        let mut new_groups = Box::pin(grouped.new_groups());
        let mut a = new_groups.next().await.unwrap();
        assert_eq!(a.key, "A");
        let mut b = new_groups.next().await.unwrap();
        assert_eq!(b.key, "B");

        assert_eq!(a.items.next().await.unwrap().ok(), Some(("A", 1)));
        assert_eq!(b.items.next().await.unwrap().ok(), Some(("B", 2)));
        assert_eq!(a.items.next().await.unwrap().ok(), Some(("A", 3)));
    }

    #[tokio::test]
    async fn upstream_error_is_broadcast_to_subscribed_groups() {
        let items = vec![
            StreamItem::Value(("A", 1)),
            StreamItem::Error(DispatchError::Cancelled),
        ];
        let grouped = group_by(stream::iter(items), |(k, _): &(&str, i32)| *k);
        let mut new_groups = Box::pin(grouped.new_groups());
        let mut a = new_groups.next().await.unwrap();

        assert!(a.items.next().await.unwrap().is_value());
        let second = a.items.next().await.unwrap();
        assert!(matches!(second, StreamItem::Error(DispatchError::Cancelled)));
    }
}
