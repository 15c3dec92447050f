// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A hot, unbounded fan-out primitive used to wire a routed sub-stream
//! (one account lane, one operation lane) to whatever consumes it.
//!
//! A minimal fan-out subject: turns a single producer into a multi-subscriber
//! stream without the ordering/timestamp bounds this crate's items don't
//! carry.

use crate::stream_item::StreamItem;
use async_channel::{Receiver, Sender};
use futures::stream::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::task::{Context, Poll};

struct BroadcasterState<T> {
    closed: bool,
    senders: Vec<Sender<StreamItem<T>>>,
}

/// A broadcaster with at most one live subscriber.
///
/// The dispatcher's keyed lanes are single-consumer by construction (one
/// worker task per account, one per operation sub-lane within it), so full
/// multi-subscriber fan-out is more than is needed here — the `send`/
/// `subscribe`/`close` shape is kept anyway so a lane can be re-subscribed
/// after its worker restarts.
pub struct Broadcaster<T> {
    state: Mutex<BroadcasterState<T>>,
}

impl<T> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Broadcaster<T> {
    /// Creates a new, open broadcaster with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BroadcasterState {
                closed: false,
                senders: Vec::new(),
            }),
        }
    }

    /// Subscribes, returning a stream of future items.
    ///
    /// Late subscribers do not receive items sent before they subscribed.
    /// Returns `None` if the broadcaster is already closed.
    pub fn subscribe(&self) -> Option<BroadcasterStream<T>> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }
        let (tx, rx) = async_channel::unbounded();
        state.senders.push(tx);
        Some(BroadcasterStream { rx })
    }

    /// Sends a value to all current subscribers. Returns `false` if closed.
    pub fn send(&self, value: T) -> bool
    where
        T: Clone,
    {
        self.dispatch(StreamItem::Value(value))
    }

    /// Sends a terminal error to all current subscribers and closes.
    pub fn error(&self, err: crate::error::DispatchError)
    where
        T: Clone,
    {
        self.dispatch(StreamItem::Error(err));
        self.close();
    }

    fn dispatch(&self, item: StreamItem<T>) -> bool
    where
        T: Clone,
    {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.senders.retain(|tx| tx.try_send(clone_item(&item)).is_ok());
        true
    }

    /// Number of currently active subscribers.
    ///
    /// Updated lazily: a subscriber that dropped its receiver is only
    /// pruned on the next `send`/`error` call, not immediately.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().senders.len()
    }

    /// Closes the broadcaster; subscribers see their stream end.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.senders.clear();
    }

    /// `true` if the broadcaster has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

fn clone_item<T: Clone>(item: &StreamItem<T>) -> StreamItem<T> {
    match item {
        StreamItem::Value(v) => StreamItem::Value(v.clone()),
        StreamItem::Error(e) => StreamItem::Error(e.clone()),
    }
}

/// The stream handed back by [`Broadcaster::subscribe`].
pub struct BroadcasterStream<T> {
    rx: Receiver<StreamItem<T>>,
}

impl<T> Stream for BroadcasterStream<T> {
    type Item = StreamItem<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().rx).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn late_subscribers_do_not_see_past_items() {
        let broadcaster: Broadcaster<i32> = Broadcaster::new();
        broadcaster.send(1);
        let mut rx = broadcaster.subscribe().unwrap();
        broadcaster.send(2);
        let item = rx.next().await.unwrap();
        assert!(matches!(item, StreamItem::Value(2)));
    }

    #[tokio::test]
    async fn close_ends_the_subscriber_stream() {
        let broadcaster: Broadcaster<i32> = Broadcaster::new();
        let mut rx = broadcaster.subscribe().unwrap();
        broadcaster.close();
        assert!(rx.next().await.is_none());
    }

    #[test]
    fn subscribe_after_close_returns_none() {
        let broadcaster: Broadcaster<i32> = Broadcaster::new();
        broadcaster.close();
        assert!(broadcaster.subscribe().is_none());
    }
}
