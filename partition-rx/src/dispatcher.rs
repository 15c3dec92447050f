// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The merge-and-dispatch engine: merges upstream sources, groups by
//! account then by operation, enforces the global concurrency cap, and
//! invokes `process` per item with success/error observers.

use crate::config::DispatcherConfig;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{BoxStream, Stream, StreamExt};
use partition_core::{DispatchError, Partitionable, StreamItem};
use partition_exec::{drive_concurrent, drive_sequential, ConcurrencyGate, Observers};
use partition_stream::{group_by, merge};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

type ProcessFn<T> = Arc<dyn Fn(T) -> BoxFuture<'static, Result<(), DispatchError>> + Send + Sync>;

/// One terminal outcome of an item's processing, surfaced on the stream
/// returned by [`Dispatcher::start`].
#[derive(Debug)]
pub enum DispatchOutcome<T> {
    Success(T),
    Failure(T, DispatchError),
}

/// The orchestrator described in the component design: merges N streams,
/// groups by `accountId`, routes `download` items to a serial lane and
/// everything else to a bounded-parallel lane, and invokes `process` under
/// a shared global concurrency gate.
pub struct Dispatcher<T> {
    process: ProcessFn<T>,
    gate: ConcurrencyGate,
    continue_on_error: bool,
    pre_observer: Option<Arc<dyn Fn(&T) + Send + Sync>>,
    success_observer: Option<Arc<dyn Fn(&T) + Send + Sync>>,
    error_observer: Option<Arc<dyn Fn(&T, &DispatchError) + Send + Sync>>,
}

impl<T> Dispatcher<T>
where
    T: Partitionable + Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(process: F, config: DispatcherConfig) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), DispatchError>> + Send + 'static,
    {
        Self {
            process: Arc::new(move |item| process(item).boxed()),
            gate: ConcurrencyGate::new(config.max_concurrency),
            continue_on_error: config.continue_on_error,
            pre_observer: None,
            success_observer: None,
            error_observer: None,
        }
    }

    #[must_use]
    pub fn with_pre_observer(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.pre_observer = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_success_observer(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.success_observer = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_error_observer(mut self, f: impl Fn(&T, &DispatchError) + Send + Sync + 'static) -> Self {
        self.error_observer = Some(Arc::new(f));
        self
    }

    /// Starts the pipeline and returns a stream of per-item outcomes.
    ///
    /// Useful for tests that need to observe completion directly; embedders
    /// that just want the pipeline running should prefer
    /// [`Dispatcher::start_async`].
    pub fn start(
        &self,
        sources: Vec<BoxStream<'static, StreamItem<T>>>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = DispatchOutcome<T>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.spawn_pipeline(sources, cancel, Some(tx));
        UnboundedReceiverStream::new(rx)
    }

    /// Starts the pipeline with a built-in logging consumer and returns
    /// immediately.
    pub fn start_async(&self, sources: Vec<BoxStream<'static, StreamItem<T>>>, cancel: CancellationToken) {
        self.spawn_pipeline(sources, cancel, None);
    }

    fn spawn_pipeline(
        &self,
        sources: Vec<BoxStream<'static, StreamItem<T>>>,
        cancel: CancellationToken,
        outcomes: Option<mpsc::UnboundedSender<DispatchOutcome<T>>>,
    ) {
        let merged = merge(sources).boxed();
        let by_account = group_by(merged, |item: &T| item.account_id().to_string());

        let process = self.process.clone();
        let gate = self.gate.clone();
        let continue_on_error = self.continue_on_error;
        let pre_observer = self.pre_observer.clone();
        let success_observer = self.success_observer.clone();
        let error_observer = self.error_observer.clone();
        let cancel_for_accounts = cancel.clone();

        tokio::spawn(async move {
            tracing::info!("dispatcher started");
            let mut accounts = Box::pin(by_account.new_groups());
            loop {
                let next = tokio::select! {
                    biased;
                    () = cancel_for_accounts.cancelled() => break,
                    next = accounts.next() => next,
                };
                let Some(account_group) = next else { break };

                let process = process.clone();
                let gate = gate.clone();
                let pre_observer = pre_observer.clone();
                let success_observer = success_observer.clone();
                let error_observer = error_observer.clone();
                let outcomes = outcomes.clone();
                let cancel = cancel_for_accounts.clone();

                tokio::spawn(run_account_lane(
                    account_group.items.boxed(),
                    process,
                    gate,
                    continue_on_error,
                    pre_observer,
                    success_observer,
                    error_observer,
                    outcomes,
                    cancel,
                ));
            }
            tracing::info!("dispatcher stopped");
        });
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_account_lane<T>(
    account_items: BoxStream<'static, StreamItem<T>>,
    process: ProcessFn<T>,
    gate: ConcurrencyGate,
    continue_on_error: bool,
    pre_observer: Option<Arc<dyn Fn(&T) + Send + Sync>>,
    success_observer: Option<Arc<dyn Fn(&T) + Send + Sync>>,
    error_observer: Option<Arc<dyn Fn(&T, &DispatchError) + Send + Sync>>,
    outcomes: Option<mpsc::UnboundedSender<DispatchOutcome<T>>>,
    cancel: CancellationToken,
) where
    T: Partitionable + Clone + Send + Sync + 'static,
{
    let by_operation = group_by(account_items, Partitionable::is_download);
    let mut operations = Box::pin(by_operation.new_groups());

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = operations.next() => next,
        };
        let Some(lane) = next else { break };

        let observers = Observers {
            pre: pre_observer.clone(),
            success: wrap_success_observer(success_observer.clone(), outcomes.clone()),
            error: wrap_error_observer(error_observer.clone(), outcomes.clone()),
        };

        let process = process.clone();
        let gate = gate.clone();
        let cancel = cancel.clone();

        if lane.key {
            tokio::spawn(drive_sequential(
                lane.items,
                gate,
                move |item: T| process(item),
                observers,
                continue_on_error,
                cancel,
            ));
        } else {
            tokio::spawn(drive_concurrent(
                lane.items,
                gate,
                move |item: T| process(item),
                observers,
                continue_on_error,
                cancel,
                |item: &T| item.partition_key(),
            ));
        }
    }
}

fn wrap_success_observer<T: Clone + Send + Sync + 'static>(
    user: Option<Arc<dyn Fn(&T) + Send + Sync>>,
    outcomes: Option<mpsc::UnboundedSender<DispatchOutcome<T>>>,
) -> Option<Arc<dyn Fn(&T) + Send + Sync>> {
    if user.is_none() && outcomes.is_none() {
        return None;
    }
    Some(Arc::new(move |item: &T| {
        if let Some(user) = &user {
            user(item);
        }
        if let Some(tx) = &outcomes {
            let _ = tx.send(DispatchOutcome::Success(item.clone()));
        }
    }))
}

fn wrap_error_observer<T: Clone + Send + Sync + 'static>(
    user: Option<Arc<dyn Fn(&T, &DispatchError) + Send + Sync>>,
    outcomes: Option<mpsc::UnboundedSender<DispatchOutcome<T>>>,
) -> Option<Arc<dyn Fn(&T, &DispatchError) + Send + Sync>> {
    if user.is_none() && outcomes.is_none() {
        return None;
    }
    Some(Arc::new(move |item: &T, err: &DispatchError| {
        if let Some(user) = &user {
            user(item, err);
        }
        if let Some(tx) = &outcomes {
            let _ = tx.send(DispatchOutcome::Failure(item.clone(), err.clone()));
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use partition_core::WorkItem;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn item(id: &str, account: &str, op: &str) -> StreamItem<WorkItem> {
        StreamItem::Value(WorkItem::new(id, "client", account, op, "tag", vec![]))
    }

    #[tokio::test]
    async fn download_items_in_one_account_run_strictly_in_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let order_clone = order.clone();

        let dispatcher = Dispatcher::new(
            move |w: WorkItem| {
                let order = order_clone.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    order.lock().unwrap().push(w.id.clone());
                    Ok(())
                }
            },
            DispatcherConfig::default(),
        );

        let source = futures::stream::iter(vec![
            item("1", "A", "download"),
            item("2", "A", "download"),
            item("3", "A", "update"),
            item("4", "A", "download"),
        ])
        .boxed();

        let cancel = CancellationToken::new();
        let mut outcomes = Box::pin(dispatcher.start(vec![source], cancel.clone()));

        for _ in 0..4 {
            outcomes.next().await;
        }
        cancel.cancel();

        let recorded = order.lock().unwrap();
        let download_positions: Vec<_> = recorded
            .iter()
            .filter(|id| **id != "3")
            .cloned()
            .collect();
        assert_eq!(download_positions, vec!["1", "2", "4"]);
    }

    #[tokio::test]
    async fn unknown_type_invokes_error_observer_and_keeps_running() {
        let successes = Arc::new(AtomicUsize::new(0));
        let successes_clone = successes.clone();

        let dispatcher = Dispatcher::new(
            move |w: WorkItem| {
                let successes = successes_clone.clone();
                async move {
                    if w.type_tag == "MISSING" {
                        Err(DispatchError::UnknownType("MISSING".into()))
                    } else {
                        successes.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }
            },
            DispatcherConfig::default(),
        );

        let bad = StreamItem::Value(WorkItem::new("1", "client", "X", "update", "MISSING", vec![]));
        let source = futures::stream::iter(vec![bad]).boxed();
        let cancel = CancellationToken::new();
        let mut outcomes = Box::pin(dispatcher.start(vec![source], cancel.clone()));

        let outcome = outcomes.next().await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Failure(_, DispatchError::UnknownType(_))));
        cancel.cancel();
    }

    #[tokio::test]
    async fn two_accounts_process_independently() {
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let concurrent_clone = concurrent.clone();
        let max_seen_clone = max_seen.clone();

        let dispatcher = Dispatcher::new(
            move |_w: WorkItem| {
                let concurrent = concurrent_clone.clone();
                let max_seen = max_seen_clone.clone();
                async move {
                    let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    concurrent.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            DispatcherConfig::default(),
        );

        let source = futures::stream::iter(vec![
            item("1", "A", "download"),
            item("2", "B", "download"),
        ])
        .boxed();
        let cancel = CancellationToken::new();
        let mut outcomes = Box::pin(dispatcher.start(vec![source], cancel.clone()));

        outcomes.next().await;
        outcomes.next().await;
        cancel.cancel();

        assert_eq!(max_seen.load(Ordering::SeqCst), 2);
    }
}
