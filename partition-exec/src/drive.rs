// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Generic "pull items off a stream, run an async handler over each,
//! observe success/failure" engine, shared by every lane the dispatcher
//! spawns (the serial download lane and the bounded-parallel lane for
//! everything else).
//!
//! Mirrors the sequential `subscribe` pattern this workspace is built from,
//! extended with a [`ConcurrencyGate`] permit and an error-continuation
//! policy.

use crate::permit_gate::ConcurrencyGate;
use futures::{Stream, StreamExt};
use partition_core::{DispatchError, StreamItem};
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Observer callbacks invoked around each item's processing.
#[derive(Clone, Default)]
pub struct Observers<T> {
    pub pre: Option<Arc<dyn Fn(&T) + Send + Sync>>,
    pub success: Option<Arc<dyn Fn(&T) + Send + Sync>>,
    pub error: Option<Arc<dyn Fn(&T, &DispatchError) + Send + Sync>>,
}

/// Drives `stream` strictly one item at a time: the handler for item N+1
/// does not start until item N's completion signal has fired.
///
/// Used for an account's download lane, where concurrency must be exactly
/// 1 and handler invocations must happen in arrival order.
///
/// Returns `Err` only when `continue_on_error` is `false` and a fetch error
/// or handler error was seen; in every other case it drains until the
/// stream ends or `cancel` fires.
pub async fn drive_sequential<S, T, F, Fut>(
    mut stream: S,
    gate: ConcurrencyGate,
    process: F,
    observers: Observers<T>,
    continue_on_error: bool,
    cancel: CancellationToken,
) -> Result<(), DispatchError>
where
    S: Stream<Item = StreamItem<T>> + Unpin,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), DispatchError>> + Send,
    T: Clone + Send,
{
    loop {
        let item = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            next = stream.next() => next,
        };
        let Some(item) = item else { return Ok(()) };

        let value = match item {
            StreamItem::Value(v) => v,
            StreamItem::Error(e) => {
                tracing::error!(error = %e, "serial lane stream terminated with an error");
                return if continue_on_error { Ok(()) } else { Err(e) };
            }
        };

        if let Some(pre) = &observers.pre {
            pre(&value);
        }

        let permit = gate.acquire().await;
        let outcome = process(value_and_keep(&value)).await;
        drop(permit);

        match outcome {
            Ok(()) => {
                if let Some(success) = &observers.success {
                    success(&value);
                }
            }
            Err(err) => {
                if let Some(error_observer) = &observers.error {
                    error_observer(&value, &err);
                }
                if !continue_on_error {
                    return Err(err);
                }
            }
        }
    }
}

/// Takes `value` back out after it was only borrowed for observers.
///
/// `process` needs ownership, but the observers above need a `&T` *before*
/// `process` runs (`preObserver`) and *after* it returns
/// (`successObserver`/`errorObserver`), so the driver must hold onto the
/// value across the call instead of moving it in. Requiring `T: Clone` here
/// would be a silent cost on every item; instead we just clone once at the
/// call site where it's unavoidable.
fn value_and_keep<T: Clone>(value: &T) -> T {
    value.clone()
}

/// Drives `stream` with up to `gate`'s permit count running concurrently:
/// as soon as a permit is available the next item's handler is spawned,
/// without waiting for prior items in this lane to finish.
///
/// Used for an account's parallel lane (everything except `download`).
/// Ordering across items in this lane is not guaranteed beyond each item's
/// own partition-level FIFO, which the caller already enforced upstream —
/// except for `key_of`: two items that map to the same key are never
/// in flight at the same time, no matter how many permits `gate` has
/// available. An item whose key is already running is queued and spawned
/// only once the running one's handler has returned.
pub async fn drive_concurrent<S, T, F, Fut, K>(
    mut stream: S,
    gate: ConcurrencyGate,
    process: F,
    observers: Observers<T>,
    continue_on_error: bool,
    cancel: CancellationToken,
    key_of: K,
) -> Result<(), DispatchError>
where
    S: Stream<Item = StreamItem<T>> + Unpin,
    F: Fn(T) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
    T: Clone + Send + 'static,
    K: Fn(&T) -> String,
{
    let mut in_flight: tokio::task::JoinSet<String> = tokio::task::JoinSet::new();
    let mut running_keys: HashSet<String> = HashSet::new();
    let mut pending: HashMap<String, VecDeque<T>> = HashMap::new();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                in_flight.shutdown().await;
                return Ok(());
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                on_task_joined(
                    joined,
                    &mut in_flight,
                    &mut running_keys,
                    &mut pending,
                    &gate,
                    &process,
                    &observers,
                );
            }
            next = stream.next() => {
                let Some(item) = next else {
                    break;
                };
                let value = match item {
                    StreamItem::Value(v) => v,
                    StreamItem::Error(e) => {
                        tracing::error!(error = %e, "parallel lane stream terminated with an error");
                        if continue_on_error {
                            continue;
                        }
                        in_flight.shutdown().await;
                        return Err(e);
                    }
                };

                if let Some(pre) = &observers.pre {
                    pre(&value);
                }

                let key = key_of(&value);
                if running_keys.insert(key.clone()) {
                    spawn_item(&mut in_flight, gate.clone(), process.clone(), &observers, key, value);
                } else {
                    pending.entry(key).or_default().push_back(value);
                }
            }
        }
    }

    // Drain remaining in-flight handlers, still honoring per-key ordering
    // for anything that was queued behind a still-running item.
    while let Some(joined) = in_flight.join_next().await {
        on_task_joined(
            joined,
            &mut in_flight,
            &mut running_keys,
            &mut pending,
            &gate,
            &process,
            &observers,
        );
    }
    Ok(())
}

fn spawn_item<T, F, Fut>(
    in_flight: &mut tokio::task::JoinSet<String>,
    gate: ConcurrencyGate,
    process: F,
    observers: &Observers<T>,
    key: String,
    value: T,
) where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
    T: Clone + Send + 'static,
{
    let success_observer = observers.success.clone();
    let error_observer = observers.error.clone();

    in_flight.spawn(async move {
        let permit = gate.acquire().await;
        let outcome = process(value.clone()).await;
        drop(permit);
        match outcome {
            Ok(()) => {
                if let Some(success) = success_observer {
                    success(&value);
                }
            }
            Err(err) => {
                if let Some(error_observer) = error_observer {
                    error_observer(&value, &err);
                }
            }
        }
        key
    });
}

/// Handles one completed task: frees its key and, if another item with the
/// same key was queued behind it, spawns that one next.
fn on_task_joined<T, F, Fut>(
    joined: Result<String, tokio::task::JoinError>,
    in_flight: &mut tokio::task::JoinSet<String>,
    running_keys: &mut HashSet<String>,
    pending: &mut HashMap<String, VecDeque<T>>,
    gate: &ConcurrencyGate,
    process: &F,
    observers: &Observers<T>,
) where
    F: Fn(T) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
    T: Clone + Send + 'static,
{
    let key = match joined {
        Ok(key) => key,
        Err(err) => {
            if err.is_panic() {
                tracing::error!("parallel lane task panicked");
            }
            return;
        }
    };

    let Some(queue) = pending.get_mut(&key) else {
        running_keys.remove(&key);
        return;
    };
    let Some(next_value) = queue.pop_front() else {
        pending.remove(&key);
        running_keys.remove(&key);
        return;
    };
    if queue.is_empty() {
        pending.remove(&key);
    }
    spawn_item(in_flight, gate.clone(), process.clone(), observers, key, next_value);
}
