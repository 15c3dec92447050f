// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Turns a blocking `fetch` function into a cancellable, back-pressure-aware,
//! error-recovering stream gated by a [`PartitionLockRegistry`].

use crate::gated::Gated;
use futures::stream::Stream;
use partition_core::{DispatchError, PartitionLockRegistry, StreamItem};
use partition_exec::run_blocking;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

type FetchFn<T> = Arc<dyn Fn() -> Result<Vec<T>, DispatchError> + Send + Sync>;
type PartitionKeyOf<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;
type BatchObserver<T> = Arc<dyn Fn(&[T]) + Send + Sync>;
type ItemFilter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
type ErrorObserver = Arc<dyn Fn(&DispatchError) + Send + Sync>;

/// Configuration for one [`PollingPublisher`].
///
/// A plain record, not a builder-only type: every field can be set
/// directly. [`PollConfigBuilder`] exists purely for call-site ergonomics.
#[derive(Clone)]
pub struct PollConfig<T> {
    pub poll_interval: Duration,
    pub partition_key_of: PartitionKeyOf<T>,
    pub registry: Arc<PartitionLockRegistry>,
    pub batch_observer: Option<BatchObserver<T>>,
    pub item_filter: Option<ItemFilter<T>>,
    pub continue_on_error: bool,
    pub error_observer: Option<ErrorObserver>,
}

impl<T> PollConfig<T> {
    /// Starts a builder seeded with the defaults from the configuration
    /// table (5 second interval, `continueOnError = true`).
    pub fn builder(
        registry: Arc<PartitionLockRegistry>,
        partition_key_of: impl Fn(&T) -> String + Send + Sync + 'static,
    ) -> PollConfigBuilder<T> {
        PollConfigBuilder {
            config: PollConfig {
                poll_interval: Duration::from_secs(5),
                partition_key_of: Arc::new(partition_key_of),
                registry,
                batch_observer: None,
                item_filter: None,
                continue_on_error: true,
                error_observer: None,
            },
        }
    }
}

/// Convenience wrapper over [`PollConfig`]; every setter is optional.
pub struct PollConfigBuilder<T> {
    config: PollConfig<T>,
}

impl<T> PollConfigBuilder<T> {
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn batch_observer(mut self, f: impl Fn(&[T]) + Send + Sync + 'static) -> Self {
        self.config.batch_observer = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn item_filter(mut self, f: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.config.item_filter = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn continue_on_error(mut self, value: bool) -> Self {
        self.config.continue_on_error = value;
        self
    }

    #[must_use]
    pub fn error_observer(mut self, f: impl Fn(&DispatchError) + Send + Sync + 'static) -> Self {
        self.config.error_observer = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn build(self) -> PollConfig<T> {
        self.config
    }
}

/// A cold, restartable stream wrapping a blocking `fetch` function.
///
/// Every call to [`PollingPublisher::start`] runs an independent polling
/// loop; cancelling one subscription's token never affects another's.
pub struct PollingPublisher<T> {
    fetch: FetchFn<T>,
    config: PollConfig<T>,
}

impl<T> PollingPublisher<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(
        fetch: impl Fn() -> Result<Vec<T>, DispatchError> + Send + Sync + 'static,
        config: PollConfig<T>,
    ) -> Self {
        Self {
            fetch: Arc::new(fetch),
            config,
        }
    }

    /// Starts a new polling loop, returning a stream of gated items.
    ///
    /// The loop ticks at `poll_interval` (tick 0 fires immediately),
    /// invoking `fetch` on the blocking thread pool each time the previous
    /// tick has already completed; an overlapping tick is dropped
    /// (`BackpressureDrop`, logged at `warn`), never queued.
    pub fn start(&self, cancel: CancellationToken) -> impl Stream<Item = StreamItem<Gated<T>>> {
        let fetch = self.fetch.clone();
        let config = self.config.clone();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(run_poll_loop(fetch, config, cancel, tx));

        tokio_stream::wrappers::UnboundedReceiverStream::new(rx)
    }
}

async fn run_poll_loop<T>(
    fetch: FetchFn<T>,
    config: PollConfig<T>,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<StreamItem<Gated<T>>>,
) where
    T: Clone + Send + Sync + 'static,
{
    let mut interval = tokio::time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let busy = Arc::new(AtomicBool::new(false));
    let stopped = Arc::new(AtomicBool::new(false));
    let stop_notify = Arc::new(Notify::new());

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("polling publisher stopped");
                return;
            }
            () = stop_notify.notified() => {
                tracing::info!("polling publisher stopped after non-continuable fetch error");
                return;
            }
            _ = interval.tick() => {}
        }

        if stopped.load(Ordering::Acquire) {
            return;
        }

        if busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("poll tick dropped: previous fetch still in flight");
            continue;
        }

        let fetch = fetch.clone();
        let config = config.clone();
        let tx = tx.clone();
        let busy = busy.clone();
        let cancel = cancel.clone();
        let stopped = stopped.clone();
        let stop_notify = stop_notify.clone();

        tokio::spawn(async move {
            let keep_polling = run_one_tick(fetch, &config, &tx, &cancel).await;
            busy.store(false, Ordering::Release);
            if !keep_polling {
                stopped.store(true, Ordering::Release);
                stop_notify.notify_one();
            }
        });
    }
}

/// Runs one fetch-and-publish cycle. Returns `false` when the publisher
/// must stop ticking entirely (a fetch error with `continue_on_error =
/// false`); `true` otherwise.
async fn run_one_tick<T>(
    fetch: FetchFn<T>,
    config: &PollConfig<T>,
    tx: &mpsc::UnboundedSender<StreamItem<Gated<T>>>,
    cancel: &CancellationToken,
) -> bool
where
    T: Clone + Send + Sync + 'static,
{
    let fetch_call = fetch.clone();
    let outcome = run_blocking(move || fetch_call()).await;

    if cancel.is_cancelled() {
        // Results of an in-flight fetch are discarded once cancelled; the
        // fetch itself was allowed to run to completion since it's blocking.
        return true;
    }

    let batch = match outcome {
        Ok(batch) => batch,
        Err(err) => {
            if config.continue_on_error {
                tracing::warn!(error = %err, "poll fetch failed, resuming on next tick");
            } else {
                tracing::error!(error = %err, "poll fetch failed, stopping publisher");
            }
            if let Some(observer) = &config.error_observer {
                observer(&err);
            }
            if !config.continue_on_error {
                let _ = tx.send(StreamItem::Error(err));
                return false;
            }
            return true;
        }
    };

    if batch.is_empty() {
        return true;
    }

    if let Some(observer) = &config.batch_observer {
        observer(&batch);
    }

    let filtered: Vec<T> = match &config.item_filter {
        Some(filter) => batch.into_iter().filter(|item| filter(item)).collect(),
        None => batch,
    };

    let mut by_key: HashMap<String, Vec<T>> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for item in filtered {
        let key = (config.partition_key_of)(&item);
        if !by_key.contains_key(&key) {
            order.push(key.clone());
        }
        by_key.entry(key).or_default().push(item);
    }

    for key in order {
        let group = by_key.remove(&key).unwrap_or_default();
        if !config.registry.try_acquire(&key) {
            // Entire group dropped for this tick; it will be re-observed
            // on a later poll if the store still reports it unprocessed.
            continue;
        }
        for gated in Gated::new_group(config.registry.clone(), key, group) {
            if tx.send(StreamItem::Value(gated)).is_err() {
                return true;
            }
        }
    }

    true
}
