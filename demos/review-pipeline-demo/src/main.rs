// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Review pipeline demo: wires a simulated database poller and a simulated
//! subscription feed through the partitioned work dispatcher.

mod handlers;
mod store;

use crate::handlers::{AnnotateHandler, DownloadHandler, PublishHandler};
use crate::store::FakeReviewStore;
use anyhow::Result;
use futures::StreamExt;
use partition_core::{HandlerRegistry, PartitionLockRegistry, StreamItem, WorkItem};
use partition_rx::{Dispatcher, DispatcherConfig};
use partition_stream::{Gated, PollConfig, PollingPublisher, PushPublisher};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let registry = Arc::new(PartitionLockRegistry::new());
    let store = Arc::new(FakeReviewStore::seeded());

    let handlers = HandlerRegistry::new(vec![
        Arc::new(DownloadHandler { store: store.clone() }),
        Arc::new(AnnotateHandler { store: store.clone() }),
        Arc::new(PublishHandler { store: store.clone() }),
    ])?;

    let poll_store = store.clone();
    let poll_config = PollConfig::builder(registry.clone(), WorkItem::partition_key)
        .poll_interval(Duration::from_millis(500))
        .error_observer(|err| tracing::warn!(%err, "poll fetch failed"))
        .build();
    let poller = PollingPublisher::new(move || Ok(poll_store.fetch_batch(10)), poll_config);

    let mut push_publisher = PushPublisher::new(registry.clone(), WorkItem::partition_key);
    let push_stream = push_publisher
        .take_stream()
        .expect("take_stream called once")
        .map(StreamItem::Value)
        .boxed();

    let cancel = CancellationToken::new();
    let poll_stream = poller.start(cancel.clone()).boxed();

    // Simulate a push notification arriving shortly after startup.
    let push_handle = {
        let push_publisher = Arc::new(push_publisher);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            if !cancel.is_cancelled() {
                push_publisher.offer(WorkItem::new(
                    "r6",
                    "acme",
                    "acct-3",
                    "annotate",
                    "review.annotate",
                    b"r6".to_vec(),
                ));
            }
        })
    };

    let dispatcher = Dispatcher::new(
        move |item: Gated<WorkItem>| {
            let handlers = handlers.clone();
            async move { handlers.dispatch(&item.type_tag, &item.client_id, &item.payload).await }
        },
        DispatcherConfig::default(),
    )
    .with_error_observer(|item, err| {
        tracing::error!(item_id = %item.id, %err, "item failed");
    })
    .with_success_observer(|item| {
        tracing::info!(item_id = %item.id, "item done");
    });

    let mut outcomes = dispatcher
        .start(vec![poll_stream, push_stream], cancel.clone())
        .boxed();

    tracing::info!("dispatcher running, Ctrl+C to stop");

    tokio::select! {
        _ = async { while outcomes.next().await.is_some() {} } => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            cancel.cancel();
        }
        _ = tokio::time::sleep(Duration::from_secs(5)) => {
            tracing::info!("demo window elapsed, shutting down");
            cancel.cancel();
        }
    }

    push_handle.abort();
    Ok(())
}
