// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Example handlers bound by `typeTag`. Each one marks its item processed
//! in the fake store on success — that bookkeeping is handler-owned, not
//! the dispatcher's job (see `DESIGN.md`'s "mark-processed" decision).

use crate::store::FakeReviewStore;
use async_trait::async_trait;
use partition_core::{BoxError, Handler};
use std::sync::Arc;
use std::time::Duration;

pub struct DownloadHandler {
    pub store: Arc<FakeReviewStore>,
}

#[async_trait]
impl Handler for DownloadHandler {
    fn type_tag(&self) -> &str {
        "review.download"
    }

    async fn handle(&self, client_id: &str, payload: &[u8]) -> Result<(), BoxError> {
        let id = String::from_utf8_lossy(payload).into_owned();
        tracing::info!(client_id, review_id = %id, "downloading review");
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.store.mark_processed(&id);
        Ok(())
    }
}

pub struct AnnotateHandler {
    pub store: Arc<FakeReviewStore>,
}

#[async_trait]
impl Handler for AnnotateHandler {
    fn type_tag(&self) -> &str {
        "review.annotate"
    }

    async fn handle(&self, client_id: &str, payload: &[u8]) -> Result<(), BoxError> {
        let id = String::from_utf8_lossy(payload).into_owned();
        tracing::info!(client_id, review_id = %id, "annotating review");
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.store.mark_processed(&id);
        Ok(())
    }
}

pub struct PublishHandler {
    pub store: Arc<FakeReviewStore>,
}

#[async_trait]
impl Handler for PublishHandler {
    fn type_tag(&self) -> &str {
        "review.publish"
    }

    async fn handle(&self, client_id: &str, payload: &[u8]) -> Result<(), BoxError> {
        let id = String::from_utf8_lossy(payload).into_owned();
        tracing::info!(client_id, review_id = %id, "publishing review");
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.store.mark_processed(&id);
        Ok(())
    }
}
