// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Core types for the partitioned work dispatcher.
//!
//! This crate has no opinion on streams or concurrency scheduling — see
//! `partition-exec` and `partition-stream` for those. It provides the
//! vocabulary every other crate builds on: the [`WorkItem`] data model and
//! the [`Partitionable`] capability, the [`PartitionLockRegistry`] that
//! enforces single-flight processing per partition key, the
//! [`HandlerRegistry`] that binds a `typeTag` to a [`Handler`], and the
//! error type shared across the workspace.

pub mod broadcaster;
pub mod error;
pub mod handler;
pub mod partition_lock;
pub mod stream_item;
pub mod work_item;

pub use broadcaster::{Broadcaster, BroadcasterStream};
pub use error::{BoxError, DispatchError, Result};
pub use handler::{Handler, HandlerRegistry};
pub use partition_lock::PartitionLockRegistry;
pub use stream_item::StreamItem;
pub use work_item::{Partitionable, WorkItem, DOWNLOAD_OPERATION};
