// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The merge-and-dispatch facade: wires a `HandlerRegistry`-backed
//! `process` function to one or more upstream item streams, enforcing
//! account/operation routing and a global concurrency cap.
//!
//! ```ignore
//! let dispatcher = Dispatcher::new(process_fn, DispatcherConfig::default())
//!     .with_error_observer(|item, err| tracing::warn!(?err, "item failed"));
//! dispatcher.start_async(sources, cancel);
//! ```

pub mod config;
pub mod dispatcher;

pub use config::{DispatcherConfig, DispatcherConfigBuilder};
pub use dispatcher::{DispatchOutcome, Dispatcher};

/// Re-exports commonly needed together at a call site.
pub mod prelude {
    pub use crate::{DispatchOutcome, Dispatcher, DispatcherConfig, DispatcherConfigBuilder};
    pub use partition_core::{
        DispatchError, Handler, HandlerRegistry, Partitionable, PartitionLockRegistry, StreamItem,
        WorkItem,
    };
    pub use partition_stream::{Gated, PollConfig, PollingPublisher, PushPublisher};
}
