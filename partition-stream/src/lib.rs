// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Stream-shaped sources for the partitioned work dispatcher: a polling
//! publisher, a push publisher, keyed grouping, and stream merge. All three
//! gate their output through a shared [`partition_core::PartitionLockRegistry`].

pub mod gated;
pub mod group;
pub mod merge;
pub mod polling;
pub mod push;

pub use gated::Gated;
pub use group::{group_by, GroupedStream, NewGroup};
pub use merge::merge;
pub use polling::{PollConfig, PollConfigBuilder, PollingPublisher};
pub use push::PushPublisher;
