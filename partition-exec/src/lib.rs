// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Execution primitives shared by the publisher and dispatcher: a global
//! concurrency gate, a blocking-executor wrapper, and the drive loop that
//! pulls items off a stream and invokes a handler over each one.

pub mod blocking_pool;
pub mod drive;
pub mod permit_gate;

pub use blocking_pool::run_blocking;
pub use drive::{drive_concurrent, drive_sequential, Observers};
pub use permit_gate::{ConcurrencyGate, GatePermit};
