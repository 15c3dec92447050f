// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A stream item that is either a value or a terminal error.

use crate::error::DispatchError;

/// An item flowing through a publisher stream: either a successfully fetched
/// value, or an error that terminates the stream it travels on.
///
/// Mirrors the Rx convention that a stream carries zero or more values
/// followed by at most one terminal error.
#[derive(Debug)]
pub enum StreamItem<T> {
    /// A value that cleared the partition gate.
    Value(T),
    /// A terminal error (e.g. a `fetch` failure with `continueOnError = false`).
    Error(DispatchError),
}

impl<T> StreamItem<T> {
    /// Returns `true` if this is a [`StreamItem::Value`].
    pub const fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Converts into `Option<T>`, discarding an error variant.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Error(_) => None,
        }
    }

    /// Maps the value variant, leaving an error untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StreamItem<U> {
        match self {
            Self::Value(v) => StreamItem::Value(f(v)),
            Self::Error(e) => StreamItem::Error(e),
        }
    }
}

impl<T> From<Result<T, DispatchError>> for StreamItem<T> {
    fn from(result: Result<T, DispatchError>) -> Self {
        match result {
            Ok(v) => Self::Value(v),
            Err(e) => Self::Error(e),
        }
    }
}
