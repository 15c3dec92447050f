// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Error types for the partitioned work dispatcher.

/// Boxed source error, used wherever a user callback or blocking fetch can fail
/// with an arbitrary error type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Root error type for dispatcher operations.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The blocking `fetch` function of a [`PollingPublisher`] failed.
    ///
    /// [`PollingPublisher`]: https://docs.rs/partition-stream
    #[error("fetch failed: {0}")]
    Fetch(#[source] BoxError),

    /// A user-supplied observer (`batchObserver`, `itemFilter`, `preObserver`, ...) panicked
    /// or returned an error.
    #[error("observer callback failed: {0}")]
    Observer(#[source] BoxError),

    /// No handler is registered for the item's `typeTag`.
    #[error("no handler registered for type tag `{0}`")]
    UnknownType(String),

    /// Two handlers were registered with the same `typeTag` at construction time.
    #[error("duplicate handler registered for type tag `{0}`")]
    DuplicateTypeTag(String),

    /// A handler invocation returned an error.
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),

    /// The operation was cancelled before it could complete.
    #[error("operation cancelled")]
    Cancelled,

    /// A previously-boxed error, downgraded to its textual description.
    ///
    /// Produced only by [`Clone`] — the boxed source errors above aren't
    /// `Clone`, so cloning describes them instead of duplicating them.
    #[error("{0}")]
    Described(String),
}

impl Clone for DispatchError {
    fn clone(&self) -> Self {
        match self {
            Self::Fetch(e) => Self::Described(format!("fetch failed: {e}")),
            Self::Observer(e) => Self::Described(format!("observer callback failed: {e}")),
            Self::UnknownType(tag) => Self::UnknownType(tag.clone()),
            Self::DuplicateTypeTag(tag) => Self::DuplicateTypeTag(tag.clone()),
            Self::Handler(e) => Self::Described(format!("handler failed: {e}")),
            Self::Cancelled => Self::Cancelled,
            Self::Described(s) => Self::Described(s.clone()),
        }
    }
}

impl DispatchError {
    /// Wraps an arbitrary error as a fetch failure.
    pub fn fetch(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Fetch(Box::new(err))
    }

    /// Wraps an arbitrary error as an observer-callback failure.
    pub fn observer(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Observer(Box::new(err))
    }

    /// Wraps an arbitrary error as a handler failure.
    pub fn handler(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Handler(Box::new(err))
    }

    /// Returns `true` for errors that should never abort an otherwise
    /// healthy pipeline (an unknown type tag is a permanent, per-item
    /// condition — never a reason to tear down the dispatcher).
    #[must_use]
    pub const fn is_item_scoped(&self) -> bool {
        matches!(self, Self::UnknownType(_) | Self::Handler(_))
    }
}

/// Specialized `Result` for dispatcher operations.
pub type Result<T> = std::result::Result<T, DispatchError>;
