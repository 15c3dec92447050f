// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The handler registry: binds a `typeTag` to a processing strategy.

use crate::error::{DispatchError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// A processing strategy selected by a work item's `typeTag`.
///
/// Implementations own whatever side effects they perform (storage writes,
/// outbound calls, ...); the dispatcher only cares about the outcome.
#[async_trait]
pub trait Handler: Send + Sync {
    /// The `typeTag` this handler advertises. Must be unique across the
    /// handlers passed to [`HandlerRegistry::new`].
    fn type_tag(&self) -> &str;

    /// Processes one item's payload for the given client.
    ///
    /// # Errors
    /// Returns an error if processing fails; the dispatcher propagates it to
    /// `errorObserver(item, error)` unchanged.
    async fn handle(&self, client_id: &str, payload: &[u8]) -> std::result::Result<(), crate::error::BoxError>;
}

/// An immutable, lock-free-to-read mapping from `typeTag` to [`Handler`].
///
/// Built once at startup; duplicate tags are a fatal configuration error at
/// construction time, not a runtime condition.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: Arc<HashMap<String, Arc<dyn Handler>>>,
}

impl HandlerRegistry {
    /// Builds a registry from a set of handlers.
    ///
    /// # Errors
    /// Returns [`DispatchError::DuplicateTypeTag`] if two handlers advertise
    /// the same `typeTag`.
    pub fn new(handlers: Vec<Arc<dyn Handler>>) -> Result<Self> {
        let mut map = HashMap::with_capacity(handlers.len());
        for handler in handlers {
            let tag = handler.type_tag().to_string();
            if map.insert(tag.clone(), handler).is_some() {
                return Err(DispatchError::DuplicateTypeTag(tag));
            }
        }
        Ok(Self {
            handlers: Arc::new(map),
        })
    }

    /// Dispatches `payload` to the handler bound to `type_tag`.
    ///
    /// # Errors
    /// - [`DispatchError::UnknownType`] if no handler is bound to `type_tag`.
    /// - [`DispatchError::Handler`] if the bound handler's `handle` call fails.
    pub async fn dispatch(&self, type_tag: &str, client_id: &str, payload: &[u8]) -> Result<()> {
        let handler = self
            .handlers
            .get(type_tag)
            .ok_or_else(|| DispatchError::UnknownType(type_tag.to_string()))?;
        handler
            .handle(client_id, payload)
            .await
            .map_err(DispatchError::Handler)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// `true` if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoHandler {
        tag: &'static str,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Handler for EchoHandler {
        fn type_tag(&self) -> &str {
            self.tag
        }

        async fn handle(&self, _client_id: &str, _payload: &[u8]) -> std::result::Result<(), crate::error::BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl Handler for FailingHandler {
        fn type_tag(&self) -> &str {
            "fails"
        }

        async fn handle(&self, _client_id: &str, _payload: &[u8]) -> std::result::Result<(), crate::error::BoxError> {
            Err("boom".into())
        }
    }

    #[tokio::test]
    async fn dispatches_to_the_matching_tag() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = HandlerRegistry::new(vec![Arc::new(EchoHandler {
            tag: "echo",
            calls: calls.clone(),
        })])
        .unwrap();

        registry.dispatch("echo", "client", b"payload").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_tag_is_an_error_not_a_panic() {
        let registry = HandlerRegistry::new(vec![]).unwrap();
        let err = registry.dispatch("MISSING", "client", b"").await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownType(tag) if tag == "MISSING"));
    }

    #[tokio::test]
    async fn handler_failure_propagates_unchanged() {
        let registry = HandlerRegistry::new(vec![Arc::new(FailingHandler)]).unwrap();
        let err = registry.dispatch("fails", "client", b"").await.unwrap_err();
        assert!(matches!(err, DispatchError::Handler(_)));
    }

    #[test]
    fn duplicate_tags_at_construction_are_fatal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = HandlerRegistry::new(vec![
            Arc::new(EchoHandler {
                tag: "dup",
                calls: calls.clone(),
            }),
            Arc::new(EchoHandler { tag: "dup", calls }),
        ]);
        assert!(matches!(result, Err(DispatchError::DuplicateTypeTag(tag)) if tag == "dup"));
    }
}
