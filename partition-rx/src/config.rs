// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Dispatcher configuration: a plain record, matching the configuration
//! surface table (interval/concurrency/continue-on-error), with a small
//! builder for call-site ergonomics.

/// Configuration for one [`Dispatcher`](crate::dispatcher::Dispatcher).
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Global concurrency cap across every account's every lane.
    pub max_concurrency: usize,
    /// If true, a handler error is logged and swallowed; if false, it
    /// propagates and the dispatcher stops.
    pub continue_on_error: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            continue_on_error: true,
        }
    }
}

/// Convenience wrapper over [`DispatcherConfig`].
#[derive(Debug, Default)]
pub struct DispatcherConfigBuilder {
    config: DispatcherConfig,
}

impl DispatcherConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_concurrency(mut self, value: usize) -> Self {
        self.config.max_concurrency = value;
        self
    }

    #[must_use]
    pub fn continue_on_error(mut self, value: bool) -> Self {
        self.config.continue_on_error = value;
        self
    }

    #[must_use]
    pub fn build(self) -> DispatcherConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_configuration_surface_table() {
        let config = DispatcherConfig::default();
        assert_eq!(config.max_concurrency, 10);
        assert!(config.continue_on_error);
    }

    #[test]
    fn builder_overrides_only_what_is_set() {
        let config = DispatcherConfigBuilder::new().max_concurrency(3).build();
        assert_eq!(config.max_concurrency, 3);
        assert!(config.continue_on_error);
    }
}
