// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Runs a blocking `fetch` function on a worker thread suitable for
//! blocking I/O, so a slow poll never starves the compute pool that runs
//! handler bodies.

use partition_core::error::DispatchError;

/// Runs `fetch` on the Tokio blocking-thread pool and maps a join failure
/// (the closure panicked) into the same [`DispatchError::Fetch`] variant a
/// returned error would produce, so callers only handle one error shape.
pub async fn run_blocking<T, F>(fetch: F) -> Result<T, DispatchError>
where
    F: FnOnce() -> Result<T, DispatchError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(fetch).await {
        Ok(result) => result,
        Err(join_err) => Err(DispatchError::fetch(JoinFailure(join_err.to_string()))),
    }
}

#[derive(Debug, thiserror::Error)]
#[error("fetch task panicked: {0}")]
struct JoinFailure(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[tokio::test]
    async fn propagates_a_successful_result() {
        let result = run_blocking(|| Ok::<_, DispatchError>(vec![1, 2, 3])).await;
        assert_eq!(result.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn propagates_a_fetch_error() {
        let result: Result<Vec<i32>, _> = run_blocking(|| Err(DispatchError::fetch(Boom))).await;
        assert!(matches!(result, Err(DispatchError::Fetch(_))));
    }

    #[tokio::test]
    async fn a_panicking_fetch_becomes_a_fetch_error() {
        let result: Result<Vec<i32>, _> = run_blocking(|| panic!("synchronous boom")).await;
        assert!(matches!(result, Err(DispatchError::Fetch(_))));
    }
}
