// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Merges multiple source streams into one, preserving each source's
//! internal order; cross-source interleaving is unspecified.

use futures::stream::{BoxStream, Stream};
use partition_core::StreamItem;

/// Interleaves `sources` into a single stream.
///
/// Built on `futures::stream::select_all`, which polls every source
/// round-robin and yields whichever is ready; a source that never produces
/// (an idle poller between ticks) never blocks the others.
pub fn merge<T: 'static + Send>(
    sources: Vec<BoxStream<'static, StreamItem<T>>>,
) -> impl Stream<Item = StreamItem<T>> {
    futures::stream::select_all(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{stream, StreamExt};

    #[tokio::test]
    async fn preserves_each_sources_internal_order() {
        let a = stream::iter(vec![StreamItem::Value(1), StreamItem::Value(2)]).boxed();
        let b = stream::iter(vec![StreamItem::Value(10), StreamItem::Value(20)]).boxed();

        let merged: Vec<_> = merge(vec![a, b]).collect().await;
        let mut from_a = Vec::new();
        let mut from_b = Vec::new();
        for item in merged {
            match item.ok().unwrap() {
                v @ 1..=9 => from_a.push(v),
                v => from_b.push(v),
            }
        }
        assert_eq!(from_a, vec![1, 2]);
        assert_eq!(from_b, vec![10, 20]);
    }

    #[tokio::test]
    async fn empty_source_list_yields_an_immediately_finished_stream() {
        let merged: Vec<StreamItem<i32>> = merge(vec![]).collect().await;
        assert!(merged.is_empty());
    }
}
