// Copyright 2025 The Partition Dispatcher Authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The work-item data model and the `Partitionable` capability.

/// The literal operation value that routes an item to an account's serial
/// download lane instead of its parallel lane. Compared case-insensitively.
pub const DOWNLOAD_OPERATION: &str = "download";

/// A capability, not an inheritance chain: anything that can report a
/// `client_id`, `account_id`, and `operation` can be partitioned and routed
/// by the dispatcher, regardless of which source produced it.
///
/// Two values of *different* concrete types that report the same three
/// components compare equal as partitions — the composite key is a plain
/// string, not an identity of the producing type.
pub trait Partitionable {
    /// Tenant/owner identifier.
    fn client_id(&self) -> &str;
    /// Sub-owner identifier; the primary grouping key.
    fn account_id(&self) -> &str;
    /// Free-form operation tag.
    fn operation(&self) -> &str;

    /// Deterministic partition key: `client_id:account_id:operation`.
    ///
    /// Components are compared byte-for-byte; only the `download`
    /// discriminator (see [`is_download`](Self::is_download)) is
    /// case-insensitive.
    fn partition_key(&self) -> String {
        format!("{}:{}:{}", self.client_id(), self.account_id(), self.operation())
    }

    /// `true` iff `operation` is `"download"`, compared case-insensitively.
    fn is_download(&self) -> bool {
        self.operation().eq_ignore_ascii_case(DOWNLOAD_OPERATION)
    }
}

/// The unit of processing ingested by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Opaque identifier, unique within its source.
    pub id: String,
    /// Tenant/owner identifier.
    pub client_id: String,
    /// Sub-owner; the primary grouping key.
    pub account_id: String,
    /// Free-form tag; `"download"` (case-insensitive) is distinguished.
    pub operation: String,
    /// Selects a handler in the [`HandlerRegistry`](crate::handler::HandlerRegistry).
    pub type_tag: String,
    /// Opaque payload, handed to the handler verbatim.
    pub payload: Vec<u8>,
    /// Set by the external store after handler success (poll sources only).
    /// The dispatcher never reads or writes this field itself.
    pub processed: bool,
}

impl WorkItem {
    /// Convenience constructor for a not-yet-processed item.
    pub fn new(
        id: impl Into<String>,
        client_id: impl Into<String>,
        account_id: impl Into<String>,
        operation: impl Into<String>,
        type_tag: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            id: id.into(),
            client_id: client_id.into(),
            account_id: account_id.into(),
            operation: operation.into(),
            type_tag: type_tag.into(),
            payload: payload.into(),
            processed: false,
        }
    }
}

impl Partitionable for WorkItem {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn account_id(&self) -> &str {
        &self.account_id
    }

    fn operation(&self) -> &str {
        &self.operation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_key_uses_exact_colon_separator() {
        let item = WorkItem::new("1", "c", "a", "UPDATE", "tag", vec![]);
        assert_eq!(item.partition_key(), "c:a:UPDATE");
    }

    #[test]
    fn download_check_is_case_insensitive() {
        for op in ["download", "Download", "DOWNLOAD", "DoWnLoAd"] {
            let item = WorkItem::new("1", "c", "a", op, "tag", vec![]);
            assert!(item.is_download(), "{op} should be recognized as a download");
        }
        let item = WorkItem::new("1", "c", "a", "update", "tag", vec![]);
        assert!(!item.is_download());
    }

    /// An unrelated type reporting the same three components must produce the
    /// identical partition key string — the composite key is derived from the
    /// capability, not the producing type.
    struct OtherSourceItem {
        tenant: String,
        sub_owner: String,
        op: String,
    }

    impl Partitionable for OtherSourceItem {
        fn client_id(&self) -> &str {
            &self.tenant
        }
        fn account_id(&self) -> &str {
            &self.sub_owner
        }
        fn operation(&self) -> &str {
            &self.op
        }
    }

    #[test]
    fn composite_key_matches_across_heterogeneous_types() {
        let a = WorkItem::new("1", "c", "a", "UPDATE", "tag", vec![]);
        let b = OtherSourceItem {
            tenant: "c".into(),
            sub_owner: "a".into(),
            op: "UPDATE".into(),
        };
        assert_eq!(a.partition_key(), b.partition_key());
        assert_eq!(a.partition_key(), "c:a:UPDATE");
    }
}
