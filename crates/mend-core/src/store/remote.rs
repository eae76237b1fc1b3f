//! The remote document store seam.
//!
//! The hosted store is an external collaborator: eventually consistent,
//! last-write-wins at the document level, no cross-collection joins, no
//! compare-and-swap. Everything the core needs from it fits in one
//! object-safe trait so tests can run against [`crate::store::MemoryStore`]
//! and production can wrap the real client.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::models::record::RawRecord;

/// Opaque token identifying one live subscription, returned by
/// [`RemoteStore::subscribe`] and consumed by [`RemoteStore::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// One live query: equality filters over string fields of a collection,
/// optionally ordered by a field.
///
/// Filter values are matched byte-for-byte by the store, so participant
/// identifiers must pass through [`crate::identity::normalize`] before they
/// are used here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<(String, String)>,
    pub order_by: Option<String>,
}

impl Query {
    pub fn collection(name: &str) -> Self {
        Self {
            collection: name.to_string(),
            filters: Vec::new(),
            order_by: None,
        }
    }

    pub fn filter(mut self, field: &str, value: &str) -> Self {
        self.filters.push((field.to_string(), value.to_string()));
        self
    }

    pub fn order_by(mut self, field: &str) -> Self {
        self.order_by = Some(field.to_string());
        self
    }
}

/// What a subscription sink receives.
///
/// `Snapshot` carries the entire current matching set, not a diff; a handle
/// that errors emits `Error` through the same sink instead of silently
/// closing, and keeps emitting snapshots again once it recovers.
#[derive(Debug, Clone)]
pub enum SnapshotEvent {
    Snapshot(Vec<RawRecord>),
    Error(StoreError),
}

/// Subscription callback. May fire from any thread, concurrently with other
/// subscriptions' sinks.
pub type SnapshotSink = Arc<dyn Fn(SnapshotEvent) + Send + Sync>;

/// A document write. `UnionInto` maps to the store's server-side array-union
/// merge: concurrent unions from different writers all land, none overwrite.
#[derive(Debug, Clone)]
pub enum WriteOp {
    Set {
        collection: String,
        record: RawRecord,
    },
    Update {
        collection: String,
        id: String,
        fields: Map<String, Value>,
    },
    UnionInto {
        collection: String,
        id: String,
        field: String,
        values: Vec<String>,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl WriteOp {
    pub fn collection(&self) -> &str {
        match self {
            WriteOp::Set { collection, .. }
            | WriteOp::Update { collection, .. }
            | WriteOp::UnionInto { collection, .. }
            | WriteOp::Delete { collection, .. } => collection,
        }
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Register a live query. The sink receives the current matching set
    /// immediately and again on every change. Registration itself is
    /// synchronous; delivery is not.
    fn subscribe(&self, query: Query, sink: SnapshotSink) -> SubscriptionId;

    /// Stop a subscription. No sink delivery happens for it afterwards.
    fn unsubscribe(&self, subscription: SubscriptionId);

    /// One-shot read of a single document.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<RawRecord>, StoreError>;

    /// Apply a single write. Last-write-wins; the store's own client handles
    /// retries, the core does not.
    async fn write(&self, op: WriteOp) -> Result<(), StoreError>;
}
