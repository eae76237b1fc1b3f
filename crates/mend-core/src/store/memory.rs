//! In-memory implementation of [`RemoteStore`].
//!
//! The executable statement of the collaborator contract: snapshot-replace
//! delivery on every change, last-write-wins documents, no joins, no CAS.
//! Doubles as the test backend, with fault injection for the unavailable
//! store and per-collection subscription failures (permission denied, index
//! not ready).

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::StoreError;
use crate::models::record::RawRecord;
use crate::store::remote::{Query, RemoteStore, SnapshotEvent, SnapshotSink, SubscriptionId, WriteOp};

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

struct Subscription {
    id: SubscriptionId,
    query: Query,
    sink: SnapshotSink,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<String, RawRecord>>,
    subscriptions: Vec<Subscription>,
    next_subscription: u64,
    unavailable: bool,
    broken: HashMap<String, StoreError>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Insert a record directly and redeliver affected subscriptions.
    /// Test convenience; equivalent to `write(WriteOp::Set { .. })`.
    pub fn seed(&self, collection: &str, record: RawRecord) {
        let deliveries = {
            let mut inner = self.inner.lock();
            inner
                .collections
                .entry(collection.to_string())
                .or_default()
                .insert(record.id.clone(), record);
            inner.deliveries_for(collection)
        };
        dispatch(deliveries);
    }

    /// Remove a record directly and redeliver affected subscriptions.
    /// Test convenience; equivalent to `write(WriteOp::Delete { .. })`.
    pub fn remove(&self, collection: &str, id: &str) {
        let deliveries = {
            let mut inner = self.inner.lock();
            if let Some(records) = inner.collections.get_mut(collection) {
                records.remove(id);
            }
            inner.deliveries_for(collection)
        };
        dispatch(deliveries);
    }

    /// Simulate the store becoming unreachable. While unavailable, writes
    /// and reads fail and every subscription receives an error signal; on
    /// recovery all subscriptions get a fresh snapshot.
    pub fn set_unavailable(&self, unavailable: bool) {
        let deliveries = {
            let mut inner = self.inner.lock();
            inner.unavailable = unavailable;
            if unavailable {
                inner
                    .subscriptions
                    .iter()
                    .map(|s| (s.sink.clone(), SnapshotEvent::Error(StoreError::Unavailable)))
                    .collect()
            } else {
                inner.deliveries_all()
            }
        };
        dispatch(deliveries);
    }

    /// Fail every subscription on one collection with `error` until
    /// [`MemoryStore::heal_collection`] is called.
    pub fn break_collection(&self, collection: &str, error: StoreError) {
        let deliveries = {
            let mut inner = self.inner.lock();
            inner.broken.insert(collection.to_string(), error);
            inner.deliveries_for(collection)
        };
        dispatch(deliveries);
    }

    /// Recover a broken collection; its subscriptions get a fresh snapshot.
    pub fn heal_collection(&self, collection: &str) {
        let deliveries = {
            let mut inner = self.inner.lock();
            inner.broken.remove(collection);
            inner.deliveries_for(collection)
        };
        dispatch(deliveries);
    }

    pub fn active_subscriptions(&self) -> usize {
        self.inner.lock().subscriptions.len()
    }

    /// Direct document read for test assertions.
    pub fn record(&self, collection: &str, id: &str) -> Option<RawRecord> {
        self.inner
            .lock()
            .collections
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned()
    }
}

impl Inner {
    fn snapshot_for(&self, query: &Query) -> Vec<RawRecord> {
        let mut records: Vec<RawRecord> = self
            .collections
            .get(&query.collection)
            .map(|records| {
                records
                    .values()
                    .filter(|record| query_matches(query, record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if let Some(order_field) = &query.order_by {
            records.sort_by(|a, b| {
                let ka = a.str_field(order_field).unwrap_or("");
                let kb = b.str_field(order_field).unwrap_or("");
                ka.cmp(kb).then_with(|| a.id.cmp(&b.id))
            });
        }
        records
    }

    fn event_for(&self, query: &Query) -> SnapshotEvent {
        if self.unavailable {
            return SnapshotEvent::Error(StoreError::Unavailable);
        }
        if let Some(error) = self.broken.get(&query.collection) {
            return SnapshotEvent::Error(error.clone());
        }
        SnapshotEvent::Snapshot(self.snapshot_for(query))
    }

    fn deliveries_for(&self, collection: &str) -> Vec<(SnapshotSink, SnapshotEvent)> {
        self.subscriptions
            .iter()
            .filter(|s| s.query.collection == collection)
            .map(|s| (s.sink.clone(), self.event_for(&s.query)))
            .collect()
    }

    fn deliveries_all(&self) -> Vec<(SnapshotSink, SnapshotEvent)> {
        self.subscriptions
            .iter()
            .map(|s| (s.sink.clone(), self.event_for(&s.query)))
            .collect()
    }

    fn apply(&mut self, op: WriteOp) -> Result<(), StoreError> {
        match op {
            WriteOp::Set { collection, record } => {
                self.collections
                    .entry(collection)
                    .or_default()
                    .insert(record.id.clone(), record);
                Ok(())
            }
            WriteOp::Update { collection, id, fields } => {
                match self.collections.get_mut(&collection).and_then(|c| c.get_mut(&id)) {
                    Some(doc) => {
                        for (field, value) in fields {
                            doc.fields.insert(field, value);
                        }
                        Ok(())
                    }
                    None => Err(StoreError::WriteRejected {
                        collection,
                        id,
                        reason: "no such document".to_string(),
                    }),
                }
            }
            WriteOp::UnionInto { collection, id, field, values } => {
                match self.collections.get_mut(&collection).and_then(|c| c.get_mut(&id)) {
                    Some(doc) => {
                        let entry = doc
                            .fields
                            .entry(field)
                            .or_insert_with(|| Value::Array(Vec::new()));
                        match entry.as_array_mut() {
                            Some(items) => {
                                for value in values {
                                    let present =
                                        items.iter().any(|v| v.as_str() == Some(value.as_str()));
                                    if !present {
                                        items.push(Value::String(value));
                                    }
                                }
                                Ok(())
                            }
                            None => Err(StoreError::WriteRejected {
                                collection,
                                id,
                                reason: "field is not an array".to_string(),
                            }),
                        }
                    }
                    None => Err(StoreError::WriteRejected {
                        collection,
                        id,
                        reason: "no such document".to_string(),
                    }),
                }
            }
            WriteOp::Delete { collection, id } => {
                if let Some(records) = self.collections.get_mut(&collection) {
                    records.remove(&id);
                }
                Ok(())
            }
        }
    }
}

fn query_matches(query: &Query, record: &RawRecord) -> bool {
    query
        .filters
        .iter()
        .all(|(field, value)| record.str_field(field) == Some(value.as_str()))
}

/// Sinks run outside the store lock so a subscriber reacting to a snapshot
/// can issue its own reads and writes.
fn dispatch(deliveries: Vec<(SnapshotSink, SnapshotEvent)>) {
    for (sink, event) in deliveries {
        sink(event);
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn subscribe(&self, query: Query, sink: SnapshotSink) -> SubscriptionId {
        let (id, initial) = {
            let mut inner = self.inner.lock();
            let id = SubscriptionId(inner.next_subscription);
            inner.next_subscription += 1;
            let initial = inner.event_for(&query);
            inner.subscriptions.push(Subscription {
                id,
                query,
                sink: sink.clone(),
            });
            (id, initial)
        };
        sink(initial);
        id
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        self.inner.lock().subscriptions.retain(|s| s.id != subscription);
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<RawRecord>, StoreError> {
        let inner = self.inner.lock();
        if inner.unavailable {
            return Err(StoreError::Unavailable);
        }
        Ok(inner.collections.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn write(&self, op: WriteOp) -> Result<(), StoreError> {
        let deliveries = {
            let mut inner = self.inner.lock();
            if inner.unavailable {
                return Err(StoreError::Unavailable);
            }
            let collection = op.collection().to_string();
            inner.apply(op)?;
            inner.deliveries_for(&collection)
        };
        dispatch(deliveries);
        Ok(())
    }
}
