//! One live subscription against the remote store.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::record::RawRecord;
use crate::store::remote::{Query, RemoteStore, SnapshotSink, SubscriptionId};

/// Owns a single registered subscription and releases it on drop, so a
/// handle can never outlive whoever opened it.
pub struct LiveQueryHandle {
    store: Arc<dyn RemoteStore>,
    subscription: Option<SubscriptionId>,
}

impl LiveQueryHandle {
    pub fn open(store: Arc<dyn RemoteStore>, query: Query, sink: SnapshotSink) -> Self {
        let subscription = store.subscribe(query, sink);
        Self {
            store,
            subscription: Some(subscription),
        }
    }

    pub fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.store.unsubscribe(subscription);
        }
    }
}

impl Drop for LiveQueryHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// A change emitted by a delta-based feed.
#[derive(Debug, Clone)]
pub enum DeltaEvent {
    Upsert(RawRecord),
    Remove(String),
    Reset(Vec<RawRecord>),
}

/// Rebuilds full snapshots from a delta-based change feed.
///
/// The merge engine is designed around snapshot-replace delivery; a backend
/// that only emits diffs gets one materializer per handle, and each applied
/// delta yields the handle's entire current result set.
#[derive(Debug, Default)]
pub struct SnapshotMaterializer {
    current: BTreeMap<String, RawRecord>,
}

impl SnapshotMaterializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one delta and return the materialized snapshot.
    pub fn apply(&mut self, delta: DeltaEvent) -> Vec<RawRecord> {
        match delta {
            DeltaEvent::Upsert(record) => {
                self.current.insert(record.id.clone(), record);
            }
            DeltaEvent::Remove(id) => {
                self.current.remove(&id);
            }
            DeltaEvent::Reset(records) => {
                self.current.clear();
                for record in records {
                    self.current.insert(record.id.clone(), record);
                }
            }
        }
        self.current.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::remote::SnapshotEvent;
    use parking_lot::Mutex;

    #[test]
    fn test_handle_unsubscribes_on_drop() {
        let store = Arc::new(MemoryStore::new());
        let sink: SnapshotSink = Arc::new(|_| {});
        let handle = LiveQueryHandle::open(store.clone(), Query::collection("docs"), sink);
        assert_eq!(store.active_subscriptions(), 1);
        drop(handle);
        assert_eq!(store.active_subscriptions(), 0);
    }

    #[test]
    fn test_handle_delivers_through_sink() {
        let store = Arc::new(MemoryStore::new());
        store.seed("docs", RawRecord::new("a"));

        let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let sink: SnapshotSink = Arc::new(move |event| {
            if let SnapshotEvent::Snapshot(records) = event {
                captured.lock().push(records.len());
            }
        });

        let _handle = LiveQueryHandle::open(store.clone(), Query::collection("docs"), sink);
        store.seed("docs", RawRecord::new("b"));
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn test_materializer_rebuilds_snapshots_from_deltas() {
        let mut materializer = SnapshotMaterializer::new();

        let first = materializer.apply(DeltaEvent::Upsert(RawRecord::new("a")));
        assert_eq!(first.len(), 1);

        let second = materializer.apply(DeltaEvent::Upsert(RawRecord::new("b")));
        assert_eq!(second.len(), 2);

        // Upserting an existing id replaces it, never duplicates.
        let replaced = materializer.apply(DeltaEvent::Upsert(
            RawRecord::new("a").with_field("v", "2"),
        ));
        assert_eq!(replaced.len(), 2);
        assert_eq!(
            replaced.iter().find(|r| r.id == "a").unwrap().str_field("v"),
            Some("2")
        );

        let removed = materializer.apply(DeltaEvent::Remove("a".to_string()));
        assert_eq!(removed.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["b"]);

        let reset = materializer.apply(DeltaEvent::Reset(vec![RawRecord::new("c")]));
        assert_eq!(reset.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["c"]);
    }
}
