//! The stream merge engine.
//!
//! A logical stream ("all messages between A and B") is realized as several
//! overlapping live queries: one per direction, one for the pre-migration
//! schema. The engine owns those handles and reduces their snapshot-replace
//! deliveries into one deduplicated, time-ordered output, republished to
//! every subscriber whenever any input changes.
//!
//! Record ids are deduplicated across handles, but removal is scoped to the
//! delivering handle: a record is owned by whichever handle most recently
//! returned it, and a handle's new snapshot only evicts ids that handle
//! still owns. A global clear-before-insert would flicker-drop records that
//! another handle is mid-update on.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::StoreError;
use crate::models::record::RawRecord;
use crate::store::handle::LiveQueryHandle;
use crate::store::remote::{Query, RemoteStore, SnapshotEvent, SnapshotSink};

/// An entity the engine can merge: identified by a string id, ordered by an
/// ISO-8601 timestamp string.
pub trait MergedEntity: Clone + PartialEq + Send + Sync + 'static {
    fn entity_id(&self) -> &str;
    fn order_key(&self) -> &str;
}

/// Observable lifecycle of a merged stream.
///
/// `PartiallyDegraded` is entered on any handle error and exits on that
/// handle's next successful snapshot. It does not block delivery: the failed
/// handle's last good contribution stays in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Subscribing,
    Live,
    PartiallyDegraded,
    Closed,
}

type Decoder<T> = fn(&RawRecord) -> Option<T>;
type UpdateFn<T> = Arc<dyn Fn(&[T]) + Send + Sync>;

struct Entry<T> {
    value: T,
    owner: usize,
}

struct State<T: MergedEntity> {
    entries: HashMap<String, Entry<T>>,
    ordered: Vec<T>,
    phase: StreamPhase,
    /// Per handle: has it delivered at least once (snapshot or error).
    seen: Vec<bool>,
    /// Per handle: is its most recent delivery an error.
    degraded: Vec<bool>,
    last_error: Option<StoreError>,
    decode_skipped: u64,
    subscribers: Vec<(u64, UpdateFn<T>)>,
    next_subscriber: u64,
    handles: Vec<LiveQueryHandle>,
    closed: bool,
}

struct Inner<T: MergedEntity> {
    state: Mutex<State<T>>,
}

/// One merged, deduplicated, time-ordered view over N live queries.
///
/// All handle lifetimes are owned here: closing the stream (or dropping it)
/// tears every handle down, and no subscriber callback fires after teardown
/// begins. Subscriber callbacks run under the stream's internal lock and
/// must not call back into the stream.
pub struct MergedStream<T: MergedEntity> {
    inner: Arc<Inner<T>>,
}

/// Keeps one subscriber registered; dropping it cancels delivery to that
/// subscriber without affecting the stream or other subscribers.
pub struct SubscriberGuard<T: MergedEntity> {
    inner: Weak<Inner<T>>,
    id: u64,
}

impl<T: MergedEntity> MergedStream<T> {
    /// Open a merged stream over `queries`, decoding every delivered record
    /// with `decode`. Records that fail to decode are skipped and counted.
    pub fn open(store: Arc<dyn RemoteStore>, queries: Vec<Query>, decode: Decoder<T>) -> Self {
        let handle_count = queries.len();
        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                entries: HashMap::new(),
                ordered: Vec::new(),
                phase: StreamPhase::Idle,
                seen: vec![false; handle_count],
                degraded: vec![false; handle_count],
                last_error: None,
                decode_skipped: 0,
                subscribers: Vec::new(),
                next_subscriber: 0,
                handles: Vec::new(),
                closed: false,
            }),
        });

        let mut handles = Vec::with_capacity(handle_count);
        inner.state.lock().phase = StreamPhase::Subscribing;
        for (handle_idx, query) in queries.into_iter().enumerate() {
            let weak = Arc::downgrade(&inner);
            let sink: SnapshotSink = Arc::new(move |event| {
                if let Some(inner) = weak.upgrade() {
                    let mut state = inner.state.lock();
                    if state.closed {
                        return;
                    }
                    state.apply_event(handle_idx, event, decode);
                }
            });
            handles.push(LiveQueryHandle::open(store.clone(), query, sink));
        }
        inner.state.lock().handles = handles;

        Self { inner }
    }

    /// Register a subscriber. It receives the current ordered snapshot
    /// immediately and again after every change.
    pub fn subscribe(&self, on_update: impl Fn(&[T]) + Send + Sync + 'static) -> SubscriberGuard<T> {
        let mut state = self.inner.state.lock();
        let id = state.next_subscriber;
        state.next_subscriber += 1;
        if !state.closed {
            let callback: UpdateFn<T> = Arc::new(on_update);
            callback(&state.ordered);
            state.subscribers.push((id, callback));
        }
        SubscriberGuard {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// One-shot read of the current merged, ordered view.
    pub fn current(&self) -> Vec<T> {
        self.inner.state.lock().ordered.clone()
    }

    pub fn phase(&self) -> StreamPhase {
        self.inner.state.lock().phase
    }

    pub fn last_error(&self) -> Option<StoreError> {
        self.inner.state.lock().last_error.clone()
    }

    /// Records dropped by the decoder since the stream opened.
    pub fn decode_skipped(&self) -> u64 {
        self.inner.state.lock().decode_skipped
    }

    /// Tear down every owned handle and stop all delivery. Any snapshot
    /// arriving after this point is discarded by the closed flag, which is
    /// checked under the same lock the publish path holds.
    pub fn close(&self) {
        let handles = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.phase = StreamPhase::Closed;
            state.subscribers.clear();
            // The merged cache only lives as long as the subscriptions.
            state.entries.clear();
            state.ordered.clear();
            std::mem::take(&mut state.handles)
        };
        // Unsubscribing can take the store's own lock; do it outside ours.
        drop(handles);
    }
}

impl<T: MergedEntity> Drop for MergedStream<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: MergedEntity> Drop for SubscriberGuard<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut state = inner.state.lock();
            let id = self.id;
            state.subscribers.retain(|(subscriber, _)| *subscriber != id);
        }
    }
}

impl<T: MergedEntity> State<T> {
    fn apply_event(&mut self, handle_idx: usize, event: SnapshotEvent, decode: Decoder<T>) {
        self.seen[handle_idx] = true;
        match event {
            SnapshotEvent::Error(error) => {
                tracing::warn!("merge: handle {} degraded: {}", handle_idx, error);
                self.degraded[handle_idx] = true;
                self.last_error = Some(error);
                // The handle's last good contribution stays merged:
                // optimistic staleness over spurious emptiness.
                self.recompute_phase();
            }
            SnapshotEvent::Snapshot(records) => {
                self.degraded[handle_idx] = false;
                let mut fresh: Vec<T> = Vec::with_capacity(records.len());
                for record in &records {
                    match decode(record) {
                        Some(value) => fresh.push(value),
                        None => {
                            self.decode_skipped += 1;
                            tracing::debug!("merge: skipping undecodable record {}", record.id);
                        }
                    }
                }

                // Evict only ids this handle still owns and no longer
                // returns; ids owned by other handles are untouched.
                let fresh_ids: HashSet<&str> = fresh.iter().map(|v| v.entity_id()).collect();
                self.entries
                    .retain(|id, entry| entry.owner != handle_idx || fresh_ids.contains(id.as_str()));

                // Insert the new snapshot; ownership transfers to the most
                // recent deliverer, so the latest payload version wins.
                for value in fresh {
                    self.entries.insert(
                        value.entity_id().to_string(),
                        Entry {
                            value,
                            owner: handle_idx,
                        },
                    );
                }

                self.recompute_phase();
                self.republish();
            }
        }
    }

    fn recompute_phase(&mut self) {
        self.phase = if self.closed {
            StreamPhase::Closed
        } else if self.degraded.iter().any(|d| *d) {
            StreamPhase::PartiallyDegraded
        } else if self.seen.iter().all(|s| *s) {
            StreamPhase::Live
        } else {
            StreamPhase::Subscribing
        };
    }

    fn republish(&mut self) {
        let mut ordered: Vec<T> = self.entries.values().map(|e| e.value.clone()).collect();
        ordered.sort_by(|a, b| {
            a.order_key()
                .cmp(b.order_key())
                .then_with(|| a.entity_id().cmp(b.entity_id()))
        });
        // Redelivering an identical snapshot must not ripple outward.
        if ordered == self.ordered {
            return;
        }
        self.ordered = ordered;
        for (_, subscriber) in &self.subscribers {
            subscriber(&self.ordered);
        }
    }
}
