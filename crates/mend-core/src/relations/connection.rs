//! Tenant/landlord connection requests.
//!
//! `PENDING -> {CONNECTED, REJECTED}`, both terminal; REJECTED tombstones
//! the record by deletion. Only the non-requesting party may answer. The
//! composite record id makes repeated requests idempotent: the same PENDING
//! record is overwritten, resetting `requested_at` but not identity.

use std::sync::Arc;

use crate::config::CoreConfig;
use crate::error::{StoreError, TransitionError};
use crate::identity::{composite_id, normalize};
use crate::models::connection::{Connection, ConnectionStatus, Role};
use crate::store::merge::{MergedStream, StreamPhase, SubscriberGuard};
use crate::store::remote::{Query, RemoteStore, WriteOp};
use crate::timefmt::now_timestamp;

/// Idempotent write intent produced by [`plan_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionIntent {
    /// Update the record to CONNECTED and stamp `confirmedAt`.
    Confirm,
    /// Delete the record (REJECTED tombstone).
    Remove,
}

/// Pure transition guard: checks the expected prior status against the
/// latest merged snapshot and the acting party against the machine's rules,
/// then emits the write intent. Duplicate event delivery lands in
/// `StaleTransition` instead of applying twice.
pub fn plan_transition(
    current: Option<&Connection>,
    id: &str,
    actor: &str,
    expected: ConnectionStatus,
    new: ConnectionStatus,
) -> Result<ConnectionIntent, TransitionError> {
    let stale = |found: &str| TransitionError::Stale {
        id: id.to_string(),
        expected: expected.as_str().to_string(),
        found: found.to_string(),
    };
    let current = match current {
        Some(connection) => connection,
        None => return Err(stale("absent")),
    };
    if current.status != expected {
        return Err(stale(current.status.as_str()));
    }
    let intent = match (expected, new) {
        (ConnectionStatus::Pending, ConnectionStatus::Connected) => ConnectionIntent::Confirm,
        (ConnectionStatus::Pending, ConnectionStatus::Rejected) => ConnectionIntent::Remove,
        (from, to) => {
            return Err(TransitionError::Unsupported {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    };
    let actor = normalize(actor);
    if actor != current.counterparty() {
        return Err(TransitionError::Forbidden {
            id: id.to_string(),
            actor,
        });
    }
    Ok(intent)
}

/// Connection requests for one participant, observed through a merged
/// stream covering both roles the participant might hold.
pub struct Connections {
    store: Arc<dyn RemoteStore>,
    config: CoreConfig,
    stream: MergedStream<Connection>,
}

impl Connections {
    pub fn open(store: Arc<dyn RemoteStore>, config: CoreConfig, participant_id: &str) -> Self {
        let participant = normalize(participant_id);
        let collection = config.connections_collection.as_str();
        let queries = vec![
            Query::collection(collection)
                .filter("landlordId", &participant)
                .order_by("requestedAt"),
            Query::collection(collection)
                .filter("tenantId", &participant)
                .order_by("requestedAt"),
        ];
        let stream = MergedStream::open(store.clone(), queries, Connection::from_record);
        Self {
            store,
            config,
            stream,
        }
    }

    /// Create (or re-create) the PENDING request for a pair. Idempotent by
    /// composite id: calling twice overwrites one record, never duplicates.
    pub async fn request(
        &self,
        landlord_id: &str,
        tenant_id: &str,
        requested_by: Role,
    ) -> Result<Connection, TransitionError> {
        let connection = Connection::request(landlord_id, tenant_id, requested_by);
        tracing::debug!("connections: requesting {}", connection.id);
        self.store
            .write(WriteOp::Set {
                collection: self.config.connections_collection.clone(),
                record: connection.to_record(),
            })
            .await?;
        Ok(connection)
    }

    /// One-shot lookup of the connection between a pair, independent of any
    /// open stream. The composite id makes this a single-document read.
    pub async fn lookup(
        &self,
        landlord_id: &str,
        tenant_id: &str,
    ) -> Result<Option<Connection>, StoreError> {
        let id = composite_id(&[landlord_id, tenant_id]);
        let record = self
            .store
            .get(&self.config.connections_collection, &id)
            .await?;
        Ok(record.as_ref().and_then(Connection::from_record))
    }

    pub async fn transition(
        &self,
        id: &str,
        actor: &str,
        expected: ConnectionStatus,
        new: ConnectionStatus,
    ) -> Result<(), TransitionError> {
        let merged = self.stream.current();
        let current = merged.iter().find(|c| c.id == id);
        match plan_transition(current, id, actor, expected, new)? {
            ConnectionIntent::Confirm => {
                let mut fields = serde_json::Map::new();
                fields.insert(
                    "status".to_string(),
                    ConnectionStatus::Connected.as_str().into(),
                );
                fields.insert("confirmedAt".to_string(), now_timestamp().into());
                self.store
                    .write(WriteOp::Update {
                        collection: self.config.connections_collection.clone(),
                        id: id.to_string(),
                        fields,
                    })
                    .await?;
            }
            ConnectionIntent::Remove => {
                self.store
                    .write(WriteOp::Delete {
                        collection: self.config.connections_collection.clone(),
                        id: id.to_string(),
                    })
                    .await?;
            }
        }
        Ok(())
    }

    pub fn subscribe(
        &self,
        on_update: impl Fn(&[Connection]) + Send + Sync + 'static,
    ) -> SubscriberGuard<Connection> {
        self.stream.subscribe(on_update)
    }

    pub fn current(&self) -> Vec<Connection> {
        self.stream.current()
    }

    pub fn phase(&self) -> StreamPhase {
        self.stream.phase()
    }
}
