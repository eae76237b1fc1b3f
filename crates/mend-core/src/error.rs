use thiserror::Error;

/// Errors surfaced by the remote store collaborator.
///
/// Subscription failures arrive through the handle's sink as explicit
/// signals; they are never thrown across the snapshot path where they could
/// skip teardown.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store is unreachable. Observation degrades to "no data" rather
    /// than raising, so callers can render an empty state.
    #[error("remote store unavailable")]
    Unavailable,
    #[error("permission denied on collection {collection}")]
    PermissionDenied { collection: String },
    #[error("no index ready for query on collection {collection}")]
    IndexNotReady { collection: String },
    #[error("write to {collection}/{id} rejected: {reason}")]
    WriteRejected {
        collection: String,
        id: String,
        reason: String,
    },
}

/// Errors surfaced by the relationship state machines.
#[derive(Debug, Error)]
pub enum TransitionError {
    /// The expected prior status no longer matches the latest merged
    /// snapshot. Duplicate or out-of-order event delivery lands here; the
    /// caller treats it as "state changed — refresh", not a hard failure.
    #[error("stale transition on {id}: expected {expected}, found {found}")]
    Stale {
        id: String,
        expected: String,
        /// Status actually observed, or "absent" when the record is gone.
        found: String,
    },
    /// The acting party is not allowed to apply this transition (e.g. the
    /// requester of a connection confirming their own request).
    #[error("transition on {id} not permitted for {actor}")]
    Forbidden { id: String, actor: String },
    /// The (from, to) pair is not a legal edge of the machine.
    #[error("unsupported transition {from} -> {to}")]
    Unsupported { from: String, to: String },
    #[error("write failed: {0}")]
    Write(#[from] StoreError),
}

impl TransitionError {
    pub fn is_stale(&self) -> bool {
        matches!(self, TransitionError::Stale { .. })
    }
}
