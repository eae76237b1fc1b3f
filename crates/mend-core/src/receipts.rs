//! Read receipts.
//!
//! Per message, the set of participants who have acknowledged it. Receipts
//! are a monotone union: readers are only ever added, so concurrent marks
//! from different readers commute through the store's array-union write.

use std::sync::Arc;

use crate::config::CoreConfig;
use crate::error::StoreError;
use crate::identity::normalize;
use crate::store::remote::{RemoteStore, WriteOp};

/// Per-batch result. A failed id does not abort the rest of the batch.
#[derive(Debug)]
pub struct MarkReadOutcome {
    pub updated: Vec<String>,
    pub failed: Vec<(String, StoreError)>,
}

impl MarkReadOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct ReadReceipts {
    store: Arc<dyn RemoteStore>,
    config: CoreConfig,
}

impl ReadReceipts {
    pub fn new(store: Arc<dyn RemoteStore>, config: CoreConfig) -> Self {
        Self { store, config }
    }

    /// Mark direct messages as read by `reader`.
    pub async fn mark_thread_read(&self, message_ids: &[String], reader: &str) -> MarkReadOutcome {
        let collection = self.config.messages_collection.clone();
        self.mark_in(collection, message_ids, reader).await
    }

    /// Mark ticket-scoped messages as read by `reader`.
    pub async fn mark_ticket_read(&self, message_ids: &[String], reader: &str) -> MarkReadOutcome {
        let collection = self.config.ticket_messages_collection.clone();
        self.mark_in(collection, message_ids, reader).await
    }

    async fn mark_in(
        &self,
        collection: String,
        message_ids: &[String],
        reader: &str,
    ) -> MarkReadOutcome {
        let reader = normalize(reader);
        let writes = message_ids.iter().map(|id| {
            let op = WriteOp::UnionInto {
                collection: collection.clone(),
                id: id.clone(),
                field: "readBy".to_string(),
                values: vec![reader.clone()],
            };
            let id = id.clone();
            async move { (id, self.store.write(op).await) }
        });

        let mut outcome = MarkReadOutcome {
            updated: Vec::new(),
            failed: Vec::new(),
        };
        for (id, result) in futures::future::join_all(writes).await {
            match result {
                Ok(()) => outcome.updated.push(id),
                Err(error) => {
                    tracing::warn!("receipts: mark_read failed for {}: {}", id, error);
                    outcome.failed.push((id, error));
                }
            }
        }
        outcome
    }
}
