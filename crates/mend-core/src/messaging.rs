//! Conversation observation and the thin message write API.
//!
//! A conversation is never one query. Direct threads need both directions
//! plus the pre-migration shape; ticket threads need both directions within
//! the ticket partition. Each `observe_*` call assembles the right handle
//! set and hands it to the merge engine; writes go through here so legacy
//! field names keep being populated during the migration window.

use std::collections::BTreeSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::CoreConfig;
use crate::constants::TIMESTAMP_FIELD;
use crate::error::StoreError;
use crate::identity::normalize;
use crate::models::message::Message;
use crate::models::record::RawRecord;
use crate::store::merge::MergedStream;
use crate::store::remote::{Query, RemoteStore, WriteOp};
use crate::timefmt::now_timestamp;

pub struct Conversations {
    store: Arc<dyn RemoteStore>,
    config: CoreConfig,
}

impl Conversations {
    pub fn new(store: Arc<dyn RemoteStore>, config: CoreConfig) -> Self {
        Self { store, config }
    }

    /// Observe the direct thread between a landlord and a tenant.
    ///
    /// Three overlapping queries realize the one logical stream: each send
    /// direction on the current schema, plus the pair-keyed legacy shape
    /// (which covers both directions, since legacy records are keyed by the
    /// relationship rather than the receiver).
    pub fn observe_thread(&self, landlord_id: &str, tenant_id: &str) -> MergedStream<Message> {
        let landlord = normalize(landlord_id);
        let tenant = normalize(tenant_id);
        let collection = self.config.messages_collection.as_str();
        let queries = vec![
            Query::collection(collection)
                .filter("senderId", &landlord)
                .filter("receiverId", &tenant)
                .order_by(TIMESTAMP_FIELD),
            Query::collection(collection)
                .filter("senderId", &tenant)
                .filter("receiverId", &landlord)
                .order_by(TIMESTAMP_FIELD),
            Query::collection(collection)
                .filter("landlordId", &landlord)
                .filter("tenantId", &tenant)
                .order_by(TIMESTAMP_FIELD),
        ];
        MergedStream::open(self.store.clone(), queries, Message::from_record)
    }

    /// Observe the contractor <-> landlord thread scoped to one ticket.
    pub fn observe_ticket(
        &self,
        ticket_id: &str,
        contractor_id: &str,
        landlord_id: &str,
    ) -> MergedStream<Message> {
        let contractor = normalize(contractor_id);
        let landlord = normalize(landlord_id);
        let collection = self.config.ticket_messages_collection.as_str();
        let queries = vec![
            Query::collection(collection)
                .filter("ticketId", ticket_id)
                .filter("senderId", &contractor)
                .filter("receiverId", &landlord)
                .order_by(TIMESTAMP_FIELD),
            Query::collection(collection)
                .filter("ticketId", ticket_id)
                .filter("senderId", &landlord)
                .filter("receiverId", &contractor)
                .order_by(TIMESTAMP_FIELD),
        ];
        MergedStream::open(self.store.clone(), queries, Message::from_record)
    }

    /// Send a direct message. The sender must be one side of the pair; the
    /// receiver is the other.
    pub async fn send_thread_message(
        &self,
        landlord_id: &str,
        tenant_id: &str,
        sender_id: &str,
        sender_name: &str,
        text: &str,
    ) -> Result<Message, StoreError> {
        let landlord = normalize(landlord_id);
        let tenant = normalize(tenant_id);
        let sender = normalize(sender_id);
        let receiver = if sender == landlord {
            tenant.clone()
        } else if sender == tenant {
            landlord.clone()
        } else {
            return Err(StoreError::WriteRejected {
                collection: self.config.messages_collection.clone(),
                id: String::new(),
                reason: format!("sender {sender} is not a participant of this thread"),
            });
        };

        let message = self.build_message(sender, receiver, sender_name, text, None);
        let mut record = self.message_record(&message);
        if self.config.write_legacy_fields {
            // Old clients still query by the relationship pair and read the
            // legacy text field.
            record.set("landlordId", landlord.as_str());
            record.set("tenantId", tenant.as_str());
            record.set("message", text);
        }

        self.store
            .write(WriteOp::Set {
                collection: self.config.messages_collection.clone(),
                record,
            })
            .await?;
        Ok(message)
    }

    /// Send a message on a ticket thread.
    pub async fn send_ticket_message(
        &self,
        ticket_id: &str,
        sender_id: &str,
        receiver_id: &str,
        sender_name: &str,
        text: &str,
    ) -> Result<Message, StoreError> {
        let message = self.build_message(
            normalize(sender_id),
            normalize(receiver_id),
            sender_name,
            text,
            Some(ticket_id.to_string()),
        );
        let mut record = self.message_record(&message);
        record.set("ticketId", ticket_id);

        self.store
            .write(WriteOp::Set {
                collection: self.config.ticket_messages_collection.clone(),
                record,
            })
            .await?;
        Ok(message)
    }

    fn build_message(
        &self,
        sender_id: String,
        receiver_id: String,
        sender_name: &str,
        text: &str,
        ticket_id: Option<String>,
    ) -> Message {
        let read_by: BTreeSet<String> = [sender_id.clone()].into();
        Message {
            id: Uuid::new_v4().to_string(),
            sender_id,
            receiver_id,
            sender_name: sender_name.to_string(),
            text: text.to_string(),
            sent_at: now_timestamp(),
            read_by,
            ticket_id,
        }
    }

    fn message_record(&self, message: &Message) -> RawRecord {
        let read_by: Vec<&str> = message.read_by.iter().map(String::as_str).collect();
        RawRecord::new(&message.id)
            .with_field("senderId", message.sender_id.as_str())
            .with_field("receiverId", message.receiver_id.as_str())
            .with_field("senderName", message.sender_name.as_str())
            .with_field("text", message.text.as_str())
            .with_field(TIMESTAMP_FIELD, message.sent_at.as_str())
            .with_field("readBy", serde_json::json!(read_by))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    const LANDLORD: &str = "lana@props.com";
    const TENANT: &str = "tom@rent.com";

    fn make_conversations(store: &Arc<MemoryStore>) -> Conversations {
        Conversations::new(store.clone(), CoreConfig::default())
    }

    #[tokio::test]
    async fn test_sent_message_appears_once_despite_overlapping_queries() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let conversations = make_conversations(&store);
        let thread = conversations.observe_thread(LANDLORD, TENANT);

        // With legacy writes on, the record matches both the direction
        // query and the legacy pair query.
        conversations
            .send_thread_message(LANDLORD, TENANT, TENANT, "Tom", "tap is leaking")
            .await?;

        let merged = thread.current();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].sender_id, TENANT);
        assert_eq!(merged[0].receiver_id, LANDLORD);
        Ok(())
    }

    #[tokio::test]
    async fn test_both_directions_merge_in_time_order() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let conversations = make_conversations(&store);
        let thread = conversations.observe_thread(LANDLORD, TENANT);

        conversations
            .send_thread_message(LANDLORD, TENANT, TENANT, "Tom", "tap is leaking")
            .await?;
        conversations
            .send_thread_message(LANDLORD, TENANT, LANDLORD, "Lana", "plumber on the way")
            .await?;

        let merged = thread.current();
        assert_eq!(merged.len(), 2);
        let texts: Vec<&str> = merged.iter().map(|m| m.text.as_str()).collect();
        assert!(texts.contains(&"tap is leaking"));
        assert!(texts.contains(&"plumber on the way"));
        // Output order is total: by timestamp, ties broken by id.
        assert!(merged[0].sent_at <= merged[1].sent_at);
        Ok(())
    }

    #[tokio::test]
    async fn test_legacy_only_record_is_observed_and_addressed() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let conversations = make_conversations(&store);

        // A pre-migration record: no receiverId, no text field.
        store.seed(
            &CoreConfig::default().messages_collection,
            RawRecord::new("old-1")
                .with_field("senderId", TENANT)
                .with_field("landlordId", LANDLORD)
                .with_field("tenantId", TENANT)
                .with_field("message", "from before the migration")
                .with_field(TIMESTAMP_FIELD, "2023-06-01T00:00:00.000Z"),
        );

        let thread = conversations.observe_thread(LANDLORD, TENANT);
        let merged = thread.current();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].receiver_id, LANDLORD);
        assert_eq!(merged[0].text, "from before the migration");
        Ok(())
    }

    #[tokio::test]
    async fn test_legacy_fields_written_during_migration_window() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let conversations = make_conversations(&store);

        let message = conversations
            .send_thread_message(LANDLORD, TENANT, TENANT, "Tom", "hello")
            .await?;
        let record = store
            .record(&CoreConfig::default().messages_collection, &message.id)
            .unwrap();
        assert_eq!(record.str_field("landlordId"), Some(LANDLORD));
        assert_eq!(record.str_field("tenantId"), Some(TENANT));
        assert_eq!(record.str_field("message"), Some("hello"));
        Ok(())
    }

    #[tokio::test]
    async fn test_legacy_fields_omitted_after_migration_window() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let config = CoreConfig {
            write_legacy_fields: false,
            ..CoreConfig::default()
        };
        let conversations = Conversations::new(store.clone(), config);

        let message = conversations
            .send_thread_message(LANDLORD, TENANT, TENANT, "Tom", "hello")
            .await?;
        let record = store
            .record(&CoreConfig::default().messages_collection, &message.id)
            .unwrap();
        assert_eq!(record.str_field("landlordId"), None);
        assert_eq!(record.str_field("message"), None);
        assert_eq!(record.str_field("text"), Some("hello"));
        Ok(())
    }

    #[tokio::test]
    async fn test_sender_outside_the_pair_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let conversations = make_conversations(&store);

        let result = conversations
            .send_thread_message(LANDLORD, TENANT, "stranger@z.com", "X", "hi")
            .await;
        assert!(matches!(result, Err(StoreError::WriteRejected { .. })));
    }

    #[tokio::test]
    async fn test_ticket_threads_are_partitioned() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let conversations = make_conversations(&store);
        let contractor = "carl@fix.com";

        let ticket_one = conversations.observe_ticket("ticket-1", contractor, LANDLORD);
        let ticket_two = conversations.observe_ticket("ticket-2", contractor, LANDLORD);

        conversations
            .send_ticket_message("ticket-1", contractor, LANDLORD, "Carl", "on site")
            .await?;
        conversations
            .send_ticket_message("ticket-2", LANDLORD, contractor, "Lana", "quote?")
            .await?;

        assert_eq!(ticket_one.current().len(), 1);
        assert_eq!(ticket_one.current()[0].ticket_id.as_deref(), Some("ticket-1"));
        assert_eq!(ticket_two.current().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_sender_starts_in_read_by() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let conversations = make_conversations(&store);
        let thread = conversations.observe_thread(LANDLORD, TENANT);

        conversations
            .send_thread_message(LANDLORD, TENANT, TENANT, "Tom", "hello")
            .await?;
        assert!(thread.current()[0].is_read_by(TENANT));
        assert!(!thread.current()[0].is_read_by(LANDLORD));
        Ok(())
    }
}
