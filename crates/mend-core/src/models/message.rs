use std::collections::BTreeSet;

use crate::constants::TIMESTAMP_FIELD;
use crate::identity::normalize;
use crate::models::record::RawRecord;
use crate::store::merge::MergedEntity;

/// A chat message between two participants.
///
/// Two flavors share this shape: direct tenant <-> landlord messages, and
/// ticket-scoped contractor <-> landlord messages (the latter carry
/// `ticket_id` as a partition key). A message is immutable once created
/// except for `read_by`, which only grows.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub sender_name: String,
    pub text: String,
    /// ISO-8601 UTC string; lexicographic order equals chronological order.
    pub sent_at: String,
    /// Participants who have acknowledged this message.
    pub read_by: BTreeSet<String>,
    /// Set on ticket-scoped messages, `None` on direct messages.
    pub ticket_id: Option<String>,
}

impl Message {
    /// Decode a message document, tolerating the pre-migration schema:
    /// `message` is read when `text` is absent, and a missing `receiverId`
    /// is derived from the legacy landlord/tenant fields. Records matching
    /// neither shape decode to `None` and are skipped.
    pub fn from_record(record: &RawRecord) -> Option<Self> {
        let sender_id = normalize(record.str_field("senderId")?);
        let text = record
            .str_field("text")
            .or_else(|| record.str_field("message"))?
            .to_string();
        let sent_at = record.str_field(TIMESTAMP_FIELD)?.to_string();

        let receiver_id = match record.str_field("receiverId") {
            Some(receiver) => normalize(receiver),
            None => Self::derive_receiver(record, &sender_id)?,
        };

        let sender_name = record
            .str_field("senderName")
            .map(str::to_string)
            .unwrap_or_else(|| sender_id.clone());

        let read_by = record
            .str_list_field("readBy")
            .unwrap_or_default()
            .iter()
            .map(|reader| normalize(reader))
            .collect();

        Some(Self {
            id: record.id.clone(),
            sender_id,
            receiver_id,
            sender_name,
            text,
            sent_at,
            read_by,
            ticket_id: record.str_field("ticketId").map(str::to_string),
        })
    }

    /// Legacy records carry `landlordId`/`tenantId` instead of `receiverId`.
    /// The sender must match one of the two; the receiver is the other. This
    /// derivation is the only thing keeping pre-migration records
    /// addressable by the receiver-based queries.
    fn derive_receiver(record: &RawRecord, sender_id: &str) -> Option<String> {
        let landlord = normalize(record.str_field("landlordId")?);
        let tenant = normalize(record.str_field("tenantId")?);
        if sender_id == landlord {
            Some(tenant)
        } else if sender_id == tenant {
            Some(landlord)
        } else {
            None
        }
    }

    pub fn is_read_by(&self, participant: &str) -> bool {
        self.read_by.contains(&normalize(participant))
    }
}

impl MergedEntity for Message {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn order_key(&self) -> &str {
        &self.sent_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_record(id: &str) -> RawRecord {
        RawRecord::new(id)
            .with_field("senderId", "alice@mail.com")
            .with_field("receiverId", "bob@mail.com")
            .with_field("senderName", "Alice")
            .with_field("text", "hello")
            .with_field("timestamp", "2024-03-01T09:00:00.000Z")
    }

    #[test]
    fn test_decodes_current_schema() {
        let message = Message::from_record(&make_test_record("m1")).unwrap();
        assert_eq!(message.id, "m1");
        assert_eq!(message.sender_id, "alice@mail.com");
        assert_eq!(message.receiver_id, "bob@mail.com");
        assert_eq!(message.text, "hello");
        assert!(message.read_by.is_empty());
        assert!(message.ticket_id.is_none());
    }

    #[test]
    fn test_normalizes_participant_ids() {
        let record = make_test_record("m1")
            .with_field("senderId", " Alice@Mail.com ")
            .with_field("receiverId", "BOB@mail.com");
        let message = Message::from_record(&record).unwrap();
        assert_eq!(message.sender_id, "alice@mail.com");
        assert_eq!(message.receiver_id, "bob@mail.com");
    }

    #[test]
    fn test_legacy_receiver_derived_from_landlord_side() {
        let record = RawRecord::new("m1")
            .with_field("senderId", "landlord@x.com")
            .with_field("landlordId", "landlord@x.com")
            .with_field("tenantId", "tenant@y.com")
            .with_field("message", "old shape")
            .with_field("timestamp", "2023-01-01T00:00:00.000Z");
        let message = Message::from_record(&record).unwrap();
        assert_eq!(message.receiver_id, "tenant@y.com");
        assert_eq!(message.text, "old shape");
    }

    #[test]
    fn test_legacy_receiver_derived_from_tenant_side() {
        let record = RawRecord::new("m1")
            .with_field("senderId", "tenant@y.com")
            .with_field("landlordId", "Landlord@X.com")
            .with_field("tenantId", "tenant@y.com")
            .with_field("message", "old shape")
            .with_field("timestamp", "2023-01-01T00:00:00.000Z");
        let message = Message::from_record(&record).unwrap();
        assert_eq!(message.receiver_id, "landlord@x.com");
    }

    #[test]
    fn test_legacy_sender_matching_neither_party_is_skipped() {
        let record = RawRecord::new("m1")
            .with_field("senderId", "stranger@z.com")
            .with_field("landlordId", "landlord@x.com")
            .with_field("tenantId", "tenant@y.com")
            .with_field("message", "orphan")
            .with_field("timestamp", "2023-01-01T00:00:00.000Z");
        assert!(Message::from_record(&record).is_none());
    }

    #[test]
    fn test_missing_required_fields_are_skipped() {
        let no_sender = RawRecord::new("m1")
            .with_field("text", "hi")
            .with_field("timestamp", "2024-01-01T00:00:00.000Z");
        assert!(Message::from_record(&no_sender).is_none());

        let mut no_text = make_test_record("m2");
        no_text.fields.remove("text");
        assert!(Message::from_record(&no_text).is_none());

        let mut no_timestamp = make_test_record("m3");
        no_timestamp.fields.remove("timestamp");
        assert!(Message::from_record(&no_timestamp).is_none());
    }

    #[test]
    fn test_read_by_defaults_empty_and_is_normalized() {
        let record = make_test_record("m1").with_field("readBy", serde_json::json!([" Alice@Mail.com", "bob@mail.com"]));
        let message = Message::from_record(&record).unwrap();
        assert!(message.is_read_by("ALICE@mail.com"));
        assert!(message.is_read_by("bob@mail.com"));
        assert!(!message.is_read_by("carol@mail.com"));
    }

    #[test]
    fn test_sender_name_falls_back_to_sender_id() {
        let mut record = make_test_record("m1");
        record.fields.remove("senderName");
        let message = Message::from_record(&record).unwrap();
        assert_eq!(message.sender_name, "alice@mail.com");
    }

    #[test]
    fn test_ticket_scoped_message_keeps_partition_key() {
        let record = make_test_record("m1").with_field("ticketId", "ticket-7");
        let message = Message::from_record(&record).unwrap();
        assert_eq!(message.ticket_id.as_deref(), Some("ticket-7"));
    }
}
