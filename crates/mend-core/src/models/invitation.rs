use crate::identity::{composite_id, normalize};
use crate::models::record::RawRecord;
use crate::store::merge::MergedEntity;
use crate::timefmt::now_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "PENDING",
            InvitationStatus::Accepted => "ACCEPTED",
            InvitationStatus::Declined => "DECLINED",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(InvitationStatus::Pending),
            "ACCEPTED" => Some(InvitationStatus::Accepted),
            "DECLINED" => Some(InvitationStatus::Declined),
            _ => None,
        }
    }
}

/// A landlord's invitation for a contractor to take a ticket. One record per
/// (ticket, contractor, landlord) tuple.
///
/// Invitations go out by email, so the contractor may not have an account
/// yet: `contractor_id` stays `None` until one exists. Observers cover both
/// cases with overlapping id- and email-keyed queries.
#[derive(Debug, Clone, PartialEq)]
pub struct Invitation {
    pub id: String,
    pub ticket_id: String,
    pub contractor_id: Option<String>,
    pub contractor_email: String,
    pub landlord_email: String,
    pub invited_at: String,
    pub status: InvitationStatus,
}

impl Invitation {
    pub fn send(
        ticket_id: &str,
        contractor_email: &str,
        landlord_email: &str,
        contractor_id: Option<&str>,
    ) -> Self {
        let contractor_email = normalize(contractor_email);
        let landlord_email = normalize(landlord_email);
        Self {
            id: composite_id(&[ticket_id, &contractor_email, &landlord_email]),
            ticket_id: ticket_id.to_string(),
            contractor_id: contractor_id.map(normalize),
            contractor_email,
            landlord_email,
            invited_at: now_timestamp(),
            status: InvitationStatus::Pending,
        }
    }

    pub fn from_record(record: &RawRecord) -> Option<Self> {
        Some(Self {
            id: record.id.clone(),
            ticket_id: record.str_field("ticketId")?.to_string(),
            contractor_id: record.str_field("contractorId").map(normalize),
            contractor_email: normalize(record.str_field("contractorEmail")?),
            landlord_email: normalize(record.str_field("landlordEmail")?),
            invited_at: record.str_field("invitedAt")?.to_string(),
            status: InvitationStatus::parse(record.str_field("status")?)?,
        })
    }

    pub fn to_record(&self) -> RawRecord {
        let mut record = RawRecord::new(&self.id)
            .with_field("ticketId", self.ticket_id.as_str())
            .with_field("contractorEmail", self.contractor_email.as_str())
            .with_field("landlordEmail", self.landlord_email.as_str())
            .with_field("invitedAt", self.invited_at.as_str())
            .with_field("status", self.status.as_str());
        if let Some(contractor_id) = &self.contractor_id {
            record.set("contractorId", contractor_id.as_str());
        }
        record
    }
}

impl MergedEntity for Invitation {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn order_key(&self) -> &str {
        &self.invited_at
    }
}
