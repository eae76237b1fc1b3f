use crate::identity::{composite_id, normalize};
use crate::models::record::RawRecord;
use crate::store::merge::MergedEntity;
use crate::timefmt::now_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "PENDING",
            ApplicationStatus::Accepted => "ACCEPTED",
            ApplicationStatus::Rejected => "REJECTED",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(ApplicationStatus::Pending),
            "ACCEPTED" => Some(ApplicationStatus::Accepted),
            "REJECTED" => Some(ApplicationStatus::Rejected),
            _ => None,
        }
    }
}

/// A contractor's application for a maintenance ticket. One record per
/// (ticket, contractor) pair; the composite id enforces that.
#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    pub id: String,
    pub ticket_id: String,
    pub contractor_id: String,
    pub contractor_name: String,
    pub contractor_email: String,
    pub applied_at: String,
    pub status: ApplicationStatus,
    /// Contractor's star rating at application time. A rating of 0 is a
    /// real value, distinct from "no rating yet".
    pub rating: Option<f64>,
}

impl Application {
    pub fn submit(
        ticket_id: &str,
        contractor_id: &str,
        contractor_name: &str,
        contractor_email: &str,
        rating: Option<f64>,
    ) -> Self {
        let contractor_id = normalize(contractor_id);
        Self {
            id: composite_id(&[ticket_id, &contractor_id]),
            ticket_id: ticket_id.to_string(),
            contractor_id,
            contractor_name: contractor_name.to_string(),
            contractor_email: normalize(contractor_email),
            applied_at: now_timestamp(),
            status: ApplicationStatus::Pending,
            rating,
        }
    }

    pub fn from_record(record: &RawRecord) -> Option<Self> {
        Some(Self {
            id: record.id.clone(),
            ticket_id: record.str_field("ticketId")?.to_string(),
            contractor_id: normalize(record.str_field("contractorId")?),
            contractor_name: record.str_field("contractorName")?.to_string(),
            contractor_email: normalize(record.str_field("contractorEmail")?),
            applied_at: record.str_field("appliedAt")?.to_string(),
            status: ApplicationStatus::parse(record.str_field("status")?)?,
            rating: record.num_field("rating"),
        })
    }

    pub fn to_record(&self) -> RawRecord {
        let mut record = RawRecord::new(&self.id)
            .with_field("ticketId", self.ticket_id.as_str())
            .with_field("contractorId", self.contractor_id.as_str())
            .with_field("contractorName", self.contractor_name.as_str())
            .with_field("contractorEmail", self.contractor_email.as_str())
            .with_field("appliedAt", self.applied_at.as_str())
            .with_field("status", self.status.as_str());
        if let Some(rating) = self.rating {
            record.set("rating", rating);
        }
        record
    }
}

impl MergedEntity for Application {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn order_key(&self) -> &str {
        &self.applied_at
    }
}
