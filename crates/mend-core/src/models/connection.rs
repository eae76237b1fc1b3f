use crate::identity::{composite_id, normalize};
use crate::models::record::RawRecord;
use crate::store::merge::MergedEntity;
use crate::timefmt::now_timestamp;

/// Which side of a tenant/landlord relationship initiated a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Tenant,
    Landlord,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Tenant => "tenant",
            Role::Landlord => "landlord",
        }
    }

    /// Parse the stored `submittedByRole` value. Records written before the
    /// field existed default to the tenant role; an unrecognized value makes
    /// the record undecodable.
    fn parse(value: Option<&str>) -> Option<Role> {
        match value {
            None => Some(Role::Tenant),
            Some(value) => match normalize(value).as_str() {
                "tenant" => Some(Role::Tenant),
                "landlord" => Some(Role::Landlord),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Pending,
    Connected,
    Rejected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Pending => "PENDING",
            ConnectionStatus::Connected => "CONNECTED",
            ConnectionStatus::Rejected => "REJECTED",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(ConnectionStatus::Pending),
            "CONNECTED" => Some(ConnectionStatus::Connected),
            "REJECTED" => Some(ConnectionStatus::Rejected),
            _ => None,
        }
    }
}

/// A tenant/landlord connection request.
///
/// The id is a deterministic composite of the normalized participant pair,
/// so at most one live record exists per pair: re-requesting overwrites the
/// same record instead of creating a duplicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub id: String,
    pub landlord_id: String,
    pub tenant_id: String,
    pub status: ConnectionStatus,
    pub requested_by: String,
    pub requested_by_role: Role,
    pub requested_at: String,
    pub confirmed_at: Option<String>,
}

impl Connection {
    /// Build a fresh PENDING request. Calling this again for the same pair
    /// yields the same id with a reset `requested_at`.
    pub fn request(landlord_id: &str, tenant_id: &str, requested_by: Role) -> Self {
        let landlord_id = normalize(landlord_id);
        let tenant_id = normalize(tenant_id);
        let requested_by_id = match requested_by {
            Role::Landlord => landlord_id.clone(),
            Role::Tenant => tenant_id.clone(),
        };
        Self {
            id: composite_id(&[&landlord_id, &tenant_id]),
            landlord_id,
            tenant_id,
            status: ConnectionStatus::Pending,
            requested_by: requested_by_id,
            requested_by_role: requested_by,
            requested_at: now_timestamp(),
            confirmed_at: None,
        }
    }

    pub fn from_record(record: &RawRecord) -> Option<Self> {
        let landlord_id = normalize(record.str_field("landlordId")?);
        let tenant_id = normalize(record.str_field("tenantId")?);
        let status = ConnectionStatus::parse(record.str_field("status")?)?;
        let requested_by_role = Role::parse(record.str_field("submittedByRole"))?;
        let requested_at = record.str_field("requestedAt")?.to_string();
        // Pre-schema-change records may lack requestedBy; the role tells us
        // which side it was.
        let requested_by = record
            .str_field("requestedBy")
            .map(normalize)
            .unwrap_or_else(|| match requested_by_role {
                Role::Landlord => landlord_id.clone(),
                Role::Tenant => tenant_id.clone(),
            });

        Some(Self {
            id: record.id.clone(),
            landlord_id,
            tenant_id,
            status,
            requested_by,
            requested_by_role,
            requested_at,
            confirmed_at: record.str_field("confirmedAt").map(str::to_string),
        })
    }

    pub fn to_record(&self) -> RawRecord {
        let mut record = RawRecord::new(&self.id)
            .with_field("landlordId", self.landlord_id.as_str())
            .with_field("tenantId", self.tenant_id.as_str())
            .with_field("status", self.status.as_str())
            .with_field("requestedBy", self.requested_by.as_str())
            .with_field("submittedByRole", self.requested_by_role.as_str())
            .with_field("requestedAt", self.requested_at.as_str());
        if let Some(confirmed_at) = &self.confirmed_at {
            record.set("confirmedAt", confirmed_at.as_str());
        }
        record
    }

    /// The party who must answer the request: whichever side did not send it.
    pub fn counterparty(&self) -> &str {
        match self.requested_by_role {
            Role::Tenant => &self.landlord_id,
            Role::Landlord => &self.tenant_id,
        }
    }
}

impl MergedEntity for Connection {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn order_key(&self) -> &str {
        &self.requested_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builds_composite_id_from_normalized_pair() {
        let a = Connection::request(" Landlord@X.com", "Tenant@Y.com ", Role::Tenant);
        let b = Connection::request("landlord@x.com", "tenant@y.com", Role::Tenant);
        assert_eq!(a.id, "landlord@x.com_tenant@y.com");
        assert_eq!(a.id, b.id);
        assert_eq!(a.status, ConnectionStatus::Pending);
        assert_eq!(a.requested_by, "tenant@y.com");
    }

    #[test]
    fn test_counterparty_is_the_non_requesting_side() {
        let by_tenant = Connection::request("landlord@x.com", "tenant@y.com", Role::Tenant);
        assert_eq!(by_tenant.counterparty(), "landlord@x.com");
        let by_landlord = Connection::request("landlord@x.com", "tenant@y.com", Role::Landlord);
        assert_eq!(by_landlord.counterparty(), "tenant@y.com");
    }

    #[test]
    fn test_absent_role_defaults_to_tenant() {
        let record = Connection::request("l@x.com", "t@y.com", Role::Tenant).to_record();
        let mut record = record;
        record.fields.remove("submittedByRole");
        let decoded = Connection::from_record(&record).unwrap();
        assert_eq!(decoded.requested_by_role, Role::Tenant);
    }

    #[test]
    fn test_unrecognized_role_is_skipped() {
        let mut record = Connection::request("l@x.com", "t@y.com", Role::Tenant).to_record();
        record.set("submittedByRole", "contractor");
        assert!(Connection::from_record(&record).is_none());
    }

    #[test]
    fn test_unrecognized_status_is_skipped() {
        let mut record = Connection::request("l@x.com", "t@y.com", Role::Tenant).to_record();
        record.set("status", "LIMBO");
        assert!(Connection::from_record(&record).is_none());
    }

    #[test]
    fn test_missing_requested_by_is_derived_from_role() {
        let mut record = Connection::request("l@x.com", "t@y.com", Role::Landlord).to_record();
        record.fields.remove("requestedBy");
        let decoded = Connection::from_record(&record).unwrap();
        assert_eq!(decoded.requested_by, "l@x.com");
    }

    #[test]
    fn test_record_round_trip() {
        let connection = Connection::request("l@x.com", "t@y.com", Role::Landlord);
        let decoded = Connection::from_record(&connection.to_record()).unwrap();
        assert_eq!(decoded, connection);
    }
}
