//! Application-wide constants
//!
//! Centralized location for magic strings that are used across
//! multiple modules.

/// Remote-store collection names used by the coordination core.
pub mod collections {
    /// Direct tenant <-> landlord messages
    pub const MESSAGES: &str = "messages";
    /// Ticket-scoped contractor <-> landlord messages
    pub const TICKET_MESSAGES: &str = "ticketMessages";
    /// Tenant/landlord connection requests
    pub const CONNECTIONS: &str = "connections";
    /// Contractor job applications
    pub const APPLICATIONS: &str = "jobApplications";
    /// Landlord job invitations
    pub const INVITATIONS: &str = "jobInvitations";
}

/// Field holding the message timestamp; doubles as the order key for every
/// message query.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Separator for composite relationship ids built from normalized
/// participant identifiers.
pub const COMPOSITE_ID_SEPARATOR: char = '_';
