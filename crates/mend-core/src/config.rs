use crate::constants::collections;

/// Runtime configuration for the coordination core.
///
/// Collection names are configurable so tests and staging environments can
/// run against prefixed collections; defaults match production.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub messages_collection: String,
    pub ticket_messages_collection: String,
    pub connections_collection: String,
    pub applications_collection: String,
    pub invitations_collection: String,
    /// While true, message writes also populate the legacy field names
    /// (`landlordId`/`tenantId`/`message`) so clients still running the old
    /// queries keep seeing new traffic. Turned off once the migration
    /// window closes.
    pub write_legacy_fields: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            messages_collection: collections::MESSAGES.to_string(),
            ticket_messages_collection: collections::TICKET_MESSAGES.to_string(),
            connections_collection: collections::CONNECTIONS.to_string(),
            applications_collection: collections::APPLICATIONS.to_string(),
            invitations_collection: collections::INVITATIONS.to_string(),
            write_legacy_fields: true,
        }
    }
}
