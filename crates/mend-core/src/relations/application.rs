//! Contractor job applications.
//!
//! `PENDING -> {ACCEPTED, REJECTED}`, one record per (ticket, contractor)
//! pair. Ticket-level exclusivity (at most one ACCEPTED per ticket) is the
//! caller's invariant, deliberately not enforced here.

use std::sync::Arc;

use crate::config::CoreConfig;
use crate::error::TransitionError;
use crate::identity::normalize;
use crate::models::application::{Application, ApplicationStatus};
use crate::store::merge::{MergedStream, StreamPhase, SubscriberGuard};
use crate::store::remote::{Query, RemoteStore, WriteOp};

/// Pure transition guard for the application machine.
pub fn plan_transition(
    current: Option<&Application>,
    id: &str,
    expected: ApplicationStatus,
    new: ApplicationStatus,
) -> Result<(), TransitionError> {
    let stale = |found: &str| TransitionError::Stale {
        id: id.to_string(),
        expected: expected.as_str().to_string(),
        found: found.to_string(),
    };
    let current = match current {
        Some(application) => application,
        None => return Err(stale("absent")),
    };
    if current.status != expected {
        return Err(stale(current.status.as_str()));
    }
    match (expected, new) {
        (ApplicationStatus::Pending, ApplicationStatus::Accepted)
        | (ApplicationStatus::Pending, ApplicationStatus::Rejected) => Ok(()),
        (from, to) => Err(TransitionError::Unsupported {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        }),
    }
}

pub struct Applications {
    store: Arc<dyn RemoteStore>,
    config: CoreConfig,
    stream: MergedStream<Application>,
}

impl Applications {
    /// All applications on one ticket (the landlord's review view).
    pub fn open_for_ticket(store: Arc<dyn RemoteStore>, config: CoreConfig, ticket_id: &str) -> Self {
        let queries = vec![Query::collection(&config.applications_collection)
            .filter("ticketId", ticket_id)
            .order_by("appliedAt")];
        let stream = MergedStream::open(store.clone(), queries, Application::from_record);
        Self {
            store,
            config,
            stream,
        }
    }

    /// All applications by one contractor across tickets.
    pub fn open_for_contractor(
        store: Arc<dyn RemoteStore>,
        config: CoreConfig,
        contractor_id: &str,
    ) -> Self {
        let queries = vec![Query::collection(&config.applications_collection)
            .filter("contractorId", &normalize(contractor_id))
            .order_by("appliedAt")];
        let stream = MergedStream::open(store.clone(), queries, Application::from_record);
        Self {
            store,
            config,
            stream,
        }
    }

    pub async fn apply(
        &self,
        ticket_id: &str,
        contractor_id: &str,
        contractor_name: &str,
        contractor_email: &str,
        rating: Option<f64>,
    ) -> Result<Application, TransitionError> {
        let application =
            Application::submit(ticket_id, contractor_id, contractor_name, contractor_email, rating);
        tracing::debug!("applications: submitting {}", application.id);
        self.store
            .write(WriteOp::Set {
                collection: self.config.applications_collection.clone(),
                record: application.to_record(),
            })
            .await?;
        Ok(application)
    }

    pub async fn transition(
        &self,
        id: &str,
        expected: ApplicationStatus,
        new: ApplicationStatus,
    ) -> Result<(), TransitionError> {
        let merged = self.stream.current();
        let current = merged.iter().find(|a| a.id == id);
        plan_transition(current, id, expected, new)?;

        let mut fields = serde_json::Map::new();
        fields.insert("status".to_string(), new.as_str().into());
        self.store
            .write(WriteOp::Update {
                collection: self.config.applications_collection.clone(),
                id: id.to_string(),
                fields,
            })
            .await?;
        Ok(())
    }

    pub fn subscribe(
        &self,
        on_update: impl Fn(&[Application]) + Send + Sync + 'static,
    ) -> SubscriberGuard<Application> {
        self.stream.subscribe(on_update)
    }

    pub fn current(&self) -> Vec<Application> {
        self.stream.current()
    }

    pub fn phase(&self) -> StreamPhase {
        self.stream.phase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn open_ticket(store: &Arc<MemoryStore>, ticket: &str) -> Applications {
        Applications::open_for_ticket(store.clone(), CoreConfig::default(), ticket)
    }

    #[tokio::test]
    async fn test_one_application_per_ticket_contractor_pair() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let applications = open_ticket(&store, "ticket-1");

        applications
            .apply("ticket-1", "carl@fix.com", "Carl", "carl@fix.com", Some(4.0))
            .await?;
        applications
            .apply("ticket-1", "Carl@Fix.com", "Carl", "carl@fix.com", Some(4.0))
            .await?;

        assert_eq!(applications.current().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_accept_and_duplicate_accept_is_stale() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let applications = open_ticket(&store, "ticket-1");
        let application = applications
            .apply("ticket-1", "carl@fix.com", "Carl", "carl@fix.com", None)
            .await?;

        applications
            .transition(&application.id, ApplicationStatus::Pending, ApplicationStatus::Accepted)
            .await?;
        assert_eq!(applications.current()[0].status, ApplicationStatus::Accepted);

        let duplicate = applications
            .transition(&application.id, ApplicationStatus::Pending, ApplicationStatus::Accepted)
            .await;
        assert!(matches!(duplicate, Err(ref e) if e.is_stale()));
        Ok(())
    }

    #[tokio::test]
    async fn test_engine_does_not_enforce_ticket_exclusivity() -> anyhow::Result<()> {
        // At most one ACCEPTED per ticket is the caller's invariant; the
        // engine will happily accept two. This pins that boundary.
        let store = Arc::new(MemoryStore::new());
        let applications = open_ticket(&store, "ticket-1");

        let first = applications
            .apply("ticket-1", "carl@fix.com", "Carl", "carl@fix.com", None)
            .await?;
        let second = applications
            .apply("ticket-1", "dana@fix.com", "Dana", "dana@fix.com", None)
            .await?;

        applications
            .transition(&first.id, ApplicationStatus::Pending, ApplicationStatus::Accepted)
            .await?;
        applications
            .transition(&second.id, ApplicationStatus::Pending, ApplicationStatus::Accepted)
            .await?;

        let accepted = applications
            .current()
            .iter()
            .filter(|a| a.status == ApplicationStatus::Accepted)
            .count();
        assert_eq!(accepted, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_contractor_view_spans_tickets() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let by_ticket = open_ticket(&store, "ticket-1");
        let by_contractor =
            Applications::open_for_contractor(store.clone(), CoreConfig::default(), "carl@fix.com");

        by_ticket
            .apply("ticket-1", "carl@fix.com", "Carl", "carl@fix.com", None)
            .await?;
        by_ticket
            .apply("ticket-2", "carl@fix.com", "Carl", "carl@fix.com", None)
            .await?;
        by_ticket
            .apply("ticket-1", "dana@fix.com", "Dana", "dana@fix.com", None)
            .await?;

        assert_eq!(by_contractor.current().len(), 2);
        assert_eq!(by_ticket.current().len(), 2);
        Ok(())
    }
}
