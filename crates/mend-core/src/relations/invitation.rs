//! Landlord job invitations.
//!
//! `PENDING -> {ACCEPTED, DECLINED}`, one record per (ticket, contractor,
//! landlord) tuple. Contractors are invited by email and may not have an
//! account yet, so the contractor view merges an id-keyed and an
//! email-keyed query over the same collection.

use std::sync::Arc;

use crate::config::CoreConfig;
use crate::error::TransitionError;
use crate::identity::normalize;
use crate::models::invitation::{Invitation, InvitationStatus};
use crate::store::merge::{MergedStream, StreamPhase, SubscriberGuard};
use crate::store::remote::{Query, RemoteStore, WriteOp};

/// Pure transition guard for the invitation machine.
pub fn plan_transition(
    current: Option<&Invitation>,
    id: &str,
    expected: InvitationStatus,
    new: InvitationStatus,
) -> Result<(), TransitionError> {
    let stale = |found: &str| TransitionError::Stale {
        id: id.to_string(),
        expected: expected.as_str().to_string(),
        found: found.to_string(),
    };
    let current = match current {
        Some(invitation) => invitation,
        None => return Err(stale("absent")),
    };
    if current.status != expected {
        return Err(stale(current.status.as_str()));
    }
    match (expected, new) {
        (InvitationStatus::Pending, InvitationStatus::Accepted)
        | (InvitationStatus::Pending, InvitationStatus::Declined) => Ok(()),
        (from, to) => Err(TransitionError::Unsupported {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        }),
    }
}

pub struct Invitations {
    store: Arc<dyn RemoteStore>,
    config: CoreConfig,
    stream: MergedStream<Invitation>,
}

impl Invitations {
    /// Invitations addressed to one contractor, whether keyed by account id
    /// or only by the email the invite went out to.
    pub fn open_for_contractor(
        store: Arc<dyn RemoteStore>,
        config: CoreConfig,
        contractor_id: &str,
        contractor_email: &str,
    ) -> Self {
        let collection = config.invitations_collection.as_str();
        let queries = vec![
            Query::collection(collection)
                .filter("contractorId", &normalize(contractor_id))
                .order_by("invitedAt"),
            Query::collection(collection)
                .filter("contractorEmail", &normalize(contractor_email))
                .order_by("invitedAt"),
        ];
        let stream = MergedStream::open(store.clone(), queries, Invitation::from_record);
        Self {
            store,
            config,
            stream,
        }
    }

    /// Invitations a landlord has sent.
    pub fn open_for_landlord(
        store: Arc<dyn RemoteStore>,
        config: CoreConfig,
        landlord_email: &str,
    ) -> Self {
        let queries = vec![Query::collection(&config.invitations_collection)
            .filter("landlordEmail", &normalize(landlord_email))
            .order_by("invitedAt")];
        let stream = MergedStream::open(store.clone(), queries, Invitation::from_record);
        Self {
            store,
            config,
            stream,
        }
    }

    pub async fn invite(
        &self,
        ticket_id: &str,
        contractor_email: &str,
        landlord_email: &str,
        contractor_id: Option<&str>,
    ) -> Result<Invitation, TransitionError> {
        let invitation = Invitation::send(ticket_id, contractor_email, landlord_email, contractor_id);
        tracing::debug!("invitations: sending {}", invitation.id);
        self.store
            .write(WriteOp::Set {
                collection: self.config.invitations_collection.clone(),
                record: invitation.to_record(),
            })
            .await?;
        Ok(invitation)
    }

    pub async fn transition(
        &self,
        id: &str,
        expected: InvitationStatus,
        new: InvitationStatus,
    ) -> Result<(), TransitionError> {
        let merged = self.stream.current();
        let current = merged.iter().find(|i| i.id == id);
        plan_transition(current, id, expected, new)?;

        let mut fields = serde_json::Map::new();
        fields.insert("status".to_string(), new.as_str().into());
        self.store
            .write(WriteOp::Update {
                collection: self.config.invitations_collection.clone(),
                id: id.to_string(),
                fields,
            })
            .await?;
        Ok(())
    }

    pub fn subscribe(
        &self,
        on_update: impl Fn(&[Invitation]) + Send + Sync + 'static,
    ) -> SubscriberGuard<Invitation> {
        self.stream.subscribe(on_update)
    }

    pub fn current(&self) -> Vec<Invitation> {
        self.stream.current()
    }

    pub fn phase(&self) -> StreamPhase {
        self.stream.phase()
    }
}
