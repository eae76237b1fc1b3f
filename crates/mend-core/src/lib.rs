pub mod config;
pub mod constants;
pub mod error;
pub mod identity;
pub mod messaging;
pub mod models;
pub mod receipts;
pub mod relations;
pub mod store;
pub mod timefmt;
pub mod tracing_setup;

pub use config::CoreConfig;
pub use error::{StoreError, TransitionError};
pub use messaging::Conversations;
pub use models::{
    Application, ApplicationStatus, Connection, ConnectionStatus, Invitation, InvitationStatus,
    Message, RawRecord, Role,
};
pub use receipts::{MarkReadOutcome, ReadReceipts};
pub use relations::{Applications, Connections, Invitations};
pub use store::{
    MemoryStore, MergedEntity, MergedStream, Query, RemoteStore, StreamPhase, SubscriberGuard,
    WriteOp,
};
