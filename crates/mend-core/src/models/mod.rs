pub mod application;
pub mod connection;
pub mod invitation;
pub mod message;
pub mod record;

pub use application::{Application, ApplicationStatus};
pub use connection::{Connection, ConnectionStatus, Role};
pub use invitation::{Invitation, InvitationStatus};
pub use message::Message;
pub use record::RawRecord;
