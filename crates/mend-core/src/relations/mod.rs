//! The three relationship state machines layered on merged views.
//!
//! Each service owns one [`crate::store::MergedStream`] as its source of
//! truth, guards transitions against the latest merged snapshot, and issues
//! idempotent write intents back through the store.

pub mod application;
pub mod connection;
pub mod invitation;

pub use application::Applications;
pub use connection::Connections;
pub use invitation::Invitations;
