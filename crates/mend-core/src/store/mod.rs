pub mod handle;
pub mod memory;
pub mod merge;
pub mod remote;

pub use handle::{DeltaEvent, LiveQueryHandle, SnapshotMaterializer};
pub use memory::MemoryStore;
pub use merge::{MergedEntity, MergedStream, StreamPhase, SubscriberGuard};
pub use remote::{Query, RemoteStore, SnapshotEvent, SnapshotSink, SubscriptionId, WriteOp};
