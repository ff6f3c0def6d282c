//! Domain model for shared context.

mod branch;
mod entry;
mod event;
mod ids;

pub use branch::ContextBranch;
pub use entry::ContextEntry;
pub use event::{ContextSyncEvent, SyncEventType};
pub use ids::{BranchId, ContextId, InstanceId};
