pub mod backend;
pub mod error;
pub mod lifecycle;
pub mod local;
pub mod service;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use backend::{Backend, StartupResponse};
pub use error::FinderError;
pub use lifecycle::{
    LifecycleEvent, LifecycleMachine, LifecycleOrchestrator, LifecycleState, INDEXING_FAILED_MESSAGE,
};
pub use local::LocalBackend;
pub use service::FinderService;
pub use sync::{adopt_snapshot, snapshot_of, PushReceipt, SyncBridge};
