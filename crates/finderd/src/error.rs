use finder_config::ConfigError;
use finder_record::CommandError;

use crate::lifecycle::LifecycleState;

#[derive(Debug, thiserror::Error)]
pub enum FinderError {
    #[error("recent files sync failed: {0}")]
    Sync(#[source] CommandError),
    #[error("recent files sync worker stopped")]
    SyncStopped,
    #[error("setup failed: {0}")]
    Setup(#[source] CommandError),
    #[error("invalid setup: {0}")]
    InvalidSetup(#[from] ConfigError),
    #[error("startup failed: {0}")]
    Startup(#[source] CommandError),
    #[error("could not open file: {0}")]
    Open(#[source] CommandError),
    #[error("not ready (state: {0})")]
    NotReady(LifecycleState),
}
