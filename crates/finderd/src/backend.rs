use std::collections::BTreeMap;

use async_trait::async_trait;
use finder_config::SetupConfig;
use finder_query::SearchBackend;
use finder_record::{CommandError, WireRecencyEntry};
use finder_watch::Subscription;
use serde::{Deserialize, Serialize};

/// Reply to the combined `startup` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupResponse {
    /// An index is available right now.
    pub valid: bool,
    pub recent_files: Vec<WireRecencyEntry>,
    pub key_folders: BTreeMap<String, String>,
}

/// Commands the native side answers, plus its push-signal stream.
#[async_trait]
pub trait Backend: SearchBackend {
    async fn get_recent_data(&self) -> Result<Vec<WireRecencyEntry>, CommandError>;

    async fn process_recent(&self, data: Vec<WireRecencyEntry>) -> Result<(), CommandError>;

    async fn open_file(&self, path: &str) -> Result<(), CommandError>;

    async fn startup(&self) -> Result<StartupResponse, CommandError>;

    async fn setup_file_check(&self) -> Result<bool, CommandError>;

    async fn load_setup(&self) -> Result<SetupConfig, CommandError>;

    /// Persists the setup and starts indexing.
    async fn save_setup_file(&self, config: &SetupConfig) -> Result<(), CommandError>;

    fn subscribe(&self) -> Subscription;
}
