use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use finder_config::SetupConfig;
use finder_query::SearchBackend;
use finder_record::{command, to_wire, CommandError, FileRecord, WireRecencyEntry, WireRecord};
use finder_watch::{SignalHub, Subscription};
use tokio::sync::Notify;

use crate::backend::{Backend, StartupResponse};

#[derive(Default)]
struct Script {
    configured: bool,
    index_ready: bool,
    recent: Vec<WireRecencyEntry>,
    key_folders: BTreeMap<String, String>,
    files: Vec<FileRecord>,
    fail_pushes: bool,
    fail_recent_fetch: bool,
    fail_load_setup: bool,
    fail_startup: bool,
    fail_save_setup: bool,
    fail_open: bool,
    startup_gate: Option<Arc<Notify>>,
    pushes: Vec<Vec<WireRecencyEntry>>,
    opened: Vec<String>,
    saved_setup: Option<SetupConfig>,
}

/// In-memory backend with switchable failures.
#[derive(Default)]
pub(crate) struct MockBackend {
    pub signals: SignalHub,
    script: Mutex<Script>,
}

impl MockBackend {
    pub fn configured(index_ready: bool) -> Self {
        let backend = Self::default();
        {
            let mut script = backend.script.lock().unwrap();
            script.configured = true;
            script.index_ready = index_ready;
        }
        backend
    }

    /// Holds `startup` until the returned notify fires.
    pub fn gate_startup(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.script.lock().unwrap().startup_gate = Some(Arc::clone(&gate));
        gate
    }

    pub fn with_recent(self, recent: Vec<WireRecencyEntry>) -> Self {
        self.script.lock().unwrap().recent = recent;
        self
    }

    pub fn with_key_folders(self, folders: &[(&str, &str)]) -> Self {
        self.script.lock().unwrap().key_folders = folders
            .iter()
            .map(|(label, path)| (label.to_string(), path.to_string()))
            .collect();
        self
    }

    pub fn with_files(self, files: Vec<FileRecord>) -> Self {
        self.script.lock().unwrap().files = files;
        self
    }

    pub fn fail_pushes(&self, fail: bool) {
        self.script.lock().unwrap().fail_pushes = fail;
    }

    pub fn fail_recent_fetch(&self, fail: bool) {
        self.script.lock().unwrap().fail_recent_fetch = fail;
    }

    pub fn fail_load_setup(&self, fail: bool) {
        self.script.lock().unwrap().fail_load_setup = fail;
    }

    pub fn fail_startup(&self, fail: bool) {
        self.script.lock().unwrap().fail_startup = fail;
    }

    pub fn fail_save_setup(&self, fail: bool) {
        self.script.lock().unwrap().fail_save_setup = fail;
    }

    pub fn fail_open(&self, fail: bool) {
        self.script.lock().unwrap().fail_open = fail;
    }

    pub fn pushes(&self) -> Vec<Vec<WireRecencyEntry>> {
        self.script.lock().unwrap().pushes.clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.script.lock().unwrap().opened.clone()
    }

    pub fn saved_setup(&self) -> Option<SetupConfig> {
        self.script.lock().unwrap().saved_setup.clone()
    }
}

#[async_trait]
impl SearchBackend for MockBackend {
    async fn search_files(&self, query: &str) -> Result<Vec<WireRecord>, CommandError> {
        let script = self.script.lock().unwrap();
        Ok(script
            .files
            .iter()
            .filter(|file| !query.is_empty() && file.file_name.starts_with(query))
            .map(to_wire)
            .collect())
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn get_recent_data(&self) -> Result<Vec<WireRecencyEntry>, CommandError> {
        let script = self.script.lock().unwrap();
        if script.fail_recent_fetch {
            return Err(CommandError::new(command::GET_RECENT_DATA, "unavailable"));
        }
        Ok(script.recent.clone())
    }

    async fn process_recent(&self, data: Vec<WireRecencyEntry>) -> Result<(), CommandError> {
        let mut script = self.script.lock().unwrap();
        if script.fail_pushes {
            return Err(CommandError::new(command::PROCESS_RECENT, "rejected"));
        }
        script.recent = data.clone();
        script.pushes.push(data);
        Ok(())
    }

    async fn open_file(&self, path: &str) -> Result<(), CommandError> {
        let mut script = self.script.lock().unwrap();
        if script.fail_open {
            return Err(CommandError::new(command::OPEN_FILE, "no opener"));
        }
        script.opened.push(path.to_string());
        Ok(())
    }

    async fn startup(&self) -> Result<StartupResponse, CommandError> {
        let gate = self.script.lock().unwrap().startup_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let script = self.script.lock().unwrap();
        if script.fail_startup {
            return Err(CommandError::new(command::STARTUP, "no index"));
        }
        Ok(StartupResponse {
            valid: script.index_ready,
            recent_files: script.recent.clone(),
            key_folders: script.key_folders.clone(),
        })
    }

    async fn setup_file_check(&self) -> Result<bool, CommandError> {
        Ok(self.script.lock().unwrap().configured)
    }

    async fn load_setup(&self) -> Result<SetupConfig, CommandError> {
        if self.script.lock().unwrap().fail_load_setup {
            return Err(CommandError::new(command::LOAD_SETUP, "corrupt"));
        }
        Ok(SetupConfig::new("/data", &[]))
    }

    async fn save_setup_file(&self, config: &SetupConfig) -> Result<(), CommandError> {
        let mut script = self.script.lock().unwrap();
        if script.fail_save_setup {
            return Err(CommandError::new(command::SAVE_SETUP_FILE, "read-only"));
        }
        script.configured = true;
        script.saved_setup = Some(config.clone());
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.signals.subscribe()
    }
}
