use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use finder_config::{RecentDedup, SetupConfig, Settings, StaleResponsePolicy};
use finder_query::{SearchHandle, SearchOptions, StaleResponses};
use finder_recent::{DedupKey, RecencyStore};
use finder_record::FileRecord;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backend::Backend;
use crate::error::FinderError;
use crate::lifecycle::{LifecycleOrchestrator, LifecycleState};
use crate::sync::{adopt_snapshot, PushReceipt, SyncBridge};

/// Everything a front end needs: lifecycle, recent files and search, wired to
/// one backend. Must be created inside a tokio runtime.
pub struct FinderService<B: ?Sized> {
    backend: Arc<B>,
    settings: Settings,
    lifecycle: Arc<LifecycleOrchestrator<B>>,
    sync: SyncBridge<B>,
    recent: Mutex<RecencyStore>,
    key_folders: Mutex<BTreeMap<String, String>>,
    search: OnceLock<SearchHandle>,
    signals: JoinHandle<()>,
}

impl<B> FinderService<B>
where
    B: Backend + ?Sized,
{
    pub fn new(backend: Arc<B>, settings: Settings) -> Self {
        let dedup = match settings.recent_dedup {
            RecentDedup::FileName => DedupKey::FileName,
            RecentDedup::FilePath => DedupKey::FilePath,
        };
        let recent = RecencyStore::new(settings.recent_capacity).with_dedup(dedup);
        let lifecycle = Arc::new(LifecycleOrchestrator::new(Arc::clone(&backend)));

        // subscribe before anything can trigger indexing
        let source = backend.subscribe();
        let signals = tokio::spawn({
            let lifecycle = Arc::clone(&lifecycle);
            async move { lifecycle.follow(source).await }
        });

        Self {
            sync: SyncBridge::new(Arc::clone(&backend)),
            backend,
            settings,
            lifecycle,
            recent: Mutex::new(recent),
            key_folders: Mutex::new(BTreeMap::new()),
            search: OnceLock::new(),
            signals,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.lifecycle.subscribe()
    }

    pub fn setup(&self) -> Option<SetupConfig> {
        self.lifecycle.setup()
    }

    /// Runs the boot sequence and adopts the backend's recent files and key
    /// folders when startup answers.
    pub async fn boot(&self) -> Result<LifecycleState, FinderError> {
        if let Some(response) = self.lifecycle.boot().await? {
            let adopted = adopt_snapshot(&mut self.lock_recent(), response.recent_files);
            let folders = response.key_folders.len();
            *self
                .key_folders
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = response.key_folders;
            tracing::info!(adopted, folders, valid = response.valid, "startup complete");
        }
        Ok(self.state())
    }

    pub async fn submit_setup(&self, config: &SetupConfig) -> Result<(), FinderError> {
        self.lifecycle.submit_setup(config).await
    }

    /// Replaces the local recent files with the backend's copy.
    pub async fn refresh_recent(&self) -> Result<usize, FinderError> {
        let entries = self.sync.pull().await?;
        Ok(adopt_snapshot(&mut self.lock_recent(), entries))
    }

    /// Recent files, oldest first.
    pub fn recent_items(&self) -> Vec<FileRecord> {
        self.lock_recent().items().cloned().collect()
    }

    pub fn key_folders(&self) -> BTreeMap<String, String> {
        self.key_folders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Search controller for this service, started on first use.
    pub fn search(&self) -> Result<SearchHandle, FinderError> {
        self.ensure_ready()?;
        let handle = self.search.get_or_init(|| {
            let options = SearchOptions {
                debounce: self.settings.search_debounce(),
                stale_responses: match self.settings.stale_responses {
                    StaleResponsePolicy::Discard => StaleResponses::Discard,
                    StaleResponsePolicy::Overwrite => StaleResponses::Overwrite,
                },
            };
            tracing::debug!(?options, "starting search controller");
            finder_query::spawn(Arc::clone(&self.backend), options)
        });
        Ok(handle.clone())
    }

    /// Opens the file, then records it as recent and pushes the new snapshot.
    /// Nothing is recorded when the open fails.
    pub async fn open_file(&self, record: FileRecord) -> Result<PushReceipt, FinderError> {
        self.ensure_ready()?;
        self.backend
            .open_file(&record.file_path)
            .await
            .map_err(|error| {
                tracing::warn!(%error, path = %record.file_path, "open failed");
                FinderError::Open(error)
            })?;

        let mut recent = self.lock_recent();
        let touch = recent.insert_or_touch(record);
        tracing::debug!(?touch, "recent files updated");
        Ok(self.sync.push(&recent))
    }

    fn ensure_ready(&self) -> Result<(), FinderError> {
        match self.state() {
            LifecycleState::Ready => Ok(()),
            state => Err(FinderError::NotReady(state)),
        }
    }

    fn lock_recent(&self) -> std::sync::MutexGuard<'_, RecencyStore> {
        self.recent.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<B: ?Sized> Drop for FinderService<B> {
    fn drop(&mut self) {
        self.signals.abort();
    }
}
