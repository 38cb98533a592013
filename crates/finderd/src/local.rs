use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use finder_config::{ConfigError, DataPaths, SetupConfig};
use finder_index::{FileIndex, IndexError, IndexSource, WalkdirSource};
use finder_query::SearchBackend;
use finder_record::{command, CommandError, WireRecencyEntry, WireRecord};
use finder_shell::{ShellActions, SystemShell};
use finder_watch::{LifecycleSignal, SignalHub, Subscription};

use crate::backend::{Backend, StartupResponse};

/// Backend answering every command from files under one data directory:
/// `setup.json`, `file_index.json` and `recent_files.json`.
#[derive(Clone)]
pub struct LocalBackend {
    inner: Arc<Inner>,
}

struct Inner {
    paths: DataPaths,
    shell: Box<dyn ShellActions>,
    signals: SignalHub,
    index: RwLock<Option<Arc<FileIndex>>>,
    // only the latest indexing run may store its index
    run: Mutex<u64>,
}

impl LocalBackend {
    pub fn new(paths: DataPaths) -> Self {
        Self::with_shell(paths, Box::new(SystemShell))
    }

    pub fn with_shell(paths: DataPaths, shell: Box<dyn ShellActions>) -> Self {
        Self {
            inner: Arc::new(Inner {
                paths,
                shell,
                signals: SignalHub::new(),
                index: RwLock::new(None),
                run: Mutex::new(0),
            }),
        }
    }

    pub fn paths(&self) -> &DataPaths {
        &self.inner.paths
    }

    /// In-memory index, falling back to the one on disk.
    fn current_index(&self) -> Result<Option<Arc<FileIndex>>, IndexError> {
        if let Some(index) = self.inner.cached_index() {
            return Ok(Some(index));
        }

        let path = self.inner.paths.index_file();
        if !path.exists() {
            return Ok(None);
        }
        let index = Arc::new(FileIndex::load(&path)?);
        tracing::info!(path = %path.display(), files = index.len(), "index loaded");
        *self
            .inner
            .index
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&index));
        Ok(Some(index))
    }

    /// Rebuilds the index in the background. A newer run supersedes this one:
    /// the older build is left to finish but never stored or announced.
    fn start_indexing(&self, setup: SetupConfig) {
        let run = self.inner.next_run();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.signals.emit(LifecycleSignal::IndexingStarted);

            let source = WalkdirSource::new(&setup.root_folder, setup.normalized_extensions());
            let worker = Arc::clone(&inner);
            let built =
                tokio::task::spawn_blocking(move || worker.build_and_store(run, &source)).await;

            match built {
                Ok(Ok(true)) => {
                    inner.signals.emit(LifecycleSignal::IndexingCompleted);
                }
                Ok(Ok(false)) => tracing::debug!(run, "indexing superseded"),
                Ok(Err(error)) => {
                    tracing::error!(%error, run, "indexing failed");
                    inner.fail_run(run);
                }
                Err(error) => {
                    tracing::error!(%error, run, "indexing task did not finish");
                    inner.fail_run(run);
                }
            }
        });
    }

    fn read_recent(&self) -> Result<Vec<WireRecencyEntry>, String> {
        let path = self.inner.paths.recent_file();
        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|error| error.to_string()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(error) => Err(error.to_string()),
        }
    }
}

impl Inner {
    fn cached_index(&self) -> Option<Arc<FileIndex>> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Starts a new run and drops whatever index the previous one stored.
    fn next_run(&self) -> u64 {
        let mut run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        *run += 1;
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = None;
        *run
    }

    fn is_current(&self, run: u64) -> bool {
        *self.run.lock().unwrap_or_else(PoisonError::into_inner) == run
    }

    /// Builds the index and, if `run` is still the latest, saves and caches
    /// it. Returns `false` for a superseded run.
    fn build_and_store(&self, run: u64, source: &impl IndexSource) -> Result<bool, IndexError> {
        let index = source.build_initial_index()?;

        // held through the save so a newer run cannot start halfway
        let current = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != run {
            return Ok(false);
        }
        index.save(&self.paths.index_file())?;
        tracing::info!(run, files = index.len(), "index stored");
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(index));
        Ok(true)
    }

    fn fail_run(&self, run: u64) {
        if self.is_current(run) {
            self.signals.emit(LifecycleSignal::IndexingFailed);
        }
    }
}

fn config_error(command: &'static str, error: ConfigError) -> CommandError {
    CommandError::new(command, error.to_string())
}

fn require_root_folder(command: &'static str, setup: &SetupConfig) -> Result<(), CommandError> {
    let root = Path::new(&setup.root_folder);
    if root.is_dir() {
        return Ok(());
    }
    Err(CommandError::new(
        command,
        IndexError::MissingRoot(root.to_path_buf()).to_string(),
    ))
}

#[async_trait]
impl SearchBackend for LocalBackend {
    async fn search_files(&self, query: &str) -> Result<Vec<WireRecord>, CommandError> {
        let index = self
            .current_index()
            .map_err(|error| CommandError::new(command::SEARCH_FILES, error.to_string()))?
            .ok_or_else(|| CommandError::new(command::SEARCH_FILES, "no index has been built"))?;

        let results = index.search(query);
        tracing::debug!(query, results = results.len(), "search");
        Ok(results)
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn get_recent_data(&self) -> Result<Vec<WireRecencyEntry>, CommandError> {
        self.read_recent()
            .map_err(|message| CommandError::new(command::GET_RECENT_DATA, message))
    }

    async fn process_recent(&self, data: Vec<WireRecencyEntry>) -> Result<(), CommandError> {
        self.inner
            .paths
            .ensure_root()
            .map_err(|error| config_error(command::PROCESS_RECENT, error))?;

        let json = serde_json::to_string_pretty(&data)
            .map_err(|error| CommandError::new(command::PROCESS_RECENT, error.to_string()))?;
        std::fs::write(self.inner.paths.recent_file(), json)
            .map_err(|error| CommandError::new(command::PROCESS_RECENT, error.to_string()))?;

        tracing::debug!(entries = data.len(), "recent files stored");
        Ok(())
    }

    async fn open_file(&self, path: &str) -> Result<(), CommandError> {
        self.inner
            .shell
            .open_path(path)
            .map_err(|error| CommandError::new(command::OPEN_FILE, error.to_string()))
    }

    async fn startup(&self) -> Result<StartupResponse, CommandError> {
        let recent_files = self
            .read_recent()
            .map_err(|message| CommandError::new(command::STARTUP, message))?;

        let index = match self.current_index() {
            Ok(index) => index,
            Err(error) => {
                tracing::warn!(%error, "stored index unusable; rebuilding");
                None
            }
        };

        let valid = match index {
            Some(_) => {
                self.inner.signals.emit(LifecycleSignal::IndexFound);
                true
            }
            None => {
                let setup = SetupConfig::load(&self.inner.paths.setup_file())
                    .map_err(|error| config_error(command::STARTUP, error))?;
                require_root_folder(command::STARTUP, &setup)?;
                self.start_indexing(setup);
                false
            }
        };

        Ok(StartupResponse {
            valid,
            recent_files,
            key_folders: finder_index::key_folders(),
        })
    }

    async fn setup_file_check(&self) -> Result<bool, CommandError> {
        Ok(self.inner.paths.setup_file().exists())
    }

    async fn load_setup(&self) -> Result<SetupConfig, CommandError> {
        SetupConfig::load(&self.inner.paths.setup_file())
            .map_err(|error| config_error(command::LOAD_SETUP, error))
    }

    async fn save_setup_file(&self, config: &SetupConfig) -> Result<(), CommandError> {
        require_root_folder(command::SAVE_SETUP_FILE, config)?;
        self.inner
            .paths
            .ensure_root()
            .and_then(|()| config.save(&self.inner.paths.setup_file()))
            .map_err(|error| config_error(command::SAVE_SETUP_FILE, error))?;

        tracing::info!(root = %config.root_folder, "setup saved; indexing");
        self.start_indexing(config.clone());
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.inner.signals.subscribe()
    }
}
