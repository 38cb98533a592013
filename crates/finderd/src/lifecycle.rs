use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use finder_config::SetupConfig;
use finder_watch::{LifecycleSignal, SignalSource};
use tokio::sync::watch;

use crate::backend::{Backend, StartupResponse};
use crate::error::FinderError;

pub const INDEXING_FAILED_MESSAGE: &str = "indexing failed";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    AwaitingSetup,
    Indexing,
    Ready,
    SetupFailed(String),
    StartupFailed(String),
}

impl LifecycleState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::AwaitingSetup => f.write_str("awaiting setup"),
            Self::Indexing => f.write_str("indexing"),
            Self::Ready => f.write_str("ready"),
            Self::SetupFailed(message) => write!(f, "setup failed: {message}"),
            Self::StartupFailed(message) => write!(f, "startup failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    SetupChecked { configured: bool },
    SetupLoaded,
    SetupSubmitted,
    SetupFailed(String),
    StartupCompleted { index_ready: bool },
    StartupFailed(String),
    Signal(LifecycleSignal),
}

/// Setup → indexing → ready, tolerant of the order in which startup replies
/// and backend signals arrive.
///
/// A ready signal (or a startup reply saying the index exists) is latched, so
/// it counts even when it lands before setup has been loaded. Once latched,
/// the machine is promoted to `Ready` as soon as it is indexing. A failed
/// build moves an indexing machine to `StartupFailed`; a later ready signal
/// still recovers it. Repeating an event never changes the outcome.
#[derive(Debug, Clone, Default)]
pub struct LifecycleMachine {
    state: LifecycleState,
    index_ready: bool,
}

impl LifecycleMachine {
    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    pub fn apply(&mut self, event: LifecycleEvent) -> &LifecycleState {
        match event {
            LifecycleEvent::SetupChecked { configured: false } => {
                self.index_ready = false;
                self.state = LifecycleState::AwaitingSetup;
            }
            LifecycleEvent::SetupChecked { configured: true } => {}
            LifecycleEvent::SetupLoaded => {
                if !self.state.is_ready() {
                    self.state = LifecycleState::Indexing;
                }
            }
            LifecycleEvent::SetupSubmitted => {
                // a new root means the old index no longer counts
                self.index_ready = false;
                self.state = LifecycleState::Indexing;
            }
            LifecycleEvent::SetupFailed(message) => {
                self.state = LifecycleState::SetupFailed(message);
            }
            LifecycleEvent::StartupCompleted { index_ready } => {
                self.index_ready |= index_ready;
            }
            LifecycleEvent::StartupFailed(message) => {
                if !self.state.is_ready() {
                    self.state = LifecycleState::StartupFailed(message);
                }
            }
            LifecycleEvent::Signal(LifecycleSignal::IndexingFailed) => {
                if self.state == LifecycleState::Indexing && !self.index_ready {
                    self.state = LifecycleState::StartupFailed(INDEXING_FAILED_MESSAGE.into());
                }
            }
            LifecycleEvent::Signal(signal) => {
                if signal.marks_index_ready() && self.listens_for_signals() {
                    self.index_ready = true;
                }
            }
        }

        self.promote();
        &self.state
    }

    fn listens_for_signals(&self) -> bool {
        matches!(
            self.state,
            LifecycleState::Uninitialized
                | LifecycleState::Indexing
                | LifecycleState::StartupFailed(_)
        )
    }

    fn promote(&mut self) {
        let promotable = matches!(
            self.state,
            LifecycleState::Indexing | LifecycleState::StartupFailed(_)
        );
        if self.index_ready && promotable {
            self.state = LifecycleState::Ready;
        }
    }
}

/// Drives a [`LifecycleMachine`] from backend commands and signals and
/// publishes every state change.
pub struct LifecycleOrchestrator<B: ?Sized> {
    backend: Arc<B>,
    machine: Mutex<LifecycleMachine>,
    setup: Mutex<Option<SetupConfig>>,
    state_tx: watch::Sender<LifecycleState>,
}

impl<B> LifecycleOrchestrator<B>
where
    B: Backend + ?Sized,
{
    pub fn new(backend: Arc<B>) -> Self {
        let (state_tx, _) = watch::channel(LifecycleState::default());
        Self {
            backend,
            machine: Mutex::new(LifecycleMachine::default()),
            setup: Mutex::new(None),
            state_tx,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    /// Setup the backend last loaded or accepted.
    pub fn setup(&self) -> Option<SetupConfig> {
        self.setup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn apply(&self, event: LifecycleEvent) -> LifecycleState {
        let mut machine = self.machine.lock().unwrap_or_else(PoisonError::into_inner);
        let before = machine.state().clone();
        let after = machine.apply(event).clone();
        if before != after {
            tracing::info!(from = %before, to = %after, "lifecycle transition");
            self.state_tx.send_replace(after.clone());
        }
        after
    }

    /// Checks for a saved setup and, when there is one, loads it and runs
    /// startup. Returns `None` when the user still has to complete setup.
    pub async fn boot(&self) -> Result<Option<StartupResponse>, FinderError> {
        let configured = match self.backend.setup_file_check().await {
            Ok(configured) => configured,
            Err(error) => return Err(self.setup_failed(error)),
        };
        self.apply(LifecycleEvent::SetupChecked { configured });
        if !configured {
            tracing::info!("no saved setup; waiting for the user");
            return Ok(None);
        }

        let setup = match self.backend.load_setup().await {
            Ok(setup) => setup,
            Err(error) => return Err(self.setup_failed(error)),
        };
        self.remember_setup(setup);
        self.apply(LifecycleEvent::SetupLoaded);

        match self.backend.startup().await {
            Ok(response) => {
                self.apply(LifecycleEvent::StartupCompleted {
                    index_ready: response.valid,
                });
                Ok(Some(response))
            }
            Err(error) => {
                tracing::warn!(%error, "startup failed");
                self.apply(LifecycleEvent::StartupFailed(error.message.clone()));
                Err(FinderError::Startup(error))
            }
        }
    }

    /// Saves a new setup, which makes the backend index it.
    pub async fn submit_setup(&self, config: &SetupConfig) -> Result<(), FinderError> {
        config.validate()?;
        self.apply(LifecycleEvent::SetupSubmitted);

        match self.backend.save_setup_file(config).await {
            Ok(()) => {
                self.remember_setup(config.clone());
                Ok(())
            }
            Err(error) => Err(self.setup_failed(error)),
        }
    }

    pub fn on_signal(&self, signal: LifecycleSignal) -> LifecycleState {
        tracing::debug!(signal = signal.event_name(), "lifecycle signal");
        self.apply(LifecycleEvent::Signal(signal))
    }

    /// Feeds signals into the machine until the source closes.
    pub async fn follow<S>(&self, mut source: S)
    where
        S: SignalSource,
    {
        while let Some(signal) = source.next_signal().await {
            self.on_signal(signal);
        }
        tracing::debug!("signal source closed");
    }

    fn remember_setup(&self, setup: SetupConfig) {
        *self.setup.lock().unwrap_or_else(PoisonError::into_inner) = Some(setup);
    }

    fn setup_failed(&self, error: finder_record::CommandError) -> FinderError {
        tracing::warn!(%error, "setup failed");
        self.apply(LifecycleEvent::SetupFailed(error.message.clone()));
        FinderError::Setup(error)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use finder_watch::LifecycleSignal::{
        IndexFound, IndexingCompleted, IndexingFailed, IndexingStarted,
    };

    use super::*;
    use crate::test_support::MockBackend;

    fn run(events: &[LifecycleEvent]) -> LifecycleState {
        let mut machine = LifecycleMachine::default();
        for event in events {
            machine.apply(event.clone());
        }
        machine.state().clone()
    }

    fn configured_boot(index_ready: bool) -> Vec<LifecycleEvent> {
        vec![
            LifecycleEvent::SetupChecked { configured: true },
            LifecycleEvent::SetupLoaded,
            LifecycleEvent::StartupCompleted { index_ready },
        ]
    }

    #[test]
    fn missing_setup_waits_for_the_user() {
        let state = run(&[LifecycleEvent::SetupChecked { configured: false }]);
        assert_eq!(state, LifecycleState::AwaitingSetup);
    }

    #[test]
    fn valid_startup_is_ready() {
        assert_eq!(run(&configured_boot(true)), LifecycleState::Ready);
    }

    #[test]
    fn startup_without_index_stays_indexing_until_completion() {
        let mut events = configured_boot(false);
        assert_eq!(run(&events), LifecycleState::Indexing);

        events.push(LifecycleEvent::Signal(IndexingStarted));
        assert_eq!(run(&events), LifecycleState::Indexing);

        events.push(LifecycleEvent::Signal(IndexingCompleted));
        assert_eq!(run(&events), LifecycleState::Ready);
    }

    #[test]
    fn completion_signal_counts_at_every_point_of_the_boot() {
        let boot = configured_boot(false);
        for position in 0..=boot.len() {
            let mut events = boot.clone();
            events.insert(position, LifecycleEvent::Signal(IndexingCompleted));
            assert_eq!(run(&events), LifecycleState::Ready, "signal at {position}");
        }
    }

    #[test]
    fn repeated_signals_do_not_change_the_outcome() {
        let mut events = configured_boot(true);
        events.extend([
            LifecycleEvent::Signal(IndexFound),
            LifecycleEvent::Signal(IndexingCompleted),
            LifecycleEvent::Signal(IndexFound),
        ]);
        assert_eq!(run(&events), LifecycleState::Ready);
    }

    #[test]
    fn startup_failure_recovers_on_a_later_ready_signal() {
        let events = vec![
            LifecycleEvent::SetupChecked { configured: true },
            LifecycleEvent::SetupLoaded,
            LifecycleEvent::StartupFailed("boom".into()),
        ];
        assert_eq!(
            run(&events),
            LifecycleState::StartupFailed("boom".into())
        );

        let mut recovered = events.clone();
        recovered.push(LifecycleEvent::Signal(IndexingCompleted));
        assert_eq!(run(&recovered), LifecycleState::Ready);
    }

    #[test]
    fn startup_failure_after_ready_keeps_ready() {
        let events = vec![
            LifecycleEvent::SetupChecked { configured: true },
            LifecycleEvent::SetupLoaded,
            LifecycleEvent::Signal(IndexFound),
            LifecycleEvent::StartupFailed("late".into()),
        ];
        assert_eq!(run(&events), LifecycleState::Ready);
    }

    #[test]
    fn stray_signals_are_ignored_while_awaiting_setup() {
        let events = vec![
            LifecycleEvent::SetupChecked { configured: false },
            LifecycleEvent::Signal(IndexingCompleted),
            LifecycleEvent::SetupSubmitted,
        ];
        assert_eq!(run(&events), LifecycleState::Indexing);
    }

    #[test]
    fn resubmitting_setup_forgets_the_old_index() {
        let mut events = configured_boot(true);
        events.push(LifecycleEvent::SetupSubmitted);
        assert_eq!(run(&events), LifecycleState::Indexing);

        events.push(LifecycleEvent::Signal(IndexingCompleted));
        assert_eq!(run(&events), LifecycleState::Ready);
    }

    #[test]
    fn failed_build_leaves_indexing() {
        let mut events = configured_boot(false);
        events.push(LifecycleEvent::Signal(IndexingFailed));
        assert_eq!(
            run(&events),
            LifecycleState::StartupFailed(INDEXING_FAILED_MESSAGE.into())
        );

        events.push(LifecycleEvent::Signal(IndexingCompleted));
        assert_eq!(run(&events), LifecycleState::Ready);
    }

    #[test]
    fn failed_build_after_submission_can_be_retried() {
        let events = vec![
            LifecycleEvent::SetupChecked { configured: false },
            LifecycleEvent::SetupSubmitted,
            LifecycleEvent::Signal(IndexingFailed),
            LifecycleEvent::SetupSubmitted,
        ];
        assert_eq!(run(&events), LifecycleState::Indexing);
    }

    #[test]
    fn failed_build_never_demotes_ready() {
        let mut events = configured_boot(true);
        events.push(LifecycleEvent::Signal(IndexingFailed));
        assert_eq!(run(&events), LifecycleState::Ready);
    }

    #[test]
    fn setup_failure_ignores_signals() {
        let events = vec![
            LifecycleEvent::SetupChecked { configured: false },
            LifecycleEvent::SetupSubmitted,
            LifecycleEvent::SetupFailed("disk full".into()),
            LifecycleEvent::Signal(IndexingCompleted),
        ];
        assert_eq!(
            run(&events),
            LifecycleState::SetupFailed("disk full".into())
        );
    }

    #[tokio::test]
    async fn boot_without_setup_awaits_setup() {
        let backend = Arc::new(MockBackend::default());
        let orchestrator = LifecycleOrchestrator::new(backend);

        assert!(orchestrator.boot().await.unwrap().is_none());
        assert_eq!(orchestrator.state(), LifecycleState::AwaitingSetup);
    }

    #[tokio::test]
    async fn boot_with_index_is_ready_and_remembers_setup() {
        let backend = Arc::new(MockBackend::configured(true));
        let orchestrator = LifecycleOrchestrator::new(backend);

        let response = orchestrator.boot().await.unwrap().unwrap();
        assert!(response.valid);
        assert_eq!(orchestrator.state(), LifecycleState::Ready);
        assert_eq!(
            orchestrator.setup().map(|setup| setup.root_folder),
            Some("/data".to_string())
        );
    }

    #[tokio::test]
    async fn completion_before_startup_resolves_still_ends_ready() {
        let backend = Arc::new(MockBackend::configured(false));
        let gate = backend.gate_startup();
        let orchestrator = Arc::new(LifecycleOrchestrator::new(Arc::clone(&backend)));

        let follower = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            let source = backend.subscribe();
            async move { orchestrator.follow(source).await }
        });
        let booting = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.boot().await }
        });

        let mut states = orchestrator.subscribe();
        tokio::time::timeout(
            Duration::from_secs(5),
            states.wait_for(|state| *state == LifecycleState::Indexing),
        )
        .await
        .unwrap()
        .unwrap();

        backend.signals.emit(IndexingCompleted);
        tokio::time::timeout(Duration::from_secs(5), states.wait_for(LifecycleState::is_ready))
            .await
            .unwrap()
            .unwrap();

        gate.notify_one();
        let response = booting.await.unwrap().unwrap().unwrap();
        assert!(!response.valid);
        assert_eq!(orchestrator.state(), LifecycleState::Ready);
        follower.abort();
    }

    #[tokio::test]
    async fn load_failure_is_a_setup_failure() {
        let backend = Arc::new(MockBackend::configured(true));
        backend.fail_load_setup(true);
        let orchestrator = LifecycleOrchestrator::new(backend);

        assert!(matches!(
            orchestrator.boot().await,
            Err(FinderError::Setup(_))
        ));
        assert!(matches!(
            orchestrator.state(),
            LifecycleState::SetupFailed(_)
        ));
    }

    #[tokio::test]
    async fn startup_failure_is_reported() {
        let backend = Arc::new(MockBackend::configured(true));
        backend.fail_startup(true);
        let orchestrator = LifecycleOrchestrator::new(backend);

        assert!(matches!(
            orchestrator.boot().await,
            Err(FinderError::Startup(_))
        ));
        assert!(matches!(
            orchestrator.state(),
            LifecycleState::StartupFailed(_)
        ));
    }

    #[tokio::test]
    async fn submitted_setup_indexes_until_completion() {
        let backend = Arc::new(MockBackend::default());
        let orchestrator = LifecycleOrchestrator::new(Arc::clone(&backend));
        orchestrator.boot().await.unwrap();

        let setup = SetupConfig::new("/data", &["txt"]);
        orchestrator.submit_setup(&setup).await.unwrap();
        assert_eq!(orchestrator.state(), LifecycleState::Indexing);
        assert_eq!(backend.saved_setup(), Some(setup.clone()));
        assert_eq!(orchestrator.setup(), Some(setup));

        orchestrator.on_signal(IndexingCompleted);
        assert_eq!(orchestrator.state(), LifecycleState::Ready);
    }

    #[tokio::test]
    async fn failed_save_returns_to_setup() {
        let backend = Arc::new(MockBackend::default());
        backend.fail_save_setup(true);
        let orchestrator = LifecycleOrchestrator::new(backend);

        let result = orchestrator
            .submit_setup(&SetupConfig::new("/data", &[]))
            .await;
        assert!(matches!(result, Err(FinderError::Setup(_))));
        assert!(matches!(
            orchestrator.state(),
            LifecycleState::SetupFailed(_)
        ));
    }

    #[tokio::test]
    async fn invalid_setup_is_rejected_without_a_transition() {
        let backend = Arc::new(MockBackend::default());
        let orchestrator = LifecycleOrchestrator::new(Arc::clone(&backend));
        orchestrator.boot().await.unwrap();

        let result = orchestrator.submit_setup(&SetupConfig::new("  ", &[])).await;
        assert!(matches!(result, Err(FinderError::InvalidSetup(_))));
        assert_eq!(orchestrator.state(), LifecycleState::AwaitingSetup);
        assert_eq!(backend.saved_setup(), None);
    }
}
