use std::sync::Arc;
use std::time::Duration;

use finder_record::{CommandError, WireRecord};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};

use crate::session::{QueryAction, SearchSession, SearchState, StaleResponses};
use crate::SearchBackend;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub debounce: Duration,
    pub stale_responses: StaleResponses,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            stale_responses: StaleResponses::Discard,
        }
    }
}

/// Front end of a running search controller. Cloning shares the controller;
/// it stops once every handle is dropped.
#[derive(Debug, Clone)]
pub struct SearchHandle {
    input: mpsc::UnboundedSender<String>,
    session: watch::Receiver<SearchSession>,
}

impl SearchHandle {
    /// Replaces the query text. Returns `false` if the controller is gone.
    pub fn set_query(&self, text: impl Into<String>) -> bool {
        self.input.send(text.into()).is_ok()
    }

    pub fn session(&self) -> SearchSession {
        self.session.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchSession> {
        self.session.clone()
    }
}

/// Starts the controller on the current tokio runtime.
pub fn spawn<B>(backend: Arc<B>, options: SearchOptions) -> SearchHandle
where
    B: SearchBackend + ?Sized,
{
    let (input, input_rx) = mpsc::unbounded_channel();
    let (publish, session) = watch::channel(SearchSession::default());
    tokio::spawn(run(backend, options, input_rx, publish));
    SearchHandle { input, session }
}

type FetchResult = (u64, Result<Vec<WireRecord>, CommandError>);

async fn run<B>(
    backend: Arc<B>,
    options: SearchOptions,
    mut input: mpsc::UnboundedReceiver<String>,
    publish: watch::Sender<SearchSession>,
) where
    B: SearchBackend + ?Sized,
{
    let mut state = SearchState::new(options.stale_responses);
    let mut deadline: Option<Instant> = None;
    let mut in_flight: JoinSet<FetchResult> = JoinSet::new();

    loop {
        tokio::select! {
            text = input.recv() => {
                let Some(text) = text else {
                    break;
                };
                deadline = match state.query_changed(text) {
                    QueryAction::Cleared => None,
                    QueryAction::Schedule => Some(Instant::now() + options.debounce),
                };
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                let ticket = state.fire();
                tracing::debug!(generation = ticket.generation, query = %ticket.query, "issuing search");

                let backend = Arc::clone(&backend);
                in_flight.spawn(async move {
                    let result = backend.search_files(&ticket.query).await;
                    (ticket.generation, result)
                });
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                match joined {
                    Ok((generation, result)) => {
                        state.response(generation, result);
                    }
                    Err(error) => tracing::warn!(%error, "search task ended abnormally"),
                }
            }
        }

        publish.send_replace(state.session().clone());
    }

    tracing::debug!("search controller stopped");
}
