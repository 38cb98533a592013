use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

const HUB_CAPACITY: usize = 32;

/// Indexing progress pushed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleSignal {
    IndexingStarted,
    IndexFound,
    IndexingCompleted,
    IndexingFailed,
}

impl LifecycleSignal {
    pub const ALL: [Self; 4] = [
        Self::IndexingStarted,
        Self::IndexFound,
        Self::IndexingCompleted,
        Self::IndexingFailed,
    ];

    pub fn event_name(self) -> &'static str {
        match self {
            Self::IndexingStarted => "indexing-started",
            Self::IndexFound => "index-found",
            Self::IndexingCompleted => "indexing-completed",
            Self::IndexingFailed => "indexing-failed",
        }
    }

    pub fn from_event_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|signal| signal.event_name() == name)
    }

    /// Whether the signal means a usable index exists.
    pub fn marks_index_ready(self) -> bool {
        matches!(self, Self::IndexFound | Self::IndexingCompleted)
    }
}

#[async_trait]
pub trait SignalSource: Send {
    /// Next signal, or `None` once the source is closed.
    async fn next_signal(&mut self) -> Option<LifecycleSignal>;
}

#[async_trait]
impl SignalSource for mpsc::UnboundedReceiver<LifecycleSignal> {
    async fn next_signal(&mut self) -> Option<LifecycleSignal> {
        self.recv().await
    }
}

/// Fan-out point for signals; every subscriber sees every signal emitted
/// after it subscribed.
#[derive(Debug, Clone)]
pub struct SignalHub {
    tx: broadcast::Sender<LifecycleSignal>,
}

impl Default for SignalHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx }
    }

    /// Returns how many subscribers received the signal.
    pub fn emit(&self, signal: LifecycleSignal) -> usize {
        tracing::debug!(signal = signal.event_name(), "emitting lifecycle signal");
        self.tx.send(signal).unwrap_or(0)
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }
}

pub struct Subscription {
    rx: broadcast::Receiver<LifecycleSignal>,
}

#[async_trait]
impl SignalSource for Subscription {
    async fn next_signal(&mut self) -> Option<LifecycleSignal> {
        loop {
            match self.rx.recv().await {
                Ok(signal) => return Some(signal),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "lifecycle subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
