use std::sync::Arc;

use finder_recent::RecencyStore;
use finder_record::{entry_from_wire, entry_to_wire, WireRecencyEntry};
use tokio::sync::{mpsc, oneshot};

use crate::backend::Backend;
use crate::error::FinderError;

struct PushJob {
    snapshot: Vec<WireRecencyEntry>,
    done: oneshot::Sender<Result<(), FinderError>>,
}

/// Outcome of one snapshot push. Dropping it is fine; the push still happens.
#[derive(Debug)]
pub struct PushReceipt {
    rx: oneshot::Receiver<Result<(), FinderError>>,
}

impl PushReceipt {
    pub async fn wait(self) -> Result<(), FinderError> {
        self.rx.await.unwrap_or(Err(FinderError::SyncStopped))
    }
}

/// Keeps the backend's copy of the recent files in step with the local store.
///
/// Every push carries the whole snapshot. Pushes are written by a single
/// worker task in the order they were submitted. A failed push is logged and
/// reported on its receipt; the local store stays as it is.
pub struct SyncBridge<B: ?Sized> {
    backend: Arc<B>,
    pushes: mpsc::UnboundedSender<PushJob>,
}

impl<B> SyncBridge<B>
where
    B: Backend + ?Sized,
{
    pub fn new(backend: Arc<B>) -> Self {
        let (pushes, jobs) = mpsc::unbounded_channel();
        tokio::spawn(push_worker(Arc::clone(&backend), jobs));
        Self { backend, pushes }
    }

    pub fn push(&self, store: &RecencyStore) -> PushReceipt {
        let (done, rx) = oneshot::channel();
        let job = PushJob {
            snapshot: snapshot_of(store),
            done,
        };
        if self.pushes.send(job).is_err() {
            tracing::warn!("recent files sync worker is gone; push dropped");
        }
        PushReceipt { rx }
    }

    pub async fn pull(&self) -> Result<Vec<WireRecencyEntry>, FinderError> {
        self.backend.get_recent_data().await.map_err(|error| {
            tracing::warn!(%error, "could not fetch recent files");
            FinderError::Sync(error)
        })
    }
}

async fn push_worker<B>(backend: Arc<B>, mut jobs: mpsc::UnboundedReceiver<PushJob>)
where
    B: Backend + ?Sized,
{
    while let Some(job) = jobs.recv().await {
        let entries = job.snapshot.len();
        let result = backend
            .process_recent(job.snapshot)
            .await
            .map_err(FinderError::Sync);

        match &result {
            Ok(()) => tracing::debug!(entries, "recent files pushed"),
            Err(error) => tracing::warn!(%error, "recent files push failed; keeping local copy"),
        }
        let _ = job.done.send(result);
    }
}

pub fn snapshot_of(store: &RecencyStore) -> Vec<WireRecencyEntry> {
    store
        .entries()
        .map(|(index, record)| entry_to_wire(index, record))
        .collect()
}

/// Replaces the store with a backend snapshot, keeping the backend's slot
/// indices. Malformed entries are skipped. Returns how many were adopted.
pub fn adopt_snapshot(store: &mut RecencyStore, entries: Vec<WireRecencyEntry>) -> usize {
    let decoded: Vec<_> = entries
        .into_iter()
        .filter_map(|entry| match entry_from_wire(entry) {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                tracing::warn!(%error, "skipping malformed recent entry");
                None
            }
        })
        .collect();

    let adopted = decoded.len();
    store.replace_all(decoded);
    adopted
}
