pub mod controller;
pub mod session;

use async_trait::async_trait;
use finder_record::{CommandError, WireRecord};

pub use controller::{spawn, SearchHandle, SearchOptions};
pub use session::{
    decode_results, FetchTicket, QueryAction, ResponseOutcome, SearchSession, SearchState,
    SearchStatus, StaleResponses, SEARCH_FAILED_MESSAGE,
};

#[async_trait]
pub trait SearchBackend: Send + Sync + 'static {
    async fn search_files(&self, query: &str) -> Result<Vec<WireRecord>, CommandError>;
}
