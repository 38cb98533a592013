use finder_record::{from_wire, CommandError, FileRecord, WireRecord};

pub const SEARCH_FAILED_MESSAGE: &str = "Failed to search files.";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchSession {
    pub query: String,
    pub results: Vec<FileRecord>,
    pub status: SearchStatus,
}

impl SearchSession {
    pub fn is_loading(&self) -> bool {
        self.status == SearchStatus::Loading
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            SearchStatus::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// What to do with a response that was overtaken by a newer fetch or by a
/// cleared query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaleResponses {
    #[default]
    Discard,
    /// Every response lands, in completion order. Slow stale fetches can
    /// overwrite newer results.
    Overwrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryAction {
    Cleared,
    Schedule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    Applied,
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub query: String,
}

/// Search state transitions, free of timers and I/O.
///
/// Every edit bumps `generation`. A fetch is tagged with the generation it was
/// fired at and, under [`StaleResponses::Discard`], its response only lands if
/// no later fetch was fired and the query was not cleared in between.
#[derive(Debug, Default)]
pub struct SearchState {
    session: SearchSession,
    generation: u64,
    latest_issued: Option<u64>,
    stale: StaleResponses,
}

impl SearchState {
    pub fn new(stale: StaleResponses) -> Self {
        Self {
            stale,
            ..Self::default()
        }
    }

    pub fn session(&self) -> &SearchSession {
        &self.session
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn query_changed(&mut self, text: String) -> QueryAction {
        self.generation += 1;
        self.session.query = text;

        if self.session.query.trim().is_empty() {
            self.session.results.clear();
            self.session.status = SearchStatus::Idle;
            self.latest_issued = None;
            return QueryAction::Cleared;
        }

        QueryAction::Schedule
    }

    pub fn fire(&mut self) -> FetchTicket {
        self.session.status = SearchStatus::Loading;
        self.latest_issued = Some(self.generation);
        FetchTicket {
            generation: self.generation,
            query: self.session.query.clone(),
        }
    }

    pub fn response(
        &mut self,
        generation: u64,
        result: Result<Vec<WireRecord>, CommandError>,
    ) -> ResponseOutcome {
        if self.stale == StaleResponses::Discard && self.latest_issued != Some(generation) {
            tracing::debug!(generation, latest = ?self.latest_issued, "dropping stale search response");
            return ResponseOutcome::Discarded;
        }

        match result {
            Ok(raw) => {
                self.session.results = decode_results(raw);
                self.session.status = SearchStatus::Ready;
            }
            Err(error) => {
                tracing::warn!(%error, query = %self.session.query, "search failed");
                self.session.status = SearchStatus::Failed(SEARCH_FAILED_MESSAGE.to_string());
            }
        }

        ResponseOutcome::Applied
    }
}

/// Maps raw backend results to records, skipping malformed ones.
pub fn decode_results(raw: Vec<WireRecord>) -> Vec<FileRecord> {
    raw.into_iter()
        .filter_map(|wire| match from_wire(wire) {
            Ok(record) => Some(record),
            Err(error) => {
                tracing::warn!(%error, "skipping malformed search result");
                None
            }
        })
        .collect()
}
