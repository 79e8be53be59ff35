//! Presentation model for the result list: the loaded repositories plus a
//! trailing sentinel row that either shows progress (and pulls in the next
//! page when it scrolls into view) or offers a manual retry.

use tracing::debug;

use crate::error::Result;
use crate::pagination::{Resolution, SearchSession};
use crate::search::{FetchRequest, FetchResponse};
use crate::types::{Query, RepoSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelKind {
    Loading,
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row<'a> {
    Repo(&'a RepoSummary),
    Sentinel(SentinelKind),
}

#[derive(Debug)]
pub struct ResultList {
    session: SearchSession,
    min_query_len: usize,
    next_page_loading: bool,
    refreshing: bool,
}

impl ResultList {
    pub fn new(min_query_len: usize) -> Self {
        Self {
            session: SearchSession::new(),
            min_query_len,
            next_page_loading: false,
            refreshing: false,
        }
    }

    pub fn session(&self) -> &SearchSession {
        &self.session
    }

    pub fn min_query_len(&self) -> usize {
        self.min_query_len
    }

    /// Start a search for a user-submitted term. Terms that are too short
    /// are rejected without touching any state.
    pub fn start_search(&mut self, term: &str) -> Result<FetchRequest> {
        let query = Query::parse(term, self.min_query_len)?;
        Ok(self.begin(query))
    }

    /// Load the unfiltered listing.
    pub fn show_everything(&mut self) -> FetchRequest {
        self.begin(Query::everything())
    }

    /// Re-run the last settled query from page 1.
    pub fn refresh(&mut self) -> FetchRequest {
        let query = self.session.settled_query().clone();
        self.begin(query)
    }

    /// Drop an active filter and go back to the unfiltered listing.
    /// Does nothing when no filter is active.
    pub fn collapse_search(&mut self) -> Option<FetchRequest> {
        if self.session.active_query().is_everything() {
            return None;
        }
        Some(self.show_everything())
    }

    fn begin(&mut self, query: Query) -> FetchRequest {
        self.refreshing = true;
        self.session.start_search(query)
    }

    pub fn load_more(&mut self) -> Option<FetchRequest> {
        let request = self.session.load_more()?;
        self.next_page_loading = true;
        Some(request)
    }

    /// The retry row was activated.
    pub fn retry_after_failure(&mut self) -> Option<FetchRequest> {
        self.session.clear_failure();
        self.load_more()
    }

    /// The sentinel row became visible. Returns the next-page request the
    /// first time this happens per load; a failed last attempt never
    /// auto-triggers.
    pub fn sentinel_shown(&mut self) -> Option<FetchRequest> {
        if !self.session.has_more() || self.session.last_failed() || self.next_page_loading {
            return None;
        }
        self.load_more()
    }

    /// Feed a gateway response through the state machine.
    pub fn apply(&mut self, response: FetchResponse) -> Option<Resolution> {
        let resolution = self.session.resolve(response)?;
        self.next_page_loading = false;
        self.refreshing = false;
        debug!(rows = self.row_count(), "result list updated");
        Some(resolution)
    }

    pub fn items(&self) -> &[RepoSummary] {
        self.session.items()
    }

    /// Number of rows to draw, including the sentinel.
    pub fn row_count(&self) -> usize {
        let items = self.session.items().len();
        if self.session.has_more() {
            items + 1
        } else {
            items
        }
    }

    pub fn row_at(&self, position: usize) -> Option<Row<'_>> {
        let items = self.session.items();
        if let Some(repo) = items.get(position) {
            return Some(Row::Repo(repo));
        }
        if position == items.len() && self.session.has_more() {
            return Some(Row::Sentinel(self.sentinel_kind()));
        }
        None
    }

    fn sentinel_kind(&self) -> SentinelKind {
        if self.session.last_failed() {
            SentinelKind::Retry
        } else {
            SentinelKind::Loading
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn should_show_empty_hint(&self) -> bool {
        self.session.items().is_empty() && self.session.last_failed() && !self.refreshing
    }
}
