//! Query/page state machine.
//!
//! A [`SearchSession`] decides which page to request next and with which
//! query, and merges honored responses into the visible item sequence.
//! It never performs I/O itself: operations return a [`FetchRequest`] for
//! the caller to dispatch, and results come back through
//! [`SearchSession::resolve`].

use tracing::{debug, info};

use crate::search::{FetchRequest, FetchResponse, RequestId};
use crate::types::{LoadOutcome, Query, RepoSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    LoadingFresh,
    LoadingNext,
    Settled {
        has_more: bool,
    },
    Errored {
        has_more: bool,
        recoverable: bool,
    },
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::LoadingFresh | LoadState::LoadingNext)
    }
}

#[derive(Debug, Clone)]
struct InFlight {
    id: RequestId,
    query: Query,
    continuation: bool,
}

/// An honored outcome together with the kind of load that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: LoadOutcome,
    pub continuation: bool,
}

#[derive(Debug)]
pub struct SearchSession {
    active_query: Query,
    settled_query: Query,
    current_page: u32,
    has_more: bool,
    items: Vec<RepoSummary>,
    last_failed: bool,
    in_flight: Option<InFlight>,
    state: LoadState,
    next_id: u64,
}

impl Default for SearchSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchSession {
    pub fn new() -> Self {
        Self {
            active_query: Query::everything(),
            settled_query: Query::everything(),
            current_page: 0,
            has_more: false,
            items: Vec::new(),
            last_failed: false,
            in_flight: None,
            state: LoadState::Idle,
            next_id: 0,
        }
    }

    pub fn items(&self) -> &[RepoSummary] {
        &self.items
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn last_failed(&self) -> bool {
        self.last_failed
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn active_query(&self) -> &Query {
        &self.active_query
    }

    pub fn settled_query(&self) -> &Query {
        &self.settled_query
    }

    #[cfg(test)]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Begin a fresh load of page 1 for `query`, superseding whatever is
    /// in flight.
    pub fn start_search(&mut self, query: Query) -> FetchRequest {
        if let Some(previous) = &self.in_flight {
            debug!(superseded = previous.id.0, "dropping in-flight page request");
        }
        info!(%query, "starting search");
        self.active_query = query.clone();
        self.state = LoadState::LoadingFresh;
        self.issue(query, 1, false)
    }

    /// Request the page after the last loaded one, for the settled query.
    ///
    /// Returns `None` when there is nothing more to load, a request is
    /// already in flight, or no load has settled yet.
    pub fn load_more(&mut self) -> Option<FetchRequest> {
        let settled = matches!(
            self.state,
            LoadState::Settled { .. } | LoadState::Errored { .. }
        );
        if !settled || !self.has_more || self.in_flight.is_some() {
            return None;
        }

        let page = self.current_page + 1;
        debug!(query = %self.settled_query, page, "loading next page");
        self.state = LoadState::LoadingNext;
        Some(self.issue(self.settled_query.clone(), page, true))
    }

    /// Forget that the last attempt failed, ahead of a manual retry.
    pub fn clear_failure(&mut self) {
        self.last_failed = false;
    }

    fn issue(&mut self, query: Query, page: u32, continuation: bool) -> FetchRequest {
        self.next_id += 1;
        let id = RequestId(self.next_id);
        self.in_flight = Some(InFlight {
            id,
            query: query.clone(),
            continuation,
        });
        FetchRequest {
            id,
            query,
            page,
            continuation,
        }
    }

    /// Merge a gateway response. Responses for anything but the current
    /// in-flight request are stale and dropped untouched.
    pub fn resolve(&mut self, response: FetchResponse) -> Option<Resolution> {
        let is_current = self
            .in_flight
            .as_ref()
            .is_some_and(|current| current.id == response.id);
        if !is_current {
            debug!(id = response.id.0, "discarding stale page response");
            return None;
        }
        let in_flight = self.in_flight.take()?;
        if let Err(failure) = &response.result {
            info!(query = %in_flight.query, error = %failure, "page request failed");
        }

        let query_changed = in_flight.query != self.settled_query;
        let outcome = LoadOutcome::from_result(response.result, query_changed);
        self.apply(&outcome, in_flight.continuation);
        self.settled_query = in_flight.query;

        Some(Resolution {
            outcome,
            continuation: in_flight.continuation,
        })
    }

    fn apply(&mut self, outcome: &LoadOutcome, continuation: bool) {
        match outcome {
            LoadOutcome::Success { page, .. } => {
                if continuation {
                    self.items.extend(page.items.iter().cloned());
                } else {
                    self.items = page.items.clone();
                }
                self.current_page = page.number;
                self.has_more = page.is_full;
                self.last_failed = false;
                self.state = LoadState::Settled {
                    has_more: self.has_more,
                };
                debug!(
                    page = page.number,
                    received = page.items.len(),
                    total = self.items.len(),
                    has_more = self.has_more,
                    "page merged"
                );
            }
            failure => {
                if !continuation && failure.query_changed() {
                    self.items.clear();
                    self.has_more = false;
                }
                let recoverable = !matches!(
                    failure,
                    LoadOutcome::TransportFailure {
                        rate_limited: true,
                        ..
                    }
                );
                self.last_failed = true;
                self.state = LoadState::Errored {
                    has_more: self.has_more,
                    recoverable,
                };
                debug!(?failure, continuation, items = self.items.len(), "failure merged");
            }
        }
    }
}
