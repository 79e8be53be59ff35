use std::fmt;

use thiserror::Error;

use crate::error::StarseekError;

/// HTTP status GitHub answers with once the search rate limit is exhausted.
pub const STATUS_FORBIDDEN: u16 = 403;

/// A search term. Empty means "no filter, everything by popularity".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Query {
    term: String,
}

impl Query {
    /// The unfiltered query.
    pub fn everything() -> Self {
        Self::default()
    }

    /// Validate a user-submitted term. Terms shorter than `min_len`
    /// characters (after trimming) are rejected.
    pub fn parse(term: &str, min_len: usize) -> Result<Self, StarseekError> {
        let term = term.trim();
        if term.chars().count() < min_len {
            return Err(StarseekError::QueryTooShort { min: min_len });
        }
        Ok(Self {
            term: term.to_string(),
        })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn is_everything(&self) -> bool {
        self.term.is_empty()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.term.is_empty() {
            write!(f, "<everything>")
        } else {
            write!(f, "{}", self.term)
        }
    }
}

/// One repository row of a search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSummary {
    pub name: String,
    pub stars: u64,
    pub owner_login: String,
    pub owner_avatar_url: String,
    pub html_url: String,
}

impl RepoSummary {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner_login, self.name)
    }
}

/// One fetched batch of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub items: Vec<RepoSummary>,
    /// The page came back with exactly `page_size` items, so there is
    /// probably another one.
    pub is_full: bool,
}

impl Page {
    pub fn new(number: u32, items: Vec<RepoSummary>, page_size: usize) -> Self {
        let is_full = items.len() == page_size;
        Self {
            number,
            items,
            is_full,
        }
    }
}

/// Why a page request produced no page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    #[error("Unexpected search response: {0}")]
    Parse(String),

    #[error("Search request failed: {detail}")]
    Transport { status: Option<u16>, detail: String },
}

impl FetchFailure {
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            FetchFailure::Transport {
                status: Some(STATUS_FORBIDDEN),
                ..
            }
        )
    }
}

/// Result of one honored page request, as seen by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Success { page: Page, query_changed: bool },
    ParseFailure { query_changed: bool },
    TransportFailure { rate_limited: bool, query_changed: bool },
}

impl LoadOutcome {
    pub fn from_result(result: Result<Page, FetchFailure>, query_changed: bool) -> Self {
        match result {
            Ok(page) => LoadOutcome::Success {
                page,
                query_changed,
            },
            Err(FetchFailure::Parse(_)) => LoadOutcome::ParseFailure { query_changed },
            Err(failure) => LoadOutcome::TransportFailure {
                rate_limited: failure.is_rate_limited(),
                query_changed,
            },
        }
    }

    pub fn query_changed(&self) -> bool {
        match self {
            LoadOutcome::Success { query_changed, .. }
            | LoadOutcome::ParseFailure { query_changed }
            | LoadOutcome::TransportFailure { query_changed, .. } => *query_changed,
        }
    }

    /// Message to surface to the user, if any.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            LoadOutcome::Success { .. } => None,
            LoadOutcome::ParseFailure { .. } => Some("Could not parse the search response"),
            LoadOutcome::TransportFailure {
                rate_limited: true,
                ..
            } => Some("GitHub API rate limit reached, try again later"),
            LoadOutcome::TransportFailure { .. } => {
                Some("Network error while searching repositories")
            }
        }
    }
}
