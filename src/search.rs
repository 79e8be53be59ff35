use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::action::Action;
use crate::config::SearchConfig;
use crate::error::Result;
use crate::types::{FetchFailure, Page, Query, RepoSummary};

/// Used when both the search term and the configured qualifier are empty;
/// the search endpoint refuses an empty `q`.
const MATCH_ALL_QUALIFIER: &str = "stars:>0";

/// Identity of one issued page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// A page request handed from the pagination controller to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub id: RequestId,
    pub query: Query,
    pub page: u32,
    pub continuation: bool,
}

/// What comes back for a [`FetchRequest`]. Always exactly one per request.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub id: RequestId,
    pub result: std::result::Result<Page, FetchFailure>,
}

#[async_trait]
pub trait SearchSource: Send + Sync + std::fmt::Debug {
    async fn search(&self, query: &Query, page: u32) -> std::result::Result<Page, FetchFailure>;
}

/// Repository search against the GitHub REST API.
pub struct GitHubSearch {
    client: Client,
    api_url: String,
    filter: String,
    page_size: usize,
    token: Option<String>,
}

impl std::fmt::Debug for GitHubSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubSearch")
            .field("api_url", &self.api_url)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl GitHubSearch {
    pub fn new(config: &SearchConfig, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("starseek/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            filter: config.filter.clone(),
            page_size: config.page_size,
            token,
        })
    }

    fn search_url(&self, query: &Query, page: u32) -> String {
        format!(
            "{}/search/repositories?q={}&sort=stars&order=desc&page={}&per_page={}",
            self.api_url,
            urlencoding::encode(&search_terms(query, &self.filter)),
            page,
            self.page_size
        )
    }
}

/// Join the user term and the configured qualifier into a `q` value.
fn search_terms(query: &Query, filter: &str) -> String {
    let parts: Vec<&str> = [query.term(), filter.trim()]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect();

    if parts.is_empty() {
        MATCH_ALL_QUALIFIER.to_string()
    } else {
        parts.join(" ")
    }
}

#[async_trait]
impl SearchSource for GitHubSearch {
    async fn search(&self, query: &Query, page: u32) -> std::result::Result<Page, FetchFailure> {
        let url = self.search_url(query, page);
        debug!(%query, page, "requesting search page");

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| FetchFailure::Transport {
            status: None,
            detail: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(FetchFailure::Transport {
                status: Some(status.as_u16()),
                detail: format!("GitHub API {}: {}", status, text),
            });
        }

        let body = response.text().await.map_err(|e| FetchFailure::Transport {
            status: None,
            detail: e.to_string(),
        })?;

        parse_page(&body, page, self.page_size)
    }
}

// GitHub search response types

#[derive(Deserialize)]
struct GhSearchResponse {
    items: Vec<GhRepo>,
}

#[derive(Deserialize)]
struct GhRepo {
    name: String,
    #[serde(default)]
    stargazers_count: u64,
    html_url: String,
    owner: GhOwner,
}

#[derive(Deserialize)]
struct GhOwner {
    login: String,
    #[serde(default)]
    avatar_url: String,
}

fn parse_page(
    body: &str,
    page: u32,
    page_size: usize,
) -> std::result::Result<Page, FetchFailure> {
    let response: GhSearchResponse =
        serde_json::from_str(body).map_err(|e| FetchFailure::Parse(e.to_string()))?;

    let items = response
        .items
        .into_iter()
        .map(|r| RepoSummary {
            name: r.name,
            stars: r.stargazers_count,
            owner_login: r.owner.login,
            owner_avatar_url: r.owner.avatar_url,
            html_url: r.html_url,
        })
        .collect();

    Ok(Page::new(page, items, page_size))
}

/// Runs page requests off the event loop and posts each result back as an
/// [`Action::PageFetched`].
///
/// A newer request supersedes older ones only logically: the older task
/// keeps running and its response is dropped by the pagination controller.
pub struct Gateway {
    source: Arc<dyn SearchSource>,
    action_tx: mpsc::UnboundedSender<Action>,
}

impl Gateway {
    pub fn new(source: Arc<dyn SearchSource>, action_tx: mpsc::UnboundedSender<Action>) -> Self {
        Self {
            source,
            action_tx,
        }
    }

    pub fn dispatch(&self, request: FetchRequest) {
        debug!(
            id = request.id.0,
            query = %request.query,
            page = request.page,
            "dispatching page request"
        );

        let tx = self.action_tx.clone();
        let source = Arc::clone(&self.source);
        tokio::spawn(async move {
            let result = source.search(&request.query, request.page).await;
            tx.send(Action::PageFetched(FetchResponse {
                id: request.id,
                result,
            }))
            .ok();
        });
    }
}
