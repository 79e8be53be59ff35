//! Builders and fakes shared by unit tests.

use std::collections::VecDeque;
use std::ops::Range;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::avatar::ImageSource;
use crate::search::SearchSource;
use crate::types::{FetchFailure, Page, Query, RepoSummary};

pub fn repo(n: u32) -> RepoSummary {
    RepoSummary {
        name: format!("repo-{}", n),
        stars: 10_000u64.saturating_sub(n as u64),
        owner_login: format!("owner-{}", n),
        owner_avatar_url: String::new(),
        html_url: format!("https://github.com/owner-{}/repo-{}", n, n),
    }
}

pub fn repos(range: Range<u32>) -> Vec<RepoSummary> {
    range.map(repo).collect()
}

pub fn page(number: u32, range: Range<u32>, page_size: usize) -> Page {
    Page::new(number, repos(range), page_size)
}

pub fn avatar_url(n: u32) -> String {
    format!("https://avatars.example/u/owner-{}", n)
}

/// Give every repo in `page` a distinct owner avatar.
pub fn with_avatars(mut page: Page) -> Page {
    for repo in &mut page.items {
        repo.owner_avatar_url = format!("https://avatars.example/u/{}", repo.owner_login);
    }
    page
}

pub fn transport_failure(status: Option<u16>) -> FetchFailure {
    FetchFailure::Transport {
        status,
        detail: "simulated".to_string(),
    }
}

/// A [`SearchSource`] that replays canned results in call order and records
/// every `(term, page)` it was asked for.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    results: Mutex<VecDeque<Result<Page, FetchFailure>>>,
    calls: Mutex<Vec<(String, u32)>>,
}

impl ScriptedSource {
    pub fn new(results: Vec<Result<Page, FetchFailure>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchSource for ScriptedSource {
    async fn search(&self, query: &Query, page: u32) -> Result<Page, FetchFailure> {
        self.calls
            .lock()
            .unwrap()
            .push((query.term().to_string(), page));
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchFailure::Parse("script exhausted".to_string())))
    }
}

/// An [`ImageSource`] that answers every URL with its own bytes and records
/// the URLs it was asked for.
#[derive(Debug, Default)]
pub struct RecordingImages {
    calls: Mutex<Vec<String>>,
}

impl RecordingImages {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageSource for RecordingImages {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        self.calls.lock().unwrap().push(url.to_string());
        Ok(url.as_bytes().to_vec())
    }
}
