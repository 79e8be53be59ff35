use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::mpsc;
use tracing::debug;

use crate::action::Action;
use crate::avatar::{Avatar, AvatarPrefetcher, ImageSource};
use crate::config::Config;
use crate::error::{Result, StarseekError};
use crate::event::Event;
use crate::list::{ResultList, Row, SentinelKind};
use crate::search::{Gateway, SearchSource};
use crate::types::RepoSummary;

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Browse,
    Search,
}

pub struct App {
    pub results: ResultList,
    pub input_mode: InputMode,
    pub search_input: String,
    pub selected: usize,
    pub offset: usize,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub should_quit: bool,
    pub filter: String,
    viewport: usize,
    spinner: usize,
    initial_query: Option<String>,
    gateway: Gateway,
    avatars: AvatarPrefetcher,
}

impl App {
    pub fn new(
        config: &Config,
        source: Arc<dyn SearchSource>,
        images: Arc<dyn ImageSource>,
        action_tx: mpsc::UnboundedSender<Action>,
    ) -> Self {
        Self {
            results: ResultList::new(config.search.min_query_len),
            input_mode: InputMode::default(),
            search_input: String::new(),
            selected: 0,
            offset: 0,
            error: None,
            notice: None,
            should_quit: false,
            filter: config.search.filter.clone(),
            viewport: 1,
            spinner: 0,
            initial_query: None,
            gateway: Gateway::new(source, action_tx.clone()),
            avatars: AvatarPrefetcher::new(config.avatars.cache_capacity, images, action_tx),
        }
    }

    /// Search for `term` instead of listing everything on startup.
    pub fn with_initial_query(mut self, term: Option<String>) -> Self {
        self.initial_query = term;
        self
    }

    pub fn handle_event(&self, event: Event) -> Action {
        match event {
            Event::Init => Action::Init,
            Event::Tick => Action::Tick,
            Event::Key(key) => match self.input_mode {
                InputMode::Search => self.handle_search_key(key),
                InputMode::Browse => self.handle_key(key),
            },
            Event::Render => Action::None,
        }
    }

    fn handle_search_key(&self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Esc => Action::CollapseSearch,
            KeyCode::Enter => Action::SearchConfirm,
            KeyCode::Backspace => Action::SearchBackspace,
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                Action::SearchInput(c)
            }
            _ => Action::None,
        }
    }

    fn handle_key(&self, key: KeyEvent) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('d') => Action::PageDown,
                KeyCode::Char('u') => Action::PageUp,
                _ => Action::None,
            };
        }

        match key.code {
            KeyCode::Char('q') => Action::Quit,
            KeyCode::Esc => {
                if self.results.session().active_query().is_everything() {
                    Action::Quit
                } else {
                    Action::CollapseSearch
                }
            }
            KeyCode::Char('j') | KeyCode::Down => Action::ScrollDown,
            KeyCode::Char('k') | KeyCode::Up => Action::ScrollUp,
            KeyCode::PageDown => Action::PageDown,
            KeyCode::PageUp => Action::PageUp,
            KeyCode::Char('g') | KeyCode::Home => Action::GoToTop,
            KeyCode::Char('G') | KeyCode::End => Action::GoToBottom,
            KeyCode::Enter => Action::Select,
            KeyCode::Char('/') => Action::EnterSearchMode,
            KeyCode::Char('r') => Action::Refresh,
            KeyCode::Char('o') => Action::OpenInBrowser,
            KeyCode::Char('y') => Action::YankUrl,
            _ => Action::None,
        }
    }

    pub fn update(&mut self, action: Action) {
        if !matches!(
            action,
            Action::Tick | Action::PageFetched(_) | Action::AvatarFetched { .. } | Action::None
        ) {
            self.error = None;
            self.notice = None;
        }

        match action {
            Action::Quit => {
                self.should_quit = true;
            }
            Action::Init => {
                let request = match self.initial_query.take() {
                    Some(term) => match self.results.start_search(&term) {
                        Ok(request) => request,
                        Err(e) => {
                            self.error = Some(e.to_string());
                            self.results.show_everything()
                        }
                    },
                    None => self.results.show_everything(),
                };
                self.gateway.dispatch(request);
            }
            Action::Tick => {
                self.spinner = self.spinner.wrapping_add(1);
            }
            Action::ScrollUp => {
                self.selected = self.selected.saturating_sub(1);
            }
            Action::ScrollDown => {
                if self.selected + 1 < self.results.row_count() {
                    self.selected += 1;
                }
            }
            Action::PageUp => {
                self.selected = self.selected.saturating_sub(self.viewport);
            }
            Action::PageDown => {
                self.selected = (self.selected + self.viewport).min(self.last_row());
            }
            Action::GoToTop => {
                self.selected = 0;
            }
            Action::GoToBottom => {
                self.selected = self.last_row();
            }
            Action::Select => {
                let follow_up = match self.results.row_at(self.selected) {
                    Some(Row::Repo(_)) => Action::OpenInBrowser,
                    Some(Row::Sentinel(SentinelKind::Retry)) => Action::RetryAfterFailure,
                    Some(Row::Sentinel(SentinelKind::Loading)) | None => Action::None,
                };
                self.update(follow_up);
            }

            Action::EnterSearchMode => {
                self.input_mode = InputMode::Search;
                self.search_input.clear();
            }
            Action::SearchInput(c) => {
                self.search_input.push(c);
            }
            Action::SearchBackspace => {
                self.search_input.pop();
            }
            Action::SearchConfirm => match self.results.start_search(&self.search_input) {
                Ok(request) => {
                    self.input_mode = InputMode::Browse;
                    self.gateway.dispatch(request);
                }
                Err(e) => {
                    debug!(input = %self.search_input, error = %e, "search rejected");
                }
            },
            Action::CollapseSearch => {
                self.input_mode = InputMode::Browse;
                self.search_input.clear();
                if let Some(request) = self.results.collapse_search() {
                    self.gateway.dispatch(request);
                }
            }

            Action::Refresh => {
                let request = self.results.refresh();
                self.gateway.dispatch(request);
            }
            Action::RetryAfterFailure => {
                if let Some(request) = self.results.retry_after_failure() {
                    self.gateway.dispatch(request);
                }
            }
            Action::PageFetched(response) => {
                if let Some(resolution) = self.results.apply(response) {
                    if let Some(message) = resolution.outcome.user_message() {
                        self.error = Some(message.to_string());
                    }
                    if !resolution.continuation {
                        self.selected = 0;
                        self.offset = 0;
                    }
                    self.selected = self.selected.min(self.last_row());
                }
            }
            Action::AvatarFetched { url, result } => {
                self.avatars.complete(url, result);
            }

            Action::OpenInBrowser => {
                if let Some(url) = self.selected_repo().map(|r| r.html_url.clone()) {
                    if let Err(e) = open_url(&url) {
                        self.update(e.into());
                    }
                }
            }
            Action::YankUrl => {
                if let Some(url) = self.selected_repo().map(|r| r.html_url.clone()) {
                    match copy_to_clipboard(&url) {
                        Ok(()) => self.notice = Some(format!("Copied {}", url)),
                        Err(e) => self.update(e.into()),
                    }
                }
            }

            Action::Error(msg) => {
                self.error = Some(msg);
            }
            Action::None => {}
        }
    }

    /// Called before each draw with the number of list rows that fit on
    /// screen. Keeps the selection in view, prefetches avatars for visible
    /// rows and, when the sentinel row is visible, asks for the next page.
    pub fn prepare_frame(&mut self, viewport: usize) {
        self.viewport = viewport.max(1);
        self.selected = self.selected.min(self.last_row());
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if self.selected >= self.offset + self.viewport {
            self.offset = self.selected + 1 - self.viewport;
        }

        let end = (self.offset + self.viewport).min(self.results.row_count());
        let mut avatar_urls = Vec::new();
        let mut sentinel_visible = false;
        for position in self.offset..end {
            match self.results.row_at(position) {
                Some(Row::Repo(repo)) => avatar_urls.push(repo.owner_avatar_url.clone()),
                Some(Row::Sentinel(_)) => sentinel_visible = true,
                None => {}
            }
        }

        self.avatars.prefetch_visible(&avatar_urls);
        if sentinel_visible {
            if let Some(request) = self.results.sentinel_shown() {
                self.gateway.dispatch(request);
            }
        }
    }

    fn last_row(&self) -> usize {
        self.results.row_count().saturating_sub(1)
    }

    pub fn selected_repo(&self) -> Option<&RepoSummary> {
        match self.results.row_at(self.selected) {
            Some(Row::Repo(repo)) => Some(repo),
            _ => None,
        }
    }

    pub fn avatar(&self, url: &str) -> Option<&Avatar> {
        self.avatars.cache().get(url)
    }

    pub fn spinner_frame(&self) -> char {
        SPINNER[self.spinner % SPINNER.len()]
    }

    pub fn is_loading(&self) -> bool {
        self.results.session().state().is_loading()
    }
}

fn open_url(url: &str) -> Result<()> {
    open::that(url).map_err(|e| StarseekError::Browser(e.to_string()))
}

fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| StarseekError::Clipboard(e.to_string()))?;
    clipboard
        .set_text(text.to_string())
        .map_err(|e| StarseekError::Clipboard(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::test_support::{
        avatar_url, page, transport_failure, with_avatars, RecordingImages, ScriptedSource,
    };
    use crate::types::{FetchFailure, Page};

    type Script = Vec<std::result::Result<Page, FetchFailure>>;

    fn app_with(script: Script) -> (App, mpsc::UnboundedReceiver<Action>, Arc<ScriptedSource>) {
        let source = Arc::new(ScriptedSource::new(script));
        let (tx, rx) = mpsc::unbounded_channel();
        let app = App::new(
            &Config::default(),
            source.clone(),
            Arc::new(RecordingImages::default()),
            tx,
        );
        (app, rx, source)
    }

    /// Deliver the next gateway result to the app.
    async fn pump(app: &mut App, rx: &mut mpsc::UnboundedReceiver<Action>) {
        let action = rx.recv().await.expect("gateway response");
        app.update(action);
    }

    /// Let spawned gateway tasks run to completion.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    fn type_search(app: &mut App, term: &str) {
        app.update(Action::EnterSearchMode);
        for c in term.chars() {
            app.update(Action::SearchInput(c));
        }
        app.update(Action::SearchConfirm);
    }

    #[tokio::test]
    async fn init_lists_everything() {
        let (mut app, mut rx, source) = app_with(vec![Ok(page(1, 0..30, 30))]);
        app.update(Action::Init);
        pump(&mut app, &mut rx).await;

        assert_eq!(source.calls(), vec![(String::new(), 1)]);
        assert_eq!(app.results.items().len(), 30);
        assert_eq!(app.results.row_count(), 31);
        assert!(!app.results.is_refreshing());
    }

    #[tokio::test]
    async fn invalid_initial_query_falls_back_to_everything() {
        let (app, mut rx, source) = app_with(vec![Ok(page(1, 0..3, 30))]);
        let mut app = app.with_initial_query(Some("ab".to_string()));
        app.update(Action::Init);
        assert!(app.error.is_some());
        pump(&mut app, &mut rx).await;
        assert_eq!(source.calls(), vec![(String::new(), 1)]);
    }

    #[tokio::test]
    async fn visible_sentinel_loads_next_page_once() {
        let (mut app, mut rx, source) =
            app_with(vec![Ok(page(1, 0..30, 30)), Ok(page(2, 30..42, 30))]);
        app.update(Action::Init);
        pump(&mut app, &mut rx).await;

        app.prepare_frame(40);
        app.prepare_frame(40);
        pump(&mut app, &mut rx).await;
        app.prepare_frame(40);
        settle().await;

        assert_eq!(source.calls(), vec![(String::new(), 1), (String::new(), 2)]);
        assert!(rx.try_recv().is_err());
        assert_eq!(app.results.items().len(), 42);
        assert_eq!(app.results.row_count(), 42);
    }

    #[tokio::test]
    async fn hidden_sentinel_does_not_load() {
        let (mut app, mut rx, source) = app_with(vec![Ok(page(1, 0..30, 30))]);
        app.update(Action::Init);
        pump(&mut app, &mut rx).await;

        app.prepare_frame(10);
        settle().await;
        assert_eq!(source.calls().len(), 1);

        app.update(Action::GoToBottom);
        assert_eq!(app.selected, 30);
        app.prepare_frame(10);
        assert_eq!(app.offset, 21);
        pump(&mut app, &mut rx).await;
        assert_eq!(source.calls()[1], (String::new(), 2));
    }

    #[tokio::test]
    async fn short_search_is_ignored() {
        let (mut app, _rx, source) = app_with(vec![]);
        type_search(&mut app, "xy");
        settle().await;

        assert_eq!(app.input_mode, InputMode::Search);
        assert!(app.error.is_none());
        assert!(source.calls().is_empty());
        assert!(!app.results.session().is_in_flight());
    }

    #[tokio::test]
    async fn search_then_collapse() {
        let (mut app, mut rx, source) = app_with(vec![
            Ok(page(1, 0..30, 30)),
            Ok(page(1, 100..110, 30)),
            Ok(page(1, 0..30, 30)),
        ]);
        app.update(Action::Init);
        pump(&mut app, &mut rx).await;

        type_search(&mut app, "ktor");
        assert_eq!(app.input_mode, InputMode::Browse);
        pump(&mut app, &mut rx).await;
        assert_eq!(app.results.items().len(), 10);

        app.update(Action::CollapseSearch);
        pump(&mut app, &mut rx).await;
        assert_eq!(
            source.calls(),
            vec![
                (String::new(), 1),
                ("ktor".to_string(), 1),
                (String::new(), 1)
            ]
        );
        assert_eq!(app.results.items().len(), 30);
    }

    #[tokio::test]
    async fn superseded_search_only_settles_latest() {
        let (mut app, mut rx, _source) =
            app_with(vec![Ok(page(1, 0..30, 30)), Ok(page(1, 50..53, 30))]);
        type_search(&mut app, "aaa");
        type_search(&mut app, "bbb");
        pump(&mut app, &mut rx).await;
        pump(&mut app, &mut rx).await;

        assert_eq!(app.results.session().settled_query().term(), "bbb");
        assert!(!app.results.is_refreshing());
    }

    #[tokio::test]
    async fn failed_first_load_shows_hint_and_message() {
        let (mut app, mut rx, _source) = app_with(vec![Err(transport_failure(Some(500)))]);
        app.update(Action::Init);
        pump(&mut app, &mut rx).await;

        assert!(app.results.should_show_empty_hint());
        assert_eq!(
            app.error.as_deref(),
            Some("Network error while searching repositories")
        );
    }

    #[tokio::test]
    async fn rate_limit_has_its_own_message() {
        let (mut app, mut rx, _source) = app_with(vec![Err(transport_failure(Some(403)))]);
        app.update(Action::Init);
        pump(&mut app, &mut rx).await;

        assert_eq!(
            app.error.as_deref(),
            Some("GitHub API rate limit reached, try again later")
        );
    }

    #[tokio::test]
    async fn select_on_retry_row_reloads_page() {
        let (mut app, mut rx, source) = app_with(vec![
            Ok(page(1, 0..30, 30)),
            Err(transport_failure(None)),
            Ok(page(2, 30..35, 30)),
        ]);
        app.update(Action::Init);
        pump(&mut app, &mut rx).await;
        app.prepare_frame(40);
        pump(&mut app, &mut rx).await;

        assert_eq!(app.results.items().len(), 30);
        assert_eq!(
            app.results.row_at(30),
            Some(Row::Sentinel(SentinelKind::Retry))
        );

        // The retry row does not fire on its own.
        app.prepare_frame(40);
        settle().await;
        assert_eq!(source.calls().len(), 2);

        app.update(Action::GoToBottom);
        app.update(Action::Select);
        pump(&mut app, &mut rx).await;
        assert_eq!(source.calls()[2], (String::new(), 2));
        assert_eq!(app.results.items().len(), 35);
        assert!(app.error.is_none());
    }

    #[tokio::test]
    async fn error_clears_on_next_key_action() {
        let (mut app, mut rx, _source) = app_with(vec![Err(transport_failure(None))]);
        app.update(Action::Init);
        pump(&mut app, &mut rx).await;
        assert!(app.error.is_some());

        app.update(Action::Tick);
        assert!(app.error.is_some());
        app.update(Action::ScrollDown);
        assert!(app.error.is_none());
    }

    #[test]
    fn esc_quits_when_unfiltered() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let app = App::new(
            &Config::default(),
            Arc::new(ScriptedSource::default()),
            Arc::new(RecordingImages::default()),
            tx,
        );
        let esc = Event::Key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
        assert!(matches!(app.handle_event(esc), Action::Quit));
    }

    #[test]
    fn search_mode_routes_characters_to_input() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(
            &Config::default(),
            Arc::new(ScriptedSource::default()),
            Arc::new(RecordingImages::default()),
            tx,
        );
        app.update(Action::EnterSearchMode);

        let q = Event::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE));
        assert!(matches!(app.handle_event(q), Action::SearchInput('q')));
        let esc = Event::Key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
        assert!(matches!(app.handle_event(esc), Action::CollapseSearch));
    }

    #[tokio::test]
    async fn steady_frames_do_not_refetch_avatars() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(with_avatars(page(1, 0..30, 30)))]));
        let images = Arc::new(RecordingImages::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut app = App::new(&Config::default(), source, images.clone(), tx);
        app.update(Action::Init);
        pump(&mut app, &mut rx).await;

        // 20 visible rows against the default 16-entry avatar store
        app.prepare_frame(20);
        for _ in 0..20 {
            pump(&mut app, &mut rx).await;
        }
        for _ in 0..5 {
            app.prepare_frame(20);
        }
        settle().await;

        assert_eq!(images.calls().len(), 20);
        assert!(rx.try_recv().is_err());
        assert!((0..20).all(|n| matches!(app.avatar(&avatar_url(n)), Some(Avatar::Ready(_)))));
    }

    #[tokio::test]
    async fn scrolling_fetches_avatars_for_new_rows_only() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(with_avatars(page(1, 0..30, 30)))]));
        let images = Arc::new(RecordingImages::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut app = App::new(&Config::default(), source, images.clone(), tx);
        app.update(Action::Init);
        pump(&mut app, &mut rx).await;

        app.prepare_frame(20);
        app.selected = 25;
        app.prepare_frame(20);
        settle().await;

        assert_eq!(app.offset, 6);
        let calls = images.calls();
        assert_eq!(calls.len(), 26);
        assert!(calls.contains(&avatar_url(25)));
        assert!(!calls.contains(&avatar_url(26)));
    }
}