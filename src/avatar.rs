use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::debug;

use crate::action::Action;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Avatar {
    Pending,
    Ready(Vec<u8>),
    Failed,
}

static PENDING: Avatar = Avatar::Pending;

/// Where avatar bytes come from.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, String>;
}

/// Plain HTTP GET of the avatar URL.
#[derive(Debug, Default)]
pub struct HttpImages {
    client: Client,
}

#[async_trait]
impl ImageSource for HttpImages {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;
        let bytes = response.bytes().await.map_err(|e| e.to_string())?;
        Ok(bytes.to_vec())
    }
}

/// Bounded avatar store keyed by URL.
///
/// Finished fetches live in an LRU; requests still in flight and the URLs
/// on screen during the last frame are tracked separately, so a URL is
/// fetched once when it scrolls into view and not again while it stays
/// there.
#[derive(Debug)]
pub struct AvatarCache {
    entries: LruCache<String, Avatar>,
    in_flight: HashSet<String>,
    visible: HashSet<String>,
}

impl AvatarCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            in_flight: HashSet::new(),
            visible: HashSet::new(),
        }
    }

    /// Record the avatar URLs of the rows now on screen and return those
    /// that need a fetch: newly visible, nothing stored, nothing in flight.
    ///
    /// The store grows to hold at least one screenful.
    pub fn show(&mut self, urls: &[String]) -> Vec<String> {
        if let Some(needed) = NonZeroUsize::new(urls.len()) {
            if needed > self.entries.cap() {
                self.entries.resize(needed);
            }
        }

        let mut visible = HashSet::with_capacity(urls.len());
        let mut wanted = Vec::new();
        for url in urls {
            if url.is_empty() || !visible.insert(url.clone()) {
                continue;
            }
            // get() also bumps recency for rows that stay on screen
            let stored = self.entries.get(url).is_some();
            if stored || self.visible.contains(url) || self.in_flight.contains(url) {
                continue;
            }
            self.in_flight.insert(url.clone());
            wanted.push(url.clone());
        }
        self.visible = visible;
        wanted
    }

    pub fn complete(&mut self, url: String, result: Result<Vec<u8>, String>) {
        self.in_flight.remove(&url);
        let avatar = match result {
            Ok(bytes) => Avatar::Ready(bytes),
            Err(e) => {
                debug!(%url, error = %e, "avatar fetch failed");
                Avatar::Failed
            }
        };
        self.entries.put(url, avatar);
    }

    /// Look up without touching recency.
    pub fn get(&self, url: &str) -> Option<&Avatar> {
        match self.entries.peek(url) {
            Some(avatar) => Some(avatar),
            None if self.in_flight.contains(url) => Some(&PENDING),
            None => None,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Fetches avatars for rows as they scroll into view.
pub struct AvatarPrefetcher {
    cache: AvatarCache,
    images: Arc<dyn ImageSource>,
    action_tx: mpsc::UnboundedSender<Action>,
}

impl AvatarPrefetcher {
    pub fn new(
        capacity: usize,
        images: Arc<dyn ImageSource>,
        action_tx: mpsc::UnboundedSender<Action>,
    ) -> Self {
        Self {
            cache: AvatarCache::new(capacity),
            images,
            action_tx,
        }
    }

    pub fn cache(&self) -> &AvatarCache {
        &self.cache
    }

    /// Start fetches for the visible rows' avatars that need one.
    pub fn prefetch_visible(&mut self, urls: &[String]) {
        let wanted = self.cache.show(urls);
        if !wanted.is_empty() {
            debug!(count = wanted.len(), "prefetching avatars");
        }

        for url in wanted {
            let tx = self.action_tx.clone();
            let images = Arc::clone(&self.images);
            tokio::spawn(async move {
                let result = images.fetch(&url).await;
                tx.send(Action::AvatarFetched { url, result }).ok();
            });
        }
    }

    pub fn complete(&mut self, url: String, result: Result<Vec<u8>, String>) {
        self.cache.complete(url, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(range: std::ops::Range<u32>) -> Vec<String> {
        range.map(|i| format!("https://avatars/{}", i)).collect()
    }

    /// Show `visible` once and complete every fetch it started.
    fn frame(cache: &mut AvatarCache, visible: &[String]) -> usize {
        let wanted = cache.show(visible);
        let started = wanted.len();
        for url in wanted {
            cache.complete(url, Ok(vec![1]));
        }
        started
    }

    #[test]
    fn steady_screen_fetches_once() {
        let mut cache = AvatarCache::new(16);
        let screen = urls(0..20);

        let started: Vec<usize> = (0..5).map(|_| frame(&mut cache, &screen)).collect();

        assert_eq!(started, vec![20, 0, 0, 0, 0]);
        assert!(screen
            .iter()
            .all(|url| matches!(cache.get(url), Some(Avatar::Ready(_)))));
    }

    #[test]
    fn in_flight_is_not_restarted() {
        let mut cache = AvatarCache::new(4);
        let screen = urls(0..2);
        assert_eq!(cache.show(&screen).len(), 2);
        assert_eq!(cache.get("https://avatars/0"), Some(&Avatar::Pending));

        cache.show(&[]);
        assert!(cache.show(&screen).is_empty());

        cache.complete("https://avatars/0".into(), Ok(vec![1, 2, 3]));
        assert_eq!(
            cache.get("https://avatars/0"),
            Some(&Avatar::Ready(vec![1, 2, 3]))
        );
    }

    #[test]
    fn scrolling_fetches_only_new_rows() {
        let mut cache = AvatarCache::new(16);
        frame(&mut cache, &urls(0..10));
        assert_eq!(frame(&mut cache, &urls(3..13)), 3);
    }

    #[test]
    fn failed_avatar_is_not_refetched_while_stored() {
        let mut cache = AvatarCache::new(1);
        let a = urls(0..1);
        let b = urls(1..2);
        assert_eq!(cache.show(&a).len(), 1);
        cache.complete(a[0].clone(), Err("404".into()));
        assert_eq!(cache.get(&a[0]), Some(&Avatar::Failed));

        cache.show(&[]);
        assert!(cache.show(&a).is_empty());

        frame(&mut cache, &b);
        assert_eq!(frame(&mut cache, &a), 1);
    }

    #[test]
    fn empty_and_duplicate_urls_are_ignored() {
        let mut cache = AvatarCache::new(4);
        let wanted = cache.show(&[String::new(), "https://a".into(), "https://a".into()]);
        assert_eq!(wanted, vec!["https://a".to_string()]);
    }

    #[test]
    fn capacity_is_bounded_off_screen() {
        let mut cache = AvatarCache::new(16);
        for i in 0..40 {
            frame(&mut cache, &urls(i..i + 1));
        }
        assert_eq!(cache.len(), 16);
        assert!(cache.get("https://avatars/0").is_none());
        assert!(cache.get("https://avatars/39").is_some());
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        let mut cache = AvatarCache::new(0);
        frame(&mut cache, &urls(0..1));
        frame(&mut cache, &urls(1..2));
        assert_eq!(cache.len(), 1);
    }
}
