use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub api_url: String,
    /// Qualifier appended to every search, e.g. `language:Kotlin`.
    pub filter: String,
    pub page_size: usize,
    pub min_query_len: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            filter: "language:Kotlin".to_string(),
            page_size: 30,
            min_query_len: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    pub cache_capacity: usize,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self { cache_capacity: 16 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token_env: Option<String>,
    pub token_command: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_env: Some("GITHUB_TOKEN".to_string()),
            token_command: Some("gh auth token".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub avatars: AvatarConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

fn config_path() -> Option<PathBuf> {
    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("starseek").join("config.toml"))
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    /// A missing or unreadable file yields the defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match config_path() {
                Some(p) => p,
                None => return Config::default(),
            },
        };

        let Ok(content) = std::fs::read_to_string(&path) else {
            return Config::default();
        };

        match Self::parse(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring malformed config file");
                Config::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(content)?;
        Ok(config.normalized())
    }

    fn normalized(mut self) -> Self {
        self.search.page_size = self.search.page_size.clamp(1, MAX_PAGE_SIZE);
        self.avatars.cache_capacity = self.avatars.cache_capacity.max(1);
        self
    }
}
