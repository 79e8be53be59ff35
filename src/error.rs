use thiserror::Error;

#[derive(Error, Debug)]
pub enum StarseekError {
    #[error("Search term must be at least {min} characters")]
    QueryTooShort { min: usize },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("Could not open browser: {0}")]
    Browser(String),
}

pub type Result<T> = std::result::Result<T, StarseekError>;
