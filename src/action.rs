use crate::error::StarseekError;
use crate::search::FetchResponse;

#[derive(Debug, Clone)]
pub enum Action {
    Quit,
    Init,
    Tick,
    ScrollUp,
    ScrollDown,
    PageUp,
    PageDown,
    GoToTop,
    GoToBottom,
    Select,

    // Search input
    EnterSearchMode,
    SearchInput(char),
    SearchBackspace,
    SearchConfirm,
    CollapseSearch,

    // Loading
    Refresh,
    RetryAfterFailure,
    PageFetched(FetchResponse),
    AvatarFetched {
        url: String,
        result: Result<Vec<u8>, String>,
    },

    OpenInBrowser,
    YankUrl,

    Error(String),
    None,
}

impl From<StarseekError> for Action {
    fn from(err: StarseekError) -> Self {
        Action::Error(err.to_string())
    }
}
