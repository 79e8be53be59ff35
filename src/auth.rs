use tracing::debug;

use crate::config::AuthConfig;

/// Try to run a CLI command and capture stdout as a token
fn try_cli_token(command: &str) -> Option<String> {
    let output = std::process::Command::new("sh")
        .args(["-c", command])
        .output()
        .ok()?;

    if output.status.success() {
        non_empty(String::from_utf8_lossy(&output.stdout).as_ref())
    } else {
        None
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let token = raw.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Find an API token, trying in order:
/// 1. The configured environment variable
/// 2. The configured CLI command
///
/// Search works without a token, just with a much lower rate limit, so
/// `None` is not an error.
pub fn load_token(auth: &AuthConfig) -> Option<String> {
    if let Some(env_var) = &auth.token_env {
        if let Some(token) = std::env::var(env_var).ok().as_deref().and_then(non_empty) {
            debug!(source = %env_var, "using token from environment");
            return Some(token);
        }
    }

    if let Some(cmd) = &auth.token_command {
        if let Some(token) = try_cli_token(cmd) {
            debug!(command = %cmd, "using token from command");
            return Some(token);
        }
    }

    debug!("no token found, searching unauthenticated");
    None
}
