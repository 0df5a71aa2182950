//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:3001/api";
pub const DEFAULT_STATE_DIR: &str = ".articlehub";
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the backend lives, where the session is persisted, and how long
/// network calls may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL every request path is appended to (e.g. `https://host/api`).
    pub base_url: String,
    /// Directory holding the persisted token and user.
    pub state_dir: PathBuf,
    /// Upper bound on the single-flight refresh call.
    pub refresh_timeout: Duration,
    /// Upper bound on any other request.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Build from `ARTICLEHUB_*` environment variables, falling back to
    /// defaults (with a warning) when a value is missing or unparsable.
    pub fn from_env() -> Self {
        let base_url = std::env::var("ARTICLEHUB_API_URL").unwrap_or_else(|_| {
            tracing::warn!(default = DEFAULT_API_URL, "ARTICLEHUB_API_URL not set; using local dev backend");
            DEFAULT_API_URL.to_string()
        });

        let mut config = Self::new(base_url);
        if let Ok(dir) = std::env::var("ARTICLEHUB_STATE_DIR") {
            config.state_dir = PathBuf::from(dir);
        }
        config.refresh_timeout =
            duration_from_env("ARTICLEHUB_REFRESH_TIMEOUT_MS", DEFAULT_REFRESH_TIMEOUT);
        config.request_timeout =
            duration_from_env("ARTICLEHUB_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT);
        config
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn duration_from_env(var: &str, default: Duration) -> Duration {
    match std::env::var(var) {
        Ok(raw) => parse_millis(&raw).unwrap_or_else(|| {
            tracing::warn!(var, value = %raw, "invalid millisecond value; using default");
            default
        }),
        Err(_) => default,
    }
}

fn parse_millis(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_dropped_from_base_url() {
        let config = ClientConfig::new("https://cms.example.com/api/");
        assert_eq!(config.base_url, "https://cms.example.com/api");
    }

    #[test]
    fn millisecond_parsing_rejects_zero_and_garbage() {
        assert_eq!(parse_millis("1500"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_millis("0"), None);
        assert_eq!(parse_millis("soon"), None);
    }
}
