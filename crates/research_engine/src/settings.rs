use std::time::Duration;

use url::Url;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5001";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub server_url: String,
    pub connect_timeout: Duration,
    /// Applies to every request except the progress stream, which stays open
    /// for as long as the backend keeps it open.
    pub request_timeout: Duration,
    /// Reconnect attempts after a transport failure; 0 surfaces the first failure.
    pub max_reconnects: u32,
    /// Delay before the first reconnect; doubles on every further attempt.
    pub reconnect_backoff: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_reconnects: 0,
            reconnect_backoff: Duration::from_millis(500),
        }
    }
}

impl ClientSettings {
    /// Backoff before reconnect `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.reconnect_backoff.saturating_mul(factor)
    }

    pub(crate) fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(self.server_url.trim())
    }
}
