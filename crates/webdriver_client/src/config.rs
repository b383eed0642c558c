use std::time::Duration;

use crate::url::DEFAULT_WEBDRIVER_URL;

/// Default Chrome remote-debugging socket the session attaches to.
pub const DEFAULT_DEBUGGER_ADDRESS: &str = "localhost:9333";

/// Connection settings for one WebDriver session.
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    /// WebDriver server endpoint.
    pub server_url: String,
    /// `host:port` of an already-running Chrome debugging socket. The
    /// session attaches to that browser instead of launching one.
    pub debugger_address: String,
    /// Optional per-request timeout.
    pub timeout: Option<Duration>,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_WEBDRIVER_URL.to_string(),
            debugger_address: DEFAULT_DEBUGGER_ADDRESS.to_string(),
            timeout: None,
        }
    }
}

impl WebDriverConfig {
    pub fn new(debugger_address: impl Into<String>) -> Self {
        Self {
            debugger_address: debugger_address.into(),
            ..Self::default()
        }
    }

    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = server_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
