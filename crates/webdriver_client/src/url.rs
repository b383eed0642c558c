/// Default WebDriver server endpoint (chromedriver's standalone default).
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Normalize a WebDriver server URL to `scheme://host[:port]`.
///
/// Normalization rules:
/// 1) empty input falls back to the default endpoint
/// 2) trailing slashes are trimmed
/// 3) a bare `host:port` gains an `http://` scheme
pub fn normalize_server_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_WEBDRIVER_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.contains("://") {
        return trimmed.to_string();
    }
    format!("http://{trimmed}")
}
