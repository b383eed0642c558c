use transcript_source::TranscriptSource;
use transcript_source_mock::{MockSource, MOCK_SOURCE_ID};
use transcript_source_webdriver::{WebDriverSource, WebDriverSourceConfig, WEBDRIVER_SOURCE_ID};

use crate::config::WatcherConfig;

pub const DEFAULT_SOURCE_ID: &str = MOCK_SOURCE_ID;
pub const SOURCE_ENV_VAR: &str = "CHAT_SCRIBE_SOURCE";

/// Resolves the transcript source, letting the environment override the
/// configured id.
pub fn source_from_env(config: &WatcherConfig) -> Result<Box<dyn TranscriptSource>, String> {
    let source_id = std::env::var(SOURCE_ENV_VAR)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    source_for_id(source_id.as_deref().unwrap_or(&config.source), config)
}

pub fn source_for_id(
    source_id: &str,
    config: &WatcherConfig,
) -> Result<Box<dyn TranscriptSource>, String> {
    match source_id {
        // An unscripted mock serves an empty transcript forever, which makes
        // the default a safe dry run.
        MOCK_SOURCE_ID => Ok(Box::new(MockSource::new())),
        WEBDRIVER_SOURCE_ID => {
            let conversation_url = config.conversation_url.as_deref().ok_or_else(|| {
                "webdriver source requires conversation_url in the config".to_string()
            })?;

            let mut source_config = WebDriverSourceConfig::new(conversation_url)
                .with_snippet_delay(config.snippet_delay());
            if let Some(url) = &config.server_url {
                source_config = source_config.with_server_url(url);
            }
            if let Some(address) = &config.debugger_address {
                source_config = source_config.with_debugger_address(address);
            }

            let source = WebDriverSource::connect(source_config)
                .map_err(|error| format!("failed to connect webdriver source: {error}"))?;
            Ok(Box::new(source))
        }
        unknown => Err(format!(
            "Unsupported source '{unknown}'. Available sources: {MOCK_SOURCE_ID}, {WEBDRIVER_SOURCE_ID}"
        )),
    }
}
