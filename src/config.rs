//! Startup configuration.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Names an explicit config file. When set, that file must load; a missing
/// or unparsable document is a startup error.
pub const CONFIG_PATH_ENV: &str = "CHAT_SCRIBE_CONFIG_PATH";

/// Probed in the working directory when no explicit path is given. Absence
/// falls back to built-in defaults.
pub const DEFAULT_CONFIG_FILE: &str = "chat_scribe.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatcherConfig {
    /// Directory every file command resolves against.
    #[serde(default = "default_repo_root")]
    pub repo_root: String,

    /// Key the progress document files this conversation under.
    #[serde(default = "default_conversation")]
    pub conversation: String,

    /// Transcript source started at boot; overridable via environment.
    #[serde(default = "default_source")]
    pub source: String,

    /// Conversation page the webdriver source navigates to.
    #[serde(default)]
    pub conversation_url: Option<String>,

    #[serde(default)]
    pub server_url: Option<String>,

    #[serde(default)]
    pub debugger_address: Option<String>,

    #[serde(default = "default_stability_delay_sec")]
    pub stability_delay_sec: u64,

    #[serde(default = "default_cycle_delay_sec")]
    pub cycle_delay_sec: u64,

    #[serde(default = "default_snippet_delay_ms")]
    pub snippet_delay_ms: u64,

    /// Command run on a file after a successful patch.
    #[serde(default)]
    pub formatter: Option<FormatterConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatterConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_formatter_timeout_sec")]
    pub timeout_sec: u64,
}

fn default_repo_root() -> String {
    ".".to_string()
}

fn default_conversation() -> String {
    "default".to_string()
}

fn default_source() -> String {
    "mock".to_string()
}

fn default_stability_delay_sec() -> u64 {
    1
}

fn default_cycle_delay_sec() -> u64 {
    5
}

fn default_snippet_delay_ms() -> u64 {
    500
}

fn default_formatter_timeout_sec() -> u64 {
    30
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            repo_root: default_repo_root(),
            conversation: default_conversation(),
            source: default_source(),
            conversation_url: None,
            server_url: None,
            debugger_address: None,
            stability_delay_sec: default_stability_delay_sec(),
            cycle_delay_sec: default_cycle_delay_sec(),
            snippet_delay_ms: default_snippet_delay_ms(),
            formatter: None,
        }
    }
}

impl WatcherConfig {
    /// Loads configuration: the file named by `CHAT_SCRIBE_CONFIG_PATH` if
    /// set, else `./chat_scribe.json` if present, else defaults.
    pub fn load() -> Result<Self> {
        if let Some(path) = env_string_opt(CONFIG_PATH_ENV) {
            return Self::from_file(Path::new(&path));
        }

        let probed = Path::new(DEFAULT_CONFIG_FILE);
        if probed.exists() {
            Self::from_file(probed)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    #[must_use]
    pub fn stability_delay(&self) -> Duration {
        Duration::from_secs(self.stability_delay_sec)
    }

    #[must_use]
    pub fn cycle_delay(&self) -> Duration {
        Duration::from_secs(self.cycle_delay_sec)
    }

    #[must_use]
    pub fn snippet_delay(&self) -> Duration {
        Duration::from_millis(self.snippet_delay_ms)
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
