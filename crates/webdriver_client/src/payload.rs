use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Capabilities payload for `POST /session`.
///
/// The only capability this client sends is the Chrome remote-debugging
/// address, which attaches the session to an already-running browser.
#[derive(Debug, Clone, Serialize)]
pub struct NewSessionRequest {
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    #[serde(rename = "alwaysMatch")]
    pub always_match: AlwaysMatch,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlwaysMatch {
    #[serde(rename = "browserName")]
    pub browser_name: String,
    #[serde(rename = "goog:chromeOptions")]
    pub chrome_options: ChromeOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChromeOptions {
    #[serde(rename = "debuggerAddress")]
    pub debugger_address: String,
}

impl NewSessionRequest {
    #[must_use]
    pub fn attach(debugger_address: impl Into<String>) -> Self {
        Self {
            capabilities: Capabilities {
                always_match: AlwaysMatch {
                    browser_name: "chrome".to_string(),
                    chrome_options: ChromeOptions {
                        debugger_address: debugger_address.into(),
                    },
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NewSessionValue {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Generic `{"value": ...}` response envelope.
#[derive(Debug, Deserialize)]
pub struct ValueResponse<T> {
    pub value: T,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavigateRequest {
    pub url: String,
}

/// Element locator; this client only speaks CSS selectors.
#[derive(Debug, Clone, Serialize)]
pub struct LocatorRequest {
    pub using: String,
    pub value: String,
}

impl LocatorRequest {
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            using: "css selector".to_string(),
            value: selector.into(),
        }
    }
}

/// One element reference as the wire protocol tags it.
#[derive(Debug, Clone, Deserialize)]
pub struct ElementValue {
    #[serde(rename = "element-6066-11e4-a52e-4f735466cecf")]
    pub reference: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendKeysRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteRequest {
    pub script: String,
    pub args: Vec<Value>,
}
