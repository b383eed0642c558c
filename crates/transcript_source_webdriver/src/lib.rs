//! Browser-backed implementation of the shared `transcript_source` contract.
//!
//! The adapter drives a live chat tab through `webdriver_client`, mapping
//! assistant message containers in the page DOM onto contract messages. It
//! owns every selector and the clipboard-based snippet extraction flow; wire
//! plumbing stays in the client crate.

use std::thread;
use std::time::Duration;

use serde_json::Value;
use transcript_source::{Message, SourceError, TranscriptSource};
use webdriver_client::{ElementHandle, WebDriverClient, WebDriverConfig, WebDriverError};

/// Stable source identifier used for explicit startup selection.
pub const WEBDRIVER_SOURCE_ID: &str = "webdriver";

/// Assistant-authored message containers, in document order.
const ASSISTANT_MESSAGE_SELECTOR: &str = r#"div[data-message-author-role="assistant"]"#;
/// Attribute carrying the stable per-message id.
const MESSAGE_ID_ATTRIBUTE: &str = "data-message-id";
/// Rendered markdown body inside a message container.
const MESSAGE_BODY_SELECTOR: &str = "div.markdown";
/// Fenced code blocks inside a message container, in document order.
const CODE_BLOCK_SELECTOR: &str = "pre";
/// Raw code text inside one fenced block.
const CODE_TEXT_SELECTOR: &str = "code";
/// Copy-to-clipboard control attached to one fenced block.
const COPY_BUTTON_SELECTOR: &str = "button";
/// Composer input receiving outgoing text.
const COMPOSER_SELECTOR: &str = "#prompt-textarea";
/// Submit control next to the composer.
const SEND_BUTTON_SELECTOR: &str = r#"button[data-testid="send-button"]"#;

/// Async clipboard read; resolves null when the page denies access.
const CLIPBOARD_READ_SCRIPT: &str = "const done = arguments[arguments.length - 1]; \
     navigator.clipboard.readText().then(done).catch(() => done(null));";

/// Runtime configuration for the browser-backed source.
///
/// `debugger_address` and `server_url` default to the values baked into
/// `webdriver_client` when unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebDriverSourceConfig {
    /// Conversation page the session navigates to on connect.
    pub conversation_url: String,
    pub server_url: Option<String>,
    pub debugger_address: Option<String>,
    /// Wait between clicking a copy control and reading the clipboard.
    pub snippet_delay: Duration,
    pub timeout: Option<Duration>,
}

impl WebDriverSourceConfig {
    #[must_use]
    pub fn new(conversation_url: impl Into<String>) -> Self {
        Self {
            conversation_url: conversation_url.into(),
            server_url: None,
            debugger_address: None,
            snippet_delay: Duration::from_millis(500),
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = Some(server_url.into());
        self
    }

    #[must_use]
    pub fn with_debugger_address(mut self, debugger_address: impl Into<String>) -> Self {
        self.debugger_address = Some(debugger_address.into());
        self
    }

    #[must_use]
    pub fn with_snippet_delay(mut self, snippet_delay: Duration) -> Self {
        self.snippet_delay = snippet_delay;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn into_webdriver_config(self) -> WebDriverConfig {
        let mut config = match self.debugger_address {
            Some(debugger_address) => WebDriverConfig::new(debugger_address),
            None => WebDriverConfig::default(),
        };
        if let Some(server_url) = self.server_url {
            config = config.with_server_url(server_url);
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        config
    }
}

/// Narrow view of the driver commands the adapter issues.
///
/// Production code goes through `WebDriverClient`; tests substitute a
/// scripted DOM.
trait DomClient {
    fn find_elements(&mut self, css: &str) -> Result<Vec<ElementHandle>, WebDriverError>;
    fn find_elements_within(
        &mut self,
        element: &ElementHandle,
        css: &str,
    ) -> Result<Vec<ElementHandle>, WebDriverError>;
    fn element_text(&mut self, element: &ElementHandle) -> Result<String, WebDriverError>;
    fn element_attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, WebDriverError>;
    fn click(&mut self, element: &ElementHandle) -> Result<(), WebDriverError>;
    fn send_keys(&mut self, element: &ElementHandle, text: &str)
        -> Result<(), WebDriverError>;
    fn execute_async(&mut self, script: &str, args: Vec<Value>)
        -> Result<Value, WebDriverError>;
    fn close(&mut self) -> Result<(), WebDriverError>;
}

struct LiveDomClient {
    client: WebDriverClient,
}

impl DomClient for LiveDomClient {
    fn find_elements(&mut self, css: &str) -> Result<Vec<ElementHandle>, WebDriverError> {
        self.client.find_elements(css)
    }

    fn find_elements_within(
        &mut self,
        element: &ElementHandle,
        css: &str,
    ) -> Result<Vec<ElementHandle>, WebDriverError> {
        self.client.find_elements_within(element, css)
    }

    fn element_text(&mut self, element: &ElementHandle) -> Result<String, WebDriverError> {
        self.client.element_text(element)
    }

    fn element_attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, WebDriverError> {
        self.client.element_attribute(element, name)
    }

    fn click(&mut self, element: &ElementHandle) -> Result<(), WebDriverError> {
        self.client.click(element)
    }

    fn send_keys(
        &mut self,
        element: &ElementHandle,
        text: &str,
    ) -> Result<(), WebDriverError> {
        self.client.send_keys(element, text)
    }

    fn execute_async(
        &mut self,
        script: &str,
        args: Vec<Value>,
    ) -> Result<Value, WebDriverError> {
        self.client.execute_async(script, args)
    }

    fn close(&mut self) -> Result<(), WebDriverError> {
        self.client.close()
    }
}

/// `TranscriptSource` over a WebDriver session attached to a live chat tab.
pub struct WebDriverSource {
    dom: Box<dyn DomClient>,
    snippet_delay: Duration,
}

impl WebDriverSource {
    /// Attaches to the configured browser and navigates to the conversation.
    pub fn connect(config: WebDriverSourceConfig) -> Result<Self, SourceError> {
        let conversation_url = config.conversation_url.clone();
        let snippet_delay = config.snippet_delay;
        let mut client =
            WebDriverClient::new(config.into_webdriver_config()).map_err(map_driver_error)?;
        client.attach().map_err(map_driver_error)?;
        client.navigate(&conversation_url).map_err(map_driver_error)?;
        Ok(Self {
            dom: Box::new(LiveDomClient { client }),
            snippet_delay,
        })
    }

    fn message_container(&mut self, id: &str) -> Result<ElementHandle, SourceError> {
        let selector = message_selector(id);
        let found = self
            .dom
            .find_elements(&selector)
            .map_err(map_driver_error)?;
        found
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::unknown_message(id))
    }

    fn body_text(&mut self, container: &ElementHandle) -> Result<String, SourceError> {
        let bodies = self
            .dom
            .find_elements_within(container, MESSAGE_BODY_SELECTOR)
            .map_err(map_driver_error)?;
        // Containers without a markdown body (for example pure tool output)
        // fall back to their own visible text.
        let target = bodies.into_iter().next();
        match target {
            Some(body) => self.dom.element_text(&body).map_err(map_driver_error),
            None => self.dom.element_text(container).map_err(map_driver_error),
        }
    }

    fn first_match(&mut self, selector: &str, what: &str) -> Result<ElementHandle, SourceError> {
        let found = self.dom.find_elements(selector).map_err(map_driver_error)?;
        found
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::transport(format!("{what} not found ({selector})")))
    }
}

impl TranscriptSource for WebDriverSource {
    fn fetch_messages(&mut self) -> Result<Vec<Message>, SourceError> {
        let containers = self
            .dom
            .find_elements(ASSISTANT_MESSAGE_SELECTOR)
            .map_err(map_driver_error)?;
        let mut messages = Vec::with_capacity(containers.len());
        for container in containers {
            let id = self
                .dom
                .element_attribute(&container, MESSAGE_ID_ATTRIBUTE)
                .map_err(map_driver_error)?;
            // A container without an id is still streaming in; it shows up
            // on a later sweep once the page assigns one.
            let Some(id) = id else {
                continue;
            };
            let text = self.body_text(&container)?;
            messages.push(Message::new(id, text));
        }
        Ok(messages)
    }

    fn message_text(&mut self, id: &str) -> Result<String, SourceError> {
        let container = self.message_container(id)?;
        self.body_text(&container)
    }

    fn copy_snippet(&mut self, id: &str, index: usize) -> Result<String, SourceError> {
        let container = self.message_container(id)?;
        let blocks = self
            .dom
            .find_elements_within(&container, CODE_BLOCK_SELECTOR)
            .map_err(map_driver_error)?;
        let Some(block) = blocks.get(index) else {
            return Err(SourceError::missing_snippet(id, index));
        };

        let buttons = self
            .dom
            .find_elements_within(block, COPY_BUTTON_SELECTOR)
            .map_err(map_driver_error)?;
        if let Some(button) = buttons.first() {
            self.dom.click(button).map_err(map_driver_error)?;
            thread::sleep(self.snippet_delay);
            let clipboard = self
                .dom
                .execute_async(CLIPBOARD_READ_SCRIPT, Vec::new())
                .map_err(map_driver_error)?;
            if let Some(text) = clipboard.as_str() {
                if !text.is_empty() {
                    return Ok(text.to_string());
                }
            }
        }

        // No copy control, or the clipboard read came back empty: take the
        // rendered code text instead.
        let code = self
            .dom
            .find_elements_within(block, CODE_TEXT_SELECTOR)
            .map_err(map_driver_error)?;
        let target = code.first().unwrap_or(block);
        self.dom.element_text(target).map_err(map_driver_error)
    }

    fn send_text(&mut self, text: &str) -> Result<(), SourceError> {
        let composer = self.first_match(COMPOSER_SELECTOR, "composer")?;
        self.dom
            .send_keys(&composer, text)
            .map_err(map_driver_error)?;
        let send_button = self.first_match(SEND_BUTTON_SELECTOR, "send button")?;
        self.dom.click(&send_button).map_err(map_driver_error)
    }

    /// Ends the browser session. Later commands fail until reconnected.
    fn close(&mut self) -> Result<(), SourceError> {
        self.dom.close().map_err(map_driver_error)
    }
}

/// Builds the attribute selector matching one message container by id.
fn message_selector(id: &str) -> String {
    let escaped = id.replace('\\', "\\\\").replace('"', "\\\"");
    format!(r#"div[{MESSAGE_ID_ATTRIBUTE}="{escaped}"]"#)
}

/// Classifies driver failures into the contract error taxonomy.
///
/// Stale references mean the page re-rendered under us and the next sweep
/// gets fresh handles, so they map to the transient `Stale` class rather
/// than a hard transport failure.
fn map_driver_error(error: WebDriverError) -> SourceError {
    if error.is_stale_element() {
        SourceError::stale(error.to_string())
    } else if error.is_timeout() {
        SourceError::timeout(error.to_string())
    } else {
        SourceError::transport(error.to_string())
    }
}
