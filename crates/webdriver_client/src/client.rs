use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::WebDriverConfig;
use crate::error::{parse_command_error, WebDriverError};
use crate::payload::{
    ElementValue, ExecuteRequest, LocatorRequest, NavigateRequest, NewSessionRequest,
    NewSessionValue, SendKeysRequest, ValueResponse,
};
use crate::url::normalize_server_url;

/// Opaque reference to a located element.
///
/// A handle stays valid only while the element remains attached to the
/// document; commands against a detached handle fail with a stale-element
/// command error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle(String);

impl ElementHandle {
    /// Wraps a raw element reference as minted by the server.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Returns the raw element reference.
    #[must_use]
    pub fn reference(&self) -> &str {
        &self.0
    }
}

/// Blocking W3C WebDriver client scoped to one session.
#[derive(Debug)]
pub struct WebDriverClient {
    http: Client,
    server_url: String,
    session_id: Option<String>,
    config: WebDriverConfig,
}

impl WebDriverClient {
    /// Builds the HTTP client. No request is made until `attach`.
    pub fn new(config: WebDriverConfig) -> Result<Self, WebDriverError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(WebDriverError::from)?;
        let server_url = normalize_server_url(&config.server_url);

        Ok(Self {
            http,
            server_url,
            session_id: None,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &WebDriverConfig {
        &self.config
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Opens a session attached to the configured Chrome debugging address.
    pub fn attach(&mut self) -> Result<(), WebDriverError> {
        let request = NewSessionRequest::attach(self.config.debugger_address.clone());
        let endpoint = format!("{}/session", self.server_url);
        let value: NewSessionValue = self.post(&endpoint, &request)?;
        let session_id = value.session_id.ok_or(WebDriverError::MissingSessionId)?;
        self.session_id = Some(session_id);
        Ok(())
    }

    /// Navigates the attached browser tab to `url`.
    pub fn navigate(&mut self, url: &str) -> Result<(), WebDriverError> {
        let endpoint = self.session_endpoint("url")?;
        let _: Value = self.post(
            &endpoint,
            &NavigateRequest {
                url: url.to_string(),
            },
        )?;
        Ok(())
    }

    /// Returns the URL currently loaded in the attached tab.
    pub fn current_url(&mut self) -> Result<String, WebDriverError> {
        let endpoint = self.session_endpoint("url")?;
        self.get(&endpoint)
    }

    /// Returns every element matching a CSS selector, in document order.
    /// An empty match is a success, not an error.
    pub fn find_elements(&mut self, css: &str) -> Result<Vec<ElementHandle>, WebDriverError> {
        let endpoint = self.session_endpoint("elements")?;
        let values: Vec<ElementValue> = self.post(&endpoint, &LocatorRequest::css(css))?;
        Ok(values.into_iter().map(ElementHandle::from).collect())
    }

    /// Returns the first element matching a CSS selector; fails with a
    /// no-such-element command error when nothing matches.
    pub fn find_element(&mut self, css: &str) -> Result<ElementHandle, WebDriverError> {
        let endpoint = self.session_endpoint("element")?;
        let value: ElementValue = self.post(&endpoint, &LocatorRequest::css(css))?;
        Ok(value.into())
    }

    /// Returns every descendant of `element` matching a CSS selector.
    pub fn find_elements_within(
        &mut self,
        element: &ElementHandle,
        css: &str,
    ) -> Result<Vec<ElementHandle>, WebDriverError> {
        let endpoint = self.element_endpoint(element, "elements")?;
        let values: Vec<ElementValue> = self.post(&endpoint, &LocatorRequest::css(css))?;
        Ok(values.into_iter().map(ElementHandle::from).collect())
    }

    /// Returns the first descendant of `element` matching a CSS selector.
    pub fn find_element_within(
        &mut self,
        element: &ElementHandle,
        css: &str,
    ) -> Result<ElementHandle, WebDriverError> {
        let endpoint = self.element_endpoint(element, "element")?;
        let value: ElementValue = self.post(&endpoint, &LocatorRequest::css(css))?;
        Ok(value.into())
    }

    /// Returns the rendered text of an element.
    pub fn element_text(&mut self, element: &ElementHandle) -> Result<String, WebDriverError> {
        let endpoint = self.element_endpoint(element, "text")?;
        self.get(&endpoint)
    }

    /// Returns an element attribute, `None` when the attribute is absent.
    pub fn element_attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, WebDriverError> {
        let endpoint = self.element_endpoint(element, &format!("attribute/{name}"))?;
        self.get(&endpoint)
    }

    /// Clicks an element.
    pub fn click(&mut self, element: &ElementHandle) -> Result<(), WebDriverError> {
        let endpoint = self.element_endpoint(element, "click")?;
        let _: Value = self.post(&endpoint, &serde_json::json!({}))?;
        Ok(())
    }

    /// Types `text` into an element.
    pub fn send_keys(&mut self, element: &ElementHandle, text: &str) -> Result<(), WebDriverError> {
        let endpoint = self.element_endpoint(element, "value")?;
        let _: Value = self.post(
            &endpoint,
            &SendKeysRequest {
                text: text.to_string(),
            },
        )?;
        Ok(())
    }

    /// Runs a synchronous script in the page and returns its value.
    pub fn execute(&mut self, script: &str, args: Vec<Value>) -> Result<Value, WebDriverError> {
        let endpoint = self.session_endpoint("execute/sync")?;
        self.post(
            &endpoint,
            &ExecuteRequest {
                script: script.to_string(),
                args,
            },
        )
    }

    /// Runs an async script in the page; the script finishes by calling the
    /// callback the protocol appends as its final argument.
    pub fn execute_async(
        &mut self,
        script: &str,
        args: Vec<Value>,
    ) -> Result<Value, WebDriverError> {
        let endpoint = self.session_endpoint("execute/async")?;
        self.post(
            &endpoint,
            &ExecuteRequest {
                script: script.to_string(),
                args,
            },
        )
    }

    /// Ends the session. Safe to call without one; further commands need a
    /// new `attach`.
    pub fn close(&mut self) -> Result<(), WebDriverError> {
        let Some(session_id) = self.session_id.take() else {
            return Ok(());
        };

        let endpoint = format!("{}/session/{session_id}", self.server_url);
        let _: Value = self.delete(&endpoint)?;
        Ok(())
    }

    fn session_endpoint(&self, suffix: &str) -> Result<String, WebDriverError> {
        let session_id = self.session_id.as_deref().ok_or(WebDriverError::NoSession)?;
        Ok(format!("{}/session/{session_id}/{suffix}", self.server_url))
    }

    fn element_endpoint(
        &self,
        element: &ElementHandle,
        suffix: &str,
    ) -> Result<String, WebDriverError> {
        self.session_endpoint(&format!("element/{}/{suffix}", element.0))
    }

    fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T, WebDriverError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(endpoint)
            .json(body)
            .send()
            .map_err(WebDriverError::from)?;
        decode(response)
    }

    fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, WebDriverError> {
        let response = self.http.get(endpoint).send().map_err(WebDriverError::from)?;
        decode(response)
    }

    fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, WebDriverError> {
        let response = self
            .http
            .delete(endpoint)
            .send()
            .map_err(WebDriverError::from)?;
        decode(response)
    }
}

impl From<ElementValue> for ElementHandle {
    fn from(value: ElementValue) -> Self {
        Self(value.reference)
    }
}

fn decode<T: DeserializeOwned>(response: Response) -> Result<T, WebDriverError> {
    let status = response.status();
    let body = response.text().map_err(WebDriverError::from)?;
    if !status.is_success() {
        return Err(parse_command_error(status, &body));
    }

    let envelope: ValueResponse<T> = serde_json::from_str(&body).map_err(WebDriverError::from)?;
    Ok(envelope.value)
}
