use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Error as JsonError;

#[derive(Debug)]
pub enum WebDriverError {
    /// A command was issued before `attach` opened a session.
    NoSession,
    /// The server response carried no session id.
    MissingSessionId,
    Request(reqwest::Error),
    /// Protocol-level failure decoded from the server's error payload.
    Command {
        status: StatusCode,
        error: String,
        message: String,
    },
    Serde(JsonError),
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub value: ErrorValue,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorValue {
    pub error: String,
    pub message: String,
}

impl WebDriverError {
    /// Returns true when the command failed because a previously located
    /// element detached from the document.
    #[must_use]
    pub fn is_stale_element(&self) -> bool {
        matches!(self, Self::Command { error, .. } if error == "stale element reference")
    }

    /// Returns true when the command failed because no element matched.
    #[must_use]
    pub fn is_no_such_element(&self) -> bool {
        matches!(self, Self::Command { error, .. } if error == "no such element")
    }

    /// Returns true for command or transport deadline failures.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Command { error, .. } => error == "timeout" || error == "script timeout",
            Self::Request(error) => error.is_timeout(),
            _ => false,
        }
    }
}

impl fmt::Display for WebDriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSession => write!(f, "no active WebDriver session"),
            Self::MissingSessionId => write!(f, "server response carried no session id"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Command {
                status,
                error,
                message,
            } => write!(f, "HTTP {status} {error}: {message}"),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
        }
    }
}

impl std::error::Error for WebDriverError {}

impl From<reqwest::Error> for WebDriverError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for WebDriverError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

/// Decodes a non-2xx response body into a command error.
///
/// Falls back to the raw body (or the status reason) when the payload does
/// not follow the `{"value":{"error","message"}}` shape.
pub(crate) fn parse_command_error(status: StatusCode, body: &str) -> WebDriverError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => WebDriverError::Command {
            status,
            error: parsed.value.error,
            message: parsed.value.message,
        },
        Err(_) => WebDriverError::Command {
            status,
            error: "unknown error".to_string(),
            message: if body.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                body.to_string()
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::parse_command_error;

    #[test]
    fn decodes_the_w3c_error_envelope() {
        let body = r#"{"value":{"error":"stale element reference","message":"element is not attached"}}"#;
        let error = parse_command_error(StatusCode::NOT_FOUND, body);

        assert!(error.is_stale_element());
        assert!(!error.is_no_such_element());
        assert_eq!(
            error.to_string(),
            "HTTP 404 Not Found stale element reference: element is not attached"
        );
    }

    #[test]
    fn falls_back_to_the_raw_body_for_unexpected_payloads() {
        let error = parse_command_error(StatusCode::BAD_GATEWAY, "upstream died");

        assert!(!error.is_stale_element());
        assert!(error
            .to_string()
            .contains("unknown error: upstream died"));
    }

    #[test]
    fn empty_bodies_fall_back_to_the_status_reason() {
        let error = parse_command_error(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert!(error.to_string().contains("Internal Server Error"));
    }

    #[test]
    fn script_timeouts_classify_as_timeouts() {
        let body = r#"{"value":{"error":"script timeout","message":"script did not finish"}}"#;
        assert!(parse_command_error(StatusCode::INTERNAL_SERVER_ERROR, body).is_timeout());
    }
}
