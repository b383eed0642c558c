//! Transport-only W3C WebDriver client primitives.
//!
//! This crate owns session, element, and script command plumbing over the
//! JSON-over-HTTP wire protocol only. It intentionally contains no DOM
//! knowledge, no selector constants, and no polling or retry policy; callers
//! own those decisions and react to the typed command errors this crate
//! classifies.

pub mod client;
pub mod config;
pub mod error;
pub mod payload;
pub mod url;

pub use client::{ElementHandle, WebDriverClient};
pub use config::WebDriverConfig;
pub use error::WebDriverError;
pub use url::{normalize_server_url, DEFAULT_WEBDRIVER_URL};

pub use reqwest::StatusCode;
