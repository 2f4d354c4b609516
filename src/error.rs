//! Error types for the entropy collectors.
//!
//! Errors here are internal plumbing only. No public source operation ever
//! propagates one: every code path terminates in a structured value of the
//! source's declared result type (a sentinel, `success = false`, an empty
//! sequence). Callers may collect many sources in parallel without
//! per-source error handling.

use thiserror::Error;
use wasm_bindgen::JsValue;

pub type Result<T> = std::result::Result<T, SourceError>;

/// Failure modes a source can hit while talking to the host.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    /// The host lacks the API the source needs.
    #[error("host API unavailable")]
    Unsupported,

    /// A network request failed (HTTP status, malformed body, ...).
    #[error("request failed: {0}")]
    Fetch(String),

    /// A deadline elapsed before the host produced a result.
    #[error("request timed out")]
    Timeout,

    /// A host call threw.
    #[error("host call failed: {0}")]
    Js(String),
}

impl From<JsValue> for SourceError {
    fn from(value: JsValue) -> Self {
        SourceError::Js(
            value
                .as_string()
                .unwrap_or_else(|| format!("{value:?}")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            SourceError::Fetch("HTTP 503".into()).to_string(),
            "request failed: HTTP 503"
        );
        assert_eq!(SourceError::Timeout.to_string(), "request timed out");
        assert_eq!(SourceError::Unsupported.to_string(), "host API unavailable");
    }
}
