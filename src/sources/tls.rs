//! TLS fingerprint source.
//!
//! The TLS handshake fingerprint (JA3/JA4) is only observable server-side,
//! so this source asks a caller-configured echo endpoint. The endpoint
//! configuration is the single piece of process-wide state in the crate:
//! set before first use, overwritten wholesale on every reconfiguration,
//! read only here.

use std::cell::RefCell;

use futures::future::{self, Either};
use futures::pin_mut;
use gloo_timers::future::TimeoutFuture;
use serde::{Deserialize, Serialize};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    AbortController, Request, RequestCache, RequestCredentials, RequestInit, Response,
};

use crate::error::SourceError;

const DEFAULT_TIMEOUT_MS: u32 = 3000;

thread_local! {
    static OPTIONS: RefCell<TlsFingerprintOptions> =
        RefCell::new(TlsFingerprintOptions::default());
}

/// Endpoint configuration. Replaced wholesale by
/// [`configure_tls_fingerprint`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TlsFingerprintOptions {
    pub endpoint: Option<String>,
    pub timeout_ms: u32,
}

impl Default for TlsFingerprintOptions {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Result record. `success = false` carries the failure message; the call
/// itself never rejects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TlsFingerprint {
    pub success: bool,
    pub ja3_hash: Option<String>,
    pub ja3_full: Option<String>,
    pub ja4: Option<String>,
    pub error: Option<String>,
}

impl TlsFingerprint {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// The endpoint promises JSON with any subset of these keys, under any of
/// the field spellings in the wild.
#[derive(Debug, Deserialize, Default)]
struct EndpointResponse {
    #[serde(default, alias = "ja3Hash", alias = "ja3")]
    ja3_hash: Option<String>,
    #[serde(default, alias = "ja3Full", alias = "ja3_string")]
    ja3_full: Option<String>,
    #[serde(default)]
    ja4: Option<String>,
}

/// Replace the process-wide endpoint configuration.
pub fn configure_tls_fingerprint(options: TlsFingerprintOptions) {
    OPTIONS.with(|current| *current.borrow_mut() = options);
}

/// Fetch the fingerprint from the configured endpoint. Always resolves
/// with a record; timeouts, HTTP errors and parse failures map into
/// `success = false`.
pub async fn get_tls_fingerprint() -> TlsFingerprint {
    let options = OPTIONS.with(|current| current.borrow().clone());
    let Some(endpoint) = options.endpoint else {
        return TlsFingerprint::failed("no endpoint configured");
    };
    match fetch_fingerprint(&endpoint, options.timeout_ms).await {
        Ok(fingerprint) => fingerprint,
        Err(SourceError::Timeout) => {
            TlsFingerprint::failed(format!("request timed out after {} ms", options.timeout_ms))
        }
        Err(err) => {
            log::warn!("TLS fingerprint fetch failed: {err}");
            TlsFingerprint::failed(err.to_string())
        }
    }
}

async fn fetch_fingerprint(endpoint: &str, timeout_ms: u32) -> Result<TlsFingerprint, SourceError> {
    let window = web_sys::window().ok_or(SourceError::Unsupported)?;
    let controller = AbortController::new().map_err(SourceError::from)?;

    let init = RequestInit::new();
    init.set_method("GET");
    init.set_credentials(RequestCredentials::Omit);
    init.set_cache(RequestCache::NoStore);
    init.set_signal(Some(&controller.signal()));

    let request =
        Request::new_with_str_and_init(endpoint, &init).map_err(SourceError::from)?;

    let exchange = async {
        let response = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(SourceError::from)?;
        let response: Response = response
            .dyn_into()
            .map_err(|_| SourceError::Fetch("fetch resolved to a non-Response".into()))?;
        if !response.ok() {
            return Err(SourceError::Fetch(format!("HTTP {}", response.status())));
        }
        let body = JsFuture::from(response.text().map_err(SourceError::from)?)
            .await
            .map_err(SourceError::from)?;
        let body = body.as_string().unwrap_or_default();
        parse_endpoint_response(&body)
    };
    let deadline = TimeoutFuture::new(timeout_ms);
    pin_mut!(exchange);
    pin_mut!(deadline);

    match future::select(exchange, deadline).await {
        Either::Left((result, _)) => result,
        Either::Right(((), _)) => {
            controller.abort();
            Err(SourceError::Timeout)
        }
    }
}

fn parse_endpoint_response(body: &str) -> Result<TlsFingerprint, SourceError> {
    let parsed: EndpointResponse = serde_json::from_str(body)
        .map_err(|err| SourceError::Fetch(format!("invalid JSON: {err}")))?;
    Ok(TlsFingerprint {
        success: true,
        ja3_hash: parsed.ja3_hash,
        ja3_full: parsed.ja3_full,
        ja4: parsed.ja4,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_snake_case_fields() {
        let fp = parse_endpoint_response(
            r#"{"ja3_hash":"abc","ja3_full":"771,4-5","ja4":"t13d"}"#,
        )
        .unwrap();
        assert!(fp.success);
        assert_eq!(fp.ja3_hash.as_deref(), Some("abc"));
        assert_eq!(fp.ja3_full.as_deref(), Some("771,4-5"));
        assert_eq!(fp.ja4.as_deref(), Some("t13d"));
    }

    #[test]
    fn parses_camel_case_aliases() {
        let fp = parse_endpoint_response(r#"{"ja3Hash":"abc","ja3Full":"771"}"#).unwrap();
        assert_eq!(fp.ja3_hash.as_deref(), Some("abc"));
        assert_eq!(fp.ja3_full.as_deref(), Some("771"));
    }

    #[test]
    fn parses_short_aliases() {
        let fp = parse_endpoint_response(r#"{"ja3":"abc","ja3_string":"771"}"#).unwrap();
        assert_eq!(fp.ja3_hash.as_deref(), Some("abc"));
        assert_eq!(fp.ja3_full.as_deref(), Some("771"));
    }

    #[test]
    fn tolerates_missing_fields() {
        let fp = parse_endpoint_response("{}").unwrap();
        assert!(fp.success);
        assert_eq!(fp.ja3_hash, None);
        assert_eq!(fp.ja4, None);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(parse_endpoint_response("not json").is_err());
    }

    #[test]
    fn failed_record_shape() {
        let fp = TlsFingerprint::failed("HTTP 503");
        assert!(!fp.success);
        assert_eq!(fp.error.as_deref(), Some("HTTP 503"));
        assert_eq!(fp.ja3_hash, None);
    }

    #[test]
    fn default_options() {
        let options = TlsFingerprintOptions::default();
        assert_eq!(options.endpoint, None);
        assert_eq!(options.timeout_ms, 3000);
    }
}
