//! Network Information shim.
//!
//! Reads `navigator.connection` (with vendor-prefixed fallbacks) verbatim,
//! except for `rtt`, which jitters per measurement and is quantized to
//! 25 ms steps.

use js_sys::Reflect;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::stabilize::rounding::quantize_step;

/// Connection object keys, tried in order.
const CONNECTION_KEYS: [&str; 3] = ["connection", "mozConnection", "webkitConnection"];

/// Result record; `None` fields are unobservable on this host.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInformation {
    pub supported: bool,
    pub effective_type: Option<String>,
    pub connection_type: Option<String>,
    pub downlink: Option<f64>,
    pub downlink_max: Option<f64>,
    pub save_data: Option<bool>,
    /// Milliseconds, a multiple of 25.
    pub rtt: Option<f64>,
}

/// Read the connection object. Never throws.
pub fn get_network_information() -> NetworkInformation {
    let Some(window) = web_sys::window() else {
        return NetworkInformation::default();
    };
    let navigator = window.navigator();

    let Some(connection) = CONNECTION_KEYS.iter().find_map(|key| {
        Reflect::get(&navigator, &JsValue::from_str(key))
            .ok()
            .filter(|v| v.is_object())
    }) else {
        return NetworkInformation::default();
    };

    NetworkInformation {
        supported: true,
        effective_type: read_string(&connection, "effectiveType"),
        connection_type: read_string(&connection, "type"),
        downlink: read_number(&connection, "downlink"),
        downlink_max: read_number(&connection, "downlinkMax"),
        save_data: Reflect::get(&connection, &JsValue::from_str("saveData"))
            .ok()
            .and_then(|v| v.as_bool()),
        rtt: read_number(&connection, "rtt").map(|v| quantize_step(v, 25.0)),
    }
}

fn read_string(target: &JsValue, key: &str) -> Option<String> {
    Reflect::get(target, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_string())
}

fn read_number(target: &JsValue, key: &str) -> Option<f64> {
    Reflect::get(target, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_f64())
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_is_unobservable() {
        let info = NetworkInformation::default();
        assert!(!info.supported);
        assert_eq!(info.rtt, None);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let info = NetworkInformation {
            supported: true,
            effective_type: Some("4g".into()),
            rtt: Some(50.0),
            ..NetworkInformation::default()
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"effectiveType\":\"4g\""));
        assert!(json.contains("\"rtt\":50.0"));
    }
}
