//! Battery shim.
//!
//! Raw battery readings drift every few seconds; quantizing level to 5 %
//! steps and the time estimates to whole minutes keeps the signal stable
//! across a session.

use js_sys::{Function, Promise, Reflect};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::error::SourceError;
use crate::stabilize::rounding::{quantize_fraction, quantize_step};

/// Result record; `None` fields are unobservable on this host.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BatteryInfo {
    pub supported: bool,
    pub charging: Option<bool>,
    /// Charge fraction, a multiple of 0.05.
    pub level: Option<f64>,
    /// Seconds, a multiple of 60.
    pub charging_time: Option<f64>,
    /// Seconds, a multiple of 60.
    pub discharging_time: Option<f64>,
}

/// Read `navigator.getBattery()`. Hosts without the API yield an
/// all-unobservable record. Never rejects.
pub async fn get_battery_info() -> BatteryInfo {
    match read_battery().await {
        Ok(info) => info,
        Err(_) => BatteryInfo::default(),
    }
}

async fn read_battery() -> Result<BatteryInfo, SourceError> {
    let window = web_sys::window().ok_or(SourceError::Unsupported)?;
    let navigator = window.navigator();

    let get_battery = Reflect::get(&navigator, &JsValue::from_str("getBattery"))
        .map_err(SourceError::from)?;
    let Ok(get_battery) = get_battery.dyn_into::<Function>() else {
        return Ok(BatteryInfo::default());
    };

    let promise: Promise = get_battery
        .call0(&navigator)
        .map_err(SourceError::from)?
        .unchecked_into();
    let battery = JsFuture::from(promise).await.map_err(SourceError::from)?;

    Ok(BatteryInfo {
        supported: true,
        charging: read_bool(&battery, "charging"),
        level: read_finite(&battery, "level").map(|v| quantize_fraction(v, 20.0)),
        charging_time: read_finite(&battery, "chargingTime").map(|v| quantize_step(v, 60.0)),
        discharging_time: read_finite(&battery, "dischargingTime")
            .map(|v| quantize_step(v, 60.0)),
    })
}

fn read_bool(target: &JsValue, key: &str) -> Option<bool> {
    Reflect::get(target, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_bool())
}

/// `chargingTime`/`dischargingTime` report `Infinity` when unknown;
/// non-finite readings are unobservable.
fn read_finite(target: &JsValue, key: &str) -> Option<f64> {
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
        let info = BatteryInfo::default();
        assert!(!info.supported);
        assert_eq!(info.level, None);
        assert_eq!(info.charging_time, None);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let info = BatteryInfo {
            supported: true,
            charging: Some(true),
            level: Some(0.75),
            charging_time: Some(600.0),
            discharging_time: None,
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"chargingTime\":600.0"));
        assert!(json.contains("\"dischargingTime\":null"));
    }
}
