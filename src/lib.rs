//! # entropy-wasm
//!
//! Browser fingerprint entropy collection compiled to WebAssembly.
//!
//! The crate is a set of independent entropy sources plus the stabilization
//! primitives they share. Collecting raw API values is mechanical; the work
//! here is defeating deliberate anti-fingerprinting noise:
//!
//! - **Canvas**: 3×3 spatial oversampling forces WebKit 616+'s
//!   neighbourhood-clamped readback noise to zero.
//! - **Audio**: a memoized producer turns a never-bit-identical sample
//!   reduction into a per-session-stable scalar.
//! - **Screen**: bracketing binary search over `matchMedia` reconstructs
//!   dimensions without trusting `window.screen`.
//! - **WebRTC**: ICE gathering raced against a hard deadline surfaces
//!   private interface addresses.
//!
//! Sources are leaves: they never compose, never cache across calls, and
//! never throw; every failure maps into a structured result. The only
//! process-wide state is the TLS endpoint configuration.
//!
//! ## Usage
//!
//! ```javascript
//! import init, { getCanvasFingerprint, getWebRtcIps } from './pkg/entropy_wasm.js';
//! await init();
//! const canvas = getCanvasFingerprint();
//! const ips = await getWebRtcIps();
//! ```

use wasm_bindgen::prelude::*;

pub mod environment;
pub mod error;
pub mod sources;
pub mod stabilize;

pub use environment::EnvironmentClass;
pub use error::{Result, SourceError};
pub use sources::audio::{get_audio_fingerprint, AudioFingerprint, AudioFingerprintProducer};
pub use sources::battery::{get_battery_info, BatteryInfo};
pub use sources::canvas::{get_canvas_fingerprint, CanvasFingerprint, CanvasImage};
pub use sources::network::{get_network_information, NetworkInformation};
pub use sources::screen::{get_screen_media_queries, ScreenMediaQueries};
pub use sources::tls::{
    configure_tls_fingerprint, get_tls_fingerprint, TlsFingerprint, TlsFingerprintOptions,
};
pub use sources::webrtc::{get_webrtc_ips, WebRtcIps};

/// Set up the panic hook and console logging.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    let _ = console_log::init_with_level(log::Level::Info);
}

fn to_js<T: serde::Serialize>(value: &T) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or(JsValue::NULL)
}

/// JS-facing canvas source.
#[wasm_bindgen(js_name = getCanvasFingerprint)]
pub fn canvas_fingerprint_js() -> JsValue {
    to_js(&get_canvas_fingerprint())
}

/// JS-facing screen source.
#[wasm_bindgen(js_name = getScreenMediaQueries)]
pub fn screen_media_queries_js() -> JsValue {
    to_js(&get_screen_media_queries())
}

/// JS-facing WebRTC source.
#[wasm_bindgen(js_name = getWebRtcIps)]
pub async fn webrtc_ips_js() -> JsValue {
    to_js(&get_webrtc_ips().await)
}

/// JS-facing battery source.
#[wasm_bindgen(js_name = getBatteryInfo)]
pub async fn battery_info_js() -> JsValue {
    to_js(&get_battery_info().await)
}

/// JS-facing network source.
#[wasm_bindgen(js_name = getNetworkInformation)]
pub fn network_information_js() -> JsValue {
    to_js(&get_network_information())
}

/// JS-facing TLS configuration entry point. Silently keeps the previous
/// configuration when the options object does not deserialize.
#[wasm_bindgen(js_name = configureTlsFingerprint)]
pub fn configure_tls_fingerprint_js(options: JsValue) {
    if let Ok(options) = serde_wasm_bindgen::from_value(options) {
        configure_tls_fingerprint(options);
    }
}

/// JS-facing TLS source.
#[wasm_bindgen(js_name = getTlsFingerprint)]
pub async fn tls_fingerprint_js() -> JsValue {
    to_js(&get_tls_fingerprint().await)
}

/// JS-facing audio source handle.
///
/// Check `knownForSuspending` before calling `value()`; on suspending hosts
/// `value()` resolves to -1 as a sentinel.
#[wasm_bindgen]
pub struct AudioFingerprintHandle {
    inner: AudioFingerprint,
}

/// JS-facing audio source.
#[wasm_bindgen(js_name = getAudioFingerprint)]
pub fn audio_fingerprint_js() -> AudioFingerprintHandle {
    AudioFingerprintHandle {
        inner: get_audio_fingerprint(),
    }
}

#[wasm_bindgen]
impl AudioFingerprintHandle {
    #[wasm_bindgen(getter, js_name = knownForSuspending)]
    pub fn known_for_suspending(&self) -> bool {
        matches!(self.inner, AudioFingerprint::KnownForSuspending)
    }

    /// Resolve the memoized fingerprint; repeated calls on the same handle
    /// return the identical number.
    pub fn value(&self) -> js_sys::Promise {
        let inner = self.inner.clone();
        wasm_bindgen_futures::future_to_promise(async move {
            let value = match inner {
                AudioFingerprint::KnownForSuspending => -1.0,
                AudioFingerprint::Producer(producer) => producer.get().await,
            };
            Ok(JsValue::from_f64(value))
        })
    }
}
