//! Audio entropy source.
//!
//! Runs a triangle oscillator through a biquad filter in an offline audio
//! graph and reduces a fixed tail window of the rendered samples to one
//! scalar. The scalar is never bit-identical across page loads on hosts
//! that inject audio noise (Safari 17+, Samsung Internet 26+), so the
//! producer memoizes its first resolved value: repeated calls within a page
//! load return the identical number without re-running the pipeline. That
//! trades cross-page-load determinism for per-session stability, which is
//! the only stability these hosts permit.

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{AudioBuffer, BiquadFilterType, OfflineAudioContext, OscillatorType};

use crate::environment::EnvironmentClass;
use crate::stabilize::memo::Memo;

const CHANNELS: u32 = 1;
const FRAME_COUNT: u32 = 5000;
const SAMPLE_RATE: f32 = 44_100.0;
const OSCILLATOR_FREQUENCY: f32 = 10_000.0;
const FILTER_FREQUENCY: f32 = 1_000.0;
const FILTER_Q: f32 = 0.1;
/// Samples before this index are filter warm-up; the reduction sums the
/// absolute values of the tail.
const TAIL_START: usize = 4500;

/// Outcome of probing the audio stack.
#[derive(Clone)]
pub enum AudioFingerprint {
    /// The environment suspends the offline graph indefinitely outside a
    /// user gesture; no context is constructed.
    KnownForSuspending,
    /// Deferred computation; see [`AudioFingerprintProducer`].
    Producer(AudioFingerprintProducer),
}

/// Deferred, memoized audio fingerprint.
///
/// The first `get` runs the offline graph; every later `get` (including
/// concurrent ones issued before the first resolves) returns the identical
/// non-negative finite number. Clones share the memoized value.
#[derive(Clone, Default)]
pub struct AudioFingerprintProducer {
    memo: Memo<f64>,
}

impl AudioFingerprintProducer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> f64 {
        if let Some(value) = self.memo.value() {
            return value;
        }
        if self.memo.try_begin() {
            let value = match render_fingerprint().await {
                Ok(value) if value.is_finite() => value,
                Ok(_) => 0.0,
                Err(err) => {
                    log::warn!("audio rendering failed: {err:?}");
                    0.0
                }
            };
            self.memo.complete(value);
            value
        } else {
            self.memo.wait().await
        }
    }
}

/// Probe the audio stack.
///
/// Returns [`AudioFingerprint::KnownForSuspending`] on mobile WebKit older
/// than 12, a producer otherwise. Never throws.
pub fn get_audio_fingerprint() -> AudioFingerprint {
    audio_fingerprint_with_env(&EnvironmentClass::detect())
}

pub(crate) fn audio_fingerprint_with_env(env: &EnvironmentClass) -> AudioFingerprint {
    if env.suspends_audio_graph() {
        return AudioFingerprint::KnownForSuspending;
    }
    AudioFingerprint::Producer(AudioFingerprintProducer::new())
}

async fn render_fingerprint() -> Result<f64, JsValue> {
    let context = OfflineAudioContext::new_with_number_of_channels_and_length_and_sample_rate(
        CHANNELS,
        FRAME_COUNT,
        SAMPLE_RATE,
    )?;

    let oscillator = context.create_oscillator()?;
    oscillator.set_type(OscillatorType::Triangle);
    oscillator.frequency().set_value(OSCILLATOR_FREQUENCY);

    let filter = context.create_biquad_filter()?;
    filter.set_type(BiquadFilterType::Allpass);
    filter.frequency().set_value(FILTER_FREQUENCY);
    filter.q().set_value(FILTER_Q);

    oscillator.connect_with_audio_node(&filter)?;
    filter.connect_with_audio_node(&context.destination())?;
    oscillator.start()?;

    let rendered = JsFuture::from(context.start_rendering()?).await?;
    let buffer: AudioBuffer = rendered
        .dyn_into()
        .map_err(|_| JsValue::from_str("rendered result is not an AudioBuffer"))?;
    let samples = buffer.get_channel_data(0)?;
    Ok(reduce_tail(&samples))
}

/// Sum of absolute sample values over the tail window.
fn reduce_tail(samples: &[f32]) -> f64 {
    samples
        .iter()
        .skip(TAIL_START.min(samples.len()))
        .map(|s| s.abs() as f64)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvironmentClass;

    const SAFARI_11_IOS: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 11_2 like Mac OS X) \
        AppleWebKit/604.4.7 (KHTML, like Gecko) Version/11.0 Mobile/15C114 Safari/604.1";
    const SAFARI_17_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15";

    #[test]
    fn mobile_webkit_11_short_circuits() {
        let env = EnvironmentClass::from_user_agent(SAFARI_11_IOS, 5);
        assert!(matches!(
            audio_fingerprint_with_env(&env),
            AudioFingerprint::KnownForSuspending
        ));
    }

    #[test]
    fn desktop_safari_gets_a_producer() {
        let env = EnvironmentClass::from_user_agent(SAFARI_17_MAC, 0);
        assert!(matches!(
            audio_fingerprint_with_env(&env),
            AudioFingerprint::Producer(_)
        ));
    }

    #[test]
    fn tail_reduction_is_non_negative() {
        let samples: Vec<f32> = (0..5000).map(|i| ((i % 7) as f32 - 3.0) * 0.01).collect();
        assert!(reduce_tail(&samples) >= 0.0);
    }

    #[test]
    fn tail_reduction_covers_only_the_window() {
        let mut samples = vec![0.0f32; 5000];
        for s in samples.iter_mut().take(TAIL_START) {
            *s = 100.0;
        }
        samples[TAIL_START] = 0.5;
        samples[4999] = -0.25;
        assert_eq!(reduce_tail(&samples), 0.75);
    }

    #[test]
    fn tail_reduction_tolerates_short_buffers() {
        assert_eq!(reduce_tail(&[]), 0.0);
        // A buffer shorter than the warm-up has an empty tail window.
        assert_eq!(reduce_tail(&[0.5, -0.5]), 0.0);
    }

    #[test]
    fn producer_memoizes_a_preset_value() {
        let producer = AudioFingerprintProducer::new();
        assert!(producer.memo.try_begin());
        producer.memo.complete(3.25);
        let first = futures::executor::block_on(producer.get());
        let second = futures::executor::block_on(producer.get());
        assert_eq!(first, 3.25);
        assert_eq!(first, second);
    }
}
