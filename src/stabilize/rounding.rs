//! Quantization helpers for jittery scalar readings.
//!
//! Raw battery and network readings change every second or two; rounding to
//! a coarse grid turns them into stable signals.

/// Round to the nearest `1 / denominator` fraction. Dividing a rounded
/// integer keeps the result an exact multiple (e.g. battery level to 1/20).
pub fn quantize_fraction(value: f64, denominator: f64) -> f64 {
    (value * denominator).round() / denominator
}

/// Round to the nearest multiple of `step` (e.g. seconds to the minute,
/// rtt to 25 ms).
pub fn quantize_step(value: f64, step: f64) -> f64 {
    (value / step).round() * step
}
