//! Entropy sources.
//!
//! Each source is a leaf: a pure function of the host environment returning
//! a deterministic (or documented-unstable) signal. Sources never compose
//! with each other and never throw; every failure mode maps into the
//! source's declared result type.

pub mod audio;
pub mod battery;
pub mod canvas;
pub mod network;
pub mod screen;
pub mod tls;
pub mod webrtc;
