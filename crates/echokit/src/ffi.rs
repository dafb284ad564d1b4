//! C-compatible FFI layer for the echo canceller.
//!
//! This module exposes `extern "C"` functions and `#[repr(C)]` types that
//! allow C and C++ consumers to drive an [`EchoCanceller`](crate::EchoCanceller).
//!
//! # Symbol prefix
//!
//! - Functions: `echokit_aec_*`
//! - Types: `Echokit*`
//!
//! # Thread safety
//!
//! **NOT thread-safe.** All calls on the same [`EchokitAec`](types::EchokitAec)
//! handle, including `echokit_aec_playback`, must be serialized by the
//! caller. Rust callers with separate render and capture threads should use
//! [`PlaybackHandle`](crate::PlaybackHandle) instead.

pub mod types;

mod conversions;
pub mod functions;
mod panic_guard;
