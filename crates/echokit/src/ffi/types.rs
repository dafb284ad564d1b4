//! C-compatible type definitions for the echo canceller C API.
//!
//! All types here are `#[repr(C)]` and are safe to pass across FFI boundaries.

use crate::EchoCanceller;

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// Error codes returned by C API functions.
///
/// `0` = success, negative = error.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchokitError {
    /// Operation succeeded.
    None = 0,
    /// Null pointer passed to a function that requires non-null.
    NullPointer = -1,
    /// Internal error (panic caught at FFI boundary).
    Internal = -2,
    /// Configuration rejected at creation.
    InvalidConfig = -3,
    /// Zero-length frame.
    EmptyFrame = -4,
    /// Buffer lengths disagree.
    LengthMismatch = -5,
    /// Negative delay passed to `echokit_aec_set_delay`.
    NegativeDelay = -6,
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Echo cancellation algorithm.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchokitAlgorithm {
    Nlms = 0,
    Fdaf = 1,
    PassThrough = 2,
}

/// Double-talk detector state.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchokitDtdState {
    Idle = 0,
    FarEnd = 1,
    NearEnd = 2,
    DoubleTalk = 3,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Flat echo canceller configuration.
///
/// Obtain a default-initialized instance via `echokit_aec_config_default()`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct EchokitAecConfig {
    pub sample_rate: u32,
    pub frame_size: u32,
    pub filter_length: u32,
    pub tail_length_ms: u32,
    pub algorithm: EchokitAlgorithm,
    pub echo_suppress_db: f32,
    pub echo_suppress_active_db: f32,
    pub enable_residual_echo_suppress: bool,
    pub enable_delay_estimation: bool,
    pub enable_dtd: bool,
    pub nlms_step_size: f32,
    pub dtd_threshold: f32,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Snapshot of the canceller's health.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct EchokitAecState {
    pub dtd_state: EchokitDtdState,
    pub estimated_delay_samples: i32,
    pub estimated_delay_ms: f32,
    pub erle_db: f32,
    pub convergence: f32,
    pub delay_stable: bool,
    pub frames_processed: u64,
}

// ---------------------------------------------------------------------------
// Opaque handle
// ---------------------------------------------------------------------------

/// Opaque handle to an echo canceller.
///
/// Created via `echokit_aec_create()`, destroyed via `echokit_aec_destroy()`.
pub struct EchokitAec {
    pub(crate) inner: EchoCanceller,
}
