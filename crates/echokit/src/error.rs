//! Error type for the echo canceller.

/// Errors returned by [`EchoCanceller`](crate::EchoCanceller) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A processing call was given zero samples.
    #[error("empty frame")]
    EmptyFrame,
    /// Input and output buffers differ in length.
    #[error("buffer length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    /// A known delay must be non-negative.
    #[error("negative delay: {0} samples")]
    NegativeDelay(i32),
}
