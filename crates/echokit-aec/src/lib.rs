//! Echo cancellation building blocks.
//!
//! - [`DelayEstimator`]: GCC-PHAT lag search between a reference and a
//!   captured signal, smoothed over a confidence-weighted history.
//! - [`DoubleTalkDetector`]: energy-ratio talk state machine with hangover.
//! - [`Fdaf`]: partitioned frequency-domain adaptive filter.
//! - [`Nlms`]: time-domain NLMS fallback filter.
//!
//! Every component allocates at construction and never in `process`.

#![deny(unsafe_code)]

pub mod delay_estimator;
pub mod dtd;
pub mod fdaf;
pub mod metrics;
pub mod nlms;
pub(crate) mod ring_index;

pub use delay_estimator::{
    DelayEstimate, DelayEstimator, DelayEstimatorConfig, DelayEstimatorError, DelayEstimatorState,
};
pub use dtd::{DoubleTalkDetector, DtdState};
pub use fdaf::Fdaf;
pub use metrics::EchoMetrics;
pub use nlms::Nlms;
