//! Complex FFT for the echokit audio pipeline.
//!
//! - [`ComplexFft`](complex_fft::ComplexFft): in-place radix-2 Cooley-Tukey
//!   transform over split real/imaginary buffers (used by the delay estimator
//!   and the frequency-domain adaptive filter)
//! - [`FftBuffer`](fft_buffer::FftBuffer): reusable split complex buffer

#![deny(unsafe_code)]

pub mod complex_fft;
pub mod fft_buffer;

pub use complex_fft::ComplexFft;
pub use fft_buffer::FftBuffer;
