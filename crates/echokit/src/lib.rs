//! Real-time acoustic echo cancellation.
//!
//! [`EchoCanceller`] removes loudspeaker echo from microphone frames using a
//! frequency-domain (or NLMS) adaptive filter, a double-talk detector that
//! freezes adaptation while the near end talks, a GCC-PHAT delay estimator,
//! and a lock-free playback ring for callers whose render and capture
//! callbacks run independently.
//!
//! ```no_run
//! use echokit::{Config, EchoCanceller};
//!
//! let mut aec = EchoCanceller::new(Config::default())?;
//! let (mic, speaker) = ([0i16; 160], [0i16; 160]);
//! let mut out = [0i16; 160];
//! aec.process_i16(&mic, Some(&speaker), &mut out)?;
//! # Ok::<(), echokit::Error>(())
//! ```
//!
//! A C API is exposed from the [`ffi`] module.

pub mod config;
mod echo_canceller;
mod error;
pub mod ffi;
mod state;
mod suppressor;

pub use config::{Algorithm, Config, MAX_FRAME_SIZE};
pub use echo_canceller::{EchoCanceller, PlaybackHandle};
pub use echokit_aec::DtdState;
pub use error::Error;
pub use state::AecState;
