//! Echo canceller configuration.

use crate::Error;

/// Largest frame processed per call; longer calls pass the excess through.
pub const MAX_FRAME_SIZE: usize = 512;
/// Playback history kept for capture alignment.
pub const PLAYBACK_BUFFER_MS: u32 = 500;

/// Echo cancellation algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(i32)]
pub enum Algorithm {
    /// Time-domain NLMS.
    Nlms = 0,
    /// Partitioned frequency-domain adaptive filter.
    #[default]
    Fdaf = 1,
    /// No cancellation; output equals input.
    PassThrough = 2,
}

/// Echo canceller configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub sample_rate: u32,
    /// Samples per frame, at most [`MAX_FRAME_SIZE`].
    pub frame_size: usize,
    /// NLMS taps.
    pub filter_length: usize,
    /// Echo tail covered by the FDAF blocks and searched by the delay
    /// estimator.
    pub tail_length_ms: u32,
    pub algorithm: Algorithm,
    /// Residual suppression while only the far end talks (negative dB).
    pub echo_suppress_db: f32,
    /// Residual suppression during double talk (negative dB).
    pub echo_suppress_active_db: f32,
    pub enable_residual_echo_suppress: bool,
    pub enable_delay_estimation: bool,
    pub enable_dtd: bool,
    /// Adaptation step size for both filters.
    pub nlms_step_size: f32,
    /// Error-to-near energy ratio above which the DTD declares double talk.
    pub dtd_threshold: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            frame_size: 160,
            filter_length: 2560,
            tail_length_ms: 200,
            algorithm: Algorithm::Fdaf,
            echo_suppress_db: -40.0,
            echo_suppress_active_db: -15.0,
            enable_residual_echo_suppress: true,
            enable_delay_estimation: true,
            enable_dtd: true,
            nlms_step_size: 0.3,
            dtd_threshold: 0.65,
        }
    }
}

impl Config {
    /// Checks that the configuration can be instantiated.
    pub fn validate(&self) -> Result<(), Error> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidConfig("sample rate must be non-zero"));
        }
        if self.frame_size == 0 || self.frame_size > MAX_FRAME_SIZE {
            return Err(Error::InvalidConfig("frame size must be in 1..=512"));
        }
        if !(self.nlms_step_size.is_finite() && self.nlms_step_size > 0.0) {
            return Err(Error::InvalidConfig("step size must be positive"));
        }
        if !self.dtd_threshold.is_finite() || self.dtd_threshold < 0.0 {
            return Err(Error::InvalidConfig("DTD threshold must be non-negative"));
        }
        if !self.echo_suppress_db.is_finite() || !self.echo_suppress_active_db.is_finite() {
            return Err(Error::InvalidConfig("suppression levels must be finite"));
        }
        Ok(())
    }

    /// Echo tail in samples.
    pub fn tail_samples(&self) -> usize {
        (self.tail_length_ms as u64 * self.sample_rate as u64 / 1000) as usize
    }

    /// Playback ring capacity in samples, before rounding to a power of two.
    pub(crate) fn playback_capacity(&self) -> usize {
        let samples = PLAYBACK_BUFFER_MS as u64 * self.sample_rate as u64 / 1000;
        (samples as usize).max(MAX_FRAME_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = Config::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.tail_samples(), 3200);
        assert_eq!(config.playback_capacity(), 8000);
    }

    #[test]
    fn rejects_oversized_frame() {
        let config = Config {
            frame_size: MAX_FRAME_SIZE + 1,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn rejects_bad_values() {
        for config in [
            Config {
                sample_rate: 0,
                ..Default::default()
            },
            Config {
                frame_size: 0,
                ..Default::default()
            },
            Config {
                nlms_step_size: 0.0,
                ..Default::default()
            },
            Config {
                nlms_step_size: f32::NAN,
                ..Default::default()
            },
            Config {
                dtd_threshold: -1.0,
                ..Default::default()
            },
        ] {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }
}
