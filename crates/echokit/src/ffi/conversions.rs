//! Conversions between C API types and Rust types.

use crate::config::{Algorithm, Config};
use crate::{AecState, DtdState, Error};

use super::types::{
    EchokitAecConfig, EchokitAecState, EchokitAlgorithm, EchokitDtdState, EchokitError,
};

impl EchokitAecConfig {
    /// Convert from the flat C config to [`Config`].
    pub(crate) fn to_rust(self) -> Config {
        Config {
            sample_rate: self.sample_rate,
            frame_size: self.frame_size as usize,
            filter_length: self.filter_length as usize,
            tail_length_ms: self.tail_length_ms,
            algorithm: self.algorithm.to_rust(),
            echo_suppress_db: self.echo_suppress_db,
            echo_suppress_active_db: self.echo_suppress_active_db,
            enable_residual_echo_suppress: self.enable_residual_echo_suppress,
            enable_delay_estimation: self.enable_delay_estimation,
            enable_dtd: self.enable_dtd,
            nlms_step_size: self.nlms_step_size,
            dtd_threshold: self.dtd_threshold,
        }
    }

    /// Convert from [`Config`] to the flat C config.
    pub(crate) fn from_rust(config: &Config) -> Self {
        Self {
            sample_rate: config.sample_rate,
            frame_size: config.frame_size.try_into().unwrap_or(u32::MAX),
            filter_length: config.filter_length.try_into().unwrap_or(u32::MAX),
            tail_length_ms: config.tail_length_ms,
            algorithm: EchokitAlgorithm::from_rust(config.algorithm),
            echo_suppress_db: config.echo_suppress_db,
            echo_suppress_active_db: config.echo_suppress_active_db,
            enable_residual_echo_suppress: config.enable_residual_echo_suppress,
            enable_delay_estimation: config.enable_delay_estimation,
            enable_dtd: config.enable_dtd,
            nlms_step_size: config.nlms_step_size,
            dtd_threshold: config.dtd_threshold,
        }
    }
}

impl EchokitAlgorithm {
    pub(crate) fn to_rust(self) -> Algorithm {
        match self {
            Self::Nlms => Algorithm::Nlms,
            Self::Fdaf => Algorithm::Fdaf,
            Self::PassThrough => Algorithm::PassThrough,
        }
    }

    pub(crate) fn from_rust(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Nlms => Self::Nlms,
            Algorithm::Fdaf => Self::Fdaf,
            Algorithm::PassThrough => Self::PassThrough,
        }
    }
}

impl From<DtdState> for EchokitDtdState {
    fn from(state: DtdState) -> Self {
        match state {
            DtdState::Idle => Self::Idle,
            DtdState::FarEnd => Self::FarEnd,
            DtdState::NearEnd => Self::NearEnd,
            DtdState::DoubleTalk => Self::DoubleTalk,
        }
    }
}

impl From<AecState> for EchokitAecState {
    fn from(state: AecState) -> Self {
        Self {
            dtd_state: state.dtd_state.into(),
            estimated_delay_samples: state.estimated_delay_samples,
            estimated_delay_ms: state.estimated_delay_ms,
            erle_db: state.erle_db,
            convergence: state.convergence,
            delay_stable: state.delay_stable,
            frames_processed: state.frames_processed,
        }
    }
}

impl From<Error> for EchokitError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidConfig(_) => Self::InvalidConfig,
            Error::EmptyFrame => Self::EmptyFrame,
            Error::LengthMismatch { .. } => Self::LengthMismatch,
            Error::NegativeDelay(_) => Self::NegativeDelay,
        }
    }
}

/// Maps a unit result onto a C error code.
pub(crate) fn to_error_code(result: Result<(), Error>) -> EchokitError {
    match result {
        Ok(()) => EchokitError::None,
        Err(err) => err.into(),
    }
}
