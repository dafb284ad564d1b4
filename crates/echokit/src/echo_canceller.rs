//! Echo canceller controller.
//!
//! Owns the adaptive filter, double-talk detector, delay estimator, residual
//! suppressor and playback ring, and drives them once per frame:
//!
//! ```text
//! mic ──┐
//!       ├─ delay estimate ─ adaptive filter ─ DTD ─ adaptation ─ suppression ─ out
//! ref ──┘        (sync mode: the frame itself; capture mode: the playback ring)
//! ```
//!
//! Two calling conventions are supported:
//!
//! - **Synchronous**: [`EchoCanceller::process_f32`] receives the microphone
//!   frame together with an already aligned speaker reference.
//! - **Split**: [`EchoCanceller::playback_f32`] (or a [`PlaybackHandle`] on
//!   the render thread) appends speaker output, and
//!   [`EchoCanceller::capture_f32`] pulls a delay-compensated reference out of
//!   the playback ring before running the same pipeline.

use std::num::NonZero;
use std::sync::Arc;

use echokit_aec::delay_estimator;
use echokit_aec::{
    DelayEstimator, DelayEstimatorConfig, DoubleTalkDetector, DtdState, EchoMetrics, Fdaf, Nlms,
};
use echokit_ring_buffer::PlaybackRing;
use echokit_simd::SimdBackend;

use crate::config::{Algorithm, Config};
use crate::state::AecState;
use crate::suppressor::ResidualEchoSuppressor;
use crate::Error;

/// Capped-frame warnings logged per instance.
const MAX_CAPPED_FRAME_LOGS: u32 = 5;

/// The adaptive filter selected at construction.
#[derive(Debug)]
enum Canceller {
    Fdaf(Fdaf),
    Nlms(Nlms),
    PassThrough,
}

impl Canceller {
    fn new(config: &Config, backend: SimdBackend) -> Self {
        match config.algorithm {
            Algorithm::Fdaf => Self::Fdaf(Fdaf::new(
                config.frame_size,
                config.tail_samples(),
                config.nlms_step_size,
                backend,
            )),
            Algorithm::Nlms => Self::Nlms(Nlms::new(
                config.filter_length,
                config.nlms_step_size,
                backend,
            )),
            Algorithm::PassThrough => Self::PassThrough,
        }
    }

    fn process(
        &mut self,
        near: &[f32],
        far: Option<&[f32]>,
        out: &mut [f32],
        dtd: Option<&mut DoubleTalkDetector>,
    ) {
        match self {
            Self::Fdaf(fdaf) => fdaf.process(near, far, out, dtd),
            Self::Nlms(nlms) => nlms.process(near, far, out, dtd),
            Self::PassThrough => out.copy_from_slice(near),
        }
    }

    fn metrics(&self) -> EchoMetrics {
        match self {
            Self::Fdaf(fdaf) => *fdaf.metrics(),
            Self::Nlms(nlms) => *nlms.metrics(),
            Self::PassThrough => EchoMetrics::default(),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Fdaf(fdaf) => fdaf.reset(),
            Self::Nlms(nlms) => nlms.reset(),
            Self::PassThrough => {}
        }
    }
}

/// Producer side of the playback ring, for use on the render thread.
///
/// Writes never block; when the ring is full the oldest samples are
/// overwritten.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    ring: Arc<PlaybackRing>,
}

impl PlaybackHandle {
    pub fn write_f32(&self, samples: &[f32]) {
        self.ring.write(samples);
    }

    pub fn write_i16(&self, samples: &[i16]) {
        self.ring
            .write_iter(samples.iter().map(|&s| f32::from(s) * (1.0 / 32768.0)));
    }
}

/// Acoustic echo canceller.
///
/// All buffers are allocated in [`new`](Self::new); processing calls never
/// allocate.
#[derive(derive_more::Debug)]
pub struct EchoCanceller {
    config: Config,
    backend: SimdBackend,
    enabled: bool,
    canceller: Canceller,
    dtd: DoubleTalkDetector,
    delay_estimator: Option<DelayEstimator>,
    suppressor: ResidualEchoSuppressor,
    playback: Arc<PlaybackRing>,
    known_delay: Option<usize>,
    frames_processed: u64,
    capped_log_counter: u32,
    #[debug(skip)]
    near: Vec<f32>,
    #[debug(skip)]
    far: Vec<f32>,
    #[debug(skip)]
    out: Vec<f32>,
    /// Playback history searched by the capture-mode delay estimate.
    #[debug(skip)]
    history: Vec<f32>,
    /// Microphone frame right-aligned in a window as long as `history`.
    #[debug(skip)]
    mic_window: Vec<f32>,
}

impl EchoCanceller {
    /// Creates an echo canceller using the detected SIMD backend.
    pub fn new(config: Config) -> Result<Self, Error> {
        Self::with_backend(config, echokit_simd::detect_backend())
    }

    pub fn with_backend(config: Config, backend: SimdBackend) -> Result<Self, Error> {
        config.validate()?;
        tracing::debug!(
            "[aec]: creating {:?} canceller, {} Hz, frame {}, backend {}",
            config.algorithm,
            config.sample_rate,
            config.frame_size,
            backend.name()
        );

        let playback_capacity = NonZero::new(config.playback_capacity())
            .ok_or(Error::InvalidConfig("playback buffer would be empty"))?;
        let window = config.frame_size + config.tail_samples();

        let mut aec = Self {
            backend,
            enabled: true,
            canceller: Canceller::new(&config, backend),
            dtd: DoubleTalkDetector::new(config.dtd_threshold),
            delay_estimator: None,
            suppressor: ResidualEchoSuppressor::new(
                config.echo_suppress_db,
                config.echo_suppress_active_db,
            ),
            playback: Arc::new(PlaybackRing::new(playback_capacity)),
            known_delay: None,
            frames_processed: 0,
            capped_log_counter: 0,
            near: vec![0.0; config.frame_size],
            far: vec![0.0; config.frame_size],
            out: vec![0.0; config.frame_size],
            history: vec![0.0; window],
            mic_window: vec![0.0; window],
            config,
        };
        if aec.config.enable_delay_estimation {
            aec.create_delay_estimator();
        }
        Ok(aec)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cancels echo of `speaker` from `mic` into `out`.
    ///
    /// `speaker` is the far-end reference already aligned with `mic`; `None`
    /// is treated as silence. At most `frame_size` samples are filtered; any
    /// excess is copied through unchanged.
    pub fn process_f32(
        &mut self,
        mic: &[f32],
        speaker: Option<&[f32]>,
        out: &mut [f32],
    ) -> Result<(), Error> {
        check_lengths(mic.len(), speaker.map(<[f32]>::len), out.len())?;
        if !self.enabled {
            out.copy_from_slice(mic);
            return Ok(());
        }

        let len = self.capped_len(mic.len());
        self.near[..len].copy_from_slice(&mic[..len]);
        if let Some(speaker) = speaker {
            self.far[..len].copy_from_slice(&speaker[..len]);
        }
        self.process_aligned(len, speaker.is_some());

        out[..len].copy_from_slice(&self.out[..len]);
        out[len..].copy_from_slice(&mic[len..]);
        Ok(())
    }

    /// 16-bit variant of [`process_f32`](Self::process_f32).
    pub fn process_i16(
        &mut self,
        mic: &[i16],
        speaker: Option<&[i16]>,
        out: &mut [i16],
    ) -> Result<(), Error> {
        check_lengths(mic.len(), speaker.map(<[i16]>::len), out.len())?;
        if !self.enabled {
            out.copy_from_slice(mic);
            return Ok(());
        }

        let len = self.capped_len(mic.len());
        self.backend.s16_to_float(&mic[..len], &mut self.near[..len]);
        if let Some(speaker) = speaker {
            self.backend.s16_to_float(&speaker[..len], &mut self.far[..len]);
        }
        self.process_aligned(len, speaker.is_some());

        self.backend.float_to_s16(&self.out[..len], &mut out[..len]);
        out[len..].copy_from_slice(&mic[len..]);
        Ok(())
    }

    /// Appends speaker output to the playback ring.
    pub fn playback_f32(&self, samples: &[f32]) {
        self.playback.write(samples);
    }

    /// 16-bit variant of [`playback_f32`](Self::playback_f32).
    pub fn playback_i16(&self, samples: &[i16]) {
        PlaybackHandle {
            ring: Arc::clone(&self.playback),
        }
        .write_i16(samples);
    }

    /// Returns a producer handle that can be moved to the render thread.
    ///
    /// Only one thread may write at a time, whether through handles or
    /// [`playback_f32`](Self::playback_f32).
    pub fn playback_handle(&self) -> PlaybackHandle {
        PlaybackHandle {
            ring: Arc::clone(&self.playback),
        }
    }

    /// Cancels echo from `mic` using the delay-compensated playback history
    /// as the far-end reference.
    pub fn capture_f32(&mut self, mic: &[f32], out: &mut [f32]) -> Result<(), Error> {
        check_lengths(mic.len(), None, out.len())?;
        if !self.enabled {
            out.copy_from_slice(mic);
            return Ok(());
        }

        let len = self.capped_len(mic.len());
        self.near[..len].copy_from_slice(&mic[..len]);
        self.process_from_playback(len);

        out[..len].copy_from_slice(&self.out[..len]);
        out[len..].copy_from_slice(&mic[len..]);
        Ok(())
    }

    /// 16-bit variant of [`capture_f32`](Self::capture_f32).
    pub fn capture_i16(&mut self, mic: &[i16], out: &mut [i16]) -> Result<(), Error> {
        check_lengths(mic.len(), None, out.len())?;
        if !self.enabled {
            out.copy_from_slice(mic);
            return Ok(());
        }

        let len = self.capped_len(mic.len());
        self.backend.s16_to_float(&mic[..len], &mut self.near[..len]);
        self.process_from_playback(len);

        self.backend.float_to_s16(&self.out[..len], &mut out[..len]);
        out[len..].copy_from_slice(&mic[len..]);
        Ok(())
    }

    /// Disabled cancellers copy input to output without touching any state.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sets the playback-to-capture delay in samples, e.g. as reported by the
    /// audio driver. Zero clears it and falls back to estimation.
    pub fn set_delay(&mut self, delay_samples: i32) -> Result<(), Error> {
        let delay =
            usize::try_from(delay_samples).map_err(|_| Error::NegativeDelay(delay_samples))?;
        self.known_delay = (delay > 0).then_some(delay);
        tracing::debug!("[aec]: known delay set to {}", delay);
        Ok(())
    }

    /// Current delay in samples: the known delay if set, else the estimate,
    /// else twice the frame size.
    pub fn delay(&self) -> i32 {
        match (self.known_delay, &self.delay_estimator) {
            (Some(delay), _) => delay as i32,
            (None, Some(estimator)) => estimator.delay(),
            (None, None) => 2 * self.config.frame_size as i32,
        }
    }

    /// Turns automatic delay estimation on or off, creating the estimator on
    /// first use.
    pub fn enable_delay_estimation(&mut self, enabled: bool) {
        self.config.enable_delay_estimation = enabled;
        if enabled && self.delay_estimator.is_none() {
            self.create_delay_estimator();
        }
    }

    /// Updates the residual suppression levels in (negative) dB.
    pub fn set_suppress(&mut self, suppress_db: f32, suppress_active_db: f32) {
        self.config.echo_suppress_db = suppress_db;
        self.config.echo_suppress_active_db = suppress_active_db;
        self.suppressor.set_levels(suppress_db, suppress_active_db);
    }

    pub fn dtd_state(&self) -> DtdState {
        self.dtd.state()
    }

    pub fn state(&self) -> AecState {
        let metrics = self.canceller.metrics();
        let (delay, stable) = match (self.known_delay, &self.delay_estimator) {
            (Some(delay), _) => (delay as i32, true),
            (None, Some(estimator)) => (estimator.delay(), estimator.is_stable()),
            (None, None) => (0, false),
        };
        AecState {
            dtd_state: self.dtd.state(),
            estimated_delay_samples: delay,
            estimated_delay_ms: delay as f32 * 1000.0 / self.config.sample_rate as f32,
            erle_db: metrics.erle_db(),
            convergence: metrics.convergence(),
            delay_stable: stable,
            frames_processed: self.frames_processed,
        }
    }

    /// Returns every component to its initial state and discards buffered
    /// playback. The known delay and the enabled flag are kept.
    ///
    /// Must not run concurrently with a playback write.
    pub fn reset(&mut self) {
        tracing::debug!("[aec]: reset");
        self.canceller.reset();
        self.dtd.reset();
        if let Some(estimator) = &mut self.delay_estimator {
            estimator.reset();
        }
        self.suppressor.reset();
        self.playback.discard();
        self.frames_processed = 0;
    }

    fn create_delay_estimator(&mut self) {
        let tail = self.config.tail_samples();
        let config = DelayEstimatorConfig {
            sample_rate: self.config.sample_rate,
            frame_size: (self.config.frame_size + tail).min(delay_estimator::MAX_FRAME_SIZE),
            max_delay_samples: tail,
            ..Default::default()
        };
        match DelayEstimator::with_backend(config, self.backend) {
            Ok(estimator) => self.delay_estimator = Some(estimator),
            Err(err) => tracing::warn!("[aec]: delay estimation unavailable: {}", err),
        }
    }

    /// Number of samples to filter from a call of `len` samples.
    fn capped_len(&mut self, len: usize) -> usize {
        let capped = len.min(self.config.frame_size);
        if capped < len && self.capped_log_counter < MAX_CAPPED_FRAME_LOGS {
            tracing::warn!(
                "[aec]: {} samples exceed frame size {}; passing {} through unprocessed",
                len,
                self.config.frame_size,
                len - capped
            );
            self.capped_log_counter += 1;
        }
        capped
    }

    /// Runs the pipeline on `near[..len]` with `far[..len]` as an aligned
    /// reference (when `has_far`).
    fn process_aligned(&mut self, len: usize, has_far: bool) {
        if has_far && self.config.enable_delay_estimation {
            if let Some(estimator) = &mut self.delay_estimator {
                estimator.estimate(&self.far[..len], &self.near[..len]);
            }
        }
        self.cancel(len, has_far);
    }

    /// Loads the far-end reference for `near[..len]` from the playback ring,
    /// then runs the pipeline.
    ///
    /// With the write cursor taken at the start of the frame, the reference
    /// begins `delay` samples before it: `len + delay` behind the current
    /// write cursor, since the matching playback frame was written first.
    fn process_from_playback(&mut self, len: usize) {
        let delay = match self.known_delay {
            Some(delay) => delay,
            None => self.estimate_playback_delay(len),
        };
        self.playback.read_delayed(delay + len, &mut self.far[..len]);
        self.cancel(len, true);
    }

    /// Playback-to-capture delay for the current capture frame.
    fn estimate_playback_delay(&mut self, len: usize) -> usize {
        let Some(estimator) = self.delay_estimator.as_mut() else {
            return 2 * self.config.frame_size;
        };
        if self.config.enable_delay_estimation {
            self.playback.copy_latest(&mut self.history);
            let window = self.mic_window.len();
            self.mic_window[..window - len].fill(0.0);
            self.mic_window[window - len..].copy_from_slice(&self.near[..len]);
            estimator.estimate(&self.history, &self.mic_window);
        }
        estimator.delay().max(0) as usize
    }

    fn cancel(&mut self, len: usize, has_far: bool) {
        let far = if has_far { Some(&self.far[..len]) } else { None };
        let dtd = if self.config.enable_dtd { Some(&mut self.dtd) } else { None };
        self.canceller
            .process(&self.near[..len], far, &mut self.out[..len], dtd);

        if self.config.enable_residual_echo_suppress
            && !matches!(self.canceller, Canceller::PassThrough)
        {
            self.suppressor.apply(self.dtd.state(), &mut self.out[..len]);
        }
        self.frames_processed += 1;
    }
}

fn check_lengths(mic: usize, speaker: Option<usize>, out: usize) -> Result<(), Error> {
    if mic == 0 {
        return Err(Error::EmptyFrame);
    }
    if out != mic {
        return Err(Error::LengthMismatch {
            expected: mic,
            actual: out,
        });
    }
    match speaker {
        Some(speaker) if speaker != mic => Err(Error::LengthMismatch {
            expected: mic,
            actual: speaker,
        }),
        _ => Ok(()),
    }
}
