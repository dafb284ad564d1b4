//! GCC-PHAT delay estimator.
//!
//! Estimates how many samples the capture signal lags the reference by
//! correlating the two in the frequency domain:
//!
//! 1. Zero-pad both signals to the FFT length and transform them.
//! 2. Form the cross spectrum `Cap(f) * conj(Ref(f))`, optionally whitened
//!    to unit magnitude per bin (the phase transform).
//! 3. Inverse-transform to get the circular cross-correlation, then search
//!    lags `[min, max]` at index `lag` (capture lags) and `n - lag`
//!    (reference lags).
//!
//! Confidence compares the peak against the best value at least
//! [`PEAK_EXCLUSION`] bins away. Valid estimates feed a confidence-weighted
//! history that produces the reported delay.

use echokit_fft::{ComplexFft, FftBuffer};
use echokit_simd::SimdBackend;

use crate::ring_index::RingIndex;

/// Largest supported analysis frame.
pub const MAX_FRAME_SIZE: usize = 4096;
/// Energy floor below which a frame is considered silent. Also the PHAT
/// magnitude floor.
pub const MIN_ENERGY: f32 = 1e-8;
/// History variance (samples²) below which the estimate counts as stable.
pub const STABILITY_VARIANCE: f32 = 100.0;
/// Minimum distance from the main peak for the runner-up.
pub const PEAK_EXCLUSION: usize = 10;

/// Estimator configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayEstimatorConfig {
    pub sample_rate: u32,
    /// Largest number of samples passed to a single `estimate` call.
    pub frame_size: usize,
    pub min_delay_samples: usize,
    pub max_delay_samples: usize,
    /// Number of past estimates used for smoothing.
    pub history_size: usize,
    /// Minimum confidence for an estimate to be valid.
    pub confidence_threshold: f32,
    /// Whiten the cross spectrum (GCC-PHAT) instead of plain cross-correlation.
    pub use_phat: bool,
}

impl Default for DelayEstimatorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            frame_size: 512,
            min_delay_samples: 0,
            // 300 ms at 16 kHz.
            max_delay_samples: 4800,
            history_size: 8,
            confidence_threshold: 0.3,
            use_phat: true,
        }
    }
}

/// Construction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DelayEstimatorError {
    #[error("sample rate must be non-zero")]
    ZeroSampleRate,
    #[error("frame size {0} outside 1..={max}", max = MAX_FRAME_SIZE)]
    BadFrameSize(usize),
    #[error("min delay {min} exceeds max delay {max}")]
    BadDelayRange { min: usize, max: usize },
    #[error("history size must be non-zero")]
    ZeroHistory,
}

/// Result of one `estimate` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayEstimate {
    /// Positive when the capture lags the reference.
    pub delay_samples: i32,
    pub delay_ms: f32,
    /// `peak / (peak + second_peak)`, in `[0, 1]` for non-degenerate input.
    pub confidence: f32,
    pub correlation_peak: f32,
    pub valid: bool,
}

/// Snapshot of the estimator's statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayEstimatorState {
    pub current_delay_samples: i32,
    pub current_delay_ms: f32,
    pub average_delay_ms: f32,
    /// Variance of the history around the smoothed delay, in samples².
    pub delay_variance: f32,
    pub total_estimates: u64,
    pub valid_estimates: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct DelayHistoryEntry {
    delay: i32,
    confidence: f32,
}

/// GCC-PHAT delay estimator with history smoothing.
///
/// All buffers are allocated at construction; `estimate` never allocates.
#[derive(derive_more::Debug)]
pub struct DelayEstimator {
    config: DelayEstimatorConfig,
    backend: SimdBackend,
    fft: ComplexFft,
    #[debug(skip)]
    reference: FftBuffer,
    #[debug(skip)]
    capture: FftBuffer,
    #[debug(skip)]
    cross: FftBuffer,
    #[debug(skip)]
    correlation: Vec<f32>,
    /// Reference (`re`) and capture (`im`) after 16-bit conversion.
    #[debug(skip)]
    converted: FftBuffer,
    history: Vec<DelayHistoryEntry>,
    history_index: RingIndex,
    current_delay: i32,
    smoothed_delay: f32,
    total_estimates: u64,
    valid_estimates: u64,
}

impl DelayEstimator {
    /// Creates an estimator using the detected SIMD backend.
    pub fn new(config: DelayEstimatorConfig) -> Result<Self, DelayEstimatorError> {
        Self::with_backend(config, echokit_simd::detect_backend())
    }

    pub fn with_backend(
        config: DelayEstimatorConfig,
        backend: SimdBackend,
    ) -> Result<Self, DelayEstimatorError> {
        if config.sample_rate == 0 {
            return Err(DelayEstimatorError::ZeroSampleRate);
        }
        if config.frame_size == 0 || config.frame_size > MAX_FRAME_SIZE {
            return Err(DelayEstimatorError::BadFrameSize(config.frame_size));
        }
        if config.min_delay_samples > config.max_delay_samples {
            return Err(DelayEstimatorError::BadDelayRange {
                min: config.min_delay_samples,
                max: config.max_delay_samples,
            });
        }
        if config.history_size == 0 {
            return Err(DelayEstimatorError::ZeroHistory);
        }

        let fft_size = fft_size_for(config.frame_size, config.max_delay_samples);
        tracing::debug!(
            fft_size,
            max_delay = config.max_delay_samples,
            phat = config.use_phat,
            "creating delay estimator"
        );

        Ok(Self {
            backend,
            fft: ComplexFft::with_backend(fft_size, backend),
            reference: FftBuffer::new(fft_size),
            capture: FftBuffer::new(fft_size),
            cross: FftBuffer::new(fft_size),
            correlation: vec![0.0; fft_size],
            converted: FftBuffer::new(fft_size),
            history: vec![DelayHistoryEntry::default(); config.history_size],
            history_index: RingIndex::new(config.history_size),
            current_delay: 0,
            smoothed_delay: 0.0,
            total_estimates: 0,
            valid_estimates: 0,
            config,
        })
    }

    pub fn config(&self) -> &DelayEstimatorConfig {
        &self.config
    }

    /// Correlation length (a power of two).
    pub fn fft_size(&self) -> usize {
        self.fft.len()
    }

    /// Clears history and statistics. Buffers are kept.
    pub fn reset(&mut self) {
        self.current_delay = 0;
        self.smoothed_delay = 0.0;
        self.total_estimates = 0;
        self.valid_estimates = 0;
        self.history.fill(DelayHistoryEntry::default());
        self.history_index.clear();
        self.correlation.fill(0.0);
    }

    /// Estimates the lag of `capture` relative to `reference`.
    ///
    /// Uses the common prefix of both slices, capped at the FFT length.
    /// Near-silent input short-circuits to the last known delay with zero
    /// confidence and leaves the history untouched.
    pub fn estimate(&mut self, reference: &[f32], capture: &[f32]) -> DelayEstimate {
        let count = reference.len().min(capture.len()).min(self.fft.len());
        let reference = &reference[..count];
        let capture = &capture[..count];

        if self.backend.energy(reference) < MIN_ENERGY || self.backend.energy(capture) < MIN_ENERGY
        {
            return DelayEstimate {
                delay_samples: self.current_delay,
                delay_ms: self.samples_to_ms(self.current_delay as f32),
                confidence: 0.0,
                correlation_peak: 0.0,
                valid: false,
            };
        }

        self.gcc_phat(reference, capture);
        let estimate = self.find_peak();

        self.history[self.history_index.write()] = DelayHistoryEntry {
            delay: estimate.delay_samples,
            confidence: estimate.confidence,
        };
        self.history_index.push();

        if estimate.valid {
            self.update_smoothed_delay();
            self.valid_estimates += 1;
        }
        self.total_estimates += 1;

        tracing::trace!(
            delay = estimate.delay_samples,
            confidence = estimate.confidence,
            current = self.current_delay,
            "delay estimate"
        );
        estimate
    }

    /// 16-bit variant of [`estimate`](Self::estimate).
    ///
    /// Converts into preallocated scratch, so the sample count is capped at
    /// the FFT length.
    pub fn estimate_i16(&mut self, reference: &[i16], capture: &[i16]) -> DelayEstimate {
        let count = reference.len().min(capture.len()).min(self.fft.len());
        let mut ref_f = std::mem::take(&mut self.converted.re);
        let mut cap_f = std::mem::take(&mut self.converted.im);
        self.backend.s16_to_float(&reference[..count], &mut ref_f[..count]);
        self.backend.s16_to_float(&capture[..count], &mut cap_f[..count]);
        let estimate = self.estimate(&ref_f[..count], &cap_f[..count]);
        self.converted.re = ref_f;
        self.converted.im = cap_f;
        estimate
    }

    /// Current smoothed delay in samples.
    pub fn delay(&self) -> i32 {
        self.current_delay
    }

    pub fn delay_ms(&self) -> f32 {
        self.samples_to_ms(self.current_delay as f32)
    }

    /// Forces a known delay, e.g. one reported by the audio driver.
    ///
    /// Fills the whole history with full-confidence entries.
    pub fn set_delay(&mut self, delay_samples: i32) {
        self.current_delay = delay_samples;
        self.smoothed_delay = delay_samples as f32;
        self.history.fill(DelayHistoryEntry {
            delay: delay_samples,
            confidence: 1.0,
        });
        self.history_index.fill();
    }

    pub fn state(&self) -> DelayEstimatorState {
        DelayEstimatorState {
            current_delay_samples: self.current_delay,
            current_delay_ms: self.delay_ms(),
            average_delay_ms: self.samples_to_ms(self.smoothed_delay),
            delay_variance: self.delay_variance(),
            total_estimates: self.total_estimates,
            valid_estimates: self.valid_estimates,
        }
    }

    /// True once the history is at least half full and its variance is
    /// below [`STABILITY_VARIANCE`].
    pub fn is_stable(&self) -> bool {
        let count = self.history_index.count();
        count > 0
            && count >= self.config.history_size / 2
            && self.delay_variance() < STABILITY_VARIANCE
    }

    /// Correlation sequence from the last non-silent `estimate` call.
    ///
    /// Index `k` holds lag `k` for `k < n/2` and lag `k - n` above.
    pub fn correlation(&self) -> &[f32] {
        &self.correlation
    }

    fn gcc_phat(&mut self, reference: &[f32], capture: &[f32]) {
        self.reference.load_real(reference);
        self.capture.load_real(capture);

        let (re, im) = self.reference.parts_mut();
        self.fft.forward(re, im);
        let (re, im) = self.capture.parts_mut();
        self.fft.forward(re, im);

        self.backend.complex_multiply_conjugate(
            &self.capture.re,
            &self.capture.im,
            &self.reference.re,
            &self.reference.im,
            &mut self.cross.re,
            &mut self.cross.im,
        );
        if self.config.use_phat {
            let (re, im) = self.cross.parts_mut();
            self.backend.phase_normalize(re, im, MIN_ENERGY);
        }

        let (re, im) = self.cross.parts_mut();
        self.fft.inverse(re, im);
        self.correlation.copy_from_slice(&self.cross.re);
    }

    fn find_peak(&self) -> DelayEstimate {
        let n = self.correlation.len();
        let lags = self.config.min_delay_samples..=self.config.max_delay_samples.min(n - 1);

        let mut peak = f32::NEG_INFINITY;
        let mut peak_index = 0;
        let mut delay = 0_i32;
        for lag in lags.clone() {
            if self.correlation[lag] > peak {
                peak = self.correlation[lag];
                peak_index = lag;
                delay = lag as i32;
            }
        }
        for lag in lags.filter(|&lag| lag > 0) {
            let index = n - lag;
            if self.correlation[index] > peak {
                peak = self.correlation[index];
                peak_index = index;
                delay = -(lag as i32);
            }
        }

        let second = self
            .correlation
            .iter()
            .enumerate()
            .filter(|&(i, _)| circular_distance(i, peak_index, n) >= PEAK_EXCLUSION)
            .map(|(_, &v)| v)
            .fold(f32::NEG_INFINITY, f32::max);

        let confidence = if second > MIN_ENERGY {
            peak / (peak + second)
        } else if peak > MIN_ENERGY {
            1.0
        } else {
            0.0
        };

        DelayEstimate {
            delay_samples: delay,
            delay_ms: self.samples_to_ms(delay as f32),
            confidence,
            correlation_peak: peak,
            valid: confidence >= self.config.confidence_threshold,
        }
    }

    fn update_smoothed_delay(&mut self) {
        let threshold = self.config.confidence_threshold;
        let (weighted_sum, total_weight) = self.history[..self.history_index.count()]
            .iter()
            .filter(|entry| entry.confidence > threshold)
            .fold((0.0_f32, 0.0_f32), |(sum, weight), entry| {
                (sum + entry.delay as f32 * entry.confidence, weight + entry.confidence)
            });

        if total_weight > 0.0 {
            self.smoothed_delay = weighted_sum / total_weight;
            self.current_delay = self.smoothed_delay.round() as i32;
        }
    }

    fn delay_variance(&self) -> f32 {
        let count = self.history_index.count();
        if count <= 1 {
            return 0.0;
        }
        let sum: f32 = self.history[..count]
            .iter()
            .map(|entry| {
                let diff = entry.delay as f32 - self.smoothed_delay;
                diff * diff
            })
            .sum();
        sum / count as f32
    }

    fn samples_to_ms(&self, samples: f32) -> f32 {
        samples / self.config.sample_rate as f32 * 1000.0
    }
}

/// Smallest power of two covering both twice the frame and twice the
/// largest searched lag.
fn fft_size_for(frame_size: usize, max_delay: usize) -> usize {
    (2 * frame_size).max(2 * max_delay).max(2).next_power_of_two()
}

fn circular_distance(a: usize, b: usize, n: usize) -> usize {
    let d = a.abs_diff(b);
    d.min(n - d)
}
