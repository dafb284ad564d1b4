//! Partitioned frequency-domain adaptive filter (FDAF).
//!
//! The echo path is modelled as `num_blocks` frequency-domain coefficient
//! blocks, one per frame of filter tail. Each frame:
//!
//! 1. The far-end history (`fft_size` samples, newest frame last) is
//!    windowed and transformed. The window is the rising half of a Hann
//!    window over the older half of the history and flat over the newer
//!    half, so the samples the echo estimate is read from are never
//!    attenuated. The spectrum joins a ring of the last `num_blocks` far-end
//!    spectra.
//! 2. The echo spectrum is `sum_k H_k * X_k`, where `X_k` is the far-end
//!    spectrum `k` frames old. The last `frame` samples of its inverse
//!    transform are the time-domain echo estimate (overlap-save).
//! 3. The error `near - echo` is the output. Its energy, along with the far
//!    and near energies, drives the double-talk detector.
//! 4. Unless the detector reports double talk or near-end speech, the error
//!    is placed at the same trailing position, transformed, and block 0 takes
//!    a normalized gradient step `H_0 += mu * E * conj(X_0) / (|X_0|^2 + eps)`.
//!    Older blocks are not adapted directly.
//!
//! `eps` is not a fixed constant: it is 1% of the mean bin power of `X_0`
//! (never below `1e-10`). A fixed tiny floor lets near-empty bins take huge
//! steps and blow up the coefficients on band-limited far-end signals.

use echokit_fft::{ComplexFft, FftBuffer};
use echokit_simd::SimdBackend;

use crate::dtd::DoubleTalkDetector;
use crate::metrics::EchoMetrics;
use crate::ring_index::RingIndex;

/// Largest transform length.
pub const MAX_FFT_SIZE: usize = 1024;
/// Largest number of coefficient blocks.
pub const MAX_BLOCKS: usize = 16;
/// Regularization relative to the mean far-end bin power.
const RELATIVE_REGULARIZATION: f32 = 0.01;
const MIN_REGULARIZATION: f32 = 1e-10;

/// Frequency-domain block adaptive filter.
#[derive(derive_more::Debug)]
pub struct Fdaf {
    frame_size: usize,
    step_size: f32,
    backend: SimdBackend,
    fft: ComplexFft,
    #[debug(skip)]
    window: Vec<f32>,
    #[debug(skip)]
    far_history: Vec<f32>,
    #[debug(skip)]
    far_spectra: Vec<FftBuffer>,
    far_index: RingIndex,
    #[debug(skip)]
    coefficients: Vec<FftBuffer>,
    #[debug(skip)]
    echo: FftBuffer,
    #[debug(skip)]
    error: FftBuffer,
    #[debug(skip)]
    gradient: FftBuffer,
    #[debug(skip)]
    far_power: Vec<f32>,
    metrics: EchoMetrics,
}

impl Fdaf {
    /// Creates a filter for frames of up to `frame_size` samples covering
    /// `tail_samples` of echo path.
    ///
    /// # Panics
    ///
    /// Panics if `frame_size` is zero or exceeds half of [`MAX_FFT_SIZE`].
    pub fn new(frame_size: usize, tail_samples: usize, step_size: f32, backend: SimdBackend) -> Self {
        assert!(
            frame_size > 0 && frame_size <= MAX_FFT_SIZE / 2,
            "FDAF frame size must be in 1..={}, got {frame_size}",
            MAX_FFT_SIZE / 2
        );
        let fft_size = (2 * frame_size).next_power_of_two().min(MAX_FFT_SIZE);
        let num_blocks = tail_samples.div_ceil(frame_size).clamp(1, MAX_BLOCKS);
        tracing::debug!(
            "[aec]: FDAF frame {} fft {} blocks {}",
            frame_size,
            fft_size,
            num_blocks
        );

        Self {
            frame_size,
            step_size,
            backend,
            fft: ComplexFft::with_backend(fft_size, backend),
            window: analysis_window(fft_size),
            far_history: vec![0.0; fft_size],
            far_spectra: (0..num_blocks).map(|_| FftBuffer::new(fft_size)).collect(),
            far_index: RingIndex::new(num_blocks),
            coefficients: (0..num_blocks).map(|_| FftBuffer::new(fft_size)).collect(),
            echo: FftBuffer::new(fft_size),
            error: FftBuffer::new(fft_size),
            gradient: FftBuffer::new(fft_size),
            far_power: vec![0.0; fft_size],
            metrics: EchoMetrics::new(),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn fft_size(&self) -> usize {
        self.fft.len()
    }

    pub fn num_blocks(&self) -> usize {
        self.coefficients.len()
    }

    pub fn step_size(&self) -> f32 {
        self.step_size
    }

    pub fn metrics(&self) -> &EchoMetrics {
        &self.metrics
    }

    /// Zeroes coefficients, histories and metrics.
    pub fn reset(&mut self) {
        self.far_history.fill(0.0);
        self.far_spectra.iter_mut().for_each(FftBuffer::clear);
        self.far_index.clear();
        self.coefficients.iter_mut().for_each(FftBuffer::clear);
        self.echo.clear();
        self.error.clear();
        self.gradient.clear();
        self.metrics.reset();
    }

    /// Cancels echo of `far` from `near` into `out`.
    ///
    /// A missing far end is treated as silence. `dtd` is updated with this
    /// frame's energies and gates adaptation; `None` always adapts.
    ///
    /// # Panics
    ///
    /// Panics if `near` is longer than the frame size, or if `out` (or
    /// `far`, when present) differs in length from `near`.
    pub fn process(
        &mut self,
        near: &[f32],
        far: Option<&[f32]>,
        out: &mut [f32],
        dtd: Option<&mut DoubleTalkDetector>,
    ) {
        let len = near.len();
        assert!(len <= self.frame_size, "frame of {len} exceeds {}", self.frame_size);
        assert_eq!(out.len(), len, "output length");
        if let Some(far) = far {
            assert_eq!(far.len(), len, "far-end length");
        }
        let n = self.fft.len();
        let tail = n - len;

        self.far_history.copy_within(len.., 0);
        match far {
            Some(far) => self.far_history[tail..].copy_from_slice(far),
            None => self.far_history[tail..].fill(0.0),
        }

        let slot = self.far_index.write();
        let spectrum = &mut self.far_spectra[slot];
        for ((re, &x), &w) in spectrum.re.iter_mut().zip(&self.far_history).zip(&self.window) {
            *re = x * w;
        }
        spectrum.im.fill(0.0);
        let (re, im) = spectrum.parts_mut();
        self.fft.forward(re, im);
        self.far_index.push();

        self.echo.clear();
        for (age, h) in self.coefficients.iter().enumerate() {
            let x = &self.far_spectra[self.far_index.recent(age)];
            self.backend.complex_multiply_accumulate(
                &x.re,
                &x.im,
                &h.re,
                &h.im,
                &mut self.echo.re,
                &mut self.echo.im,
            );
        }
        let (re, im) = self.echo.parts_mut();
        self.fft.inverse(re, im);

        for ((o, &y), &echo) in out.iter_mut().zip(near).zip(&self.echo.re[tail..]) {
            *o = y - echo;
        }

        let far_energy = far.map_or(0.0, |far| self.backend.energy(far));
        let near_energy = self.backend.energy(near);
        let error_energy = self.backend.energy(out);
        let adapt = dtd.map_or(true, |dtd| {
            dtd.update(far_energy, near_energy, error_energy)
                .allows_adaptation()
        });

        if adapt {
            self.adapt(out, tail);
        }
        self.metrics.update(near_energy, error_energy);
    }

    fn adapt(&mut self, error: &[f32], tail: usize) {
        // `tail >= fft_size / 2`, where the window is flat.
        self.error.clear();
        self.error.re[tail..].copy_from_slice(error);
        let (re, im) = self.error.parts_mut();
        self.fft.forward(re, im);

        let x0 = &self.far_spectra[self.far_index.recent(0)];
        self.backend.complex_multiply_conjugate(
            &self.error.re,
            &self.error.im,
            &x0.re,
            &x0.im,
            &mut self.gradient.re,
            &mut self.gradient.im,
        );

        self.backend.power_spectrum(&x0.re, &x0.im, &mut self.far_power);
        let mean_power = self.far_power.iter().sum::<f32>() / self.far_power.len() as f32;
        let eps = (RELATIVE_REGULARIZATION * mean_power).max(MIN_REGULARIZATION);

        let h0 = &mut self.coefficients[0];
        for (i, &power) in self.far_power.iter().enumerate() {
            let gain = self.step_size / (power + eps);
            h0.re[i] += gain * self.gradient.re[i];
            h0.im[i] += gain * self.gradient.im[i];
        }
    }
}

/// Rising half of a length-`n` Hann window, then ones.
fn analysis_window(n: usize) -> Vec<f32> {
    let denom = (n - 1).max(1) as f32;
    (0..n)
        .map(|i| {
            if i < n / 2 {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / denom).cos())
            } else {
                1.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtd::DtdState;

    fn noise(len: usize, seed: u64) -> Vec<f32> {
        let mut state = seed.max(1);
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 40) as f32 / (1u64 << 24) as f32 - 0.5
            })
            .collect()
    }

    #[test]
    fn sizes_follow_frame_and_tail() {
        let fdaf = Fdaf::new(160, 3200, 0.3, SimdBackend::Scalar);
        assert_eq!(fdaf.fft_size(), 512);
        assert_eq!(fdaf.num_blocks(), 16);

        let fdaf = Fdaf::new(128, 300, 0.3, SimdBackend::Scalar);
        assert_eq!(fdaf.fft_size(), 256);
        assert_eq!(fdaf.num_blocks(), 3);

        let fdaf = Fdaf::new(512, 0, 0.3, SimdBackend::Scalar);
        assert_eq!(fdaf.fft_size(), 1024);
        assert_eq!(fdaf.num_blocks(), 1);
    }

    #[test]
    fn analysis_window_is_flat_over_newest_half() {
        let w = analysis_window(512);
        assert_eq!(w[0], 0.0);
        assert!(w[..256].windows(2).all(|p| p[0] <= p[1]));
        assert!(w[255] > 0.99);
        assert!(w[256..].iter().all(|&v| v == 1.0));
    }

    #[test]
    fn missing_far_end_passes_near_through() {
        let mut fdaf = Fdaf::new(128, 512, 0.3, SimdBackend::Scalar);
        let near = noise(128, 3);
        let mut out = vec![0.0; 128];

        for _ in 0..10 {
            fdaf.process(&near, None, &mut out, None);
        }

        for i in 0..128 {
            assert!((out[i] - near[i]).abs() < 1e-6, "mismatch at {i}");
        }
    }

    #[test]
    fn converges_on_delayed_echo() {
        let frame = 128;
        let delay = 64;
        let far = noise(frame, 42);
        let near: Vec<f32> = (0..frame)
            .map(|i| 0.5 * far[(i + frame - delay) % frame])
            .collect();
        let mut out = vec![0.0; frame];
        let mut fdaf = Fdaf::new(frame, 4 * frame, 0.3, SimdBackend::Scalar);

        let mut erle_at_100 = 0.0;
        for n in 1..=500 {
            fdaf.process(&near, Some(&far), &mut out, None);
            if n == 100 {
                erle_at_100 = fdaf.metrics().erle_db();
            }
        }

        let erle = fdaf.metrics().erle_db();
        assert!(erle > 6.0, "erle {erle}");
        assert!(erle > erle_at_100, "erle {erle} vs {erle_at_100} at frame 100");
        assert!(fdaf.metrics().convergence() > 0.0);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn converges_with_fft_wider_than_two_frames() {
        // frame 160 -> fft 512, so the newest frame sits well inside the
        // window's flat half.
        let frame = 160;
        let delay = 40;
        let frames = 600;
        let signal = noise(frames * frame + delay, 17);
        let mut fdaf = Fdaf::new(frame, 3200, 0.3, SimdBackend::Scalar);
        assert_eq!(fdaf.fft_size(), 512);
        let mut out = vec![0.0; frame];

        for n in 0..frames {
            let start = n * frame + delay;
            let far = &signal[start..start + frame];
            let near: Vec<f32> = signal[start - delay..start - delay + frame]
                .iter()
                .map(|v| 0.5 * v)
                .collect();
            fdaf.process(&near, Some(far), &mut out, None);
        }

        let erle = fdaf.metrics().erle_db();
        assert!(erle > 6.0, "erle {erle}");
    }

    #[test]
    fn double_talk_freezes_coefficients() {
        let frame = 128;
        let far = noise(frame, 5);
        let near = noise(frame, 6);
        let mut out = vec![0.0; frame];
        let mut fdaf = Fdaf::new(frame, frame, 0.3, SimdBackend::Scalar);
        let mut dtd = DoubleTalkDetector::new(0.65);

        // Uncorrelated near-end speech over active far end.
        fdaf.process(&near, Some(&far), &mut out, Some(&mut dtd));
        assert_eq!(dtd.state(), DtdState::DoubleTalk);

        for i in 0..frame {
            assert!((out[i] - near[i]).abs() < 1e-6, "mismatch at {i}");
        }
        assert!(fdaf.coefficients.iter().all(|h| h.re.iter().all(|&v| v == 0.0)));
    }

    #[test]
    fn short_frames_are_accepted() {
        let mut fdaf = Fdaf::new(160, 1600, 0.3, SimdBackend::Scalar);
        let far = noise(80, 1);
        let near = noise(80, 2);
        let mut out = vec![0.0; 80];
        fdaf.process(&near, Some(&far), &mut out, None);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn reset_restores_fresh_output() {
        let frame = 128;
        let far = noise(frame, 8);
        let near: Vec<f32> = far.iter().map(|v| v * 0.3).collect();

        let mut fresh = Fdaf::new(frame, 2 * frame, 0.3, SimdBackend::Scalar);
        let mut expected = vec![0.0; frame];
        fresh.process(&near, Some(&far), &mut expected, None);

        let mut used = Fdaf::new(frame, 2 * frame, 0.3, SimdBackend::Scalar);
        let mut out = vec![0.0; frame];
        for _ in 0..20 {
            used.process(&near, Some(&far), &mut out, None);
        }
        used.reset();
        used.process(&near, Some(&far), &mut out, None);

        assert_eq!(out, expected);
        assert_eq!(used.metrics(), fresh.metrics());
    }
}
