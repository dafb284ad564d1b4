//! Time-domain NLMS echo canceller.
//!
//! Direct-form FIR over the far-end history, adapted per sample with
//! step `mu / (|x|^2 + eps)`. Double-talk gating is decided once per frame
//! from the detector state at the start of the frame; the detector is then
//! updated from the frame's aggregate energies.

use echokit_simd::SimdBackend;

use crate::dtd::DoubleTalkDetector;
use crate::metrics::EchoMetrics;

/// Longest supported filter.
pub const MAX_FILTER_LENGTH: usize = 4096;
const EPSILON: f32 = 1e-6;

/// Normalized least-mean-squares adaptive FIR filter.
#[derive(derive_more::Debug)]
pub struct Nlms {
    step_size: f32,
    backend: SimdBackend,
    /// Far-end history, newest sample first.
    #[debug(skip)]
    history: Vec<f32>,
    #[debug(skip)]
    weights: Vec<f32>,
    metrics: EchoMetrics,
}

impl Nlms {
    /// Creates a filter with `filter_length` taps, capped at
    /// [`MAX_FILTER_LENGTH`] and raised to at least one.
    pub fn new(filter_length: usize, step_size: f32, backend: SimdBackend) -> Self {
        let length = filter_length.clamp(1, MAX_FILTER_LENGTH);
        if length != filter_length {
            tracing::warn!(
                "[aec]: NLMS filter length {} clamped to {}",
                filter_length,
                length
            );
        }
        Self {
            step_size,
            backend,
            history: vec![0.0; length],
            weights: vec![0.0; length],
            metrics: EchoMetrics::new(),
        }
    }

    pub fn filter_length(&self) -> usize {
        self.weights.len()
    }

    pub fn step_size(&self) -> f32 {
        self.step_size
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn metrics(&self) -> &EchoMetrics {
        &self.metrics
    }

    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.weights.fill(0.0);
        self.metrics.reset();
    }

    /// Cancels echo of `far` from `near` into `out`.
    ///
    /// A missing far end is treated as silence.
    ///
    /// # Panics
    ///
    /// Panics if `out` (or `far`, when present) differs in length from `near`.
    pub fn process(
        &mut self,
        near: &[f32],
        far: Option<&[f32]>,
        out: &mut [f32],
        dtd: Option<&mut DoubleTalkDetector>,
    ) {
        assert_eq!(out.len(), near.len(), "output length");
        if let Some(far) = far {
            assert_eq!(far.len(), near.len(), "far-end length");
        }
        let adapt = dtd
            .as_deref()
            .map_or(true, |dtd| dtd.state().allows_adaptation());

        let last = self.history.len() - 1;
        for (n, (o, &y)) in out.iter_mut().zip(near).enumerate() {
            self.history.copy_within(..last, 1);
            self.history[0] = far.map_or(0.0, |far| far[n]);

            let echo = self.backend.dot_product(&self.weights, &self.history);
            let error = y - echo;
            *o = error;

            if adapt {
                let power = self.backend.energy(&self.history);
                let step = self.step_size / (power + EPSILON);
                self.backend
                    .scaled_accumulate(&mut self.weights, &self.history, step * error);
            }
        }

        let far_energy = far.map_or(0.0, |far| self.backend.energy(far));
        let near_energy = self.backend.energy(near);
        let error_energy = self.backend.energy(out);
        if let Some(dtd) = dtd {
            dtd.update(far_energy, near_energy, error_energy);
        }
        self.metrics.update(near_energy, error_energy);
    }
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
    fn length_is_capped() {
        assert_eq!(Nlms::new(10_000, 0.3, SimdBackend::Scalar).filter_length(), MAX_FILTER_LENGTH);
        assert_eq!(Nlms::new(0, 0.3, SimdBackend::Scalar).filter_length(), 1);
    }

    #[test]
    fn identifies_short_echo_path() {
        let frame = 160;
        let frames = 100;
        let delay = 10;
        let far = noise(frame * frames + delay, 17);
        let mut nlms = Nlms::new(64, 0.3, SimdBackend::Scalar);
        let mut out = vec![0.0; frame];

        for f in 0..frames {
            let start = f * frame + delay;
            let far_frame = &far[start..start + frame];
            let near: Vec<f32> = far[start - delay..start - delay + frame]
                .iter()
                .map(|v| 0.5 * v)
                .collect();
            nlms.process(&near, Some(far_frame), &mut out, None);
        }

        assert!(nlms.metrics().erle_db() > 10.0, "erle {}", nlms.metrics().erle_db());
        let peak = nlms
            .weights()
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, delay);
        assert!((nlms.weights()[delay] - 0.5).abs() < 0.05);
    }

    #[test]
    fn gating_uses_state_from_frame_start() {
        let frame = 160;
        let far = noise(frame, 1);
        let near = noise(frame, 2);
        let mut out = vec![0.0; frame];
        let mut nlms = Nlms::new(32, 0.3, SimdBackend::Scalar);
        let mut dtd = DoubleTalkDetector::new(0.65);

        // Idle at the start of the first frame, so it adapts.
        nlms.process(&near, Some(&far), &mut out, Some(&mut dtd));
        assert!(nlms.weights().iter().any(|&w| w != 0.0));
        assert_eq!(dtd.state(), DtdState::DoubleTalk);

        // Double talk at the start of the second frame freezes the weights.
        let frozen = nlms.weights().to_vec();
        nlms.process(&near, Some(&far), &mut out, Some(&mut dtd));
        assert_eq!(nlms.weights(), frozen.as_slice());
    }

    #[test]
    fn missing_far_end_passes_near_through() {
        let near = noise(160, 4);
        let mut out = vec![0.0; 160];
        let mut nlms = Nlms::new(128, 0.3, SimdBackend::Scalar);
        nlms.process(&near, None, &mut out, None);
        assert_eq!(out, near);
    }
}
