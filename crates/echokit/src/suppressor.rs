//! Residual echo suppression.
//!
//! Attenuates whatever the adaptive filter leaves behind while the far end is
//! talking. The gain target follows the talk state and ramps linearly across
//! each frame to avoid discontinuities.

use echokit_aec::DtdState;

/// Returns true when the gain factor is so close to 1 that it would not
/// affect 16-bit samples.
fn gain_close_to_one(gain: f32) -> bool {
    let threshold = 1.0 / 32768.0;
    (1.0 - threshold..=1.0 + threshold).contains(&gain)
}

fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Talk-state driven gain applied after echo cancellation.
#[derive(Debug, Clone)]
pub(crate) struct ResidualEchoSuppressor {
    far_end_gain: f32,
    double_talk_gain: f32,
    last_gain: f32,
}

impl ResidualEchoSuppressor {
    pub(crate) fn new(suppress_db: f32, suppress_active_db: f32) -> Self {
        Self {
            far_end_gain: db_to_linear(suppress_db),
            double_talk_gain: db_to_linear(suppress_active_db),
            last_gain: 1.0,
        }
    }

    pub(crate) fn set_levels(&mut self, suppress_db: f32, suppress_active_db: f32) {
        self.far_end_gain = db_to_linear(suppress_db);
        self.double_talk_gain = db_to_linear(suppress_active_db);
    }

    pub(crate) fn reset(&mut self) {
        self.last_gain = 1.0;
    }

    fn target_gain(&self, state: DtdState) -> f32 {
        match state {
            DtdState::FarEnd => self.far_end_gain,
            DtdState::DoubleTalk => self.double_talk_gain,
            DtdState::Idle | DtdState::NearEnd => 1.0,
        }
    }

    /// Applies the gain for `state`, ramping from the previous frame's gain.
    pub(crate) fn apply(&mut self, state: DtdState, frame: &mut [f32]) {
        let gain_at_end = self.target_gain(state);
        let last_gain = self.last_gain;
        self.last_gain = gain_at_end;

        if frame.is_empty() || (last_gain == gain_at_end && gain_close_to_one(gain_at_end)) {
            return;
        }

        if last_gain == gain_at_end {
            for sample in frame.iter_mut() {
                *sample *= gain_at_end;
            }
            return;
        }

        let increment = (gain_at_end - last_gain) / frame.len() as f32;
        let mut gain = last_gain;
        for sample in frame.iter_mut() {
            *sample *= gain;
            gain += increment;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_end_and_idle_are_untouched() {
        let mut suppressor = ResidualEchoSuppressor::new(-40.0, -15.0);
        let mut frame = vec![0.5; 16];
        suppressor.apply(DtdState::NearEnd, &mut frame);
        suppressor.apply(DtdState::Idle, &mut frame);
        assert!(frame.iter().all(|&v| v == 0.5));
    }

    #[test]
    fn far_end_ramps_down_then_holds() {
        let mut suppressor = ResidualEchoSuppressor::new(-40.0, -15.0);
        let mut frame = vec![1.0; 100];
        suppressor.apply(DtdState::FarEnd, &mut frame);

        assert_eq!(frame[0], 1.0);
        for i in 1..100 {
            assert!(frame[i] < frame[i - 1], "not decreasing at {i}");
        }

        let mut frame = vec![1.0; 100];
        suppressor.apply(DtdState::FarEnd, &mut frame);
        assert!(frame.iter().all(|&v| (v - 0.01).abs() < 1e-6));
    }

    #[test]
    fn double_talk_uses_active_level() {
        let mut suppressor = ResidualEchoSuppressor::new(-40.0, -20.0);
        suppressor.apply(DtdState::DoubleTalk, &mut [1.0; 10]);
        let mut frame = vec![1.0; 10];
        suppressor.apply(DtdState::DoubleTalk, &mut frame);
        assert!(frame.iter().all(|&v| (v - 0.1).abs() < 1e-6));
    }

    #[test]
    fn reset_restores_unity() {
        let mut suppressor = ResidualEchoSuppressor::new(-40.0, -15.0);
        suppressor.apply(DtdState::FarEnd, &mut [1.0; 8]);
        suppressor.reset();
        let mut frame = vec![1.0; 8];
        suppressor.apply(DtdState::Idle, &mut frame);
        assert!(frame.iter().all(|&v| v == 1.0));
    }
}
