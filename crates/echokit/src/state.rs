//! Observable echo canceller state.

use echokit_aec::DtdState;

/// Snapshot of filter health returned by
/// [`EchoCanceller::state`](crate::EchoCanceller::state).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AecState {
    pub dtd_state: DtdState,
    /// Known delay when one was set, otherwise the estimator's delay.
    pub estimated_delay_samples: i32,
    pub estimated_delay_ms: f32,
    /// Smoothed echo return loss enhancement, measured before residual
    /// suppression. Zero before the first frame.
    pub erle_db: f32,
    /// Filter convergence in `[0, 1]`.
    pub convergence: f32,
    /// A known delay was set, or the estimator history is stable.
    pub delay_stable: bool,
    /// Frames processed while enabled.
    pub frames_processed: u64,
}
