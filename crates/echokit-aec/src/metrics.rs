//! Smoothed ERLE and convergence tracking shared by the adaptive filters.

const ERLE_SMOOTHING: f32 = 0.98;
const CONVERGENCE_SMOOTHING: f32 = 0.99;
/// ERLE at which the convergence target saturates at 1.
const CONVERGED_ERLE_DB: f32 = 10.0;
const EPSILON: f32 = 1e-10;

/// Echo return loss enhancement and a 0..1 convergence score.
///
/// Both read as zero until the first frame is recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EchoMetrics {
    erle_db: f32,
    convergence: f32,
}

impl EchoMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds in one frame's near-end and residual error energies.
    pub fn update(&mut self, near_energy: f32, error_energy: f32) {
        let instant = 10.0 * (near_energy / (error_energy + EPSILON) + EPSILON).log10();
        self.erle_db = ERLE_SMOOTHING * self.erle_db + (1.0 - ERLE_SMOOTHING) * instant;

        let target = (self.erle_db / CONVERGED_ERLE_DB).clamp(0.0, 1.0);
        self.convergence =
            CONVERGENCE_SMOOTHING * self.convergence + (1.0 - CONVERGENCE_SMOOTHING) * target;
    }

    pub fn erle_db(&self) -> f32 {
        self.erle_db
    }

    pub fn convergence(&self) -> f32 {
        self.convergence
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
