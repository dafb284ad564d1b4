//! Energy-ratio double-talk detector.
//!
//! Classifies each frame from smoothed far-end, near-end and residual error
//! energies. A double-talk decision arms a hangover so the state cannot flap
//! back to single talk on the next frame.

/// Smoothing factor for the frame energies.
const SMOOTHING: f32 = 0.9;
const EPSILON: f32 = 1e-10;
/// Smoothed energy above which a signal counts as active.
pub const ACTIVITY_THRESHOLD: f32 = 1e-6;
/// Frames held in the current state after double talk is detected.
pub const HANGOVER_FRAMES: u32 = 10;

/// Talk state of the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum DtdState {
    #[default]
    Idle = 0,
    FarEnd = 1,
    NearEnd = 2,
    DoubleTalk = 3,
}

impl DtdState {
    /// Whether the adaptive filter may update its coefficients in this state.
    pub fn allows_adaptation(self) -> bool {
        !matches!(self, Self::DoubleTalk | Self::NearEnd)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FarEnd => "far_end",
            Self::NearEnd => "near_end",
            Self::DoubleTalk => "double_talk",
        }
    }
}

/// Double-talk detector with hangover.
#[derive(Debug, Clone)]
pub struct DoubleTalkDetector {
    threshold: f32,
    far_energy: f32,
    near_energy: f32,
    error_energy: f32,
    state: DtdState,
    hangover: u32,
}

impl DoubleTalkDetector {
    /// `threshold` is the error-to-near energy ratio above which two active
    /// talkers are classified as double talk.
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            far_energy: 0.0,
            near_energy: 0.0,
            error_energy: 0.0,
            state: DtdState::Idle,
            hangover: 0,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    pub fn state(&self) -> DtdState {
        self.state
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.threshold);
    }

    /// Updates the detector from one frame's energies (sums of squares) and
    /// returns the new state.
    pub fn update(&mut self, far_energy: f32, near_energy: f32, error_energy: f32) -> DtdState {
        self.far_energy = SMOOTHING * self.far_energy + (1.0 - SMOOTHING) * far_energy;
        self.near_energy = SMOOTHING * self.near_energy + (1.0 - SMOOTHING) * near_energy;
        self.error_energy = SMOOTHING * self.error_energy + (1.0 - SMOOTHING) * error_energy;

        let echo_ratio = self.error_energy / (self.near_energy + EPSILON);
        let far_active = self.far_energy > ACTIVITY_THRESHOLD;
        let near_active = self.near_energy > ACTIVITY_THRESHOLD;

        let previous = self.state;
        if echo_ratio > self.threshold && far_active && near_active {
            self.state = DtdState::DoubleTalk;
            self.hangover = HANGOVER_FRAMES;
        } else if self.hangover > 0 {
            self.hangover -= 1;
        } else {
            self.state = match (far_active, near_active) {
                (true, false) => DtdState::FarEnd,
                (false, true) => DtdState::NearEnd,
                _ => DtdState::Idle,
            };
        }

        if self.state != previous {
            tracing::trace!(
                from = previous.name(),
                to = self.state.name(),
                echo_ratio,
                "dtd transition"
            );
        }
        self.state
    }
}
