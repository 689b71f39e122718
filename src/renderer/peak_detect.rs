//! Dynamic HDR peak detection (§4.6, §9 "peak detection state persists
//! across frames unless the renderer-level cache is flushed").
//!
//! A real implementation reduces a luminance histogram on the GPU and reads
//! it back asynchronously; that readback is plumbed through
//! `wgpu::Queue::submit` + `MapMode::Read` by whichever call site owns the
//! frame's lifetime. This module only owns the smoothed state machine that
//! consumes whatever peak/average luminance measurement comes back.

use crate::params::PeakDetectParams;

/// Per-renderer (not per-frame) running peak/average luminance estimate,
/// exponentially smoothed and reset on a detected scene cut.
#[derive(Debug, Clone, Copy)]
pub struct PeakState {
    smoothed_peak: f32,
    smoothed_avg: f32,
    frames_seen: u32,
}

impl PeakState {
    pub fn new() -> Self {
        Self {
            smoothed_peak: 0.0,
            smoothed_avg: 0.0,
            frames_seen: 0,
        }
    }

    /// Folds in a new frame's measured `(peak, avg)` luminance (normalized
    /// so 1.0 == the frame's nominal HDR peak), applying the configured
    /// smoothing period and resetting to the raw measurement on a detected
    /// scene cut.
    pub fn update(&mut self, measured_peak: f32, measured_avg: f32, params: &PeakDetectParams) {
        if self.frames_seen == 0 {
            self.smoothed_peak = measured_peak;
            self.smoothed_avg = measured_avg;
            self.frames_seen = 1;
            return;
        }

        let delta = (measured_avg - self.smoothed_avg).abs();
        let scene_cut = params.scene_threshold_high > 0.0 && delta > params.scene_threshold_high;
        if scene_cut {
            self.smoothed_peak = measured_peak;
            self.smoothed_avg = measured_avg;
            self.frames_seen = 1;
            return;
        }

        let period = params.smoothing_period.max(1.0);
        let alpha = (1.0 / period).min(1.0);
        self.smoothed_peak += (measured_peak - self.smoothed_peak) * alpha;
        self.smoothed_avg += (measured_avg - self.smoothed_avg) * alpha;
        self.frames_seen += 1;
    }

    pub fn current_peak(&self) -> f32 {
        self.smoothed_peak.max(1.0)
    }

    pub fn current_avg(&self) -> f32 {
        self.smoothed_avg.max(1.0)
    }
}

impl Default for PeakState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> PeakDetectParams {
        PeakDetectParams {
            smoothing_period: 4.0,
            scene_threshold_low: 1.0,
            scene_threshold_high: 3.0,
        }
    }

    #[test]
    fn first_measurement_is_taken_verbatim() {
        let mut state = PeakState::new();
        state.update(800.0, 200.0, &params());
        assert_eq!(state.current_peak(), 800.0);
    }

    #[test]
    fn large_jump_resets_instead_of_smoothing() {
        let mut state = PeakState::new();
        state.update(200.0, 100.0, &params());
        state.update(1000.0, 900.0, &params());
        assert_eq!(state.current_peak(), 1000.0);
    }

    #[test]
    fn small_delta_smooths_toward_new_measurement() {
        let mut state = PeakState::new();
        state.update(200.0, 100.0, &params());
        state.update(220.0, 105.0, &params());
        assert!(state.current_peak() > 200.0 && state.current_peak() < 220.0);
    }
}
