//! User-facing sync settings and tunable thresholds

use serde::{Deserialize, Serialize};

use crate::types::{Strategy, OFFSET_RANGE};

/// Drift thresholds and correction step size
///
/// All values are in seconds of drift, except `adjustment_step` which is
/// rate/time-scale units per second of frame time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Drift at/above which a gradual correction starts
    /// Default: 0.05s
    pub drift_correct: f64,

    /// Drift at/below which an in-flight correction is released
    /// Default: 0.01s
    pub drift_stop: f64,

    /// Drift above which playback is seeked regardless of strategy
    /// (only when `jump_if_too_far` is enabled)
    /// Default: 1.0s
    pub hard_jump: f64,

    /// Base magnitude of one correction step
    /// Default: 0.05
    pub adjustment_step: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            drift_correct: 0.05,
            drift_stop: 0.01,
            hard_jump: 1.0,
            adjustment_step: 0.05,
        }
    }
}

impl Thresholds {
    /// Dead zone for the direct time-set strategy
    ///
    /// Half the correction threshold, so small drift doesn't seek every frame.
    pub fn time_set_dead_zone(&self) -> f64 {
        self.drift_correct * 0.5
    }
}

/// Settings the user picks for a sync session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Correction strategy; `None` disables syncing entirely
    /// Default: time scale
    pub strategy: Option<Strategy>,

    /// How far into the timeline the audio starts (seconds, -60..60)
    /// Default: 0.0
    pub offset_seconds: f64,

    /// Time scale the animation is meant to run at
    /// When unset, targets assume unity speed and time-scale corrections
    /// pivot around whatever scale was active at activation.
    /// Default: unset
    pub target_timescale: Option<f64>,

    /// Seek straight to the target when drift exceeds the hard jump threshold
    /// Also makes audio follow timeline scrubbing.
    /// Default: true
    pub jump_if_too_far: bool,

    /// Pause audio while the timeline is stopped, resume when it moves again
    /// Default: true
    pub stop_if_animation_stopped: bool,

    /// Drift thresholds and step size
    pub thresholds: Thresholds,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            strategy: Some(Strategy::TimeScale),
            offset_seconds: 0.0,
            target_timescale: None,
            jump_if_too_far: true,
            stop_if_animation_stopped: true,
            thresholds: Thresholds::default(),
        }
    }
}

impl SyncSettings {
    /// Divisor applied to the timeline when computing the playback target
    pub fn timescale_divisor(&self) -> f64 {
        self.target_timescale.unwrap_or(1.0)
    }

    /// Return a copy with out-of-range values fixed up
    ///
    /// The offset is clamped into range and an unusable target time scale
    /// (non-positive, NaN, infinite) is dropped.
    pub fn sanitized(mut self) -> Self {
        let (min_offset, max_offset) = OFFSET_RANGE;
        if !self.offset_seconds.is_finite() {
            log::warn!("[CONFIG] Offset {} is not finite, using 0", self.offset_seconds);
            self.offset_seconds = 0.0;
        } else if !(min_offset..=max_offset).contains(&self.offset_seconds) {
            let clamped = self.offset_seconds.clamp(min_offset, max_offset);
            log::warn!(
                "[CONFIG] Offset {} outside {:?}, clamping to {}",
                self.offset_seconds,
                OFFSET_RANGE,
                clamped
            );
            self.offset_seconds = clamped;
        }

        if let Some(scale) = self.target_timescale {
            if !(scale > 0.0 && scale.is_finite()) {
                log::warn!("[CONFIG] Ignoring invalid target time scale {}", scale);
                self.target_timescale = None;
            }
        }

        self
    }
}
