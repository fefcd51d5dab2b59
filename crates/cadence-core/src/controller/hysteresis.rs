//! Shared hysteresis for the gradual correction strategies
//!
//! Pitch and time-scale correction run the same two-state machine and differ
//! only in which knob they turn:
//!
//! ```text
//!            |drift| >= drift_correct
//!   Idle ───────────────────────────────▶ Correcting ──┐ |drift| grew:
//!    ▲                                        │   ◀────┘ one more step
//!    └────────────────────────────────────────┘
//!            |drift| <= drift_stop
//! ```
//!
//! Between the two thresholds nothing changes. A correction that is already
//! helping is left alone rather than recomputed from the current drift, so the
//! knob moves in a few discrete steps instead of tracking every frame.

use crate::config::Thresholds;
use crate::target::sign;

/// Which knob a gradual correction turns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Knob {
    /// Playback device rate (pitch)
    Rate,
    /// Global simulation time scale
    TimeScale,
}

impl Knob {
    /// Sign applied to the drift when stepping
    ///
    /// Audio ahead (positive drift) means slowing the audio down, but speeding
    /// the animation up.
    fn direction(self) -> f64 {
        match self {
            Self::Rate => -1.0,
            Self::TimeScale => 1.0,
        }
    }

    /// The time scale also moves the timeline producing the drift, so it
    /// needs a much larger pull than the audio rate.
    fn step_multiplier(self) -> f64 {
        match self {
            Self::Rate => 1.0,
            Self::TimeScale => 10.0,
        }
    }

    /// Unsigned size of one correction step for this frame
    pub fn step_magnitude(self, thresholds: &Thresholds, delta_time: f64) -> f64 {
        thresholds.adjustment_step * delta_time * self.step_multiplier()
    }
}

/// What the hysteresis wants done this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HysteresisAction {
    /// Nothing in flight and drift is tolerable
    Idle,
    /// Begin correcting with this signed step
    Start(f64),
    /// Drift is getting worse; add this signed step
    Strengthen(f64),
    /// Correcting and drift isn't growing; keep the current adjustment
    Hold,
    /// Drift is back under the stop threshold; undo the correction
    Release,
}

/// Decide the next action from this frame's drift
///
/// `current_adjustment == 0.0` is the idle state.
pub fn evaluate(
    knob: Knob,
    drift: f64,
    previous_drift: f64,
    current_adjustment: f64,
    thresholds: &Thresholds,
    delta_time: f64,
) -> HysteresisAction {
    let drift_abs = drift.abs();
    let previous_abs = previous_drift.abs();
    let magnitude = knob.step_magnitude(thresholds, delta_time);

    if current_adjustment == 0.0 {
        if drift_abs < thresholds.drift_correct {
            return HysteresisAction::Idle;
        }
        let step = sign(drift) * knob.direction() * magnitude;
        if step == 0.0 {
            return HysteresisAction::Idle;
        }
        return HysteresisAction::Start(step);
    }

    if drift_abs <= thresholds.drift_stop {
        return HysteresisAction::Release;
    }

    if drift_abs != previous_abs && drift_abs > previous_abs {
        // push further in the direction of the initial kick
        let step = sign(current_adjustment) * magnitude;
        if step != 0.0 {
            return HysteresisAction::Strengthen(step);
        }
    }

    HysteresisAction::Hold
}
