//! Drift controller - steers audio playback to follow the animation timeline
//!
//! Call [`DriftController::tick`] once per simulation frame. Each tick:
//!
//! 1. Skips if the host is frozen, no device/clip is available, or no
//!    strategy is selected
//! 2. Pauses audio while the timeline is stopped (optional)
//! 3. Measures drift = playback position - target position
//! 4. Seeks outright if drift is huge (optional), otherwise runs the
//!    selected [`Strategy`](crate::Strategy)
//! 5. Refreshes debug telemetry at most every 0.25s
//!
//! ## Strategies
//!
//! - **TimeScale**: speeds up/slows down the whole simulation until the
//!   animation matches the audio
//! - **AudioTimeSet**: seeks the audio to where it should be
//! - **AudioPitch**: bends the audio play rate until it catches up
//!
//! The two gradual strategies share a hysteresis (see [`hysteresis`]) so the
//! knob doesn't flap around the threshold.

mod drift;
pub mod hysteresis;
mod telemetry;

pub use drift::{Correction, DriftController, SyncState, TickOutcome, NEVER_SEEN};
pub use hysteresis::{HysteresisAction, Knob};
pub use telemetry::{Telemetry, TelemetryGate, TELEMETRY_INTERVAL};
