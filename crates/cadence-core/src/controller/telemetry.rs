//! Debug telemetry for the sync panel

use std::fmt;

/// How often the debug snapshot is refreshed (seconds)
pub const TELEMETRY_INTERVAL: f64 = 0.25;

/// Read-only view of the controller at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telemetry {
    /// Timeline position (seconds)
    pub reference_time: f64,
    /// Playback position minus target (seconds)
    pub drift: f64,
    /// Correction currently applied to the rate or time scale
    pub adjustment: f64,
    /// Global time scale
    pub timescale: f64,
    /// Playback rate (pitch)
    pub rate: f64,
    /// Audio is ahead of the target by more than the correction threshold
    pub over_limit: bool,
}

impl fmt::Display for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "animation time: {:.3}", self.reference_time)?;
        if self.over_limit {
            writeln!(f, "drift: {:.3} (over limit)", self.drift)?;
        } else {
            writeln!(f, "drift: {:.3}", self.drift)?;
        }
        writeln!(f, "adjustment: {:.4}", self.adjustment)?;
        writeln!(f, "time scale: {:.4}", self.timescale)?;
        write!(f, "pitch: {:.4}", self.rate)
    }
}

/// Throttles telemetry refreshes to a fixed interval of frame time
#[derive(Debug, Clone, Copy)]
pub struct TelemetryGate {
    interval: f64,
    accumulator: f64,
}

impl TelemetryGate {
    pub fn new(interval: f64) -> Self {
        Self {
            interval,
            accumulator: 0.0,
        }
    }

    /// Add frame time; returns true when a refresh is due
    pub fn advance(&mut self, delta_time: f64) -> bool {
        self.accumulator += delta_time;
        if self.accumulator > self.interval {
            self.accumulator = 0.0;
            true
        } else {
            false
        }
    }

    pub fn accumulated(&self) -> f64 {
        self.accumulator
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

impl Default for TelemetryGate {
    fn default() -> Self {
        Self::new(TELEMETRY_INTERVAL)
    }
}
