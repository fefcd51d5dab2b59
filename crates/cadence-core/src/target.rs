//! Where the playback clock should be for a given timeline position

use crate::types::ClipInfo;

/// Compute the playback position matching `reference_time`
///
/// The offset is subtracted first (audio starting later than the timeline),
/// then the result is divided by the time scale the animation is expected to
/// run at. Before the offset is reached the target is the start of the clip.
/// Looping clips wrap into `[0, duration)`; other clips saturate at their end.
/// A clip with no usable length is neither wrapped nor clamped.
///
/// # Example
/// ```
/// use cadence_core::{target::target_playback_time, ClipInfo};
///
/// let clip = ClipInfo::new(10.0, true);
/// let target = target_playback_time(12.5, 0.0, 1.0, &clip);
/// assert!((target - 2.5).abs() < 1e-9);
/// ```
pub fn target_playback_time(
    reference_time: f64,
    offset_seconds: f64,
    target_timescale: f64,
    clip: &ClipInfo,
) -> f64 {
    let divisor = if target_timescale > 0.0 && target_timescale.is_finite() {
        target_timescale
    } else {
        1.0
    };
    let raw = (reference_time - offset_seconds) / divisor;

    if raw < 0.0 {
        return 0.0;
    }
    if !clip.has_length() {
        return raw;
    }

    if clip.loops {
        // rem_euclid can round up to exactly `duration` for tiny negative
        // remainders; keep the result strictly inside the period
        let wrapped = raw.rem_euclid(clip.duration_seconds);
        if wrapped >= clip.duration_seconds {
            0.0
        } else {
            wrapped
        }
    } else {
        raw.min(clip.duration_seconds)
    }
}

/// Sign of `value` with `sign(0) == 0`
///
/// `f64::signum` returns 1.0 for +0.0, which would turn a zero drift into a
/// correction step.
#[inline]
pub fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}
