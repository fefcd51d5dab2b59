//! Capability interfaces between the drift controller and its host
//!
//! The controller never reaches into host globals. Everything it reads or
//! writes goes through one of these traits, which the host implements over
//! its own engine state (and which tests implement with plain fakes):
//!
//! - [`ReferenceClock`] - the animation timeline being followed
//! - [`TimeScaleControl`] - the single global simulation time scale
//! - [`PlaybackDevice`] - the audio clock being steered
//! - [`DeviceResolver`] - finds the device to steer, re-run after invalidation

use crate::error::SyncResult;
use crate::types::ClipInfo;

/// The authoritative timeline that playback must follow
pub trait ReferenceClock {
    /// Current timeline position in seconds
    ///
    /// While the timeline is stopped this returns the exact same value every
    /// frame; the controller relies on that to detect a stopped timeline.
    fn current_time(&self) -> SyncResult<f64>;

    /// Whether the host has frozen the whole simulation (scrubbing, engine pause)
    fn is_host_frozen(&self) -> bool {
        false
    }
}

/// The host's global time scale knob
pub trait TimeScaleControl {
    fn scale(&self) -> f64;
    fn set_scale(&mut self, scale: f64);
}

/// A controllable audio playback clock
pub trait PlaybackDevice {
    /// Playback position in seconds
    fn position(&self) -> SyncResult<f64>;

    /// Move the playhead to `seconds`
    fn seek(&mut self, seconds: f64) -> SyncResult<()>;

    /// Play rate (pitch) multiplier, 1.0 = normal speed
    fn rate(&self) -> SyncResult<f64>;

    fn set_rate(&mut self, rate: f64) -> SyncResult<()>;

    fn is_playing(&self) -> SyncResult<bool>;

    fn pause(&mut self) -> SyncResult<()>;

    /// Continue from the paused position
    fn resume(&mut self) -> SyncResult<()>;

    /// Loaded clip, or `None` while nothing is loaded yet
    fn clip(&self) -> SyncResult<Option<ClipInfo>>;
}

/// Locates the playback device to steer
///
/// The controller caches the resolved device and only calls `resolve` again
/// after `on_source_config_changed()` drops the cache.
pub trait DeviceResolver {
    type Device: PlaybackDevice;

    fn resolve(&mut self) -> Option<Self::Device>;
}

impl<D, F> DeviceResolver for F
where
    D: PlaybackDevice,
    F: FnMut() -> Option<D>,
{
    type Device = D;

    fn resolve(&mut self) -> Option<D> {
        self()
    }
}
