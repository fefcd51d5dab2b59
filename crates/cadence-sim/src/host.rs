//! Simulated host: an animation timeline, a global time scale and one audio source
//!
//! All three capability handles share one [`World`] behind `Rc<RefCell<_>>`,
//! the way a game engine hands out references into its own frame state. The
//! world is only ever touched from the simulation thread.

use std::cell::RefCell;
use std::rc::Rc;

use cadence_core::clock::{PlaybackDevice, ReferenceClock, TimeScaleControl};
use cadence_core::{ClipInfo, SyncResult};

use crate::scenario::Scenario;

pub type SharedWorld = Rc<RefCell<World>>;

/// Simulated audio source
#[derive(Debug, Clone)]
pub struct AudioState {
    pub position: f64,
    pub rate: f64,
    pub playing: bool,
    pub clip: ClipInfo,
    /// Fractional speed error of the audio clock
    pub clock_error: f64,
}

impl AudioState {
    fn advance(&mut self, delta_time: f64) {
        if !self.playing {
            return;
        }
        self.position += delta_time * self.rate * (1.0 + self.clock_error);

        if !self.clip.has_length() {
            return;
        }
        if self.clip.loops {
            self.position = self.position.rem_euclid(self.clip.duration_seconds);
        } else if self.position >= self.clip.duration_seconds {
            self.position = self.clip.duration_seconds;
            self.playing = false;
        }
    }
}

/// Everything the simulated engine owns
#[derive(Debug, Clone)]
pub struct World {
    /// Wall time since start
    pub wall_time: f64,
    /// Animation timeline position
    pub timeline: f64,
    /// Global time scale
    pub time_scale: f64,
    /// Timeline stopped until this wall time
    pub stopped_until: f64,
    /// Host frozen until this wall time
    pub frozen_until: f64,
    /// Timeline position that fires the soundtrack trigger
    pub trigger_at: f64,
    pub triggered: bool,
    pub audio: AudioState,
}

impl World {
    pub fn new(scenario: &Scenario) -> Self {
        Self {
            wall_time: 0.0,
            timeline: 0.0,
            time_scale: 1.0,
            stopped_until: 0.0,
            frozen_until: 0.0,
            trigger_at: scenario.settings.offset_seconds,
            triggered: false,
            audio: AudioState {
                position: 0.0,
                rate: 1.0,
                playing: false,
                clip: scenario.clip.into(),
                clock_error: scenario.audio_clock_error,
            },
        }
    }

    pub fn shared(self) -> SharedWorld {
        Rc::new(RefCell::new(self))
    }

    pub fn is_frozen(&self) -> bool {
        self.wall_time < self.frozen_until
    }

    pub fn is_timeline_stopped(&self) -> bool {
        self.wall_time < self.stopped_until
    }

    /// Timeline advancing and audio audible
    pub fn is_running(&self) -> bool {
        !self.is_frozen() && !self.is_timeline_stopped() && self.audio.playing
    }

    /// Advance one frame of wall time
    ///
    /// The timeline moves at the global time scale unless stopped or frozen.
    /// The audio clock keeps its own pace either way. The soundtrack trigger
    /// fires the first time the timeline reaches the offset.
    pub fn advance(&mut self, delta_time: f64) {
        if !self.is_frozen() && !self.is_timeline_stopped() {
            self.timeline += delta_time * self.time_scale;
        }
        if !self.triggered && self.timeline >= self.trigger_at {
            self.triggered = true;
            self.audio.playing = true;
            self.audio.position = 0.0;
            log::debug!("[SIM] Soundtrack trigger fired at timeline {:.3}", self.timeline);
        }
        self.audio.advance(delta_time);
        self.wall_time += delta_time;
    }
}

/// Timeline handle
#[derive(Debug, Clone)]
pub struct SimClock(pub SharedWorld);

impl ReferenceClock for SimClock {
    fn current_time(&self) -> SyncResult<f64> {
        Ok(self.0.borrow().timeline)
    }

    fn is_host_frozen(&self) -> bool {
        self.0.borrow().is_frozen()
    }
}

/// Global time scale handle
#[derive(Debug, Clone)]
pub struct SimTimeScale(pub SharedWorld);

impl TimeScaleControl for SimTimeScale {
    fn scale(&self) -> f64 {
        self.0.borrow().time_scale
    }

    fn set_scale(&mut self, scale: f64) {
        self.0.borrow_mut().time_scale = scale;
    }
}

/// Audio source handle
#[derive(Debug, Clone)]
pub struct SimDevice(pub SharedWorld);

impl PlaybackDevice for SimDevice {
    fn position(&self) -> SyncResult<f64> {
        Ok(self.0.borrow().audio.position)
    }

    fn seek(&mut self, seconds: f64) -> SyncResult<()> {
        self.0.borrow_mut().audio.position = seconds;
        Ok(())
    }

    fn rate(&self) -> SyncResult<f64> {
        Ok(self.0.borrow().audio.rate)
    }

    fn set_rate(&mut self, rate: f64) -> SyncResult<()> {
        self.0.borrow_mut().audio.rate = rate;
        Ok(())
    }

    fn is_playing(&self) -> SyncResult<bool> {
        Ok(self.0.borrow().audio.playing)
    }

    fn pause(&mut self) -> SyncResult<()> {
        self.0.borrow_mut().audio.playing = false;
        Ok(())
    }

    fn resume(&mut self) -> SyncResult<()> {
        self.0.borrow_mut().audio.playing = true;
        Ok(())
    }

    fn clip(&self) -> SyncResult<Option<ClipInfo>> {
        Ok(Some(self.0.borrow().audio.clip))
    }
}
