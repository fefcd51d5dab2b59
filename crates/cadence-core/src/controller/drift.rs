//! The drift controller state machine

use crate::clock::{DeviceResolver, PlaybackDevice, ReferenceClock, TimeScaleControl};
use crate::config::SyncSettings;
use crate::error::{SyncError, SyncResult};
use crate::target::target_playback_time;
use crate::types::{ClipInfo, Strategy};

use super::hysteresis::{self, HysteresisAction, Knob};
use super::telemetry::{Telemetry, TelemetryGate};

/// Timeline reading that can never occur, so the first tick is never
/// mistaken for a stopped timeline
pub const NEVER_SEEN: f64 = -1.0;

/// Rate assumed for a device whose rate can't be read at capture time
const DEFAULT_RATE: f64 = 1.0;

/// Hysteresis state carried between ticks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncState {
    /// How far the active correction has pushed rate/time scale off baseline
    /// (0.0 = no correction in flight)
    pub current_adjustment: f64,
    /// Drift measured on the previous tick
    pub previous_drift: f64,
    /// Timeline reading on the previous tick
    pub previous_reference_time: f64,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            current_adjustment: 0.0,
            previous_drift: 0.0,
            previous_reference_time: NEVER_SEEN,
        }
    }
}

impl SyncState {
    pub fn is_correcting(&self) -> bool {
        self.current_adjustment != 0.0
    }
}

/// What a strategy handler did this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Drift within tolerance, nothing changed
    InSync,
    /// Playback seeked to the target (time-set strategy)
    Seek { target: f64 },
    /// Gradual correction began
    Started { adjustment: f64 },
    /// Drift grew, correction pushed further
    Strengthened { adjustment: f64 },
    /// Correction in flight, left untouched
    Held { adjustment: f64 },
    /// Drift back under the stop threshold, knob restored
    Released,
}

/// Result of one [`DriftController::tick`]
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Host has frozen the simulation
    HostFrozen,
    /// Nothing to do yet (no device, clip still loading, no strategy, ...)
    Skipped(SyncError),
    /// Timeline isn't advancing; `paused` is true if playback was paused now
    TimelineStopped { paused: bool },
    /// Playback wasn't running and was sent back to the start
    Rewound,
    /// Drift exceeded the hard jump threshold; playback seeked to `target`
    HardJump { target: f64 },
    /// The selected strategy ran
    Steered(Correction),
    /// A collaborator failed mid-tick; state was rolled back
    Faulted(SyncError),
}

/// Keeps a playback device in step with a reference clock
///
/// Owns the hysteresis state and the values captured at activation that are
/// restored whenever the strategy changes or the controller shuts down.
/// Dropping an active controller deactivates it.
pub struct DriftController<R, C, S>
where
    R: DeviceResolver,
    C: ReferenceClock,
    S: TimeScaleControl,
{
    /// Finds the playback device (re-run after invalidation)
    resolver: R,
    /// Cached playback device
    device: Option<R::Device>,
    /// Animation timeline
    clock: C,
    /// Global time scale knob
    time_scale: S,
    /// User settings
    settings: SyncSettings,
    /// Hysteresis state
    state: SyncState,
    /// Device rate captured at activation / resolution
    original_rate: f64,
    /// Global time scale captured at activation
    original_timescale: f64,
    /// Originals have been captured
    active: bool,
    /// Debug surface is visible
    debug_visible: bool,
    telemetry_gate: TelemetryGate,
    telemetry: Option<Telemetry>,
}

impl<R, C, S> DriftController<R, C, S>
where
    R: DeviceResolver,
    C: ReferenceClock,
    S: TimeScaleControl,
{
    /// Create an inactive controller
    ///
    /// Nothing is read from the host until [`activate`](Self::activate).
    pub fn new(resolver: R, clock: C, time_scale: S, settings: SyncSettings) -> Self {
        Self {
            resolver,
            device: None,
            clock,
            time_scale,
            settings: settings.sanitized(),
            state: SyncState::default(),
            original_rate: DEFAULT_RATE,
            original_timescale: 1.0,
            active: false,
            debug_visible: false,
            telemetry_gate: TelemetryGate::default(),
            telemetry: None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Resolve the device and capture the rate/time scale to restore later
    ///
    /// Must run before the first tick. Calling it again while active is a no-op.
    pub fn activate(&mut self) {
        if self.active {
            return;
        }

        if self.device.is_none() {
            self.device = self.resolver.resolve();
        }
        self.original_rate = match &self.device {
            Some(device) => capture_rate(device),
            None => {
                log::warn!("[SYNC] No playback device found, waiting for one to resolve");
                DEFAULT_RATE
            }
        };
        self.original_timescale = self.time_scale.scale();
        self.state = SyncState::default();
        self.telemetry_gate.reset();
        self.active = true;
        self.hold_timescale_baseline();

        log::info!(
            "[SYNC] Activated: strategy={:?} rate={} timescale={}",
            self.settings.strategy,
            self.original_rate,
            self.original_timescale
        );
    }

    /// Restore rate/time scale and stop steering
    pub fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        self.restore_defaults();
        self.active = false;
        log::info!("[SYNC] Deactivated");
    }

    /// Undo the previous strategy's effects before the next one takes over
    pub fn on_strategy_changed(&mut self) {
        if self.active {
            self.restore_defaults();
            self.hold_timescale_baseline();
        }
        log::info!("[SYNC] Strategy now {:?}", self.settings.strategy);
    }

    /// The host picked a different audio source; drop the cached device
    ///
    /// The old device gets its rate back first. The next tick resolves the
    /// new device and captures its rate as the one to restore.
    pub fn on_source_config_changed(&mut self) {
        if self.active {
            self.restore_defaults();
            self.hold_timescale_baseline();
        }
        self.device = None;
        log::info!("[SYNC] Audio source changed, device will be re-resolved");
    }

    fn restore_defaults(&mut self) {
        if let Some(device) = self.device.as_mut() {
            if let Err(e) = device.set_rate(self.original_rate) {
                log::warn!("[SYNC] Failed to restore playback rate: {}", e);
            }
        }
        self.time_scale.set_scale(self.original_timescale);
        self.state = SyncState::default();
        self.telemetry_gate.reset();
    }

    /// Under the time-scale strategy, put the global scale at baseline + adjustment
    ///
    /// Runs whenever the strategy or its baseline changes, so the first
    /// correction step starts from the baseline rather than the captured
    /// original.
    fn hold_timescale_baseline(&mut self) {
        if self.active && self.settings.strategy == Some(Strategy::TimeScale) {
            self.time_scale
                .set_scale(self.timescale_baseline() + self.state.current_adjustment);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Settings
    // ─────────────────────────────────────────────────────────────────────

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Replace all settings at once
    ///
    /// A different strategy resets the controller as in
    /// [`on_strategy_changed`](Self::on_strategy_changed). A new target time
    /// scale moves the time-scale knob (and any correction in flight) onto
    /// the new baseline.
    pub fn apply_settings(&mut self, settings: SyncSettings) {
        let settings = settings.sanitized();
        let strategy_changed = settings.strategy != self.settings.strategy;
        let target_changed = settings.target_timescale != self.settings.target_timescale;
        self.settings = settings;

        if strategy_changed {
            self.on_strategy_changed();
        } else if target_changed {
            self.hold_timescale_baseline();
        }
    }

    pub fn set_strategy(&mut self, strategy: Option<Strategy>) {
        let settings = SyncSettings {
            strategy,
            ..self.settings.clone()
        };
        self.apply_settings(settings);
    }

    pub fn set_offset_seconds(&mut self, offset_seconds: f64) {
        let settings = SyncSettings {
            offset_seconds,
            ..self.settings.clone()
        };
        self.apply_settings(settings);
    }

    pub fn set_target_timescale(&mut self, target_timescale: Option<f64>) {
        let settings = SyncSettings {
            target_timescale,
            ..self.settings.clone()
        };
        self.apply_settings(settings);
    }

    pub fn set_jump_if_too_far(&mut self, enabled: bool) {
        self.settings.jump_if_too_far = enabled;
    }

    pub fn set_stop_if_animation_stopped(&mut self, enabled: bool) {
        self.settings.stop_if_animation_stopped = enabled;
    }

    /// Show or hide the debug surface; telemetry is only gathered while shown
    pub fn set_debug_visible(&mut self, visible: bool) {
        if !visible {
            self.telemetry_gate.reset();
            self.telemetry = None;
        }
        self.debug_visible = visible;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn current_adjustment(&self) -> f64 {
        self.state.current_adjustment
    }

    pub fn original_rate(&self) -> f64 {
        self.original_rate
    }

    pub fn original_timescale(&self) -> f64 {
        self.original_timescale
    }

    /// Latest telemetry snapshot (`None` while the debug surface is hidden)
    pub fn telemetry(&self) -> Option<&Telemetry> {
        self.telemetry.as_ref()
    }

    pub fn device(&self) -> Option<&R::Device> {
        self.device.as_ref()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn time_scale(&self) -> &S {
        &self.time_scale
    }

    /// Playback position the device should be at right now
    pub fn target_playback_time(&self) -> SyncResult<f64> {
        let device = self.device.as_ref().ok_or(SyncError::DeviceUnavailable)?;
        let clip = device.clip()?.ok_or(SyncError::ClipUnknown)?;
        let reference_time = self.clock.current_time()?;
        Ok(self.target_for(reference_time, &clip))
    }

    /// Current drift (positive = audio ahead of the timeline)
    pub fn current_drift(&self) -> SyncResult<f64> {
        let target = self.target_playback_time()?;
        let device = self.device.as_ref().ok_or(SyncError::DeviceUnavailable)?;
        Ok(device.position()? - target)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tick
    // ─────────────────────────────────────────────────────────────────────

    /// Run one frame of drift correction
    ///
    /// Never fails: missing pieces skip the frame, and a collaborator fault
    /// is logged and rolls the hysteresis state back to where it was.
    pub fn tick(&mut self, delta_time: f64) -> TickOutcome {
        let saved = self.state;
        match self.try_tick(delta_time) {
            Ok(outcome) => outcome,
            Err(err) if err.is_transient() => {
                log::trace!("[SYNC] Tick skipped: {}", err);
                TickOutcome::Skipped(err)
            }
            Err(err) => {
                self.state = saved;
                log::warn!("[SYNC] Tick failed, state left unchanged: {}", err);
                TickOutcome::Faulted(err)
            }
        }
    }

    fn try_tick(&mut self, delta_time: f64) -> SyncResult<TickOutcome> {
        if self.clock.is_host_frozen() {
            return Ok(TickOutcome::HostFrozen);
        }
        if !self.active {
            return Err(SyncError::NotActivated);
        }

        let mut device = self.take_device()?;
        let outcome = self.steer(&mut device, delta_time);
        self.device = Some(device);
        outcome
    }

    /// Take the cached device out for the duration of a tick, resolving it if needed
    fn take_device(&mut self) -> SyncResult<R::Device> {
        if let Some(device) = self.device.take() {
            return Ok(device);
        }
        let device = self.resolver.resolve().ok_or(SyncError::DeviceUnavailable)?;
        self.original_rate = capture_rate(&device);
        log::info!("[SYNC] Playback device resolved (rate {})", self.original_rate);
        Ok(device)
    }

    fn steer(&mut self, device: &mut R::Device, delta_time: f64) -> SyncResult<TickOutcome> {
        let clip = device.clip()?.ok_or(SyncError::ClipUnknown)?;
        let strategy = self.settings.strategy.ok_or(SyncError::ConfigIncomplete)?;

        let reference_time = self.clock.current_time()?;
        if reference_time.to_bits() == self.state.previous_reference_time.to_bits() {
            let mut paused = false;
            if self.settings.stop_if_animation_stopped && device.is_playing()? {
                device.pause()?;
                paused = true;
                log::debug!("[SYNC] Timeline stopped at {:.3}, pausing playback", reference_time);
            }
            return Ok(TickOutcome::TimelineStopped { paused });
        }

        let target = self.target_for(reference_time, &clip);
        let drift = device.position()? - target;

        if !device.is_playing()? {
            if self.settings.stop_if_animation_stopped && drift != 0.0 {
                device.resume()?;
                log::debug!("[SYNC] Timeline moving at {:.3}, resuming playback", reference_time);
            } else {
                device.seek(0.0)?;
                return Ok(TickOutcome::Rewound);
            }
        }

        let thresholds = self.settings.thresholds;
        let outcome = if self.settings.jump_if_too_far && drift.abs() > thresholds.hard_jump {
            device.seek(target)?;
            if self.state.is_correcting() {
                self.set_knob(strategy, device, 0.0)?;
            }
            self.state.current_adjustment = 0.0;
            log::debug!("[SYNC] Hard jump: drift {:.3}, seeking to {:.3}", drift, target);
            TickOutcome::HardJump { target }
        } else {
            TickOutcome::Steered(self.run_strategy(strategy, device, drift, target, delta_time)?)
        };

        self.state.previous_drift = drift;
        self.state.previous_reference_time = reference_time;

        self.publish_telemetry(device, reference_time, drift, delta_time);
        Ok(outcome)
    }

    fn run_strategy(
        &mut self,
        strategy: Strategy,
        device: &mut R::Device,
        drift: f64,
        target: f64,
        delta_time: f64,
    ) -> SyncResult<Correction> {
        let knob = match strategy {
            Strategy::AudioTimeSet => {
                if drift.abs() >= self.settings.thresholds.time_set_dead_zone() {
                    device.seek(target)?;
                    self.state.current_adjustment = 0.0;
                    log::debug!("[SYNC] Time set: drift {:.3}, seeking to {:.3}", drift, target);
                    return Ok(Correction::Seek { target });
                }
                return Ok(Correction::InSync);
            }
            Strategy::AudioPitch => Knob::Rate,
            Strategy::TimeScale => Knob::TimeScale,
        };

        let action = hysteresis::evaluate(
            knob,
            drift,
            self.state.previous_drift,
            self.state.current_adjustment,
            &self.settings.thresholds,
            delta_time,
        );

        let correction = match action {
            HysteresisAction::Idle => Correction::InSync,
            HysteresisAction::Hold => Correction::Held {
                adjustment: self.state.current_adjustment,
            },
            HysteresisAction::Start(step) | HysteresisAction::Strengthen(step) => {
                let adjustment = self.state.current_adjustment + step;
                self.set_knob(strategy, device, adjustment)?;
                self.state.current_adjustment = adjustment;
                log::debug!(
                    "[SYNC] {:?}: drift {:.3}, adjustment {:.5} (step {:.5})",
                    knob,
                    drift,
                    adjustment,
                    step
                );
                if matches!(action, HysteresisAction::Start(_)) {
                    Correction::Started { adjustment }
                } else {
                    Correction::Strengthened { adjustment }
                }
            }
            HysteresisAction::Release => {
                self.set_knob(strategy, device, 0.0)?;
                self.state.current_adjustment = 0.0;
                log::debug!("[SYNC] {:?}: drift {:.3}, correction released", knob, drift);
                Correction::Released
            }
        };
        Ok(correction)
    }

    /// Put the strategy's knob at baseline + `adjustment`
    fn set_knob(&mut self, strategy: Strategy, device: &mut R::Device, adjustment: f64) -> SyncResult<()> {
        match strategy {
            Strategy::AudioPitch => device.set_rate(self.original_rate + adjustment),
            Strategy::TimeScale => {
                self.time_scale.set_scale(self.timescale_baseline() + adjustment);
                Ok(())
            }
            Strategy::AudioTimeSet => Ok(()),
        }
    }

    /// Time scale that time-scale corrections pivot around
    fn timescale_baseline(&self) -> f64 {
        self.settings.target_timescale.unwrap_or(self.original_timescale)
    }

    fn target_for(&self, reference_time: f64, clip: &ClipInfo) -> f64 {
        target_playback_time(
            reference_time,
            self.settings.offset_seconds,
            self.settings.timescale_divisor(),
            clip,
        )
    }

    fn publish_telemetry(&mut self, device: &R::Device, reference_time: f64, drift: f64, delta_time: f64) {
        if !self.debug_visible || !self.telemetry_gate.advance(delta_time) {
            return;
        }
        let rate = match device.rate() {
            Ok(rate) => rate,
            Err(e) => {
                log::debug!("[SYNC] Telemetry skipped, rate unreadable: {}", e);
                return;
            }
        };
        self.telemetry = Some(Telemetry {
            reference_time,
            drift,
            adjustment: self.state.current_adjustment,
            timescale: self.time_scale.scale(),
            rate,
            over_limit: drift > self.settings.thresholds.drift_correct,
        });
    }
}

impl<R, C, S> Drop for DriftController<R, C, S>
where
    R: DeviceResolver,
    C: ReferenceClock,
    S: TimeScaleControl,
{
    fn drop(&mut self) {
        self.deactivate();
    }
}

fn capture_rate<D: PlaybackDevice>(device: &D) -> f64 {
    match device.rate() {
        Ok(rate) => rate,
        Err(e) => {
            log::warn!("[SYNC] Could not read playback rate, assuming {}: {}", DEFAULT_RATE, e);
            DEFAULT_RATE
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::clock::{PlaybackDevice, ReferenceClock, TimeScaleControl};
    use crate::config::SyncSettings;
    use crate::error::{SyncError, SyncResult};
    use crate::types::{ClipInfo, Strategy};

    const DT: f64 = 1.0 / 60.0;
    const EPS: f64 = 1e-9;

    // ─────────────────────────────────────────────────────────────────────────────
    // Fakes
    // ─────────────────────────────────────────────────────────────────────────────

    #[derive(Debug)]
    struct DeviceState {
        position: f64,
        rate: f64,
        playing: bool,
        clip: Option<ClipInfo>,
        faulty: bool,
        seeks: Vec<f64>,
        pauses: usize,
        resumes: usize,
    }

    #[derive(Debug, Clone)]
    struct FakeDevice(Rc<RefCell<DeviceState>>);

    impl FakeDevice {
        fn new(position: f64, clip: Option<ClipInfo>) -> Self {
            Self(Rc::new(RefCell::new(DeviceState {
                position,
                rate: 1.0,
                playing: true,
                clip,
                faulty: false,
                seeks: Vec::new(),
                pauses: 0,
                resumes: 0,
            })))
        }

        fn check(&self) -> SyncResult<()> {
            if self.0.borrow().faulty {
                Err(SyncError::DeviceFault("device destroyed".into()))
            } else {
                Ok(())
            }
        }
    }

    impl PlaybackDevice for FakeDevice {
        fn position(&self) -> SyncResult<f64> {
            self.check()?;
            Ok(self.0.borrow().position)
        }

        fn seek(&mut self, seconds: f64) -> SyncResult<()> {
            self.check()?;
            let mut state = self.0.borrow_mut();
            state.position = seconds;
            state.seeks.push(seconds);
            Ok(())
        }

        fn rate(&self) -> SyncResult<f64> {
            self.check()?;
            Ok(self.0.borrow().rate)
        }

        fn set_rate(&mut self, rate: f64) -> SyncResult<()> {
            self.check()?;
            self.0.borrow_mut().rate = rate;
            Ok(())
        }

        fn is_playing(&self) -> SyncResult<bool> {
            self.check()?;
            Ok(self.0.borrow().playing)
        }

        fn pause(&mut self) -> SyncResult<()> {
            self.check()?;
            let mut state = self.0.borrow_mut();
            state.playing = false;
            state.pauses += 1;
            Ok(())
        }

        fn resume(&mut self) -> SyncResult<()> {
            self.check()?;
            let mut state = self.0.borrow_mut();
            state.playing = true;
            state.resumes += 1;
            Ok(())
        }

        fn clip(&self) -> SyncResult<Option<ClipInfo>> {
            Ok(self.0.borrow().clip)
        }
    }

    #[derive(Debug, Clone, Default)]
    struct FakeClock {
        time: Rc<Cell<f64>>,
        frozen: Rc<Cell<bool>>,
    }

    impl ReferenceClock for FakeClock {
        fn current_time(&self) -> SyncResult<f64> {
            Ok(self.time.get())
        }

        fn is_host_frozen(&self) -> bool {
            self.frozen.get()
        }
    }

    #[derive(Debug, Clone)]
    struct FakeScale(Rc<Cell<f64>>);

    impl TimeScaleControl for FakeScale {
        fn scale(&self) -> f64 {
            self.0.get()
        }

        fn set_scale(&mut self, scale: f64) {
            self.0.set(scale);
        }
    }

    type Resolver = Box<dyn FnMut() -> Option<FakeDevice>>;
    type TestController = DriftController<Resolver, FakeClock, FakeScale>;

    struct Harness {
        controller: TestController,
        device: FakeDevice,
        clock: FakeClock,
        scale: Rc<Cell<f64>>,
    }

    impl Harness {
        fn new(settings: SyncSettings) -> Self {
            Self::with_device(settings, FakeDevice::new(0.0, Some(ClipInfo::new(10.0, false))))
        }

        fn with_device(settings: SyncSettings, device: FakeDevice) -> Self {
            let clock = FakeClock::default();
            let scale = Rc::new(Cell::new(1.0));
            let handle = device.clone();
            let resolver: Resolver = Box::new(move || Some(handle.clone()));
            let mut controller =
                DriftController::new(resolver, clock.clone(), FakeScale(scale.clone()), settings);
            controller.activate();
            Self {
                controller,
                device,
                clock,
                scale,
            }
        }

        fn strategy(strategy: Strategy) -> Self {
            Self::new(SyncSettings {
                strategy: Some(strategy),
                ..Default::default()
            })
        }

        /// Set both clocks then tick
        fn tick_at(&mut self, reference_time: f64, position: f64) -> TickOutcome {
            self.clock.time.set(reference_time);
            self.device.0.borrow_mut().position = position;
            self.controller.tick(DT)
        }

        fn rate(&self) -> f64 {
            self.device.0.borrow().rate
        }

        fn position(&self) -> f64 {
            self.device.0.borrow().position
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Skips
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_tick_before_activate_is_skipped() {
        let device = FakeDevice::new(0.0, Some(ClipInfo::new(10.0, false)));
        let resolver: Resolver = Box::new(move || Some(device.clone()));
        let mut controller = DriftController::new(
            resolver,
            FakeClock::default(),
            FakeScale(Rc::new(Cell::new(1.0))),
            SyncSettings::default(),
        );
        assert_eq!(controller.tick(DT), TickOutcome::Skipped(SyncError::NotActivated));
    }

    #[test]
    fn test_host_frozen_is_noop() {
        let mut h = Harness::strategy(Strategy::AudioTimeSet);
        h.clock.frozen.set(true);
        assert_eq!(h.tick_at(5.0, 0.0), TickOutcome::HostFrozen);
        assert!(h.device.0.borrow().seeks.is_empty());
    }

    #[test]
    fn test_missing_device_is_skipped_until_resolved() {
        let slot: Rc<RefCell<Option<FakeDevice>>> = Rc::new(RefCell::new(None));
        let lookup = slot.clone();
        let resolver: Resolver = Box::new(move || lookup.borrow().clone());
        let clock = FakeClock::default();
        let mut controller = DriftController::new(
            resolver,
            clock.clone(),
            FakeScale(Rc::new(Cell::new(1.0))),
            SyncSettings::default(),
        );
        controller.activate();

        clock.time.set(1.0);
        assert_eq!(controller.tick(DT), TickOutcome::Skipped(SyncError::DeviceUnavailable));
        assert!(controller.device().is_none());

        let device = FakeDevice::new(1.0, Some(ClipInfo::new(10.0, false)));
        device.0.borrow_mut().rate = 0.9;
        *slot.borrow_mut() = Some(device);

        clock.time.set(1.0 + DT);
        assert!(matches!(controller.tick(DT), TickOutcome::Steered(_)));
        assert_eq!(controller.original_rate(), 0.9);
    }

    #[test]
    fn test_unknown_clip_is_skipped() {
        let mut h = Harness::with_device(SyncSettings::default(), FakeDevice::new(0.0, None));
        assert_eq!(h.tick_at(1.0, 0.0), TickOutcome::Skipped(SyncError::ClipUnknown));
    }

    #[test]
    fn test_no_strategy_is_skipped() {
        let mut h = Harness::new(SyncSettings {
            strategy: None,
            ..Default::default()
        });
        assert_eq!(h.tick_at(1.0, 0.0), TickOutcome::Skipped(SyncError::ConfigIncomplete));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Stopped timeline / idle playback
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_frozen_timeline_pauses_and_never_mutates_knobs() {
        let mut h = Harness::strategy(Strategy::AudioPitch);
        h.tick_at(1.0, 1.0);
        // start a correction so there's something to disturb
        assert!(matches!(h.tick_at(2.0, 2.2), TickOutcome::Steered(Correction::Started { .. })));
        let adjustment = h.controller.current_adjustment();
        let rate = h.rate();
        let state = *h.controller.state();

        assert_eq!(h.tick_at(2.0, 2.2), TickOutcome::TimelineStopped { paused: true });
        for _ in 0..10 {
            assert_eq!(h.tick_at(2.0, 2.2), TickOutcome::TimelineStopped { paused: false });
        }
        assert_eq!(h.controller.current_adjustment(), adjustment);
        assert_eq!(h.rate(), rate);
        assert_eq!(h.scale.get(), 1.0);
        assert_eq!(*h.controller.state(), state);
        assert_eq!(h.device.0.borrow().pauses, 1);
    }

    #[test]
    fn test_frozen_timeline_without_stop_toggle_leaves_audio() {
        let mut h = Harness::new(SyncSettings {
            stop_if_animation_stopped: false,
            ..Default::default()
        });
        h.tick_at(1.0, 1.0);
        assert_eq!(h.tick_at(1.0, 1.0), TickOutcome::TimelineStopped { paused: false });
        assert!(h.device.0.borrow().playing);
    }

    #[test]
    fn test_not_playing_in_sync_rewinds() {
        let mut h = Harness::strategy(Strategy::AudioTimeSet);
        h.device.0.borrow_mut().playing = false;
        // drift 0: rewind to the start without running the strategy
        assert_eq!(h.tick_at(0.0, 0.0), TickOutcome::Rewound);
        assert_eq!(h.position(), 0.0);
        assert_eq!(h.controller.state().previous_reference_time, NEVER_SEEN);
    }

    #[test]
    fn test_not_playing_with_drift_resumes() {
        let mut h = Harness::strategy(Strategy::AudioTimeSet);
        h.device.0.borrow_mut().playing = false;
        let outcome = h.tick_at(3.2, 3.0);
        assert!(h.device.0.borrow().playing);
        assert_eq!(h.device.0.borrow().resumes, 1);
        // strategy still runs after resuming
        assert_eq!(outcome, TickOutcome::Steered(Correction::Seek { target: 3.2 }));
    }

    #[test]
    fn test_not_playing_without_stop_toggle_rewinds() {
        let mut h = Harness::new(SyncSettings {
            stop_if_animation_stopped: false,
            ..Default::default()
        });
        h.device.0.borrow_mut().playing = false;
        assert_eq!(h.tick_at(4.0, 2.5), TickOutcome::Rewound);
        assert_eq!(h.position(), 0.0);
        assert!(!h.device.0.borrow().playing);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Strategies
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_time_set_seeks_to_target() {
        let mut h = Harness::strategy(Strategy::AudioTimeSet);
        let outcome = h.tick_at(3.2, 3.0);
        assert_eq!(outcome, TickOutcome::Steered(Correction::Seek { target: 3.2 }));
        assert!((h.position() - 3.2).abs() < EPS);
        assert_eq!(h.controller.current_adjustment(), 0.0);
    }

    #[test]
    fn test_time_set_dead_zone() {
        let mut h = Harness::strategy(Strategy::AudioTimeSet);
        assert_eq!(h.tick_at(3.0, 3.02), TickOutcome::Steered(Correction::InSync));
        assert!(h.device.0.borrow().seeks.is_empty());
        assert!(matches!(h.tick_at(3.1, 3.13), TickOutcome::Steered(Correction::Seek { .. })));
    }

    #[test]
    fn test_time_scale_steps_then_holds_while_improving() {
        let mut h = Harness::strategy(Strategy::TimeScale);
        let step = 0.05 * DT * 10.0;

        // audio ahead by 0.06: speed the timeline up
        let outcome = h.tick_at(2.0, 2.06);
        assert_eq!(outcome, TickOutcome::Steered(Correction::Started { adjustment: step }));
        assert!((h.scale.get() - (1.0 + step)).abs() < EPS);

        // drift improves to 0.03: hold, no re-derivation
        let outcome = h.tick_at(2.1, 2.13);
        assert_eq!(outcome, TickOutcome::Steered(Correction::Held { adjustment: step }));
        assert!((h.scale.get() - (1.0 + step)).abs() < EPS);
    }

    #[test]
    fn test_time_scale_uses_target_baseline() {
        let mut h = Harness::new(SyncSettings {
            strategy: Some(Strategy::TimeScale),
            target_timescale: Some(0.5),
            ..Default::default()
        });
        // target = 4.0 / 0.5 = 8.0; audio behind by 0.1 -> slow the timeline
        h.tick_at(4.0, 7.9);
        let adjustment = h.controller.current_adjustment();
        assert!(adjustment < 0.0);
        assert!((h.scale.get() - (0.5 + adjustment)).abs() < EPS);

        // release goes back to the target, not the captured original
        h.tick_at(4.1, 8.2);
        assert_eq!(h.controller.current_adjustment(), 0.0);
        assert!((h.scale.get() - 0.5).abs() < EPS);
    }

    #[test]
    fn test_time_scale_holds_target_before_first_correction() {
        let mut h = Harness::new(SyncSettings {
            strategy: Some(Strategy::TimeScale),
            target_timescale: Some(0.5),
            ..Default::default()
        });
        assert_eq!(h.controller.original_timescale(), 1.0);
        assert!((h.scale.get() - 0.5).abs() < EPS);

        // in sync: idle, still at the target
        assert_eq!(h.tick_at(1.0, 2.0), TickOutcome::Steered(Correction::InSync));
        assert!((h.scale.get() - 0.5).abs() < EPS);

        // first step is a nudge off the target, not a jump from the original
        let step = 0.05 * DT * 10.0;
        let outcome = h.tick_at(1.1, 2.26);
        assert_eq!(outcome, TickOutcome::Steered(Correction::Started { adjustment: step }));
        assert!((h.scale.get() - (0.5 + step)).abs() < EPS);

        assert_eq!(h.tick_at(1.2, 2.4), TickOutcome::Steered(Correction::Released));
        assert!((h.scale.get() - 0.5).abs() < EPS);
    }

    #[test]
    fn test_time_scale_target_follows_strategy_and_settings() {
        let mut h = Harness::new(SyncSettings {
            strategy: Some(Strategy::AudioPitch),
            target_timescale: Some(0.5),
            ..Default::default()
        });
        // other strategies leave the global scale alone
        assert_eq!(h.scale.get(), 1.0);

        h.controller.set_strategy(Some(Strategy::TimeScale));
        assert!((h.scale.get() - 0.5).abs() < EPS);

        // idle target change moves the knob straight away
        h.controller.set_target_timescale(Some(0.8));
        assert!((h.scale.get() - 0.8).abs() < EPS);
        h.controller.set_target_timescale(None);
        assert_eq!(h.scale.get(), 1.0);
        h.controller.set_target_timescale(Some(0.8));

        // source change keeps the knob on the target
        h.controller.on_source_config_changed();
        assert!((h.scale.get() - 0.8).abs() < EPS);

        // leaving the strategy or deactivating goes back to the original
        h.controller.set_strategy(Some(Strategy::AudioTimeSet));
        assert_eq!(h.scale.get(), 1.0);
        h.controller.set_strategy(Some(Strategy::TimeScale));
        assert!((h.scale.get() - 0.8).abs() < EPS);
        h.controller.deactivate();
        assert_eq!(h.scale.get(), 1.0);
    }

    #[test]
    fn test_pitch_slows_audio_that_is_ahead() {
        let mut h = Harness::strategy(Strategy::AudioPitch);
        h.tick_at(1.0, 1.1);
        let adjustment = h.controller.current_adjustment();
        assert!((adjustment + 0.05 * DT).abs() < EPS);
        assert!((h.rate() - (1.0 + adjustment)).abs() < EPS);
    }

    #[test]
    fn test_pitch_strengthens_when_worsening_and_releases_when_close() {
        let mut h = Harness::strategy(Strategy::AudioPitch);
        let step = 0.05 * DT;

        h.tick_at(1.0, 0.94); // behind 0.06 -> speed audio up
        assert!((h.controller.current_adjustment() - step).abs() < EPS);

        let outcome = h.tick_at(1.1, 1.02); // behind 0.08 -> worse
        assert!(matches!(outcome, TickOutcome::Steered(Correction::Strengthened { .. })));
        assert!((h.controller.current_adjustment() - 2.0 * step).abs() < EPS);
        assert!((h.rate() - (1.0 + 2.0 * step)).abs() < EPS);

        let outcome = h.tick_at(1.2, 1.195); // within 0.01
        assert_eq!(outcome, TickOutcome::Steered(Correction::Released));
        assert_eq!(h.controller.current_adjustment(), 0.0);
        assert_eq!(h.rate(), 1.0);
    }

    #[test]
    fn test_hysteresis_does_not_chatter_in_dead_band() {
        let mut h = Harness::strategy(Strategy::AudioPitch);
        h.tick_at(1.0, 1.06);
        assert!(h.controller.state().is_correcting());

        // wander inside (0.01, 0.05), rising back above 0.05 once
        let wander = [0.04, 0.03, 0.055, 0.02, 0.015, 0.012];
        for (i, drift) in wander.iter().enumerate() {
            let t = 1.1 + i as f64 * 0.1;
            h.tick_at(t, t + drift);
            assert!(h.controller.state().is_correcting(), "released early at drift {}", drift);
        }

        h.tick_at(2.0, 2.01);
        assert!(!h.controller.state().is_correcting());

        // back in the dead band from idle: stays idle
        let drifts = [0.04, 0.03, 0.02, 0.015, 0.012];
        for (i, drift) in drifts.iter().enumerate() {
            let t = 2.1 + i as f64 * 0.1;
            assert_eq!(h.tick_at(t, t + drift), TickOutcome::Steered(Correction::InSync));
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Hard jump
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_hard_jump_preempts_every_strategy() {
        for strategy in Strategy::all() {
            let mut h = Harness::strategy(*strategy);
            h.tick_at(1.0, 1.06);
            let outcome = h.tick_at(5.0, 2.0);
            assert_eq!(outcome, TickOutcome::HardJump { target: 5.0 }, "{:?}", strategy);
            assert!((h.position() - 5.0).abs() < EPS);
            assert_eq!(h.controller.current_adjustment(), 0.0);
            assert_eq!(h.rate(), 1.0);
            assert_eq!(h.scale.get(), 1.0);
        }
    }

    #[test]
    fn test_no_hard_jump_when_disabled() {
        let mut h = Harness::new(SyncSettings {
            strategy: Some(Strategy::AudioPitch),
            jump_if_too_far: false,
            ..Default::default()
        });
        let outcome = h.tick_at(5.0, 2.0);
        assert!(matches!(outcome, TickOutcome::Steered(Correction::Started { .. })));
        assert_eq!(h.position(), 2.0);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_activation_captures_originals() {
        let device = FakeDevice::new(0.0, Some(ClipInfo::new(10.0, false)));
        device.0.borrow_mut().rate = 1.25;
        let clock = FakeClock::default();
        let scale = Rc::new(Cell::new(0.8));
        let handle = device.clone();
        let resolver: Resolver = Box::new(move || Some(handle.clone()));
        let mut controller =
            DriftController::new(resolver, clock, FakeScale(scale.clone()), SyncSettings::default());
        controller.activate();

        assert!(controller.is_active());
        assert_eq!(controller.original_rate(), 1.25);
        assert_eq!(controller.original_timescale(), 0.8);
    }

    #[test]
    fn test_strategy_switch_restores_originals() {
        let mut h = Harness::strategy(Strategy::TimeScale);
        h.tick_at(1.0, 1.3);
        assert_ne!(h.scale.get(), 1.0);

        h.controller.set_strategy(Some(Strategy::AudioPitch));
        assert_eq!(h.scale.get(), 1.0);
        assert_eq!(h.controller.current_adjustment(), 0.0);
        assert_eq!(*h.controller.state(), SyncState::default());

        h.tick_at(1.1, 1.4);
        assert_ne!(h.rate(), 1.0);
        h.controller.on_strategy_changed();
        assert_eq!(h.rate(), 1.0);
        assert_eq!(h.controller.state().previous_reference_time, NEVER_SEEN);
    }

    #[test]
    fn test_same_strategy_does_not_reset() {
        let mut h = Harness::strategy(Strategy::TimeScale);
        h.tick_at(1.0, 1.3);
        let adjustment = h.controller.current_adjustment();
        h.controller.set_strategy(Some(Strategy::TimeScale));
        assert_eq!(h.controller.current_adjustment(), adjustment);
    }

    #[test]
    fn test_target_change_moves_inflight_correction() {
        let mut h = Harness::strategy(Strategy::TimeScale);
        h.tick_at(1.0, 1.3);
        let adjustment = h.controller.current_adjustment();
        h.controller.set_target_timescale(Some(0.75));
        assert!((h.scale.get() - (0.75 + adjustment)).abs() < EPS);
    }

    #[test]
    fn test_deactivate_and_drop_restore() {
        let mut h = Harness::strategy(Strategy::AudioPitch);
        h.tick_at(1.0, 1.3);
        assert_ne!(h.rate(), 1.0);
        h.controller.deactivate();
        assert_eq!(h.rate(), 1.0);
        assert!(!h.controller.is_active());
        assert_eq!(h.tick_at(2.0, 2.0), TickOutcome::Skipped(SyncError::NotActivated));

        let mut h = Harness::strategy(Strategy::TimeScale);
        h.tick_at(1.0, 1.3);
        let scale = h.scale.clone();
        assert_ne!(scale.get(), 1.0);
        drop(h);
        assert_eq!(scale.get(), 1.0);
    }

    #[test]
    fn test_source_change_restores_and_reresolves() {
        let first = FakeDevice::new(0.0, Some(ClipInfo::new(10.0, false)));
        let second = FakeDevice::new(0.0, Some(ClipInfo::new(10.0, false)));
        second.0.borrow_mut().rate = 1.1;

        let current = Rc::new(RefCell::new(first.clone()));
        let lookup = current.clone();
        let resolver: Resolver = Box::new(move || Some(lookup.borrow().clone()));
        let clock = FakeClock::default();
        let mut controller = DriftController::new(
            resolver,
            clock.clone(),
            FakeScale(Rc::new(Cell::new(1.0))),
            SyncSettings {
                strategy: Some(Strategy::AudioPitch),
                ..Default::default()
            },
        );
        controller.activate();

        clock.time.set(1.0);
        first.0.borrow_mut().position = 1.2;
        controller.tick(DT);
        assert_ne!(first.0.borrow().rate, 1.0);

        *current.borrow_mut() = second.clone();
        controller.on_source_config_changed();
        assert_eq!(first.0.borrow().rate, 1.0);
        assert!(controller.device().is_none());

        clock.time.set(1.1);
        second.0.borrow_mut().position = 1.1;
        controller.tick(DT);
        assert_eq!(controller.original_rate(), 1.1);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Faults and telemetry
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_device_fault_is_caught_and_state_kept() {
        let mut h = Harness::strategy(Strategy::AudioPitch);
        h.tick_at(1.0, 1.3);
        let state = *h.controller.state();

        h.device.0.borrow_mut().faulty = true;
        h.clock.time.set(1.5);
        let outcome = h.controller.tick(DT);
        assert!(matches!(outcome, TickOutcome::Faulted(SyncError::DeviceFault(_))));
        assert_eq!(*h.controller.state(), state);

        // recovers on the next good frame
        h.device.0.borrow_mut().faulty = false;
        assert!(matches!(h.tick_at(1.6, 1.6), TickOutcome::Steered(_)));
    }

    #[test]
    fn test_telemetry_only_while_visible() {
        let mut h = Harness::strategy(Strategy::AudioTimeSet);
        for i in 0..30 {
            let t = 1.0 + i as f64 * DT;
            h.tick_at(t, t);
        }
        assert!(h.controller.telemetry().is_none());

        h.controller.set_debug_visible(true);
        for i in 0..14 {
            let t = 2.0 + i as f64 * DT;
            h.tick_at(t, t);
        }
        // 14 frames at 60fps is ~0.233s, still under the interval
        assert!(h.controller.telemetry().is_none());

        for i in 14..20 {
            let t = 2.0 + i as f64 * DT;
            h.tick_at(t, t + 0.004);
        }
        let snapshot = *h.controller.telemetry().expect("telemetry published");
        assert!((snapshot.drift - 0.004).abs() < 1e-6);
        assert_eq!(snapshot.rate, 1.0);
        assert_eq!(snapshot.timescale, 1.0);
        assert!(!snapshot.over_limit);
    }

    #[test]
    fn test_telemetry_marks_audio_running_ahead() {
        let mut h = Harness::new(SyncSettings {
            strategy: Some(Strategy::AudioPitch),
            jump_if_too_far: false,
            ..Default::default()
        });
        h.controller.set_debug_visible(true);
        for i in 0..20 {
            let t = 1.0 + i as f64 * DT;
            h.tick_at(t, t + 0.2);
        }
        let snapshot = *h.controller.telemetry().expect("telemetry published");
        assert!((snapshot.drift - 0.2).abs() < 1e-6);
        assert!(snapshot.over_limit);
        assert!(snapshot.adjustment < 0.0);
        assert!(snapshot.to_string().contains("drift: 0.200 (over limit)"));

        // audio lagging behind is corrected but not marked
        for i in 20..40 {
            let t = 1.0 + i as f64 * DT;
            h.tick_at(t, t - 0.2);
        }
        let snapshot = *h.controller.telemetry().expect("telemetry published");
        assert!((snapshot.drift + 0.2).abs() < 1e-6);
        assert!(!snapshot.over_limit);
        assert!(!snapshot.to_string().contains("over limit"));
    }

    #[test]
    fn test_hiding_debug_surface_clears_telemetry() {
        let mut h = Harness::strategy(Strategy::AudioTimeSet);
        h.controller.set_debug_visible(true);
        for i in 0..20 {
            let t = 1.0 + i as f64 * DT;
            h.tick_at(t, t);
        }
        assert!(h.controller.telemetry().is_some());

        h.controller.set_debug_visible(false);
        assert!(h.controller.telemetry().is_none());
        for i in 20..40 {
            let t = 1.0 + i as f64 * DT;
            h.tick_at(t, t);
        }
        assert!(h.controller.telemetry().is_none());
    }
}
