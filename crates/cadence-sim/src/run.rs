//! Scenario runner and summary report

use std::collections::BTreeMap;
use std::fmt;

use anyhow::Result;
use cadence_core::controller::{Correction, DriftController, Telemetry, TickOutcome};

use crate::host::{SimClock, SimDevice, SimTimeScale, World};
use crate::scenario::{EventKind, Scenario};

/// What happened over a whole run
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub name: String,
    pub frames: usize,
    /// Tick outcomes by label
    pub outcomes: BTreeMap<&'static str, usize>,
    /// Largest |drift| seen while the timeline was running
    pub max_drift: f64,
    drift_sum: f64,
    drift_samples: usize,
    /// Drift after the last frame
    pub final_drift: Option<f64>,
    /// New telemetry snapshots seen (debug runs only)
    pub telemetry_updates: usize,
}

impl Report {
    fn record(&mut self, outcome: &TickOutcome) {
        *self.outcomes.entry(outcome_label(outcome)).or_insert(0) += 1;
    }

    fn observe(&mut self, drift: f64) {
        let drift = drift.abs();
        self.max_drift = self.max_drift.max(drift);
        self.drift_sum += drift;
        self.drift_samples += 1;
    }

    /// Mean |drift| while the timeline was running
    pub fn mean_drift(&self) -> f64 {
        if self.drift_samples == 0 {
            0.0
        } else {
            self.drift_sum / self.drift_samples as f64
        }
    }

    pub fn count(&self, label: &str) -> usize {
        self.outcomes.get(label).copied().unwrap_or(0)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "scenario: {} ({} frames)", self.name, self.frames)?;
        writeln!(f, "max |drift|:  {:.4}s", self.max_drift)?;
        writeln!(f, "mean |drift|: {:.4}s", self.mean_drift())?;
        match self.final_drift {
            Some(drift) => writeln!(f, "final drift:  {:+.4}s", drift)?,
            None => writeln!(f, "final drift:  unavailable")?,
        }
        if self.telemetry_updates > 0 {
            writeln!(f, "telemetry:    {} refreshes", self.telemetry_updates)?;
        }
        writeln!(f, "outcomes:")?;
        for (label, count) in &self.outcomes {
            writeln!(f, "  {:<18} {}", label, count)?;
        }
        Ok(())
    }
}

fn outcome_label(outcome: &TickOutcome) -> &'static str {
    match outcome {
        TickOutcome::HostFrozen => "host_frozen",
        TickOutcome::Skipped(_) => "skipped",
        TickOutcome::TimelineStopped { .. } => "timeline_stopped",
        TickOutcome::Rewound => "rewound",
        TickOutcome::HardJump { .. } => "hard_jump",
        TickOutcome::Faulted(_) => "faulted",
        TickOutcome::Steered(correction) => match correction {
            Correction::InSync => "in_sync",
            Correction::Seek { .. } => "seek",
            Correction::Started { .. } => "started",
            Correction::Strengthened { .. } => "strengthened",
            Correction::Held { .. } => "held",
            Correction::Released => "released",
        },
    }
}

/// Run a scenario to completion
///
/// With `debug` set the controller's debug surface is visible and each new
/// telemetry snapshot is logged.
pub fn run(scenario: &Scenario, debug: bool) -> Result<Report> {
    scenario.validate()?;

    let world = World::new(scenario).shared();
    let device_world = world.clone();
    let resolver = move || Some(SimDevice(device_world.clone()));
    let mut controller = DriftController::new(
        resolver,
        SimClock(world.clone()),
        SimTimeScale(world.clone()),
        scenario.settings.clone(),
    );
    controller.set_debug_visible(debug);
    controller.activate();

    let delta_time = 1.0 / scenario.frame_rate;
    let frames = (scenario.run_seconds * scenario.frame_rate).round() as usize;
    let events = scenario.sorted_events();
    let mut next_event = 0;
    let mut last_telemetry: Option<Telemetry> = None;

    let mut report = Report {
        name: scenario.name.clone(),
        frames,
        ..Default::default()
    };

    log::info!(
        "[SIM] Running '{}': {:.1}s at {} fps, {} events",
        scenario.name,
        scenario.run_seconds,
        scenario.frame_rate,
        events.len()
    );

    for frame in 0..frames {
        let now = frame as f64 * delta_time;
        while let Some(event) = events.get(next_event).filter(|e| e.at <= now) {
            log::info!("[SIM] t={:.2}s {:?}", now, event.kind);
            match &event.kind {
                EventKind::SwitchStrategy { strategy } => controller.set_strategy(*strategy),
                kind => apply_event(&mut world.borrow_mut(), kind),
            }
            next_event += 1;
        }

        world.borrow_mut().advance(delta_time);
        let outcome = controller.tick(delta_time);
        report.record(&outcome);

        if world.borrow().is_running() {
            if let Ok(drift) = controller.current_drift() {
                report.observe(drift);
            }
        }

        if let Some(telemetry) = controller.telemetry() {
            if last_telemetry.as_ref() != Some(telemetry) {
                log::info!("[SIM] t={:.2}s\n{}", now, telemetry);
                last_telemetry = Some(*telemetry);
                report.telemetry_updates += 1;
            }
        }
    }

    report.final_drift = controller.current_drift().ok();
    controller.deactivate();
    Ok(report)
}

/// Apply a disturbance to the simulated world
fn apply_event(world: &mut World, kind: &EventKind) {
    match *kind {
        EventKind::Lag { seconds } => world.timeline = (world.timeline - seconds).max(0.0),
        EventKind::Stop { seconds } => world.stopped_until = world.wall_time + seconds,
        EventKind::Scrub { to } => world.timeline = to.max(0.0),
        EventKind::Freeze { seconds } => world.frozen_until = world.wall_time + seconds,
        EventKind::AudioHiccup { seconds } => {
            world.audio.position = (world.audio.position + seconds).max(0.0)
        }
        EventKind::SwitchStrategy { .. } => {}
    }
}
