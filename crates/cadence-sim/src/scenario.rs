//! Simulation scenarios
//!
//! A scenario describes a clip, how badly the audio clock misbehaves, the
//! sync settings under test, and a list of scripted disturbances. Scenarios
//! are stored as YAML; every field has a default so small files stay small:
//!
//! ```yaml
//! run_seconds: 30
//! audio_clock_error: 0.01
//! settings:
//!   strategy: audio_pitch
//! events:
//!   - at: 5.0
//!     kind: lag
//!     seconds: 0.3
//!   - at: 12.0
//!     kind: scrub
//!     to: 40.0
//! ```

use anyhow::{bail, Context, Result};
use cadence_core::config::SyncSettings;
use cadence_core::{ClipInfo, Strategy};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root scenario structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Label printed in the summary
    pub name: String,
    /// Simulated wall time (seconds)
    /// Default: 60.0
    pub run_seconds: f64,
    /// Host frame rate (ticks per second)
    /// Default: 60.0
    pub frame_rate: f64,
    /// The soundtrack clip
    pub clip: ClipConfig,
    /// Fractional speed error of the audio clock (0.01 = 1% fast)
    /// Default: 0.005
    pub audio_clock_error: f64,
    /// Settings handed to the controller
    pub settings: SyncSettings,
    /// Scripted disturbances, applied in wall-time order
    pub events: Vec<ScenarioEvent>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            run_seconds: 60.0,
            frame_rate: 60.0,
            clip: ClipConfig::default(),
            audio_clock_error: 0.005,
            settings: SyncSettings {
                offset_seconds: 1.0,
                ..Default::default()
            },
            events: vec![
                ScenarioEvent::new(10.0, EventKind::Lag { seconds: 0.3 }),
                ScenarioEvent::new(18.0, EventKind::Stop { seconds: 2.0 }),
                ScenarioEvent::new(26.0, EventKind::Scrub { to: 45.0 }),
                ScenarioEvent::new(32.0, EventKind::Freeze { seconds: 0.5 }),
                ScenarioEvent::new(38.0, EventKind::AudioHiccup { seconds: 0.2 }),
                ScenarioEvent::new(
                    46.0,
                    EventKind::SwitchStrategy {
                        strategy: Some(Strategy::AudioPitch),
                    },
                ),
            ],
        }
    }
}

impl Scenario {
    /// Load a scenario the user asked for explicitly
    ///
    /// Unlike the default-path lookup, a missing or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file: {:?}", path))?;
        let scenario: Scenario = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse scenario file: {:?}", path))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Reject scenarios the simulation loop can't run
    pub fn validate(&self) -> Result<()> {
        if !(self.frame_rate > 0.0 && self.frame_rate.is_finite()) {
            bail!("frame_rate must be positive, got {}", self.frame_rate);
        }
        if !(self.run_seconds >= 0.0 && self.run_seconds.is_finite()) {
            bail!("run_seconds must be non-negative, got {}", self.run_seconds);
        }
        if self.audio_clock_error <= -1.0 {
            bail!("audio_clock_error must be above -1.0, got {}", self.audio_clock_error);
        }
        Ok(())
    }

    /// Events sorted by trigger time
    pub fn sorted_events(&self) -> Vec<ScenarioEvent> {
        let mut events = self.events.clone();
        events.sort_by(|a, b| a.at.total_cmp(&b.at));
        events
    }
}

/// Clip section
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipConfig {
    /// Default: 180.0
    pub duration_seconds: f64,
    /// Default: false
    pub loops: bool,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 180.0,
            loops: false,
        }
    }
}

impl From<ClipConfig> for ClipInfo {
    fn from(clip: ClipConfig) -> Self {
        ClipInfo::new(clip.duration_seconds, clip.loops)
    }
}

/// A disturbance scheduled at a wall-clock time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioEvent {
    /// Wall time (seconds since start)
    pub at: f64,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl ScenarioEvent {
    pub fn new(at: f64, kind: EventKind) -> Self {
        Self { at, kind }
    }
}

/// What happens at an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Animation falls behind by `seconds` (a heavy frame)
    Lag { seconds: f64 },
    /// Timeline stops for `seconds`, then carries on
    Stop { seconds: f64 },
    /// Timeline playhead is dragged to `to`
    Scrub { to: f64 },
    /// Host freezes the whole simulation for `seconds`
    Freeze { seconds: f64 },
    /// Audio playhead skips by `seconds` (negative = repeats)
    AudioHiccup { seconds: f64 },
    /// User picks another strategy (`null` disables syncing)
    SwitchStrategy { strategy: Option<Strategy> },
}
