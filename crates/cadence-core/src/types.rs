//! Core types shared by the controller, config and hosts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Allowed range for the animation-to-audio offset (seconds)
pub const OFFSET_RANGE: (f64, f64) = (-60.0, 60.0);

/// How the controller pulls the playback clock back in line with the timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Nudge the global time scale so the animation catches up with the audio
    #[default]
    TimeScale,
    /// Seek the audio straight to where it should be
    AudioTimeSet,
    /// Bend the audio play rate until it catches up
    AudioPitch,
}

impl Strategy {
    /// Get display name for UI
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::TimeScale => "Change Time Scale",
            Self::AudioTimeSet => "Set Audio Time",
            Self::AudioPitch => "Change Audio Pitch",
        }
    }

    /// Stable key used in config files and on the command line
    pub fn key(&self) -> &'static str {
        match self {
            Self::TimeScale => "time_scale",
            Self::AudioTimeSet => "audio_time_set",
            Self::AudioPitch => "audio_pitch",
        }
    }

    /// Get all variants for UI dropdown
    pub fn all() -> &'static [Self] {
        &[Self::TimeScale, Self::AudioTimeSet, Self::AudioPitch]
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Strategy {
    type Err = String;

    /// Accepts either the config key (`audio_pitch`) or the UI label
    /// (`Change Audio Pitch`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::all()
            .iter()
            .copied()
            .find(|strategy| {
                strategy.key().eq_ignore_ascii_case(wanted)
                    || strategy.display_name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| format!("Unknown sync strategy: {:?}", s))
    }
}

/// What the playback device knows about the clip it is playing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipInfo {
    /// Clip length in seconds (zero when the host can't tell)
    pub duration_seconds: f64,
    /// Whether playback wraps at the end of the clip
    pub loops: bool,
}

impl ClipInfo {
    pub fn new(duration_seconds: f64, loops: bool) -> Self {
        Self {
            duration_seconds,
            loops,
        }
    }

    /// A known, positive length usable for wrapping/clamping
    pub fn has_length(&self) -> bool {
        self.duration_seconds > 0.0 && self.duration_seconds.is_finite()
    }
}
