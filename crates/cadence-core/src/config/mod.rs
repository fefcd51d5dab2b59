//! Sync configuration
//!
//! This module provides the user-facing knobs of the drift controller and the
//! YAML plumbing hosts use to keep them between sessions:
//!
//! - [`SyncSettings`] - strategy, offset, target time scale, toggles
//! - [`Thresholds`] - tunable drift thresholds and step size
//! - Generic YAML config loading/saving
//!
//! # Usage
//!
//! ```ignore
//! use cadence_core::config::{load_config, save_config, default_config_path, SyncSettings};
//!
//! let path = default_config_path("sync.yaml");
//! let settings: SyncSettings = load_config(&path);
//! save_config(&settings, &path)?;
//! ```

mod io;
mod paths;
mod settings;

pub use io::{load_config, save_config};
pub use paths::{default_config_dir, default_config_path};
pub use settings::{SyncSettings, Thresholds};
