//! Cadence Core - keeps an audio playback clock locked to an animation timeline
//!
//! The host feeds a [`controller::DriftController`] once per simulation frame.
//! The controller reads the animation timeline and the playback device through
//! the capability traits in [`clock`], measures drift, and steers the device
//! (or the global time scale) back into alignment.

pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod target;
pub mod types;

pub use error::{SyncError, SyncResult};
pub use types::*;
