//! Core audio components.
//!
//! This module provides the audio plumbing shared by the system crates:
//! region timing, the band-limited delta sample buffer used to resample
//! chip output to the host rate, and the collaborator interfaces for the
//! FM and PSG synthesis cores (the synthesis math itself lives outside
//! this workspace).

pub mod blip;
pub mod synth;
pub mod timing;

pub use blip::Blip;
pub use synth::{FmSynth, PsgSynth};
pub use timing::TimingMode;
