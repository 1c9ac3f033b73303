//! Sound chip collaborator interfaces.
//!
//! The synthesis cores themselves (FM operator math, PSG tone/noise
//! generation) live outside this workspace; the system crates drive them
//! through these traits and splice their output onto one shared
//! master-cycle timeline.

use super::blip::Blip;
use crate::StateError;

/// FM synthesis core (YM-family chip).
///
/// The sound synchronizer pulls whole chip ticks out of the core into an
/// intermediate buffer; each tick produces one stereo pair.
pub trait FmSynth {
    fn reset(&mut self);

    /// Render `out.len() / 2` chip ticks as interleaved stereo pairs.
    fn run(&mut self, out: &mut [i32]);

    /// Register write (address lines as wired on the console bus).
    fn write(&mut self, addr: u16, data: u8) {
        let _ = (addr, data);
    }

    /// Status read, where the chip supports it.
    fn read(&mut self) -> u8 {
        0
    }

    /// Append the chip's internal context to `out`.
    fn save_context(&self, out: &mut Vec<u8>);

    /// Restore a context produced by `save_context`.
    fn load_context(&mut self, data: &[u8]) -> Result<(), StateError>;
}

/// PSG synthesis core (four-channel square/noise chip).
///
/// Unlike the FM core, the PSG paces itself: it owns its position on the
/// master-cycle timeline and emits deltas straight into the shared blip
/// channels.
pub trait PsgSynth {
    fn reset(&mut self);

    /// Run the generators up to the given master cycle.
    fn run_to(&mut self, cycle: u32, blips: &mut [Blip; 2]);

    /// Latch/data write at the given master cycle.
    fn write(&mut self, cycle: u32, data: u8, blips: &mut [Blip; 2]) {
        let _ = (cycle, data, blips);
    }

    /// Re-base the chip's internal cycle position at frame end.
    fn rebase(&mut self, frame_cycles: u32);

    /// Append the chip's internal context to `out`.
    fn save_context(&self, out: &mut Vec<u8>);

    /// Restore a context produced by `save_context`.
    fn load_context(&mut self, data: &[u8]) -> Result<(), StateError>;
}
