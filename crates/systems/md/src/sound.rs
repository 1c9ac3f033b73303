//! Sound synchronizer.
//!
//! Glues the FM and PSG collaborator chips to the master-cycle timeline.
//! The FM core is pulled in whole chip ticks with the fractional cycle
//! remainder carried across frames, so the long-run tick rate is exact;
//! the PSG paces itself against the same timeline. Both land in a pair of
//! band-limited delta buffers, one per stereo channel, so their phase can
//! never drift apart.

use crate::state::Reader;
use emu_core::apu::{Blip, FmSynth, PsgSynth, TimingMode};
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::StateError;

/// Master cycles per FM chip tick on the dual-CPU console.
pub const FM_RATIO_DUAL: u32 = 144 * 7;
/// Master cycles per FM chip tick on the compact console.
pub const FM_RATIO_COMPACT: u32 = 72 * 15;

/// Scratch capacity in stereo pairs; covers a worst-case PAL frame.
const FM_BUFFER_PAIRS: usize = 2048;

pub struct SoundSync {
    fm: Box<dyn FmSynth>,
    psg: Box<dyn PsgSynth>,
    blips: [Blip; 2],

    fm_buffer: Vec<i32>,
    fm_pos: usize,
    fm_last: [i32; 2],

    fm_ratio: u32,
    /// Phase carried forward: first tick timestamp of the current frame.
    fm_cycles_start: u32,
    /// Master cycle the FM core has been run to.
    fm_cycles_count: u32,

    /// Fixed-point percentage scale applied before delta accumulation.
    fm_preamp: i32,
}

impl SoundSync {
    pub fn new(
        fm: Box<dyn FmSynth>,
        psg: Box<dyn PsgSynth>,
        fm_ratio: u32,
        fm_preamp: u32,
        sample_rate: u32,
    ) -> Self {
        Self {
            fm,
            psg,
            blips: [
                Blip::new((sample_rate / 10) as usize),
                Blip::new((sample_rate / 10) as usize),
            ],
            fm_buffer: vec![0; FM_BUFFER_PAIRS * 2],
            fm_pos: 0,
            fm_last: [0; 2],
            fm_ratio,
            fm_cycles_start: 0,
            fm_cycles_count: 0,
            fm_preamp: fm_preamp as i32,
        }
    }

    /// Point the resamplers at the console master clock for the region.
    pub fn set_rates(&mut self, timing: TimingMode, sample_rate: u32) {
        for blip in &mut self.blips {
            blip.set_rates(timing.master_clock_hz(), sample_rate as f64);
        }
    }

    pub fn reset(&mut self) {
        self.fm.reset();
        self.psg.reset();
        for blip in &mut self.blips {
            blip.clear();
        }
        self.fm_last = [0; 2];
        self.fm_pos = 0;
        self.fm_cycles_start = 0;
        self.fm_cycles_count = 0;
    }

    /// Step the FM core up to the given master cycle. Partial ticks run one
    /// tick ahead; the overshoot is carried in the cycle counter.
    pub fn advance(&mut self, to_cycle: u32) {
        if to_cycle <= self.fm_cycles_count {
            return;
        }
        let span = to_cycle - self.fm_cycles_count;
        self.fm_cycles_count += span;

        let mut ticks = (span / self.fm_ratio) as usize;
        let remain = span % self.fm_ratio;
        if remain != 0 {
            self.fm_cycles_count += self.fm_ratio - remain;
            ticks += 1;
        }

        let start = self.fm_pos * 2;
        let end = start + ticks * 2;
        debug_assert!(end <= self.fm_buffer.len(), "FM scratch overflow");
        if end > self.fm_buffer.len() {
            return;
        }
        self.fm.run(&mut self.fm_buffer[start..end]);
        self.fm_pos += ticks;
    }

    /// FM register write; data-port writes flush the core first so the
    /// change lands at the right tick.
    pub fn fm_write(&mut self, cycle: u32, addr: u16, data: u8) {
        if addr & 1 != 0 {
            self.advance(cycle);
        }
        self.fm.write(addr, data);
    }

    /// FM status read.
    pub fn fm_read(&mut self, cycle: u32) -> u8 {
        self.advance(cycle);
        self.fm.read()
    }

    /// PSG write at the given master cycle.
    pub fn psg_write(&mut self, cycle: u32, data: u8) {
        self.psg.write(cycle, data, &mut self.blips);
    }

    /// Flush both chips to the end-of-frame cycle count and close the
    /// resampler frame. Returns the samples now available.
    pub fn end_frame(&mut self, cycles: u32) -> usize {
        self.psg.run_to(cycles, &mut self.blips);
        self.advance(cycles);

        let preamp = self.fm_preamp;
        let mut time = self.fm_cycles_start;
        let mut left = self.fm_last[0];
        let mut right = self.fm_last[1];

        let mut idx = 0usize;
        loop {
            debug_assert!(idx < self.fm_pos, "FM tick count out of step");
            let pair = idx.min(self.fm_pos.saturating_sub(1)) * 2;
            let raw_l = self.fm_buffer[pair];
            let raw_r = self.fm_buffer[pair + 1];

            let delta = raw_l * preamp / 100 - left;
            left += delta;
            self.blips[0].add_delta(time, delta);

            let delta = raw_r * preamp / 100 - right;
            right += delta;
            self.blips[1].add_delta(time, delta);

            time += self.fm_ratio;
            idx += 1;
            if time >= cycles {
                break;
            }
        }

        self.fm_pos = 0;
        self.fm_last = [left, right];

        // Carry the tick phase into the next frame.
        self.fm_cycles_start = time - cycles;
        self.fm_cycles_count = self.fm_cycles_start;

        self.blips[0].end_frame(cycles);
        self.blips[1].end_frame(cycles);
        self.psg.rebase(cycles);

        let avail = self.blips[0].samples_avail();
        log(LogCategory::Sound, LogLevel::Trace, || {
            format!("frame flushed, {} samples, carry {}", avail, self.fm_cycles_start)
        });
        avail
    }

    /// Drain available samples as interleaved stereo pairs.
    pub fn read_samples(&mut self, out: &mut [i16]) -> usize {
        let count = self
            .blips[0]
            .samples_avail()
            .min(self.blips[1].samples_avail())
            .min(out.len() / 2);
        if count == 0 {
            return 0;
        }
        self.blips[0].read_samples(out, count, true);
        self.blips[1].read_samples(&mut out[1..], count, true);
        count
    }

    pub fn samples_avail(&self) -> usize {
        self.blips[0].samples_avail()
    }

    /// Serialize the sound context: FM core, PSG core, then the tick-phase
    /// carry.
    pub fn save_context(&self, out: &mut Vec<u8>) {
        let mut block = Vec::new();
        self.fm.save_context(&mut block);
        out.extend_from_slice(&(block.len() as u32).to_le_bytes());
        out.extend_from_slice(&block);

        block.clear();
        self.psg.save_context(&mut block);
        out.extend_from_slice(&(block.len() as u32).to_le_bytes());
        out.extend_from_slice(&block);

        out.extend_from_slice(&self.fm_cycles_start.to_le_bytes());
    }

    /// Restore a context written by `save_context`, in field order.
    pub(crate) fn load_context(&mut self, r: &mut Reader<'_>) -> Result<(), StateError> {
        let len = r.get_u32()? as usize;
        self.fm.load_context(r.get_bytes(len)?)?;

        let len = r.get_u32()? as usize;
        self.psg.load_context(r.get_bytes(len)?)?;

        self.fm_cycles_start = r.get_u32()?;
        self.fm_cycles_count = self.fm_cycles_start;
        self.fm_pos = 0;
        Ok(())
    }
}
