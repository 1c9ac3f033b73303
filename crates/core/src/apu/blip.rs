//! Band-limited delta sample buffer.
//!
//! Chip emulation runs on the console master-cycle timeline and produces
//! amplitude *changes* at exact cycle timestamps. This buffer resamples
//! those deltas to the host sample rate by splatting a windowed-sinc step
//! kernel at 1/32-sample resolution, then integrating on read. The rate
//! conversion is integer-exact over any number of frames: the fractional
//! sample position is carried in `offset`, never dropped.

const TIME_BITS: u32 = 52;
const TIME_UNIT: u64 = 1 << TIME_BITS;

/// Kernel oversampling (sub-sample phases per output sample).
const PHASE_BITS: u32 = 5;
const PHASES: usize = 1 << PHASE_BITS;
const PHASE_SHIFT: u32 = TIME_BITS - PHASE_BITS;

/// Fixed-point unit for delta amplitudes and phase interpolation.
const DELTA_BITS: u32 = 15;
const DELTA_UNIT: i32 = 1 << DELTA_BITS;
const INTERP_SHIFT: u32 = PHASE_SHIFT - DELTA_BITS;

/// Gentle high-pass applied while integrating (DC drains over ~2^9 samples).
const BASS_SHIFT: u32 = 9;

/// Step kernel width in output samples.
const WIDTH: usize = 16;

fn kernel() -> &'static [[i32; WIDTH]; PHASES + 1] {
    use std::sync::OnceLock;
    static KERNEL: OnceLock<[[i32; WIDTH]; PHASES + 1]> = OnceLock::new();
    KERNEL.get_or_init(build_kernel)
}

/// Windowed-sinc impulse rows, one per sub-sample phase. Each row sums to
/// exactly `DELTA_UNIT` so a delta splat integrates back to the delta.
fn build_kernel() -> [[i32; WIDTH]; PHASES + 1] {
    use std::f64::consts::PI;

    // Cut slightly below Nyquist to keep the transition band out of the
    // audible ringing range.
    const CUTOFF: f64 = 0.85;
    let half = (WIDTH / 2) as f64;

    let mut table = [[0i32; WIDTH]; PHASES + 1];
    for (p, row) in table.iter_mut().enumerate() {
        let center = (WIDTH / 2 - 1) as f64 + p as f64 / PHASES as f64;
        let mut taps = [0f64; WIDTH];
        let mut total = 0f64;
        for (i, tap) in taps.iter_mut().enumerate() {
            let x = i as f64 - center;
            let sinc = if x.abs() < 1e-9 {
                CUTOFF
            } else {
                (CUTOFF * PI * x).sin() / (PI * x)
            };
            // Blackman window, zero at |x| = WIDTH/2
            let w = if x.abs() >= half {
                0.0
            } else {
                0.42 + 0.5 * (PI * x / half).cos() + 0.08 * (2.0 * PI * x / half).cos()
            };
            *tap = sinc * w;
            total += *tap;
        }

        let mut row_sum = 0i32;
        for (i, tap) in taps.iter().enumerate() {
            row[i] = (tap / total * DELTA_UNIT as f64).round() as i32;
            row_sum += row[i];
        }
        // Put the rounding residual on the center tap so rows stay exact.
        row[WIDTH / 2] += DELTA_UNIT - row_sum;
    }
    table
}

/// Band-limited delta buffer for one audio channel.
pub struct Blip {
    factor: u64,
    offset: u64,
    avail: usize,
    size: usize,
    integrator: i32,
    buf: Vec<i32>,
}

impl Blip {
    /// Create a buffer able to hold `size` output samples between reads.
    pub fn new(size: usize) -> Self {
        let mut blip = Self {
            factor: TIME_UNIT, // identity until set_rates
            offset: 0,
            avail: 0,
            size,
            integrator: 0,
            buf: vec![0; size + WIDTH + 2],
        };
        blip.offset = blip.factor / 2;
        blip
    }

    /// Set the input clock rate and output sample rate.
    pub fn set_rates(&mut self, clock_rate: f64, sample_rate: f64) {
        let factor = TIME_UNIT as f64 * sample_rate / clock_rate;
        self.factor = factor.ceil() as u64;
    }

    /// Discard all buffered samples and pending deltas.
    pub fn clear(&mut self) {
        self.offset = self.factor / 2;
        self.avail = 0;
        self.integrator = 0;
        self.buf.fill(0);
    }

    /// Add an amplitude change at the given clock time within the current
    /// frame. Times may arrive out of order within a frame.
    pub fn add_delta(&mut self, time: u32, delta: i32) {
        if delta == 0 {
            return;
        }

        let fixed = time as u64 * self.factor + self.offset;
        let pos = self.avail + (fixed >> TIME_BITS) as usize;
        debug_assert!(pos + WIDTH <= self.buf.len(), "delta past buffer end");
        if pos + WIDTH > self.buf.len() {
            return;
        }

        let phase = ((fixed >> PHASE_SHIFT) & (PHASES as u64 - 1)) as usize;
        let interp = ((fixed >> INTERP_SHIFT) & (DELTA_UNIT as u64 - 1)) as i32;
        let delta2 = ((delta as i64 * interp as i64) >> DELTA_BITS) as i32;
        let delta1 = delta - delta2;

        let kernel = kernel();
        let (row, next) = (&kernel[phase], &kernel[phase + 1]);
        for (i, out) in self.buf[pos..pos + WIDTH].iter_mut().enumerate() {
            *out += row[i] * delta1 + next[i] * delta2;
        }
    }

    /// Finish a frame of `clock_duration` input clocks, making the covered
    /// samples available for reading. The sub-sample remainder is carried
    /// into the next frame.
    pub fn end_frame(&mut self, clock_duration: u32) {
        let off = clock_duration as u64 * self.factor + self.offset;
        self.avail += (off >> TIME_BITS) as usize;
        self.offset = off & (TIME_UNIT - 1);
        debug_assert!(self.avail <= self.size, "frame overflowed sample buffer");
    }

    /// Number of samples ready to read.
    pub fn samples_avail(&self) -> usize {
        self.avail
    }

    /// Read up to `count` samples into `out`, advancing by 2 per sample when
    /// `stereo` is set (interleaved channel fill). Returns samples read.
    pub fn read_samples(&mut self, out: &mut [i16], count: usize, stereo: bool) -> usize {
        let count = count.min(self.avail);
        if count == 0 {
            return 0;
        }

        let step = if stereo { 2 } else { 1 };
        let mut sum = self.integrator;
        let mut slot = 0usize;
        for value in &self.buf[..count] {
            let mut s = sum >> DELTA_BITS;
            sum += value;
            if s > i16::MAX as i32 {
                s = i16::MAX as i32;
            } else if s < i16::MIN as i32 {
                s = i16::MIN as i32;
            }
            out[slot] = s as i16;
            slot += step;
            // High-pass: bleed a fraction of the output back out of the sum.
            sum -= s << (DELTA_BITS - BASS_SHIFT);
        }
        self.integrator = sum;

        self.remove_samples(count);
        count
    }

    fn remove_samples(&mut self, count: usize) {
        self.buf.copy_within(count.., 0);
        let tail = self.buf.len() - count;
        self.buf[tail..].fill(0);
        self.avail -= count;
    }
}
