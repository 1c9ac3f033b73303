//! Timing configuration for different console regions.

/// Console region timing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimingMode {
    /// NTSC (North America, Japan) - 53.693175 MHz master clock
    #[default]
    Ntsc,
    /// PAL (Europe, Australia) - 53.203424 MHz master clock
    Pal,
}

impl TimingMode {
    /// Get the master clock frequency in Hz for this timing mode
    pub fn master_clock_hz(&self) -> f64 {
        match self {
            TimingMode::Ntsc => 53_693_175.0,
            TimingMode::Pal => 53_203_424.0,
        }
    }

    /// Get the total scanline count per video frame
    pub fn lines_per_frame(&self) -> u16 {
        match self {
            TimingMode::Ntsc => 262,
            TimingMode::Pal => 313,
        }
    }

    /// Get the frame rate in Hz for this timing mode
    pub fn frame_rate_hz(&self) -> f64 {
        match self {
            TimingMode::Ntsc => 59.9228,
            TimingMode::Pal => 49.7015,
        }
    }

    pub fn is_pal(&self) -> bool {
        matches!(self, TimingMode::Pal)
    }
}
