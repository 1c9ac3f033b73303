//! Console session context and the public system surface.
//!
//! Every per-console register and counter lives on [`MdSystem`]; there is
//! no process-wide state. The caller supplies the execution collaborators
//! (CPU cores, pixel backend, sound chips) at construction time and the
//! scheduler drives them in lockstep.

use crate::bus::{SUB_BUS_RESET, SUB_BUS_RUNNING};
use crate::cart::{CartSlot, CartridgeError};
use crate::db::Region;
use crate::scheduler::FrameClock;
use crate::sound::{SoundSync, FM_RATIO_COMPACT, FM_RATIO_DUAL};
use crate::state;
use crate::vdp::{RenderBackend, Vdp, VIEWPORT_DIMS_CHANGED};
use emu_core::apu::{FmSynth, PsgSynth, TimingMode};
use emu_core::cpu::{Coprocessor, MainCpu, SubCpu};
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::types::{ControllerState, Frame};
use emu_core::{StateError, System};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Console variant, fixed at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleKind {
    /// Dual-CPU console (68000-class main CPU + Z80-class sub CPU).
    Dual,
    /// Compact console (Z80-class CPU only, same video/audio hardware).
    Compact,
}

/// Host-side configuration, resolved once per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MdConfig {
    pub sample_rate: u32,
    /// FM pre-amplification percentage applied before delta accumulation.
    pub fm_preamp: u32,
    /// PSG pre-amplification percentage, forwarded to the PSG core.
    pub psg_preamp: u32,
    /// Bit 0 renders vertical borders, bit 1 horizontal borders.
    pub overscan: u8,
    /// Overrides cartridge region auto-detection.
    pub force_region: Option<Region>,
    /// FM sound unit fitted (compact console add-on).
    pub fm_unit: bool,
}

impl Default for MdConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            fm_preamp: 100,
            psg_preamp: 150,
            overscan: 0,
            force_region: None,
            fm_unit: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum MdError {
    #[error("no cartridge loaded")]
    NoCartridge,
    #[error("dual-CPU console needs a main CPU collaborator")]
    MissingMainCpu,
    #[error(transparent)]
    Cartridge(#[from] CartridgeError),
}

/// Execution engines supplied by the caller.
pub struct Collaborators {
    pub main_cpu: Option<Box<dyn MainCpu>>,
    pub sub_cpu: Box<dyn SubCpu>,
    pub coprocessor: Option<Box<dyn Coprocessor>>,
    pub backend: Box<dyn RenderBackend>,
    pub fm: Box<dyn FmSynth>,
    pub psg: Box<dyn PsgSynth>,
}

/// One emulated console.
pub struct MdSystem {
    pub(crate) kind: ConsoleKind,
    pub(crate) config: MdConfig,
    pub(crate) region: Region,
    pub(crate) timing: TimingMode,

    pub(crate) main_cpu: Option<Box<dyn MainCpu>>,
    pub(crate) sub_cpu: Box<dyn SubCpu>,
    pub(crate) coprocessor: Option<Box<dyn Coprocessor>>,
    pub(crate) backend: Box<dyn RenderBackend>,

    pub(crate) vdp: Vdp,
    pub(crate) cart: CartSlot,
    pub(crate) sound: SoundSync,
    pub(crate) clock: FrameClock,

    pub(crate) work_ram: Box<[u8; 0x1_0000]>,
    pub(crate) sub_ram: Box<[u8; 0x2000]>,
    pub(crate) io_reg: [u8; 0x10],
    /// Sub-CPU bus routing (reset / running / granted).
    pub(crate) sub_bus_state: u8,
    /// Sub-CPU view bank into the main bus.
    pub(crate) sub_bank: u32,

    pub(crate) pads: [u16; 4],
    pub(crate) pause_held: bool,

    has_cartridge: bool,
}

impl MdSystem {
    pub fn new(
        kind: ConsoleKind,
        config: MdConfig,
        collab: Collaborators,
    ) -> Result<Self, MdError> {
        if kind == ConsoleKind::Dual && collab.main_cpu.is_none() {
            return Err(MdError::MissingMainCpu);
        }

        let region = config.force_region.unwrap_or_default();
        let timing = if region.is_pal() {
            TimingMode::Pal
        } else {
            TimingMode::Ntsc
        };

        let fm_ratio = match kind {
            ConsoleKind::Dual => FM_RATIO_DUAL,
            ConsoleKind::Compact => FM_RATIO_COMPACT,
        };
        let mut sound = SoundSync::new(
            collab.fm,
            collab.psg,
            fm_ratio,
            config.fm_preamp,
            config.sample_rate,
        );
        sound.set_rates(timing, config.sample_rate);

        let mut system = Self {
            kind,
            region,
            timing,
            main_cpu: collab.main_cpu,
            sub_cpu: collab.sub_cpu,
            coprocessor: collab.coprocessor,
            backend: collab.backend,
            vdp: Vdp::new(timing.is_pal()),
            cart: CartSlot::empty(),
            sound,
            clock: FrameClock::default(),
            work_ram: Box::new([0; 0x1_0000]),
            sub_ram: Box::new([0; 0x2000]),
            io_reg: [0; 0x10],
            sub_bus_state: SUB_BUS_RESET,
            sub_bank: 0,
            pads: [0; 4],
            pause_held: false,
            has_cartridge: false,
            config,
        };
        system.reset_console();
        Ok(system)
    }

    pub fn kind(&self) -> ConsoleKind {
        self.kind
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn timing(&self) -> TimingMode {
        self.timing
    }

    pub fn cartridge(&self) -> &CartSlot {
        &self.cart
    }

    /// Video generator context (register access for hosts and tools).
    pub fn video(&self) -> &Vdp {
        &self.vdp
    }

    pub fn video_mut(&mut self) -> &mut Vdp {
        &mut self.vdp
    }

    /// Primary work RAM; hosts use this for cheat patching.
    pub fn work_ram(&self) -> &[u8] {
        &self.work_ram[..]
    }

    pub fn work_ram_mut(&mut self) -> &mut [u8] {
        &mut self.work_ram[..]
    }

    /// Master-cycle counters as of the last scheduler checkpoint.
    pub fn clock(&self) -> FrameClock {
        self.clock
    }

    /// Load a cartridge: resolve its profile, re-derive region timing and
    /// reset the console.
    pub fn load_cartridge(&mut self, rom: Vec<u8>) -> Result<(), MdError> {
        let cart = CartSlot::load(rom)?;

        self.region = match self.config.force_region {
            Some(region) => region,
            None => match self.kind {
                // Dual-console titles carry their region in the ROM header,
                // resolved by the host; the table covers compact titles.
                ConsoleKind::Dual => Region::default(),
                ConsoleKind::Compact => cart.detect_region(self.config.fm_unit),
            },
        };
        self.timing = if self.region.is_pal() {
            TimingMode::Pal
        } else {
            TimingMode::Ntsc
        };

        self.cart = cart;
        self.has_cartridge = true;
        self.vdp.set_pal(self.timing.is_pal());
        self.sound.set_rates(self.timing, self.config.sample_rate);
        log(LogCategory::Scheduler, LogLevel::Info, || {
            format!("cartridge loaded, region {:?}", self.region)
        });

        self.reset_console();
        Ok(())
    }

    /// Full console reset (power-on semantics).
    pub(crate) fn reset_console(&mut self) {
        if let Some(cpu) = self.main_cpu.as_mut() {
            cpu.reset();
        }
        self.sub_cpu.reset();
        if let Some(coproc) = self.coprocessor.as_mut() {
            coproc.reset();
        }

        self.vdp.reset();
        self.cart.reset();
        self.sound.reset();
        self.clock = FrameClock::default();

        self.work_ram.fill(0);
        self.sub_ram.fill(0);
        self.io_reg = [0; 0x10];
        self.io_reg[0] = self.region.code() | 0x20;
        self.sub_bus_state = match self.kind {
            ConsoleKind::Dual => SUB_BUS_RESET,
            ConsoleKind::Compact => SUB_BUS_RUNNING,
        };
        self.sub_bank = 0;
        self.pause_held = false;
    }

    /// True once, when the active display dimensions changed since the
    /// presentation layer last asked.
    pub fn take_viewport_changed(&mut self) -> bool {
        let changed = self.vdp.viewport.changed & VIEWPORT_DIMS_CHANGED != 0;
        self.vdp.viewport.changed &= !VIEWPORT_DIMS_CHANGED;
        changed
    }

    /// Battery-backed RAM contents, for host persistence.
    pub fn backup_ram(&self) -> &[u8] {
        self.cart.backup_ram()
    }

    pub fn restore_backup_ram(&mut self, data: &[u8]) {
        self.cart.restore_backup_ram(data);
    }

    /// True when backup RAM changed since the last call.
    pub fn take_backup_dirty(&mut self) -> bool {
        self.cart.take_backup_dirty()
    }

    fn output_dimensions(&self) -> (u32, u32) {
        let vp = self.vdp.viewport;
        (
            u32::from(vp.w) + 2 * u32::from(vp.x),
            u32::from(vp.h) + 2 * u32::from(vp.y),
        )
    }
}

impl System for MdSystem {
    type Error = MdError;

    fn reset(&mut self) {
        self.reset_console();
    }

    fn run_frame(
        &mut self,
        video: Option<&mut Frame>,
        input: &ControllerState,
        audio: &mut Vec<i16>,
    ) -> Result<usize, Self::Error> {
        if !self.has_cartridge {
            return Err(MdError::NoCartridge);
        }

        // Resample controller input once per frame
        self.pads = input.pad;

        let skip = video.is_none();
        let total_cycles = match self.kind {
            ConsoleKind::Dual => self.frame_dual(skip),
            ConsoleKind::Compact => self.frame_compact(skip),
        };

        let samples = self.sound.end_frame(total_cycles);
        let start = audio.len();
        audio.resize(start + samples * 2, 0);
        self.sound.read_samples(&mut audio[start..]);

        if let Some(frame) = video {
            let (w, h) = self.output_dimensions();
            frame.resize(w, h);
            self.backend.copy_frame(frame);
        }

        Ok(samples)
    }

    fn save_state(&self) -> Vec<u8> {
        state::save_state(self)
    }

    fn load_state(&mut self, data: &[u8]) -> Result<(), StateError> {
        state::load_state(self, data)
    }

    fn debug_state(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": match self.kind {
                ConsoleKind::Dual => "dual",
                ConsoleKind::Compact => "compact",
            },
            "region": format!("{:?}", self.region),
            "clock": {
                "vdp": self.clock.vdp,
                "main": self.clock.main,
                "sub": self.clock.sub,
            },
            "video": {
                "v_counter": self.vdp.v_counter,
                "status": self.vdp.status,
                "viewport": [self.vdp.viewport.w, self.vdp.viewport.h],
                "hint_pending": self.vdp.hint_pending,
                "vint_pending": self.vdp.vint_pending,
            },
            "mapper": {
                "kind": format!("{:?}", self.cart.kind()),
                "fcr": self.cart.frame_control_regs(),
            },
            "sub_bus_state": self.sub_bus_state,
        })
    }
}
