//! Scripted collaborator doubles shared by the integration tests.
//!
//! The CPU doubles advance their registers as a pure function of the run
//! intervals the scheduler hands them, so two systems driven identically
//! stay bit-identical, and everything they accumulate round-trips through
//! the savestate register files and context blocks.

#![allow(dead_code)]

use emu_core::apu::{Blip, FmSynth, PsgSynth};
use emu_core::cpu::{MainBus, MainCpu, MainRegisters, SubBus, SubCpu, SubRegisters};
use emu_core::StateError;
use emu_md::vdp::{BgMode, ObjMode, RenderBackend};
use emu_md::{Collaborators, ConsoleKind, MdConfig, MdSystem};

pub struct ScriptedMainCpu {
    regs: MainRegisters,
    irq: u8,
}

impl MainCpu for ScriptedMainCpu {
    fn reset(&mut self) {
        self.regs = MainRegisters::default();
        self.irq = 0;
    }

    fn run(&mut self, _bus: &mut dyn MainBus, cycles: u32, deadline: u32) -> u32 {
        self.regs.d[0] = self.regs.d[0].wrapping_add(deadline - cycles);
        self.regs.d[1] = self.regs.d[1].wrapping_add(1);
        self.regs.pc = deadline;
        deadline
    }

    fn interrupt_line(&self) -> u8 {
        self.irq
    }

    fn set_interrupt_line(&mut self, mask: u8) {
        self.irq = mask;
        self.regs.d[2] = self.regs.d[2].wrapping_add(1);
    }

    fn registers(&self) -> MainRegisters {
        self.regs
    }

    fn set_registers(&mut self, regs: &MainRegisters) {
        self.regs = *regs;
    }
}

pub struct ScriptedSubCpu {
    regs: SubRegisters,
}

impl SubCpu for ScriptedSubCpu {
    fn reset(&mut self) {
        self.regs = SubRegisters::default();
    }

    fn run(&mut self, _bus: &mut dyn SubBus, cycles: u32, deadline: u32) -> u32 {
        self.regs.hl = self.regs.hl.wrapping_add((deadline - cycles) as u16);
        self.regs.pc = deadline as u16;
        deadline
    }

    fn set_int_line(&mut self, asserted: bool) {
        if asserted && !self.regs.int_line {
            self.regs.de = self.regs.de.wrapping_add(1);
        }
        self.regs.int_line = asserted;
    }

    fn nmi(&mut self) {
        self.regs.bc = self.regs.bc.wrapping_add(1);
    }

    fn registers(&self) -> SubRegisters {
        self.regs
    }

    fn set_registers(&mut self, regs: &SubRegisters) {
        self.regs = *regs;
    }
}

/// Backend with a small amount of video memory so savestates carry it.
pub struct MemBackend {
    vram: [u8; 64],
    rendered: u32,
}

impl RenderBackend for MemBackend {
    fn render_line(&mut self, line: u16, _bg: BgMode, _obj: ObjMode) {
        self.vram[(line & 63) as usize] = self.vram[(line & 63) as usize].wrapping_add(1);
        self.rendered += 1;
    }

    fn blank_line(&mut self, _line: u16, _x: i32, _width: i32) {}

    fn copy_frame(&self, out: &mut emu_core::types::Frame) {
        if let Some(first) = out.pixels.first_mut() {
            *first = self.rendered;
        }
    }

    fn save_context(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.vram);
        out.extend_from_slice(&self.rendered.to_le_bytes());
    }

    fn load_context(&mut self, data: &[u8]) -> Result<(), StateError> {
        if data.len() != 68 {
            return Err(StateError::BadContext);
        }
        self.vram.copy_from_slice(&data[..64]);
        self.rendered = u32::from_le_bytes(data[64..].try_into().unwrap());
        Ok(())
    }
}

/// Backend with no memory of its own; renders are pure sinks.
pub struct NullBackend;

impl RenderBackend for NullBackend {
    fn render_line(&mut self, _line: u16, _bg: BgMode, _obj: ObjMode) {}
    fn blank_line(&mut self, _line: u16, _x: i32, _width: i32) {}
}

/// FM double: output level is a pure function of the tick counter.
pub struct PhaseFm {
    ticks: u32,
}

impl FmSynth for PhaseFm {
    fn reset(&mut self) {
        self.ticks = 0;
    }

    fn run(&mut self, out: &mut [i32]) {
        for pair in out.chunks_mut(2) {
            let level = ((self.ticks / 7) % 16) as i32 * 100 - 800;
            pair[0] = level;
            pair[1] = -level;
            self.ticks += 1;
        }
    }

    fn save_context(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.ticks.to_le_bytes());
    }

    fn load_context(&mut self, data: &[u8]) -> Result<(), StateError> {
        let bytes: [u8; 4] = data.try_into().map_err(|_| StateError::BadContext)?;
        self.ticks = u32::from_le_bytes(bytes);
        Ok(())
    }
}

/// PSG double emitting a fixed-period square onto the shared timeline.
pub struct StepPsg {
    next_edge: u32,
    level_high: bool,
}

impl PsgSynth for StepPsg {
    fn reset(&mut self) {
        self.next_edge = 0;
        self.level_high = false;
    }

    fn run_to(&mut self, cycle: u32, blips: &mut [Blip; 2]) {
        while self.next_edge < cycle {
            let delta = if self.level_high { -300 } else { 300 };
            blips[0].add_delta(self.next_edge, delta);
            blips[1].add_delta(self.next_edge, delta);
            self.level_high = !self.level_high;
            self.next_edge += 997;
        }
    }

    fn rebase(&mut self, frame_cycles: u32) {
        self.next_edge = self.next_edge.saturating_sub(frame_cycles);
    }

    fn save_context(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.next_edge.to_le_bytes());
        out.push(u8::from(self.level_high));
    }

    fn load_context(&mut self, data: &[u8]) -> Result<(), StateError> {
        if data.len() != 5 {
            return Err(StateError::BadContext);
        }
        self.next_edge = u32::from_le_bytes(data[..4].try_into().unwrap());
        self.level_high = data[4] != 0;
        Ok(())
    }
}

fn collaborators(kind: ConsoleKind, backend: Box<dyn RenderBackend>) -> Collaborators {
    let main_cpu: Option<Box<dyn MainCpu>> = match kind {
        ConsoleKind::Dual => Some(Box::new(ScriptedMainCpu {
            regs: MainRegisters::default(),
            irq: 0,
        })),
        ConsoleKind::Compact => None,
    };
    Collaborators {
        main_cpu,
        sub_cpu: Box::new(ScriptedSubCpu {
            regs: SubRegisters::default(),
        }),
        coprocessor: None,
        backend,
        fm: Box::new(PhaseFm { ticks: 0 }),
        psg: Box::new(StepPsg {
            next_edge: 0,
            level_high: false,
        }),
    }
}

/// A ready-to-run console with a deterministic test ROM loaded.
pub fn build(kind: ConsoleKind, config: MdConfig) -> MdSystem {
    let mut sys = MdSystem::new(kind, config, collaborators(kind, Box::new(MemBackend {
        vram: [0; 64],
        rendered: 0,
    })))
    .unwrap();
    sys.load_cartridge(test_rom()).unwrap();
    sys
}

/// Like [`build`] but with a backend that owns no savestate context.
pub fn build_stateless_video(kind: ConsoleKind, config: MdConfig) -> MdSystem {
    let mut sys = MdSystem::new(kind, config, collaborators(kind, Box::new(NullBackend))).unwrap();
    sys.load_cartridge(test_rom()).unwrap();
    sys
}

pub fn test_rom() -> Vec<u8> {
    let mut rom = vec![0u8; 0x2_0000];
    for (i, byte) in rom.iter_mut().enumerate() {
        *byte = (i / 0x4000) as u8;
    }
    rom
}
