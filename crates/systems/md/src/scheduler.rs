//! Per-frame hardware scheduler.
//!
//! One call runs exactly one video frame: the pre-render line, the active
//! display loop, the vertical-interrupt transition and the blanking lines,
//! advancing every collaborator to each line boundary in lockstep. The two
//! console variants share the video/audio hardware but differ in processor
//! wiring and interrupt delivery.
//!
//! All per-chip cycle counters are re-based at frame end (frame total
//! subtracted) so relative phase is carried forward without the counters
//! ever growing.

use crate::bus::{CompactBus, DualMainBus, DualSubBus, SUB_BUS_RUNNING};
use crate::system::MdSystem;
use crate::vdp::{MCYCLES_PER_LINE, STATUS_FIFO_EMPTY, STATUS_VBLANK, STATUS_VINT};
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::types::buttons;

/// Main-CPU interrupt line encodings (pending flag | level).
pub const IRQ_LEVEL_4: u8 = 0x14;
pub const IRQ_LEVEL_6: u8 = 0x16;

/// Master cycles from the end of active display to the VINT status flag.
pub const VINT_FLAG_DELAY: u32 = 588;
/// Master cycles from the end of active display to the vertical interrupt.
/// Load-bearing: titles depend on this exact offset.
pub const VINT_DELAY: u32 = 788;

/// Fixed coprocessor budget per scanline.
pub const COPROCESSOR_LINE_BUDGET: u32 = 800;

/// Per-frame master-cycle counters, owned by the session context.
///
/// `vdp` restarts at zero each frame; `main` and `sub` carry their phase
/// across frames (the frame total is subtracted at teardown).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameClock {
    pub vdp: u32,
    pub main: u32,
    pub sub: u32,
}

impl MdSystem {
    fn run_main(&mut self, deadline: u32) {
        let MdSystem {
            main_cpu,
            cart,
            work_ram,
            sub_ram,
            vdp,
            sound,
            io_reg,
            sub_bus_state,
            clock,
            ..
        } = self;
        if let Some(cpu) = main_cpu {
            let mut bus = DualMainBus {
                cart,
                work_ram: &mut work_ram[..],
                sub_ram: &mut sub_ram[..],
                vdp,
                sound,
                io_reg,
                sub_bus_state,
            };
            clock.main = cpu.run(&mut bus, clock.main, deadline);
        }
    }

    /// Run the sub CPU when it owns its bus, otherwise warp its counter to
    /// the deadline so phase stays consistent.
    fn run_sub_dual(&mut self, deadline: u32) {
        if self.sub_bus_state == SUB_BUS_RUNNING {
            let MdSystem {
                sub_cpu,
                cart,
                sub_ram,
                sound,
                sub_bank,
                clock,
                ..
            } = self;
            let mut bus = DualSubBus {
                sub_ram: &mut sub_ram[..],
                cart,
                sound,
                sub_bank,
            };
            clock.sub = sub_cpu.run(&mut bus, clock.sub, deadline);
        } else {
            self.clock.sub = deadline;
        }
    }

    fn run_sub_compact(&mut self, deadline: u32) {
        let MdSystem {
            sub_cpu,
            cart,
            work_ram,
            vdp,
            sound,
            io_reg,
            pads,
            config,
            clock,
            ..
        } = self;
        let mut bus = CompactBus {
            cart,
            ram: &mut work_ram[..0x2000],
            vdp,
            sound,
            io_reg,
            pads,
            fm_enabled: config.fm_unit,
        };
        clock.sub = sub_cpu.run(&mut bus, clock.sub, deadline);
    }

    fn run_coprocessor(&mut self) {
        if let Some(coproc) = self.coprocessor.as_mut() {
            coproc.run(COPROCESSOR_LINE_BUDGET);
        }
    }

    fn update_dma(&mut self, cycle: u32) {
        let MdSystem { vdp, backend, .. } = self;
        vdp.update_dma(cycle, backend.as_mut());
    }

    fn blank_line(&mut self, line: u16) {
        let vp = self.vdp.viewport;
        self.backend
            .blank_line(line, -i32::from(vp.x), i32::from(vp.w) + 2 * i32::from(vp.x));
    }

    fn render_line(&mut self, line: u16) {
        let bg = self.vdp.bg_mode();
        let obj = self.vdp.obj_mode();
        self.backend.render_line(line, bg, obj);
    }

    fn raise_main_irq(&mut self, mask: u8) {
        if let Some(cpu) = self.main_cpu.as_mut() {
            let line = cpu.interrupt_line();
            cpu.set_interrupt_line(line | mask);
        }
    }

    fn set_main_irq(&mut self, mask: u8) {
        if let Some(cpu) = self.main_cpu.as_mut() {
            cpu.set_interrupt_line(mask);
        }
    }

    /// Shared frame-top work: counters, FIFO, viewport and status flags.
    fn frame_setup(&mut self, lines_per_frame: u16) {
        self.clock.vdp = 0;
        self.vdp.v_counter = lines_per_frame - 1;
        self.vdp.frame_fifo_reset();

        self.vdp.refresh_viewport(self.config.overscan);

        // Clear vblank, DMA, FIFO-full and field flags; FIFO starts empty
        self.vdp.status &= 0xFEE5;
        self.vdp.status |= STATUS_FIFO_EMPTY;

        // Even/odd field flag matters to interlaced modes only
        self.vdp.odd_frame = !self.vdp.odd_frame;
        if self.vdp.interlaced {
            self.vdp.status |= u16::from(self.vdp.odd_frame) << 4;
        }

        if self.vdp.dma_pending() {
            self.update_dma(0);
        }

        // Render the last overscan line of the previous frame's bottom margin
        if self.vdp.viewport.y > 0 {
            self.blank_line(self.vdp.v_counter);
        }

        // Sprite attributes for the line before active display
        if self.vdp.display_enabled() {
            self.backend.parse_sprites(-1);
        }
    }

    /// Horizontal-interrupt countdown shared by both variants. Returns true
    /// on reload underflow with interrupts enabled.
    fn tick_h_counter(&mut self, h_counter: &mut i32) -> bool {
        *h_counter -= 1;
        if *h_counter < 0 {
            *h_counter = i32::from(self.vdp.regs[10]);
            self.vdp.hint_pending = true;
            return self.vdp.hint_enabled();
        }
        false
    }

    /// One frame of the dual-CPU console.
    pub(crate) fn frame_dual(&mut self, skip: bool) -> u32 {
        let lines_per_frame = self.timing.lines_per_frame();
        let mut line: u16 = 0;

        // Sub-CPU interrupt is asserted for exactly one line
        let mut sub_irq_armed = true;

        let mut h_counter = i32::from(self.vdp.regs[10]);

        self.frame_setup(lines_per_frame);

        // Pre-render line
        self.run_main(MCYCLES_PER_LINE);
        self.run_sub_dual(MCYCLES_PER_LINE);
        self.run_coprocessor();
        self.clock.vdp += MCYCLES_PER_LINE;

        // Active display
        loop {
            self.vdp.v_counter = line;

            if self.tick_h_counter(&mut h_counter) {
                self.raise_main_irq(IRQ_LEVEL_4);
            }

            if self.vdp.dma_pending() {
                self.update_dma(self.clock.vdp);
            }

            if !skip {
                self.render_line(line);
            }

            self.run_main(self.clock.vdp + MCYCLES_PER_LINE);
            self.run_sub_dual(self.clock.vdp + MCYCLES_PER_LINE);
            self.run_coprocessor();
            self.clock.vdp += MCYCLES_PER_LINE;

            line += 1;
            if line >= self.vdp.viewport.h {
                break;
            }
        }

        // End of active display
        self.vdp.v_counter = line;
        self.vdp.status |= STATUS_VBLANK;

        let overscan_start = lines_per_frame - self.vdp.viewport.y;
        let overscan_end = self.vdp.viewport.h + self.vdp.viewport.y;

        self.vdp.latch_reported_size();

        if self.tick_h_counter(&mut h_counter) {
            self.raise_main_irq(IRQ_LEVEL_4);
        }

        if self.vdp.dma_pending() {
            self.update_dma(self.clock.vdp);
        }

        if line < overscan_end {
            self.blank_line(line);
        }

        // VINT status flag leads the interrupt itself by a fixed offset
        self.run_main(self.clock.vdp + VINT_FLAG_DELAY);
        self.vdp.status |= STATUS_VINT;

        self.run_main(self.clock.vdp + VINT_DELAY);
        self.run_sub_dual(self.clock.vdp + VINT_DELAY);

        // Vertical interrupt
        self.vdp.vint_pending = true;
        if self.vdp.vint_enabled() {
            self.set_main_irq(IRQ_LEVEL_6);
        }
        self.sub_cpu.set_int_line(true);

        self.run_main(self.clock.vdp + MCYCLES_PER_LINE);
        self.run_sub_dual(self.clock.vdp + MCYCLES_PER_LINE);
        self.run_coprocessor();
        self.clock.vdp += MCYCLES_PER_LINE;
        line += 1;

        // Vertical blanking
        loop {
            self.vdp.v_counter = line;

            if line < overscan_end || line >= overscan_start {
                self.blank_line(line);
            }

            if sub_irq_armed {
                self.run_main(self.clock.vdp + VINT_DELAY);
                self.run_sub_dual(self.clock.vdp + VINT_DELAY);
                self.sub_cpu.set_int_line(false);
                sub_irq_armed = false;
            }

            self.run_main(self.clock.vdp + MCYCLES_PER_LINE);
            self.run_sub_dual(self.clock.vdp + MCYCLES_PER_LINE);
            self.run_coprocessor();
            self.clock.vdp += MCYCLES_PER_LINE;

            line += 1;
            if line >= lines_per_frame - 1 {
                break;
            }
        }

        self.frame_teardown()
    }

    /// One frame of the compact console.
    pub(crate) fn frame_compact(&mut self, mut skip: bool) -> u32 {
        let lines_per_frame = self.timing.lines_per_frame();
        let mut line: u16 = 0;

        let mut h_counter = i32::from(self.vdp.regs[10]);

        self.frame_setup(lines_per_frame);

        // Pause input delivers a non-maskable interrupt on its rising edge
        // only, not on every frame it stays held
        if self.pads[0] & buttons::START != 0 {
            if !self.pause_held {
                self.pause_held = true;
                self.sub_cpu.nmi();
            }
        } else {
            self.pause_held = false;
        }

        // 3-D glasses faking: skip rendering of the left-lens frame
        if self.cart.profile().glasses_3d {
            skip |= self.work_ram[0x1FFB] & 1 != 0;
        }

        // Horizontal scroll latches before the first line, vertical after
        self.vdp.hscroll_latch = self.vdp.regs[8];

        self.run_sub_compact(MCYCLES_PER_LINE);
        self.clock.vdp += MCYCLES_PER_LINE;

        self.vdp.vscroll_latch = self.vdp.regs[9];

        // Active display
        loop {
            self.vdp.v_counter = line;

            if self.tick_h_counter(&mut h_counter) {
                // The interrupt line is sampled between instructions; a CPU
                // sitting exactly on the line boundary must execute one more
                // instruction before seeing it
                if self.clock.sub % MCYCLES_PER_LINE == 0 {
                    self.run_sub_compact(self.clock.sub + 1);
                }
                self.sub_cpu.set_int_line(true);
            }

            if self.vdp.dma_pending() {
                self.update_dma(self.clock.vdp);
            }

            if !skip {
                self.render_line(line);
            }

            self.run_sub_compact(self.clock.vdp + MCYCLES_PER_LINE);
            self.clock.vdp += MCYCLES_PER_LINE;

            line += 1;
            if line >= self.vdp.viewport.h {
                break;
            }
        }

        // End of active display
        self.vdp.v_counter = line;
        self.vdp.status |= STATUS_VBLANK;

        let overscan_start = lines_per_frame - self.vdp.viewport.y;
        let overscan_end = self.vdp.viewport.h + self.vdp.viewport.y;

        self.vdp.latch_reported_size();

        if self.tick_h_counter(&mut h_counter) {
            self.sub_cpu.set_int_line(true);
        }

        if self.vdp.dma_pending() {
            self.update_dma(self.clock.vdp);
        }

        if line < overscan_end {
            self.blank_line(line);
        }

        // Run the line out before delivering the vertical interrupt
        self.run_sub_compact(self.clock.vdp + MCYCLES_PER_LINE);

        self.vdp.status |= STATUS_VINT;
        self.vdp.vint_pending = true;
        if self.vdp.vint_enabled() {
            self.sub_cpu.set_int_line(true);
        }

        self.clock.vdp += MCYCLES_PER_LINE;
        line += 1;

        // Vertical blanking
        loop {
            self.vdp.v_counter = line;

            if line < overscan_end || line >= overscan_start {
                self.blank_line(line);
            }

            self.run_sub_compact(self.clock.vdp + MCYCLES_PER_LINE);
            self.clock.vdp += MCYCLES_PER_LINE;

            line += 1;
            if line >= lines_per_frame - 1 {
                break;
            }
        }

        self.frame_teardown()
    }

    /// Subtract the frame total from every carried counter and report it.
    fn frame_teardown(&mut self) -> u32 {
        let total = self.clock.vdp;
        self.clock.main = self.clock.main.saturating_sub(total);
        self.clock.sub = self.clock.sub.saturating_sub(total);
        log(LogCategory::Scheduler, LogLevel::Trace, || {
            format!(
                "frame complete, {} cycles, carry main {} sub {}",
                total, self.clock.main, self.clock.sub
            )
        });
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::CartridgeProfile;
    use crate::system::{Collaborators, ConsoleKind, MdConfig, MdSystem};
    use crate::vdp::{BgMode, ObjMode, RenderBackend};
    use emu_core::apu::{Blip, FmSynth, PsgSynth};
    use emu_core::cpu::{MainBus, MainCpu, MainRegisters, SubBus, SubCpu, SubRegisters};
    use emu_core::types::ControllerState;
    use emu_core::{StateError, System};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Trace {
        rendered: Vec<u16>,
        blanked: u32,
        nmi: u32,
        /// Sub-CPU interrupt line transitions with the CPU's cycle position.
        sub_int_edges: Vec<(bool, u32)>,
        /// Main-CPU interrupt line writes with the CPU's cycle position.
        main_irqs: Vec<(u8, u32)>,
    }

    struct CountBackend {
        trace: Rc<RefCell<Trace>>,
    }

    impl RenderBackend for CountBackend {
        fn render_line(&mut self, line: u16, _bg: BgMode, _obj: ObjMode) {
            self.trace.borrow_mut().rendered.push(line);
        }
        fn blank_line(&mut self, _line: u16, _x: i32, _width: i32) {
            self.trace.borrow_mut().blanked += 1;
        }
    }

    struct TraceMainCpu {
        trace: Rc<RefCell<Trace>>,
        pos: u32,
        irq: u8,
        regs: MainRegisters,
    }

    impl MainCpu for TraceMainCpu {
        fn reset(&mut self) {
            self.pos = 0;
            self.irq = 0;
            self.regs = MainRegisters::default();
        }
        fn run(&mut self, _bus: &mut dyn MainBus, _cycles: u32, deadline: u32) -> u32 {
            self.pos = deadline;
            deadline
        }
        fn interrupt_line(&self) -> u8 {
            self.irq
        }
        fn set_interrupt_line(&mut self, mask: u8) {
            self.irq = mask;
            self.trace.borrow_mut().main_irqs.push((mask, self.pos));
        }
        fn registers(&self) -> MainRegisters {
            self.regs
        }
        fn set_registers(&mut self, regs: &MainRegisters) {
            self.regs = *regs;
        }
    }

    struct TraceSubCpu {
        trace: Rc<RefCell<Trace>>,
        pos: u32,
        regs: SubRegisters,
    }

    impl SubCpu for TraceSubCpu {
        fn reset(&mut self) {
            self.pos = 0;
            self.regs = SubRegisters::default();
        }
        fn run(&mut self, _bus: &mut dyn SubBus, _cycles: u32, deadline: u32) -> u32 {
            self.pos = deadline;
            deadline
        }
        fn set_int_line(&mut self, asserted: bool) {
            if asserted != self.regs.int_line {
                self.trace.borrow_mut().sub_int_edges.push((asserted, self.pos));
            }
            self.regs.int_line = asserted;
        }
        fn nmi(&mut self) {
            self.trace.borrow_mut().nmi += 1;
        }
        fn registers(&self) -> SubRegisters {
            self.regs
        }
        fn set_registers(&mut self, regs: &SubRegisters) {
            self.regs = *regs;
        }
    }

    struct NullFm;
    impl FmSynth for NullFm {
        fn reset(&mut self) {}
        fn run(&mut self, out: &mut [i32]) {
            out.fill(0);
        }
        fn save_context(&self, _out: &mut Vec<u8>) {}
        fn load_context(&mut self, _data: &[u8]) -> Result<(), StateError> {
            Ok(())
        }
    }

    struct NullPsg;
    impl PsgSynth for NullPsg {
        fn reset(&mut self) {}
        fn run_to(&mut self, _cycle: u32, _blips: &mut [Blip; 2]) {}
        fn rebase(&mut self, _frame_cycles: u32) {}
        fn save_context(&self, _out: &mut Vec<u8>) {}
        fn load_context(&mut self, _data: &[u8]) -> Result<(), StateError> {
            Ok(())
        }
    }

    fn make_system(kind: ConsoleKind) -> (MdSystem, Rc<RefCell<Trace>>) {
        let trace = Rc::new(RefCell::new(Trace::default()));
        let main_cpu: Option<Box<dyn MainCpu>> = match kind {
            ConsoleKind::Dual => Some(Box::new(TraceMainCpu {
                trace: Rc::clone(&trace),
                pos: 0,
                irq: 0,
                regs: MainRegisters::default(),
            })),
            ConsoleKind::Compact => None,
        };
        let mut sys = MdSystem::new(
            kind,
            MdConfig::default(),
            Collaborators {
                main_cpu,
                sub_cpu: Box::new(TraceSubCpu {
                    trace: Rc::clone(&trace),
                    pos: 0,
                    regs: SubRegisters::default(),
                }),
                coprocessor: None,
                backend: Box::new(CountBackend {
                    trace: Rc::clone(&trace),
                }),
                fm: Box::new(NullFm),
                psg: Box::new(NullPsg),
            },
        )
        .unwrap();
        sys.load_cartridge(vec![0; 0x8000]).unwrap();
        (sys, trace)
    }

    fn run_one_frame(sys: &mut MdSystem, input: &ControllerState) {
        let mut audio = Vec::new();
        sys.run_frame(None, input, &mut audio).unwrap();
    }

    #[test]
    fn frame_covers_exact_cycle_budget() {
        let (mut sys, _trace) = make_system(ConsoleKind::Dual);
        run_one_frame(&mut sys, &ControllerState::default());
        assert_eq!(sys.clock.vdp, 262 * MCYCLES_PER_LINE);
        // Carried counters are re-based to small values
        assert_eq!(sys.clock.main, 0);
        assert_eq!(sys.clock.sub, 0);
    }

    #[test]
    fn vertical_interrupt_fires_once_at_fixed_offset() {
        let (mut sys, trace) = make_system(ConsoleKind::Dual);
        sys.vdp.set_register(1, 0x20); // vertical interrupt enable

        run_one_frame(&mut sys, &ControllerState::default());

        let vints: Vec<u32> = trace
            .borrow()
            .main_irqs
            .iter()
            .filter(|(mask, _)| *mask == IRQ_LEVEL_6)
            .map(|(_, pos)| *pos)
            .collect();
        // Default mode: 192 active lines plus the pre-render line
        let vblank_start = (1 + 192) * MCYCLES_PER_LINE;
        assert_eq!(vints, vec![vblank_start + VINT_DELAY]);

        trace.borrow_mut().main_irqs.clear();
        run_one_frame(&mut sys, &ControllerState::default());
        let count = trace
            .borrow()
            .main_irqs
            .iter()
            .filter(|(mask, _)| *mask == IRQ_LEVEL_6)
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn sub_interrupt_asserted_for_exactly_one_line() {
        let (mut sys, trace) = make_system(ConsoleKind::Dual);
        // Release the sub CPU from reset so its cycle position advances
        sys.sub_bus_state = SUB_BUS_RUNNING;
        run_one_frame(&mut sys, &ControllerState::default());

        let edges = trace.borrow().sub_int_edges.clone();
        assert_eq!(edges.len(), 2);
        let (asserted, at) = edges[0];
        let (released, clear_at) = edges[1];
        assert!(asserted);
        assert!(!released);
        assert_eq!(at, (1 + 192) * MCYCLES_PER_LINE + VINT_DELAY);
        assert_eq!(clear_at - at, MCYCLES_PER_LINE);
    }

    #[test]
    fn horizontal_interrupt_counts_lines() {
        let (mut sys, trace) = make_system(ConsoleKind::Dual);
        sys.vdp.set_register(0, 0x10); // horizontal interrupt enable
        sys.vdp.set_register(10, 0); // reload underflows every line

        run_one_frame(&mut sys, &ControllerState::default());

        let hints = trace
            .borrow()
            .main_irqs
            .iter()
            .filter(|(mask, _)| mask & IRQ_LEVEL_4 == IRQ_LEVEL_4)
            .count();
        // One per active line plus the first post-display line
        assert_eq!(hints, 193);
    }

    #[test]
    fn compact_hint_needs_one_cycle_lookahead_on_boundary() {
        let (mut sys, trace) = make_system(ConsoleKind::Compact);
        sys.vdp.set_register(0, 0x10);
        sys.vdp.set_register(10, 0);

        run_one_frame(&mut sys, &ControllerState::default());

        let edges = trace.borrow().sub_int_edges.clone();
        // The sub CPU sat exactly on the line boundary, so it was stepped
        // one cycle past it before the line was asserted
        assert_eq!(edges[0], (true, MCYCLES_PER_LINE + 1));
    }

    #[test]
    fn pause_interrupt_is_edge_triggered() {
        let (mut sys, trace) = make_system(ConsoleKind::Compact);

        let mut held = ControllerState::default();
        held.pad[0] = buttons::START;
        let released = ControllerState::default();

        run_one_frame(&mut sys, &held);
        run_one_frame(&mut sys, &held);
        assert_eq!(trace.borrow().nmi, 1);

        run_one_frame(&mut sys, &released);
        run_one_frame(&mut sys, &held);
        assert_eq!(trace.borrow().nmi, 2);
    }

    #[test]
    fn glasses_title_skips_left_lens_frame() {
        let (mut sys, trace) = make_system(ConsoleKind::Compact);
        sys.cart.force_profile(CartridgeProfile {
            glasses_3d: true,
            ..CartridgeProfile::default()
        });

        let input = ControllerState::default();
        let mut audio = Vec::new();
        let mut frame = emu_core::types::Frame::new(1, 1);

        sys.work_ram[0x1FFB] = 1;
        sys.run_frame(Some(&mut frame), &input, &mut audio).unwrap();
        assert!(trace.borrow().rendered.is_empty());

        sys.work_ram[0x1FFB] = 0;
        sys.run_frame(Some(&mut frame), &input, &mut audio).unwrap();
        assert_eq!(trace.borrow().rendered.len(), 192);
    }

    #[test]
    fn coprocessor_runs_fixed_budget_every_line() {
        use emu_core::cpu::Coprocessor;

        struct CountingCoproc {
            runs: Rc<RefCell<Vec<u32>>>,
        }
        impl Coprocessor for CountingCoproc {
            fn reset(&mut self) {
                self.runs.borrow_mut().clear();
            }
            fn run(&mut self, budget: u32) {
                self.runs.borrow_mut().push(budget);
            }
        }

        let (mut sys, _trace) = make_system(ConsoleKind::Dual);
        let runs = Rc::new(RefCell::new(Vec::new()));
        sys.coprocessor = Some(Box::new(CountingCoproc {
            runs: Rc::clone(&runs),
        }));

        run_one_frame(&mut sys, &ControllerState::default());

        // Once per scanline, always the same budget
        assert_eq!(runs.borrow().len(), 262);
        assert!(runs.borrow().iter().all(|&b| b == COPROCESSOR_LINE_BUDGET));
    }

    #[test]
    fn render_skip_only_suppresses_pixels() {
        let (mut sys, trace) = make_system(ConsoleKind::Dual);
        let input = ControllerState::default();
        let mut audio = Vec::new();

        sys.run_frame(None, &input, &mut audio).unwrap();
        assert!(trace.borrow().rendered.is_empty());
        let blanked_skipped = trace.borrow().blanked;

        let mut frame = emu_core::types::Frame::new(1, 1);
        sys.run_frame(Some(&mut frame), &input, &mut audio).unwrap();
        assert_eq!(trace.borrow().rendered.len(), 192);
        // Border fills are not part of the skip
        assert_eq!(trace.borrow().blanked, blanked_skipped * 2);
    }
}
