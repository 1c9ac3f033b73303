//! Processor collaborator interfaces.
//!
//! The scheduler drives instruction execution through these traits rather
//! than owning interpreter cores. A processor is handed a bus view and a
//! master-cycle deadline; it executes until its cycle position reaches the
//! deadline and reports where it actually stopped (instruction granularity
//! means it may overshoot by a few cycles). Cycle positions themselves are
//! owned by the caller so relative phase can be carried across frames.

/// Bus seen by the main (68000-class) processor.
pub trait MainBus {
    fn read8(&mut self, cycle: u32, addr: u32) -> u8;
    fn read16(&mut self, cycle: u32, addr: u32) -> u16;
    fn write8(&mut self, cycle: u32, addr: u32, data: u8);
    fn write16(&mut self, cycle: u32, addr: u32, data: u16);
}

/// Bus seen by the sub (Z80-class) processor.
pub trait SubBus {
    fn read(&mut self, cycle: u32, addr: u16) -> u8;
    fn write(&mut self, cycle: u32, addr: u16, data: u8);

    fn port_read(&mut self, cycle: u32, port: u8) -> u8 {
        let _ = (cycle, port);
        0xFF
    }

    fn port_write(&mut self, cycle: u32, port: u8, data: u8) {
        let _ = (cycle, port, data);
    }
}

/// Register file of the main processor, in savestate enumeration order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MainRegisters {
    pub d: [u32; 8],
    pub a: [u32; 8],
    pub pc: u32,
    pub sr: u16,
    pub usp: u32,
    pub isp: u32,
}

/// Register file of the sub processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubRegisters {
    pub af: u16,
    pub bc: u16,
    pub de: u16,
    pub hl: u16,
    pub af_shadow: u16,
    pub bc_shadow: u16,
    pub de_shadow: u16,
    pub hl_shadow: u16,
    pub ix: u16,
    pub iy: u16,
    pub wz: u16,
    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    pub r: u8,
    pub r_high: u8,
    pub im: u8,
    pub iff1: bool,
    pub iff2: bool,
    pub halted: bool,
    pub after_ei: bool,
    pub int_line: bool,
}

/// 68000-class execution engine.
pub trait MainCpu {
    fn reset(&mut self);

    /// Execute from cycle position `cycles` until at least `deadline`,
    /// returning the new cycle position.
    fn run(&mut self, bus: &mut dyn MainBus, cycles: u32, deadline: u32) -> u32;

    /// Currently asserted interrupt state (pending flag | level).
    fn interrupt_line(&self) -> u8;

    /// Replace the interrupt state; acknowledged lines are cleared by the
    /// core itself.
    fn set_interrupt_line(&mut self, mask: u8);

    fn registers(&self) -> MainRegisters;
    fn set_registers(&mut self, regs: &MainRegisters);
}

/// Z80-class execution engine.
pub trait SubCpu {
    fn reset(&mut self);

    /// Execute from cycle position `cycles` until at least `deadline`,
    /// returning the new cycle position.
    fn run(&mut self, bus: &mut dyn SubBus, cycles: u32, deadline: u32) -> u32;

    /// Assert or release the maskable interrupt line.
    fn set_int_line(&mut self, asserted: bool);

    /// Deliver a non-maskable interrupt edge.
    fn nmi(&mut self);

    fn registers(&self) -> SubRegisters;
    fn set_registers(&mut self, regs: &SubRegisters);
}

/// Optional DSP-style coprocessor, run on a fixed cycle budget per line.
pub trait Coprocessor {
    fn reset(&mut self);
    fn run(&mut self, budget: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullBus;

    impl SubBus for NullBus {
        fn read(&mut self, _cycle: u32, _addr: u16) -> u8 {
            0xFF
        }
        fn write(&mut self, _cycle: u32, _addr: u16, _data: u8) {}
    }

    #[test]
    fn sub_bus_port_defaults() {
        let mut bus = NullBus;
        assert_eq!(bus.port_read(0, 0xBF), 0xFF);
        bus.port_write(0, 0x7F, 0x9F);
    }

    #[test]
    fn register_files_default_to_zero() {
        let main = MainRegisters::default();
        assert_eq!(main.d, [0; 8]);
        assert_eq!(main.sr, 0);

        let sub = SubRegisters::default();
        assert_eq!(sub.pc, 0);
        assert!(!sub.iff1);
        assert!(!sub.int_line);
    }
}
