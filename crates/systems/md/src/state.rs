//! Versioned binary savestate serializer.
//!
//! A state image starts with a fixed 16-byte signature. Two signatures are
//! recognized: the current layout and a legacy layout with a larger,
//! differently ordered field set. The signature is validated before any
//! live state is touched; only then does the restore reset the console and
//! apply fields in their documented order. Field order matters: cartridge
//! context comes last because rebuilding the bank mapping depends on the
//! bus-routing and I/O state already being in place.

use crate::system::{ConsoleKind, MdSystem};
use crate::vdp::{DmaKind, Vdp};
use emu_core::cpu::{MainRegisters, SubRegisters};
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::StateError;

pub(crate) const SIGNATURE: &[u8; 16] = b"MD-CORE-STATE2.1";
pub(crate) const SIGNATURE_LEGACY: &[u8; 16] = b"MD-CORE-STATE1.0";

// ---------------------------------------------------------------------------
// byte-level plumbing

pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], StateError> {
        let end = self
            .pos
            .checked_add(count)
            .filter(|&end| end <= self.data.len())
            .ok_or(StateError::Truncated(self.pos))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn get_u8(&mut self) -> Result<u8, StateError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn get_bool(&mut self) -> Result<bool, StateError> {
        Ok(self.get_u8()? != 0)
    }

    pub(crate) fn get_u16(&mut self) -> Result<u16, StateError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn get_u32(&mut self) -> Result<u32, StateError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn get_bytes(&mut self, count: usize) -> Result<&'a [u8], StateError> {
        self.take(count)
    }

    pub(crate) fn skip(&mut self, count: usize) -> Result<(), StateError> {
        self.take(count).map(|_| ())
    }
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::with_capacity(0x12000) }
    }

    fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn put_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn put_bytes(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }
}

// ---------------------------------------------------------------------------
// shared register enumeration order

#[derive(Clone, Copy)]
enum MainReg {
    D(usize),
    A(usize),
    Pc,
    Sr,
    Usp,
    Isp,
}

/// Main-CPU register enumeration, shared by the current and legacy layouts.
const MAIN_REG_ORDER: [MainReg; 20] = [
    MainReg::D(0),
    MainReg::D(1),
    MainReg::D(2),
    MainReg::D(3),
    MainReg::D(4),
    MainReg::D(5),
    MainReg::D(6),
    MainReg::D(7),
    MainReg::A(0),
    MainReg::A(1),
    MainReg::A(2),
    MainReg::A(3),
    MainReg::A(4),
    MainReg::A(5),
    MainReg::A(6),
    MainReg::A(7),
    MainReg::Pc,
    MainReg::Sr,
    MainReg::Usp,
    MainReg::Isp,
];

fn write_main_registers(w: &mut Writer, regs: &MainRegisters) {
    for reg in MAIN_REG_ORDER {
        match reg {
            MainReg::D(i) => w.put_u32(regs.d[i]),
            MainReg::A(i) => w.put_u32(regs.a[i]),
            MainReg::Pc => w.put_u32(regs.pc),
            MainReg::Sr => w.put_u16(regs.sr),
            MainReg::Usp => w.put_u32(regs.usp),
            MainReg::Isp => w.put_u32(regs.isp),
        }
    }
}

fn read_main_registers(r: &mut Reader<'_>) -> Result<MainRegisters, StateError> {
    let mut regs = MainRegisters::default();
    for reg in MAIN_REG_ORDER {
        match reg {
            MainReg::D(i) => regs.d[i] = r.get_u32()?,
            MainReg::A(i) => regs.a[i] = r.get_u32()?,
            MainReg::Pc => regs.pc = r.get_u32()?,
            MainReg::Sr => regs.sr = r.get_u16()?,
            MainReg::Usp => regs.usp = r.get_u32()?,
            MainReg::Isp => regs.isp = r.get_u32()?,
        }
    }
    Ok(regs)
}

fn write_sub_registers(w: &mut Writer, regs: &SubRegisters) {
    for value in [
        regs.af,
        regs.bc,
        regs.de,
        regs.hl,
        regs.af_shadow,
        regs.bc_shadow,
        regs.de_shadow,
        regs.hl_shadow,
        regs.ix,
        regs.iy,
        regs.wz,
        regs.sp,
        regs.pc,
    ] {
        w.put_u16(value);
    }
    w.put_u8(regs.i);
    w.put_u8(regs.r);
    w.put_u8(regs.r_high);
    w.put_u8(regs.im);
    w.put_bool(regs.iff1);
    w.put_bool(regs.iff2);
    w.put_bool(regs.halted);
    w.put_bool(regs.after_ei);
    w.put_bool(regs.int_line);
}

fn read_sub_registers(r: &mut Reader<'_>) -> Result<SubRegisters, StateError> {
    let mut regs = SubRegisters {
        af: r.get_u16()?,
        bc: r.get_u16()?,
        de: r.get_u16()?,
        hl: r.get_u16()?,
        af_shadow: r.get_u16()?,
        bc_shadow: r.get_u16()?,
        de_shadow: r.get_u16()?,
        hl_shadow: r.get_u16()?,
        ix: r.get_u16()?,
        iy: r.get_u16()?,
        wz: r.get_u16()?,
        sp: r.get_u16()?,
        pc: r.get_u16()?,
        ..SubRegisters::default()
    };
    regs.i = r.get_u8()?;
    regs.r = r.get_u8()?;
    regs.r_high = r.get_u8()?;
    regs.im = r.get_u8()?;
    regs.iff1 = r.get_bool()?;
    regs.iff2 = r.get_bool()?;
    regs.halted = r.get_bool()?;
    regs.after_ei = r.get_bool()?;
    regs.int_line = r.get_bool()?;
    Ok(regs)
}

/// Legacy wide sub-CPU register block: 32-bit register pairs, flag bytes,
/// a cycle counter and a reserved pointer tail.
fn read_sub_registers_legacy(r: &mut Reader<'_>) -> Result<SubRegisters, StateError> {
    let mut regs = SubRegisters::default();
    regs.pc = r.get_u32()? as u16;
    regs.sp = r.get_u32()? as u16;
    regs.af = r.get_u32()? as u16;
    regs.bc = r.get_u32()? as u16;
    regs.de = r.get_u32()? as u16;
    regs.hl = r.get_u32()? as u16;
    regs.ix = r.get_u32()? as u16;
    regs.iy = r.get_u32()? as u16;
    regs.wz = r.get_u32()? as u16;
    regs.af_shadow = r.get_u32()? as u16;
    regs.bc_shadow = r.get_u32()? as u16;
    regs.de_shadow = r.get_u32()? as u16;
    regs.hl_shadow = r.get_u32()? as u16;
    regs.r = r.get_u8()?;
    regs.r_high = r.get_u8()?;
    regs.iff1 = r.get_bool()?;
    regs.iff2 = r.get_bool()?;
    regs.halted = r.get_bool()?;
    regs.im = r.get_u8()?;
    regs.i = r.get_u8()?;
    r.skip(2)?; // nmi line state / nmi pending
    regs.int_line = r.get_bool()?;
    regs.after_ei = r.get_bool()?;
    r.skip(1)?; // alignment
    r.skip(4)?; // cycle counter, superseded by the clock fields
    r.skip(8)?; // reserved (host pointers in the historical layout)
    Ok(regs)
}

// ---------------------------------------------------------------------------
// video generator context

fn write_vdp(w: &mut Writer, vdp: &Vdp) {
    w.put_bytes(&vdp.regs);
    w.put_u16(vdp.status);
    w.put_u16(vdp.v_counter);
    w.put_bool(vdp.hint_pending);
    w.put_bool(vdp.vint_pending);
    w.put_u8(vdp.hscroll_latch);
    w.put_u8(vdp.vscroll_latch);
    w.put_bool(vdp.odd_frame);
    w.put_bool(vdp.interlaced);
    w.put_bool(vdp.im2);
    w.put_u8(vdp.dma_kind as u8);
    w.put_u32(vdp.dma_length);
    w.put_u32(vdp.fifo_write_count);
    w.put_u32(vdp.fifo_last_write);
    for value in [
        vdp.viewport.x,
        vdp.viewport.y,
        vdp.viewport.w,
        vdp.viewport.h,
        vdp.viewport.ow,
        vdp.viewport.oh,
    ] {
        w.put_u16(value);
    }
    w.put_u8(vdp.viewport.changed);
}

fn read_vdp(r: &mut Reader<'_>, vdp: &mut Vdp) -> Result<(), StateError> {
    vdp.regs.copy_from_slice(r.get_bytes(0x20)?);
    vdp.status = r.get_u16()?;
    vdp.v_counter = r.get_u16()?;
    vdp.hint_pending = r.get_bool()?;
    vdp.vint_pending = r.get_bool()?;
    vdp.hscroll_latch = r.get_u8()?;
    vdp.vscroll_latch = r.get_u8()?;
    vdp.odd_frame = r.get_bool()?;
    vdp.interlaced = r.get_bool()?;
    vdp.im2 = r.get_bool()?;
    vdp.dma_kind = DmaKind::from_u8(r.get_u8()?);
    vdp.dma_length = r.get_u32()?;
    vdp.fifo_write_count = r.get_u32()?;
    vdp.fifo_last_write = r.get_u32()?;
    vdp.viewport.x = r.get_u16()?;
    vdp.viewport.y = r.get_u16()?;
    vdp.viewport.w = r.get_u16()?;
    vdp.viewport.h = r.get_u16()?;
    vdp.viewport.ow = r.get_u16()?;
    vdp.viewport.oh = r.get_u16()?;
    vdp.viewport.changed = r.get_u8()?;
    finish_vdp_restore(vdp);
    Ok(())
}

/// Legacy layout: status word first, a reserved block, and no scroll
/// latches next to the flags.
fn read_vdp_legacy(r: &mut Reader<'_>, vdp: &mut Vdp) -> Result<(), StateError> {
    vdp.status = r.get_u16()?;
    vdp.v_counter = r.get_u16()?;
    vdp.regs.copy_from_slice(r.get_bytes(0x20)?);
    r.skip(16)?; // reserved in the historical layout
    vdp.hint_pending = r.get_bool()?;
    vdp.vint_pending = r.get_bool()?;
    vdp.odd_frame = r.get_bool()?;
    vdp.interlaced = r.get_bool()?;
    vdp.im2 = r.get_bool()?;
    vdp.hscroll_latch = r.get_u8()?;
    vdp.vscroll_latch = r.get_u8()?;
    vdp.dma_length = r.get_u32()?;
    vdp.dma_kind = DmaKind::from_u8(r.get_u8()?);
    vdp.fifo_write_count = r.get_u32()?;
    vdp.fifo_last_write = r.get_u32()?;
    vdp.viewport.x = r.get_u16()?;
    vdp.viewport.y = r.get_u16()?;
    vdp.viewport.w = r.get_u16()?;
    vdp.viewport.h = r.get_u16()?;
    vdp.viewport.ow = r.get_u16()?;
    vdp.viewport.oh = r.get_u16()?;
    vdp.viewport.changed = r.get_u8()?;
    finish_vdp_restore(vdp);
    Ok(())
}

fn finish_vdp_restore(vdp: &mut Vdp) {
    // Renderer modes are derived state, recomputed instead of serialized.
    vdp.refresh_render_modes();
    vdp.dma_last_cycle = 0;
    vdp.dma_residue = 0;
    vdp.control_latch = None;
}

// ---------------------------------------------------------------------------
// save

pub(crate) fn save_state(sys: &MdSystem) -> Vec<u8> {
    let mut w = Writer::new();
    w.put_bytes(SIGNATURE);

    // Primary RAM and sub-CPU bus routing
    match sys.kind {
        ConsoleKind::Compact => w.put_bytes(&sys.work_ram[..0x2000]),
        ConsoleKind::Dual => {
            w.put_bytes(&sys.work_ram[..]);
            w.put_bytes(&sys.sub_ram[..]);
            w.put_u8(sys.sub_bus_state);
            w.put_u32(sys.sub_bank);
        }
    }

    // Master-cycle carry
    w.put_u32(sys.clock.main);
    w.put_u32(sys.clock.sub);

    // I/O register block
    match sys.kind {
        ConsoleKind::Compact => w.put_u8(sys.io_reg[0x0E]),
        ConsoleKind::Dual => w.put_bytes(&sys.io_reg),
    }

    // Video generator context, then the backend's own memory
    write_vdp(&mut w, &sys.vdp);
    let mut block = Vec::new();
    sys.backend.save_context(&mut block);
    w.put_u32(block.len() as u32);
    w.put_bytes(&block);

    // Sound context (FM, then PSG, then the tick-phase carry)
    sys.sound.save_context(&mut w.buf);

    // CPU register files
    if let Some(cpu) = sys.main_cpu.as_ref() {
        write_main_registers(&mut w, &cpu.registers());
    }
    write_sub_registers(&mut w, &sys.sub_cpu.registers());

    // Cartridge hardware context
    w.put_bytes(&sys.cart.frame_control_regs());

    log(LogCategory::State, LogLevel::Debug, || {
        format!("saved {} bytes", w.buf.len())
    });
    w.buf
}

// ---------------------------------------------------------------------------
// load

pub(crate) fn load_state(sys: &mut MdSystem, data: &[u8]) -> Result<(), StateError> {
    // Validate the signature before mutating anything; a bad image must
    // leave the live state untouched.
    let Some(signature) = data.get(..16) else {
        return Err(StateError::Truncated(0));
    };
    if signature == SIGNATURE_LEGACY {
        return load_state_legacy(sys, data);
    }
    if signature != SIGNATURE {
        return Err(StateError::UnknownSignature);
    }

    sys.reset_console();
    let mut r = Reader::new(&data[16..]);

    match sys.kind {
        ConsoleKind::Compact => {
            sys.work_ram[..0x2000].copy_from_slice(r.get_bytes(0x2000)?);
        }
        ConsoleKind::Dual => {
            sys.work_ram.copy_from_slice(r.get_bytes(0x1_0000)?);
            sys.sub_ram.copy_from_slice(r.get_bytes(0x2000)?);
            sys.sub_bus_state = r.get_u8()?;
            sys.sub_bank = r.get_u32()?;
        }
    }

    sys.clock.main = r.get_u32()?;
    sys.clock.sub = r.get_u32()?;

    match sys.kind {
        ConsoleKind::Compact => {
            sys.io_reg[0x0E] = r.get_u8()?;
        }
        ConsoleKind::Dual => {
            sys.io_reg.copy_from_slice(r.get_bytes(0x10)?);
            // The version port always reflects the running console
            sys.io_reg[0] = sys.region.code() | 0x20;
        }
    }

    read_vdp(&mut r, &mut sys.vdp)?;
    let block_len = r.get_u32()? as usize;
    sys.backend.load_context(r.get_bytes(block_len)?)?;

    sys.sound.load_context(&mut r)?;

    if let Some(cpu) = sys.main_cpu.as_mut() {
        let regs = read_main_registers(&mut r)?;
        cpu.set_registers(&regs);
    }
    let sub_regs = read_sub_registers(&mut r)?;
    sys.sub_cpu.set_registers(&sub_regs);

    restore_cart(sys, &mut r)?;

    log(LogCategory::State, LogLevel::Debug, || "state restored".to_string());
    Ok(())
}

/// Legacy images: no sub-CPU cycle counter, a reserved I/O slot on the
/// compact console, the main-CPU cycle counter embedded in its register
/// block, and the wide sub-CPU register layout.
fn load_state_legacy(sys: &mut MdSystem, data: &[u8]) -> Result<(), StateError> {
    sys.reset_console();
    let mut r = Reader::new(&data[16..]);

    match sys.kind {
        ConsoleKind::Compact => {
            sys.work_ram[..0x2000].copy_from_slice(r.get_bytes(0x2000)?);
            // One live byte in a 16-byte reserved slot
            r.skip(15)?;
            sys.io_reg[0x0F] = r.get_u8()?;
        }
        ConsoleKind::Dual => {
            sys.work_ram.copy_from_slice(r.get_bytes(0x1_0000)?);
            sys.sub_ram.copy_from_slice(r.get_bytes(0x2000)?);
            sys.sub_bus_state = r.get_u8()?;
            sys.sub_bank = r.get_u32()?;
            sys.io_reg.copy_from_slice(r.get_bytes(0x10)?);
            sys.io_reg[0] = sys.region.code() | 0x20;
        }
    }

    read_vdp_legacy(&mut r, &mut sys.vdp)?;
    let block_len = r.get_u32()? as usize;
    sys.backend.load_context(r.get_bytes(block_len)?)?;

    sys.sound.load_context(&mut r)?;

    if let Some(cpu) = sys.main_cpu.as_mut() {
        let regs = read_main_registers(&mut r)?;
        cpu.set_registers(&regs);
        sys.clock.main = r.get_u32()?;
        let irq_word = r.get_u32()?;
        cpu.set_interrupt_line((irq_word >> 8) as u8);
        r.skip(4)?; // stop-state word
    }
    let sub_regs = read_sub_registers_legacy(&mut r)?;
    sys.sub_cpu.set_registers(&sub_regs);

    restore_cart(sys, &mut r)?;

    log(LogCategory::State, LogLevel::Info, || {
        "legacy state restored".to_string()
    });
    Ok(())
}

/// Cartridge context restore: the frame control registers are re-applied
/// through the mapper so the live bank mapping is rebuilt, and the compact
/// console's slot enable is re-derived from the restored memory control.
fn restore_cart(sys: &mut MdSystem, r: &mut Reader<'_>) -> Result<(), StateError> {
    let bytes = r.get_bytes(4)?;
    let fcr = [bytes[0], bytes[1], bytes[2], bytes[3]];
    sys.cart.restore_frame_control_regs(fcr);
    if sys.kind == ConsoleKind::Compact {
        sys.cart.set_slot_enabled(sys.io_reg[0x0E] & 0x40 == 0);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// legacy writer, kept for fixture generation in tests

#[cfg(test)]
pub(crate) fn save_state_legacy(sys: &MdSystem) -> Vec<u8> {
    let mut w = Writer::new();
    w.put_bytes(SIGNATURE_LEGACY);

    match sys.kind {
        ConsoleKind::Compact => {
            w.put_bytes(&sys.work_ram[..0x2000]);
            w.put_bytes(&[0u8; 15]);
            w.put_u8(sys.io_reg[0x0F]);
        }
        ConsoleKind::Dual => {
            w.put_bytes(&sys.work_ram[..]);
            w.put_bytes(&sys.sub_ram[..]);
            w.put_u8(sys.sub_bus_state);
            w.put_u32(sys.sub_bank);
            w.put_bytes(&sys.io_reg);
        }
    }

    // Legacy video layout
    let vdp = &sys.vdp;
    w.put_u16(vdp.status);
    w.put_u16(vdp.v_counter);
    w.put_bytes(&vdp.regs);
    w.put_bytes(&[0u8; 16]);
    w.put_bool(vdp.hint_pending);
    w.put_bool(vdp.vint_pending);
    w.put_bool(vdp.odd_frame);
    w.put_bool(vdp.interlaced);
    w.put_bool(vdp.im2);
    w.put_u8(vdp.hscroll_latch);
    w.put_u8(vdp.vscroll_latch);
    w.put_u32(vdp.dma_length);
    w.put_u8(vdp.dma_kind as u8);
    w.put_u32(vdp.fifo_write_count);
    w.put_u32(vdp.fifo_last_write);
    for value in [
        vdp.viewport.x,
        vdp.viewport.y,
        vdp.viewport.w,
        vdp.viewport.h,
        vdp.viewport.ow,
        vdp.viewport.oh,
    ] {
        w.put_u16(value);
    }
    w.put_u8(vdp.viewport.changed);

    let mut block = Vec::new();
    sys.backend.save_context(&mut block);
    w.put_u32(block.len() as u32);
    w.put_bytes(&block);

    sys.sound.save_context(&mut w.buf);

    if let Some(cpu) = sys.main_cpu.as_ref() {
        write_main_registers(&mut w, &cpu.registers());
        w.put_u32(sys.clock.main);
        w.put_u32(u32::from(cpu.interrupt_line()) << 8);
        w.put_u32(0); // stop-state word
    }

    let regs = sys.sub_cpu.registers();
    for value in [
        regs.pc,
        regs.sp,
        regs.af,
        regs.bc,
        regs.de,
        regs.hl,
        regs.ix,
        regs.iy,
        regs.wz,
        regs.af_shadow,
        regs.bc_shadow,
        regs.de_shadow,
        regs.hl_shadow,
    ] {
        w.put_u32(u32::from(value));
    }
    w.put_u8(regs.r);
    w.put_u8(regs.r_high);
    w.put_bool(regs.iff1);
    w.put_bool(regs.iff2);
    w.put_bool(regs.halted);
    w.put_u8(regs.im);
    w.put_u8(regs.i);
    w.put_bytes(&[0u8; 2]); // nmi line state / nmi pending
    w.put_bool(regs.int_line);
    w.put_bool(regs.after_ei);
    w.put_u8(0); // alignment
    w.put_u32(sys.clock.sub);
    w.put_bytes(&[0u8; 8]); // reserved

    w.put_bytes(&sys.cart.frame_control_regs());
    w.buf
}
