//! Video display generator context.
//!
//! The generator's scheduler-visible half lives here: the register file,
//! status word, counters, viewport and DMA/FIFO bookkeeping. Pixel
//! production and video memory belong to the [`RenderBackend`]
//! collaborator, which is invoked per line with the renderer mode resolved
//! once per viewport change.

use emu_core::types::Frame;
use emu_core::StateError;
use serde::{Deserialize, Serialize};

/// Master cycles per scanline, both regions.
pub const MCYCLES_PER_LINE: u32 = 3420;

// Status word bits
pub const STATUS_DMA_BUSY: u16 = 0x0002;
pub const STATUS_VBLANK: u16 = 0x0008;
pub const STATUS_ODD_FRAME: u16 = 0x0010;
pub const STATUS_VINT: u16 = 0x0080;
pub const STATUS_FIFO_FULL: u16 = 0x0100;
pub const STATUS_FIFO_EMPTY: u16 = 0x0200;

// Viewport change bits
/// Dimensions differ from what the presentation layer last saw.
pub const VIEWPORT_DIMS_CHANGED: u8 = 0x01;
/// Size registers were written; recompute at the next frame top.
pub const VIEWPORT_PENDING: u8 = 0x02;
/// Interlace field layout flipped.
pub const VIEWPORT_INTERLACE_CHANGED: u8 = 0x04;

/// Background renderer variant, resolved once per viewport change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BgMode {
    #[default]
    Normal,
    ColumnScroll,
    Interlace2,
    ColumnScrollInterlace2,
}

/// Sprite renderer variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjMode {
    #[default]
    Normal,
    Shadow,
    Interlace2,
    ShadowInterlace2,
}

/// Active DMA transfer type, indexing the per-line transfer rate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DmaKind {
    #[default]
    MemoryToVideo = 0,
    MemoryToColor = 1,
    Fill = 2,
    Copy = 3,
}

impl DmaKind {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value & 3 {
            0 => DmaKind::MemoryToVideo,
            1 => DmaKind::MemoryToColor,
            2 => DmaKind::Fill,
            _ => DmaKind::Copy,
        }
    }
}

/// Bytes transferred per scanline, by kind and H32/H40 width.
const DMA_RATES: [[u32; 2]; 4] = [
    [167, 205], // bus to video memory
    [167, 205], // bus to color/scroll memory
    [166, 204], // fill
    [83, 102],  // copy
];

/// Active display area plus change tracking for the presentation layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
    /// Dimensions last reported to the presentation layer.
    pub ow: u16,
    pub oh: u16,
    pub changed: u8,
}

/// Pixel producer and video memory owner.
///
/// All methods are invoked at exact cycle boundaries by the scheduler;
/// implementations must not affect timing.
pub trait RenderBackend {
    /// Render one active-display line with the resolved renderer modes.
    fn render_line(&mut self, line: u16, bg: BgMode, obj: ObjMode);

    /// Fill one border/overscan line with the backdrop color.
    fn blank_line(&mut self, line: u16, x: i32, width: i32);

    /// Pre-parse sprite attributes for the given line (-1 = line before
    /// active display).
    fn parse_sprites(&mut self, line: i32) {
        let _ = line;
    }

    /// Move `bytes` of DMA data for the given transfer kind.
    fn dma_step(&mut self, kind: DmaKind, bytes: u32) {
        let _ = (kind, bytes);
    }

    /// Copy the finished frame into the caller's buffer.
    fn copy_frame(&self, out: &mut Frame) {
        let _ = out;
    }

    /// Append video memory context for savestates.
    fn save_context(&self, out: &mut Vec<u8>) {
        let _ = out;
    }

    /// Restore context produced by `save_context`.
    fn load_context(&mut self, data: &[u8]) -> Result<(), StateError> {
        let _ = data;
        Ok(())
    }
}

/// Scheduler-visible video generator state.
pub struct Vdp {
    pub regs: [u8; 0x20],
    pub status: u16,
    pub v_counter: u16,

    // Interrupt latches, distinct from the CPUs' own masks
    pub hint_pending: bool,
    pub vint_pending: bool,

    // Scroll registers latched at the frame top (compact console only)
    pub hscroll_latch: u8,
    pub vscroll_latch: u8,

    pub odd_frame: bool,
    pub interlaced: bool,
    pub im2: bool,

    // DMA bookkeeping; the transfer engine itself is backend-side
    pub dma_length: u32,
    pub dma_kind: DmaKind,
    pub(crate) dma_last_cycle: u32,
    pub(crate) dma_residue: u32,

    pub fifo_write_count: u32,
    pub fifo_last_write: u32,

    pub viewport: Viewport,
    bg_mode: BgMode,
    obj_mode: ObjMode,

    // Byte-wide control port latch (sub-CPU access path)
    pub(crate) control_latch: Option<u8>,

    pal: bool,
}

impl Vdp {
    pub fn new(pal: bool) -> Self {
        let mut vdp = Self {
            regs: [0; 0x20],
            status: 0,
            v_counter: 0,
            hint_pending: false,
            vint_pending: false,
            hscroll_latch: 0,
            vscroll_latch: 0,
            odd_frame: false,
            interlaced: false,
            im2: false,
            dma_length: 0,
            dma_kind: DmaKind::default(),
            dma_last_cycle: 0,
            dma_residue: 0,
            fifo_write_count: 0,
            fifo_last_write: 0,
            viewport: Viewport::default(),
            bg_mode: BgMode::default(),
            obj_mode: ObjMode::default(),
            control_latch: None,
            pal,
        };
        vdp.reset();
        vdp
    }

    pub fn reset(&mut self) {
        self.regs = [0; 0x20];
        self.status = STATUS_FIFO_EMPTY | u16::from(self.pal);
        self.v_counter = 0;
        self.hint_pending = false;
        self.vint_pending = false;
        self.hscroll_latch = 0;
        self.vscroll_latch = 0;
        self.odd_frame = false;
        self.interlaced = false;
        self.im2 = false;
        self.dma_length = 0;
        self.dma_last_cycle = 0;
        self.dma_residue = 0;
        self.fifo_write_count = 0;
        self.fifo_last_write = 0;
        self.control_latch = None;
        self.viewport = Viewport {
            x: 0,
            y: 0,
            w: 256,
            h: 192,
            ow: 256,
            oh: 192,
            // Force a recompute at the first frame top.
            changed: VIEWPORT_PENDING,
        };
        self.bg_mode = BgMode::Normal;
        self.obj_mode = ObjMode::Normal;
    }

    pub fn set_pal(&mut self, pal: bool) {
        self.pal = pal;
        self.status = (self.status & !1) | u16::from(pal);
    }

    /// Write a display register. Size-affecting registers defer their
    /// viewport effect to the next frame top.
    pub fn set_register(&mut self, index: usize, value: u8) {
        let index = index & 0x1F;
        let old = self.regs[index];
        self.regs[index] = value;
        if (index == 1 || index == 12) && old != value {
            self.viewport.changed |= VIEWPORT_PENDING;
        }
    }

    /// Byte-wide control port write (sub-CPU path). Two writes form a
    /// command; `10rrrrrr vvvvvvvv` pairs are register writes.
    pub fn write_control_byte(&mut self, data: u8) {
        match self.control_latch.take() {
            None => self.control_latch = Some(data),
            Some(first) => {
                if data & 0xC0 == 0x80 {
                    self.set_register((data & 0x1F) as usize, first);
                }
                // Address setup commands only matter to the backend's
                // memory ports, which are out of scope here.
            }
        }
    }

    /// Data port write: only the FIFO bookkeeping is modeled here.
    pub fn write_data_byte(&mut self, cycle: u32, _data: u8) {
        self.control_latch = None;
        self.fifo_write_count += 1;
        self.fifo_last_write = cycle;
        self.status &= !STATUS_FIFO_EMPTY;
        if self.fifo_write_count >= 4 {
            self.status |= STATUS_FIFO_FULL;
        }
    }

    /// Status read clears the interrupt flag bits and the control latch.
    pub fn read_status(&mut self) -> u16 {
        let value = self.status;
        self.control_latch = None;
        self.status &= !STATUS_VINT;
        value
    }

    pub fn screen_width(&self) -> u16 {
        256 + (((self.regs[12] & 0x01) as u16) << 6)
    }

    pub fn display_enabled(&self) -> bool {
        self.regs[1] & 0x40 != 0
    }

    pub fn hint_enabled(&self) -> bool {
        self.regs[0] & 0x10 != 0
    }

    pub fn vint_enabled(&self) -> bool {
        self.regs[1] & 0x20 != 0
    }

    pub fn bg_mode(&self) -> BgMode {
        self.bg_mode
    }

    pub fn obj_mode(&self) -> ObjMode {
        self.obj_mode
    }

    /// Apply a pending viewport change at the frame top: interlace mode,
    /// renderer variants and active display size.
    pub fn refresh_viewport(&mut self, overscan: u8) {
        if self.viewport.changed & VIEWPORT_PENDING == 0 {
            return;
        }
        self.viewport.changed &= !VIEWPORT_PENDING;

        let old_interlaced = self.interlaced;
        self.interlaced = self.regs[12] & 0x02 != 0;
        if old_interlaced != self.interlaced {
            self.im2 = self.regs[12] & 0x06 == 0x06;
            self.odd_frame = true;
            self.viewport.changed = VIEWPORT_DIMS_CHANGED | VIEWPORT_INTERLACE_CHANGED;
        }

        self.refresh_render_modes();

        // Active screen height
        let pal = u16::from(self.pal);
        if self.regs[1] & 0x04 != 0 {
            self.viewport.h = 224 + (((self.regs[1] & 0x08) as u16) << 1);
            self.viewport.y =
                u16::from(overscan & 1) * ((240 + 48 * pal - self.viewport.h) >> 1);
        } else {
            self.viewport.h = 192;
            self.viewport.y = u16::from(overscan & 1) * 24 * (pal + 1);
        }

        // Active screen width and horizontal border
        self.viewport.w = self.screen_width();
        self.viewport.x = if overscan & 2 != 0 { 14 } else { 0 };
    }

    /// Renderer variants, resolved once per viewport change (and after a
    /// state restore) rather than per pixel.
    pub(crate) fn refresh_render_modes(&mut self) {
        if self.regs[1] & 0x04 == 0 {
            return;
        }
        let column_scroll = self.regs[11] & 0x04 != 0;
        self.bg_mode = match (column_scroll, self.im2) {
            (false, false) => BgMode::Normal,
            (true, false) => BgMode::ColumnScroll,
            (false, true) => BgMode::Interlace2,
            (true, true) => BgMode::ColumnScrollInterlace2,
        };
        let shadow = self.regs[12] & 0x08 != 0;
        self.obj_mode = match (shadow, self.im2) {
            (false, false) => ObjMode::Normal,
            (true, false) => ObjMode::Shadow,
            (false, true) => ObjMode::Interlace2,
            (true, true) => ObjMode::ShadowInterlace2,
        };
    }

    /// Record that the presentation layer dimensions differ, at the end of
    /// active display.
    pub fn latch_reported_size(&mut self) {
        if self.viewport.w != self.viewport.ow || self.viewport.h != self.viewport.oh {
            self.viewport.ow = self.viewport.w;
            self.viewport.oh = self.viewport.h;
            self.viewport.changed |= VIEWPORT_DIMS_CHANGED;
        }
    }

    pub fn dma_pending(&self) -> bool {
        self.dma_length > 0
    }

    /// Begin a DMA transfer of `bytes` at the given master cycle.
    pub fn start_dma(&mut self, cycle: u32, kind: DmaKind, bytes: u32) {
        self.dma_kind = kind;
        self.dma_length = bytes;
        self.dma_last_cycle = cycle;
        self.dma_residue = 0;
        if bytes > 0 {
            self.status |= STATUS_DMA_BUSY;
        }
    }

    /// Advance the pending transfer up to the given master cycle, handing
    /// the moved byte count to the backend.
    pub fn update_dma(&mut self, cycle: u32, backend: &mut dyn RenderBackend) {
        if self.dma_length == 0 {
            self.dma_last_cycle = cycle;
            return;
        }

        let h40 = usize::from(self.regs[12] & 0x01);
        let rate = DMA_RATES[self.dma_kind as usize][h40];

        let elapsed = cycle.saturating_sub(self.dma_last_cycle);
        self.dma_last_cycle = cycle;

        // Fixed-rate transfer with the sub-line remainder carried forward.
        let budget = elapsed * rate + self.dma_residue;
        let bytes = budget / MCYCLES_PER_LINE;
        self.dma_residue = budget % MCYCLES_PER_LINE;

        let moved = bytes.min(self.dma_length);
        if moved > 0 {
            backend.dma_step(self.dma_kind, moved);
        }
        self.dma_length -= moved;
        if self.dma_length == 0 {
            self.status &= !STATUS_DMA_BUSY;
            self.dma_residue = 0;
        }
    }

    /// Reset per-frame FIFO bookkeeping at the frame top.
    pub fn frame_fifo_reset(&mut self) {
        self.fifo_write_count = 0;
        self.fifo_last_write = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingBackend {
        dma_bytes: u32,
    }

    impl RenderBackend for CountingBackend {
        fn render_line(&mut self, _line: u16, _bg: BgMode, _obj: ObjMode) {}
        fn blank_line(&mut self, _line: u16, _x: i32, _width: i32) {}
        fn dma_step(&mut self, _kind: DmaKind, bytes: u32) {
            self.dma_bytes += bytes;
        }
    }

    #[test]
    fn reset_forces_viewport_recompute() {
        let vdp = Vdp::new(false);
        assert_eq!(vdp.viewport.changed, VIEWPORT_PENDING);
        assert_eq!(vdp.viewport.w, 256);
        assert_eq!(vdp.viewport.h, 192);
    }

    #[test]
    fn viewport_recompute_from_mode_registers() {
        let mut vdp = Vdp::new(false);
        vdp.set_register(1, 0x44); // display on, mode 5
        vdp.set_register(12, 0x01); // H40
        vdp.refresh_viewport(0);
        assert_eq!(vdp.viewport.w, 320);
        assert_eq!(vdp.viewport.h, 224);
        assert_eq!(vdp.viewport.changed & VIEWPORT_PENDING, 0);

        // 240-line mode only reachable on PAL timing
        let mut pal = Vdp::new(true);
        pal.set_register(1, 0x4C);
        pal.refresh_viewport(1);
        assert_eq!(pal.viewport.h, 240);
        assert_eq!(pal.viewport.y, 24);
    }

    #[test]
    fn renderer_modes_resolved_once() {
        let mut vdp = Vdp::new(false);
        vdp.set_register(1, 0x04);
        vdp.set_register(12, 0x0E); // interlace mode 2 + shadow
        vdp.set_register(11, 0x04); // column scroll
        vdp.refresh_viewport(0);
        // First refresh flips the interlace flag; modes follow it.
        assert!(vdp.interlaced);
        assert!(vdp.im2);
        assert_eq!(vdp.bg_mode(), BgMode::ColumnScrollInterlace2);
        assert_eq!(vdp.obj_mode(), ObjMode::ShadowInterlace2);
    }

    #[test]
    fn size_register_write_defers_to_frame_top() {
        let mut vdp = Vdp::new(false);
        vdp.refresh_viewport(0);
        vdp.set_register(12, 0x01);
        // Not applied yet
        assert_eq!(vdp.viewport.w, 256);
        assert_ne!(vdp.viewport.changed & VIEWPORT_PENDING, 0);
        vdp.refresh_viewport(0);
        assert_eq!(vdp.viewport.w, 320);
    }

    #[test]
    fn reported_size_latches_once() {
        let mut vdp = Vdp::new(false);
        vdp.refresh_viewport(0);
        vdp.viewport.changed = 0;
        vdp.set_register(12, 0x01);
        vdp.refresh_viewport(0);
        vdp.latch_reported_size();
        assert_ne!(vdp.viewport.changed & VIEWPORT_DIMS_CHANGED, 0);
        vdp.viewport.changed = 0;
        vdp.latch_reported_size();
        assert_eq!(vdp.viewport.changed, 0);
    }

    #[test]
    fn dma_progresses_at_line_rate() {
        let mut vdp = Vdp::new(false);
        let mut backend = CountingBackend { dma_bytes: 0 };
        vdp.start_dma(0, DmaKind::MemoryToVideo, 1000);
        assert_ne!(vdp.status & STATUS_DMA_BUSY, 0);

        // One full H32 line moves 167 bytes.
        vdp.update_dma(MCYCLES_PER_LINE, &mut backend);
        assert_eq!(backend.dma_bytes, 167);
        assert_eq!(vdp.dma_length, 833);

        // Run long enough to finish; busy flag drops.
        vdp.update_dma(MCYCLES_PER_LINE * 20, &mut backend);
        assert_eq!(backend.dma_bytes, 1000);
        assert_eq!(vdp.status & STATUS_DMA_BUSY, 0);
    }

    #[test]
    fn control_port_register_write() {
        let mut vdp = Vdp::new(false);
        vdp.write_control_byte(0x18); // value
        vdp.write_control_byte(0x8A); // register 10
        assert_eq!(vdp.regs[10], 0x18);
    }

    #[test]
    fn status_read_clears_vint_flag() {
        let mut vdp = Vdp::new(false);
        vdp.status |= STATUS_VINT;
        let value = vdp.read_status();
        assert_ne!(value & STATUS_VINT, 0);
        assert_eq!(vdp.status & STATUS_VINT, 0);
    }

    #[test]
    fn data_writes_track_fifo() {
        let mut vdp = Vdp::new(false);
        assert_ne!(vdp.status & STATUS_FIFO_EMPTY, 0);
        for cycle in 0..4 {
            vdp.write_data_byte(cycle, 0);
        }
        assert_eq!(vdp.status & STATUS_FIFO_EMPTY, 0);
        assert_ne!(vdp.status & STATUS_FIFO_FULL, 0);
        assert_eq!(vdp.fifo_write_count, 4);
        vdp.frame_fifo_reset();
        assert_eq!(vdp.fifo_write_count, 0);
    }
}
