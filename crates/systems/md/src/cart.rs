//! Cartridge slot and bank-switch mapper hardware.
//!
//! The sub-CPU bus is modeled as 64 pages of 1 KiB. Writing a frame
//! control register recomputes the affected window of the read map (and,
//! for the RAM windows, the write map) to point into cartridge ROM at
//! `(page % total_pages) * page_size`; oversized page indices wrap, which
//! titles rely on. Unmapped writes land in a discard buffer and unmapped
//! reads always return `0xFF` (open bus).

use crate::db::{self, CartridgeProfile};
use crc::Crc;
use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CRC32: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// Bank-switch hardware family, inferred from the checksum database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MapperKind {
    /// No banking hardware; the ROM window is fixed.
    Linear,
    /// Standard board: control registers at $FFFC-$FFFF, 16 KiB pages,
    /// optional battery RAM windows.
    #[default]
    Sega,
    /// Codemasters board: control registers at $0000/$4000/$8000.
    Codemasters,
    /// Korean board: single control register at $A000.
    Korea,
    /// MSX-style board: 8 KiB pages, control registers at $0000-$0003.
    Msx,
}

impl MapperKind {
    /// Active page granularity for this family.
    pub fn page_size(self) -> usize {
        match self {
            MapperKind::Msx => 0x2000,
            _ => 0x4000,
        }
    }
}

/// One 1 KiB page of the sub-CPU bus map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageRef {
    Rom(u32),
    ExtRam(u32),
    WorkRam(u16),
    OpenBus,
}

/// Cartridge load failures; fatal, no partial state is created.
#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("ROM image too small ({0} bytes)")]
    TooSmall(usize),
}

/// Cartridge slot: ROM, battery RAM and the live bus mapping.
pub struct CartSlot {
    rom: Vec<u8>,
    crc: u32,
    profile: CartridgeProfile,
    kind: MapperKind,

    ext_ram: Box<[u8; 0x8000]>,
    ext_ram_dirty: bool,

    /// Discard buffer for writes to unmapped space.
    junk: [u8; 0x400],

    read_map: [PageRef; 64],
    write_map: [PageRef; 64],

    /// Frame control registers, one per page slot.
    fcr: [u8; 4],

    slot_enabled: bool,
}

impl CartSlot {
    /// Resolve the cartridge profile and build the power-on mapping.
    pub fn load(rom: Vec<u8>) -> Result<Self, CartridgeError> {
        if rom.len() < 0x4000 {
            return Err(CartridgeError::TooSmall(rom.len()));
        }

        let crc = CRC32.checksum(&rom);
        let profile = db::profile_for(crc);
        log(LogCategory::Mapper, LogLevel::Info, || {
            format!(
                "cartridge crc {:08X}, mapper {:?}, region {:?}",
                crc, profile.mapper, profile.region
            )
        });

        let mut slot = Self {
            rom,
            crc,
            profile,
            kind: profile.mapper,
            ext_ram: Box::new([0; 0x8000]),
            ext_ram_dirty: false,
            junk: [0xFF; 0x400],
            read_map: [PageRef::OpenBus; 64],
            write_map: [PageRef::OpenBus; 64],
            fcr: [0; 4],
            slot_enabled: true,
        };
        slot.reset();
        Ok(slot)
    }

    /// Placeholder slot used before any cartridge is mounted.
    pub(crate) fn empty() -> Self {
        let mut slot = Self {
            rom: vec![0xFF; 0x8000],
            crc: 0,
            profile: CartridgeProfile::default(),
            kind: MapperKind::Sega,
            ext_ram: Box::new([0; 0x8000]),
            ext_ram_dirty: false,
            junk: [0xFF; 0x400],
            read_map: [PageRef::OpenBus; 64],
            write_map: [PageRef::OpenBus; 64],
            fcr: [0; 4],
            slot_enabled: true,
        };
        slot.reset();
        slot
    }

    pub fn checksum(&self) -> u32 {
        self.crc
    }

    pub fn profile(&self) -> &CartridgeProfile {
        &self.profile
    }

    pub fn kind(&self) -> MapperKind {
        self.kind
    }

    pub fn frame_control_regs(&self) -> [u8; 4] {
        self.fcr
    }

    #[cfg(test)]
    pub(crate) fn force_profile(&mut self, profile: CartridgeProfile) {
        self.profile = profile;
        self.kind = profile.mapper;
        self.reset();
    }

    /// Region for this cartridge; the FM-unit override wins over the table.
    pub fn detect_region(&self, fm_enabled: bool) -> db::Region {
        db::region_for(self.crc, fm_enabled)
    }

    /// Battery-backed external RAM contents.
    pub fn backup_ram(&self) -> &[u8] {
        &self.ext_ram[..]
    }

    pub fn restore_backup_ram(&mut self, data: &[u8]) {
        let len = data.len().min(self.ext_ram.len());
        self.ext_ram[..len].copy_from_slice(&data[..len]);
    }

    /// True when external RAM changed since the last call.
    pub fn take_backup_dirty(&mut self) -> bool {
        std::mem::take(&mut self.ext_ram_dirty)
    }

    /// Power-on / reset mapping: first 32 KiB of ROM mirrored over the
    /// cartridge window, work RAM mirrored over the top 16 KiB.
    pub fn reset(&mut self) {
        self.junk = [0xFF; 0x400];
        self.slot_enabled = true;
        self.map_default();

        self.fcr = match self.kind {
            MapperKind::Linear | MapperKind::Sega => [0, 0, 1, 2],
            _ => [0, 0, 1, 0],
        };
        self.apply_pages();
    }

    fn map_default(&mut self) {
        for i in 0x00..0x30 {
            self.read_map[i] = self.rom_page_1k(i);
            self.write_map[i] = PageRef::OpenBus;
        }
        for i in 0x30..0x40 {
            let base = ((i as u16) & 0x07) << 10;
            self.read_map[i] = PageRef::WorkRam(base);
            self.write_map[i] = PageRef::WorkRam(base);
        }
    }

    fn rom_page_1k(&self, index: usize) -> PageRef {
        let pages_1k = (self.rom.len() >> 10).max(1) as u32;
        PageRef::Rom((((index as u32) & 0x1F) % pages_1k) << 10)
    }

    /// Re-apply the frame control registers to rebuild the live mapping
    /// (reset and savestate restore paths).
    pub fn apply_pages(&mut self) {
        let fcr = self.fcr;
        if self.kind != MapperKind::Msx {
            for (slot, &value) in fcr.iter().enumerate() {
                self.page_16k(slot, value);
            }
        } else {
            for (slot, &value) in fcr.iter().enumerate() {
                self.page_8k(slot, value);
            }
        }
    }

    /// Restore frame control registers from a savestate; the registers are
    /// re-applied so the live mapping is rebuilt, not just stored.
    pub fn restore_frame_control_regs(&mut self, fcr: [u8; 4]) {
        self.fcr = fcr;
        self.apply_pages();
    }

    /// Enable or disable the cartridge slot (memory control port). The
    /// disabled window reads open bus.
    pub fn set_slot_enabled(&mut self, enabled: bool) {
        self.slot_enabled = enabled;
        if enabled {
            for i in 0x00..0x30 {
                self.read_map[i] = self.rom_page_1k(i);
                self.write_map[i] = PageRef::OpenBus;
            }
            self.apply_pages();
        } else {
            for i in 0x00..0x30 {
                self.read_map[i] = PageRef::OpenBus;
                self.write_map[i] = PageRef::OpenBus;
            }
        }
    }

    pub fn slot_enabled(&self) -> bool {
        self.slot_enabled
    }

    /// Sub-CPU bus read.
    pub fn read(&self, ram: &[u8], addr: u16) -> u8 {
        match self.read_map[(addr >> 10) as usize] {
            PageRef::Rom(base) => {
                let index = (base | ((addr as u32) & 0x3FF)) as usize;
                self.rom.get(index).copied().unwrap_or(0xFF)
            }
            PageRef::ExtRam(base) => self.ext_ram[(base | ((addr as u32) & 0x3FF)) as usize],
            PageRef::WorkRam(base) => ram[(base | (addr & 0x3FF)) as usize],
            PageRef::OpenBus => 0xFF,
        }
    }

    /// Sub-CPU bus write: control-register windows update the mapping,
    /// everything else falls through to the write map.
    pub fn write(&mut self, ram: &mut [u8], addr: u16, data: u8) {
        match self.kind {
            MapperKind::Linear => {}
            MapperKind::Sega => {
                if addr >= 0xFFFC {
                    self.page_16k((addr & 3) as usize, data);
                    // Control registers sit over RAM; the write lands there too.
                }
            }
            MapperKind::Codemasters => match addr {
                0x0000 => return self.page_16k(1, data),
                0x4000 => return self.page_16k(2, data),
                0x8000 => return self.page_16k(3, data),
                _ => {}
            },
            MapperKind::Korea => {
                if addr == 0xA000 {
                    return self.page_16k(3, data);
                }
            }
            MapperKind::Msx => {
                if addr <= 0x0003 {
                    return self.page_8k(addr as usize, data);
                }
            }
        }
        self.poke(ram, addr, data);
    }

    fn poke(&mut self, ram: &mut [u8], addr: u16, data: u8) {
        match self.write_map[(addr >> 10) as usize] {
            PageRef::WorkRam(base) => ram[(base | (addr & 0x3FF)) as usize] = data,
            PageRef::ExtRam(base) => {
                self.ext_ram[(base | ((addr as u32) & 0x3FF)) as usize] = data;
                self.ext_ram_dirty = true;
            }
            PageRef::Rom(_) | PageRef::OpenBus => {
                self.junk[(addr & 0x3FF) as usize] = data;
            }
        }
    }

    fn total_pages_16k(&self) -> u32 {
        ((self.rom.len() >> 14) as u32).max(1)
    }

    /// 16 KiB page-slot write.
    fn page_16k(&mut self, slot: usize, data: u8) {
        let total = self.total_pages_16k();
        let mut page = data as u32 % total;

        // Documented hardware quirk: the low bits of control register 0
        // shift the page index before it is applied.
        if self.fcr[0] & 0x03 != 0 {
            page = (page + ((4 - (self.fcr[0] & 0x03) as u32) << 3)) % total;
        }

        self.fcr[slot] = data;

        match slot {
            0 => {
                if data & 0x08 != 0 {
                    // External RAM (upper or lower 16K) at $8000-$BFFF
                    let half = ((data as u32) & 0x04) << 12;
                    for i in 0x20..0x30usize {
                        let offset = half + (((i as u32) & 0x0F) << 10);
                        self.read_map[i] = PageRef::ExtRam(offset);
                        self.write_map[i] = PageRef::ExtRam(offset);
                    }
                } else {
                    let mut page = self.fcr[3] as u32 % total;
                    if data & 0x03 != 0 {
                        page = (page + ((4 - (data & 0x03) as u32) << 3)) % total;
                    }
                    for i in 0x20..0x30usize {
                        self.read_map[i] =
                            PageRef::Rom((page << 14) | (((i as u32) & 0x0F) << 10));
                        self.write_map[i] = PageRef::OpenBus;
                    }
                }

                if data & 0x10 != 0 {
                    // External RAM (lower 16K) over the work RAM window
                    for i in 0x30..0x40usize {
                        let offset = ((i as u32) & 0x0F) << 10;
                        self.read_map[i] = PageRef::ExtRam(offset);
                        self.write_map[i] = PageRef::ExtRam(offset);
                    }
                } else {
                    for i in 0x30..0x40usize {
                        let base = ((i as u16) & 0x07) << 10;
                        self.read_map[i] = PageRef::WorkRam(base);
                        self.write_map[i] = PageRef::WorkRam(base);
                    }
                }
            }
            1 => {
                // First 1K stays fixed except on the Codemasters board
                if self.kind == MapperKind::Codemasters {
                    self.read_map[0] = PageRef::Rom(page << 14);
                }
                for i in 0x01..0x10usize {
                    self.read_map[i] = PageRef::Rom((page << 14) | (((i as u32) & 0x0F) << 10));
                }
            }
            2 => {
                for i in 0x10..0x20usize {
                    self.read_map[i] = PageRef::Rom((page << 14) | (((i as u32) & 0x0F) << 10));
                }

                // Codemasters external RAM switch at $A000-$BFFF
                if self.kind == MapperKind::Codemasters {
                    if data & 0x80 != 0 {
                        for i in 0x28..0x30usize {
                            let offset = ((i as u32) & 0x0F) << 10;
                            self.read_map[i] = PageRef::ExtRam(offset);
                            self.write_map[i] = PageRef::ExtRam(offset);
                        }
                    } else {
                        let page = self.fcr[3] as u32 % total;
                        for i in 0x28..0x30usize {
                            self.read_map[i] =
                                PageRef::Rom((page << 14) | (((i as u32) & 0x0F) << 10));
                            self.write_map[i] = PageRef::OpenBus;
                        }
                    }
                }
            }
            3 => {
                // External RAM mapped over this window wins
                if self.fcr[0] & 0x08 != 0 {
                    return;
                }
                for i in 0x20..0x28usize {
                    self.read_map[i] = PageRef::Rom((page << 14) | (((i as u32) & 0x0F) << 10));
                }
                if self.kind == MapperKind::Codemasters && self.fcr[2] & 0x80 != 0 {
                    return;
                }
                for i in 0x28..0x30usize {
                    self.read_map[i] = PageRef::Rom((page << 14) | (((i as u32) & 0x0F) << 10));
                }
            }
            _ => {}
        }
    }

    /// 8 KiB page-slot write (MSX-style board).
    fn page_8k(&mut self, slot: usize, data: u8) {
        let total = ((self.rom.len() >> 13) as u32).max(1);
        let page = data as u32 % total;

        self.fcr[slot] = data;

        let window = match slot & 3 {
            0 => 0x20..0x28usize, // $8000-$9FFF
            1 => 0x28..0x30usize, // $A000-$BFFF
            2 => 0x10..0x18usize, // $4000-$5FFF
            _ => 0x18..0x20usize, // $6000-$7FFF
        };
        for i in window {
            self.read_map[i] = PageRef::Rom((page << 13) | (((i as u32) & 0x07) << 10));
        }
    }

    /// Main-CPU bus read of the linear ROM image (16-bit console variant).
    pub fn main_read8(&self, addr: u32) -> u8 {
        self.rom.get(addr as usize).copied().unwrap_or(0xFF)
    }

    pub fn main_read16(&self, addr: u32) -> u16 {
        let hi = self.main_read8(addr) as u16;
        let lo = self.main_read8(addr + 1) as u16;
        (hi << 8) | lo
    }
}
