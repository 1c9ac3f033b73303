//! Cartridge checksum database.
//!
//! Titles that need a non-default mapper, region timing, peripheral or a
//! special behavior flag are identified by ROM checksum at load time. The
//! scan is a flat first-match lookup; anything absent falls back to the
//! most permissive defaults (standard mapper, US region, gamepad).

use crate::cart::MapperKind;
use serde::{Deserialize, Serialize};

/// Console region, also encoded into the version port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Region {
    JapanNtsc,
    JapanPal,
    #[default]
    Usa,
    Europe,
}

impl Region {
    /// Region bits as read back through the version port.
    pub fn code(self) -> u8 {
        match self {
            Region::JapanNtsc => 0x00,
            Region::JapanPal => 0x40,
            Region::Usa => 0x80,
            Region::Europe => 0xC0,
        }
    }

    pub fn is_pal(self) -> bool {
        matches!(self, Region::JapanPal | Region::Europe)
    }
}

/// Peripheral a title expects in port A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Peripheral {
    #[default]
    Gamepad,
    LightGun,
    Paddle,
    SportsPad,
}

/// One database row.
pub struct RomInfo {
    pub crc: u32,
    pub glasses_3d: bool,
    pub fm: bool,
    pub peripheral: Peripheral,
    pub mapper: MapperKind,
    pub region: Region,
}

/// Resolved load-time profile; immutable for the cartridge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartridgeProfile {
    pub mapper: MapperKind,
    pub region: Region,
    pub peripheral: Peripheral,
    pub glasses_3d: bool,
    pub fm: bool,
}

impl Default for CartridgeProfile {
    fn default() -> Self {
        Self {
            mapper: MapperKind::Sega,
            region: Region::Usa,
            peripheral: Peripheral::Gamepad,
            glasses_3d: false,
            fm: false,
        }
    }
}

const fn entry(
    crc: u32,
    glasses_3d: bool,
    fm: bool,
    peripheral: Peripheral,
    mapper: MapperKind,
    region: Region,
) -> RomInfo {
    RomInfo {
        crc,
        glasses_3d,
        fm,
        peripheral,
        mapper,
        region,
    }
}

use MapperKind::{Codemasters, Korea, Linear, Msx, Sega};
use Peripheral::{Gamepad, LightGun, Paddle, SportsPad};
use Region::{Europe, JapanNtsc, Usa};

/// Game database, scanned front to back; first match wins.
pub static GAME_DB: &[RomInfo] = &[
    // Titles on the Codemasters board
    entry(0x29822980, false, false, Gamepad, Codemasters, Europe), // Cosmic Spacehead
    entry(0xA577CE46, false, false, Gamepad, Codemasters, Europe), // Micro Machines
    entry(0xF7C524F6, false, false, Gamepad, Codemasters, Europe), // Micro Machines [bad dump]
    entry(0xDBE8895C, false, false, Gamepad, Codemasters, Europe), // Micro Machines 2
    entry(0xC1756BEE, false, false, Gamepad, Codemasters, Europe), // Pete Sampras Tennis
    entry(0x8813514B, false, false, Gamepad, Codemasters, Europe), // Excellent Dizzy [proto]
    entry(0xEA5C3A6F, false, false, Gamepad, Codemasters, Usa),    // Dinobasher [proto]
    entry(0x152F0DCC, false, false, Gamepad, Codemasters, Usa),    // Drop Zone
    entry(0xAA140C9C, false, false, Gamepad, Codemasters, Usa),    // Excellent Dizzy [SMS-GG]
    entry(0xB9664AE1, false, false, Gamepad, Codemasters, Usa),    // Fantastic Dizzy
    entry(0xC888222B, false, false, Gamepad, Codemasters, Usa),    // Fantastic Dizzy [SMS-GG]
    entry(0x76C5BDFB, false, false, Gamepad, Codemasters, Usa),    // Jang Pung 2 [SMS-GG]
    entry(0xD9A7F170, false, false, Gamepad, Codemasters, Usa),    // Man Overboard!
    // Unbanked and Korean-board titles
    entry(0x17AB6883, false, false, Gamepad, Linear, JapanNtsc), // FA Tetris (KR)
    entry(0x61E8806F, false, false, Gamepad, Linear, JapanNtsc), // Flash Point (KR)
    entry(0x445525E2, false, false, Gamepad, Msx, JapanNtsc),    // Penguin Adventure (KR)
    entry(0x83F0EEDE, false, false, Gamepad, Msx, JapanNtsc),    // Street Master (KR)
    entry(0xA05258F5, false, false, Gamepad, Msx, JapanNtsc),    // Won-Si-In (KR)
    entry(0x06965ED9, false, false, Gamepad, Msx, JapanNtsc),    // F-1 Spirit (KR)
    entry(0x89B79E77, false, false, Gamepad, Korea, JapanNtsc),  // Dodgeball King (KR)
    entry(0x18FB98A3, false, false, Gamepad, Korea, JapanNtsc),  // Jang Pung 3 (KR)
    entry(0x97D03541, false, false, Gamepad, Korea, JapanNtsc),  // Sangokushi 3 (KR)
    entry(0x67C2F0FF, false, false, Gamepad, Korea, JapanNtsc),  // Super Boy 2 (KR)
    // Titles requiring 50 Hz timing
    entry(0x72420F38, false, false, Gamepad, Sega, Europe), // Addams Family
    entry(0x2D48C1D3, false, false, Gamepad, Sega, Europe), // Back to the Future III
    entry(0x1B10A951, false, false, Gamepad, Sega, Europe), // Bram Stoker's Dracula
    entry(0xC0E25D62, false, false, Gamepad, Sega, Europe), // California Games II
    entry(0xC9DBF936, false, false, Gamepad, Sega, Europe), // Home Alone
    entry(0x0047B615, false, false, Gamepad, Sega, Europe), // Predator 2
    entry(0x9F951756, false, false, Gamepad, Sega, Europe), // RoboCop 3
    entry(0xF8176918, false, false, Gamepad, Sega, Europe), // Sensible Soccer
    entry(0x1575581D, false, false, Gamepad, Sega, Europe), // Shadow of the Beast
    entry(0x96B3F29E, false, false, Gamepad, Sega, Europe), // Sonic Blast (BR)
    entry(0x5B3B922C, false, false, Gamepad, Sega, Europe), // Sonic the Hedgehog 2 [v0]
    entry(0xD6F2BFCA, false, false, Gamepad, Sega, Europe), // Sonic the Hedgehog 2 [v1]
    entry(0xCA1D3752, false, false, Gamepad, Sega, Europe), // Space Harrier [50 Hz]
    entry(0x85CFC9C9, false, false, Gamepad, Sega, Europe), // Taito Chase H.Q.
    // Titles using the 3-D glasses
    entry(0x871562B0, true, true, Gamepad, Sega, JapanNtsc), // Maze Walker
    entry(0x156948F9, true, true, Gamepad, Sega, JapanNtsc), // Space Harrier 3-D (J)
    entry(0x6BD5C2BF, true, true, Gamepad, Sega, Usa),       // Space Harrier 3-D
    entry(0x8ECD201C, true, true, Gamepad, Sega, Usa),       // Blade Eagle 3-D
    entry(0xFBF96C81, true, true, Gamepad, Sega, Usa),       // Blade Eagle 3-D (BR)
    entry(0x58D5FC48, true, true, Gamepad, Sega, Usa),       // Blade Eagle 3-D [proto]
    entry(0x31B8040B, true, true, Gamepad, Sega, Usa),       // Maze Hunter 3-D
    entry(0xABD48AD2, true, true, Gamepad, Sega, Usa),       // Poseidon Wars 3-D
    entry(0xA3EF13CB, true, true, Gamepad, Sega, Usa),       // Zaxxon 3-D
    entry(0xBBA74147, true, true, Gamepad, Sega, Usa),       // Zaxxon 3-D [proto]
    entry(0xD6F43DDA, true, true, Gamepad, Sega, Usa),       // Out Run 3-D
    // 3-D glasses plus light gun
    entry(0xFBE5CFBB, true, false, LightGun, Sega, Usa), // Missile Defense 3-D
    entry(0xE79BB689, true, false, LightGun, Sega, Usa), // Missile Defense 3-D [BIOS]
    // Light gun titles
    entry(0x861B6E79, false, false, LightGun, Sega, Usa), // Assault City
    entry(0x5FC74D2A, false, false, LightGun, Sega, Usa), // Gangster Town
    entry(0xE167A561, false, false, LightGun, Sega, Usa), // Hang-On / Safari Hunt
    entry(0x205CAAE8, false, false, LightGun, Sega, Usa), // Operation Wolf
    entry(0xDA5A7013, false, false, LightGun, Sega, Usa), // Rambo 3
    entry(0x4B051022, false, false, LightGun, Sega, Usa), // Shooting Gallery
    entry(0xA908CFF5, false, false, LightGun, Sega, Usa), // Spacegun
    entry(0x5359762D, false, false, LightGun, Sega, Usa), // Wanted
    // Paddle titles
    entry(0xF9DBB533, false, false, Paddle, Sega, JapanNtsc), // Alex Kidd BMX Trial
    entry(0xA6FA42D0, false, false, Paddle, Sega, JapanNtsc), // Galactic Protector
    entry(0x29BC7FAD, false, false, Paddle, Sega, JapanNtsc), // Megumi Rescue
    entry(0x315917D4, false, false, Paddle, Sega, JapanNtsc), // Woody Pop
    // Sports pad titles
    entry(0x0CB7E21F, false, false, SportsPad, Sega, Usa), // Great Ice Hockey
    entry(0xE42E4998, false, false, SportsPad, Sega, Usa), // Sports Pad Football
    entry(0x41C948BF, false, false, SportsPad, Sega, Usa), // Sports Pad Soccer
    // Titles with FM sound support
    entry(0x32759751, false, true, Gamepad, Sega, JapanNtsc), // Y's (J)
    entry(0x1C951F8E, false, true, Gamepad, Sega, Usa),       // After Burner
    entry(0xC13896D5, false, true, Gamepad, Sega, Usa),       // Alex Kidd: The Lost Stars
    entry(0x5CBFE997, false, true, Gamepad, Sega, Usa),       // Alien Syndrome
    entry(0xBBA2FE98, false, true, Gamepad, Sega, Usa),       // Altered Beast
    entry(0x3084CF11, false, true, Gamepad, Sega, Usa),       // Bomber Raid
    entry(0xAC6009A7, false, true, Gamepad, Sega, Usa),       // California Games
    entry(0xA55D89F3, false, true, Gamepad, Sega, Usa),       // Double Dragon
    entry(0xB8B141F9, false, true, Gamepad, Sega, Usa),       // Fantasy Zone II
    entry(0xA51376FE, false, true, Gamepad, Sega, Usa),       // Golvellius
    entry(0x516ED32E, false, true, Gamepad, Sega, Usa),       // Kenseiden
    entry(0x0E333B6E, false, true, Gamepad, Sega, Usa),       // Miracle Warriors
    entry(0x5589D8D2, false, true, Gamepad, Sega, Usa),       // Out Run
    entry(0xF97E9875, false, true, Gamepad, Sega, Usa),       // Penguin Land
    entry(0x4077EFD9, false, true, Gamepad, Sega, Usa),       // Power Strike
    entry(0xBB54B6B0, false, true, Gamepad, Sega, Usa),       // R-Type
    entry(0xC547EB1B, false, true, Gamepad, Sega, Usa),       // Rastan
    entry(0x0C6FAC4E, false, true, Gamepad, Sega, Usa),       // Shinobi
    entry(0xAE920E4B, false, true, Gamepad, Sega, Usa),       // Thunder Blade
    entry(0x22CCA9BB, false, true, Gamepad, Sega, Usa),       // Turma da Monica (BR)
    entry(0xB52D60C8, false, true, Gamepad, Sega, Usa),       // Ultima IV
    entry(0xDFB0B161, false, true, Gamepad, Sega, Usa),       // Vigilante
    entry(0x679E1676, false, true, Gamepad, Sega, Usa),       // Wonder Boy III
    entry(0x8CBEF0C1, false, true, Gamepad, Sega, Usa),       // Wonder Boy in Monster Land
    entry(0x2F2E3BC9, false, true, Gamepad, Sega, Usa),       // Zillion II
    entry(0x48D44A13, false, true, Gamepad, Linear, JapanNtsc), // BIOS (J)
    entry(0xD8C4165B, false, true, Gamepad, Sega, JapanNtsc), // Aleste
    entry(0x4CC11DF9, false, true, Gamepad, Sega, JapanNtsc), // Alien Syndrome (J)
    entry(0x6605D36A, false, true, Gamepad, Sega, JapanNtsc), // Phantasy Star (J)
    entry(0xE1FFF1BB, false, true, Gamepad, Sega, JapanNtsc), // Shinobi (J)
    entry(0xB1DA6A30, false, true, Gamepad, Sega, JapanNtsc), // Super Wonder Boy Monster World
    entry(0xC0CE19B1, false, true, Gamepad, Sega, JapanNtsc), // Thunder Blade (J)
];

/// Flat first-match scan, mirroring the load-time lookup.
pub fn lookup(crc: u32) -> Option<&'static RomInfo> {
    GAME_DB.iter().find(|info| info.crc == crc)
}

/// Resolve the load-time profile for a checksum; defaults on no match.
pub fn profile_for(crc: u32) -> CartridgeProfile {
    match lookup(crc) {
        Some(info) => CartridgeProfile {
            mapper: info.mapper,
            region: info.region,
            peripheral: info.peripheral,
            glasses_3d: info.glasses_3d,
            fm: info.fm,
        },
        None => CartridgeProfile::default(),
    }
}

/// Region auto-detection against the same table.
///
/// Two titles enable FM sound on Japanese hardware only; when the FM unit
/// is configured, that override takes precedence over the table row.
pub fn region_for(crc: u32, fm_enabled: bool) -> Region {
    if fm_enabled && (crc == 0x22CCA9BB || crc == 0x679E1676) {
        return Region::JapanNtsc;
    }
    match lookup(crc) {
        Some(info) => info.region,
        None => Region::Usa,
    }
}
