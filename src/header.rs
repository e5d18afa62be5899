//! Story header layout and live-memory reset

use byteorder::{BigEndian, ByteOrder};

use crate::config::InterpreterConfig;
use crate::console::{Attr, Console};
use crate::consts::HEADER_SIZE;
use crate::error::{Fault, VmError};
use crate::memory::{Address, Memory};

/// Byte offsets of the header fields.
pub mod offset {
    /// Version number.
    pub const VERSION: u32 = 0x00;
    /// Flags 1.
    pub const FLAGS1: u32 = 0x01;
    /// Release number.
    pub const RELEASE: u32 = 0x02;
    /// Byte address of high memory.
    pub const HIMEM: u32 = 0x04;
    /// Byte address of the first instruction.
    pub const INIT_PC: u32 = 0x06;
    /// Byte address of the dictionary.
    pub const DICT: u32 = 0x08;
    /// Byte address of the object table.
    pub const OBJ: u32 = 0x0A;
    /// Byte address of the global variables.
    pub const GLOB: u32 = 0x0C;
    /// Byte address of static memory.
    pub const STAT: u32 = 0x0E;
    /// Flags 2.
    pub const FLAGS2: u32 = 0x10;
    /// Serial number (6 bytes).
    pub const SERIAL: u32 = 0x12;
    /// Byte address of the abbreviations table.
    pub const ABBR: u32 = 0x18;
    /// Length of the story, scaled by the version.
    pub const LENGTH: u32 = 0x1A;
    /// Checksum over the bytes after the header.
    pub const CHECKSUM: u32 = 0x1C;
    /// Interpreter number.
    pub const INTERP_NUMBER: u32 = 0x1E;
    /// Interpreter version.
    pub const INTERP_VERSION: u32 = 0x1F;
    /// Screen height in lines.
    pub const SCREEN_LINES: u32 = 0x20;
    /// Screen width in characters.
    pub const SCREEN_COLS: u32 = 0x21;
    /// Screen width in units.
    pub const SCREEN_WIDTH: u32 = 0x22;
    /// Screen height in units.
    pub const SCREEN_HEIGHT: u32 = 0x24;
    /// Font height in units.
    pub const FONT_HEIGHT: u32 = 0x26;
    /// Font width in units.
    pub const FONT_WIDTH: u32 = 0x27;
    /// Routines offset (v6-7).
    pub const ROUTINES: u32 = 0x28;
    /// Static strings offset (v6-7).
    pub const STRINGS: u32 = 0x2A;
    /// Default background colour.
    pub const BG_COLOUR: u32 = 0x2C;
    /// Default foreground colour.
    pub const FG_COLOUR: u32 = 0x2D;
    /// Standard revision number.
    pub const STANDARD_REVISION: u32 = 0x32;
    /// Alternate alphabet table address (v5+).
    pub const ALPHABET_TABLE: u32 = 0x34;
}

/// Immutable snapshot of the story header fields the interpreter needs.
///
/// The live header bytes stay in dynamic memory where the story can read
/// them; this copy carries the load-time values used for address decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Version number, 1..=8.
    pub version: u8,
    /// Flags 1 as loaded.
    pub flags1: u8,
    /// Release number.
    pub release: u16,
    /// Base of high memory.
    pub himem: u16,
    /// Entry point, packed in v6.
    pub init_pc: u16,
    /// Dictionary address.
    pub dict: u16,
    /// Object table address.
    pub obj: u16,
    /// Global variables address.
    pub glob: u16,
    /// Base of static memory.
    pub stat: u16,
    /// Serial number.
    pub serial: [u8; 6],
    /// Abbreviations table address.
    pub abbr: u16,
    /// Story length, scaled by the version shift.
    pub length: u16,
    /// Declared checksum.
    pub checksum: u16,
    /// Routines offset (v6-7).
    pub routines: u16,
    /// Static strings offset (v6-7).
    pub strings: u16,
    /// Alternate alphabet table address, zero for the builtin table.
    pub alphabet_table: u16,
}

impl Header {
    /// Parse the fixed-size header from the start of a story image.
    pub fn parse(bytes: &[u8]) -> Result<Self, VmError> {
        if bytes.len() < HEADER_SIZE {
            return Err(VmError::NotRecognised);
        }
        let word = |o: u32| BigEndian::read_u16(&bytes[o as usize..]);
        let mut serial = [0u8; 6];
        serial.copy_from_slice(&bytes[offset::SERIAL as usize..offset::SERIAL as usize + 6]);
        Ok(Self {
            version: bytes[offset::VERSION as usize],
            flags1: bytes[offset::FLAGS1 as usize],
            release: word(offset::RELEASE),
            himem: word(offset::HIMEM),
            init_pc: word(offset::INIT_PC),
            dict: word(offset::DICT),
            obj: word(offset::OBJ),
            glob: word(offset::GLOB),
            stat: word(offset::STAT),
            serial,
            abbr: word(offset::ABBR),
            length: word(offset::LENGTH),
            checksum: word(offset::CHECKSUM),
            routines: word(offset::ROUTINES),
            strings: word(offset::STRINGS),
            alphabet_table: word(offset::ALPHABET_TABLE),
        })
    }

    /// Whether the version is one this interpreter supports.
    pub const fn is_version_valid(&self) -> bool {
        self.version >= 1 && self.version <= 8
    }

    /// Story size in bytes, derived from the scaled length field.
    pub fn story_size(&self) -> u32 {
        let length = u32::from(self.length);
        match self.version {
            1..=3 => length << 1,
            4 | 5 => length << 2,
            6..=8 => length << 3,
            _ => 0,
        }
    }

    /// Memory limit in bytes for this version.
    pub fn memory_limit(&self) -> usize {
        match self.version {
            1..=3 => 128 * 1024,
            4 | 5 => 256 * 1024,
            7 => 320 * 1024,
            6 | 8 => 512 * 1024,
            _ => 0,
        }
    }

    /// Convert a 16-bit packed address to a byte address.
    pub fn unpack_addr(&self, packed: u16, routine: bool) -> Address {
        let packed = Address::from(packed);
        match self.version {
            1..=3 => packed << 1,
            4 | 5 => packed << 2,
            6 | 7 => {
                let base = if routine { self.routines } else { self.strings };
                (packed << 2) + (Address::from(base) << 3)
            }
            8 => packed << 3,
            _ => 0,
        }
    }

    /// Address of the first instruction.
    pub fn entry_point(&self) -> Address {
        if self.version == 6 {
            // v6 stories enter through a routine; skip its local count.
            self.unpack_addr(self.init_pc, true) + 1
        } else {
            Address::from(self.init_pc)
        }
    }

    /// Whether this is a v3 "time game" showing a clock on the status line.
    pub const fn is_time_game(&self) -> bool {
        self.version == 3 && self.flags1 & (1 << 1) != 0
    }
}

/// Rewrite the interpreter-owned header fields in live memory.
///
/// Called at reset and after every restore, as the save file carries the
/// previous interpreter's values.
pub fn reset(
    memory: &mut Memory,
    console: &dyn Console,
    config: &InterpreterConfig,
    version: u8,
) -> Result<(), Fault> {
    let mut flags1 = memory.read8(offset::FLAGS1)?;
    if version <= 3 {
        if !config.status_line {
            flags1 |= 1 << 4;
        }
        if config.screen_splitting {
            flags1 |= 1 << 5;
        }
        if config.var_pitch_font {
            flags1 |= 1 << 6;
        }
    } else {
        if console.attr(Attr::Bold) != 0 {
            flags1 |= 1 << 2;
        }
        if console.attr(Attr::Italic) != 0 {
            flags1 |= 1 << 3;
        }
        if console.attr(Attr::FixedFont) != 0 {
            flags1 |= 1 << 4;
        }
        if console.attr(Attr::ReadTimeout) != 0 {
            flags1 |= 1 << 7;
        }
        if version >= 5 && console.attr(Attr::Colours) != 0 {
            flags1 |= 1 << 0;
        }
        if version >= 6 {
            if config.pictures {
                flags1 |= 1 << 1;
            }
            if config.sounds {
                flags1 |= 1 << 5;
            }
        }
    }
    memory.write8(offset::FLAGS1, flags1)?;

    if version >= 5 {
        let mut flags2 = memory.read16(offset::FLAGS2)?;
        if !config.pictures {
            flags2 &= !(1 << 3);
        }
        if !config.undo {
            flags2 &= !(1 << 4);
        }
        if !config.mouse {
            flags2 &= !(1 << 5);
        }
        if !config.sounds {
            flags2 &= !(1 << 7);
        }
        if !config.menus {
            flags2 &= !(1 << 8);
        }
        memory.write16(offset::FLAGS2, flags2)?;
    }

    if version >= 4 {
        memory.write8(offset::INTERP_NUMBER, 0)?;
        memory.write8(offset::INTERP_VERSION, b'A')?;
    }

    let lines = console.attr(Attr::Lines) as u16;
    let cols = console.attr(Attr::Cols) as u16;
    let font_height = console.attr(Attr::FontHeight) as u16;
    let font_width = console.attr(Attr::FontWidth) as u16;

    memory.write8(offset::SCREEN_LINES, lines as u8)?;
    memory.write8(offset::SCREEN_COLS, cols as u8)?;
    memory.write8(offset::FONT_HEIGHT, font_height as u8)?;
    memory.write8(offset::FONT_WIDTH, font_width as u8)?;

    if version >= 5 {
        memory.write16(offset::SCREEN_WIDTH, cols * font_width)?;
        memory.write16(offset::SCREEN_HEIGHT, lines * font_height)?;
    }

    memory.write8(offset::BG_COLOUR, 2)?;
    memory.write8(offset::FG_COLOUR, 9)?;

    let revision = u16::from(config.standard_major) << 8 | u16::from(config.standard_minor);
    memory.write16(offset::STANDARD_REVISION, revision)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn header_with(version: u8, length: u16) -> Header {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[offset::VERSION as usize] = version;
        BigEndian::write_u16(&mut bytes[offset::LENGTH as usize..], length);
        BigEndian::write_u16(&mut bytes[offset::ROUTINES as usize..], 0x0010);
        BigEndian::write_u16(&mut bytes[offset::STRINGS as usize..], 0x0020);
        Header::parse(&bytes).unwrap()
    }

    #[rstest]
    #[case(1, 0x1800, 0x3000)]
    #[case(3, 0x1800, 0x3000)]
    #[case(4, 0x1800, 0x6000)]
    #[case(5, 0x1800, 0x6000)]
    #[case(8, 0x1800, 0xC000)]
    fn story_size_uses_the_version_shift(#[case] version: u8, #[case] length: u16, #[case] size: u32) {
        assert_eq!(header_with(version, length).story_size(), size);
    }

    #[rstest]
    #[case(3, 0x0800, false, 0x1000)]
    #[case(5, 0x0800, false, 0x2000)]
    #[case(8, 0x0800, false, 0x4000)]
    fn unpack_scales_by_version(#[case] version: u8, #[case] packed: u16, #[case] routine: bool, #[case] addr: u32) {
        assert_eq!(header_with(version, 0).unpack_addr(packed, routine), addr);
    }

    #[test]
    fn unpack_v7_adds_the_section_base() {
        let header = header_with(7, 0);
        assert_eq!(header.unpack_addr(0x0100, true), (0x0100 << 2) + (0x0010 << 3));
        assert_eq!(header.unpack_addr(0x0100, false), (0x0100 << 2) + (0x0020 << 3));
    }

    #[test]
    fn short_input_is_rejected() {
        assert!(Header::parse(&[0u8; 32]).is_err());
    }
}
