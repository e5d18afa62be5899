//! Packed Z-string decoder and dictionary-key encoder

use crate::error::Fault;
use crate::header::Header;
use crate::memory::{Address, Memory};

// Alphabet rows A0/A1/A2, 26 characters each [3.5].
const ALPHABET_V1: &[u8; 78] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ 0123456789.,!?_#'\"/\\<-:()";
const ALPHABET_V2: &[u8; 78] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ \n0123456789.,!?_#'\"/\\-:()";

#[derive(Debug, Clone, Copy)]
enum Alphabet {
    V1,
    V2,
    /// Header-addressed 78-byte table (v5+).
    Custom(Address),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Normal,
    /// Next Z-character picks an abbreviation from bank 1..=3.
    Abbr(u8),
    ZsciiHigh,
    ZsciiLow,
}

/// Stateful text codec for one story.
///
/// Decoding walks 16-bit words, three 5-bit Z-characters each, until the
/// terminator bit; abbreviations expand recursively but may not nest.
/// Decoded output is collected rather than streamed so callers are free to
/// route it into memory-backed output streams.
#[derive(Debug, Clone)]
pub struct Text {
    version: u8,
    abbr_table: u16,
    alphabet: Alphabet,
}

struct Decoder {
    alphabet: u8,
    shift_lock: u8,
    state: DecodeState,
    zscii_high: u16,
    allow_abbr: bool,
}

impl Decoder {
    fn new(allow_abbr: bool) -> Self {
        // Every string starts in A0 [3.2.1].
        Self {
            alphabet: 0,
            shift_lock: 0,
            state: DecodeState::Normal,
            zscii_high: 0,
            allow_abbr,
        }
    }
}

impl Text {
    /// Build the codec for a story header.
    pub fn new(header: &Header) -> Self {
        let alphabet = if header.version == 1 {
            Alphabet::V1
        } else if header.version >= 5 && header.alphabet_table != 0 {
            Alphabet::Custom(Address::from(header.alphabet_table))
        } else {
            Alphabet::V2
        };
        Self {
            version: header.version,
            abbr_table: header.abbr,
            alphabet,
        }
    }

    /// Number of Z-characters in a dictionary key.
    pub const fn key_length(&self) -> usize {
        if self.version <= 3 {
            6
        } else {
            9
        }
    }

    fn alpha(&self, memory: &Memory, index: usize) -> Result<u16, Fault> {
        match self.alphabet {
            Alphabet::V1 => Ok(u16::from(ALPHABET_V1[index])),
            Alphabet::V2 => Ok(u16::from(ALPHABET_V2[index])),
            Alphabet::Custom(addr) => Ok(u16::from(memory.read8(addr + index as Address)?)),
        }
    }

    /// Decode the Z-string at `addr`; returns the ZSCII characters and the
    /// address just past the terminating word.
    pub fn decode_string(&self, memory: &Memory, addr: Address) -> Result<(Vec<u16>, Address), Fault> {
        let mut out = Vec::new();
        let end = self.decode_into(memory, addr, true, &mut out)?;
        Ok((out, end))
    }

    fn decode_into(
        &self,
        memory: &Memory,
        mut addr: Address,
        allow_abbr: bool,
        out: &mut Vec<u16>,
    ) -> Result<Address, Fault> {
        let mut decoder = Decoder::new(allow_abbr);
        loop {
            let word = memory.read16(addr)?;
            addr += 2;
            for shift in [10u16, 5, 0] {
                let zchar = ((word >> shift) & 0x1F) as u8;
                self.decode_zchar(&mut decoder, memory, zchar, out)?;
            }
            if word & 0x8000 != 0 {
                return Ok(addr);
            }
        }
    }

    fn expand_abbr(&self, memory: &Memory, index: u16, out: &mut Vec<u16>) -> Result<(), Fault> {
        let entry = Address::from(self.abbr_table) + Address::from(index) * 2;
        let abbr_addr = Address::from(memory.read16(entry)?) * 2;
        // Abbreviations decode from A0 and may not contain abbreviations.
        self.decode_into(memory, abbr_addr, false, out)?;
        Ok(())
    }

    fn decode_zchar(
        &self,
        d: &mut Decoder,
        memory: &Memory,
        zchar: u8,
        out: &mut Vec<u16>,
    ) -> Result<(), Fault> {
        match d.state {
            DecodeState::Abbr(bank) => {
                d.state = DecodeState::Normal;
                let index = u16::from(bank - 1) * 32 + u16::from(zchar);
                self.expand_abbr(memory, index, out)?;
                d.alphabet = d.shift_lock;
                return Ok(());
            }
            DecodeState::ZsciiHigh => {
                d.zscii_high = u16::from(zchar);
                d.state = DecodeState::ZsciiLow;
                return Ok(());
            }
            DecodeState::ZsciiLow => {
                out.push(d.zscii_high << 5 | u16::from(zchar));
                d.state = DecodeState::Normal;
                d.alphabet = d.shift_lock;
                return Ok(());
            }
            DecodeState::Normal => {}
        }

        match zchar {
            0 => out.push(u16::from(b' ')),
            1 if self.version == 1 => out.push(u16::from(b'\n')),
            1 => {
                if d.allow_abbr {
                    d.state = DecodeState::Abbr(1);
                }
            }
            2 | 3 if self.version <= 2 => {
                // Temporary shift [3.2.2].
                d.alphabet = (d.alphabet + zchar - 1) % 3;
            }
            2 | 3 => {
                if d.allow_abbr {
                    d.state = DecodeState::Abbr(zchar);
                }
            }
            4 | 5 => {
                d.alphabet = (d.alphabet + zchar - 3) % 3;
                if self.version <= 2 {
                    // Shift-lock in early versions [3.2.3].
                    d.shift_lock = d.alphabet;
                }
            }
            6 if d.alphabet == 2 => {
                d.state = DecodeState::ZsciiHigh;
            }
            7 if d.alphabet == 2 && self.version != 1 => {
                out.push(u16::from(b'\n'));
                d.alphabet = d.shift_lock;
            }
            _ => {
                let index = usize::from(d.alphabet) * 26 + usize::from(zchar) - 6;
                out.push(self.alpha(memory, index)?);
                d.alphabet = d.shift_lock;
            }
        }
        Ok(())
    }

    /// Encode an already-lowercased word as a fixed-length dictionary key.
    ///
    /// Returns the packed words and how many of them carry the key. ZSCII
    /// characters with no alphabet entry are dropped, matching the decoder's
    /// output character set for dictionary words.
    pub fn encode_word(&self, memory: &Memory, word: &[u8]) -> Result<([u16; 3], usize), Fault> {
        let key_length = self.key_length();
        let mut zchars: Vec<u8> = Vec::with_capacity(key_length);

        for &ch in word {
            if zchars.len() >= key_length {
                break;
            }
            if let Some(index) = self.find_alpha(memory, ch)? {
                let row = (index / 26) as u8;
                let col = (index % 26) as u8;
                if row > 0 {
                    // Single shift before an A1/A2 character.
                    zchars.push(row + 3);
                }
                zchars.push(col + 6);
            }
        }
        zchars.truncate(key_length);
        while zchars.len() < key_length {
            zchars.push(5);
        }

        let words = key_length / 3;
        let mut packed = [0u16; 3];
        for (i, chunk) in zchars.chunks_exact(3).enumerate() {
            packed[i] = u16::from(chunk[0]) << 10 | u16::from(chunk[1]) << 5 | u16::from(chunk[2]);
        }
        packed[words - 1] |= 0x8000;
        Ok((packed, words))
    }

    fn find_alpha(&self, memory: &Memory, ch: u8) -> Result<Option<usize>, Fault> {
        for index in 0..78 {
            if self.alpha(memory, index)? == u16::from(ch) {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }
}
