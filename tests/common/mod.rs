//! Hand-built story images for end-to-end tests

use byteorder::{BigEndian, ByteOrder};

use grue_vm::console::BatchConsole;
use grue_vm::machine::Machine;
use grue_vm::options::Options;
use grue_vm::story::Story;

/// Default code origin used by the builders.
pub const ENTRY: usize = 0x0500;
/// Default dictionary address.
pub const DICT: usize = 0x0100;

/// Assembles a minimal story image around a test program.
pub struct StoryBuilder {
    bytes: Vec<u8>,
    version: u8,
}

impl StoryBuilder {
    /// Start a story of the given version with sane header defaults.
    pub fn new(version: u8) -> Self {
        let mut builder = Self {
            bytes: vec![0u8; 0x1000],
            version,
        };
        builder.set8(0x00, version);
        builder.set16(0x04, 0x0400); // himem
        builder.set16(0x06, ENTRY as u16); // initial PC
        builder.set16(0x08, DICT as u16); // dictionary
        builder.set16(0x0A, 0x0200); // object table
        builder.set16(0x0C, 0x0300); // globals
        builder.set16(0x0E, 0x0400); // static base
        builder.set16(0x02, 1); // release
        builder.bytes[0x12..0x18].copy_from_slice(b"260801");
        // An empty dictionary so sread always has one to consult.
        builder.dictionary(&[], b"");
        builder
    }

    /// Grow the image to `size` bytes before anything else is placed.
    pub fn with_size(&mut self, size: usize) -> &mut Self {
        self.bytes.resize(size, 0);
        self
    }

    /// Overwrite one byte.
    pub fn set8(&mut self, addr: usize, value: u8) -> &mut Self {
        self.bytes[addr] = value;
        self
    }

    /// Overwrite one big-endian word.
    pub fn set16(&mut self, addr: usize, value: u16) -> &mut Self {
        BigEndian::write_u16(&mut self.bytes[addr..], value);
        self
    }

    /// Copy a byte block into the image.
    pub fn block(&mut self, addr: usize, bytes: &[u8]) -> &mut Self {
        self.bytes[addr..addr + bytes.len()].copy_from_slice(bytes);
        self
    }

    /// Place the program at the entry point.
    pub fn program(&mut self, code: &[u8]) -> &mut Self {
        self.block(ENTRY, code)
    }

    /// Write a dictionary with the given words and extra separators.
    pub fn dictionary(&mut self, words: &[&str], separators: &[u8]) -> &mut Self {
        let mut addr = DICT;
        self.set8(addr, separators.len() as u8);
        addr += 1;
        for sep in separators {
            self.set8(addr, *sep);
            addr += 1;
        }
        let entry_len = if self.version <= 3 { 4 } else { 6 };
        self.set8(addr, entry_len);
        self.set16(addr + 1, words.len() as u16);
        addr += 3;
        for word in words {
            for value in encode_zword(word, self.version) {
                self.set16(addr, value);
                addr += 2;
            }
        }
        self
    }

    /// Finish the image: fix the length field, compute the checksum and
    /// load it as a story.
    pub fn build(&mut self) -> Story {
        self.finish_header(None)
    }

    /// Like [`StoryBuilder::build`], but pad the image so the checksum
    /// comes out as `target`.
    pub fn build_with_checksum(&mut self, target: u16) -> Story {
        self.finish_header(Some(target))
    }

    fn finish_header(&mut self, checksum: Option<u16>) -> Story {
        let shift = match self.version {
            1..=3 => 1,
            4 | 5 => 2,
            _ => 3,
        };
        self.set16(0x1A, (self.bytes.len() >> shift) as u16);

        let computed = sum(&self.bytes);
        let target = match checksum {
            Some(target) => {
                // Burn the difference into unused high memory.
                let mut delta = target.wrapping_sub(computed);
                let mut addr = self.bytes.len() - 0x200;
                while delta != 0 {
                    let byte = delta.min(0xFF) as u8;
                    self.set8(addr, byte);
                    addr += 1;
                    delta -= u16::from(byte);
                }
                target
            }
            None => computed,
        };
        self.set16(0x1C, target);

        Story::from_bytes(self.bytes.clone(), "harness".into()).expect("test story must validate")
    }
}

fn sum(image: &[u8]) -> u16 {
    image[0x40..].iter().fold(0u16, |acc, b| acc.wrapping_add(u16::from(*b)))
}

/// Encode a lowercase word as v-appropriate dictionary key words.
pub fn encode_zword(word: &str, version: u8) -> Vec<u16> {
    let zlen = if version <= 3 { 6 } else { 9 };
    let mut zchars: Vec<u8> = word
        .bytes()
        .filter(|b| b.is_ascii_lowercase())
        .map(|b| b - b'a' + 6)
        .take(zlen)
        .collect();
    while zchars.len() < zlen {
        zchars.push(5);
    }
    let mut words: Vec<u16> = zchars
        .chunks_exact(3)
        .map(|c| u16::from(c[0]) << 10 | u16::from(c[1]) << 5 | u16::from(c[2]))
        .collect();
    *words.last_mut().unwrap() |= 0x8000;
    words
}

/// Run a story in a batch console, feeding `input` as keystrokes.
pub fn run(story: Story, input: &[u8]) -> (String, Result<(), grue_vm::error::VmError>) {
    run_with(story, input, Options::default())
}

/// Run a story with explicit options.
pub fn run_with(story: Story, input: &[u8], options: Options) -> (String, Result<(), grue_vm::error::VmError>) {
    let mut console = BatchConsole::new(24, 80);
    console.feed(input);
    let mut machine = Machine::new(console, options, story);
    let result = machine.play(false);
    (machine.console().output_text(), result)
}
