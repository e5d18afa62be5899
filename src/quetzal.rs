//! Quetzal save-file encoding and decoding

use std::io;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use itertools::Itertools;

use crate::error::VmError;
use crate::iff::Document;
use crate::memory::{Address, Memory};
use crate::random::Random;
use crate::stack::Stack;
use crate::story::Story;

const FORM_TYPE: &[u8; 4] = b"IFZS";
const IFHD_LEN: usize = 13;

/// One encoded machine state in the standard interchange container.
///
/// The memory chunk is differential: current memory XORed against the
/// original story bytes, run-length encoded over the zero runs. The stack
/// chunk is the raw stack image, already big-endian by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quetzal {
    doc: Document,
}

impl Quetzal {
    /// Encode a machine state.
    pub fn encode(story: &Story, memory: &Memory, stack: &Stack, random: &Random, pc: Address) -> Self {
        let mut doc = Document::new(FORM_TYPE);
        doc.push(b"IFhd", encode_header(story, pc));
        doc.push(b"CMem", encode_memory(story, memory));
        doc.push(b"Stks", stack.as_bytes().to_vec());
        let mut rand_state = [0u8; 8];
        BigEndian::write_u64(&mut rand_state, random.state());
        doc.push(b"ZifH", rand_state.to_vec());
        Self { doc }
    }

    /// Decode into the given state parts, returning the saved PC.
    ///
    /// The save is rejected when its identification chunk does not match
    /// the running story.
    pub fn decode(
        &self,
        story: &Story,
        memory: &mut Memory,
        stack: &mut Stack,
        random: &mut Random,
    ) -> Result<Address, VmError> {
        let pc = self.decode_header(story)?;
        self.decode_memory(story, memory)?;

        let stks = self.doc.find(b"Stks").ok_or(VmError::BadSaveFile("Stks chunk not found"))?;
        stack.load(stks).map_err(|_| VmError::BadSaveFile("stack image too big"))?;

        // The random-state chunk is our own extension and optional.
        if let Some(zifh) = self.doc.find(b"ZifH") {
            if zifh.len() >= 8 {
                random.set_state(BigEndian::read_u64(zifh));
            }
        }

        Ok(pc)
    }

    fn decode_header(&self, story: &Story) -> Result<Address, VmError> {
        let ifhd = self.doc.find(b"IFhd").ok_or(VmError::BadSaveFile("IFhd chunk not found"))?;
        if ifhd.len() < IFHD_LEN {
            return Err(VmError::BadSaveFile("short IFhd chunk"));
        }
        let header = story.header();
        let release = BigEndian::read_u16(&ifhd[0..2]);
        let serial = &ifhd[2..8];
        let checksum = BigEndian::read_u16(&ifhd[8..10]);
        if release != header.release || serial != header.serial || checksum != header.checksum {
            return Err(VmError::BadSaveFile("save is for a different story"));
        }
        Ok(BigEndian::read_u24(&ifhd[10..13]))
    }

    fn decode_memory(&self, story: &Story, memory: &mut Memory) -> Result<(), VmError> {
        if let Some(cmem) = self.doc.find(b"CMem") {
            return decode_cmem(cmem, story, memory);
        }
        if let Some(umem) = self.doc.find(b"UMem") {
            for (addr, byte) in umem.iter().enumerate() {
                memory
                    .set8(addr as Address, *byte)
                    .map_err(|_| VmError::BadSaveFile("UMem chunk too big"))?;
            }
            return Ok(());
        }
        Err(VmError::BadSaveFile("CMem or UMem chunk not found"))
    }

    /// Serialise the container.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.doc.to_bytes()
    }

    /// Parse a container.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VmError> {
        Ok(Self {
            doc: Document::from_bytes(bytes, FORM_TYPE)?,
        })
    }

    /// Write the container to a file.
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        self.doc.write_to(path)
    }

    /// Read a container from a file.
    pub fn read_from(path: &Path) -> Result<Self, VmError> {
        Ok(Self {
            doc: Document::read_from(path, FORM_TYPE)??,
        })
    }
}

fn encode_header(story: &Story, pc: Address) -> Vec<u8> {
    let header = story.header();
    let mut ifhd = vec![0u8; IFHD_LEN];
    BigEndian::write_u16(&mut ifhd[0..2], header.release);
    ifhd[2..8].copy_from_slice(&header.serial);
    BigEndian::write_u16(&mut ifhd[8..10], header.checksum);
    BigEndian::write_u24(&mut ifhd[10..13], pc);
    ifhd
}

fn encode_memory(story: &Story, memory: &Memory) -> Vec<u8> {
    let reference = story.data();
    let live = memory.as_bytes();
    let end = memory.write_end() as usize;

    let mut xored: Vec<u8> = live[..=end.min(live.len() - 1)]
        .iter()
        .enumerate()
        .map(|(i, byte)| if i < reference.len() { byte ^ reference[i] } else { *byte })
        .collect();
    // Trailing zero runs are implicit; the decoder pads.
    while xored.last() == Some(&0) {
        xored.pop();
    }

    let mut data = Vec::new();
    for (is_zero, group) in &xored.iter().group_by(|byte| **byte == 0) {
        if is_zero {
            let mut run = group.count();
            while run > 0 {
                let n = run.min(0x100);
                data.push(0);
                data.push((n - 1) as u8);
                run -= n;
            }
        } else {
            data.extend(group);
        }
    }
    data
}

fn decode_cmem(cmem: &[u8], story: &Story, memory: &mut Memory) -> Result<(), VmError> {
    let mut addr: usize = 0;
    let mut put = |addr: usize, diff: u8| -> Result<(), VmError> {
        let byte = if addr < story.size() { story.data()[addr] ^ diff } else { diff };
        memory
            .set8(addr as Address, byte)
            .map_err(|_| VmError::BadSaveFile("CMem chunk too big"))
    };

    let mut i = 0;
    while i < cmem.len() {
        let byte = cmem[i];
        i += 1;
        if byte == 0 {
            let run = *cmem.get(i).ok_or(VmError::BadSaveFile("incomplete CMem run"))? as usize + 1;
            i += 1;
            for _ in 0..run {
                put(addr, 0)?;
                addr += 1;
            }
        } else {
            put(addr, byte)?;
            addr += 1;
        }
    }

    // Unencoded trailing bytes revert to the story image.
    while addr < story.size() {
        put(addr, 0)?;
        addr += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::offset;
    use byteorder::{BigEndian, ByteOrder};
    use quickcheck_macros::quickcheck;

    fn story() -> Story {
        let mut image = vec![0u8; 0x800];
        image[offset::VERSION as usize] = 3;
        BigEndian::write_u16(&mut image[offset::HIMEM as usize..], 0x0400);
        BigEndian::write_u16(&mut image[offset::STAT as usize..], 0x0200);
        BigEndian::write_u16(&mut image[offset::LENGTH as usize..], 0x0400);
        BigEndian::write_u16(&mut image[offset::RELEASE as usize..], 42);
        image[offset::SERIAL as usize..offset::SERIAL as usize + 6].copy_from_slice(b"260201");
        for (i, byte) in image.iter_mut().enumerate().skip(0x100) {
            *byte = (i % 251) as u8;
        }
        let sum = crate::story::checksum(&image);
        BigEndian::write_u16(&mut image[offset::CHECKSUM as usize..], sum);
        Story::from_bytes(image, "unit".into()).unwrap()
    }

    fn machine_state(story: &Story) -> (Memory, Stack, Random) {
        let mut memory = Memory::new();
        story.prepare_memory(&mut memory);
        let mut stack = Stack::new(64);
        stack.push16(0x1234).unwrap();
        stack.push8(0x56).unwrap();
        let mut random = Random::default();
        random.predictable_seed(7);
        (memory, stack, random)
    }

    #[test]
    fn encode_decode_round_trips_the_state() {
        let story = story();
        let (mut memory, stack, random) = machine_state(&story);
        memory.write8(0x150, 0xFF).unwrap();
        memory.write16(0x180, 0xCAFE).unwrap();

        let quetzal = Quetzal::encode(&story, &memory, &stack, &random, 0x0432);
        let bytes = quetzal.to_bytes();
        let parsed = Quetzal::from_bytes(&bytes).unwrap();

        let mut memory2 = Memory::new();
        story.prepare_memory(&mut memory2);
        // Dirty the target to prove decoding rewrites it.
        memory2.write8(0x151, 0x11).unwrap();
        let mut stack2 = Stack::new(64);
        let mut random2 = Random::default();
        let pc = parsed.decode(&story, &mut memory2, &mut stack2, &mut random2).unwrap();

        assert_eq!(pc, 0x0432);
        assert_eq!(memory.as_bytes(), memory2.as_bytes());
        assert_eq!(stack.as_bytes(), stack2.as_bytes());
        assert_eq!(random.state(), random2.state());
    }

    #[test]
    fn unchanged_memory_encodes_compactly() {
        let story = story();
        let (memory, stack, random) = machine_state(&story);
        let quetzal = Quetzal::encode(&story, &memory, &stack, &random, 0);
        assert!(quetzal.doc.find(b"CMem").unwrap().is_empty());
    }

    #[test]
    fn mismatched_story_is_rejected() {
        let story = story();
        let (memory, stack, random) = machine_state(&story);
        let quetzal = Quetzal::encode(&story, &memory, &stack, &random, 0);

        let mut other_image = story.data().to_vec();
        BigEndian::write_u16(&mut other_image[offset::RELEASE as usize..], 43);
        let sum = crate::story::checksum(&other_image);
        BigEndian::write_u16(&mut other_image[offset::CHECKSUM as usize..], sum);
        let other = Story::from_bytes(other_image, "other".into()).unwrap();

        let mut memory2 = Memory::new();
        other.prepare_memory(&mut memory2);
        let mut stack2 = Stack::new(64);
        let mut random2 = Random::default();
        assert!(matches!(
            quetzal.decode(&other, &mut memory2, &mut stack2, &mut random2),
            Err(VmError::BadSaveFile(_))
        ));
    }

    #[quickcheck]
    fn prop_cmem_round_trips_dynamic_edits(edits: Vec<(u16, u8)>) -> bool {
        let story = story();
        let (mut memory, stack, random) = machine_state(&story);
        for (addr, value) in &edits {
            let addr = Address::from(addr % 0x200);
            if memory.write8(addr, *value).is_err() {
                return false;
            }
        }
        let quetzal = Quetzal::encode(&story, &memory, &stack, &random, 0);
        let mut memory2 = Memory::new();
        story.prepare_memory(&mut memory2);
        quetzal.decode(&story, &mut memory2, &mut Stack::new(64), &mut Random::default()).is_ok()
            && memory.as_bytes() == memory2.as_bytes()
    }
}
