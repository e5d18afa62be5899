//! Story image loading and validation

use std::fs;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, info};

use crate::blorb::{self, Resource};
use crate::consts::HEADER_SIZE;
use crate::error::VmError;
use crate::header::{offset, Header};
use crate::memory::{Address, Memory};

/// An immutable, validated story image.
///
/// The story keeps the original bytes for the lifetime of the run; the VM
/// executes against a mutable copy prepared in [`Memory`], and the save-file
/// codec diffs against these originals.
#[derive(Debug, Clone)]
pub struct Story {
    image: Vec<u8>,
    header: Header,
    filename: String,
    checksum_ok: bool,
}

impl Story {
    /// Load a story from a file, unwrapping a Blorb container if present.
    pub fn load(path: &Path) -> Result<Self, VmError> {
        let bytes = fs::read(path)?;
        let filename = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "story".into());

        let image = match blorb::find_resource(&bytes, Resource::Exec, 0) {
            Some(located) if &located.chunk_type == b"ZCOD" => {
                debug!(offset = located.offset, "story unwrapped from blorb container");
                &bytes[located.offset as usize..]
            }
            Some(_) => return Err(VmError::NotRecognised),
            None => &bytes[..],
        };

        Self::from_bytes(image.to_vec(), filename)
    }

    /// Validate an in-memory image. The filename names save files.
    pub fn from_bytes(mut image: Vec<u8>, filename: String) -> Result<Self, VmError> {
        let mut header = Header::parse(&image)?;
        if !header.is_version_valid() {
            return Err(VmError::BadStoryVersion(header.version));
        }

        if header.story_size() == 0 {
            // Some older stories carry a zero length field; take the size
            // from the file and patch it back so save files agree.
            fixup_length(&mut image, &mut header)?;
        }

        let size = header.story_size() as usize;
        let limit = header.memory_limit();
        if size > limit {
            return Err(VmError::StorySize { size, limit });
        }
        if size > image.len() {
            return Err(VmError::BadStoryRegion("length exceeds file"));
        }
        image.truncate(size);

        let stat = usize::from(header.stat);
        if stat < HEADER_SIZE || stat > size {
            return Err(VmError::BadStoryRegion("static memory base"));
        }
        let himem = usize::from(header.himem);
        if himem < HEADER_SIZE || himem > size || himem < stat {
            return Err(VmError::BadStoryRegion("high memory base"));
        }

        let computed = checksum(&image);
        let checksum_ok = computed == header.checksum;
        info!(
            version = header.version,
            release = header.release,
            size,
            checksum_ok,
            "story loaded"
        );

        Ok(Self {
            image,
            header,
            filename,
            checksum_ok,
        })
    }

    /// Parsed header fields.
    pub const fn header(&self) -> &Header {
        &self.header
    }

    /// Story version, 1..=8.
    pub const fn version(&self) -> u8 {
        self.header.version
    }

    /// The original image bytes.
    pub fn data(&self) -> &[u8] {
        &self.image
    }

    /// Image size in bytes.
    pub fn size(&self) -> usize {
        self.image.len()
    }

    /// Basename used for save files.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Whether the computed checksum matched the header's.
    pub const fn is_checksum_valid(&self) -> bool {
        self.checksum_ok
    }

    /// Address of the first instruction.
    pub fn entry_point(&self) -> Address {
        self.header.entry_point()
    }

    /// Size and populate VM memory for this story.
    ///
    /// Memory spans the version's full limit, zero-padded past the image;
    /// stores are limited to the dynamic region below the static base.
    pub fn prepare_memory(&self, memory: &mut Memory) {
        memory.resize(self.header.memory_limit());
        memory
            .load(0, &self.image)
            .expect("image validated against the memory limit");
        memory.limit_write(0, u32::from(self.header.stat));
    }

    /// Restore everything after the header to the original story bytes.
    ///
    /// The header itself is left alone: the game-settable flags survive a
    /// restart and the interpreter fields are rewritten by the header reset.
    pub fn reset_memory(&self, memory: &mut Memory) {
        memory
            .load(HEADER_SIZE as Address, &self.image[HEADER_SIZE..])
            .expect("memory was prepared for this story");
    }
}

/// 16-bit checksum: the wrapping byte sum of everything after the header.
pub fn checksum(image: &[u8]) -> u16 {
    image[HEADER_SIZE.min(image.len())..]
        .iter()
        .fold(0u16, |sum, b| sum.wrapping_add(u16::from(*b)))
}

fn fixup_length(image: &mut [u8], header: &mut Header) -> Result<(), VmError> {
    let size = image.len();
    if header.version > 3 || size >= 0x20000 {
        return Err(VmError::BadStoryRegion("zero length field"));
    }
    header.length = (size >> 1) as u16;
    BigEndian::write_u16(&mut image[offset::LENGTH as usize..], header.length);
    Ok(())
}
