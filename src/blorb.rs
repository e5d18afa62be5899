//! Blorb resource container probing

use byteorder::{BigEndian, ByteOrder};

use crate::iff::Document;

/// Resource classes a Blorb index may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Executable story chunk.
    Exec,
    /// Picture resource.
    Pict,
    /// Sound resource.
    Sound,
}

impl Resource {
    const fn usage(self) -> &'static [u8; 4] {
        match self {
            Self::Exec => b"Exec",
            Self::Pict => b"Pict",
            Self::Sound => b"Snd ",
        }
    }
}

/// A resource located inside a Blorb container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    /// Chunk type of the resource, e.g. `ZCOD` for a Z story.
    pub chunk_type: [u8; 4],
    /// Byte offset of the resource payload within the container file.
    pub offset: u32,
}

/// Look up a resource in a `FORM`/`IFRS` container.
///
/// Returns `None` when the bytes are not a Blorb or the index has no
/// matching entry; plain story files take this path.
pub fn find_resource(bytes: &[u8], resource: Resource, index: u32) -> Option<Located> {
    let doc = Document::from_bytes(bytes, b"IFRS").ok()?;
    let ridx = doc.find(b"RIdx")?;
    if ridx.len() < 4 {
        return None;
    }
    let count = BigEndian::read_u32(&ridx[0..4]) as usize;
    for entry in ridx[4..].chunks_exact(12).take(count) {
        let usage = &entry[0..4];
        let number = BigEndian::read_u32(&entry[4..8]);
        let offset = BigEndian::read_u32(&entry[8..12]);
        if usage == resource.usage() && number == index {
            let chunk_type = doc.chunk_id_at(offset)?;
            // Payload starts after the 8-byte chunk header.
            return Some(Located {
                chunk_type,
                offset: offset + 8,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blorb_with_exec(story: &[u8]) -> Vec<u8> {
        let mut doc = Document::new(b"IFRS");
        // One Exec entry pointing just past the RIdx chunk.
        let mut ridx = vec![0u8; 16];
        BigEndian::write_u32(&mut ridx[0..4], 1);
        ridx[4..8].copy_from_slice(b"Exec");
        BigEndian::write_u32(&mut ridx[12..16], 12 + 8 + 16);
        doc.push(b"RIdx", ridx);
        doc.push(b"ZCOD", story.to_vec());
        doc.to_bytes()
    }

    #[test]
    fn finds_the_exec_resource() {
        let bytes = blorb_with_exec(&[9u8; 10]);
        let located = find_resource(&bytes, Resource::Exec, 0).unwrap();
        assert_eq!(&located.chunk_type, b"ZCOD");
        assert_eq!(&bytes[located.offset as usize..located.offset as usize + 10], &[9u8; 10]);
    }

    #[test]
    fn plain_files_are_not_blorbs() {
        assert_eq!(find_resource(&[3u8; 100], Resource::Exec, 0), None);
    }

    #[test]
    fn missing_usage_yields_none() {
        let bytes = blorb_with_exec(&[9u8; 10]);
        assert_eq!(find_resource(&bytes, Resource::Pict, 0), None);
    }
}
