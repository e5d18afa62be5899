//! Minimal IFF interchange-format container

use std::fs;
use std::io;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};

use thiserror::Error;

/// Errors produced while parsing a chunked container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IffError {
    /// The byte stream ended inside a header or chunk.
    #[error("truncated document")]
    Truncated,
    /// The outer container is not a `FORM` of the expected type.
    #[error("wrong container type")]
    WrongForm,
}

/// One chunk: a four-character identifier and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Four-character ASCII identifier.
    pub id: [u8; 4],
    /// Payload bytes, without the length header or padding.
    pub data: Vec<u8>,
}

/// A `FORM` container holding a sequence of chunks.
///
/// Chunk payloads of odd length are padded with one zero byte on encode, per
/// the interchange format; the pad byte is not part of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    form_type: [u8; 4],
    chunks: Vec<Chunk>,
}

impl Document {
    /// Create an empty document of the given form type.
    pub fn new(form_type: &[u8; 4]) -> Self {
        Self {
            form_type: *form_type,
            chunks: Vec::new(),
        }
    }

    /// The container's form type.
    pub const fn form_type(&self) -> &[u8; 4] {
        &self.form_type
    }

    /// Append a chunk.
    pub fn push(&mut self, id: &[u8; 4], data: Vec<u8>) {
        self.chunks.push(Chunk { id: *id, data });
    }

    /// Payload of the first chunk with the given identifier.
    pub fn find(&self, id: &[u8; 4]) -> Option<&[u8]> {
        self.chunks.iter().find(|c| &c.id == id).map(|c| c.data.as_slice())
    }

    /// Chunks in document order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Identifier of the chunk starting at the given byte offset, if any.
    ///
    /// Offsets address the serialised document, as resource indexes do.
    pub fn chunk_id_at(&self, offset: u32) -> Option<[u8; 4]> {
        let mut pos = 12u32;
        for chunk in &self.chunks {
            if pos == offset {
                return Some(chunk.id);
            }
            let len = chunk.data.len() as u32;
            pos += 8 + len + (len & 1);
        }
        None
    }

    /// Serialise the document.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"FORM");
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&self.form_type);
        for chunk in &self.chunks {
            out.extend_from_slice(&chunk.id);
            let mut len = [0u8; 4];
            BigEndian::write_u32(&mut len, chunk.data.len() as u32);
            out.extend_from_slice(&len);
            out.extend_from_slice(&chunk.data);
            if chunk.data.len() % 2 != 0 {
                out.push(0);
            }
        }
        let total = (out.len() - 8) as u32;
        BigEndian::write_u32(&mut out[4..8], total);
        out
    }

    /// Parse a document, checking the form type.
    pub fn from_bytes(bytes: &[u8], form_type: &[u8; 4]) -> Result<Self, IffError> {
        if bytes.len() < 12 {
            return Err(IffError::Truncated);
        }
        if &bytes[0..4] != b"FORM" || &bytes[8..12] != form_type {
            return Err(IffError::WrongForm);
        }
        let declared = BigEndian::read_u32(&bytes[4..8]) as usize;
        let end = declared.checked_add(8).filter(|e| *e <= bytes.len()).ok_or(IffError::Truncated)?;

        let mut doc = Self::new(form_type);
        let mut pos = 12usize;
        while pos < end {
            if end - pos < 8 {
                return Err(IffError::Truncated);
            }
            let mut id = [0u8; 4];
            id.copy_from_slice(&bytes[pos..pos + 4]);
            let len = BigEndian::read_u32(&bytes[pos + 4..pos + 8]) as usize;
            pos += 8;
            if end - pos < len {
                return Err(IffError::Truncated);
            }
            doc.push(&id, bytes[pos..pos + len].to_vec());
            pos += len + (len & 1);
        }
        Ok(doc)
    }

    /// Write the serialised document to a file.
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_bytes())
    }

    /// Read and parse a document from a file.
    pub fn read_from(path: &Path, form_type: &[u8; 4]) -> io::Result<Result<Self, IffError>> {
        let bytes = fs::read(path)?;
        Ok(Self::from_bytes(&bytes, form_type))
    }
}
