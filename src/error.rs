//! Runtime interpreter error implementation

use std::io;

use thiserror::Error;

/// Execution fault raised by the components that detect it.
///
/// A fault aborts the running program but leaves the interpreter in a
/// reportable state; the main loop disassembles the faulting instruction and
/// prints the fault through the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, strum::EnumIter)]
pub enum Fault {
    /// The opcode is recognised but not implemented by this interpreter.
    #[error("unimplemented operation")]
    UnimplementedOp,
    /// The opcode is not legal for the story version being executed.
    #[error("illegal operation")]
    IllegalOp,
    /// A value was popped or peeked from an empty stack.
    #[error("stack empty")]
    StackEmpty,
    /// The stack was shrunk or read below its base.
    #[error("stack underflow")]
    StackUnderflow,
    /// A push exceeded the fixed stack capacity.
    #[error("stack overflow")]
    StackOverflow,
    /// A frame-relative access fell outside the live stack.
    #[error("bad frame pointer")]
    BadFramePtr,
    /// An instruction fetch fell outside the code region.
    #[error("bad program counter")]
    BadPc,
    /// A memory access fell outside its permitted region.
    #[error("bad address")]
    BadAddress,
    /// An output stream number outside 1..=4 was selected.
    #[error("bad stream")]
    BadStream,
    /// A call frame carried an unknown call type.
    #[error("bad call type")]
    BadCallType,
    /// `div` or `mod` with a zero divisor.
    #[error("division by zero")]
    DivByZero,
    /// The interpreter configuration is unusable.
    #[error("bad configuration")]
    BadConfig,
    /// The story version is outside the supported range.
    #[error("bad version")]
    BadVersion,
}

/// Top-level interpreter error variants.
#[derive(Debug, Error)]
pub enum VmError {
    /// The program execution faulted.
    #[error("execution fault: {0}")]
    Fault(#[from] Fault),
    /// The story header declares an unsupported version.
    #[error("unsupported story version z{0}")]
    BadStoryVersion(u8),
    /// The story image does not fit the version's memory limit.
    #[error("story too big: {size} bytes exceeds the {limit} byte limit")]
    StorySize {
        /// Size declared by the story header.
        size: usize,
        /// Memory limit for the story version.
        limit: usize,
    },
    /// A story header region is inconsistent.
    #[error("invalid story region: {0}")]
    BadStoryRegion(&'static str),
    /// The file is not a story this interpreter can run.
    #[error("story file format not recognised")]
    NotRecognised,
    /// A save file was rejected during decoding.
    #[error("save file rejected: {0}")]
    BadSaveFile(&'static str),
    /// A chunked container (save file or story resource) is malformed.
    #[error("malformed container: {0}")]
    Iff(#[from] crate::iff::IffError),
    /// I/O and OS related errors.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl VmError {
    /// Return the execution fault behind this error, if applicable.
    pub const fn fault(&self) -> Option<Fault> {
        match self {
            Self::Fault(fault) => Some(*fault),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_fault_renders_a_message() {
        for fault in Fault::iter() {
            assert!(!fault.to_string().is_empty());
        }
    }

    #[test]
    fn fault_is_preserved_through_vm_error() {
        let err = VmError::from(Fault::DivByZero);
        assert_eq!(err.fault(), Some(Fault::DivByZero));
        assert_eq!(VmError::NotRecognised.fault(), None);
    }
}
