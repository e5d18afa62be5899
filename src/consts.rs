//! Interpreter limits and layout constants

/// Size of a story header, in bytes.
pub const HEADER_SIZE: usize = 64;

/// Maximum size of the machine stack, in bytes.
pub const VM_STACK_SIZE: usize = 2048;

/// Maximum number of operands an instruction may carry.
pub const VM_MAX_OPERANDS: usize = 8;

/// Default number of undo snapshots kept in memory.
pub const DEFAULT_UNDO_SLOTS: usize = 4;

/// Capacity of the word-wrap buffer, in ZSCII characters.
pub const WRAP_BUFFER_LEN: usize = 16;

/// Consecutive newlines beyond this count are dropped from the transcript.
pub const TRANSCRIPT_NEWLINE_LIMIT: u32 = 3;

/// File extension used for save files.
pub const SAVE_FILE_EXT: &str = "qzl";
