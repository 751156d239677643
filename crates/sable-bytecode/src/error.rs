//! Bytecode errors

use thiserror::Error;

use crate::opcode::Opcode;

/// Errors that can occur during bytecode operations
#[derive(Debug, Error)]
pub enum BytecodeError {
    /// Byte does not name a known opcode
    #[error("Invalid opcode 0x{byte:02X} at offset {offset}")]
    InvalidOpcode {
        /// The unknown byte
        byte: u8,
        /// Stream position of the byte
        offset: usize,
    },

    /// Stream ended before a declared length was satisfied
    #[error("Unexpected end of data at offset {offset}: needed {needed} more bytes")]
    UnexpectedEnd {
        /// Stream position where reading stopped
        offset: usize,
        /// Bytes still missing
        needed: usize,
    },

    /// Operand length disagrees with the opcode's fixed framing
    #[error("{opcode} takes a {expected}-byte operand, got {actual}")]
    OperandSizeMismatch {
        /// Offending opcode
        opcode: Opcode,
        /// Length required by the framing table
        expected: usize,
        /// Length supplied
        actual: usize,
    },

    /// Operand too long for the opcode's length prefix
    #[error("{opcode} operand of {len} bytes does not fit a {prefix}-byte length prefix")]
    OperandTooLong {
        /// Offending opcode
        opcode: Opcode,
        /// Width of the prefix
        prefix: u8,
        /// Operand length
        len: usize,
    },

    /// Address access on an opcode that carries no address
    #[error("{opcode} at offset {offset} has no address operand")]
    NoAddress {
        /// Offending opcode
        opcode: Opcode,
        /// Instruction offset
        offset: usize,
    },

    /// Address slot index beyond the opcode's address count
    #[error("{opcode} has {count} address slots, index {index} requested")]
    AddressIndexOutOfRange {
        /// Offending opcode
        opcode: Opcode,
        /// Number of slots
        count: usize,
        /// Requested slot
        index: usize,
    },

    /// Address value does not fit the slot width
    #[error("{opcode} cannot encode address {value} in {width} bytes")]
    AddressOutOfRange {
        /// Offending opcode
        opcode: Opcode,
        /// Slot width in bytes
        width: usize,
        /// Displacement that was written
        value: i32,
    },

    /// Invalid magic bytes in executable file
    #[error("Invalid magic: 0x{0:08X}")]
    InvalidMagic(u32),

    /// Structurally invalid executable
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Stored checksum does not match the content
    #[error("Checksum mismatch: stored 0x{stored:08X}, computed 0x{computed:08X}")]
    ChecksumMismatch {
        /// Checksum read from the file
        stored: u32,
        /// Checksum of the content
        computed: u32,
    },

    /// IO error during serialization
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BytecodeError {
    /// Create a format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::InvalidFormat(message.into())
    }
}

/// Result type for bytecode operations
pub type Result<T> = std::result::Result<T, BytecodeError>;
