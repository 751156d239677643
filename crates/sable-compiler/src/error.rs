//! Compilation errors

use sable_bytecode::{BytecodeError, Opcode};
use thiserror::Error;

use crate::ir::InstructionId;

/// Compilation errors
#[derive(Debug, Error)]
pub enum CompileError {
    /// Branch instruction whose target was never bound
    #[error("Unbound branch target on {opcode} {id}")]
    UnboundBranch {
        /// Offending instruction
        id: InstructionId,
        /// Its opcode
        opcode: Opcode,
    },

    /// Branch target that is not part of the linked program
    #[error("{opcode} {id} targets {target}, which is not in the program")]
    DanglingTarget {
        /// Offending instruction
        id: InstructionId,
        /// Its opcode
        opcode: Opcode,
        /// The missing target
        target: InstructionId,
    },

    /// Same instruction placed into the program more than once
    #[error("{opcode} {id} is placed more than once")]
    DuplicatePlacement {
        /// Offending instruction
        id: InstructionId,
        /// Its opcode
        opcode: Opcode,
    },

    /// Displacement does not fit the opcode's address width
    #[error("{opcode} {id} at offset {offset}: displacement {displacement} does not fit")]
    DisplacementOutOfRange {
        /// Offending instruction
        id: InstructionId,
        /// Its opcode
        opcode: Opcode,
        /// Offset of the branch
        offset: u32,
        /// Required displacement
        displacement: i64,
    },

    /// Target assigned to an opcode that takes none
    #[error("{opcode} does not take a branch target")]
    NotABranch {
        /// Offending opcode
        opcode: Opcode,
    },

    /// Instruction id that does not belong to the arena
    #[error("Unknown instruction {0}")]
    UnknownInstruction(InstructionId),

    /// More static fields than single-byte addressing allows
    #[error("Too many static fields (max 256), cannot allocate '{0}'")]
    StaticSlotOverflow(String),

    /// Too many distinct method tokens
    #[error("Too many method tokens (max 65536)")]
    TokenTableOverflow,

    /// Method with no instructions
    #[error("Method '{0}' has no instructions")]
    EmptyMethod(String),

    /// Reference to a method that was never defined
    #[error("Unknown method '{0}'")]
    UnknownMethod(String),

    /// Linked script exceeds the addressable range
    #[error("Script too large: {0} bytes")]
    ScriptTooLarge(u64),

    /// Embedded address that does not land on an instruction
    #[error("Instruction at offset {offset} points at {target}, which is not an instruction boundary")]
    InvalidAddress {
        /// Offset of the addressing instruction
        offset: usize,
        /// Absolute target
        target: i64,
    },

    /// Internal compiler error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Bytecode layer error
    #[error(transparent)]
    Bytecode(#[from] BytecodeError),
}

impl CompileError {
    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type for compilation
pub type CompileResult<T> = Result<T, CompileError>;
