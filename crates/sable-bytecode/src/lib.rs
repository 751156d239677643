//! # Sable Bytecode
//!
//! This crate defines the executable format produced by the Sable contract compiler.
//!
//! ## Contents
//!
//! - **Opcodes**: the stack machine's instruction set with a constant operand-framing table
//! - **Instructions**: decoding and encoding of concrete instructions, including
//!   typed access to embedded jump addresses
//! - **Method tokens**: descriptors of calls into other contracts
//! - **NEF files**: the checksummed executable container

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod binary;
pub mod error;
pub mod instruction;
pub mod nef;
pub mod opcode;
pub mod token;

pub use error::{BytecodeError, Result};
pub use instruction::{NefInstruction, decode_script, encode_script};
pub use nef::{NEF_MAGIC, NefBuilder, NefFile};
pub use opcode::{AddressClass, Opcode, OperandSize};
pub use token::{CallFlags, Hash160, MethodToken};
