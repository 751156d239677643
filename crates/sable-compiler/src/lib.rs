//! # Sable Compiler
//!
//! Back-end of the Sable contract compiler: turns lowered method bodies into
//! a linked script, a checksummed executable and a manifest.
//!
//! ## Pipeline
//!
//! 1. Method lowering pushes abstract instructions into a [`CompilationContext`]
//! 2. The linker assigns offsets and resolves branch targets
//! 3. The compiled contract is packaged into a NEF file and a manifest
//! 4. Dead code elimination optionally prunes an existing executable

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod ir;
pub mod linker;
pub mod manifest;
pub mod optimizer;
pub mod slots;
pub mod tokens;

pub use context::{CompilationContext, CompiledContract, ExportedMethod, INITIALIZE_METHOD, MethodId};
pub use error::{CompileError, CompileResult};
pub use ir::{Instruction, InstructionArena, InstructionId, Targets};
pub use linker::{Linker, link};
pub use manifest::{
    AbiEvent, AbiMethod, ContractAbi, Manifest, MethodSet, Parameter, ParameterType, Permission,
    PermissionBuilder, TrustSet,
};
pub use optimizer::{DeadCodeEliminator, OffsetMap, OptimizedScript, Script, optimize_executable};
pub use slots::StaticSlots;
pub use tokens::MethodTokenTable;
