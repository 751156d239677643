//! Compilation context
//!
//! One [`CompilationContext`] owns all mutable state of a single compilation:
//! the instruction arena, the ordered method bodies, the method token table,
//! the static slot map and the manifest metadata collected along the way.
//! [`CompilationContext::compile`] consumes it and yields a [`CompiledContract`].

use rustc_hash::FxHashMap;
use sable_bytecode::{MethodToken, NefFile, Opcode};
use tracing::debug;

use crate::error::{CompileError, CompileResult};
use crate::ir::{Instruction, InstructionArena, InstructionId};
use crate::linker;
use crate::manifest::{
    AbiEvent, AbiMethod, ContractAbi, Manifest, Parameter, ParameterType, Permission,
    PermissionBuilder, TrustSet,
};
use crate::slots::StaticSlots;
use crate::tokens::MethodTokenTable;

/// Name of the generated static storage initializer
pub const INITIALIZE_METHOD: &str = "_initialize";

/// Handle to a method body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(u32);

#[derive(Debug)]
struct MethodBody {
    name: String,
    instructions: Vec<InstructionId>,
}

/// Public method as it appears in the ABI
#[derive(Debug, Clone)]
pub struct ExportedMethod {
    /// Body implementing the method
    pub method: MethodId,
    /// Exported name
    pub name: String,
    /// Whether the method only reads state
    pub safe: bool,
    /// Parameters in declaration order
    pub parameters: Vec<Parameter>,
    /// Return type
    pub return_type: ParameterType,
}

/// State of one compilation
#[derive(Debug)]
pub struct CompilationContext {
    name: String,
    source: String,
    supported_standards: Vec<String>,
    exported_methods: Vec<ExportedMethod>,
    exported_events: Vec<AbiEvent>,
    permissions: PermissionBuilder,
    extra: serde_json::Map<String, serde_json::Value>,
    tokens: MethodTokenTable,
    statics: StaticSlots<String>,
    arena: InstructionArena,
    methods: Vec<MethodBody>,
    method_names: FxHashMap<String, MethodId>,
}

impl CompilationContext {
    /// Create a context for the contract `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: String::new(),
            supported_standards: Vec::new(),
            exported_methods: Vec::new(),
            exported_events: Vec::new(),
            permissions: PermissionBuilder::new(),
            extra: serde_json::Map::new(),
            tokens: MethodTokenTable::new(),
            statics: StaticSlots::new(),
            arena: InstructionArena::new(),
            methods: Vec::new(),
            method_names: FxHashMap::default(),
        }
    }

    /// Contract name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the source URL recorded in the executable
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    // ==================== Methods ====================

    /// Define a method body, or return the existing one with the same name
    pub fn define_method(&mut self, name: impl Into<String>) -> MethodId {
        let name = name.into();
        if let Some(&id) = self.method_names.get(&name) {
            return id;
        }
        let id = MethodId(self.methods.len() as u32);
        self.method_names.insert(name.clone(), id);
        self.methods.push(MethodBody {
            name,
            instructions: Vec::new(),
        });
        id
    }

    /// Look up a method by name
    pub fn method(&self, name: &str) -> CompileResult<MethodId> {
        self.method_names
            .get(name)
            .copied()
            .ok_or_else(|| CompileError::UnknownMethod(name.to_string()))
    }

    fn body_mut(&mut self, method: MethodId) -> CompileResult<&mut MethodBody> {
        self.methods
            .get_mut(method.0 as usize)
            .ok_or_else(|| CompileError::internal(format!("method #{} is not defined", method.0)))
    }

    /// Append an instruction to a method body
    pub fn push(&mut self, method: MethodId, instruction: Instruction) -> CompileResult<InstructionId> {
        let id = self.arena.alloc(instruction);
        self.place(method, id)?;
        Ok(id)
    }

    /// Allocate an instruction without placing it yet
    ///
    /// Used for forward branch targets: allocate the target first, bind
    /// branches to it, then [`place`](Self::place) it where it belongs.
    pub fn alloc(&mut self, instruction: Instruction) -> InstructionId {
        self.arena.alloc(instruction)
    }

    /// Append an allocated instruction to a method body
    pub fn place(&mut self, method: MethodId, id: InstructionId) -> CompileResult<()> {
        self.arena.get(id)?;
        self.body_mut(method)?.instructions.push(id);
        Ok(())
    }

    /// Access an instruction, e.g. to bind a branch target
    pub fn instruction_mut(&mut self, id: InstructionId) -> CompileResult<&mut Instruction> {
        self.arena.get_mut(id)
    }

    /// Instructions of a method body, in order
    pub fn body(&self, method: MethodId) -> Option<&[InstructionId]> {
        self.methods
            .get(method.0 as usize)
            .map(|b| b.instructions.as_slice())
    }

    // ==================== Manifest metadata ====================

    /// Export a method in the ABI
    pub fn export_method(&mut self, method: ExportedMethod) {
        self.exported_methods.push(method);
    }

    /// Declare an event in the ABI
    pub fn export_event(&mut self, name: impl Into<String>, parameters: Vec<Parameter>) {
        self.exported_events.push(AbiEvent {
            name: name.into(),
            parameters,
        });
    }

    /// Allow calling each of `methods` on `contract`
    pub fn add_permission<'m>(&mut self, contract: impl Into<String>, methods: impl IntoIterator<Item = &'m str>) {
        self.permissions.add_all(contract, methods);
    }

    /// Declare a supported standard
    pub fn add_supported_standard(&mut self, standard: impl Into<String>) {
        let standard = standard.into();
        if !self.supported_standards.contains(&standard) {
            self.supported_standards.push(standard);
        }
    }

    /// Set a vendor metadata entry
    pub fn set_extra(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.extra.insert(key.into(), value.into());
    }

    // ==================== Interning ====================

    /// Index of an external call descriptor
    ///
    /// The first use of a descriptor also allows the call in the manifest.
    pub fn add_method_token(&mut self, token: MethodToken) -> CompileResult<u16> {
        token.validate()?;
        let contract = token.hash.to_string();
        let method = token.method.clone();
        let (index, added) = self.tokens.intern(token)?;
        if added {
            self.permissions.add(contract, &method);
        }
        Ok(index)
    }

    /// Slot index of a static field
    pub fn add_static_field(&mut self, identifier: impl Into<String>) -> CompileResult<u8> {
        self.statics.allocate(identifier.into())
    }

    /// Number of allocated static fields
    pub fn static_field_count(&self) -> usize {
        self.statics.len()
    }

    /// Emit and export `_initialize`, which sizes static storage
    ///
    /// Does nothing when no static field was allocated. Calling it twice
    /// returns the method emitted the first time.
    pub fn emit_initializer(&mut self) -> CompileResult<Option<MethodId>> {
        if self.statics.is_empty() {
            return Ok(None);
        }
        if let Some(&id) = self.method_names.get(INITIALIZE_METHOD) {
            return Ok(Some(id));
        }
        let count = u8::try_from(self.statics.len()).map_err(|_| {
            CompileError::StaticSlotOverflow(format!("{} static fields", self.statics.len()))
        })?;

        let method = self.define_method(INITIALIZE_METHOD);
        self.push(method, Instruction::with_operand(Opcode::InitSSlot, vec![count])?)?;
        self.push(method, Instruction::new(Opcode::Ret))?;
        self.export_method(ExportedMethod {
            method,
            name: INITIALIZE_METHOD.to_string(),
            safe: false,
            parameters: Vec::new(),
            return_type: ParameterType::Void,
        });
        Ok(Some(method))
    }

    // ==================== Output ====================

    /// Link every method body, in definition order, into one script
    pub fn compile(mut self) -> CompileResult<CompiledContract> {
        let mut order = Vec::new();
        let mut entries = Vec::with_capacity(self.methods.len());
        for body in &self.methods {
            let Some(&first) = body.instructions.first() else {
                return Err(CompileError::EmptyMethod(body.name.clone()));
            };
            entries.push(first);
            order.extend_from_slice(&body.instructions);
        }

        let script = linker::link(&mut self.arena, &order)?;

        let offset_of = |id: InstructionId| -> CompileResult<u32> {
            self.arena
                .get(id)?
                .offset()
                .ok_or_else(|| CompileError::internal(format!("{id} was not linked")))
        };
        let mut methods = Vec::with_capacity(self.exported_methods.len());
        for exported in &self.exported_methods {
            let entry = entries
                .get(exported.method.0 as usize)
                .copied()
                .ok_or_else(|| CompileError::UnknownMethod(exported.name.clone()))?;
            methods.push(AbiMethod {
                name: exported.name.clone(),
                offset: offset_of(entry)?,
                safe: exported.safe,
                return_type: exported.return_type,
                parameters: exported.parameters.clone(),
            });
        }

        debug!(
            "Compiled '{}': {} methods, {} tokens, {} static fields, {} bytes",
            self.name,
            self.methods.len(),
            self.tokens.len(),
            self.statics.len(),
            script.len()
        );

        Ok(CompiledContract {
            name: self.name,
            source: self.source,
            script,
            tokens: self.tokens.into_vec(),
            supported_standards: self.supported_standards,
            abi: ContractAbi {
                methods,
                events: self.exported_events,
            },
            permissions: self.permissions.build(),
            extra: self.extra,
        })
    }
}

/// Linked contract, ready to be packaged
#[derive(Debug, Clone)]
pub struct CompiledContract {
    name: String,
    source: String,
    script: Vec<u8>,
    tokens: Vec<MethodToken>,
    supported_standards: Vec<String>,
    abi: ContractAbi,
    permissions: Vec<Permission>,
    extra: serde_json::Map<String, serde_json::Value>,
}

impl CompiledContract {
    /// Linked script
    pub fn script(&self) -> &[u8] {
        &self.script
    }

    /// Method tokens in first-use order
    pub fn tokens(&self) -> &[MethodToken] {
        &self.tokens
    }

    /// Entry offset of an exported method
    pub fn method_offset(&self, name: &str) -> Option<u32> {
        self.abi
            .methods
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.offset)
    }

    /// Package the script and tokens into a checksummed executable
    pub fn create_executable(&self, compiler: &str) -> CompileResult<NefFile> {
        Ok(NefFile::builder(compiler)
            .source(self.source.clone())
            .tokens(self.tokens.clone())
            .script(self.script.clone())
            .build()?)
    }

    /// Build the manifest
    pub fn create_manifest(&self) -> Manifest {
        Manifest {
            name: self.name.clone(),
            groups: Vec::new(),
            supported_standards: self.supported_standards.clone(),
            abi: self.abi.clone(),
            permissions: self.permissions.clone(),
            trusts: TrustSet::default(),
            extra: self.extra.clone(),
        }
    }
}
