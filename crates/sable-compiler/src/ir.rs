//! Abstract instructions emitted by method lowering
//!
//! Instructions live in an [`InstructionArena`] and refer to each other by
//! [`InstructionId`]. Branch operands stay zeroed until the linker has fixed
//! every offset and rewrites them from the symbolic targets.

use std::fmt;

use sable_bytecode::instruction::check_operand;
use sable_bytecode::{AddressClass, Opcode};

use crate::error::{CompileError, CompileResult};

/// Stable handle to an instruction in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstructionId(u32);

impl InstructionId {
    /// Arena index
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InstructionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Branch target slots, shaped by the opcode's address class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Targets {
    /// Not a branch
    #[default]
    None,
    /// Single-target branch
    Single(Option<InstructionId>),
    /// Exception scope: catch and finally
    Dual(Option<InstructionId>, Option<InstructionId>),
}

impl Targets {
    fn for_opcode(opcode: Opcode, previous: Targets) -> Self {
        let (first, second) = match previous {
            Targets::None => (None, None),
            Targets::Single(t) => (t, None),
            Targets::Dual(t, t2) => (t, t2),
        };
        match opcode.address_class() {
            None => Targets::None,
            Some(AddressClass::Short | AddressClass::Long) => Targets::Single(first),
            Some(AddressClass::ShortDual | AddressClass::LongDual) => Targets::Dual(first, second),
        }
    }
}

/// One abstract instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    opcode: Opcode,
    operand: Vec<u8>,
    targets: Targets,
    offset: Option<u32>,
}

impl Instruction {
    /// Create an instruction with a zeroed operand of the opcode's fixed width
    pub fn new(opcode: Opcode) -> Self {
        let mut instruction = Self {
            opcode: Opcode::Nop,
            operand: Vec::new(),
            targets: Targets::None,
            offset: None,
        };
        instruction.set_opcode(opcode);
        instruction
    }

    /// Create an instruction with explicit operand bytes
    pub fn with_operand(opcode: Opcode, operand: impl Into<Vec<u8>>) -> CompileResult<Self> {
        let mut instruction = Self::new(opcode);
        instruction.set_operand(operand)?;
        Ok(instruction)
    }

    /// Create a single-target branch
    pub fn branch(opcode: Opcode, target: InstructionId) -> CompileResult<Self> {
        let mut instruction = Self::new(opcode);
        instruction.set_target(target)?;
        Ok(instruction)
    }

    /// Create an exception scope entry (`TRY` / `TRY_L`)
    pub fn try_scope(
        opcode: Opcode,
        catch: Option<InstructionId>,
        finally: Option<InstructionId>,
    ) -> CompileResult<Self> {
        let mut instruction = Self::new(opcode);
        match &mut instruction.targets {
            Targets::Dual(t, t2) => {
                *t = catch;
                *t2 = finally;
            }
            _ => return Err(CompileError::NotABranch { opcode }),
        }
        Ok(instruction)
    }

    /// Push an integer using the shortest encoding
    pub fn push_int(value: i64) -> Self {
        match value {
            -1 => Self::new(Opcode::PushM1),
            0..=16 => {
                let opcode = Opcode::from_byte(Opcode::Push0.to_byte() + value as u8)
                    .unwrap_or(Opcode::Push0);
                Self::new(opcode)
            }
            _ => {
                let (opcode, bytes): (Opcode, Vec<u8>) = if let Ok(v) = i8::try_from(value) {
                    (Opcode::PushInt8, v.to_le_bytes().to_vec())
                } else if let Ok(v) = i16::try_from(value) {
                    (Opcode::PushInt16, v.to_le_bytes().to_vec())
                } else if let Ok(v) = i32::try_from(value) {
                    (Opcode::PushInt32, v.to_le_bytes().to_vec())
                } else {
                    (Opcode::PushInt64, value.to_le_bytes().to_vec())
                };
                Self {
                    opcode,
                    operand: bytes,
                    targets: Targets::None,
                    offset: None,
                }
            }
        }
    }

    /// Push a byte string using the smallest length prefix
    pub fn push_data(data: impl Into<Vec<u8>>) -> CompileResult<Self> {
        let data = data.into();
        let opcode = match data.len() {
            0..=0xFF => Opcode::PushData1,
            0x100..=0xFFFF => Opcode::PushData2,
            _ => Opcode::PushData4,
        };
        Self::with_operand(opcode, data)
    }

    /// Opcode
    #[inline]
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Operand bytes
    #[inline]
    pub fn operand(&self) -> &[u8] {
        &self.operand
    }

    /// Branch target slots
    #[inline]
    pub fn targets(&self) -> Targets {
        self.targets
    }

    /// Primary target
    pub fn target(&self) -> Option<InstructionId> {
        match self.targets {
            Targets::None => None,
            Targets::Single(t) | Targets::Dual(t, _) => t,
        }
    }

    /// Secondary target (finally block of an exception scope)
    pub fn target2(&self) -> Option<InstructionId> {
        match self.targets {
            Targets::Dual(_, t2) => t2,
            _ => None,
        }
    }

    /// Offset assigned by the linker
    #[inline]
    pub fn offset(&self) -> Option<u32> {
        self.offset
    }

    pub(crate) fn set_offset(&mut self, offset: u32) {
        self.offset = Some(offset);
    }

    pub(crate) fn write_resolved_operand(&mut self, operand: Vec<u8>) {
        debug_assert_eq!(operand.len(), self.operand.len());
        self.operand = operand;
    }

    /// Encoded size: opcode byte, length prefix and operand
    #[inline]
    pub fn size(&self) -> usize {
        1 + self.opcode.operand_size().prefix as usize + self.operand.len()
    }

    /// Change the opcode
    ///
    /// A fixed-width operand is resized to the new width, keeping leading
    /// bytes. Target slots are reshaped to the new address class; the primary
    /// target survives a change between branch opcodes and is dropped when the
    /// new opcode is not a branch.
    pub fn set_opcode(&mut self, opcode: Opcode) {
        let framing = opcode.operand_size();
        if !framing.is_prefixed() {
            self.operand.resize(framing.size as usize, 0);
        }
        self.targets = Targets::for_opcode(opcode, self.targets);
        self.opcode = opcode;
    }

    /// Replace the operand, validating it against the opcode's framing
    pub fn set_operand(&mut self, operand: impl Into<Vec<u8>>) -> CompileResult<()> {
        let operand = operand.into();
        check_operand(self.opcode, &operand)?;
        self.operand = operand;
        Ok(())
    }

    /// Bind the primary target
    pub fn set_target(&mut self, target: InstructionId) -> CompileResult<()> {
        match &mut self.targets {
            Targets::None => Err(CompileError::NotABranch {
                opcode: self.opcode,
            }),
            Targets::Single(t) | Targets::Dual(t, _) => {
                *t = Some(target);
                Ok(())
            }
        }
    }

    /// Bind the secondary target of an exception scope
    pub fn set_target2(&mut self, target: InstructionId) -> CompileResult<()> {
        match &mut self.targets {
            Targets::Dual(_, t2) => {
                *t2 = Some(target);
                Ok(())
            }
            _ => Err(CompileError::NotABranch {
                opcode: self.opcode,
            }),
        }
    }
}

/// Owner of every instruction in one compilation
#[derive(Debug, Default)]
pub struct InstructionArena {
    instructions: Vec<Instruction>,
}

impl InstructionArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an instruction and return its handle
    pub fn alloc(&mut self, instruction: Instruction) -> InstructionId {
        let id = InstructionId(self.instructions.len() as u32);
        self.instructions.push(instruction);
        id
    }

    /// Look up an instruction
    pub fn get(&self, id: InstructionId) -> CompileResult<&Instruction> {
        self.instructions
            .get(id.index())
            .ok_or(CompileError::UnknownInstruction(id))
    }

    /// Look up an instruction mutably
    pub fn get_mut(&mut self, id: InstructionId) -> CompileResult<&mut Instruction> {
        self.instructions
            .get_mut(id.index())
            .ok_or(CompileError::UnknownInstruction(id))
    }

    /// Number of instructions
    #[inline]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the arena is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
