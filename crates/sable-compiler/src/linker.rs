//! Offset assignment and branch resolution
//!
//! Linking runs two passes over the final instruction order. The first pass
//! stamps each instruction with its byte offset; sizes never depend on offsets,
//! so one scan is enough. The second pass rewrites every branch operand as a
//! displacement from the branching instruction to its target, then encodes the
//! program with the concrete instruction codec.

use sable_bytecode::{AddressClass, NefInstruction};
use tracing::debug;

use crate::error::{CompileError, CompileResult};
use crate::ir::{InstructionArena, InstructionId, Targets};

/// Resolves a placed instruction sequence into script bytes
pub struct Linker<'a> {
    arena: &'a mut InstructionArena,
    placed: Vec<bool>,
}

impl<'a> Linker<'a> {
    /// Create a linker over an arena
    pub fn new(arena: &'a mut InstructionArena) -> Self {
        let placed = vec![false; arena.len()];
        Self { arena, placed }
    }

    /// Link `order` into a script
    ///
    /// Every id must appear at most once, and every branch target must be
    /// part of `order`.
    pub fn link(mut self, order: &[InstructionId]) -> CompileResult<Vec<u8>> {
        let length = self.assign_offsets(order)?;

        let mut script = Vec::with_capacity(length as usize);
        for &id in order {
            self.resolve_branch(id)?;
            let instruction = self.arena.get(id)?;
            NefInstruction::new(instruction.opcode(), instruction.operand())?.encode(&mut script);
        }

        if script.len() as u64 != length {
            return Err(CompileError::internal(format!(
                "script is {} bytes, offsets assumed {length}",
                script.len()
            )));
        }

        debug!("Linked {} instructions into {} bytes", order.len(), script.len());
        Ok(script)
    }

    /// Offset pass; returns the total script length
    fn assign_offsets(&mut self, order: &[InstructionId]) -> CompileResult<u64> {
        let mut cursor: u64 = 0;
        for &id in order {
            let instruction = self.arena.get_mut(id)?;
            if self.placed[id.index()] {
                return Err(CompileError::DuplicatePlacement {
                    id,
                    opcode: instruction.opcode(),
                });
            }
            self.placed[id.index()] = true;

            let offset = u32::try_from(cursor).map_err(|_| CompileError::ScriptTooLarge(cursor))?;
            instruction.set_offset(offset);
            cursor += instruction.size() as u64;
        }
        Ok(cursor)
    }

    /// Rewrite the operand of one instruction from its symbolic targets
    fn resolve_branch(&mut self, id: InstructionId) -> CompileResult<()> {
        let instruction = self.arena.get(id)?;
        let opcode = instruction.opcode();
        let Some(class) = opcode.address_class() else {
            return Ok(());
        };
        let origin = instruction
            .offset()
            .ok_or_else(|| CompileError::internal(format!("{opcode} {id} has no offset")))?;

        let slots = match instruction.targets() {
            Targets::None => {
                return Err(CompileError::internal(format!(
                    "{opcode} {id} has no target slots"
                )));
            }
            Targets::Single(None) | Targets::Dual(None, None) => {
                return Err(CompileError::UnboundBranch { id, opcode });
            }
            Targets::Single(Some(target)) => vec![Some(target)],
            Targets::Dual(catch, finally) => vec![catch, finally],
        };

        let mut concrete = NefInstruction::new(opcode, instruction.operand())?;
        for (index, slot) in slots.into_iter().enumerate() {
            // An unbound handler of an exception scope is encoded as zero
            let displacement = match slot {
                Some(target) => i64::from(self.target_offset(id, target)?) - i64::from(origin),
                None => 0,
            };
            let fits = match class {
                AddressClass::Short | AddressClass::ShortDual => i8::try_from(displacement).is_ok(),
                AddressClass::Long | AddressClass::LongDual => i32::try_from(displacement).is_ok(),
            };
            if !fits {
                return Err(CompileError::DisplacementOutOfRange {
                    id,
                    opcode,
                    offset: origin,
                    displacement,
                });
            }
            concrete.write_address(index, displacement as i32)?;
        }

        let operand = concrete.operand().to_vec();
        self.arena.get_mut(id)?.write_resolved_operand(operand);
        Ok(())
    }

    fn target_offset(&self, from: InstructionId, target: InstructionId) -> CompileResult<u32> {
        let instruction = self.arena.get(target)?;
        match instruction.offset() {
            Some(offset) if self.placed[target.index()] => Ok(offset),
            _ => Err(CompileError::DanglingTarget {
                id: from,
                opcode: self.arena.get(from)?.opcode(),
                target,
            }),
        }
    }
}

/// Link `order` into a script
pub fn link(arena: &mut InstructionArena, order: &[InstructionId]) -> CompileResult<Vec<u8>> {
    Linker::new(arena).link(order)
}
