//! Dead code elimination on linked scripts
//!
//! The optimizer works on the concrete instruction stream of an already
//! linked executable, not on the abstract instructions. Addresses embedded in
//! operands are displacements relative to each instruction, exactly as the
//! linker wrote them.
//!
//! ## Reachability
//!
//! A walk starts at an offset and scans forward in touching mode, marking every
//! instruction it visits except `NOP`. Each embedded address marks its target
//! and queues a new walk from there. After an instruction that never falls
//! through (`JMP`, `JMP_L`, `RET`, `THROW`, `ABORT`) the walk stops marking until
//! it reaches an offset that is already marked. Conditional branches are not
//! evaluated: their fallthrough and their target are both reachable.
//!
//! Pending walks sit on an explicit worklist so jump chains cannot exhaust the
//! call stack.

use rustc_hash::{FxHashMap, FxHashSet};
use sable_bytecode::{NefFile, NefInstruction, Opcode, decode_script, encode_script};
use tracing::{debug, trace};

use crate::error::{CompileError, CompileResult};
use crate::manifest::Manifest;

/// Old offset to new offset of every surviving instruction
pub type OffsetMap = FxHashMap<usize, usize>;

/// Decoded, offset-stamped script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    instructions: Vec<NefInstruction>,
    len: usize,
}

impl Script {
    /// Decode a whole script
    pub fn decode(bytes: &[u8]) -> CompileResult<Self> {
        Ok(Self {
            instructions: decode_script(bytes)?,
            len: bytes.len(),
        })
    }

    /// Instructions in stream order
    pub fn instructions(&self) -> &[NefInstruction] {
        &self.instructions
    }

    /// Script length in bytes as last laid out
    pub fn byte_len(&self) -> usize {
        self.len
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the script has no instructions
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Recompute offsets after removals and rewrite every embedded address
    ///
    /// Each address must point at a surviving instruction or at the end of the
    /// script; the end of the old script maps to the end of the new one.
    pub fn relayout(&mut self) -> CompileResult<OffsetMap> {
        let mut map = OffsetMap::default();
        let mut cursor = 0usize;
        for instruction in &self.instructions {
            map.insert(instruction.offset(), cursor);
            cursor += instruction.size();
        }
        let old_len = self.len;
        let new_len = cursor;

        for instruction in &mut self.instructions {
            let old_offset = instruction.offset();
            let new_offset = map[&old_offset];
            for (index, target) in instruction.targets()?.into_iter().enumerate() {
                let new_target = match usize::try_from(target) {
                    Ok(t) if t == old_len => new_len,
                    Ok(t) => match map.get(&t) {
                        Some(&t) => t,
                        None => {
                            return Err(CompileError::InvalidAddress {
                                offset: old_offset,
                                target,
                            });
                        }
                    },
                    Err(_) => {
                        return Err(CompileError::InvalidAddress {
                            offset: old_offset,
                            target,
                        });
                    }
                };
                let displacement = new_target as i64 - new_offset as i64;
                let displacement = i32::try_from(displacement)
                    .map_err(|_| CompileError::ScriptTooLarge(new_len as u64))?;
                instruction.write_address(index, displacement)?;
            }
            instruction.set_offset(new_offset);
        }

        self.len = new_len;
        Ok(map)
    }

    /// Encode back into script bytes
    pub fn encode(&self) -> Vec<u8> {
        encode_script(&self.instructions)
    }
}

/// Removes instructions unreachable from the entry points
#[derive(Debug, Clone)]
pub struct DeadCodeEliminator {
    entry_points: Vec<usize>,
}

impl Default for DeadCodeEliminator {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadCodeEliminator {
    /// Eliminator rooted at offset 0
    pub fn new() -> Self {
        Self {
            entry_points: Vec::new(),
        }
    }

    /// Also keep everything reachable from `offsets`, e.g. exported methods
    ///
    /// Extra entry points are marked reachable up front, like jump targets.
    pub fn with_entry_points(mut self, offsets: impl IntoIterator<Item = usize>) -> Self {
        self.entry_points.extend(offsets);
        self
    }

    /// Offsets proven reachable
    pub fn reachable(&self, instructions: &[NefInstruction]) -> CompileResult<FxHashSet<i64>> {
        let mut touched = FxHashSet::default();
        let mut pending = vec![0i64];
        for &entry in &self.entry_points {
            let entry = entry as i64;
            if touched.insert(entry) {
                pending.push(entry);
            }
        }

        while let Some(start) = pending.pop() {
            walk(instructions, start, &mut touched, &mut pending)?;
        }
        Ok(touched)
    }

    /// Remove unreachable instructions in place; returns how many were removed
    pub fn eliminate(&self, instructions: &mut Vec<NefInstruction>) -> CompileResult<usize> {
        let touched = self.reachable(instructions)?;
        let before = instructions.len();
        instructions.retain(|instruction| {
            let keep = touched.contains(&(instruction.offset() as i64));
            if !keep {
                trace!("Removing dead {instruction}");
            }
            keep
        });
        let removed = before - instructions.len();
        debug!("Dead code elimination removed {removed} of {before} instructions");
        Ok(removed)
    }

    /// Remove unreachable instructions from a script and lay it out again
    pub fn run(&self, script: &mut Script) -> CompileResult<OffsetMap> {
        self.eliminate(&mut script.instructions)?;
        script.relayout()
    }
}

fn walk(
    instructions: &[NefInstruction],
    start: i64,
    touched: &mut FxHashSet<i64>,
    pending: &mut Vec<i64>,
) -> CompileResult<()> {
    let first = instructions.partition_point(|i| (i.offset() as i64) < start);
    let mut touching = true;

    for instruction in &instructions[first..] {
        let offset = instruction.offset() as i64;
        if touching {
            if instruction.opcode() == Opcode::Nop {
                continue;
            }
            touched.insert(offset);
            for target in instruction.targets()? {
                if touched.insert(target) {
                    pending.push(target);
                }
            }
        } else if touched.contains(&offset) {
            touching = true;
        }

        if instruction.opcode().is_terminator() {
            touching = false;
        }
    }
    Ok(())
}

/// Executable after dead code elimination
#[derive(Debug, Clone)]
pub struct OptimizedScript {
    /// Rewritten executable with a fresh checksum
    pub nef: NefFile,
    /// Old offset to new offset of every surviving instruction
    pub offset_map: OffsetMap,
    /// Number of removed instructions
    pub removed: usize,
}

impl OptimizedScript {
    /// Move manifest method offsets to the new layout
    ///
    /// The manifest is left untouched when any method cannot be moved.
    pub fn remap_manifest(&self, manifest: &mut Manifest) -> CompileResult<()> {
        let offsets = manifest
            .abi
            .methods
            .iter()
            .map(|method| {
                self.offset_map
                    .get(&(method.offset as usize))
                    .map(|&new| new as u32)
                    .ok_or_else(|| {
                        CompileError::internal(format!(
                            "method '{}' at offset {} did not survive optimization",
                            method.name, method.offset
                        ))
                    })
            })
            .collect::<CompileResult<Vec<_>>>()?;
        for (method, offset) in manifest.abi.methods.iter_mut().zip(offsets) {
            method.offset = offset;
        }
        Ok(())
    }
}

/// Run dead code elimination over an executable's script
///
/// `entry_points` are kept along with offset 0. Compiler, source and tokens
/// carry over unchanged.
pub fn optimize_executable(nef: &NefFile, entry_points: &[usize]) -> CompileResult<OptimizedScript> {
    let mut script = Script::decode(&nef.script)?;
    let before = script.len();
    let offset_map = DeadCodeEliminator::new()
        .with_entry_points(entry_points.iter().copied())
        .run(&mut script)?;

    let optimized = NefFile::builder(nef.compiler.clone())
        .source(nef.source.clone())
        .tokens(nef.tokens.clone())
        .script(script.encode())
        .build()?;

    debug!(
        "Optimized script from {} to {} bytes",
        nef.script.len(),
        optimized.script.len()
    );

    Ok(OptimizedScript {
        nef: optimized,
        offset_map,
        removed: before - script.len(),
    })
}
