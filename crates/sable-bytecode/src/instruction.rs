//! Concrete instructions as they appear in a serialized script
//!
//! A [`NefInstruction`] is one decoded opcode with its operand bytes and the
//! byte offset it was read from. Jump addresses inside the operand are signed
//! little-endian displacements relative to the instruction's own offset.

use std::fmt;
use std::io::Write;

use serde::Serialize;

use crate::binary::ByteReader;
use crate::error::{BytecodeError, Result};
use crate::opcode::Opcode;

/// One concrete instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NefInstruction {
    opcode: Opcode,
    operand: Vec<u8>,
    offset: usize,
}

impl NefInstruction {
    /// Create an instruction, checking the operand against the opcode's framing
    pub fn new(opcode: Opcode, operand: impl Into<Vec<u8>>) -> Result<Self> {
        let operand = operand.into();
        check_operand(opcode, &operand)?;
        Ok(Self {
            opcode,
            operand,
            offset: 0,
        })
    }

    /// Create an operand-less instruction
    pub fn simple(opcode: Opcode) -> Result<Self> {
        Self::new(opcode, Vec::new())
    }

    /// Stamp the instruction with a stream offset
    pub fn at(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
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

    /// Stream offset
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Move the instruction to a new offset
    #[inline]
    pub fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }

    /// Encoded size: opcode byte, length prefix and operand
    #[inline]
    pub fn size(&self) -> usize {
        1 + self.opcode.operand_size().prefix as usize + self.operand.len()
    }

    /// Replace the opcode, resizing a fixed operand to the new width
    ///
    /// Leading operand bytes are kept, missing bytes are zero filled.
    pub fn set_opcode(&mut self, opcode: Opcode) {
        let framing = opcode.operand_size();
        if !framing.is_prefixed() {
            self.operand.resize(framing.size as usize, 0);
        }
        self.opcode = opcode;
    }

    /// Width of each embedded address (0 when the opcode carries none)
    pub fn address_size(&self) -> usize {
        self.opcode.address_class().map_or(0, |c| c.width())
    }

    /// Number of embedded addresses
    pub fn address_count(&self) -> usize {
        self.opcode.address_class().map_or(0, |c| c.count())
    }

    fn address_slot(&self, index: usize) -> Result<std::ops::Range<usize>> {
        let Some(class) = self.opcode.address_class() else {
            return Err(BytecodeError::NoAddress {
                opcode: self.opcode,
                offset: self.offset,
            });
        };
        if index >= class.count() {
            return Err(BytecodeError::AddressIndexOutOfRange {
                opcode: self.opcode,
                count: class.count(),
                index,
            });
        }
        let start = index * class.width();
        Ok(start..start + class.width())
    }

    /// Read the `index`-th embedded displacement
    pub fn read_address(&self, index: usize) -> Result<i32> {
        let slot = self.address_slot(index)?;
        let bytes = &self.operand[slot];
        Ok(match bytes {
            &[b] => i32::from(b as i8),
            &[a, b, c, d] => i32::from_le_bytes([a, b, c, d]),
            _ => unreachable!("address widths are 1 or 4"),
        })
    }

    /// Overwrite the `index`-th embedded displacement in place
    pub fn write_address(&mut self, index: usize, value: i32) -> Result<()> {
        let slot = self.address_slot(index)?;
        let width = slot.len();
        if width == 1 {
            let narrow = i8::try_from(value).map_err(|_| BytecodeError::AddressOutOfRange {
                opcode: self.opcode,
                width,
                value,
            })?;
            self.operand[slot.start] = narrow as u8;
        } else {
            self.operand[slot].copy_from_slice(&value.to_le_bytes());
        }
        Ok(())
    }

    /// Absolute offsets the embedded addresses point at
    pub fn targets(&self) -> Result<Vec<i64>> {
        (0..self.address_count())
            .map(|i| Ok(self.offset as i64 + i64::from(self.read_address(i)?)))
            .collect()
    }

    /// Decode the next instruction, or `None` at a clean end of stream
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Option<Self>> {
        if reader.is_empty() {
            return Ok(None);
        }
        let offset = reader.position();
        let byte = reader.read_u8()?;
        let opcode = Opcode::from_byte(byte).ok_or(BytecodeError::InvalidOpcode { byte, offset })?;
        let framing = opcode.operand_size();
        let len = match framing.prefix {
            0 => framing.size as usize,
            1 => reader.read_u8()? as usize,
            2 => reader.read_u16()? as usize,
            _ => reader.read_u32()? as usize,
        };
        let operand = reader.read_bytes(len)?.to_vec();
        Ok(Some(Self {
            opcode,
            operand,
            offset,
        }))
    }

    /// Append the encoded instruction to `out`
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.opcode.to_byte());
        let len = self.operand.len() as u32;
        match self.opcode.operand_size().prefix {
            0 => {}
            1 => out.push(len as u8),
            2 => out.extend_from_slice(&(len as u16).to_le_bytes()),
            _ => out.extend_from_slice(&len.to_le_bytes()),
        }
        out.extend_from_slice(&self.operand);
    }

    /// Write the encoded instruction to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buf = Vec::with_capacity(self.size());
        self.encode(&mut buf);
        writer.write_all(&buf)?;
        Ok(())
    }
}

/// Check an operand against the framing table
pub fn check_operand(opcode: Opcode, operand: &[u8]) -> Result<()> {
    let framing = opcode.operand_size();
    if framing.is_prefixed() {
        let limit = match framing.prefix {
            1 => u8::MAX as usize,
            2 => u16::MAX as usize,
            _ => u32::MAX as usize,
        };
        if operand.len() > limit {
            return Err(BytecodeError::OperandTooLong {
                opcode,
                prefix: framing.prefix,
                len: operand.len(),
            });
        }
    } else if operand.len() != framing.size as usize {
        return Err(BytecodeError::OperandSizeMismatch {
            opcode,
            expected: framing.size as usize,
            actual: operand.len(),
        });
    }
    Ok(())
}

/// Decode a whole script into offset-stamped instructions
pub fn decode_script(script: &[u8]) -> Result<Vec<NefInstruction>> {
    let mut reader = ByteReader::new(script);
    let mut instructions = Vec::new();
    while let Some(instruction) = NefInstruction::decode(&mut reader)? {
        instructions.push(instruction);
    }
    Ok(instructions)
}

/// Encode instructions back into a script, in list order
pub fn encode_script(instructions: &[NefInstruction]) -> Vec<u8> {
    let mut out = Vec::with_capacity(instructions.iter().map(|i| i.size()).sum());
    for instruction in instructions {
        instruction.encode(&mut out);
    }
    out
}

impl fmt::Display for NefInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}: {}", self.offset, self.opcode)?;
        if self.address_count() > 0 {
            for i in 0..self.address_count() {
                let disp = self.read_address(i).map_err(|_| fmt::Error)?;
                write!(f, " {:+} (-> {:04X})", disp, self.offset as i64 + i64::from(disp))?;
            }
        } else if !self.operand.is_empty() {
            write!(f, " {}", hex::encode(&self.operand))?;
        }
        Ok(())
    }
}
