//! NEF executable container

use std::io::{Read, Write};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::binary::{ByteReader, write_var_bytes, write_var_int};
use crate::error::{BytecodeError, Result};
use crate::instruction::{NefInstruction, decode_script};
use crate::token::MethodToken;

/// Magic number at the start of every executable ("NEF3")
pub const NEF_MAGIC: u32 = 0x3346_454E;

/// Width of the zero-padded compiler field
pub const COMPILER_FIELD_LEN: usize = 64;

/// Longest source URL
pub const MAX_SOURCE_LEN: usize = 256;

/// Most method tokens an executable may carry
pub const MAX_TOKENS: usize = 128;

/// Largest script accepted
pub const MAX_SCRIPT_LEN: usize = 512 * 1024;

/// A compiled executable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NefFile {
    /// Identifier of the compiler that produced the script
    pub compiler: String,

    /// Source URL (optional, may be empty)
    pub source: String,

    /// Method tokens, in first-use order
    pub tokens: Vec<MethodToken>,

    /// Linked script
    pub script: Vec<u8>,

    /// Checksum over everything above
    pub checksum: u32,
}

impl NefFile {
    /// Create a new executable builder
    pub fn builder(compiler: impl Into<String>) -> NefBuilder {
        NefBuilder::new(compiler)
    }

    /// Serialize every field except the checksum
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        let compiler = self.compiler.as_bytes();
        if compiler.len() > COMPILER_FIELD_LEN {
            return Err(BytecodeError::format(format!(
                "compiler identifier is {} bytes, limit is {COMPILER_FIELD_LEN}",
                compiler.len()
            )));
        }
        if self.source.len() > MAX_SOURCE_LEN {
            return Err(BytecodeError::format(format!(
                "source is {} bytes, limit is {MAX_SOURCE_LEN}",
                self.source.len()
            )));
        }
        if self.tokens.len() > MAX_TOKENS {
            return Err(BytecodeError::format(format!(
                "{} method tokens, limit is {MAX_TOKENS}",
                self.tokens.len()
            )));
        }
        if self.script.is_empty() || self.script.len() > MAX_SCRIPT_LEN {
            return Err(BytecodeError::format(format!(
                "script length {} outside 1..={MAX_SCRIPT_LEN}",
                self.script.len()
            )));
        }

        out.extend_from_slice(&NEF_MAGIC.to_le_bytes());
        out.extend_from_slice(compiler);
        out.resize(out.len() + COMPILER_FIELD_LEN - compiler.len(), 0);
        write_var_bytes(out, self.source.as_bytes());
        out.push(0);
        write_var_int(out, self.tokens.len() as u64);
        for token in &self.tokens {
            token.encode(out)?;
        }
        out.extend_from_slice(&0u16.to_le_bytes());
        write_var_bytes(out, &self.script);
        Ok(())
    }

    /// Checksum of the current content: first four bytes of a double SHA-256
    pub fn compute_checksum(&self) -> Result<u32> {
        let mut body = Vec::new();
        self.encode_body(&mut body)?;
        Ok(checksum_of(&body))
    }

    /// Recompute and store the checksum
    pub fn update_checksum(&mut self) -> Result<()> {
        self.checksum = self.compute_checksum()?;
        Ok(())
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(COMPILER_FIELD_LEN + self.script.len() + 32);
        self.encode_body(&mut bytes)?;
        bytes.extend_from_slice(&self.checksum.to_le_bytes());
        Ok(bytes)
    }

    /// Deserialize from bytes, validating the checksum
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);

        let magic = reader.read_u32()?;
        if magic != NEF_MAGIC {
            return Err(BytecodeError::InvalidMagic(magic));
        }

        let raw = reader.read_bytes(COMPILER_FIELD_LEN)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        if raw[end..].iter().any(|&b| b != 0) {
            return Err(BytecodeError::format("compiler field is not zero padded"));
        }
        let compiler = String::from_utf8(raw[..end].to_vec())
            .map_err(|e| BytecodeError::format(format!("compiler field: {e}")))?;

        let source = reader.read_var_string(MAX_SOURCE_LEN)?;
        if reader.read_u8()? != 0 {
            return Err(BytecodeError::format("reserved byte must be zero"));
        }

        let count = reader.read_var_int(MAX_TOKENS as u64)? as usize;
        let tokens = (0..count)
            .map(|_| MethodToken::decode(&mut reader))
            .collect::<Result<Vec<_>>>()?;

        if reader.read_u16()? != 0 {
            return Err(BytecodeError::format("reserved field must be zero"));
        }

        let script = reader.read_var_bytes(MAX_SCRIPT_LEN)?.to_vec();
        if script.is_empty() {
            return Err(BytecodeError::format("script is empty"));
        }

        let body_len = reader.position();
        let stored = reader.read_u32()?;
        if !reader.is_empty() {
            return Err(BytecodeError::format(format!(
                "{} trailing bytes after checksum",
                reader.remaining()
            )));
        }

        let computed = checksum_of(&bytes[..body_len]);
        if stored != computed {
            return Err(BytecodeError::ChecksumMismatch { stored, computed });
        }

        Ok(Self {
            compiler,
            source,
            tokens,
            script,
            checksum: stored,
        })
    }

    /// Write executable to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let bytes = self.to_bytes()?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    /// Read executable from a reader
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    /// Decode the script into instructions
    pub fn instructions(&self) -> Result<Vec<NefInstruction>> {
        decode_script(&self.script)
    }
}

fn checksum_of(body: &[u8]) -> u32 {
    let first = Sha256::digest(body);
    let second = Sha256::digest(first);
    u32::from_le_bytes([second[0], second[1], second[2], second[3]])
}

/// Builder for creating executables
#[derive(Debug)]
pub struct NefBuilder {
    compiler: String,
    source: String,
    tokens: Vec<MethodToken>,
    script: Vec<u8>,
}

impl NefBuilder {
    /// Create a new executable builder
    pub fn new(compiler: impl Into<String>) -> Self {
        Self {
            compiler: compiler.into(),
            source: String::new(),
            tokens: Vec::new(),
            script: Vec::new(),
        }
    }

    /// Set source URL
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Set method tokens
    pub fn tokens(mut self, tokens: Vec<MethodToken>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Set script bytes
    pub fn script(mut self, script: Vec<u8>) -> Self {
        self.script = script;
        self
    }

    /// Build the executable, computing its checksum
    pub fn build(self) -> Result<NefFile> {
        let mut nef = NefFile {
            compiler: self.compiler,
            source: self.source,
            tokens: self.tokens,
            script: self.script,
            checksum: 0,
        };
        nef.update_checksum()?;
        Ok(nef)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{CallFlags, Hash160};

    fn sample() -> NefFile {
        NefFile::builder("sablec 0.1.0")
            .tokens(vec![MethodToken {
                hash: Hash160([7; 20]),
                method: "balanceOf".to_string(),
                parameters_count: 1,
                has_return_value: true,
                call_flags: CallFlags::READ_ONLY,
            }])
            .script(vec![0x11, 0x40])
            .build()
            .unwrap()
    }

    #[test]
    fn test_nef_roundtrip() {
        let nef = sample();
        let bytes = nef.to_bytes().unwrap();
        let restored = NefFile::from_bytes(&bytes).unwrap();
        assert_eq!(restored, nef);
        assert_eq!(restored.compiler, "sablec 0.1.0");
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            NefFile::from_bytes(&bytes),
            Err(BytecodeError::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_compiler_too_long() {
        let result = NefFile::builder("x".repeat(65)).script(vec![0x40]).build();
        assert!(matches!(result, Err(BytecodeError::InvalidFormat(_))));
    }

    #[test]
    fn test_empty_script_rejected() {
        let result = NefFile::builder("sablec").build();
        assert!(matches!(result, Err(BytecodeError::InvalidFormat(_))));
    }
}
