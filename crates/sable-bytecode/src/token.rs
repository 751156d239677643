//! Method tokens: descriptors of calls into other contracts

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::binary::{ByteReader, write_var_bytes};
use crate::error::{BytecodeError, Result};

/// Longest method name a token may carry
pub const MAX_METHOD_NAME: usize = 32;

/// 20-byte contract identifier
///
/// Stored little-endian; displayed as `0x` followed by the big-endian hex.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash160(pub [u8; 20]);

impl Hash160 {
    /// Length in bytes
    pub const LEN: usize = 20;

    /// Raw little-endian bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        write!(f, "0x{}", hex::encode(reversed))
    }
}

impl fmt::Debug for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash160({self})")
    }
}

impl FromStr for Hash160 {
    type Err = BytecodeError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| BytecodeError::format(format!("invalid hash160 '{s}': {e}")))?;
        bytes.reverse();
        Ok(Self(bytes))
    }
}

impl Serialize for Hash160 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash160 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Permissions granted to a called contract
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CallFlags(u8);

impl CallFlags {
    /// No permissions
    pub const NONE: Self = Self(0);
    /// May read contract state
    pub const READ_STATES: Self = Self(0b0001);
    /// May write contract state
    pub const WRITE_STATES: Self = Self(0b0010);
    /// May call other contracts
    pub const ALLOW_CALL: Self = Self(0b0100);
    /// May emit notifications
    pub const ALLOW_NOTIFY: Self = Self(0b1000);
    /// Read and write state
    pub const STATES: Self = Self(0b0011);
    /// Read state and call
    pub const READ_ONLY: Self = Self(0b0101);
    /// Everything
    pub const ALL: Self = Self(0b1111);

    /// Build from raw bits, rejecting undefined ones
    pub fn from_bits(bits: u8) -> Option<Self> {
        (bits & !Self::ALL.0 == 0).then_some(Self(bits))
    }

    /// Raw bits
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every flag in `other` is set
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl TryFrom<u8> for CallFlags {
    type Error = BytecodeError;

    fn try_from(bits: u8) -> Result<Self> {
        Self::from_bits(bits)
            .ok_or_else(|| BytecodeError::format(format!("invalid call flags 0x{bits:02X}")))
    }
}

impl From<CallFlags> for u8 {
    fn from(flags: CallFlags) -> Self {
        flags.0
    }
}

impl std::ops::BitOr for CallFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Descriptor of one external call signature
///
/// Two tokens are the same token when all five fields are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodToken {
    /// Called contract
    pub hash: Hash160,
    /// Called method
    pub method: String,
    /// Number of arguments
    pub parameters_count: u16,
    /// Whether the call leaves a value on the stack
    pub has_return_value: bool,
    /// Permissions granted to the callee
    pub call_flags: CallFlags,
}

impl MethodToken {
    /// Check the rules every stored token must satisfy
    pub fn validate(&self) -> Result<()> {
        if self.method.len() > MAX_METHOD_NAME {
            return Err(BytecodeError::format(format!(
                "token method '{}' is {} bytes, limit is {MAX_METHOD_NAME}",
                self.method,
                self.method.len()
            )));
        }
        if self.method.starts_with('_') {
            return Err(BytecodeError::format(format!(
                "token method '{}' must not start with '_'",
                self.method
            )));
        }
        CallFlags::try_from(self.call_flags.0)?;
        Ok(())
    }

    /// Append the serialized token to `out`
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        self.validate()?;
        out.extend_from_slice(self.hash.as_bytes());
        write_var_bytes(out, self.method.as_bytes());
        out.extend_from_slice(&self.parameters_count.to_le_bytes());
        out.push(u8::from(self.has_return_value));
        out.push(self.call_flags.bits());
        Ok(())
    }

    /// Read one token, validating its fields
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self> {
        let hash = Hash160(reader.read_fixed()?);
        let method = reader.read_var_string(MAX_METHOD_NAME)?;
        let parameters_count = reader.read_u16()?;
        let has_return_value = match reader.read_u8()? {
            0 => false,
            1 => true,
            other => {
                return Err(BytecodeError::format(format!(
                    "invalid boolean byte 0x{other:02X} in token"
                )));
            }
        };
        let call_flags = CallFlags(reader.read_u8()?);
        let token = Self {
            hash,
            method,
            parameters_count,
            has_return_value,
            call_flags,
        };
        token.validate()?;
        Ok(token)
    }
}

impl fmt::Display for MethodToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{}({} args{}) flags=0x{:X}",
            self.hash,
            self.method,
            self.parameters_count,
            if self.has_return_value { ", returns" } else { "" },
            self.call_flags.bits()
        )
    }
}
