//! Little-endian primitives and var-int framing shared by the codecs

use crate::error::{BytecodeError, Result};

/// Cursor over a byte slice that tracks its position for error reporting
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at the start of `bytes`
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current position
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Whether the reader is exhausted
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read exactly `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(BytecodeError::UnexpectedEnd {
                offset: self.pos,
                needed: len - self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a little-endian u16
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian u32
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian u64
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a fixed-size array
    pub fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.read_array()
    }

    /// Read a var-int and reject values above `max`
    pub fn read_var_int(&mut self, max: u64) -> Result<u64> {
        let value = match self.read_u8()? {
            0xFD => u64::from(self.read_u16()?),
            0xFE => u64::from(self.read_u32()?),
            0xFF => self.read_u64()?,
            small => u64::from(small),
        };
        if value > max {
            return Err(BytecodeError::format(format!(
                "var-int {value} exceeds limit {max}"
            )));
        }
        Ok(value)
    }

    /// Read length-prefixed bytes of at most `max` bytes
    pub fn read_var_bytes(&mut self, max: usize) -> Result<&'a [u8]> {
        let len = self.read_var_int(max as u64)? as usize;
        self.read_bytes(len)
    }

    /// Read a length-prefixed UTF-8 string of at most `max` bytes
    pub fn read_var_string(&mut self, max: usize) -> Result<String> {
        let bytes = self.read_var_bytes(max)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| BytecodeError::format(format!("invalid UTF-8 string: {e}")))
    }
}

/// Size of `value` once var-int encoded
pub fn var_int_size(value: u64) -> usize {
    match value {
        0..0xFD => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

/// Append a var-int
pub fn write_var_int(out: &mut Vec<u8>, value: u64) {
    match value {
        0..0xFD => out.push(value as u8),
        0xFD..=0xFFFF => {
            out.push(0xFD);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            out.push(0xFE);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xFF);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Append length-prefixed bytes
pub fn write_var_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_var_int(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_int_boundaries() {
        for (value, size) in [
            (0u64, 1usize),
            (0xFC, 1),
            (0xFD, 3),
            (0xFFFF, 3),
            (0x1_0000, 5),
            (0xFFFF_FFFF, 5),
            (0x1_0000_0000, 9),
        ] {
            let mut out = Vec::new();
            write_var_int(&mut out, value);
            assert_eq!(out.len(), size);
            assert_eq!(var_int_size(value), size);
            let mut reader = ByteReader::new(&out);
            assert_eq!(reader.read_var_int(u64::MAX).unwrap(), value);
            assert!(reader.is_empty());
        }
    }

    #[test]
    fn test_var_int_limit() {
        let mut out = Vec::new();
        write_var_int(&mut out, 300);
        let mut reader = ByteReader::new(&out);
        assert!(matches!(
            reader.read_var_int(256),
            Err(BytecodeError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_truncated_read() {
        let mut reader = ByteReader::new(&[1, 2]);
        assert!(matches!(
            reader.read_u32(),
            Err(BytecodeError::UnexpectedEnd { offset: 0, needed: 2 })
        ));
    }
}
