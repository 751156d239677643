//! Method token table with deduplication

use rustc_hash::FxHashMap;
use sable_bytecode::MethodToken;

use crate::error::{CompileError, CompileResult};

/// Registry of external call descriptors, indexed in first-use order
#[derive(Debug, Clone, Default)]
pub struct MethodTokenTable {
    tokens: Vec<MethodToken>,
    index: FxHashMap<MethodToken, u16>,
}

impl MethodTokenTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of a structurally equal token, adding it when absent
    ///
    /// Returns the index and whether the token was newly added.
    pub fn intern(&mut self, token: MethodToken) -> CompileResult<(u16, bool)> {
        if let Some(&idx) = self.index.get(&token) {
            return Ok((idx, false));
        }
        let idx = u16::try_from(self.tokens.len()).map_err(|_| CompileError::TokenTableOverflow)?;
        self.index.insert(token.clone(), idx);
        self.tokens.push(token);
        Ok((idx, true))
    }

    /// Get a token by index
    #[inline]
    pub fn get(&self, index: u16) -> Option<&MethodToken> {
        self.tokens.get(index as usize)
    }

    /// Number of distinct tokens
    #[inline]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the table is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Tokens in index order
    #[inline]
    pub fn as_slice(&self) -> &[MethodToken] {
        &self.tokens
    }

    /// Consume the table, yielding tokens in index order
    pub fn into_vec(self) -> Vec<MethodToken> {
        self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_bytecode::{CallFlags, Hash160};

    fn token(method: &str) -> MethodToken {
        MethodToken {
            hash: Hash160([3; 20]),
            method: method.to_string(),
            parameters_count: 1,
            has_return_value: false,
            call_flags: CallFlags::ALL,
        }
    }

    #[test]
    fn test_intern_dedup() {
        let mut table = MethodTokenTable::new();
        assert_eq!(table.intern(token("a")).unwrap(), (0, true));
        assert_eq!(table.intern(token("b")).unwrap(), (1, true));
        assert_eq!(table.intern(token("a")).unwrap(), (0, false));
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1).unwrap().method, "b");
    }

    #[test]
    fn test_every_field_matters() {
        let base = token("a");
        let variants = [
            MethodToken {
                hash: Hash160([4; 20]),
                ..base.clone()
            },
            MethodToken {
                method: "b".to_string(),
                ..base.clone()
            },
            MethodToken {
                parameters_count: 2,
                ..base.clone()
            },
            MethodToken {
                has_return_value: true,
                ..base.clone()
            },
            MethodToken {
                call_flags: CallFlags::READ_ONLY,
                ..base.clone()
            },
        ];
        let mut table = MethodTokenTable::new();
        table.intern(base).unwrap();
        for (i, variant) in variants.into_iter().enumerate() {
            assert_eq!(table.intern(variant).unwrap(), (i as u16 + 1, true));
        }
    }
}
