//! Static field slot allocation

use std::hash::Hash;

use indexmap::IndexMap;

use crate::error::{CompileError, CompileResult};

/// Most static fields addressable with a single-byte index
pub const MAX_STATIC_SLOTS: usize = 256;

/// Assigns stable single-byte indices to module-level storage, in first-touch order
#[derive(Debug, Clone)]
pub struct StaticSlots<K = String> {
    slots: IndexMap<K, u8>,
}

impl<K: Hash + Eq + ToString> StaticSlots<K> {
    /// Create an empty allocator
    pub fn new() -> Self {
        Self {
            slots: IndexMap::new(),
        }
    }

    /// Index of `key`, allocating the next free slot on first use
    pub fn allocate(&mut self, key: K) -> CompileResult<u8> {
        if let Some(&index) = self.slots.get(&key) {
            return Ok(index);
        }
        let next = self.slots.len();
        if next >= MAX_STATIC_SLOTS {
            return Err(CompileError::StaticSlotOverflow(key.to_string()));
        }
        self.slots.insert(key, next as u8);
        Ok(next as u8)
    }

    /// Index of an already allocated key
    pub fn get(&self, key: &K) -> Option<u8> {
        self.slots.get(key).copied()
    }

    /// Number of allocated slots
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot was allocated
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Allocated keys with their indices, in allocation order
    pub fn iter(&self) -> impl Iterator<Item = (&K, u8)> {
        self.slots.iter().map(|(k, &v)| (k, v))
    }
}

impl<K: Hash + Eq + ToString> Default for StaticSlots<K> {
    fn default() -> Self {
        Self::new()
    }
}
