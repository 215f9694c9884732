// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! In-process key/value store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::KvStore;
use crate::error::Result;

/// Key/value store held in process memory.
///
/// Clones share the same entries, so data written through one clone is
/// visible through every other clone until the last one is dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // A panic while holding the lock cannot leave a map half-updated.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.lock().insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock().keys().cloned().collect())
    }

    fn size_of_prefix(&self, prefix: &str) -> Result<u64> {
        Ok(self
            .lock()
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_entries() {
        let a = MemoryKv::new();
        let b = a.clone();
        a.set("k", b"v").unwrap();
        assert_eq!(b.get("k").unwrap(), Some(b"v".to_vec()));
        b.remove("k").unwrap();
        assert!(a.is_empty());
    }

    #[test]
    fn size_of_prefix_ignores_other_keys() {
        let kv = MemoryKv::new();
        kv.set("kvvfs-local-sz", b"4096").unwrap();
        kv.set("kvvfs-local-1", &[0u8; 10]).unwrap();
        kv.set("other", &[0u8; 100]).unwrap();
        assert_eq!(
            kv.size_of_prefix("kvvfs-").unwrap(),
            ("kvvfs-local-sz".len() + 4 + "kvvfs-local-1".len() + 10) as u64
        );
    }
}
