// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Key/value storage backends for kvlite.
//!
//! A kvlite database is never written to a file of its own. The engine splits
//! the database image into pages and keeps each page under a key in a
//! [`KvStore`]. This crate provides that keyed storage.
//!
//! **Architecture**: This is the Storage Layer underneath `kvlite-engine`.
//!
//! # Backends
//!
//! - [`MemoryKv`]: process-local map, shared between clones
//! - [`DirKv`]: durable map rooted at a directory, one entry per key
//!
//! # Example
//!
//! ```ignore
//! use kvlite_kv::{KvBackend, KvStore};
//!
//! let store = KvBackend::Directory { path: "kvlite-data".into() }.build()?;
//! store.set("greeting", b"hello")?;
//! assert_eq!(store.get("greeting")?.as_deref(), Some(&b"hello"[..]));
//! ```

mod backend;
mod dir;
mod error;
mod memory;

use std::fmt;

pub use backend::KvBackend;
pub use dir::DirKv;
pub use error::{Error, Result};
pub use memory::MemoryKv;

/// A flat string-keyed byte store.
///
/// Implementations must be safe to share between threads; the engine keeps
/// one store per named storage area for the lifetime of the process.
pub trait KvStore: Send + Sync + fmt::Debug {
    /// Fetch the value stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// List every key currently stored.
    fn keys(&self) -> Result<Vec<String>>;

    /// Total size in bytes of all keys starting with `prefix` and their values.
    fn size_of_prefix(&self, prefix: &str) -> Result<u64> {
        let mut total = 0u64;
        for key in self.keys()?.into_iter().filter(|k| k.starts_with(prefix)) {
            if let Some(value) = self.get(&key)? {
                total += (key.len() + value.len()) as u64;
            }
        }
        Ok(total)
    }

    /// Remove every key starting with `prefix`, returning how many were removed.
    fn clear_prefix(&self, prefix: &str) -> Result<usize> {
        let doomed: Vec<String> = self
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect();
        for key in &doomed {
            self.remove(key)?;
        }
        Ok(doomed.len())
    }
}
