// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Backend selection from configuration.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::{DirKv, KvStore, MemoryKv};

/// Which key/value backend holds a storage area.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum KvBackend {
    /// Entries live only as long as the process
    Memory,
    /// Entries persist under a directory
    Directory { path: PathBuf },
}

impl KvBackend {
    /// Instantiate the backend.
    pub fn build(&self) -> Result<Arc<dyn KvStore>> {
        Ok(match self {
            KvBackend::Memory => Arc::new(MemoryKv::new()),
            KvBackend::Directory { path } => Arc::new(DirKv::open(path)?),
        })
    }

    /// Whether data written to this backend survives a process restart.
    pub fn is_durable(&self) -> bool {
        matches!(self, KvBackend::Directory { .. })
    }
}

impl Default for KvBackend {
    fn default() -> Self {
        KvBackend::Directory {
            path: PathBuf::from("kvlite-data"),
        }
    }
}
