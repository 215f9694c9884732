// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Store identities and open modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Storage area backed by the process-configured durable store.
pub const LOCAL_STORAGE: &str = "local";
/// Storage area backed by memory for the lifetime of the process.
pub const SESSION_STORAGE: &str = "session";

/// Virtual filesystem a store lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vfs {
    /// Pages kept in a key/value storage area
    Kvvfs,
    /// Transient in-memory database, never persisted
    Memdb,
}

impl Vfs {
    pub fn as_str(self) -> &'static str {
        match self {
            Vfs::Kvvfs => "kvvfs",
            Vfs::Memdb => "memdb",
        }
    }
}

/// Identity of a persistent store, written as `file:<name>?vfs=<vfs>`.
///
/// For `kvvfs` the name selects the storage area and must be `local` or
/// `session`. A bare name without the `file:` scheme is accepted and defaults
/// to `kvvfs`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreUri {
    name: String,
    vfs: Vfs,
}

impl StoreUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidStoreUri {
            uri: uri.to_owned(),
            reason: reason.to_owned(),
        };

        let rest = uri.strip_prefix("file:").unwrap_or(uri);
        let (name, query) = match rest.split_once('?') {
            Some((name, query)) => (name, Some(query)),
            None => (rest, None),
        };
        if name.is_empty() {
            return Err(invalid("missing store name"));
        }

        let mut vfs = Vfs::Kvvfs;
        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            match pair.split_once('=') {
                Some(("vfs", "kvvfs")) => vfs = Vfs::Kvvfs,
                Some(("vfs", "memdb")) => vfs = Vfs::Memdb,
                Some(("vfs", _)) => return Err(invalid("unsupported vfs")),
                _ => return Err(invalid("unsupported query parameter")),
            }
        }

        let name = match (vfs, name) {
            (Vfs::Kvvfs, LOCAL_STORAGE | ":localStorage:") => LOCAL_STORAGE,
            (Vfs::Kvvfs, SESSION_STORAGE | ":sessionStorage:") => SESSION_STORAGE,
            (Vfs::Kvvfs, _) => return Err(invalid("kvvfs stores must be named local or session")),
            (Vfs::Memdb, name) => name,
        };

        Ok(Self {
            name: name.to_owned(),
            vfs,
        })
    }

    /// Default durable store, `file:local?vfs=kvvfs`.
    pub fn local() -> Self {
        Self {
            name: LOCAL_STORAGE.to_owned(),
            vfs: Vfs::Kvvfs,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vfs(&self) -> Vfs {
        self.vfs
    }

    /// Whether data written to this store outlives the handle.
    pub fn is_persistent(&self) -> bool {
        self.vfs == Vfs::Kvvfs
    }
}

impl Default for StoreUri {
    fn default() -> Self {
        Self::local()
    }
}

impl FromStr for StoreUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for StoreUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file:{}?vfs={}", self.name, self.vfs.as_str())
    }
}

impl Serialize for StoreUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StoreUri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Flags controlling how a store is opened.
///
/// Written as a short flag string: `c` creates the store if absent, `w` opens
/// read-write, `r` opens read-only and `t` traces every executed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpenMode {
    create: bool,
    read_only: bool,
    trace: bool,
}

impl OpenMode {
    pub fn parse(flags: &str) -> Result<Self> {
        let mut mode = OpenMode {
            create: false,
            read_only: false,
            trace: false,
        };
        let mut write = false;
        for flag in flags.chars() {
            match flag {
                'c' => mode.create = true,
                'w' => write = true,
                'r' => mode.read_only = true,
                't' => mode.trace = true,
                _ => return Err(Error::InvalidOpenMode(flags.to_owned())),
            }
        }
        if mode.read_only && (mode.create || write) {
            return Err(Error::InvalidOpenMode(flags.to_owned()));
        }
        Ok(mode)
    }

    /// Create-if-absent plus tracing, the mode used for the default store.
    pub fn create_traced() -> Self {
        OpenMode {
            create: true,
            read_only: false,
            trace: true,
        }
    }

    pub fn create(self) -> bool {
        self.create
    }

    pub fn read_only(self) -> bool {
        self.read_only
    }

    pub fn trace(self) -> bool {
        self.trace
    }
}

impl Default for OpenMode {
    fn default() -> Self {
        OpenMode {
            create: true,
            read_only: false,
            trace: false,
        }
    }
}

impl FromStr for OpenMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.read_only {
            f.write_str("r")?;
        } else if self.create {
            f.write_str("c")?;
        } else {
            f.write_str("w")?;
        }
        if self.trace {
            f.write_str("t")?;
        }
        Ok(())
    }
}

impl Serialize for OpenMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OpenMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
