// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! The engine capability interface and its SQLite implementation.

use std::future::Future;
use std::sync::Arc;

use kvlite_kv::{KvBackend, KvStore, MemoryKv};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::database::Database;
use crate::error::{Error, Result};
use crate::pages::KEY_PREFIX;
use crate::uri::{LOCAL_STORAGE, OpenMode, SESSION_STORAGE, StoreUri, Vfs};

/// Operations a connection manager needs from an embedded engine.
///
/// `init` loads the engine and may be slow; everything else is synchronous
/// once a module is available.
pub trait EngineBinding: Send + Sync + 'static {
    /// The initialized engine.
    type Module: Send + Sync + 'static;
    /// An open session on a store.
    type Handle: Send + Sync + 'static;

    /// Load and initialize the engine.
    fn init(&self) -> impl Future<Output = Result<Self::Module>> + Send;

    /// Human-readable engine version.
    fn version(&self, module: &Self::Module) -> String;

    /// Open a session on `store`.
    fn open(&self, module: &Self::Module, store: &StoreUri, mode: OpenMode)
    -> Result<Self::Handle>;

    /// Bytes held in persistent storage, for one storage area or all of them.
    fn storage_size(&self, module: &Self::Module, area: Option<&str>) -> Result<u64>;

    /// Close a session opened by [`open`](EngineBinding::open).
    fn close(&self, handle: &Self::Handle) -> Result<()>;
}

/// Engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Backend of the `local` storage area. `session` is always in memory.
    pub local: KvBackend,
}

/// SQLite build information reported by a loaded engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineVersion {
    pub lib_version: String,
    pub source_id: String,
}

/// SQLite as an [`EngineBinding`].
#[derive(Debug, Clone, Default)]
pub struct Sqlite3 {
    config: EngineConfig,
}

impl Sqlite3 {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// A loaded SQLite engine and its storage areas.
#[derive(Debug)]
pub struct Sqlite3Module {
    version: EngineVersion,
    local: Arc<dyn KvStore>,
    session: Arc<dyn KvStore>,
}

impl Sqlite3Module {
    fn load(config: &EngineConfig) -> Result<Self> {
        let local = config
            .local
            .build()
            .map_err(|e| Error::initialization("StorageError", e))?;
        let version = probe_version().map_err(|e| Error::initialization("SqliteError", e))?;
        Ok(Self {
            version,
            local,
            session: Arc::new(MemoryKv::new()),
        })
    }

    pub fn version(&self) -> &EngineVersion {
        &self.version
    }

    /// The key/value store behind a storage area.
    pub fn storage(&self, area: &str) -> Result<&Arc<dyn KvStore>> {
        match area {
            LOCAL_STORAGE => Ok(&self.local),
            SESSION_STORAGE => Ok(&self.session),
            other => Err(Error::UnknownStorage(other.to_owned())),
        }
    }

    /// Bytes used by engine keys in one storage area, or in both.
    pub fn storage_size(&self, area: Option<&str>) -> Result<u64> {
        match area {
            Some(area) => Ok(self.storage(area)?.size_of_prefix(KEY_PREFIX)?),
            None => Ok(self.local.size_of_prefix(KEY_PREFIX)?
                + self.session.size_of_prefix(KEY_PREFIX)?),
        }
    }

    /// Remove every persisted database in one storage area, or in both.
    ///
    /// Open handles keep working on their in-memory state and write their
    /// pages back on the next change.
    pub fn clear_storage(&self, area: Option<&str>) -> Result<usize> {
        match area {
            Some(area) => Ok(self.storage(area)?.clear_prefix(KEY_PREFIX)?),
            None => Ok(self.local.clear_prefix(KEY_PREFIX)?
                + self.session.clear_prefix(KEY_PREFIX)?),
        }
    }
}

fn probe_version() -> rusqlite::Result<EngineVersion> {
    let conn = Connection::open_in_memory()?;
    conn.query_row("SELECT sqlite_version(), sqlite_source_id()", [], |row| {
        Ok(EngineVersion {
            lib_version: row.get(0)?,
            source_id: row.get(1)?,
        })
    })
}

impl EngineBinding for Sqlite3 {
    type Module = Sqlite3Module;
    type Handle = Database;

    fn init(&self) -> impl Future<Output = Result<Sqlite3Module>> + Send {
        let config = self.config.clone();
        async move {
            debug!("Loading and initializing SQLite3 module");
            tokio::task::spawn_blocking(move || Sqlite3Module::load(&config))
                .await
                .map_err(Error::from_join)?
        }
    }

    fn version(&self, module: &Sqlite3Module) -> String {
        module.version.lib_version.clone()
    }

    fn open(&self, module: &Sqlite3Module, store: &StoreUri, mode: OpenMode) -> Result<Database> {
        let kv = match store.vfs() {
            Vfs::Kvvfs => Some(Arc::clone(module.storage(store.name())?)),
            Vfs::Memdb => None,
        };
        Database::open(store.clone(), mode, kv)
    }

    fn storage_size(&self, module: &Sqlite3Module, area: Option<&str>) -> Result<u64> {
        module.storage_size(area)
    }

    fn close(&self, handle: &Database) -> Result<()> {
        handle.close()
    }
}
