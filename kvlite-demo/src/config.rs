// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};

use kvlite_engine::{EngineConfig, OpenMode, StoreUri};
use kvlite_kv::KvBackend;
use serde::{Deserialize, Serialize};

use crate::error::{DemoError, Result};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "KVLITE_CONFIG";

/// Configuration file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "kvlite.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Store to open, e.g. `file:local?vfs=kvvfs`
    pub store_uri: StoreUri,

    /// Open flags (`c`, `w`, `r`, `t`)
    pub open_mode: OpenMode,

    /// Directory backing the persistent local store
    pub storage_dir: PathBuf,

    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,

    /// How many times the insert-and-list interaction runs
    pub runs: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_uri: StoreUri::local(),
            open_mode: OpenMode::create_traced(),
            storage_dir: PathBuf::from("kvlite-data"),
            log_level: "info".to_string(),
            runs: 1,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| DemoError::ReadConfig {
            path: path.to_owned(),
            source,
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.runs == 0 {
            return Err(DemoError::config("runs must be greater than 0"));
        }
        Ok(())
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            local: KvBackend::Directory {
                path: self.storage_dir.clone(),
            },
        }
    }
}

/// Reads `$KVLITE_CONFIG`, else `kvlite.toml` when present, else defaults.
pub fn load() -> Result<Config> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => Config::from_file(Path::new(&path)),
        Err(_) => {
            let local = Path::new(DEFAULT_CONFIG_FILE);
            if local.exists() {
                Config::from_file(local)
            } else {
                Ok(Config::default())
            }
        }
    }
}
