// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Directory-backed key/value store.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::KvStore;
use crate::error::{Error, Result};

/// Durable key/value store rooted at a directory.
///
/// Every key is kept in its own entry named after the hex encoding of the
/// key, so arbitrary key text never escapes the root. Values are written to a
/// hidden temporary entry first and renamed into place.
#[derive(Debug, Clone)]
pub struct DirKv {
    root: PathBuf,
}

impl DirKv {
    /// Open the store at `root`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|e| Error::CreateDir {
            path: root.to_owned(),
            source: e,
        })?;
        debug!("Opened key/value directory at {}", root.display());
        Ok(Self {
            root: root.to_owned(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(Error::InvalidKey(key.to_owned()));
        }
        Ok(self.root.join(hex::encode(key)))
    }

    fn io_error(key: &str, source: std::io::Error) -> Error {
        Error::Io {
            key: key.to_owned(),
            source,
        }
    }
}

impl KvStore for DirKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.entry_path(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.entry_path(key)?;
        let tmp = self.root.join(format!(".{}.tmp", hex::encode(key)));
        fs::write(&tmp, value).map_err(|e| Self::io_error(key, e))?;
        fs::rename(&tmp, &path).map_err(|e| Self::io_error(key, e))?;
        trace!("Wrote {} bytes to key {key}", value.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.entry_path(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let list_error = |e| Error::List {
            path: self.root.clone(),
            source: e,
        };
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(list_error)? {
            let entry = entry.map_err(list_error)?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            // Temporary entries start with '.', which is never valid hex.
            let Ok(raw) = hex::decode(name) else {
                continue;
            };
            if let Ok(key) = String::from_utf8(raw) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn size_of_prefix(&self, prefix: &str) -> Result<u64> {
        let mut total = 0u64;
        for key in self.keys()?.into_iter().filter(|k| k.starts_with(prefix)) {
            let len = match fs::metadata(self.entry_path(&key)?) {
                Ok(meta) => meta.len(),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(Self::io_error(&key, e)),
            };
            total += key.len() as u64 + len;
        }
        Ok(total)
    }
}
