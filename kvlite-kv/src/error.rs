// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Error types for key/value storage operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for key/value storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or writing a key/value store.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O failure while accessing a single entry
    #[error("Failed to access key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O failure while listing the store
    #[error("Failed to list entries in '{path}': {source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Storage directory could not be created
    #[error("Failed to create storage directory at '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Key cannot be stored by this backend
    #[error("Invalid key: {0:?}")]
    InvalidKey(String),
}
