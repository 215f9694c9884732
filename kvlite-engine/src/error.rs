// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Error types for engine operations.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while initializing the engine or running SQL.
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error, passed through unchanged
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Key/value storage error
    #[error("Storage error: {0}")]
    Storage(#[from] kvlite_kv::Error),

    /// Engine failed to load or initialize
    #[error("{name}: {message}")]
    Initialization { name: String, message: String },

    /// Failure without a recognizable error shape
    #[error("Unknown error: {0}")]
    Unknown(String),

    /// Store URI could not be parsed
    #[error("Invalid store URI '{uri}': {reason}")]
    InvalidStoreUri { uri: String, reason: String },

    /// Open mode contains an unknown or conflicting flag
    #[error("Invalid open mode '{0}'")]
    InvalidOpenMode(String),

    /// Named storage area does not exist
    #[error("Unknown storage area: {0}")]
    UnknownStorage(String),

    /// Store has no database and the open mode does not allow creating one
    #[error("Store not found: {0}")]
    StoreNotFound(String),

    /// Persisted pages do not form a valid database image
    #[error("Corrupt store '{store}': {reason}")]
    CorruptStore { store: String, reason: String },

    /// Handle was used after close
    #[error("Database is closed")]
    Closed,

    /// Statement was used after finalize
    #[error("Statement has been finalized")]
    Finalized,

    /// Positional bind with the wrong number of values
    #[error("Expected {expected} bind values, got {found}")]
    BindCount { expected: usize, found: usize },

    /// Named bind for a parameter the statement does not have
    #[error("Unknown bind parameter: {0}")]
    UnknownParameter(String),
}

impl Error {
    pub fn initialization(name: impl Into<String>, message: impl ToString) -> Self {
        Self::Initialization {
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Translate a failed blocking initialization task.
    pub(crate) fn from_join(err: tokio::task::JoinError) -> Self {
        if !err.is_panic() {
            return Self::Unknown("initialization task was cancelled".to_string());
        }
        let payload = err.into_panic();
        if let Some(message) = payload.downcast_ref::<&str>() {
            Self::initialization("panic", message)
        } else if let Some(message) = payload.downcast_ref::<String>() {
            Self::initialization("panic", message)
        } else {
            Self::Unknown("unknown error".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panic_with_message_is_an_initialization_failure() {
        let err = tokio::task::spawn_blocking::<_, ()>(|| panic!("engine blew up"))
            .await
            .unwrap_err();
        assert!(matches!(
            Error::from_join(err),
            Error::Initialization { ref name, ref message }
                if name == "panic" && message == "engine blew up"
        ));

        let err = tokio::task::spawn_blocking::<_, ()>(|| panic!("formatted {}", 42))
            .await
            .unwrap_err();
        assert!(matches!(
            Error::from_join(err),
            Error::Initialization { ref message, .. } if message == "formatted 42"
        ));
    }

    #[tokio::test]
    async fn panic_with_other_payload_is_unknown() {
        let err = tokio::task::spawn_blocking::<_, ()>(|| std::panic::panic_any(7_u32))
            .await
            .unwrap_err();
        assert!(matches!(
            Error::from_join(err),
            Error::Unknown(ref message) if message == "unknown error"
        ));
    }

    #[tokio::test]
    async fn cancelled_task_is_unknown() {
        let task = tokio::spawn(std::future::pending::<()>());
        task.abort();
        let err = task.await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(matches!(Error::from_join(err), Error::Unknown(_)));
    }
}
