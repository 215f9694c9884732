// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Error types for connection management.

use thiserror::Error;

/// Result type for connection management.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the connection manager.
#[derive(Error, Debug)]
pub enum Error {
    /// Engine failed to load or initialize
    #[error("{name}: {message}")]
    Initialization { name: String, message: String },

    /// Initialization failed without a recognizable error shape
    #[error("Unknown error: {0}")]
    Unknown(String),

    /// Engine error while opening or closing a store
    #[error("Engine error: {0}")]
    Engine(#[from] kvlite_engine::Error),
}

impl Error {
    /// Classify a failure from the engine's initialization step.
    pub(crate) fn from_init(err: kvlite_engine::Error) -> Self {
        match err {
            kvlite_engine::Error::Initialization { name, message } => {
                Self::Initialization { name, message }
            }
            kvlite_engine::Error::Unknown(message) => Self::Unknown(message),
            other => Self::Unknown(other.to_string()),
        }
    }
}
