// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Process-wide kvlite connection.
//!
//! A [`ConnectionManager`] owns at most one open handle to a store. The first
//! [`get_database`](ConnectionManager::get_database) initializes the engine
//! and opens the store; every later call returns the same handle until
//! [`close_db`](ConnectionManager::close_db) releases it. Callers that arrive
//! while initialization is in flight wait for it instead of starting their own.
//!
//! # Example
//!
//! ```ignore
//! use kvlite_db::ConnectionManager;
//!
//! let manager = ConnectionManager::default();
//! let db = manager.get_database().await?;
//! db.exec("CREATE TABLE IF NOT EXISTS users(id INTEGER, name TEXT)")?;
//! manager.close_db()?;
//! ```

mod error;
mod manager;

pub use error::{Error, Result};
pub use manager::{ConnectionManager, ConnectionState};
