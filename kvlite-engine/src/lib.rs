// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Embedded SQL engine persisted through key/value storage.
//!
//! This crate binds SQLite behind the [`EngineBinding`] capability interface.
//! Databases never touch a file of their own: each store's pages live under
//! keys in a [`kvlite_kv::KvStore`] and are written back after every committed
//! change.
//!
//! **Architecture**: This is the Engine Layer between `kvlite-kv` and the
//! connection manager in `kvlite-db`.
//!
//! # Key Features
//!
//! - `local` (durable) and `session` (in-memory) storage areas
//! - One-shot execution with bind parameters and row materialization
//! - Prepared statements with bind, step and finalize
//! - Transient `memdb` stores for scratch work
//!
//! # Example
//!
//! ```ignore
//! use kvlite_engine::{EngineBinding, ExecOptions, OpenMode, RowMode, Sqlite3, StoreUri, bind};
//!
//! let engine = Sqlite3::default();
//! let module = engine.init().await?;
//! let db = engine.open(&module, &StoreUri::local(), OpenMode::create_traced())?;
//!
//! db.exec("CREATE TABLE IF NOT EXISTS users(id INTEGER, name TEXT)")?;
//! db.exec_with(ExecOptions::new("insert into users values(?,?)").bind(bind![1, "Alice1"]))?;
//! let rows = db
//!     .exec_with(ExecOptions::new("SELECT * FROM users").row_mode(RowMode::Object).result_rows())?
//!     .into_rows();
//! ```

mod binding;
mod database;
mod error;
mod pages;
mod statement;
mod uri;
mod value;

pub use binding::{EngineBinding, EngineConfig, EngineVersion, Sqlite3, Sqlite3Module};
pub use database::{Database, TRACE_TARGET};
pub use error::{Error, Result};
pub use statement::Statement;
pub use uri::{LOCAL_STORAGE, OpenMode, SESSION_STORAGE, StoreUri, Vfs};
pub use value::{Bind, ExecOptions, ExecResult, ReturnValue, Row, RowMode, Value};
