// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Open database handles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kvlite_kv::KvStore;
use rusqlite::fallible_iterator::FallibleIterator;
use rusqlite::{Batch, Connection, MAIN_DB};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::pages::PageStore;
use crate::uri::{OpenMode, StoreUri};
use crate::value::{ExecOptions, ExecResult, ReturnValue, Row, Value};

/// Log target for traced SQL.
pub const TRACE_TARGET: &str = "kvlite_engine::trace";

/// An open session on a store.
///
/// The handle is safe to share; statements run one at a time. After every
/// writing statement that leaves the session outside a transaction, changed
/// pages are written back to the store.
pub struct Database {
    store: StoreUri,
    mode: OpenMode,
    inner: Mutex<Inner>,
    /// Set by writing statements, cleared once their pages are persisted
    dirty: AtomicBool,
}

struct Inner {
    conn: Option<Connection>,
    pages: Option<PageStore>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("store", &self.store)
            .field("mode", &self.mode)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Database {
    /// Open `store`, loading its pages from `kv` when it is persistent.
    pub(crate) fn open(
        store: StoreUri,
        mode: OpenMode,
        kv: Option<Arc<dyn KvStore>>,
    ) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        let mut pages = kv.map(|kv| PageStore::new(kv, store.name()));

        if let Some(pages) = pages.as_mut() {
            match pages.load()? {
                Some(image) if !image.is_empty() => {
                    conn.deserialize_read_exact(
                        MAIN_DB,
                        image.as_slice(),
                        image.len(),
                        mode.read_only(),
                    )?;
                }
                Some(_) => {}
                None if mode.create() => {
                    pages.store(&[])?;
                }
                None => return Err(Error::StoreNotFound(store.name().to_owned())),
            }
        }
        if mode.read_only() {
            conn.execute_batch("PRAGMA query_only = ON")?;
        }

        debug!("Opened database {store} ({mode})");
        Ok(Self {
            store,
            mode,
            inner: Mutex::new(Inner {
                conn: Some(conn),
                pages,
            }),
            dirty: AtomicBool::new(false),
        })
    }

    pub fn store(&self) -> &StoreUri {
        &self.store
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Canonical URI of the underlying store.
    pub fn filename(&self) -> String {
        self.store.to_string()
    }

    pub fn is_open(&self) -> bool {
        self.lock().conn.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn trace_sql(&self, sql: &str) {
        if self.mode.trace() {
            debug!(target: TRACE_TARGET, "{sql}");
        }
    }

    /// Record that `stmt` may change the database.
    pub(crate) fn note_write(&self, stmt: &rusqlite::Statement<'_>) {
        if !stmt.readonly() {
            self.dirty.store(true, Ordering::Release);
        }
    }

    /// Run `f` against the live connection, then persist if it wrote.
    ///
    /// `f` must not call back into this handle.
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut inner = self.lock();
        let Inner { conn, pages } = &mut *inner;
        let conn = conn.as_ref().ok_or(Error::Closed)?;

        let out = f(conn);
        let synced = match pages {
            Some(pages) if !self.mode.read_only() => self.sync_if_dirty(conn, pages),
            _ => Ok(()),
        };
        let value = out?;
        synced?;
        Ok(value)
    }

    /// Writes inside a transaction stay pending until it ends.
    fn sync_if_dirty(&self, conn: &Connection, pages: &mut PageStore) -> Result<()> {
        if !conn.is_autocommit() || !self.dirty.load(Ordering::Acquire) {
            return Ok(());
        }
        sync(conn, pages)?;
        self.dirty.store(false, Ordering::Release);
        Ok(())
    }

    /// Execute every statement in `sql`, discarding any rows.
    pub fn exec(&self, sql: &str) -> Result<()> {
        self.exec_with(ExecOptions::new(sql)).map(|_| ())
    }

    /// Execute every statement in `options.sql`.
    ///
    /// The bind parameters apply to the first statement that declares
    /// parameters. Rows are collected from the first statement that has result
    /// columns, and only when [`ReturnValue::ResultRows`] was requested.
    pub fn exec_with(&self, options: ExecOptions<'_>) -> Result<ExecResult> {
        self.with_conn(|conn| {
            let mut batch = Batch::new(conn, options.sql);
            let mut bind = options.bind.as_ref();
            let mut rows: Option<Vec<Row>> = None;

            while let Some(mut stmt) = batch.next()? {
                if stmt.parameter_count() > 0 {
                    if let Some(params) = bind.take() {
                        let values = params.resolve(&parameter_names(&stmt))?;
                        bind_values(&mut stmt, &values)?;
                    }
                }
                if let Some(sql) = stmt.expanded_sql() {
                    self.trace_sql(&sql);
                }
                self.note_write(&stmt);

                if stmt.column_count() == 0 {
                    stmt.raw_execute()?;
                    continue;
                }

                let collect =
                    rows.is_none() && options.return_value == ReturnValue::ResultRows;
                let columns = column_names(&stmt);
                let mut cursor = stmt.raw_query();
                let mut collected = Vec::new();
                while let Some(row) = cursor.next()? {
                    if collect {
                        collected.push(Row::read(row, &columns, options.row_mode)?);
                    }
                }
                if collect {
                    rows = Some(collected);
                }
            }

            Ok(match options.return_value {
                ReturnValue::This => ExecResult::Done,
                ReturnValue::ResultRows => ExecResult::Rows(rows.unwrap_or_default()),
            })
        })
    }

    /// First column of the first row, or `None` if there is no row or it is NULL.
    pub fn select_value(&self, sql: &str) -> Result<Option<Value>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            self.trace_sql(sql);
            self.note_write(&stmt);
            let columns = stmt.column_count();
            let mut rows = stmt.raw_query();
            let value = match rows.next()? {
                Some(row) if columns > 0 => Value::from(row.get_ref(0)?),
                _ => Value::Null,
            };
            Ok((!value.is_null()).then_some(value))
        })
    }

    /// Rows changed by the most recent statement.
    pub fn changes(&self) -> Result<u64> {
        self.with_conn(|conn| Ok(conn.changes() as u64))
    }

    /// Write any unpersisted changes back to the store.
    ///
    /// Does nothing while a transaction is open.
    pub fn flush(&self) -> Result<()> {
        self.dirty.store(true, Ordering::Release);
        self.with_conn(|_| Ok(()))
    }

    /// Persist and release the session.
    ///
    /// Closing an already closed handle does nothing. Every other operation on
    /// a closed handle fails with [`Error::Closed`].
    pub fn close(&self) -> Result<()> {
        let mut inner = self.lock();
        let Some(conn) = inner.conn.take() else {
            return Ok(());
        };
        if let Some(pages) = inner.pages.as_mut().filter(|_| !self.mode.read_only()) {
            if conn.is_autocommit() {
                sync(&conn, pages)?;
            } else {
                warn!("Closing {} with an open transaction; it is rolled back", self.store);
            }
        }
        conn.close().map_err(|(_, e)| e)?;
        debug!("Closed database {}", self.store);
        Ok(())
    }
}

/// Persist committed state; a session inside a transaction is left alone.
fn sync(conn: &Connection, pages: &mut PageStore) -> Result<()> {
    if !conn.is_autocommit() {
        return Ok(());
    }
    let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
    if page_count == 0 {
        pages.store(&[])?;
    } else {
        let image = conn.serialize(MAIN_DB)?;
        pages.store(&image)?;
    }
    Ok(())
}

pub(crate) fn parameter_names(stmt: &rusqlite::Statement<'_>) -> Vec<Option<String>> {
    (1..=stmt.parameter_count())
        .map(|i| stmt.parameter_name(i).map(str::to_owned))
        .collect()
}

pub(crate) fn column_names(stmt: &rusqlite::Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(str::to_owned).collect()
}

pub(crate) fn bind_values(stmt: &mut rusqlite::Statement<'_>, values: &[Value]) -> Result<()> {
    for (index, value) in values.iter().enumerate() {
        stmt.raw_bind_parameter(index + 1, value)?;
    }
    Ok(())
}
