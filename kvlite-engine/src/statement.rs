// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Prepared statements.

use crate::database::{Database, bind_values, column_names, parameter_names};
use crate::error::{Error, Result};
use crate::value::{Bind, Row, RowMode, Value};

impl Database {
    /// Compile `sql` into a reusable statement.
    ///
    /// Syntax errors surface here rather than on the first step.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        let (parameters, columns) = self.with_conn(|conn| {
            let stmt = conn.prepare_cached(sql)?;
            Ok((parameter_names(&stmt), column_names(&stmt)))
        })?;
        Ok(Statement {
            db: self,
            sql: sql.to_owned(),
            values: vec![Value::Null; parameters.len()],
            parameters,
            columns,
            finalized: false,
        })
    }
}

/// A prepared statement owned by its caller.
///
/// Bound values are kept until rebound or cleared, so the same statement can
/// be stepped repeatedly. After [`finalize`](Statement::finalize) every
/// operation fails with [`Error::Finalized`].
#[derive(Debug)]
pub struct Statement<'db> {
    db: &'db Database,
    sql: String,
    parameters: Vec<Option<String>>,
    columns: Vec<String>,
    values: Vec<Value>,
    finalized: bool,
}

impl Statement<'_> {
    fn live(&self) -> Result<()> {
        if self.finalized {
            return Err(Error::Finalized);
        }
        Ok(())
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameter_count(&self) -> Result<usize> {
        self.live()?;
        Ok(self.parameters.len())
    }

    pub fn column_names(&self) -> Result<&[String]> {
        self.live()?;
        Ok(&self.columns)
    }

    /// Replace the pending parameter values.
    pub fn bind(&mut self, bind: impl Into<Bind>) -> Result<&mut Self> {
        self.live()?;
        self.values = bind.into().resolve(&self.parameters)?;
        Ok(self)
    }

    /// Reset every pending parameter to NULL.
    pub fn clear_bindings(&mut self) -> Result<&mut Self> {
        self.live()?;
        self.values.fill(Value::Null);
        Ok(self)
    }

    /// Run one step and rewind, reporting whether a row was produced.
    pub fn step_reset(&mut self) -> Result<bool> {
        Ok(self.cycle(None)?.is_some())
    }

    /// Run one step and rewind, returning the row if one was produced.
    pub fn step_row(&mut self, mode: RowMode) -> Result<Option<Row>> {
        Ok(self.cycle(Some(mode))?.flatten())
    }

    /// `Some` when a row was produced; the inner row is read only when asked for.
    fn cycle(&mut self, mode: Option<RowMode>) -> Result<Option<Option<Row>>> {
        self.live()?;
        let db = self.db;
        let (sql, columns, values) = (&self.sql, &self.columns, &self.values);
        db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            bind_values(&mut stmt, values)?;
            if let Some(expanded) = stmt.expanded_sql() {
                db.trace_sql(&expanded);
            }
            db.note_write(&stmt);

            if stmt.column_count() == 0 {
                stmt.raw_execute()?;
                return Ok(None);
            }
            let mut rows = stmt.raw_query();
            match rows.next()? {
                Some(row) => Ok(Some(match mode {
                    Some(mode) => Some(Row::read(row, columns, mode)?),
                    None => None,
                })),
                None => Ok(None),
            }
        })
    }

    /// Release the statement. Finalizing twice is harmless.
    pub fn finalize(&mut self) -> Result<()> {
        self.finalized = true;
        self.values.clear();
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}
