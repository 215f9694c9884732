// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Values, rows and bind parameters exchanged with the engine.

use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, ValueRef};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// A single SQL value.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(match self {
            Value::Null => ValueRef::Null,
            Value::Integer(i) => ValueRef::Integer(*i),
            Value::Real(f) => ValueRef::Real(*f),
            Value::Text(s) => ValueRef::Text(s.as_bytes()),
            Value::Blob(b) => ValueRef::Blob(b),
        }))
    }
}

macro_rules! integer_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Integer(i64::from(v))
            }
        })*
    };
}

integer_from!(i8, i16, i32, i64, u8, u16, u32, bool);

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// How result rows are materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowMode {
    /// Values in column order
    #[default]
    Array,
    /// Column name to value, in column order
    Object,
}

/// A materialized result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
}

impl Row {
    pub(crate) fn read(row: &rusqlite::Row<'_>, columns: &[String], mode: RowMode) -> Result<Self> {
        let values = (0..columns.len())
            .map(|i| row.get_ref(i).map(Value::from))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(match mode {
            RowMode::Array => Row::Array(values),
            RowMode::Object => Row::Object(columns.iter().cloned().zip(values).collect()),
        })
    }

    /// Value of the named column; only object rows carry names.
    pub fn get(&self, column: &str) -> Option<&Value> {
        match self {
            Row::Array(_) => None,
            Row::Object(fields) => fields.iter().find(|(k, _)| k == column).map(|(_, v)| v),
        }
    }

    /// Value at a column position.
    pub fn at(&self, index: usize) -> Option<&Value> {
        match self {
            Row::Array(values) => values.get(index),
            Row::Object(fields) => fields.get(index).map(|(_, v)| v),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Row::Array(values) => values.len(),
            Row::Object(fields) => fields.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Row::Array(values) => values.serialize(serializer),
            Row::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, value) in fields {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }
    }
}

/// Parameters bound to a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Bind {
    /// One value per parameter, in order
    Positional(Vec<Value>),
    /// Values keyed by parameter name, with or without the `:`, `@` or `$` prefix
    Named(Vec<(String, Value)>),
}

impl Bind {
    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Bind::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Lay the bound values out by parameter position.
    ///
    /// `names` holds each parameter's declared name (`None` for `?`).
    /// Parameters a named bind does not mention are bound to NULL.
    pub(crate) fn resolve(&self, names: &[Option<String>]) -> Result<Vec<Value>> {
        match self {
            Bind::Positional(values) => {
                if values.len() != names.len() {
                    return Err(Error::BindCount {
                        expected: names.len(),
                        found: values.len(),
                    });
                }
                Ok(values.clone())
            }
            Bind::Named(pairs) => {
                let mut values = vec![Value::Null; names.len()];
                for (key, value) in pairs {
                    let index = names
                        .iter()
                        .position(|n| n.as_deref().is_some_and(|n| parameter_matches(n, key)))
                        .ok_or_else(|| Error::UnknownParameter(key.clone()))?;
                    values[index] = value.clone();
                }
                Ok(values)
            }
        }
    }
}

fn parameter_matches(declared: &str, key: &str) -> bool {
    declared == key
        || declared
            .strip_prefix([':', '@', '$'])
            .is_some_and(|bare| bare == key)
}

impl From<Vec<Value>> for Bind {
    fn from(values: Vec<Value>) -> Self {
        Bind::Positional(values)
    }
}

/// Build a positional [`Bind`] from heterogeneous values.
///
/// ```ignore
/// db.exec_with(ExecOptions::new("insert into users values(?, ?)").bind(bind![1, "Alice1"]))?;
/// ```
#[macro_export]
macro_rules! bind {
    ($($value:expr),* $(,)?) => {
        $crate::Bind::Positional(vec![$($crate::Value::from($value)),*])
    };
}

/// What a one-shot execution returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnValue {
    /// Nothing
    #[default]
    This,
    /// Every row of the first statement that has result columns
    ResultRows,
}

/// Options for [`Database::exec_with`](crate::Database::exec_with).
#[derive(Debug, Clone, PartialEq)]
pub struct ExecOptions<'a> {
    pub sql: &'a str,
    pub bind: Option<Bind>,
    pub row_mode: RowMode,
    pub return_value: ReturnValue,
}

impl<'a> ExecOptions<'a> {
    pub fn new(sql: &'a str) -> Self {
        Self {
            sql,
            bind: None,
            row_mode: RowMode::default(),
            return_value: ReturnValue::default(),
        }
    }

    pub fn bind(mut self, bind: impl Into<Bind>) -> Self {
        self.bind = Some(bind.into());
        self
    }

    pub fn row_mode(mut self, row_mode: RowMode) -> Self {
        self.row_mode = row_mode;
        self
    }

    /// Return the result rows instead of nothing.
    pub fn result_rows(mut self) -> Self {
        self.return_value = ReturnValue::ResultRows;
        self
    }
}

/// Outcome of a one-shot execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecResult {
    Done,
    Rows(Vec<Row>),
}

impl ExecResult {
    /// Result rows, or an empty list when none were requested.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            ExecResult::Done => Vec::new(),
            ExecResult::Rows(rows) => rows,
        }
    }
}
