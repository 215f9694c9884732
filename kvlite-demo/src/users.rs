// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! The demo interaction against a `users(id, name)` table.

use kvlite_engine::{Database, ExecOptions, Row, RowMode, bind};
use tracing::debug;

use crate::error::Result;

pub const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS users(id INTEGER, name TEXT)";

/// Highest id so far, 0 for an empty table.
pub fn max_id(db: &Database) -> Result<i64> {
    let max = db.select_value("SELECT max(id) as max_count FROM users")?;
    Ok(max.and_then(|v| v.as_i64()).unwrap_or(0))
}

/// Creates the table if needed and appends two users, one through a bound
/// one-shot exec and one through a prepared statement.
pub fn add_users(db: &Database) -> Result<i64> {
    db.exec(CREATE_TABLE)?;
    let max = max_id(db)?;
    debug!(max, "current max id");

    db.exec_with(
        ExecOptions::new("insert into users values(?,?)")
            .bind(bind![max + 1, format!("Alice{}", max + 1)]),
    )?;

    let mut stmt = db.prepare("insert into users values(?, ?)")?;
    let inserted = stmt
        .bind(bind![max + 2, format!("Bob{}", max + 2)])
        .and_then(|stmt| stmt.step_reset());
    // finalize even when the insert failed
    let finalized = stmt.finalize();
    inserted?;
    finalized?;

    Ok(max + 2)
}

pub fn list_users(db: &Database) -> Result<Vec<Row>> {
    let rows = db
        .exec_with(
            ExecOptions::new("SELECT * FROM users")
                .row_mode(RowMode::Object)
                .result_rows(),
        )?
        .into_rows();
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvlite_db::ConnectionManager;
    use kvlite_engine::{EngineConfig, OpenMode, StoreUri, Value};
    use kvlite_kv::KvBackend;

    fn scratch() -> ConnectionManager<kvlite_engine::Sqlite3> {
        ConnectionManager::sqlite(
            EngineConfig {
                local: KvBackend::Memory,
            },
            StoreUri::parse("file:scratch?vfs=memdb").unwrap(),
            OpenMode::default(),
        )
    }

    #[tokio::test]
    async fn empty_table_starts_at_zero() {
        let manager = scratch();
        let db = manager.get_database().await.unwrap();
        db.exec(CREATE_TABLE).unwrap();
        assert_eq!(max_id(&db).unwrap(), 0);
        assert!(list_users(&db).unwrap().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn each_run_appends_a_pair() {
        let manager = scratch();
        let db = manager.get_database().await.unwrap();

        assert_eq!(add_users(&db).unwrap(), 2);
        assert_eq!(add_users(&db).unwrap(), 4);

        let rows = list_users(&db).unwrap();
        let names: Vec<_> = rows
            .iter()
            .filter_map(|r| r.get("name").and_then(Value::as_str))
            .collect();
        assert_eq!(names, ["Alice1", "Bob2", "Alice3", "Bob4"]);
        assert_eq!(
            serde_json::to_string(&rows[0]).unwrap(),
            r#"{"id":1,"name":"Alice1"}"#
        );
    }

    #[tokio::test]
    async fn read_only_handle_rejects_inserts() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            local: KvBackend::Directory {
                path: dir.path().to_owned(),
            },
        };
        let writer = ConnectionManager::sqlite(
            config.clone(),
            StoreUri::local(),
            OpenMode::default(),
        );
        add_users(&writer.get_database().await.unwrap()).unwrap();
        writer.close_db().unwrap();

        let reader =
            ConnectionManager::sqlite(config, StoreUri::local(), OpenMode::parse("r").unwrap());
        let db = reader.get_database().await.unwrap();
        assert!(add_users(&db).is_err());
        assert_eq!(list_users(&db).unwrap().len(), 2);
    }
}
