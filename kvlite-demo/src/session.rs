// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

use std::io::Write;

use kvlite_db::ConnectionManager;
use kvlite_engine::Sqlite3;
use tracing::{info, warn};

use crate::error::{DemoError, Result};
use crate::users::{add_users, list_users};

/// Runs the interaction `runs` times, writing the table as JSON after each.
pub async fn run(
    manager: &ConnectionManager<Sqlite3>,
    runs: usize,
    out: &mut impl Write,
) -> Result<()> {
    for round in 1..=runs {
        let db = manager.get_database().await?;
        let last = add_users(&db)?;
        info!(round, last, "added users");

        let rows = list_users(&db)?;
        serde_json::to_writer_pretty(&mut *out, &rows)?;
        writeln!(out).map_err(DemoError::Output)?;
    }
    Ok(())
}

/// Combines the outcome of a run with closing the database afterwards.
///
/// A failed run is reported as is; a close failure only surfaces when the
/// run itself succeeded.
pub fn teardown(result: Result<()>, closed: kvlite_db::Result<()>) -> Result<()> {
    match (result, closed) {
        (Err(e), Err(close)) => {
            warn!("Failed to close database: {close}");
            Err(e)
        }
        (result, closed) => {
            result?;
            Ok(closed?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvlite_engine::{EngineConfig, OpenMode, StoreUri};
    use kvlite_kv::KvBackend;

    fn close_failure() -> kvlite_db::Error {
        kvlite_db::Error::Unknown("close failed".to_string())
    }

    #[test]
    fn run_error_wins_over_close_error() {
        let result = teardown(Err(DemoError::config("run failed")), Err(close_failure()));
        assert!(matches!(result, Err(DemoError::Config(ref m)) if m == "run failed"));
    }

    #[test]
    fn close_error_surfaces_after_successful_run() {
        assert!(matches!(
            teardown(Ok(()), Err(close_failure())),
            Err(DemoError::Db(kvlite_db::Error::Unknown(_)))
        ));
        assert!(teardown(Ok(()), Ok(())).is_ok());
    }

    #[test_log::test(tokio::test)]
    async fn each_round_prints_the_table() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConnectionManager::sqlite(
            EngineConfig {
                local: KvBackend::Directory {
                    path: dir.path().to_owned(),
                },
            },
            StoreUri::local(),
            OpenMode::default(),
        );
        let mut out = Vec::new();
        let result = run(&manager, 2, &mut out).await;
        teardown(result, manager.close_db()).unwrap();

        let text = String::from_utf8(out).unwrap();
        let tables: Vec<serde_json::Value> = serde_json::Deserializer::from_str(&text)
            .into_iter::<serde_json::Value>()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].as_array().unwrap().len(), 2);
        assert_eq!(tables[1][3]["name"], "Bob4");
    }
}
