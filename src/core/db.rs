use crate::core::broker::DbBroker;
use crate::core::error;
use crate::core::schemas;
use crate::core::store::Store;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

pub fn db_connect(db_path: &str) -> Result<Connection, error::HandoverError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(error::HandoverError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(error::HandoverError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(error::HandoverError::RusqliteError)?;
    Ok(conn)
}

pub fn handover_db_path(store: &Store) -> PathBuf {
    store.root.join(schemas::HANDOVER_DB_NAME)
}

/// Run one subsystem's DDL statements against the handover database.
pub fn apply_schema(
    store: &Store,
    op_name: &str,
    statements: &[&str],
) -> Result<(), error::HandoverError> {
    fs::create_dir_all(&store.root).map_err(error::HandoverError::IoError)?;
    let broker = DbBroker::new(store);
    broker.with_conn("handover", op_name, |conn| {
        for stmt in statements {
            conn.execute(stmt, []).map_err(|e| {
                error::HandoverError::DatabaseInitializationError(format!("{}: {}", op_name, e))
            })?;
        }
        Ok(())
    })
}

/// Bump a project's `updated_at` after a change to one of its child records.
pub fn touch_project(conn: &Connection, project_id: i64) -> Result<(), error::HandoverError> {
    conn.execute(
        "UPDATE projects SET updated_at = ?1 WHERE id = ?2",
        rusqlite::params![crate::core::time::now_rfc3339(), project_id],
    )?;
    Ok(())
}

// Subsystems own their schemas and initialization; `subsystems.rs` only orders them.
