use crate::core::db;
use crate::core::error;
use crate::core::store::Store;
use crate::core::time;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

/// The DB Broker is the single path to the handover database.
/// It serializes access in-process and appends one audit event per call.
pub struct DbBroker {
    db_path: PathBuf,
    audit_log_path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub op: String,
    pub db_id: String,
    pub status: String,
}

impl DbBroker {
    pub fn new(store: &Store) -> Self {
        Self {
            db_path: db::handover_db_path(store),
            audit_log_path: store.root.join("broker.events.jsonl"),
        }
    }

    /// Execute a closure with a serialized connection to the handover DB.
    pub fn with_conn<F, R>(&self, actor: &str, op_name: &str, f: F) -> Result<R, error::HandoverError>
    where
        F: FnOnce(&Connection) -> Result<R, error::HandoverError>,
    {
        static DB_LOCK: Mutex<()> = Mutex::new(());
        // A panic in another holder leaves no half-applied state worth protecting.
        let _lock = DB_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let db_id = self
            .db_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let conn = db::db_connect(&self.db_path.to_string_lossy())?;

        let result = f(&conn);

        let status = if result.is_ok() { "success" } else { "error" };
        self.log_event(actor, op_name, &db_id, status)?;

        result
    }

    fn log_event(&self, actor: &str, op: &str, db_id: &str, status: &str) -> Result<(), error::HandoverError> {
        use std::fs::OpenOptions;
        use std::io::Write;

        let ev = BrokerEvent {
            ts: time::now_rfc3339(),
            event_id: time::new_event_id(),
            actor: actor.to_string(),
            op: op.to_string(),
            db_id: db_id.to_string(),
            status: status.to_string(),
        };

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)
            .map_err(error::HandoverError::IoError)?;

        writeln!(f, "{}", serde_json::to_string(&ev)?).map_err(error::HandoverError::IoError)?;
        Ok(())
    }
}

/// Read back the audit log, oldest first.
pub fn read_audit_log(store: &Store) -> Result<Vec<BrokerEvent>, error::HandoverError> {
    let path = store.root.join("broker.events.jsonl");
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    let mut events = Vec::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        events.push(serde_json::from_str(line)?);
    }
    Ok(events)
}
