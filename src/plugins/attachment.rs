//! Project file attachments.
//!
//! Files are copied into `<store>/uploads/` under a ULID-prefixed name; the
//! row keeps the original name, size and SHA-256 of the copy.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error;
use crate::core::schemas;
use crate::core::store::Store;
use crate::core::time::{self, WeekWindow};
use rusqlite::{Connection, OptionalExtension, params, types::ToSql};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub project_id: i64,
    pub original_name: String,
    pub stored_name: String,
    pub size_bytes: i64,
    pub sha256: String,
    pub uploaded_at: String,
}

const ATTACHMENT_COLUMNS: &str = "id, project_id, original_name, stored_name, size_bytes, sha256, uploaded_at";

pub fn initialize_attachment_db(store: &Store) -> Result<(), error::HandoverError> {
    db::apply_schema(store, "attachment.init", &[schemas::ATTACHMENTS_SCHEMA])
}

fn attachment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get(0)?,
        project_id: row.get(1)?,
        original_name: row.get(2)?,
        stored_name: row.get(3)?,
        size_bytes: row.get(4)?,
        sha256: row.get(5)?,
        uploaded_at: row.get(6)?,
    })
}

fn get_attachment_conn(conn: &Connection, id: i64) -> Result<Option<Attachment>, error::HandoverError> {
    let sql = format!("SELECT {} FROM attachments WHERE id = ?1", ATTACHMENT_COLUMNS);
    Ok(conn.query_row(&sql, params![id], attachment_from_row).optional()?)
}

/// Keep only characters that are safe in a file name.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

pub fn hash_file(path: &Path) -> Result<(String, u64), error::HandoverError> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];
    let mut total = 0_u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok((format!("{:x}", hasher.finalize()), total))
}

pub fn stored_path(store: &Store, attachment: &Attachment) -> PathBuf {
    store.uploads_dir().join(&attachment.stored_name)
}

/// Copy `source` into the uploads directory and record it against the project.
pub fn add_attachment(store: &Store, project_id: i64, source: &Path) -> Result<Attachment, error::HandoverError> {
    if !source.is_file() {
        return Err(error::HandoverError::ValidationError(format!(
            "attachment source '{}' is not a readable file",
            source.display()
        )));
    }
    let original_name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let stored_name = format!("{}-{}", Ulid::new(), sanitize_file_name(&original_name));

    let uploads = store.uploads_dir();
    fs::create_dir_all(&uploads)?;
    let dest = uploads.join(&stored_name);
    fs::copy(source, &dest)?;
    let (sha256, size) = hash_file(&dest)?;
    debug!(stored = %stored_name, size, "attachment copied");

    let broker = DbBroker::new(store);
    let now = time::now_rfc3339();
    let inserted = broker.with_conn("handover", "attachment.add", |conn| {
        conn.execute(
            "INSERT INTO attachments(project_id, original_name, stored_name, size_bytes, sha256, uploaded_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
            params![project_id, original_name, stored_name, size as i64, sha256, now],
        )?;
        let id = conn.last_insert_rowid();
        db::touch_project(conn, project_id)?;
        get_attachment_conn(conn, id)?
            .ok_or_else(|| error::HandoverError::NotFound(format!("attachment {}", id)))
    });
    if inserted.is_err() {
        // Row insert failed (e.g. unknown project): do not leave an orphan copy.
        let _ = fs::remove_file(&dest);
    }
    inserted
}

/// Attachments of a project, optionally only those uploaded inside `uploaded_between`.
pub fn list_attachments(
    store: &Store,
    project_id: i64,
    uploaded_between: Option<&WeekWindow>,
) -> Result<Vec<Attachment>, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "attachment.list", |conn| {
        let mut query = format!("SELECT {} FROM attachments WHERE project_id = ?", ATTACHMENT_COLUMNS);
        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(project_id)];
        if let Some(w) = uploaded_between {
            query.push_str(" AND uploaded_at >= ? AND uploaded_at <= ?");
            params.push(Box::new(w.start_utc()));
            params.push(Box::new(w.end_utc()));
        }
        query.push_str(" ORDER BY id");

        let mut stmt = conn.prepare(&query)?;
        let params_as_dyn: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(&params_as_dyn[..], attachment_from_row)?;
        let mut attachments = Vec::new();
        for r in rows {
            attachments.push(r?);
        }
        Ok(attachments)
    })
}

/// Remove the stored copy. A copy that is already gone is not an error.
pub fn remove_stored_file(store: &Store, attachment: &Attachment) -> Result<(), error::HandoverError> {
    let path = stored_path(store, attachment);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "stored attachment already missing");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn delete_attachment(store: &Store, id: i64) -> Result<bool, error::HandoverError> {
    let broker = DbBroker::new(store);
    let removed = broker.with_conn("handover", "attachment.delete", |conn| {
        let Some(attachment) = get_attachment_conn(conn, id)? else {
            return Ok(None);
        };
        conn.execute("DELETE FROM attachments WHERE id = ?1", params![id])?;
        db::touch_project(conn, attachment.project_id)?;
        Ok(Some(attachment))
    })?;
    match removed {
        Some(a) => {
            remove_stored_file(store, &a)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "attachment",
        "version": "0.1.0",
        "description": "Project file attachments",
        "commands": [
            { "name": "add", "parameters": ["project", "path"] },
            { "name": "list", "parameters": ["project"] },
            { "name": "delete", "parameters": ["id"] }
        ],
        "storage": ["handover.db", "uploads/"]
    })
}
