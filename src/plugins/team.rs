use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error;
use crate::core::schemas;
use crate::core::store::Store;
use crate::core::time::{self, WeekWindow};
use crate::core::validate;
use rusqlite::{Connection, OptionalExtension, params, types::ToSql};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamContact {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub role: String,
    pub department: String,
    pub email: String,
    pub created_at: String,
}

pub struct AddContactParams<'a> {
    pub project_id: i64,
    pub name: &'a str,
    pub role: &'a str,
    pub department: &'a str,
    pub email: &'a str,
}

const CONTACT_COLUMNS: &str = "id, project_id, name, role, department, email, created_at";

pub fn initialize_team_db(store: &Store) -> Result<(), error::HandoverError> {
    db::apply_schema(store, "team.init", &[schemas::TEAM_SCHEMA])
}

fn contact_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TeamContact> {
    Ok(TeamContact {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        role: row.get(3)?,
        department: row.get(4)?,
        email: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn get_contact_conn(conn: &Connection, id: i64) -> Result<Option<TeamContact>, error::HandoverError> {
    let sql = format!("SELECT {} FROM team_contacts WHERE id = ?1", CONTACT_COLUMNS);
    Ok(conn.query_row(&sql, params![id], contact_from_row).optional()?)
}

pub fn add_contact(store: &Store, p: AddContactParams<'_>) -> Result<TeamContact, error::HandoverError> {
    validate::require_non_empty("contact name", p.name)?;
    // Email is optional for contacts, but must be well formed when given.
    let email = if p.email.trim().is_empty() {
        String::new()
    } else {
        validate::normalize_email(p.email)?
    };
    let broker = DbBroker::new(store);
    let now = time::now_rfc3339();
    broker.with_conn("handover", "team.add", |conn| {
        conn.execute(
            "INSERT INTO team_contacts(project_id, name, role, department, email, created_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
            params![p.project_id, p.name, p.role, p.department, email, now],
        )?;
        let id = conn.last_insert_rowid();
        db::touch_project(conn, p.project_id)?;
        get_contact_conn(conn, id)?
            .ok_or_else(|| error::HandoverError::NotFound(format!("team contact {}", id)))
    })
}

/// Contacts of a project, optionally only those created inside `created_between`.
pub fn list_contacts(
    store: &Store,
    project_id: i64,
    created_between: Option<&WeekWindow>,
) -> Result<Vec<TeamContact>, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "team.list", |conn| {
        let mut query = format!("SELECT {} FROM team_contacts WHERE project_id = ?", CONTACT_COLUMNS);
        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(project_id)];
        if let Some(w) = created_between {
            query.push_str(" AND created_at >= ? AND created_at <= ?");
            params.push(Box::new(w.start_utc()));
            params.push(Box::new(w.end_utc()));
        }
        query.push_str(" ORDER BY id");

        let mut stmt = conn.prepare(&query)?;
        let params_as_dyn: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(&params_as_dyn[..], contact_from_row)?;
        let mut contacts = Vec::new();
        for r in rows {
            contacts.push(r?);
        }
        Ok(contacts)
    })
}

pub fn delete_contact(store: &Store, id: i64) -> Result<bool, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "team.delete", |conn| {
        let Some(contact) = get_contact_conn(conn, id)? else {
            return Ok(false);
        };
        conn.execute("DELETE FROM team_contacts WHERE id = ?1", params![id])?;
        db::touch_project(conn, contact.project_id)?;
        Ok(true)
    })
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "team",
        "version": "0.1.0",
        "description": "Source and target team contacts",
        "commands": [
            { "name": "add", "parameters": ["project", "name", "role", "department", "email"] },
            { "name": "list", "parameters": ["project"] },
            { "name": "delete", "parameters": ["id"] }
        ],
        "storage": ["handover.db"]
    })
}
