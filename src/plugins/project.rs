use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error;
use crate::core::schemas;
use crate::core::store::Store;
use crate::core::time;
use crate::core::validate;
use crate::plugins::{assessment, attachment, checklist, newsletter, phase};
use rusqlite::{Connection, OptionalExtension, params, types::ToSql};
use serde::{Deserialize, Serialize};
use tracing::info;
use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub handover_id: String,
    pub name: String,
    pub description: String,
    pub source_team: String,
    pub target_team: String,
    /// Free text, e.g. "active", "on-hold", "completed".
    pub status: String,
    pub current_phase: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct AddProjectParams<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub source_team: &'a str,
    pub target_team: &'a str,
}

#[derive(Debug, Default, Clone)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub source_team: Option<String>,
    pub target_team: Option<String>,
    pub status: Option<String>,
    pub current_phase: Option<String>,
}

const PROJECT_COLUMNS: &str = "id, handover_id, name, description, source_team, target_team, status, current_phase, created_at, updated_at";

pub fn initialize_project_db(store: &Store) -> Result<(), error::HandoverError> {
    db::apply_schema(store, "project.init", &[schemas::PROJECTS_SCHEMA])
}

fn project_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        handover_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        source_team: row.get(4)?,
        target_team: row.get(5)?,
        status: row.get(6)?,
        current_phase: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub(crate) fn get_project_conn(conn: &Connection, id: i64) -> Result<Option<Project>, error::HandoverError> {
    let sql = format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLUMNS);
    Ok(conn.query_row(&sql, params![id], project_from_row).optional()?)
}

/// Create a project and seed its phases, checklist, assessment criteria and newsletter settings.
///
/// Seeding is not wrapped in a transaction: a failure part-way leaves the
/// project with the rows written so far.
pub fn add_project(store: &Store, p: AddProjectParams<'_>) -> Result<Project, error::HandoverError> {
    validate::require_non_empty("project name", p.name)?;
    let broker = DbBroker::new(store);
    let handover_id = format!("HO_{}", Ulid::new());
    let now = time::now_rfc3339();

    let project = broker.with_conn("handover", "project.add", |conn| {
        conn.execute(
            "INSERT INTO projects(handover_id, name, description, source_team, target_team, status, current_phase, created_at, updated_at)
             VALUES(?1, ?2, ?3, ?4, ?5, 'active', 'Phase 1', ?6, ?6)",
            params![handover_id, p.name.trim(), p.description, p.source_team, p.target_team, now],
        )?;
        let id = conn.last_insert_rowid();
        phase::seed_default_phases(conn, id)?;
        checklist::seed_template(conn, id)?;
        assessment::seed_template(conn, id)?;
        newsletter::seed_settings(conn, id)?;
        get_project_conn(conn, id)?
            .ok_or_else(|| error::HandoverError::NotFound(format!("project {}", id)))
    })?;

    info!(project_id = project.id, handover_id = %project.handover_id, "project created");
    Ok(project)
}

pub fn get_project(store: &Store, id: i64) -> Result<Option<Project>, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "project.get", |conn| get_project_conn(conn, id))
}

/// Like [`get_project`] but a missing project is an error.
pub fn require_project(store: &Store, id: i64) -> Result<Project, error::HandoverError> {
    get_project(store, id)?.ok_or_else(|| error::HandoverError::NotFound(format!("project {}", id)))
}

pub fn list_projects(store: &Store, status: Option<&str>) -> Result<Vec<Project>, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "project.list", |conn| {
        let mut query = format!("SELECT {} FROM projects WHERE 1=1", PROJECT_COLUMNS);
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(s) = status {
            query.push_str(" AND status = ?");
            params.push(Box::new(s.to_string()));
        }
        query.push_str(" ORDER BY updated_at DESC, id DESC");

        let mut stmt = conn.prepare(&query)?;
        let params_as_dyn: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(&params_as_dyn[..], project_from_row)?;
        let mut projects = Vec::new();
        for r in rows {
            projects.push(r?);
        }
        Ok(projects)
    })
}

pub fn update_project(store: &Store, id: i64, update: ProjectUpdate) -> Result<Project, error::HandoverError> {
    if let Some(name) = &update.name {
        validate::require_non_empty("project name", name)?;
    }
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "project.update", |conn| {
        let mut set_clauses = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        let fields = [
            ("name", update.name),
            ("description", update.description),
            ("source_team", update.source_team),
            ("target_team", update.target_team),
            ("status", update.status),
            ("current_phase", update.current_phase),
        ];
        for (column, value) in fields {
            if let Some(v) = value {
                set_clauses.push(format!("{} = ?", column));
                params.push(Box::new(v));
            }
        }

        set_clauses.push("updated_at = ?".to_string());
        params.push(Box::new(time::now_rfc3339()));
        params.push(Box::new(id));

        let update_sql = format!("UPDATE projects SET {} WHERE id = ?", set_clauses.join(", "));
        let params_as_dyn: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let changed = conn.execute(&update_sql, &params_as_dyn[..])?;
        if changed == 0 {
            return Err(error::HandoverError::NotFound(format!("project {}", id)));
        }
        get_project_conn(conn, id)?
            .ok_or_else(|| error::HandoverError::NotFound(format!("project {}", id)))
    })
}

/// Delete a project; child rows go with it through `ON DELETE CASCADE`.
/// Stored attachment copies are removed from the uploads directory as well.
pub fn delete_project(store: &Store, id: i64) -> Result<bool, error::HandoverError> {
    let stored = attachment::list_attachments(store, id, None)?;
    let broker = DbBroker::new(store);
    let deleted = broker.with_conn("handover", "project.delete", |conn| {
        Ok(conn.execute("DELETE FROM projects WHERE id = ?1", params![id])? > 0)
    })?;
    if deleted {
        for a in &stored {
            attachment::remove_stored_file(store, a)?;
        }
        info!(project_id = id, attachments = stored.len(), "project deleted");
    }
    Ok(deleted)
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "project",
        "version": "0.1.0",
        "description": "Handover projects and their lifecycle",
        "commands": [
            { "name": "add", "parameters": ["name", "description", "source_team", "target_team"] },
            { "name": "list", "parameters": ["status"] },
            { "name": "get", "parameters": ["id"] },
            { "name": "update", "parameters": ["id", "name", "status", "phase"] },
            { "name": "delete", "parameters": ["id"] }
        ],
        "storage": ["handover.db"]
    })
}
