//! Phase checklist items and per-phase completion progress.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error;
use crate::core::schemas;
use crate::core::store::Store;
use crate::core::time::{self, WeekWindow};
use crate::core::validate;
use rusqlite::{Connection, OptionalExtension, params, types::ToSql};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const CHECKLIST_TEMPLATE: &str = include_str!("../../templates/checklist.toml");

/// Any status may be set at any time; there is no transition table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum ChecklistStatus {
    NotStarted,
    InProgress,
    Complete,
}

impl ChecklistStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChecklistStatus::NotStarted => "NotStarted",
            ChecklistStatus::InProgress => "InProgress",
            ChecklistStatus::Complete => "Complete",
        }
    }

    /// Lenient parse: "Complete", "complete", "in-progress", "Not Started", ...
    pub fn parse(value: &str) -> Option<Self> {
        let key: String = value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "notstarted" | "todo" => Some(ChecklistStatus::NotStarted),
            "inprogress" => Some(ChecklistStatus::InProgress),
            "complete" | "completed" | "done" => Some(ChecklistStatus::Complete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: i64,
    pub project_id: i64,
    pub phase: String,
    pub category: String,
    pub requirement: String,
    pub status: ChecklistStatus,
    pub owner: String,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct AddItemParams<'a> {
    pub project_id: i64,
    pub phase: &'a str,
    pub category: &'a str,
    pub requirement: &'a str,
    pub owner: &'a str,
}

/// Completion of one phase's checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub completed: usize,
    pub total: usize,
    pub percent: u32,
}

#[derive(Deserialize)]
struct ChecklistTemplate {
    phase: Vec<TemplatePhase>,
}

#[derive(Deserialize)]
struct TemplatePhase {
    id: String,
    items: Vec<TemplateItem>,
}

#[derive(Deserialize)]
struct TemplateItem {
    category: String,
    requirement: String,
}

const ITEM_COLUMNS: &str =
    "id, project_id, phase, category, requirement, status, owner, notes, created_at, updated_at";

pub fn initialize_checklist_db(store: &Store) -> Result<(), error::HandoverError> {
    db::apply_schema(
        store,
        "checklist.init",
        &[schemas::CHECKLIST_SCHEMA, schemas::CHECKLIST_SCHEMA_INDEX],
    )
}

/// Insert the default template items, one prepared statement per row.
pub(crate) fn seed_template(conn: &Connection, project_id: i64) -> Result<usize, error::HandoverError> {
    let template: ChecklistTemplate = toml::from_str(CHECKLIST_TEMPLATE)
        .map_err(|e| error::HandoverError::ConfigError(format!("checklist template: {}", e)))?;
    let now = time::now_rfc3339();
    let mut stmt = conn.prepare(
        "INSERT INTO checklist_items(project_id, phase, category, requirement, status, created_at, updated_at)
         VALUES(?1, ?2, ?3, ?4, 'NotStarted', ?5, ?5)",
    )?;
    let mut inserted = 0;
    for phase in &template.phase {
        for item in &phase.items {
            stmt.execute(params![project_id, phase.id, item.category, item.requirement, now])?;
            inserted += 1;
        }
    }
    Ok(inserted)
}

fn item_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChecklistItem> {
    let status: String = row.get(5)?;
    Ok(ChecklistItem {
        id: row.get(0)?,
        project_id: row.get(1)?,
        phase: row.get(2)?,
        category: row.get(3)?,
        requirement: row.get(4)?,
        status: ChecklistStatus::parse(&status).unwrap_or(ChecklistStatus::NotStarted),
        owner: row.get(6)?,
        notes: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn get_item_conn(conn: &Connection, id: i64) -> Result<Option<ChecklistItem>, error::HandoverError> {
    let sql = format!("SELECT {} FROM checklist_items WHERE id = ?1", ITEM_COLUMNS);
    Ok(conn.query_row(&sql, params![id], item_from_row).optional()?)
}

pub fn add_item(store: &Store, p: AddItemParams<'_>) -> Result<ChecklistItem, error::HandoverError> {
    validate::require_non_empty("phase", p.phase)?;
    validate::require_non_empty("requirement", p.requirement)?;
    let broker = DbBroker::new(store);
    let now = time::now_rfc3339();
    broker.with_conn("handover", "checklist.add", |conn| {
        conn.execute(
            "INSERT INTO checklist_items(project_id, phase, category, requirement, status, owner, created_at, updated_at)
             VALUES(?1, ?2, ?3, ?4, 'NotStarted', ?5, ?6, ?6)",
            params![p.project_id, p.phase, p.category, p.requirement, p.owner, now],
        )?;
        let id = conn.last_insert_rowid();
        db::touch_project(conn, p.project_id)?;
        get_item_conn(conn, id)?
            .ok_or_else(|| error::HandoverError::NotFound(format!("checklist item {}", id)))
    })
}

/// List a project's items, optionally restricted to one phase and/or to items
/// whose `updated_at` falls inside `updated_between`.
pub fn list_items(
    store: &Store,
    project_id: i64,
    phase: Option<&str>,
    updated_between: Option<&WeekWindow>,
) -> Result<Vec<ChecklistItem>, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "checklist.list", |conn| {
        let mut query = format!(
            "SELECT {} FROM checklist_items WHERE project_id = ?",
            ITEM_COLUMNS
        );
        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(project_id)];
        if let Some(ph) = phase {
            query.push_str(" AND phase = ?");
            params.push(Box::new(ph.to_string()));
        }
        if let Some(w) = updated_between {
            query.push_str(" AND updated_at >= ? AND updated_at <= ?");
            params.push(Box::new(w.start_utc()));
            params.push(Box::new(w.end_utc()));
        }
        query.push_str(" ORDER BY phase, id");

        let mut stmt = conn.prepare(&query)?;
        let params_as_dyn: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(&params_as_dyn[..], item_from_row)?;
        let mut items = Vec::new();
        for r in rows {
            items.push(r?);
        }
        Ok(items)
    })
}

pub fn set_status(
    store: &Store,
    id: i64,
    status: ChecklistStatus,
    notes: Option<&str>,
) -> Result<ChecklistItem, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "checklist.status", |conn| {
        let changed = conn.execute(
            "UPDATE checklist_items SET status = ?1, notes = COALESCE(?2, notes), updated_at = ?3 WHERE id = ?4",
            params![status.as_str(), notes, time::now_rfc3339(), id],
        )?;
        if changed == 0 {
            return Err(error::HandoverError::NotFound(format!("checklist item {}", id)));
        }
        let item = get_item_conn(conn, id)?
            .ok_or_else(|| error::HandoverError::NotFound(format!("checklist item {}", id)))?;
        db::touch_project(conn, item.project_id)?;
        Ok(item)
    })
}

pub fn delete_item(store: &Store, id: i64) -> Result<bool, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "checklist.delete", |conn| {
        let Some(item) = get_item_conn(conn, id)? else {
            return Ok(false);
        };
        conn.execute("DELETE FROM checklist_items WHERE id = ?1", params![id])?;
        db::touch_project(conn, item.project_id)?;
        Ok(true)
    })
}

/// Completion per phase over every supplied item: `round(completed / total * 100)`.
pub fn phase_progress(items: &[ChecklistItem]) -> BTreeMap<String, PhaseProgress> {
    let mut counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for item in items {
        let entry = counts.entry(item.phase.clone()).or_insert((0, 0));
        entry.1 += 1;
        if item.status == ChecklistStatus::Complete {
            entry.0 += 1;
        }
    }
    counts
        .into_iter()
        .map(|(phase, (completed, total))| {
            let percent = if total == 0 {
                0
            } else {
                ((completed as f64 / total as f64) * 100.0).round() as u32
            };
            (phase, PhaseProgress { completed, total, percent })
        })
        .collect()
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "checklist",
        "version": "0.1.0",
        "description": "Three-phase handover checklist",
        "commands": [
            { "name": "add", "parameters": ["project", "phase", "category", "requirement", "owner"] },
            { "name": "list", "parameters": ["project", "phase"] },
            { "name": "status", "parameters": ["id", "status", "notes"] },
            { "name": "delete", "parameters": ["id"] }
        ],
        "storage": ["handover.db"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(phase: &str, status: ChecklistStatus) -> ChecklistItem {
        ChecklistItem {
            id: 0,
            project_id: 1,
            phase: phase.to_string(),
            category: "Docs".to_string(),
            requirement: "r".to_string(),
            status,
            owner: String::new(),
            notes: String::new(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_phase_progress_counts_all_items() {
        let mut items = vec![item("Phase 1", ChecklistStatus::Complete); 3];
        items.push(item("Phase 1", ChecklistStatus::NotStarted));
        items.push(item("Phase 2", ChecklistStatus::InProgress));
        let progress = phase_progress(&items);
        assert_eq!(progress["Phase 1"].percent, 75);
        assert_eq!(progress["Phase 1"].completed, 3);
        assert_eq!(progress["Phase 2"].percent, 0);
        assert!(!progress.contains_key("Phase 3"));
    }

    #[test]
    fn test_phase_progress_rounds_to_nearest() {
        let items = vec![
            item("Phase 1", ChecklistStatus::Complete),
            item("Phase 1", ChecklistStatus::Complete),
            item("Phase 1", ChecklistStatus::InProgress),
        ];
        assert_eq!(phase_progress(&items)["Phase 1"].percent, 67);
    }

    #[test]
    fn test_status_parse_is_lenient() {
        assert_eq!(ChecklistStatus::parse("Not Started"), Some(ChecklistStatus::NotStarted));
        assert_eq!(ChecklistStatus::parse("in-progress"), Some(ChecklistStatus::InProgress));
        assert_eq!(ChecklistStatus::parse("COMPLETE"), Some(ChecklistStatus::Complete));
        assert_eq!(ChecklistStatus::parse("blocked"), None);
    }

    #[test]
    fn test_template_parses() {
        let template: ChecklistTemplate = toml::from_str(CHECKLIST_TEMPLATE).unwrap();
        let ids: Vec<&str> = template.phase.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["Phase 1", "Phase 2", "Phase 3"]);
        assert!(template.phase.iter().all(|p| !p.items.is_empty()));
    }
}
