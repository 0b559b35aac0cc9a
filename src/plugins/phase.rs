//! Per-project phase configuration (display name, colour, order), planned
//! phase dates, and the deployment-wide phase weights used for scoring.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error;
use crate::core::schemas;
use crate::core::store::Store;
use crate::core::validate;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default phase slots: `(phase_id, display_name, color)`.
pub const DEFAULT_PHASES: &[(&str, &str, &str)] = &[
    ("Phase 1", "Discovery & Planning", "#3b82f6"),
    ("Phase 2", "Knowledge Transfer", "#f59e0b"),
    ("Phase 3", "Transition & Handover", "#10b981"),
];

/// Phase weights keyed by phase id. Phases without an entry weigh 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseWeights(pub BTreeMap<String, u32>);

impl Default for PhaseWeights {
    fn default() -> Self {
        Self(BTreeMap::from([
            ("Phase 1".to_string(), 50),
            ("Phase 2".to_string(), 25),
            ("Phase 3".to_string(), 25),
        ]))
    }
}

impl PhaseWeights {
    pub fn weight_for(&self, phase_id: &str) -> u32 {
        self.0.get(phase_id).copied().unwrap_or(0)
    }
}

/// A project's phase as consumed by the scoring engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub phase_id: String,
    pub display_name: String,
    pub color: String,
    pub weight: u32,
}

impl Phase {
    pub fn new(phase_id: &str, weight: u32) -> Self {
        Self {
            phase_id: phase_id.to_string(),
            display_name: phase_id.to_string(),
            color: String::new(),
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDate {
    pub phase_id: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

pub fn initialize_phase_db(store: &Store) -> Result<(), error::HandoverError> {
    db::apply_schema(
        store,
        "phase.init",
        &[schemas::PHASES_SCHEMA, schemas::PHASE_DATES_SCHEMA],
    )
}

/// Default phases, weighted with `weights`; used for scoring when a project has no phase rows.
pub fn default_phases(weights: &PhaseWeights) -> Vec<Phase> {
    DEFAULT_PHASES
        .iter()
        .map(|(id, name, color)| Phase {
            phase_id: id.to_string(),
            display_name: name.to_string(),
            color: color.to_string(),
            weight: weights.weight_for(id),
        })
        .collect()
}

pub(crate) fn seed_default_phases(conn: &Connection, project_id: i64) -> Result<(), error::HandoverError> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO phases(project_id, phase_id, display_name, color, position)
         VALUES(?1, ?2, ?3, ?4, ?5)",
    )?;
    for (position, (id, name, color)) in DEFAULT_PHASES.iter().enumerate() {
        stmt.execute(params![project_id, id, name, color, position as i64])?;
    }
    Ok(())
}

pub fn list_phases(
    store: &Store,
    project_id: i64,
    weights: &PhaseWeights,
) -> Result<Vec<Phase>, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "phase.list", |conn| {
        list_phases_conn(conn, project_id, weights)
    })
}

pub(crate) fn list_phases_conn(
    conn: &Connection,
    project_id: i64,
    weights: &PhaseWeights,
) -> Result<Vec<Phase>, error::HandoverError> {
    let mut stmt = conn.prepare(
        "SELECT phase_id, display_name, color FROM phases
         WHERE project_id = ?1 ORDER BY position, phase_id",
    )?;
    let rows = stmt.query_map(params![project_id], |row| {
        let phase_id: String = row.get(0)?;
        Ok(Phase {
            weight: weights.weight_for(&phase_id),
            phase_id,
            display_name: row.get(1)?,
            color: row.get(2)?,
        })
    })?;
    let mut phases = Vec::new();
    for r in rows {
        phases.push(r?);
    }
    if phases.is_empty() {
        return Ok(default_phases(weights));
    }
    Ok(phases)
}

/// Add a project-specific phase after the existing ones.
pub fn add_phase(
    store: &Store,
    project_id: i64,
    phase_id: &str,
    display_name: &str,
    color: &str,
) -> Result<(), error::HandoverError> {
    validate::require_non_empty("phase id", phase_id)?;
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "phase.add", |conn| {
        let next_position: i64 = conn.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM phases WHERE project_id = ?1",
            params![project_id],
            |row| row.get(0),
        )?;
        let name = if display_name.trim().is_empty() { phase_id } else { display_name };
        conn.execute(
            "INSERT INTO phases(project_id, phase_id, display_name, color, position)
             VALUES(?1, ?2, ?3, ?4, ?5)",
            params![project_id, phase_id, name, color, next_position],
        )?;
        db::touch_project(conn, project_id)?;
        Ok(())
    })
}

/// Change a phase's display name and/or colour.
pub fn rename_phase(
    store: &Store,
    project_id: i64,
    phase_id: &str,
    display_name: Option<&str>,
    color: Option<&str>,
) -> Result<(), error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "phase.rename", |conn| {
        let changed = conn.execute(
            "UPDATE phases SET display_name = COALESCE(?3, display_name), color = COALESCE(?4, color)
             WHERE project_id = ?1 AND phase_id = ?2",
            params![project_id, phase_id, display_name, color],
        )?;
        if changed == 0 {
            return Err(error::HandoverError::NotFound(format!(
                "phase '{}' of project {}",
                phase_id, project_id
            )));
        }
        db::touch_project(conn, project_id)?;
        Ok(())
    })
}

pub fn set_phase_dates(
    store: &Store,
    project_id: i64,
    phase_id: &str,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<PhaseDate, error::HandoverError> {
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end < start {
            return Err(error::HandoverError::ValidationError(format!(
                "end date {} is before start date {}",
                end, start
            )));
        }
    }
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "phase.dates", |conn| {
        conn.execute(
            "INSERT INTO phase_dates(project_id, phase_id, start_date, end_date) VALUES(?1, ?2, ?3, ?4)
             ON CONFLICT(project_id, phase_id) DO UPDATE SET
                start_date = COALESCE(excluded.start_date, start_date),
                end_date = COALESCE(excluded.end_date, end_date)",
            params![project_id, phase_id, start_date, end_date],
        )?;
        db::touch_project(conn, project_id)?;
        let stored = conn
            .query_row(
                "SELECT phase_id, start_date, end_date FROM phase_dates WHERE project_id = ?1 AND phase_id = ?2",
                params![project_id, phase_id],
                phase_date_from_row,
            )
            .optional()?;
        stored.ok_or_else(|| error::HandoverError::NotFound(format!("phase dates for '{}'", phase_id)))
    })
}

pub fn list_phase_dates(store: &Store, project_id: i64) -> Result<Vec<PhaseDate>, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "phase.dates.list", |conn| {
        let mut stmt = conn.prepare(
            "SELECT d.phase_id, d.start_date, d.end_date FROM phase_dates d
             LEFT JOIN phases p ON p.project_id = d.project_id AND p.phase_id = d.phase_id
             WHERE d.project_id = ?1 ORDER BY COALESCE(p.position, 999), d.phase_id",
        )?;
        let rows = stmt.query_map(params![project_id], phase_date_from_row)?;
        let mut dates = Vec::new();
        for r in rows {
            dates.push(r?);
        }
        Ok(dates)
    })
}

fn phase_date_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PhaseDate> {
    Ok(PhaseDate {
        phase_id: row.get(0)?,
        start_date: row.get(1)?,
        end_date: row.get(2)?,
    })
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "phase",
        "version": "0.1.0",
        "description": "Per-project phase names, colours and planned dates",
        "commands": [
            { "name": "list", "parameters": ["project"] },
            { "name": "add", "parameters": ["project", "phase", "name", "color"] },
            { "name": "rename", "parameters": ["project", "phase", "name", "color"] },
            { "name": "dates", "parameters": ["project", "phase", "start", "end"] }
        ],
        "storage": ["handover.db"]
    })
}
