use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error;
use crate::core::schemas;
use crate::core::store::Store;
use crate::core::time;
use crate::core::validate;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params, types::ToSql};
use serde::{Deserialize, Serialize};

/// How many sessions the upcoming-events view shows.
pub const UPCOMING_LIMIT: usize = 5;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum SessionStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "Scheduled",
            SessionStatus::Completed => "Completed",
            SessionStatus::Cancelled => "Cancelled",
        }
    }

    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "completed" | "complete" => SessionStatus::Completed,
            "cancelled" | "canceled" => SessionStatus::Cancelled,
            _ => SessionStatus::Scheduled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSession {
    pub id: i64,
    pub project_id: i64,
    pub topic: String,
    pub presenter: String,
    pub scheduled_date: NaiveDate,
    /// `HH:MM`, local to the team.
    pub start_time: String,
    pub duration_hours: f64,
    /// Comma-separated names, as entered.
    pub attendees: String,
    pub status: SessionStatus,
    pub effectiveness_rating: Option<u8>,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

impl KnowledgeSession {
    pub fn attendee_list(&self) -> Vec<&str> {
        self.attendees
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .collect()
    }
}

pub struct AddSessionParams<'a> {
    pub project_id: i64,
    pub topic: &'a str,
    pub presenter: &'a str,
    pub scheduled_date: NaiveDate,
    pub start_time: &'a str,
    pub duration_hours: f64,
    pub attendees: &'a str,
}

#[derive(Debug, Default, Clone)]
pub struct SessionUpdate {
    pub topic: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub duration_hours: Option<f64>,
    pub attendees: Option<String>,
    pub status: Option<SessionStatus>,
    pub effectiveness_rating: Option<u8>,
    pub notes: Option<String>,
}

const SESSION_COLUMNS: &str = "id, project_id, topic, presenter, scheduled_date, start_time, duration_hours, attendees, status, effectiveness_rating, notes, created_at, updated_at";

pub fn initialize_session_db(store: &Store) -> Result<(), error::HandoverError> {
    db::apply_schema(store, "session.init", &[schemas::SESSIONS_SCHEMA])
}

fn validate_start_time(value: &str) -> Result<(), error::HandoverError> {
    chrono::NaiveTime::parse_from_str(value, "%H:%M")
        .map(|_| ())
        .map_err(|_| error::HandoverError::ValidationError(format!("start time '{}' is not HH:MM", value)))
}

fn validate_duration(hours: f64) -> Result<(), error::HandoverError> {
    if !(hours > 0.0 && hours <= 24.0) {
        return Err(error::HandoverError::ValidationError(format!(
            "duration must be within (0, 24] hours, got {}",
            hours
        )));
    }
    Ok(())
}

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<KnowledgeSession> {
    let status: String = row.get(8)?;
    let rating: Option<i64> = row.get(9)?;
    Ok(KnowledgeSession {
        id: row.get(0)?,
        project_id: row.get(1)?,
        topic: row.get(2)?,
        presenter: row.get(3)?,
        scheduled_date: row.get(4)?,
        start_time: row.get(5)?,
        duration_hours: row.get(6)?,
        attendees: row.get(7)?,
        status: SessionStatus::parse(&status),
        effectiveness_rating: rating.and_then(|r| u8::try_from(r).ok()),
        notes: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn get_session_conn(conn: &Connection, id: i64) -> Result<Option<KnowledgeSession>, error::HandoverError> {
    let sql = format!("SELECT {} FROM knowledge_sessions WHERE id = ?1", SESSION_COLUMNS);
    Ok(conn.query_row(&sql, params![id], session_from_row).optional()?)
}

pub fn add_session(store: &Store, p: AddSessionParams<'_>) -> Result<KnowledgeSession, error::HandoverError> {
    validate::require_non_empty("topic", p.topic)?;
    validate_start_time(p.start_time)?;
    validate_duration(p.duration_hours)?;
    let broker = DbBroker::new(store);
    let now = time::now_rfc3339();
    broker.with_conn("handover", "session.add", |conn| {
        conn.execute(
            "INSERT INTO knowledge_sessions(project_id, topic, presenter, scheduled_date, start_time, duration_hours, attendees, status, created_at, updated_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, 'Scheduled', ?8, ?8)",
            params![p.project_id, p.topic, p.presenter, p.scheduled_date, p.start_time, p.duration_hours, p.attendees, now],
        )?;
        let id = conn.last_insert_rowid();
        db::touch_project(conn, p.project_id)?;
        get_session_conn(conn, id)?
            .ok_or_else(|| error::HandoverError::NotFound(format!("session {}", id)))
    })
}

pub fn list_sessions(store: &Store, project_id: i64) -> Result<Vec<KnowledgeSession>, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "session.list", |conn| {
        let sql = format!(
            "SELECT {} FROM knowledge_sessions WHERE project_id = ?1 ORDER BY scheduled_date, start_time, id",
            SESSION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![project_id], session_from_row)?;
        let mut sessions = Vec::new();
        for r in rows {
            sessions.push(r?);
        }
        Ok(sessions)
    })
}

/// Next sessions on or after `from`, excluding cancelled ones, ascending by date, capped at five.
pub fn list_upcoming_sessions(
    store: &Store,
    project_id: i64,
    from: NaiveDate,
) -> Result<Vec<KnowledgeSession>, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "session.upcoming", |conn| {
        let sql = format!(
            "SELECT {} FROM knowledge_sessions
             WHERE project_id = ?1 AND scheduled_date >= ?2 AND status != 'Cancelled'
             ORDER BY scheduled_date, start_time, id LIMIT ?3",
            SESSION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![project_id, from, UPCOMING_LIMIT as i64], session_from_row)?;
        let mut sessions = Vec::new();
        for r in rows {
            sessions.push(r?);
        }
        Ok(sessions)
    })
}

pub fn update_session(store: &Store, id: i64, update: SessionUpdate) -> Result<KnowledgeSession, error::HandoverError> {
    if let Some(t) = &update.start_time {
        validate_start_time(t)?;
    }
    if let Some(h) = update.duration_hours {
        validate_duration(h)?;
    }
    if let Some(r) = update.effectiveness_rating {
        validate::validate_one_to_five("effectiveness rating", r)?;
    }
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "session.update", |conn| {
        let mut set_clauses = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(v) = update.topic {
            set_clauses.push("topic = ?");
            params.push(Box::new(v));
        }
        if let Some(v) = update.scheduled_date {
            set_clauses.push("scheduled_date = ?");
            params.push(Box::new(v));
        }
        if let Some(v) = update.start_time {
            set_clauses.push("start_time = ?");
            params.push(Box::new(v));
        }
        if let Some(v) = update.duration_hours {
            set_clauses.push("duration_hours = ?");
            params.push(Box::new(v));
        }
        if let Some(v) = update.attendees {
            set_clauses.push("attendees = ?");
            params.push(Box::new(v));
        }
        if let Some(v) = update.status {
            set_clauses.push("status = ?");
            params.push(Box::new(v.as_str()));
        }
        if let Some(v) = update.effectiveness_rating {
            set_clauses.push("effectiveness_rating = ?");
            params.push(Box::new(i64::from(v)));
        }
        if let Some(v) = update.notes {
            set_clauses.push("notes = ?");
            params.push(Box::new(v));
        }

        set_clauses.push("updated_at = ?");
        params.push(Box::new(time::now_rfc3339()));
        params.push(Box::new(id));

        let update_sql = format!("UPDATE knowledge_sessions SET {} WHERE id = ?", set_clauses.join(", "));
        let params_as_dyn: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        if conn.execute(&update_sql, &params_as_dyn[..])? == 0 {
            return Err(error::HandoverError::NotFound(format!("session {}", id)));
        }
        let session = get_session_conn(conn, id)?
            .ok_or_else(|| error::HandoverError::NotFound(format!("session {}", id)))?;
        db::touch_project(conn, session.project_id)?;
        Ok(session)
    })
}

pub fn delete_session(store: &Store, id: i64) -> Result<bool, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "session.delete", |conn| {
        let Some(session) = get_session_conn(conn, id)? else {
            return Ok(false);
        };
        conn.execute("DELETE FROM knowledge_sessions WHERE id = ?1", params![id])?;
        db::touch_project(conn, session.project_id)?;
        Ok(true)
    })
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "session",
        "version": "0.1.0",
        "description": "Knowledge-transfer sessions",
        "commands": [
            { "name": "add", "parameters": ["project", "topic", "date", "time", "hours", "attendees"] },
            { "name": "list", "parameters": ["project", "upcoming"] },
            { "name": "update", "parameters": ["id", "status", "rating", "notes"] },
            { "name": "delete", "parameters": ["id"] }
        ],
        "storage": ["handover.db"]
    })
}
