use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error;
use crate::core::schemas;
use crate::core::store::Store;
use crate::core::time::{self, WeekWindow};
use crate::core::validate;
use rusqlite::{Connection, OptionalExtension, params, types::ToSql};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum IssueStatus {
    Open,
    InProgress,
    Resolved,
}

impl IssueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueStatus::Open => "Open",
            IssueStatus::InProgress => "InProgress",
            IssueStatus::Resolved => "Resolved",
        }
    }

    fn parse(value: &str) -> Self {
        let key: String = value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "inprogress" => IssueStatus::InProgress,
            "resolved" | "closed" => IssueStatus::Resolved,
            _ => IssueStatus::Open,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
pub enum IssuePriority {
    Low,
    Medium,
    High,
    Critical,
}

impl IssuePriority {
    pub fn as_str(self) -> &'static str {
        match self {
            IssuePriority::Low => "Low",
            IssuePriority::Medium => "Medium",
            IssuePriority::High => "High",
            IssuePriority::Critical => "Critical",
        }
    }

    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "low" => IssuePriority::Low,
            "high" => IssuePriority::High,
            "critical" => IssuePriority::Critical,
            _ => IssuePriority::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: i64,
    pub project_id: i64,
    /// Project-unique human id, `ISS-001`.
    pub issue_id: String,
    pub title: String,
    pub description: String,
    pub status: IssueStatus,
    pub priority: IssuePriority,
    pub assignee: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct AddIssueParams<'a> {
    pub project_id: i64,
    pub title: &'a str,
    pub description: &'a str,
    pub priority: IssuePriority,
    pub assignee: &'a str,
}

#[derive(Debug, Default, Clone)]
pub struct IssueUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
    pub assignee: Option<String>,
}

/// Row selection for [`list_issues`].
#[derive(Debug, Clone, Copy)]
pub enum IssueFilter<'a> {
    All,
    Status(IssueStatus),
    /// `created_at` inside the window.
    CreatedBetween(&'a WeekWindow),
    /// Status `Resolved` with `updated_at` inside the window.
    ResolvedBetween(&'a WeekWindow),
}

const ISSUE_COLUMNS: &str =
    "id, project_id, issue_id, title, description, status, priority, assignee, created_at, updated_at";

pub fn initialize_issue_db(store: &Store) -> Result<(), error::HandoverError> {
    db::apply_schema(store, "issue.init", &[schemas::ISSUES_SCHEMA])
}

fn issue_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Issue> {
    let status: String = row.get(5)?;
    let priority: String = row.get(6)?;
    Ok(Issue {
        id: row.get(0)?,
        project_id: row.get(1)?,
        issue_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        status: IssueStatus::parse(&status),
        priority: IssuePriority::parse(&priority),
        assignee: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn get_issue_conn(conn: &Connection, id: i64) -> Result<Option<Issue>, error::HandoverError> {
    let sql = format!("SELECT {} FROM issues WHERE id = ?1", ISSUE_COLUMNS);
    Ok(conn.query_row(&sql, params![id], issue_from_row).optional()?)
}

/// Next `ISS-NNN` for a project: one past the highest number in use.
fn next_issue_id(conn: &Connection, project_id: i64) -> Result<String, error::HandoverError> {
    let mut stmt = conn.prepare("SELECT issue_id FROM issues WHERE project_id = ?1")?;
    let rows = stmt.query_map(params![project_id], |row| row.get::<_, String>(0))?;
    let mut highest = 0_u32;
    for r in rows {
        let existing = r?;
        if let Some(n) = existing.strip_prefix("ISS-").and_then(|n| n.parse::<u32>().ok()) {
            highest = highest.max(n);
        }
    }
    Ok(format!("ISS-{:03}", highest + 1))
}

pub fn add_issue(store: &Store, p: AddIssueParams<'_>) -> Result<Issue, error::HandoverError> {
    validate::require_non_empty("issue title", p.title)?;
    let broker = DbBroker::new(store);
    let now = time::now_rfc3339();
    broker.with_conn("handover", "issue.add", |conn| {
        let issue_id = next_issue_id(conn, p.project_id)?;
        conn.execute(
            "INSERT INTO issues(project_id, issue_id, title, description, status, priority, assignee, created_at, updated_at)
             VALUES(?1, ?2, ?3, ?4, 'Open', ?5, ?6, ?7, ?7)",
            params![p.project_id, issue_id, p.title, p.description, p.priority.as_str(), p.assignee, now],
        )?;
        let id = conn.last_insert_rowid();
        db::touch_project(conn, p.project_id)?;
        get_issue_conn(conn, id)?.ok_or_else(|| error::HandoverError::NotFound(format!("issue {}", id)))
    })
}

pub fn list_issues(
    store: &Store,
    project_id: i64,
    filter: IssueFilter<'_>,
) -> Result<Vec<Issue>, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "issue.list", |conn| {
        let mut query = format!("SELECT {} FROM issues WHERE project_id = ?", ISSUE_COLUMNS);
        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(project_id)];
        match filter {
            IssueFilter::All => {}
            IssueFilter::Status(status) => {
                query.push_str(" AND status = ?");
                params.push(Box::new(status.as_str()));
            }
            IssueFilter::CreatedBetween(w) => {
                query.push_str(" AND created_at >= ? AND created_at <= ?");
                params.push(Box::new(w.start_utc()));
                params.push(Box::new(w.end_utc()));
            }
            IssueFilter::ResolvedBetween(w) => {
                query.push_str(" AND status = 'Resolved' AND updated_at >= ? AND updated_at <= ?");
                params.push(Box::new(w.start_utc()));
                params.push(Box::new(w.end_utc()));
            }
        }
        query.push_str(" ORDER BY id");

        let mut stmt = conn.prepare(&query)?;
        let params_as_dyn: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(&params_as_dyn[..], issue_from_row)?;
        let mut issues = Vec::new();
        for r in rows {
            issues.push(r?);
        }
        Ok(issues)
    })
}

pub fn update_issue(store: &Store, id: i64, update: IssueUpdate) -> Result<Issue, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "issue.update", |conn| {
        let mut set_clauses = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(v) = update.title {
            set_clauses.push("title = ?");
            params.push(Box::new(v));
        }
        if let Some(v) = update.description {
            set_clauses.push("description = ?");
            params.push(Box::new(v));
        }
        if let Some(v) = update.status {
            set_clauses.push("status = ?");
            params.push(Box::new(v.as_str()));
        }
        if let Some(v) = update.priority {
            set_clauses.push("priority = ?");
            params.push(Box::new(v.as_str()));
        }
        if let Some(v) = update.assignee {
            set_clauses.push("assignee = ?");
            params.push(Box::new(v));
        }

        set_clauses.push("updated_at = ?");
        params.push(Box::new(time::now_rfc3339()));
        params.push(Box::new(id));

        let update_sql = format!("UPDATE issues SET {} WHERE id = ?", set_clauses.join(", "));
        let params_as_dyn: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        if conn.execute(&update_sql, &params_as_dyn[..])? == 0 {
            return Err(error::HandoverError::NotFound(format!("issue {}", id)));
        }
        let issue = get_issue_conn(conn, id)?
            .ok_or_else(|| error::HandoverError::NotFound(format!("issue {}", id)))?;
        db::touch_project(conn, issue.project_id)?;
        Ok(issue)
    })
}

pub fn delete_issue(store: &Store, id: i64) -> Result<bool, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "issue.delete", |conn| {
        let Some(issue) = get_issue_conn(conn, id)? else {
            return Ok(false);
        };
        conn.execute("DELETE FROM issues WHERE id = ?1", params![id])?;
        db::touch_project(conn, issue.project_id)?;
        Ok(true)
    })
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "issue",
        "version": "0.1.0",
        "description": "Handover issue tracking",
        "commands": [
            { "name": "add", "parameters": ["project", "title", "description", "priority", "assignee"] },
            { "name": "list", "parameters": ["project", "status"] },
            { "name": "update", "parameters": ["id", "status", "priority", "assignee"] },
            { "name": "delete", "parameters": ["id"] }
        ],
        "storage": ["handover.db"]
    })
}
