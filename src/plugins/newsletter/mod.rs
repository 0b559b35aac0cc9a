//! Weekly newsletter: subscriptions, per-project settings and send history.
//!
//! The digest pipeline lives in the submodules: [`source`] is the data
//! interface, [`digest`] aggregates one subscriber's week, [`render`] turns it
//! into a subject and HTML body, [`mailer`] dispatches it and records history,
//! and [`scheduler`] drives the weekly run.

pub mod digest;
pub mod mailer;
pub mod render;
pub mod scheduler;
pub mod source;

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

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsletterSubscription {
    pub id: i64,
    pub project_id: i64,
    pub email: String,
    pub subscribed: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Gate that keeps a project out of every digest while `enabled` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsletterSettings {
    pub project_id: i64,
    pub enabled: bool,
    pub updated_at: String,
}

/// A history row to append after a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub project_id: i64,
    pub recipient: String,
    pub subject: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    /// The digest payload as sent, serialized JSON.
    pub payload: String,
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsletterHistoryEntry {
    pub id: i64,
    pub project_id: i64,
    pub recipient: String,
    pub subject: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub payload: String,
    pub message_id: Option<String>,
    pub sent_at: String,
}

const SUBSCRIPTION_COLUMNS: &str = "id, project_id, email, subscribed, created_at, updated_at";
const HISTORY_COLUMNS: &str =
    "id, project_id, recipient, subject, week_start, week_end, payload, message_id, sent_at";

pub fn initialize_newsletter_db(store: &Store) -> Result<(), error::HandoverError> {
    db::apply_schema(
        store,
        "newsletter.init",
        &[
            schemas::NEWSLETTER_SUBSCRIPTIONS_SCHEMA,
            schemas::NEWSLETTER_SETTINGS_SCHEMA,
            schemas::NEWSLETTER_HISTORY_SCHEMA,
        ],
    )
}

fn subscription_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NewsletterSubscription> {
    let subscribed: i64 = row.get(3)?;
    Ok(NewsletterSubscription {
        id: row.get(0)?,
        project_id: row.get(1)?,
        email: row.get(2)?,
        subscribed: subscribed != 0,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn history_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NewsletterHistoryEntry> {
    Ok(NewsletterHistoryEntry {
        id: row.get(0)?,
        project_id: row.get(1)?,
        recipient: row.get(2)?,
        subject: row.get(3)?,
        week_start: row.get(4)?,
        week_end: row.get(5)?,
        payload: row.get(6)?,
        message_id: row.get(7)?,
        sent_at: row.get(8)?,
    })
}

// --- Subscriptions ---

/// Subscribe `email` to a project. Re-subscribing an unsubscribed row flips it back.
pub fn subscribe(store: &Store, project_id: i64, email: &str) -> Result<NewsletterSubscription, error::HandoverError> {
    let email = validate::normalize_email(email)?;
    let broker = DbBroker::new(store);
    let now = time::now_rfc3339();
    broker.with_conn("handover", "newsletter.subscribe", |conn| {
        conn.execute(
            "INSERT INTO newsletter_subscriptions(project_id, email, subscribed, created_at, updated_at)
             VALUES(?1, ?2, 1, ?3, ?3)
             ON CONFLICT(project_id, email) DO UPDATE SET subscribed = 1, updated_at = excluded.updated_at",
            params![project_id, email, now],
        )?;
        let sql = format!(
            "SELECT {} FROM newsletter_subscriptions WHERE project_id = ?1 AND email = ?2",
            SUBSCRIPTION_COLUMNS
        );
        Ok(conn.query_row(&sql, params![project_id, email], subscription_from_row)?)
    })
}

/// Mark a subscription inactive. Returns false when there was none.
pub fn unsubscribe(store: &Store, project_id: i64, email: &str) -> Result<bool, error::HandoverError> {
    let email = validate::normalize_email(email)?;
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "newsletter.unsubscribe", |conn| {
        let changed = conn.execute(
            "UPDATE newsletter_subscriptions SET subscribed = 0, updated_at = ?1 WHERE project_id = ?2 AND email = ?3",
            params![time::now_rfc3339(), project_id, email],
        )?;
        Ok(changed > 0)
    })
}

pub fn list_subscriptions(
    store: &Store,
    project_id: Option<i64>,
) -> Result<Vec<NewsletterSubscription>, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "newsletter.subscriptions", |conn| {
        let mut query = format!("SELECT {} FROM newsletter_subscriptions", SUBSCRIPTION_COLUMNS);
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(pid) = project_id {
            query.push_str(" WHERE project_id = ?");
            params.push(Box::new(pid));
        }
        query.push_str(" ORDER BY id");

        let mut stmt = conn.prepare(&query)?;
        let params_as_dyn: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(&params_as_dyn[..], subscription_from_row)?;
        let mut subs = Vec::new();
        for r in rows {
            subs.push(r?);
        }
        Ok(subs)
    })
}

/// Distinct emails with at least one active subscription, in first-subscribed order.
pub fn list_active_subscriber_emails(store: &Store) -> Result<Vec<String>, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "newsletter.active_emails", |conn| {
        let mut stmt = conn.prepare(
            "SELECT email FROM newsletter_subscriptions WHERE subscribed = 1 GROUP BY email ORDER BY MIN(id)",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut emails = Vec::new();
        for r in rows {
            emails.push(r?);
        }
        Ok(emails)
    })
}

/// Projects `email` is actively subscribed to, in subscription order.
pub fn list_subscribed_project_ids(store: &Store, email: &str) -> Result<Vec<i64>, error::HandoverError> {
    let email = email.trim().to_lowercase();
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "newsletter.subscribed_projects", |conn| {
        let mut stmt = conn.prepare(
            "SELECT project_id FROM newsletter_subscriptions WHERE email = ?1 AND subscribed = 1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![email], |row| row.get::<_, i64>(0))?;
        let mut ids = Vec::new();
        for r in rows {
            ids.push(r?);
        }
        Ok(ids)
    })
}

// --- Settings ---

pub(crate) fn seed_settings(conn: &Connection, project_id: i64) -> Result<(), error::HandoverError> {
    conn.execute(
        "INSERT OR IGNORE INTO newsletter_settings(project_id, enabled, updated_at) VALUES(?1, 1, ?2)",
        params![project_id, time::now_rfc3339()],
    )?;
    Ok(())
}

pub fn get_settings(store: &Store, project_id: i64) -> Result<Option<NewsletterSettings>, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "newsletter.settings", |conn| {
        Ok(conn
            .query_row(
                "SELECT project_id, enabled, updated_at FROM newsletter_settings WHERE project_id = ?1",
                params![project_id],
                |row| {
                    let enabled: i64 = row.get(1)?;
                    Ok(NewsletterSettings {
                        project_id: row.get(0)?,
                        enabled: enabled != 0,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()?)
    })
}

pub fn set_enabled(store: &Store, project_id: i64, enabled: bool) -> Result<NewsletterSettings, error::HandoverError> {
    let broker = DbBroker::new(store);
    let now = time::now_rfc3339();
    broker.with_conn("handover", "newsletter.set_enabled", |conn| {
        conn.execute(
            "INSERT INTO newsletter_settings(project_id, enabled, updated_at) VALUES(?1, ?2, ?3)
             ON CONFLICT(project_id) DO UPDATE SET enabled = excluded.enabled, updated_at = excluded.updated_at",
            params![project_id, enabled as i64, now],
        )?;
        Ok(())
    })?;
    Ok(NewsletterSettings {
        project_id,
        enabled,
        updated_at: now,
    })
}

// --- History ---

/// Append history rows, one insert per row on a shared statement.
///
/// There is no wrapping transaction: if an insert fails, the rows before it
/// stay written.
pub fn append_history(store: &Store, records: &[HistoryRecord]) -> Result<usize, error::HandoverError> {
    if records.is_empty() {
        return Ok(0);
    }
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "newsletter.history.append", |conn| {
        let now = time::now_rfc3339();
        let mut stmt = conn.prepare(
            "INSERT INTO newsletter_history(project_id, recipient, subject, week_start, week_end, payload, message_id, sent_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        let mut written = 0;
        for r in records {
            stmt.execute(params![
                r.project_id,
                r.recipient,
                r.subject,
                r.week_start,
                r.week_end,
                r.payload,
                r.message_id,
                now
            ])?;
            written += 1;
        }
        Ok(written)
    })
}

pub fn list_history(
    store: &Store,
    project_id: Option<i64>,
    limit: usize,
) -> Result<Vec<NewsletterHistoryEntry>, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "newsletter.history.list", |conn| {
        let mut query = format!("SELECT {} FROM newsletter_history", HISTORY_COLUMNS);
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(pid) = project_id {
            query.push_str(" WHERE project_id = ?");
            params.push(Box::new(pid));
        }
        query.push_str(" ORDER BY id DESC LIMIT ?");
        params.push(Box::new(limit as i64));

        let mut stmt = conn.prepare(&query)?;
        let params_as_dyn: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(&params_as_dyn[..], history_from_row)?;
        let mut entries = Vec::new();
        for r in rows {
            entries.push(r?);
        }
        Ok(entries)
    })
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "newsletter",
        "version": "0.1.0",
        "description": "Weekly project digest by email",
        "commands": [
            { "name": "subscribe", "parameters": ["project", "email"] },
            { "name": "unsubscribe", "parameters": ["project", "email"] },
            { "name": "subscribers", "parameters": ["project"] },
            { "name": "settings", "parameters": ["project", "enable", "disable"] },
            { "name": "history", "parameters": ["project", "limit"] },
            { "name": "preview", "parameters": ["email", "out"] },
            { "name": "send", "parameters": ["email"] },
            { "name": "run", "parameters": [] },
            { "name": "serve", "parameters": [] }
        ],
        "storage": ["handover.db"]
    })
}
