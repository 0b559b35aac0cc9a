//! Readiness assessment criteria and their 1-5 scores.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error;
use crate::core::schemas;
use crate::core::store::Store;
use crate::core::time;
use crate::core::validate;
use crate::plugins::phase::{self, PhaseWeights};
use crate::plugins::scoring::{self, ScoreBreakdown};
use rusqlite::{Connection, OptionalExtension, params, types::ToSql};
use serde::{Deserialize, Serialize};

const ASSESSMENT_TEMPLATE: &str = include_str!("../../templates/assessment.toml");

/// One assessed criterion. `score` of `None` or `0` means "not yet scored".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentScore {
    pub id: i64,
    pub project_id: i64,
    pub phase: String,
    pub category: String,
    /// Stored for display; phase and overall scores do not apply it.
    pub category_weight: i64,
    pub criteria: String,
    pub score: Option<u8>,
    pub evidence: String,
    pub updated_at: String,
}

pub struct AddCriterionParams<'a> {
    pub project_id: i64,
    pub phase: &'a str,
    pub category: &'a str,
    pub category_weight: i64,
    pub criteria: &'a str,
}

#[derive(Deserialize)]
struct AssessmentTemplate {
    category: Vec<TemplateCategory>,
}

#[derive(Deserialize)]
struct TemplateCategory {
    phase: String,
    name: String,
    weight: i64,
    criteria: Vec<String>,
}

const SCORE_COLUMNS: &str =
    "id, project_id, phase, category, category_weight, criteria, score, evidence, updated_at";

pub fn initialize_assessment_db(store: &Store) -> Result<(), error::HandoverError> {
    db::apply_schema(
        store,
        "assessment.init",
        &[schemas::ASSESSMENT_SCHEMA, schemas::ASSESSMENT_SCHEMA_INDEX],
    )
}

pub(crate) fn seed_template(conn: &Connection, project_id: i64) -> Result<usize, error::HandoverError> {
    let template: AssessmentTemplate = toml::from_str(ASSESSMENT_TEMPLATE)
        .map_err(|e| error::HandoverError::ConfigError(format!("assessment template: {}", e)))?;
    let now = time::now_rfc3339();
    let mut stmt = conn.prepare(
        "INSERT INTO assessment_scores(project_id, phase, category, category_weight, criteria, score, updated_at)
         VALUES(?1, ?2, ?3, ?4, ?5, NULL, ?6)",
    )?;
    let mut inserted = 0;
    for category in &template.category {
        for criteria in &category.criteria {
            stmt.execute(params![project_id, category.phase, category.name, category.weight, criteria, now])?;
            inserted += 1;
        }
    }
    Ok(inserted)
}

fn score_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AssessmentScore> {
    let raw: Option<i64> = row.get(6)?;
    Ok(AssessmentScore {
        id: row.get(0)?,
        project_id: row.get(1)?,
        phase: row.get(2)?,
        category: row.get(3)?,
        category_weight: row.get(4)?,
        criteria: row.get(5)?,
        // Out-of-range values are treated as unscored.
        score: raw.and_then(|s| u8::try_from(s).ok()).filter(|s| (1..=5).contains(s)),
        evidence: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn get_score_conn(conn: &Connection, id: i64) -> Result<Option<AssessmentScore>, error::HandoverError> {
    let sql = format!("SELECT {} FROM assessment_scores WHERE id = ?1", SCORE_COLUMNS);
    Ok(conn.query_row(&sql, params![id], score_from_row).optional()?)
}

pub fn add_criterion(store: &Store, p: AddCriterionParams<'_>) -> Result<AssessmentScore, error::HandoverError> {
    validate::require_non_empty("phase", p.phase)?;
    validate::require_non_empty("category", p.category)?;
    validate::require_non_empty("criteria", p.criteria)?;
    if !(0..=100).contains(&p.category_weight) {
        return Err(error::HandoverError::ValidationError(format!(
            "category weight must be between 0 and 100, got {}",
            p.category_weight
        )));
    }
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "assessment.add", |conn| {
        conn.execute(
            "INSERT INTO assessment_scores(project_id, phase, category, category_weight, criteria, score, updated_at)
             VALUES(?1, ?2, ?3, ?4, ?5, NULL, ?6)",
            params![p.project_id, p.phase, p.category, p.category_weight, p.criteria, time::now_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();
        db::touch_project(conn, p.project_id)?;
        get_score_conn(conn, id)?
            .ok_or_else(|| error::HandoverError::NotFound(format!("assessment criterion {}", id)))
    })
}

/// Assessment rows for one project, or for every project when `project_id` is `None`.
pub fn list_scores(store: &Store, project_id: Option<i64>) -> Result<Vec<AssessmentScore>, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "assessment.list", |conn| {
        let mut query = format!("SELECT {} FROM assessment_scores", SCORE_COLUMNS);
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(id) = project_id {
            query.push_str(" WHERE project_id = ?");
            params.push(Box::new(id));
        }
        query.push_str(" ORDER BY project_id, phase, id");

        let mut stmt = conn.prepare(&query)?;
        let params_as_dyn: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(&params_as_dyn[..], score_from_row)?;
        let mut scores = Vec::new();
        for r in rows {
            scores.push(r?);
        }
        Ok(scores)
    })
}

/// Set (or clear, with `None`) a criterion's score; evidence is replaced when given.
pub fn set_score(
    store: &Store,
    id: i64,
    score: Option<u8>,
    evidence: Option<&str>,
) -> Result<AssessmentScore, error::HandoverError> {
    if let Some(s) = score {
        validate::validate_one_to_five("score", s)?;
    }
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "assessment.score", |conn| {
        let changed = conn.execute(
            "UPDATE assessment_scores SET score = ?1, evidence = COALESCE(?2, evidence), updated_at = ?3 WHERE id = ?4",
            params![score.map(i64::from), evidence, time::now_rfc3339(), id],
        )?;
        if changed == 0 {
            return Err(error::HandoverError::NotFound(format!("assessment criterion {}", id)));
        }
        let row = get_score_conn(conn, id)?
            .ok_or_else(|| error::HandoverError::NotFound(format!("assessment criterion {}", id)))?;
        db::touch_project(conn, row.project_id)?;
        Ok(row)
    })
}

pub fn delete_criterion(store: &Store, id: i64) -> Result<bool, error::HandoverError> {
    let broker = DbBroker::new(store);
    broker.with_conn("handover", "assessment.delete", |conn| {
        let Some(row) = get_score_conn(conn, id)? else {
            return Ok(false);
        };
        conn.execute("DELETE FROM assessment_scores WHERE id = ?1", params![id])?;
        db::touch_project(conn, row.project_id)?;
        Ok(true)
    })
}

/// Category, phase and overall readiness for one project.
pub fn summarize(
    store: &Store,
    project_id: i64,
    weights: &PhaseWeights,
) -> Result<ScoreBreakdown, error::HandoverError> {
    let rows = list_scores(store, Some(project_id))?;
    let phases = phase::list_phases(store, project_id, weights)?;
    Ok(scoring::breakdown(&rows, &phases))
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "assess",
        "version": "0.1.0",
        "description": "Readiness assessment criteria and scores",
        "commands": [
            { "name": "add", "parameters": ["project", "phase", "category", "weight", "criteria"] },
            { "name": "list", "parameters": ["project"] },
            { "name": "score", "parameters": ["id", "score", "evidence", "clear"] },
            { "name": "delete", "parameters": ["id"] },
            { "name": "summary", "parameters": ["project"] }
        ],
        "storage": ["handover.db"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_category_weights_sum_to_100_per_phase() {
        let template: AssessmentTemplate = toml::from_str(ASSESSMENT_TEMPLATE).unwrap();
        let mut sums = std::collections::BTreeMap::new();
        for c in &template.category {
            *sums.entry(c.phase.clone()).or_insert(0) += c.weight;
        }
        assert_eq!(sums.len(), 3);
        assert!(sums.values().all(|s| *s == 100));
    }
}
