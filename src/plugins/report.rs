//! Project status report: checklist progress, readiness, open issues and upcoming sessions.

use crate::core::error;
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::assessment;
use crate::plugins::checklist::{self, PhaseProgress};
use crate::plugins::issue::{self, IssueFilter, IssuePriority, IssueStatus};
use crate::plugins::phase::{self, PhaseDate, PhaseWeights};
use crate::plugins::project::{self, Project};
use crate::plugins::scoring::{ReadinessLevel, ScoreBreakdown};
use crate::plugins::session::{self, KnowledgeSession};
use crate::plugins::{attachment, team};
use chrono::NaiveDate;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseStatus {
    pub phase_id: String,
    pub display_name: String,
    pub checklist: PhaseProgress,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub total: usize,
    pub resolved: usize,
    /// Unresolved issues per priority, highest first.
    pub open_by_priority: Vec<(IssuePriority, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub project: Project,
    pub generated_at: String,
    pub phases: Vec<PhaseStatus>,
    pub scores: ScoreBreakdown,
    pub issues: IssueSummary,
    pub upcoming_sessions: Vec<KnowledgeSession>,
    pub team_size: usize,
    pub attachments: usize,
}

pub fn build_status_report(
    store: &Store,
    project_id: i64,
    weights: &PhaseWeights,
    today: NaiveDate,
) -> Result<StatusReport, error::HandoverError> {
    let project = project::require_project(store, project_id)?;
    let phases = phase::list_phases(store, project_id, weights)?;
    let dates: BTreeMap<String, PhaseDate> = phase::list_phase_dates(store, project_id)?
        .into_iter()
        .map(|d| (d.phase_id.clone(), d))
        .collect();
    let progress = checklist::phase_progress(&checklist::list_items(store, project_id, None, None)?);

    let phase_rows = phases
        .iter()
        .map(|p| PhaseStatus {
            phase_id: p.phase_id.clone(),
            display_name: p.display_name.clone(),
            checklist: progress.get(&p.phase_id).copied().unwrap_or(PhaseProgress {
                completed: 0,
                total: 0,
                percent: 0,
            }),
            start_date: dates.get(&p.phase_id).and_then(|d| d.start_date),
            end_date: dates.get(&p.phase_id).and_then(|d| d.end_date),
        })
        .collect();

    let issues = issue::list_issues(store, project_id, IssueFilter::All)?;
    let open_by_priority = [
        IssuePriority::Critical,
        IssuePriority::High,
        IssuePriority::Medium,
        IssuePriority::Low,
    ]
    .into_iter()
    .map(|priority| {
        let open = issues
            .iter()
            .filter(|i| i.priority == priority && i.status != IssueStatus::Resolved)
            .count();
        (priority, open)
    })
    .collect();

    Ok(StatusReport {
        generated_at: time::now_rfc3339(),
        phases: phase_rows,
        scores: assessment::summarize(store, project_id, weights)?,
        issues: IssueSummary {
            total: issues.len(),
            resolved: issues.iter().filter(|i| i.status == IssueStatus::Resolved).count(),
            open_by_priority,
        },
        upcoming_sessions: session::list_upcoming_sessions(store, project_id, today)?,
        team_size: team::list_contacts(store, project_id, None)?.len(),
        attachments: attachment::list_attachments(store, project_id, None)?.len(),
        project,
    })
}

fn readiness_colored(level: ReadinessLevel) -> colored::ColoredString {
    let label = level.label();
    match level {
        ReadinessLevel::Excellent | ReadinessLevel::Good => label.green().bold(),
        ReadinessLevel::Fair => label.yellow().bold(),
        ReadinessLevel::Poor | ReadinessLevel::NotReady => label.red().bold(),
    }
}

/// Human-readable rendering for terminals.
pub fn render_text(report: &StatusReport) -> String {
    let mut out = String::new();
    let p = &report.project;
    let _ = writeln!(out, "{} {}", p.name.bold(), format!("({})", p.handover_id).dimmed());
    let _ = writeln!(
        out,
        "{} -> {} | status: {} | current phase: {}",
        p.source_team, p.target_team, p.status, p.current_phase
    );
    out.push('\n');

    let _ = writeln!(out, "{}", "Checklist".underline());
    for phase in &report.phases {
        let dates = match (phase.start_date, phase.end_date) {
            (None, None) => String::new(),
            (s, e) => format!(
                " [{} - {}]",
                s.map(|d| d.to_string()).unwrap_or_else(|| "TBC".into()),
                e.map(|d| d.to_string()).unwrap_or_else(|| "TBC".into())
            ),
        };
        let _ = writeln!(
            out,
            "  {:<28} {:>3}% ({}/{}){}",
            format!("{} {}", phase.phase_id, phase.display_name),
            phase.checklist.percent,
            phase.checklist.completed,
            phase.checklist.total,
            dates
        );
    }
    out.push('\n');

    let _ = writeln!(out, "{}", "Readiness".underline());
    let _ = writeln!(
        out,
        "  overall {}% {}",
        report.scores.overall,
        readiness_colored(report.scores.readiness)
    );
    for phase in &report.scores.phases {
        let _ = writeln!(
            out,
            "  {:<10} {:>3}% (weight {}, {}/{} scored)",
            phase.phase_id, phase.score, phase.weight, phase.scored, phase.total
        );
        for category in &phase.categories {
            let _ = writeln!(out, "    {:<32} {:>3}%", category.category, category.score);
        }
    }
    out.push('\n');

    let _ = writeln!(out, "{}", "Issues".underline());
    let _ = writeln!(
        out,
        "  {} total, {} resolved",
        report.issues.total, report.issues.resolved
    );
    for (priority, open) in &report.issues.open_by_priority {
        if *open > 0 {
            let _ = writeln!(out, "  {:<8} {} open", priority.as_str(), open);
        }
    }
    out.push('\n');

    let _ = writeln!(out, "{}", "Upcoming sessions".underline());
    if report.upcoming_sessions.is_empty() {
        let _ = writeln!(out, "  none scheduled");
    }
    for s in &report.upcoming_sessions {
        let _ = writeln!(out, "  {} {} {} ({})", s.scheduled_date, s.start_time, s.topic, s.presenter);
    }
    let _ = writeln!(out, "\nTeam contacts: {}  Attachments: {}", report.team_size, report.attachments);
    out
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "report",
        "version": "0.1.0",
        "description": "Project status report",
        "commands": [
            { "name": "report", "parameters": ["project", "format"] }
        ],
        "storage": ["handover.db"]
    })
}
