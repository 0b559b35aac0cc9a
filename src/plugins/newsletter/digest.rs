//! Weekly digest aggregation for one subscriber.

use crate::core::error::HandoverError;
use crate::core::time::WeekWindow;
use crate::plugins::attachment::Attachment;
use crate::plugins::checklist::{self, ChecklistItem, ChecklistStatus};
use crate::plugins::issue::{Issue, IssueFilter};
use crate::plugins::newsletter::source::DigestSource;
use crate::plugins::phase::PhaseDate;
use crate::plugins::project::Project;
use crate::plugins::session::KnowledgeSession;
use crate::plugins::team::TeamContact;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestPayload {
    pub recipient: String,
    pub week_start: DateTime<FixedOffset>,
    pub week_end: DateTime<FixedOffset>,
    pub projects: Vec<ProjectDigest>,
}

impl DigestPayload {
    pub fn window(&self) -> WeekWindow {
        WeekWindow {
            start: self.week_start,
            end: self.week_end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDigest {
    pub project: Project,
    pub weekly_activity: WeeklyActivity,
    pub details: ActivityDetails,
    /// Percent complete per phase over all of the phase's checklist items.
    pub phase_progress: BTreeMap<String, u32>,
    pub upcoming_events: UpcomingEvents,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyActivity {
    pub tasks_completed: usize,
    pub issues_created: usize,
    pub issues_resolved: usize,
    pub new_team_members: usize,
    pub new_attachments: usize,
    /// The project row itself was touched this week. Any child change touches it too.
    pub status_changed: bool,
}

impl WeeklyActivity {
    /// All five counters are zero (`status_changed` is not a counter).
    pub fn is_quiet(&self) -> bool {
        self.tasks_completed == 0
            && self.issues_created == 0
            && self.issues_resolved == 0
            && self.new_team_members == 0
            && self.new_attachments == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityDetails {
    pub tasks_completed: Vec<ChecklistItem>,
    pub issues_resolved: Vec<Issue>,
    pub new_team_members: Vec<TeamContact>,
    pub new_attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpcomingEvents {
    pub sessions: Vec<KnowledgeSession>,
    pub phase_dates: Vec<PhaseDate>,
}

/// Build `recipient`'s digest for `window`.
///
/// `None` when the recipient has no active subscriptions. Projects whose
/// newsletter is disabled are left out, which can leave `projects` empty.
/// Any data-access failure aborts the whole digest.
pub fn aggregate_digest<S>(
    source: &S,
    recipient: &str,
    window: &WeekWindow,
) -> Result<Option<DigestPayload>, HandoverError>
where
    S: DigestSource + ?Sized,
{
    let project_ids = source.list_subscribed_project_ids(recipient)?;
    if project_ids.is_empty() {
        return Ok(None);
    }

    let mut projects = Vec::with_capacity(project_ids.len());
    for project_id in project_ids {
        let enabled = source
            .get_newsletter_settings(project_id)?
            .map(|s| s.enabled)
            .unwrap_or(true);
        if !enabled {
            debug!(project_id, recipient, "newsletter disabled for project; skipping");
            continue;
        }
        projects.push(project_digest(source, project_id, window)?);
    }

    Ok(Some(DigestPayload {
        recipient: recipient.to_string(),
        week_start: window.start,
        week_end: window.end,
        projects,
    }))
}

pub fn project_digest<S>(source: &S, project_id: i64, window: &WeekWindow) -> Result<ProjectDigest, HandoverError>
where
    S: DigestSource + ?Sized,
{
    let project = source.get_project(project_id)?;

    let tasks_completed: Vec<ChecklistItem> = source
        .list_checklist_items(project_id, Some(window))?
        .into_iter()
        .filter(|i| i.status == ChecklistStatus::Complete)
        .collect();
    let issues_created = source.list_issues(project_id, IssueFilter::CreatedBetween(window))?;
    let issues_resolved = source.list_issues(project_id, IssueFilter::ResolvedBetween(window))?;
    let new_team_members = source.list_team_contacts(project_id, Some(window))?;
    let new_attachments = source.list_attachments(project_id, Some(window))?;

    let all_items = source.list_checklist_items(project_id, None)?;
    let phase_progress = checklist::phase_progress(&all_items)
        .into_iter()
        .map(|(phase, progress)| (phase, progress.percent))
        .collect();

    let upcoming_events = UpcomingEvents {
        sessions: source.list_upcoming_sessions(project_id, window.end_date())?,
        phase_dates: source.list_phase_dates(project_id)?,
    };

    let weekly_activity = WeeklyActivity {
        tasks_completed: tasks_completed.len(),
        issues_created: issues_created.len(),
        issues_resolved: issues_resolved.len(),
        new_team_members: new_team_members.len(),
        new_attachments: new_attachments.len(),
        status_changed: window.contains_stored(&project.updated_at),
    };

    Ok(ProjectDigest {
        project,
        weekly_activity,
        details: ActivityDetails {
            tasks_completed,
            issues_resolved,
            new_team_members,
            new_attachments,
        },
        phase_progress,
        upcoming_events,
    })
}
