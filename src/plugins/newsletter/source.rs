//! Data interface consumed by the digest pipeline.

use crate::core::error::HandoverError;
use crate::core::store::Store;
use crate::core::time::WeekWindow;
use crate::plugins::assessment::{self, AssessmentScore};
use crate::plugins::attachment::{self, Attachment};
use crate::plugins::checklist::{self, ChecklistItem};
use crate::plugins::issue::{self, Issue, IssueFilter};
use crate::plugins::newsletter::{self, HistoryRecord, NewsletterSettings};
use crate::plugins::phase::{self, PhaseDate};
use crate::plugins::project::{self, Project};
use crate::plugins::session::{self, KnowledgeSession};
use crate::plugins::team::{self, TeamContact};
use chrono::NaiveDate;

/// Reads (and the one write) the aggregator, sender and scheduler need.
pub trait DigestSource {
    fn list_active_subscriber_emails(&self) -> Result<Vec<String>, HandoverError>;
    fn list_subscribed_project_ids(&self, email: &str) -> Result<Vec<i64>, HandoverError>;
    fn get_newsletter_settings(&self, project_id: i64) -> Result<Option<NewsletterSettings>, HandoverError>;
    /// Fails with `NotFound` for an unknown project.
    fn get_project(&self, project_id: i64) -> Result<Project, HandoverError>;
    fn list_checklist_items(
        &self,
        project_id: i64,
        updated_between: Option<&WeekWindow>,
    ) -> Result<Vec<ChecklistItem>, HandoverError>;
    fn list_issues(&self, project_id: i64, filter: IssueFilter<'_>) -> Result<Vec<Issue>, HandoverError>;
    fn list_team_contacts(
        &self,
        project_id: i64,
        created_between: Option<&WeekWindow>,
    ) -> Result<Vec<TeamContact>, HandoverError>;
    fn list_attachments(
        &self,
        project_id: i64,
        uploaded_between: Option<&WeekWindow>,
    ) -> Result<Vec<Attachment>, HandoverError>;
    /// Sessions on or after `from`, not cancelled, ascending by date, at most five.
    fn list_upcoming_sessions(&self, project_id: i64, from: NaiveDate) -> Result<Vec<KnowledgeSession>, HandoverError>;
    fn list_phase_dates(&self, project_id: i64) -> Result<Vec<PhaseDate>, HandoverError>;
    fn list_assessment_scores(&self, project_id: Option<i64>) -> Result<Vec<AssessmentScore>, HandoverError>;
    fn append_newsletter_history(&self, records: &[HistoryRecord]) -> Result<usize, HandoverError>;
}

/// [`DigestSource`] over the handover SQLite store.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    store: Store,
}

impl SqliteSource {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

impl DigestSource for SqliteSource {
    fn list_active_subscriber_emails(&self) -> Result<Vec<String>, HandoverError> {
        newsletter::list_active_subscriber_emails(&self.store)
    }

    fn list_subscribed_project_ids(&self, email: &str) -> Result<Vec<i64>, HandoverError> {
        newsletter::list_subscribed_project_ids(&self.store, email)
    }

    fn get_newsletter_settings(&self, project_id: i64) -> Result<Option<NewsletterSettings>, HandoverError> {
        newsletter::get_settings(&self.store, project_id)
    }

    fn get_project(&self, project_id: i64) -> Result<Project, HandoverError> {
        project::require_project(&self.store, project_id)
    }

    fn list_checklist_items(
        &self,
        project_id: i64,
        updated_between: Option<&WeekWindow>,
    ) -> Result<Vec<ChecklistItem>, HandoverError> {
        checklist::list_items(&self.store, project_id, None, updated_between)
    }

    fn list_issues(&self, project_id: i64, filter: IssueFilter<'_>) -> Result<Vec<Issue>, HandoverError> {
        issue::list_issues(&self.store, project_id, filter)
    }

    fn list_team_contacts(
        &self,
        project_id: i64,
        created_between: Option<&WeekWindow>,
    ) -> Result<Vec<TeamContact>, HandoverError> {
        team::list_contacts(&self.store, project_id, created_between)
    }

    fn list_attachments(
        &self,
        project_id: i64,
        uploaded_between: Option<&WeekWindow>,
    ) -> Result<Vec<Attachment>, HandoverError> {
        attachment::list_attachments(&self.store, project_id, uploaded_between)
    }

    fn list_upcoming_sessions(&self, project_id: i64, from: NaiveDate) -> Result<Vec<KnowledgeSession>, HandoverError> {
        session::list_upcoming_sessions(&self.store, project_id, from)
    }

    fn list_phase_dates(&self, project_id: i64) -> Result<Vec<PhaseDate>, HandoverError> {
        phase::list_phase_dates(&self.store, project_id)
    }

    fn list_assessment_scores(&self, project_id: Option<i64>) -> Result<Vec<AssessmentScore>, HandoverError> {
        assessment::list_scores(&self.store, project_id)
    }

    fn append_newsletter_history(&self, records: &[HistoryRecord]) -> Result<usize, HandoverError> {
        newsletter::append_history(&self.store, records)
    }
}
