//! Subsystem registration: centralizes all table initialization functions.
//!
//! Adding a new subsystem: append one entry to `SUBSYSTEMS`.

use crate::core::error;
use crate::core::store::Store;
use crate::plugins::{assessment, attachment, checklist, issue, newsletter, phase, project, session, team};
use tracing::debug;

pub(crate) struct SubsystemInit {
    pub name: &'static str,
    pub initialize_db: fn(&Store) -> Result<(), error::HandoverError>,
}

/// Every subsystem with tables. `project` comes first: all other tables
/// reference `projects(id)`.
pub(crate) const SUBSYSTEMS: &[SubsystemInit] = &[
    SubsystemInit { name: "project", initialize_db: project::initialize_project_db },
    SubsystemInit { name: "phase", initialize_db: phase::initialize_phase_db },
    SubsystemInit { name: "checklist", initialize_db: checklist::initialize_checklist_db },
    SubsystemInit { name: "assessment", initialize_db: assessment::initialize_assessment_db },
    SubsystemInit { name: "session", initialize_db: session::initialize_session_db },
    SubsystemInit { name: "issue", initialize_db: issue::initialize_issue_db },
    SubsystemInit { name: "team", initialize_db: team::initialize_team_db },
    SubsystemInit { name: "attachment", initialize_db: attachment::initialize_attachment_db },
    SubsystemInit { name: "newsletter", initialize_db: newsletter::initialize_newsletter_db },
];

/// Initialize all subsystem tables sequentially. Safe to repeat.
pub(crate) fn initialize_all_dbs(store: &Store) -> Result<(), error::HandoverError> {
    for sub in SUBSYSTEMS {
        debug!(subsystem = sub.name, "initializing tables");
        (sub.initialize_db)(store)?;
    }
    Ok(())
}
