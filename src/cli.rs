//! CLI struct definitions for the handover command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use crate::plugins::checklist::ChecklistStatus;
use crate::plugins::issue::{IssuePriority, IssueStatus};
use crate::plugins::session::SessionStatus;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "handover",
    version = env!("CARGO_PKG_VERSION"),
    about = "Track project handovers between teams: phase checklists, readiness scoring, knowledge sessions, issues and a weekly email digest."
)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Create the `.handover` workspace, its database and a default config.
    Init {
        /// Directory to initialize (defaults to current working directory).
        #[clap(short, long)]
        dir: Option<PathBuf>,
    },
    /// Print the command schema of every subsystem.
    Schema,
    Project(ProjectCli),
    Phase(PhaseCli),
    Checklist(ChecklistCli),
    /// Assessment criteria and readiness scores.
    Assess(AssessCli),
    Session(SessionCli),
    Issue(IssueCli),
    Team(TeamCli),
    /// File attachments.
    Attach(AttachCli),
    /// Project status report.
    Report {
        #[clap(long)]
        project: i64,
        #[clap(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    Newsletter(NewsletterCli),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

// ===== Projects =====

#[derive(clap::Args, Debug)]
pub(crate) struct ProjectCli {
    #[clap(subcommand)]
    pub command: ProjectCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum ProjectCommand {
    /// Create a project with the default phases, checklist and assessment template.
    Add {
        #[clap(long)]
        name: String,
        #[clap(long, default_value = "")]
        description: String,
        #[clap(long, default_value = "")]
        source_team: String,
        #[clap(long, default_value = "")]
        target_team: String,
    },
    List {
        #[clap(long)]
        status: Option<String>,
    },
    Get {
        #[clap(long)]
        id: i64,
    },
    Update {
        #[clap(long)]
        id: i64,
        #[clap(long)]
        name: Option<String>,
        #[clap(long)]
        description: Option<String>,
        #[clap(long)]
        source_team: Option<String>,
        #[clap(long)]
        target_team: Option<String>,
        #[clap(long)]
        status: Option<String>,
        /// Current phase id, e.g. "Phase 2".
        #[clap(long)]
        phase: Option<String>,
    },
    /// Delete a project and everything that belongs to it.
    Delete {
        #[clap(long)]
        id: i64,
    },
}

// ===== Phases =====

#[derive(clap::Args, Debug)]
pub(crate) struct PhaseCli {
    #[clap(subcommand)]
    pub command: PhaseCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum PhaseCommand {
    List {
        #[clap(long)]
        project: i64,
    },
    /// Add a project-specific phase.
    Add {
        #[clap(long)]
        project: i64,
        #[clap(long)]
        phase: String,
        #[clap(long)]
        name: String,
        #[clap(long, default_value = "#6b7280")]
        color: String,
    },
    /// Change a phase's display name and/or colour.
    Rename {
        #[clap(long)]
        project: i64,
        #[clap(long)]
        phase: String,
        #[clap(long)]
        name: Option<String>,
        #[clap(long)]
        color: Option<String>,
    },
    /// Set planned start/end dates (YYYY-MM-DD) for a phase.
    Dates {
        #[clap(long)]
        project: i64,
        #[clap(long)]
        phase: String,
        #[clap(long)]
        start: Option<NaiveDate>,
        #[clap(long)]
        end: Option<NaiveDate>,
    },
}

// ===== Checklist =====

#[derive(clap::Args, Debug)]
pub(crate) struct ChecklistCli {
    #[clap(subcommand)]
    pub command: ChecklistCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum ChecklistCommand {
    Add {
        #[clap(long)]
        project: i64,
        #[clap(long)]
        phase: String,
        #[clap(long)]
        category: String,
        #[clap(long)]
        requirement: String,
        #[clap(long, default_value = "")]
        owner: String,
    },
    /// List items with per-phase progress.
    List {
        #[clap(long)]
        project: i64,
        #[clap(long)]
        phase: Option<String>,
    },
    /// Set an item's status. Any status may follow any other.
    Status {
        #[clap(long)]
        id: i64,
        #[clap(long, value_enum)]
        status: ChecklistStatus,
        #[clap(long)]
        notes: Option<String>,
    },
    Delete {
        #[clap(long)]
        id: i64,
    },
}

// ===== Assessment =====

#[derive(clap::Args, Debug)]
pub(crate) struct AssessCli {
    #[clap(subcommand)]
    pub command: AssessCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum AssessCommand {
    /// Add an assessment criterion.
    Add {
        #[clap(long)]
        project: i64,
        #[clap(long)]
        phase: String,
        #[clap(long)]
        category: String,
        /// Category weight within its phase (0-100).
        #[clap(long, default_value_t = 0)]
        weight: i64,
        #[clap(long)]
        criteria: String,
    },
    List {
        #[clap(long)]
        project: i64,
    },
    /// Score a criterion 1-5, or clear its score.
    Score {
        #[clap(long)]
        id: i64,
        #[clap(long, conflicts_with = "clear")]
        score: Option<u8>,
        #[clap(long)]
        clear: bool,
        #[clap(long)]
        evidence: Option<String>,
    },
    /// Category, phase and overall scores with the readiness level.
    Summary {
        #[clap(long)]
        project: i64,
    },
    Delete {
        #[clap(long)]
        id: i64,
    },
}

// ===== Knowledge sessions =====

#[derive(clap::Args, Debug)]
pub(crate) struct SessionCli {
    #[clap(subcommand)]
    pub command: SessionCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum SessionCommand {
    Add {
        #[clap(long)]
        project: i64,
        #[clap(long)]
        topic: String,
        #[clap(long, default_value = "")]
        presenter: String,
        /// YYYY-MM-DD
        #[clap(long)]
        date: NaiveDate,
        /// HH:MM
        #[clap(long, default_value = "09:00")]
        time: String,
        #[clap(long, default_value_t = 1.0)]
        hours: f64,
        /// Comma-separated names.
        #[clap(long, default_value = "")]
        attendees: String,
    },
    List {
        #[clap(long)]
        project: i64,
        /// Only the next five sessions from today, excluding cancelled ones.
        #[clap(long)]
        upcoming: bool,
    },
    Update {
        #[clap(long)]
        id: i64,
        #[clap(long)]
        topic: Option<String>,
        #[clap(long)]
        date: Option<NaiveDate>,
        #[clap(long)]
        time: Option<String>,
        #[clap(long)]
        hours: Option<f64>,
        #[clap(long)]
        attendees: Option<String>,
        #[clap(long, value_enum)]
        status: Option<SessionStatus>,
        /// Effectiveness rating 1-5.
        #[clap(long)]
        rating: Option<u8>,
        #[clap(long)]
        notes: Option<String>,
    },
    Delete {
        #[clap(long)]
        id: i64,
    },
}

// ===== Issues =====

#[derive(clap::Args, Debug)]
pub(crate) struct IssueCli {
    #[clap(subcommand)]
    pub command: IssueCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum IssueCommand {
    Add {
        #[clap(long)]
        project: i64,
        #[clap(long)]
        title: String,
        #[clap(long, default_value = "")]
        description: String,
        #[clap(long, value_enum, default_value = "medium")]
        priority: IssuePriority,
        #[clap(long, default_value = "")]
        assignee: String,
    },
    List {
        #[clap(long)]
        project: i64,
        #[clap(long, value_enum)]
        status: Option<IssueStatus>,
    },
    Update {
        #[clap(long)]
        id: i64,
        #[clap(long)]
        title: Option<String>,
        #[clap(long)]
        description: Option<String>,
        #[clap(long, value_enum)]
        status: Option<IssueStatus>,
        #[clap(long, value_enum)]
        priority: Option<IssuePriority>,
        #[clap(long)]
        assignee: Option<String>,
    },
    Delete {
        #[clap(long)]
        id: i64,
    },
}

// ===== Team =====

#[derive(clap::Args, Debug)]
pub(crate) struct TeamCli {
    #[clap(subcommand)]
    pub command: TeamCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum TeamCommand {
    Add {
        #[clap(long)]
        project: i64,
        #[clap(long)]
        name: String,
        #[clap(long, default_value = "")]
        role: String,
        #[clap(long, default_value = "")]
        department: String,
        #[clap(long, default_value = "")]
        email: String,
    },
    List {
        #[clap(long)]
        project: i64,
    },
    Delete {
        #[clap(long)]
        id: i64,
    },
}

// ===== Attachments =====

#[derive(clap::Args, Debug)]
pub(crate) struct AttachCli {
    #[clap(subcommand)]
    pub command: AttachCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum AttachCommand {
    /// Copy a file into the store and record it against a project.
    Add {
        #[clap(long)]
        project: i64,
        #[clap(long)]
        path: PathBuf,
    },
    List {
        #[clap(long)]
        project: i64,
    },
    Delete {
        #[clap(long)]
        id: i64,
    },
}

// ===== Newsletter =====

#[derive(clap::Args, Debug)]
pub(crate) struct NewsletterCli {
    #[clap(subcommand)]
    pub command: NewsletterCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum NewsletterCommand {
    Subscribe {
        #[clap(long)]
        project: i64,
        #[clap(long)]
        email: String,
    },
    Unsubscribe {
        #[clap(long)]
        project: i64,
        #[clap(long)]
        email: String,
    },
    /// List subscriptions, optionally for one project.
    Subscribers {
        #[clap(long)]
        project: Option<i64>,
    },
    /// Show or change a project's newsletter switch.
    Settings {
        #[clap(long)]
        project: i64,
        #[clap(long, conflicts_with = "disable")]
        enable: bool,
        #[clap(long)]
        disable: bool,
    },
    History {
        #[clap(long)]
        project: Option<i64>,
        #[clap(long, default_value_t = 20)]
        limit: usize,
    },
    /// Render this week's digest for one recipient without sending it.
    Preview {
        #[clap(long)]
        email: String,
        /// Write the HTML body to a file instead of stdout.
        #[clap(long)]
        out: Option<PathBuf>,
    },
    /// Send this week's digest to one recipient now.
    Send {
        #[clap(long)]
        email: String,
    },
    /// Run the weekly digest for every subscriber now.
    Run,
    /// Arm the weekly trigger and block until interrupted.
    Serve,
}
