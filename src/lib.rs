//! Handover: local-first tracking of software-project handovers between teams.
//!
//! A handover moves through three phases (discovery, knowledge transfer,
//! transition). For each project this crate keeps a phase checklist,
//! weighted assessment criteria, knowledge-transfer sessions, issues, team
//! contacts and file attachments, and sends subscribers a weekly email digest
//! of what changed.
//!
//! # Architecture
//!
//! - **Store** (`<project>/.handover/data/`): one SQLite database plus the
//!   broker audit log and attachment copies.
//! - **The thin waist**: every read and write goes through `DbBroker`, which
//!   serializes access in-process and appends to `broker.events.jsonl`.
//! - **Scoring** is a pure engine over assessment rows and phase weights.
//! - **Newsletter** aggregates a subscriber's week through the
//!   `DigestSource` trait, renders HTML, dispatches via Brevo and records
//!   history. A `SchedulerHandle` fires it weekly in a named timezone.
//!
//! # Examples
//!
//! ```bash
//! handover init
//! handover project add --name "Acme Portal" --source-team Platform --target-team Ops
//! handover checklist status --id 3 --status complete
//! handover assess score --id 7 --score 4
//! handover report --project 1
//! handover newsletter subscribe --project 1 --email lead@example.com
//! handover newsletter serve
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: store, broker, schemas, errors, time, configuration
//! - [`plugins`]: subsystem implementations (project, checklist, scoring, newsletter, ...)

mod cli;
pub mod core;
pub mod plugins;
mod subsystems;

use cli::{
    AssessCommand, AttachCommand, ChecklistCommand, Cli, Command, IssueCommand, NewsletterCommand,
    OutputFormat, PhaseCommand, ProjectCommand, SessionCommand, TeamCommand,
};
use core::{
    config::{self, HandoverConfig},
    error,
    store::{Store, WORKSPACE_DIR},
    time::{self, WeekWindow},
};
use plugins::newsletter::{
    self,
    digest::aggregate_digest,
    mailer::DigestSender,
    render,
    scheduler::{SchedulerHandle, WeeklyDigestJob},
    source::SqliteSource,
};
use plugins::{
    assessment, attachment, checklist, issue, phase, project, report, scoring, session, team,
};

use chrono::{NaiveDate, Utc};
use clap::Parser;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

fn find_handover_project_root(start_dir: &Path) -> Result<PathBuf, error::HandoverError> {
    let mut current_dir = PathBuf::from(start_dir);
    loop {
        if current_dir.join(WORKSPACE_DIR).exists() {
            return Ok(current_dir);
        }
        if !current_dir.pop() {
            return Err(error::HandoverError::NotFound(
                "'.handover' directory not found in current or parent directories. Run `handover init` first.".to_string(),
            ));
        }
    }
}

/// Create (or complete) the workspace under `project_root`: store directory,
/// every subsystem's tables and a default `config.toml`. Idempotent.
pub fn init_workspace(project_root: &Path) -> Result<Store, error::HandoverError> {
    let store = Store::for_project_root(project_root);
    fs::create_dir_all(&store.root)?;
    subsystems::initialize_all_dbs(&store)?;
    let workspace_dir = project_root.join(WORKSPACE_DIR);
    if config::write_default_config(&workspace_dir)? {
        info!(path = %workspace_dir.display(), "default config written");
    }
    Ok(store)
}

/// Every subsystem's command schema, keyed by subsystem name.
pub fn subsystem_schemas() -> serde_json::Value {
    json!({
        "project": project::schema(),
        "phase": phase::schema(),
        "checklist": checklist::schema(),
        "assessment": assessment::schema(),
        "session": session::schema(),
        "issue": issue::schema(),
        "team": team::schema(),
        "attachment": attachment::schema(),
        "report": report::schema(),
        "newsletter": newsletter::schema(),
    })
}

fn emit(cmd: &str, extra: serde_json::Value) -> Result<(), error::HandoverError> {
    emit_status(cmd, "ok", extra)
}

fn emit_status(cmd: &str, status: &str, extra: serde_json::Value) -> Result<(), error::HandoverError> {
    let envelope = time::command_envelope(cmd, status, extra);
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

/// "Today" in the newsletter timezone; the same calendar the digest uses.
fn today(config: &HandoverConfig) -> Result<NaiveDate, error::HandoverError> {
    let tz = config.newsletter.timezone()?;
    Ok(Utc::now().with_timezone(&tz).date_naive())
}

fn current_window(config: &HandoverConfig) -> Result<WeekWindow, error::HandoverError> {
    let tz = config.newsletter.timezone()?;
    Ok(WeekWindow::containing(&Utc::now().with_timezone(&tz)))
}

pub fn run() -> Result<(), error::HandoverError> {
    let cli = Cli::parse();
    let current_dir = std::env::current_dir()?;

    let command = match cli.command {
        Command::Init { dir } => {
            let target = dir.unwrap_or(current_dir);
            let store = init_workspace(&target)?;
            return emit(
                "init",
                json!({
                    "root": target.display().to_string(),
                    "store": store.root.display().to_string(),
                }),
            );
        }
        Command::Schema => return emit("schema", json!({ "subsystems": subsystem_schemas() })),
        other => other,
    };

    let project_root = find_handover_project_root(&current_dir)?;
    let store = Store::for_project_root(&project_root);
    let config = config::load_config(&project_root.join(WORKSPACE_DIR))?;

    match command {
        Command::Init { .. } | Command::Schema => Ok(()),
        Command::Project(c) => run_project(&store, c.command),
        Command::Phase(c) => run_phase(&store, &config, c.command),
        Command::Checklist(c) => run_checklist(&store, c.command),
        Command::Assess(c) => run_assess(&store, &config, c.command),
        Command::Session(c) => run_session(&store, &config, c.command),
        Command::Issue(c) => run_issue(&store, c.command),
        Command::Team(c) => run_team(&store, c.command),
        Command::Attach(c) => run_attach(&store, c.command),
        Command::Report { project, format } => {
            let report = report::build_status_report(
                &store,
                project,
                &config.scoring.phase_weights,
                today(&config)?,
            )?;
            match format {
                OutputFormat::Text => {
                    print!("{}", report::render_text(&report));
                    Ok(())
                }
                OutputFormat::Json => emit("report", json!({ "report": report })),
            }
        }
        Command::Newsletter(c) => run_newsletter(&store, &config, c.command),
    }
}

fn run_project(store: &Store, command: ProjectCommand) -> Result<(), error::HandoverError> {
    match command {
        ProjectCommand::Add {
            name,
            description,
            source_team,
            target_team,
        } => {
            let created = project::add_project(
                store,
                project::AddProjectParams {
                    name: &name,
                    description: &description,
                    source_team: &source_team,
                    target_team: &target_team,
                },
            )?;
            emit("project.add", json!({ "project": created }))
        }
        ProjectCommand::List { status } => {
            let projects = project::list_projects(store, status.as_deref())?;
            emit("project.list", json!({ "projects": projects }))
        }
        ProjectCommand::Get { id } => {
            let found = project::require_project(store, id)?;
            emit("project.get", json!({ "project": found }))
        }
        ProjectCommand::Update {
            id,
            name,
            description,
            source_team,
            target_team,
            status,
            phase,
        } => {
            let updated = project::update_project(
                store,
                id,
                project::ProjectUpdate {
                    name,
                    description,
                    source_team,
                    target_team,
                    status,
                    current_phase: phase,
                },
            )?;
            emit("project.update", json!({ "project": updated }))
        }
        ProjectCommand::Delete { id } => {
            let deleted = project::delete_project(store, id)?;
            emit("project.delete", json!({ "id": id, "deleted": deleted }))
        }
    }
}

fn run_phase(store: &Store, config: &HandoverConfig, command: PhaseCommand) -> Result<(), error::HandoverError> {
    match command {
        PhaseCommand::List { project } => {
            let phases = phase::list_phases(store, project, &config.scoring.phase_weights)?;
            let dates = phase::list_phase_dates(store, project)?;
            emit("phase.list", json!({ "phases": phases, "dates": dates }))
        }
        PhaseCommand::Add {
            project,
            phase: phase_id,
            name,
            color,
        } => {
            phase::add_phase(store, project, &phase_id, &name, &color)?;
            let phases = phase::list_phases(store, project, &config.scoring.phase_weights)?;
            emit("phase.add", json!({ "phases": phases }))
        }
        PhaseCommand::Rename {
            project,
            phase: phase_id,
            name,
            color,
        } => {
            phase::rename_phase(store, project, &phase_id, name.as_deref(), color.as_deref())?;
            let phases = phase::list_phases(store, project, &config.scoring.phase_weights)?;
            emit("phase.rename", json!({ "phases": phases }))
        }
        PhaseCommand::Dates {
            project,
            phase: phase_id,
            start,
            end,
        } => {
            let dates = phase::set_phase_dates(store, project, &phase_id, start, end)?;
            emit("phase.dates", json!({ "phase_date": dates }))
        }
    }
}

fn run_checklist(store: &Store, command: ChecklistCommand) -> Result<(), error::HandoverError> {
    match command {
        ChecklistCommand::Add {
            project,
            phase,
            category,
            requirement,
            owner,
        } => {
            let item = checklist::add_item(
                store,
                checklist::AddItemParams {
                    project_id: project,
                    phase: &phase,
                    category: &category,
                    requirement: &requirement,
                    owner: &owner,
                },
            )?;
            emit("checklist.add", json!({ "item": item }))
        }
        ChecklistCommand::List { project, phase } => {
            let items = checklist::list_items(store, project, phase.as_deref(), None)?;
            let progress = checklist::phase_progress(&items);
            emit("checklist.list", json!({ "items": items, "progress": progress }))
        }
        ChecklistCommand::Status { id, status, notes } => {
            let item = checklist::set_status(store, id, status, notes.as_deref())?;
            emit("checklist.status", json!({ "item": item }))
        }
        ChecklistCommand::Delete { id } => {
            let deleted = checklist::delete_item(store, id)?;
            emit("checklist.delete", json!({ "id": id, "deleted": deleted }))
        }
    }
}

fn run_assess(store: &Store, config: &HandoverConfig, command: AssessCommand) -> Result<(), error::HandoverError> {
    match command {
        AssessCommand::Add {
            project,
            phase,
            category,
            weight,
            criteria,
        } => {
            let row = assessment::add_criterion(
                store,
                assessment::AddCriterionParams {
                    project_id: project,
                    phase: &phase,
                    category: &category,
                    category_weight: weight,
                    criteria: &criteria,
                },
            )?;
            emit("assess.add", json!({ "criterion": row }))
        }
        AssessCommand::List { project } => {
            let rows = assessment::list_scores(store, Some(project))?;
            emit("assess.list", json!({ "criteria": rows }))
        }
        AssessCommand::Score {
            id,
            score,
            clear,
            evidence,
        } => {
            if score.is_none() && !clear && evidence.is_none() {
                return Err(error::HandoverError::ValidationError(
                    "pass --score, --clear or --evidence".to_string(),
                ));
            }
            // Without --score or --clear the existing score is kept.
            let new_score = if clear {
                None
            } else {
                match score {
                    Some(s) => Some(s),
                    None => assessment::list_scores(store, None)?
                        .into_iter()
                        .find(|r| r.id == id)
                        .ok_or_else(|| error::HandoverError::NotFound(format!("assessment criterion {}", id)))?
                        .score,
                }
            };
            let row = assessment::set_score(store, id, new_score, evidence.as_deref())?;
            emit("assess.score", json!({ "criterion": row }))
        }
        AssessCommand::Summary { project } => {
            let summary = assessment::summarize(store, project, &config.scoring.phase_weights)?;
            emit(
                "assess.summary",
                json!({
                    "summary": summary,
                    "readiness_label": summary.readiness.label(),
                    "thresholds": ([
                        scoring::ReadinessLevel::Excellent,
                        scoring::ReadinessLevel::Good,
                        scoring::ReadinessLevel::Fair,
                        scoring::ReadinessLevel::Poor,
                        scoring::ReadinessLevel::NotReady,
                    ]
                    .iter()
                    .map(|l| json!({ "label": l.label(), "threshold_low": l.threshold_low() }))
                    .collect::<Vec<_>>()),
                }),
            )
        }
        AssessCommand::Delete { id } => {
            let deleted = assessment::delete_criterion(store, id)?;
            emit("assess.delete", json!({ "id": id, "deleted": deleted }))
        }
    }
}

fn run_session(store: &Store, config: &HandoverConfig, command: SessionCommand) -> Result<(), error::HandoverError> {
    match command {
        SessionCommand::Add {
            project,
            topic,
            presenter,
            date,
            time,
            hours,
            attendees,
        } => {
            let created = session::add_session(
                store,
                session::AddSessionParams {
                    project_id: project,
                    topic: &topic,
                    presenter: &presenter,
                    scheduled_date: date,
                    start_time: &time,
                    duration_hours: hours,
                    attendees: &attendees,
                },
            )?;
            emit("session.add", json!({ "session": created }))
        }
        SessionCommand::List { project, upcoming } => {
            let sessions = if upcoming {
                session::list_upcoming_sessions(store, project, today(config)?)?
            } else {
                session::list_sessions(store, project)?
            };
            emit("session.list", json!({ "sessions": sessions }))
        }
        SessionCommand::Update {
            id,
            topic,
            date,
            time,
            hours,
            attendees,
            status,
            rating,
            notes,
        } => {
            let updated = session::update_session(
                store,
                id,
                session::SessionUpdate {
                    topic,
                    scheduled_date: date,
                    start_time: time,
                    duration_hours: hours,
                    attendees,
                    status,
                    effectiveness_rating: rating,
                    notes,
                },
            )?;
            emit("session.update", json!({ "session": updated }))
        }
        SessionCommand::Delete { id } => {
            let deleted = session::delete_session(store, id)?;
            emit("session.delete", json!({ "id": id, "deleted": deleted }))
        }
    }
}

fn run_issue(store: &Store, command: IssueCommand) -> Result<(), error::HandoverError> {
    match command {
        IssueCommand::Add {
            project,
            title,
            description,
            priority,
            assignee,
        } => {
            let created = issue::add_issue(
                store,
                issue::AddIssueParams {
                    project_id: project,
                    title: &title,
                    description: &description,
                    priority,
                    assignee: &assignee,
                },
            )?;
            emit("issue.add", json!({ "issue": created }))
        }
        IssueCommand::List { project, status } => {
            let filter = match status {
                Some(s) => issue::IssueFilter::Status(s),
                None => issue::IssueFilter::All,
            };
            let issues = issue::list_issues(store, project, filter)?;
            emit("issue.list", json!({ "issues": issues }))
        }
        IssueCommand::Update {
            id,
            title,
            description,
            status,
            priority,
            assignee,
        } => {
            let updated = issue::update_issue(
                store,
                id,
                issue::IssueUpdate {
                    title,
                    description,
                    status,
                    priority,
                    assignee,
                },
            )?;
            emit("issue.update", json!({ "issue": updated }))
        }
        IssueCommand::Delete { id } => {
            let deleted = issue::delete_issue(store, id)?;
            emit("issue.delete", json!({ "id": id, "deleted": deleted }))
        }
    }
}

fn run_team(store: &Store, command: TeamCommand) -> Result<(), error::HandoverError> {
    match command {
        TeamCommand::Add {
            project,
            name,
            role,
            department,
            email,
        } => {
            let contact = team::add_contact(
                store,
                team::AddContactParams {
                    project_id: project,
                    name: &name,
                    role: &role,
                    department: &department,
                    email: &email,
                },
            )?;
            emit("team.add", json!({ "contact": contact }))
        }
        TeamCommand::List { project } => {
            let contacts = team::list_contacts(store, project, None)?;
            emit("team.list", json!({ "contacts": contacts }))
        }
        TeamCommand::Delete { id } => {
            let deleted = team::delete_contact(store, id)?;
            emit("team.delete", json!({ "id": id, "deleted": deleted }))
        }
    }
}

fn run_attach(store: &Store, command: AttachCommand) -> Result<(), error::HandoverError> {
    match command {
        AttachCommand::Add { project, path } => {
            let added = attachment::add_attachment(store, project, &path)?;
            emit("attach.add", json!({ "attachment": added }))
        }
        AttachCommand::List { project } => {
            let attachments = attachment::list_attachments(store, project, None)?;
            emit("attach.list", json!({ "attachments": attachments }))
        }
        AttachCommand::Delete { id } => {
            let deleted = attachment::delete_attachment(store, id)?;
            emit("attach.delete", json!({ "id": id, "deleted": deleted }))
        }
    }
}

fn run_newsletter(
    store: &Store,
    config: &HandoverConfig,
    command: NewsletterCommand,
) -> Result<(), error::HandoverError> {
    match command {
        NewsletterCommand::Subscribe { project, email } => {
            project::require_project(store, project)?;
            let sub = newsletter::subscribe(store, project, &email)?;
            emit("newsletter.subscribe", json!({ "subscription": sub }))
        }
        NewsletterCommand::Unsubscribe { project, email } => {
            let changed = newsletter::unsubscribe(store, project, &email)?;
            emit("newsletter.unsubscribe", json!({ "unsubscribed": changed }))
        }
        NewsletterCommand::Subscribers { project } => {
            let subs = newsletter::list_subscriptions(store, project)?;
            emit("newsletter.subscribers", json!({ "subscriptions": subs }))
        }
        NewsletterCommand::Settings {
            project,
            enable,
            disable,
        } => {
            project::require_project(store, project)?;
            let settings = if enable || disable {
                newsletter::set_enabled(store, project, enable)?
            } else {
                match newsletter::get_settings(store, project)? {
                    Some(s) => s,
                    // Projects without a row are treated as enabled.
                    None => newsletter::set_enabled(store, project, true)?,
                }
            };
            emit("newsletter.settings", json!({ "settings": settings }))
        }
        NewsletterCommand::History { project, limit } => {
            let entries = newsletter::list_history(store, project, limit)?;
            emit("newsletter.history", json!({ "entries": entries }))
        }
        NewsletterCommand::Preview { email, out } => {
            let source = SqliteSource::new(store.clone());
            let window = current_window(config)?;
            let Some(payload) = aggregate_digest(&source, &email, &window)? else {
                return emit_status(
                    "newsletter.preview",
                    "skipped",
                    json!({ "recipient": email, "reason": "no active subscriptions" }),
                );
            };
            let subject = render::render_subject(&payload);
            let body = render::render_body(&payload);
            match out {
                Some(path) => {
                    fs::write(&path, body)?;
                    emit(
                        "newsletter.preview",
                        json!({
                            "recipient": email,
                            "subject": subject,
                            "projects": payload.projects.len(),
                            "out": path.display().to_string(),
                        }),
                    )
                }
                None => {
                    print!("{}", body);
                    Ok(())
                }
            }
        }
        NewsletterCommand::Send { email } => {
            let sender = DigestSender::from_config(&config.newsletter)?;
            let source = SqliteSource::new(store.clone());
            let window = current_window(config)?;
            match aggregate_digest(&source, &email, &window)? {
                Some(payload) if !payload.projects.is_empty() => {
                    let result = sender.send(&source, &payload)?;
                    emit(
                        "newsletter.send",
                        json!({
                            "recipient": email,
                            "subject": render::render_subject(&payload),
                            "result": result,
                        }),
                    )
                }
                _ => emit_status(
                    "newsletter.send",
                    "skipped",
                    json!({ "recipient": email, "reason": "no enabled subscribed projects" }),
                ),
            }
        }
        NewsletterCommand::Run => {
            let handle = SchedulerHandle::new(
                config.newsletter.schedule()?,
                WeeklyDigestJob::new(store.clone(), config.newsletter.clone()),
            );
            let summary = handle.trigger_now()?;
            emit("newsletter.run", json!({ "summary": summary }))
        }
        NewsletterCommand::Serve => {
            // Fail fast on bad credentials rather than at the first fire.
            config.newsletter.credentials()?;
            let schedule = config.newsletter.schedule()?;
            let mut handle = SchedulerHandle::new(
                schedule,
                WeeklyDigestJob::new(store.clone(), config.newsletter.clone()),
            );
            handle.start()?;
            eprintln!(
                "newsletter scheduler running ({}); next digest at {}. Press Ctrl-C to stop.",
                schedule.describe(),
                schedule.next_fire_after(Utc::now())
            );
            loop {
                std::thread::park();
            }
        }
    }
}
