use handover::core::error::HandoverError;
use handover::core::store::Store;
use handover::core::time::WeekWindow;
use handover::init_workspace;
use handover::plugins::attachment;
use handover::plugins::issue::{
    self, AddIssueParams, IssueFilter, IssuePriority, IssueStatus, IssueUpdate,
};
use handover::plugins::project::{AddProjectParams, add_project};
use handover::plugins::session::{self, AddSessionParams, SessionStatus, SessionUpdate};
use handover::plugins::team::{self, AddContactParams};
use chrono::{NaiveDate, TimeZone, Utc};
use std::fs;
use tempfile::tempdir;

fn setup() -> (tempfile::TempDir, Store, i64) {
    let tmp = tempdir().unwrap();
    let store = init_workspace(tmp.path()).unwrap();
    let pid = add_project(
        &store,
        AddProjectParams {
            name: "Warehouse",
            description: "",
            source_team: "Data Eng",
            target_team: "Analytics",
        },
    )
    .unwrap()
    .id;
    (tmp, store, pid)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn session_on(store: &Store, pid: i64, topic: &str, day: NaiveDate) -> session::KnowledgeSession {
    session::add_session(
        store,
        AddSessionParams {
            project_id: pid,
            topic,
            presenter: "Priya",
            scheduled_date: day,
            start_time: "10:00",
            duration_hours: 1.5,
            attendees: "Ana, Ben ,",
        },
    )
    .unwrap()
}

#[test]
fn test_upcoming_sessions_are_capped_and_skip_cancelled() {
    let (_tmp, store, pid) = setup();
    let today = date(2025, 1, 10);

    session_on(&store, pid, "Old walkthrough", date(2025, 1, 3));
    let cancelled = session_on(&store, pid, "Cancelled", date(2025, 1, 11));
    session::update_session(
        &store,
        cancelled.id,
        SessionUpdate {
            status: Some(SessionStatus::Cancelled),
            ..Default::default()
        },
    )
    .unwrap();
    for day in 10..=16 {
        session_on(&store, pid, &format!("Deep dive {}", day), date(2025, 1, day));
    }

    let upcoming = session::list_upcoming_sessions(&store, pid, today).unwrap();
    assert_eq!(upcoming.len(), session::UPCOMING_LIMIT);
    assert_eq!(upcoming[0].scheduled_date, today, "sessions scheduled today count as upcoming");
    assert!(upcoming.iter().all(|s| s.status != SessionStatus::Cancelled));
    assert!(upcoming.windows(2).all(|w| w[0].scheduled_date <= w[1].scheduled_date));

    assert_eq!(session::list_sessions(&store, pid).unwrap().len(), 9);
    assert_eq!(upcoming[0].attendee_list(), vec!["Ana", "Ben"]);
}

#[test]
fn test_session_validation_and_rating() {
    let (_tmp, store, pid) = setup();
    let bad_time = session::add_session(
        &store,
        AddSessionParams {
            project_id: pid,
            topic: "Runbooks",
            presenter: "",
            scheduled_date: date(2025, 2, 3),
            start_time: "9am",
            duration_hours: 1.0,
            attendees: "",
        },
    )
    .unwrap_err();
    assert!(matches!(bad_time, HandoverError::ValidationError(_)));

    let s = session_on(&store, pid, "Runbooks", date(2025, 2, 3));
    assert!(matches!(
        session::update_session(
            &store,
            s.id,
            SessionUpdate {
                duration_hours: Some(0.0),
                ..Default::default()
            }
        )
        .unwrap_err(),
        HandoverError::ValidationError(_)
    ));
    assert!(matches!(
        session::update_session(
            &store,
            s.id,
            SessionUpdate {
                effectiveness_rating: Some(7),
                ..Default::default()
            }
        )
        .unwrap_err(),
        HandoverError::ValidationError(_)
    ));

    let done = session::update_session(
        &store,
        s.id,
        SessionUpdate {
            status: Some(SessionStatus::Completed),
            effectiveness_rating: Some(4),
            notes: Some("good questions".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(done.status, SessionStatus::Completed);
    assert_eq!(done.effectiveness_rating, Some(4));
    assert_eq!(done.topic, "Runbooks");

    assert!(session::delete_session(&store, s.id).unwrap());
    assert!(!session::delete_session(&store, s.id).unwrap());
}

#[test]
fn test_issue_ids_are_sequential_per_project() {
    let (_tmp, store, pid) = setup();
    let other = add_project(
        &store,
        AddProjectParams {
            name: "Other",
            description: "",
            source_team: "",
            target_team: "",
        },
    )
    .unwrap()
    .id;

    let add = |project_id: i64, title: &str| {
        issue::add_issue(
            &store,
            AddIssueParams {
                project_id,
                title,
                description: "",
                priority: IssuePriority::High,
                assignee: "",
            },
        )
        .unwrap()
    };
    let first = add(pid, "Missing runbook");
    let second = add(pid, "No staging access");
    let elsewhere = add(other, "Unrelated");
    assert_eq!(first.issue_id, "ISS-001");
    assert_eq!(second.issue_id, "ISS-002");
    assert_eq!(elsewhere.issue_id, "ISS-001");
    assert_eq!(first.status, IssueStatus::Open);

    // Numbering continues from the highest id in use; gaps are not refilled.
    assert!(issue::delete_issue(&store, first.id).unwrap());
    assert_eq!(add(pid, "Third").issue_id, "ISS-003");
}

#[test]
fn test_issue_filters() {
    let (_tmp, store, pid) = setup();
    let created = issue::add_issue(
        &store,
        AddIssueParams {
            project_id: pid,
            title: "Flaky deploy",
            description: "fails one run in five",
            priority: IssuePriority::Critical,
            assignee: "lee",
        },
    )
    .unwrap();
    issue::add_issue(
        &store,
        AddIssueParams {
            project_id: pid,
            title: "Docs outdated",
            description: "",
            priority: IssuePriority::Low,
            assignee: "",
        },
    )
    .unwrap();

    issue::update_issue(
        &store,
        created.id,
        IssueUpdate {
            status: Some(IssueStatus::Resolved),
            ..Default::default()
        },
    )
    .unwrap();

    let resolved = issue::list_issues(&store, pid, IssueFilter::Status(IssueStatus::Resolved)).unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].priority, IssuePriority::Critical);

    let now = Utc::now().with_timezone(&chrono_tz::UTC);
    let this_week = WeekWindow::containing(&now);
    assert_eq!(issue::list_issues(&store, pid, IssueFilter::CreatedBetween(&this_week)).unwrap().len(), 2);
    assert_eq!(issue::list_issues(&store, pid, IssueFilter::ResolvedBetween(&this_week)).unwrap().len(), 1);

    let long_ago = WeekWindow::containing(&chrono_tz::UTC.with_ymd_and_hms(2001, 5, 9, 12, 0, 0).unwrap());
    assert!(issue::list_issues(&store, pid, IssueFilter::CreatedBetween(&long_ago)).unwrap().is_empty());
    assert_eq!(issue::list_issues(&store, pid, IssueFilter::All).unwrap().len(), 2);

    assert!(matches!(
        issue::update_issue(&store, 4242, IssueUpdate::default()).unwrap_err(),
        HandoverError::NotFound(_)
    ));
}

#[test]
fn test_team_contacts() {
    let (_tmp, store, pid) = setup();
    let contact = team::add_contact(
        &store,
        AddContactParams {
            project_id: pid,
            name: "Jordan",
            role: "Tech Lead",
            department: "Analytics",
            email: " Jordan@Example.com ",
        },
    )
    .unwrap();
    assert_eq!(contact.email, "jordan@example.com");

    team::add_contact(
        &store,
        AddContactParams {
            project_id: pid,
            name: "No Email",
            role: "",
            department: "",
            email: "",
        },
    )
    .unwrap();

    let invalid = team::add_contact(
        &store,
        AddContactParams {
            project_id: pid,
            name: "Broken",
            role: "",
            department: "",
            email: "not-an-address",
        },
    )
    .unwrap_err();
    assert!(matches!(invalid, HandoverError::ValidationError(_)));

    assert_eq!(team::list_contacts(&store, pid, None).unwrap().len(), 2);
    assert!(team::delete_contact(&store, contact.id).unwrap());
    assert_eq!(team::list_contacts(&store, pid, None).unwrap().len(), 1);
}

#[test]
fn test_attachment_copy_hash_and_delete() {
    let (tmp, store, pid) = setup();
    let source = tmp.path().join("handover plan (v2).txt");
    fs::write(&source, b"hello").unwrap();

    let a = attachment::add_attachment(&store, pid, &source).unwrap();
    assert_eq!(a.original_name, "handover plan (v2).txt");
    assert!(a.stored_name.ends_with("-handover_plan__v2_.txt"));
    assert_eq!(a.size_bytes, 5);
    assert_eq!(
        a.sha256,
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
    let copy = attachment::stored_path(&store, &a);
    assert_eq!(fs::read(&copy).unwrap(), b"hello");

    // A missing stored copy does not block deletion.
    fs::remove_file(&copy).unwrap();
    assert!(attachment::delete_attachment(&store, a.id).unwrap());
    assert!(attachment::list_attachments(&store, pid, None).unwrap().is_empty());

    let missing = attachment::add_attachment(&store, pid, &tmp.path().join("nope.txt")).unwrap_err();
    assert!(matches!(missing, HandoverError::ValidationError(_)));
}

#[test]
fn test_attachment_for_unknown_project_leaves_no_copy() {
    let (tmp, store, _pid) = setup();
    let source = tmp.path().join("notes.md");
    fs::write(&source, "notes").unwrap();

    assert!(attachment::add_attachment(&store, 9999, &source).is_err());
    let leftovers = fs::read_dir(store.uploads_dir()).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[test]
fn test_status_report_rolls_up_records() {
    let (_tmp, store, pid) = setup();
    let today = date(2025, 1, 10);
    session_on(&store, pid, "Architecture", date(2025, 1, 13));
    for (title, priority) in [("Pager noise", IssuePriority::Critical), ("Typos", IssuePriority::Low)] {
        issue::add_issue(
            &store,
            AddIssueParams {
                project_id: pid,
                title,
                description: "",
                priority,
                assignee: "",
            },
        )
        .unwrap();
    }
    let typos = issue::list_issues(&store, pid, IssueFilter::All).unwrap().remove(1);
    issue::update_issue(
        &store,
        typos.id,
        IssueUpdate {
            status: Some(IssueStatus::Resolved),
            ..Default::default()
        },
    )
    .unwrap();

    let report = handover::plugins::report::build_status_report(
        &store,
        pid,
        &handover::plugins::phase::PhaseWeights::default(),
        today,
    )
    .unwrap();
    assert_eq!(report.project.id, pid);
    assert_eq!(report.phases.len(), 3);
    assert_eq!(report.phases[0].checklist.total, 6);
    assert_eq!(report.issues.total, 2);
    assert_eq!(report.issues.resolved, 1);
    assert_eq!(report.issues.open_by_priority[0], (IssuePriority::Critical, 1));
    assert_eq!(report.upcoming_sessions.len(), 1);
    assert_eq!(report.scores.overall, 0);

    let text = handover::plugins::report::render_text(&report);
    assert!(text.contains("Warehouse"));
}
