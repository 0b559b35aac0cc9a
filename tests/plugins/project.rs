use handover::core::error::HandoverError;
use handover::core::store::Store;
use handover::init_workspace;
use handover::plugins::phase::{self, PhaseWeights};
use handover::plugins::project::{
    AddProjectParams, ProjectUpdate, add_project, delete_project, get_project, list_projects,
    require_project, update_project,
};
use handover::plugins::{assessment, attachment, checklist, newsletter};
use chrono::NaiveDate;
use std::fs;
use tempfile::tempdir;

fn workspace() -> (tempfile::TempDir, Store) {
    let tmp = tempdir().unwrap();
    let store = init_workspace(tmp.path()).unwrap();
    (tmp, store)
}

fn acme(store: &Store) -> handover::plugins::project::Project {
    add_project(
        store,
        AddProjectParams {
            name: "Acme Portal",
            description: "Customer portal",
            source_team: "Platform",
            target_team: "Operations",
        },
    )
    .unwrap()
}

#[test]
fn test_init_workspace_is_idempotent_and_writes_config() {
    let tmp = tempdir().unwrap();
    init_workspace(tmp.path()).unwrap();
    let config_path = tmp.path().join(".handover").join("config.toml");
    assert!(config_path.exists());

    fs::write(&config_path, "[newsletter]\ntimezone = \"UTC\"\n").unwrap();
    init_workspace(tmp.path()).unwrap();
    let kept = fs::read_to_string(&config_path).unwrap();
    assert!(kept.contains("UTC"), "existing config must not be overwritten");
}

#[test]
fn test_add_project_seeds_defaults() {
    let (_tmp, store) = workspace();
    let project = acme(&store);

    assert!(project.handover_id.starts_with("HO_"));
    assert_eq!(project.status, "active");
    assert_eq!(project.current_phase, "Phase 1");

    let phases = phase::list_phases(&store, project.id, &PhaseWeights::default()).unwrap();
    let ids: Vec<&str> = phases.iter().map(|p| p.phase_id.as_str()).collect();
    assert_eq!(ids, vec!["Phase 1", "Phase 2", "Phase 3"]);
    assert_eq!(phases[0].display_name, "Discovery & Planning");

    let items = checklist::list_items(&store, project.id, None, None).unwrap();
    assert_eq!(items.len(), 17);
    let criteria = assessment::list_scores(&store, Some(project.id)).unwrap();
    assert_eq!(criteria.len(), 12);
    assert!(criteria.iter().all(|c| c.score.is_none()));

    let settings = newsletter::get_settings(&store, project.id).unwrap().unwrap();
    assert!(settings.enabled);
}

#[test]
fn test_add_project_rejects_blank_name() {
    let (_tmp, store) = workspace();
    let err = add_project(
        &store,
        AddProjectParams {
            name: "   ",
            description: "",
            source_team: "",
            target_team: "",
        },
    )
    .unwrap_err();
    assert!(matches!(err, HandoverError::ValidationError(_)));
}

#[test]
fn test_update_and_filter_projects() {
    let (_tmp, store) = workspace();
    let first = acme(&store);
    let second = add_project(
        &store,
        AddProjectParams {
            name: "Billing",
            description: "",
            source_team: "Payments",
            target_team: "Finance IT",
        },
    )
    .unwrap();

    let updated = update_project(
        &store,
        second.id,
        ProjectUpdate {
            status: Some("on-hold".to_string()),
            current_phase: Some("Phase 2".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(updated.status, "on-hold");
    assert_eq!(updated.current_phase, "Phase 2");
    assert_eq!(updated.name, "Billing");

    let active = list_projects(&store, Some("active")).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, first.id);
    assert_eq!(list_projects(&store, None).unwrap().len(), 2);

    let missing = update_project(&store, 999, ProjectUpdate::default()).unwrap_err();
    assert!(matches!(missing, HandoverError::NotFound(_)));
}

#[test]
fn test_delete_project_cascades_children_and_uploads() {
    let (tmp, store) = workspace();
    let project = acme(&store);
    newsletter::subscribe(&store, project.id, "lead@example.com").unwrap();
    phase::set_phase_dates(
        &store,
        project.id,
        "Phase 1",
        NaiveDate::from_ymd_opt(2025, 1, 6),
        NaiveDate::from_ymd_opt(2025, 2, 7),
    )
    .unwrap();

    let source = tmp.path().join("runbook.md");
    fs::write(&source, "# Runbook").unwrap();
    let stored = attachment::add_attachment(&store, project.id, &source).unwrap();
    let stored_file = attachment::stored_path(&store, &stored);
    assert!(stored_file.exists());

    assert!(delete_project(&store, project.id).unwrap());
    assert!(get_project(&store, project.id).unwrap().is_none());
    assert!(checklist::list_items(&store, project.id, None, None).unwrap().is_empty());
    assert!(assessment::list_scores(&store, Some(project.id)).unwrap().is_empty());
    assert!(newsletter::list_subscriptions(&store, Some(project.id)).unwrap().is_empty());
    assert!(phase::list_phase_dates(&store, project.id).unwrap().is_empty());
    assert!(!stored_file.exists());
    assert!(source.exists(), "the original file is never touched");

    assert!(!delete_project(&store, project.id).unwrap());
    assert!(matches!(
        require_project(&store, project.id).unwrap_err(),
        HandoverError::NotFound(_)
    ));
}

#[test]
fn test_phase_customization_and_dates() {
    let (_tmp, store) = workspace();
    let project = acme(&store);

    phase::rename_phase(&store, project.id, "Phase 2", Some("Deep Dive"), None).unwrap();
    phase::add_phase(&store, project.id, "Phase 4", "Hypercare", "#ef4444").unwrap();
    let phases = phase::list_phases(&store, project.id, &PhaseWeights::default()).unwrap();
    assert_eq!(phases.len(), 4);
    assert_eq!(phases[1].display_name, "Deep Dive");
    assert_eq!(phases[1].color, "#f59e0b");
    assert_eq!(phases[3].phase_id, "Phase 4");
    assert_eq!(phases[3].weight, 0, "phases without a configured weight weigh nothing");

    assert!(matches!(
        phase::rename_phase(&store, project.id, "Phase 9", Some("x"), None).unwrap_err(),
        HandoverError::NotFound(_)
    ));

    let start = NaiveDate::from_ymd_opt(2025, 3, 3);
    let end = NaiveDate::from_ymd_opt(2025, 3, 28);
    phase::set_phase_dates(&store, project.id, "Phase 2", start, None).unwrap();
    let dates = phase::set_phase_dates(&store, project.id, "Phase 2", None, end).unwrap();
    assert_eq!(dates.start_date, start);
    assert_eq!(dates.end_date, end);

    let backwards = phase::set_phase_dates(&store, project.id, "Phase 3", end, start).unwrap_err();
    assert!(matches!(backwards, HandoverError::ValidationError(_)));
}

#[test]
fn test_broker_audits_every_operation() {
    let (_tmp, store) = workspace();
    let project = acme(&store);
    let _ = update_project(&store, project.id + 100, ProjectUpdate::default());

    let events = handover::core::broker::read_audit_log(&store).unwrap();
    assert!(events.iter().any(|e| e.op == "project.init" && e.status == "success"));
    assert!(events.iter().any(|e| e.op == "project.add" && e.status == "success"));
    let last = events.last().unwrap();
    assert_eq!(last.op, "project.update");
    assert_eq!(last.status, "error");
    assert_eq!(last.actor, "handover");
}
