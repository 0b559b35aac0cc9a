use handover::core::error::HandoverError;
use handover::core::store::Store;
use handover::init_workspace;
use handover::plugins::checklist::{
    AddItemParams, ChecklistStatus, add_item, delete_item, list_items, phase_progress, set_status,
};
use handover::plugins::project::{AddProjectParams, add_project, require_project};
use tempfile::tempdir;

fn project(store: &Store) -> i64 {
    add_project(
        store,
        AddProjectParams {
            name: "Ledger",
            description: "",
            source_team: "Core Banking",
            target_team: "Run Team",
        },
    )
    .unwrap()
    .id
}

#[test]
fn test_status_changes_and_progress() {
    let tmp = tempdir().unwrap();
    let store = init_workspace(tmp.path()).unwrap();
    let pid = project(&store);

    let phase_one = list_items(&store, pid, Some("Phase 1"), None).unwrap();
    assert_eq!(phase_one.len(), 6);
    assert!(phase_one.iter().all(|i| i.status == ChecklistStatus::NotStarted));

    set_status(&store, phase_one[0].id, ChecklistStatus::Complete, Some("walked through")).unwrap();
    set_status(&store, phase_one[1].id, ChecklistStatus::InProgress, None).unwrap();
    // Any status may follow any other.
    let reopened = set_status(&store, phase_one[0].id, ChecklistStatus::NotStarted, None).unwrap();
    assert_eq!(reopened.notes, "walked through", "notes are kept when not supplied");
    set_status(&store, phase_one[0].id, ChecklistStatus::Complete, None).unwrap();
    set_status(&store, phase_one[2].id, ChecklistStatus::Complete, None).unwrap();

    let items = list_items(&store, pid, None, None).unwrap();
    let progress = phase_progress(&items);
    let p1 = progress["Phase 1"];
    assert_eq!((p1.completed, p1.total, p1.percent), (2, 6, 33));
    assert_eq!(progress["Phase 2"].percent, 0);
    assert_eq!(progress["Phase 3"].total, 5);
}

#[test]
fn test_status_change_touches_project() {
    let tmp = tempdir().unwrap();
    let store = init_workspace(tmp.path()).unwrap();
    let pid = project(&store);
    let before = require_project(&store, pid).unwrap().updated_at;

    std::thread::sleep(std::time::Duration::from_millis(5));
    let item = list_items(&store, pid, None, None).unwrap().remove(0);
    set_status(&store, item.id, ChecklistStatus::InProgress, None).unwrap();

    let after = require_project(&store, pid).unwrap().updated_at;
    assert!(after > before);
}

#[test]
fn test_add_and_delete_custom_item() {
    let tmp = tempdir().unwrap();
    let store = init_workspace(tmp.path()).unwrap();
    let pid = project(&store);

    let item = add_item(
        &store,
        AddItemParams {
            project_id: pid,
            phase: "Phase 2",
            category: "Security",
            requirement: "Secrets rotation demonstrated",
            owner: "sam",
        },
    )
    .unwrap();
    assert_eq!(item.owner, "sam");
    assert_eq!(list_items(&store, pid, Some("Phase 2"), None).unwrap().len(), 7);

    let blank = add_item(
        &store,
        AddItemParams {
            project_id: pid,
            phase: "Phase 2",
            category: "Security",
            requirement: " ",
            owner: "",
        },
    )
    .unwrap_err();
    assert!(matches!(blank, HandoverError::ValidationError(_)));

    assert!(delete_item(&store, item.id).unwrap());
    assert!(!delete_item(&store, item.id).unwrap());
    assert!(matches!(
        set_status(&store, item.id, ChecklistStatus::Complete, None).unwrap_err(),
        HandoverError::NotFound(_)
    ));
}

#[test]
fn test_progress_of_empty_list_is_empty() {
    assert!(phase_progress(&[]).is_empty());
}
