use handover::core::error::HandoverError;
use handover::core::store::Store;
use handover::init_workspace;
use handover::plugins::newsletter::{
    self, HistoryRecord, get_settings, list_active_subscriber_emails, list_history,
    list_subscribed_project_ids, list_subscriptions, set_enabled, subscribe, unsubscribe,
};
use handover::plugins::project::{AddProjectParams, add_project};
use chrono::NaiveDate;
use tempfile::tempdir;

fn project(store: &Store, name: &str) -> i64 {
    add_project(
        store,
        AddProjectParams {
            name,
            description: "",
            source_team: "",
            target_team: "",
        },
    )
    .unwrap()
    .id
}

#[test]
fn test_subscription_lifecycle() {
    let tmp = tempdir().unwrap();
    let store = init_workspace(tmp.path()).unwrap();
    let alpha = project(&store, "Alpha");
    let beta = project(&store, "Beta");

    let sub = subscribe(&store, alpha, " Lead@Example.com").unwrap();
    assert_eq!(sub.email, "lead@example.com");
    assert!(sub.subscribed);
    subscribe(&store, beta, "lead@example.com").unwrap();
    subscribe(&store, beta, "ops@example.com").unwrap();

    assert_eq!(
        list_active_subscriber_emails(&store).unwrap(),
        vec!["lead@example.com".to_string(), "ops@example.com".to_string()]
    );
    assert_eq!(list_subscribed_project_ids(&store, "lead@example.com").unwrap(), vec![alpha, beta]);

    assert!(unsubscribe(&store, alpha, "lead@example.com").unwrap());
    assert_eq!(list_subscribed_project_ids(&store, "lead@example.com").unwrap(), vec![beta]);
    assert!(!unsubscribe(&store, alpha, "stranger@example.com").unwrap());

    // Re-subscribing flips the existing row back instead of duplicating it.
    let again = subscribe(&store, alpha, "lead@example.com").unwrap();
    assert_eq!(again.id, sub.id);
    assert!(again.subscribed);
    assert_eq!(list_subscriptions(&store, Some(alpha)).unwrap().len(), 1);
    assert_eq!(list_subscriptions(&store, None).unwrap().len(), 3);

    let bad = subscribe(&store, alpha, "not an email").unwrap_err();
    assert!(matches!(bad, HandoverError::ValidationError(_)));
}

#[test]
fn test_fully_unsubscribed_email_is_not_active() {
    let tmp = tempdir().unwrap();
    let store = init_workspace(tmp.path()).unwrap();
    let alpha = project(&store, "Alpha");
    subscribe(&store, alpha, "gone@example.com").unwrap();
    unsubscribe(&store, alpha, "gone@example.com").unwrap();
    assert!(list_active_subscriber_emails(&store).unwrap().is_empty());
}

#[test]
fn test_settings_toggle() {
    let tmp = tempdir().unwrap();
    let store = init_workspace(tmp.path()).unwrap();
    let alpha = project(&store, "Alpha");

    assert!(get_settings(&store, alpha).unwrap().unwrap().enabled);
    let off = set_enabled(&store, alpha, false).unwrap();
    assert!(!off.enabled);
    assert!(!get_settings(&store, alpha).unwrap().unwrap().enabled);
    set_enabled(&store, alpha, true).unwrap();
    assert!(get_settings(&store, alpha).unwrap().unwrap().enabled);
    assert!(get_settings(&store, 4040).unwrap().is_none());
}

#[test]
fn test_history_append_and_list() {
    let tmp = tempdir().unwrap();
    let store = init_workspace(tmp.path()).unwrap();
    let alpha = project(&store, "Alpha");
    let beta = project(&store, "Beta");

    let record = |project_id: i64, subject: &str| HistoryRecord {
        project_id,
        recipient: "lead@example.com".to_string(),
        subject: subject.to_string(),
        week_start: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
        week_end: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
        payload: "{}".to_string(),
        message_id: Some("<m1@brevo>".to_string()),
    };

    assert_eq!(newsletter::append_history(&store, &[]).unwrap(), 0);
    let written = newsletter::append_history(
        &store,
        &[record(alpha, "week 1"), record(beta, "week 1"), record(alpha, "week 2")],
    )
    .unwrap();
    assert_eq!(written, 3);

    let all = list_history(&store, None, 20).unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].subject, "week 2", "newest first");

    let alpha_only = list_history(&store, Some(alpha), 1).unwrap();
    assert_eq!(alpha_only.len(), 1);
    assert_eq!(alpha_only[0].week_start, NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
    assert_eq!(alpha_only[0].message_id.as_deref(), Some("<m1@brevo>"));
}

#[test]
fn test_history_for_unknown_project_fails() {
    let tmp = tempdir().unwrap();
    let store = init_workspace(tmp.path()).unwrap();
    let record = HistoryRecord {
        project_id: 777,
        recipient: "lead@example.com".to_string(),
        subject: "s".to_string(),
        week_start: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
        week_end: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
        payload: "{}".to_string(),
        message_id: None,
    };
    assert!(newsletter::append_history(&store, &[record]).is_err());
}
