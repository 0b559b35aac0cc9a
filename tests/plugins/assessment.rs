use handover::core::error::HandoverError;
use handover::init_workspace;
use handover::plugins::assessment::{
    AddCriterionParams, AssessmentScore, add_criterion, delete_criterion, list_scores, set_score,
    summarize,
};
use handover::plugins::phase::{Phase, PhaseWeights};
use handover::plugins::project::{AddProjectParams, add_project};
use handover::plugins::scoring::{self, ReadinessLevel, overall_score, readiness_level};
use std::collections::BTreeMap;
use tempfile::tempdir;

fn row(phase: &str, category: &str, score: Option<u8>) -> AssessmentScore {
    AssessmentScore {
        id: 0,
        project_id: 1,
        phase: phase.to_string(),
        category: category.to_string(),
        category_weight: 50,
        criteria: "criterion".to_string(),
        score,
        evidence: String::new(),
        updated_at: "2025-01-06T09:00:00.000Z".to_string(),
    }
}

#[test]
fn test_readiness_thresholds_are_closed_below() {
    assert_eq!(readiness_level(100), ReadinessLevel::Excellent);
    assert_eq!(readiness_level(90), ReadinessLevel::Excellent);
    assert_eq!(readiness_level(89), ReadinessLevel::Good);
    assert_eq!(readiness_level(80), ReadinessLevel::Good);
    assert_eq!(readiness_level(70), ReadinessLevel::Fair);
    assert_eq!(readiness_level(60), ReadinessLevel::Poor);
    assert_eq!(readiness_level(59), ReadinessLevel::NotReady);
    assert_eq!(readiness_level(0).label(), "Not Ready");
}

#[test]
fn test_unscored_rows_are_ignored() {
    let rows = vec![
        row("Phase 1", "Docs", Some(4)),
        row("Phase 1", "Docs", None),
        row("Phase 1", "Access", Some(2)),
    ];
    // mean(4, 2) = 3 -> 60
    assert_eq!(scoring::phase_score(rows.iter()), 60);
    assert_eq!(scoring::category_score(rows.iter().filter(|r| r.category == "Docs")), 80);
    assert_eq!(scoring::category_score(std::iter::empty()), 0);
}

#[test]
fn test_overall_skips_unscored_phases_and_renormalizes() {
    let phases = vec![
        Phase::new("Phase 1", 50),
        Phase::new("Phase 2", 25),
        Phase::new("Phase 3", 25),
    ];
    let rows = vec![
        row("Phase 1", "Docs", Some(5)),
        row("Phase 1", "Docs", Some(5)),
        row("Phase 2", "Ops", Some(3)),
        row("Phase 3", "Independence", None),
    ];
    // (100 * 50 + 60 * 25) / 75 = 86.67
    assert_eq!(overall_score(&rows, &phases), 87);
    assert_eq!(overall_score(&[], &phases), 0);

    // Rows for a phase the project does not list are not counted.
    let stray = vec![row("Phase 9", "Other", Some(1)), row("Phase 1", "Docs", Some(4))];
    assert_eq!(overall_score(&stray, &phases), 80);
}

#[test]
fn test_zero_weight_phases_contribute_nothing() {
    let phases = vec![Phase::new("Phase 1", 0), Phase::new("Phase 2", 0)];
    let rows = vec![row("Phase 1", "Docs", Some(5))];
    assert_eq!(overall_score(&rows, &phases), 0);
}

#[test]
fn test_summary_over_stored_scores() {
    let tmp = tempdir().unwrap();
    let store = init_workspace(tmp.path()).unwrap();
    let pid = add_project(
        &store,
        AddProjectParams {
            name: "Search",
            description: "",
            source_team: "Discovery",
            target_team: "SRE",
        },
    )
    .unwrap()
    .id;

    let criteria = list_scores(&store, Some(pid)).unwrap();
    for c in criteria.iter().filter(|c| c.phase == "Phase 1") {
        set_score(&store, c.id, Some(5), None).unwrap();
    }
    let first_p2 = criteria.iter().find(|c| c.phase == "Phase 2").unwrap();
    set_score(&store, first_p2.id, Some(3), Some("demo recorded")).unwrap();

    let summary = summarize(&store, pid, &PhaseWeights::default()).unwrap();
    assert_eq!(summary.overall, 87);
    assert_eq!(summary.readiness, ReadinessLevel::Good);
    assert_eq!(summary.phases.len(), 3);
    assert_eq!(summary.phases[0].score, 100);
    assert_eq!(summary.phases[0].categories.len(), 3);
    assert_eq!(summary.phases[0].categories[0].weight, 40);
    assert_eq!(summary.phases[1].scored, 1);
    assert_eq!(summary.phases[2].score, 0);

    // Custom phase weights change the roll-up but not the phase scores.
    let weights = PhaseWeights(BTreeMap::from([
        ("Phase 1".to_string(), 10),
        ("Phase 2".to_string(), 90),
    ]));
    let reweighted = summarize(&store, pid, &weights).unwrap();
    assert_eq!(reweighted.phases[0].score, 100);
    // (100 * 10 + 60 * 90) / 100
    assert_eq!(reweighted.overall, 64);

    // Clearing a score removes it from the mean.
    set_score(&store, first_p2.id, None, None).unwrap();
    let cleared = summarize(&store, pid, &PhaseWeights::default()).unwrap();
    assert_eq!(cleared.overall, 100);
    assert_eq!(cleared.readiness, ReadinessLevel::Excellent);
}

#[test]
fn test_score_and_weight_validation() {
    let tmp = tempdir().unwrap();
    let store = init_workspace(tmp.path()).unwrap();
    let pid = add_project(
        &store,
        AddProjectParams {
            name: "Search",
            description: "",
            source_team: "",
            target_team: "",
        },
    )
    .unwrap()
    .id;

    let added = add_criterion(
        &store,
        AddCriterionParams {
            project_id: pid,
            phase: "Phase 3",
            category: "Independence",
            category_weight: 60,
            criteria: "Handles a P1 incident unaided",
        },
    )
    .unwrap();
    assert_eq!(added.score, None);

    assert!(matches!(
        set_score(&store, added.id, Some(6), None).unwrap_err(),
        HandoverError::ValidationError(_)
    ));
    assert!(matches!(
        set_score(&store, added.id, Some(0), None).unwrap_err(),
        HandoverError::ValidationError(_)
    ));
    let over_weight = add_criterion(
        &store,
        AddCriterionParams {
            project_id: pid,
            phase: "Phase 3",
            category: "Independence",
            category_weight: 101,
            criteria: "x",
        },
    )
    .unwrap_err();
    assert!(matches!(over_weight, HandoverError::ValidationError(_)));

    let scored = set_score(&store, added.id, Some(4), Some("ran game day")).unwrap();
    assert_eq!(scored.score, Some(4));
    assert_eq!(scored.evidence, "ran game day");

    assert!(delete_criterion(&store, added.id).unwrap());
    assert!(matches!(
        set_score(&store, added.id, Some(4), None).unwrap_err(),
        HandoverError::NotFound(_)
    ));
}
