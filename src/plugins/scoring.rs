//! Readiness scoring engine.
//!
//! Pure functions over assessment rows. Scores are on a 1-5 scale; a score of
//! `None`, `0` or anything above 5 counts as "not yet scored" and is left out
//! of every average. All results are whole percentages in `0..=100`.
//!
//! Roll-up rules:
//! - a category's score is the unweighted mean of its scored criteria;
//! - a phase's score is the unweighted mean of *all* scored criteria in the
//!   phase, regardless of category (stored category weights are not applied);
//! - the overall score is the phase-weight-weighted mean of phase scores,
//!   counting only phases that have at least one scored criterion.

use crate::plugins::assessment::AssessmentScore;
use crate::plugins::phase::Phase;
use serde::{Deserialize, Serialize};

/// Readiness classification with closed lower bounds (90 is `Excellent`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadinessLevel {
    Excellent,
    Good,
    Fair,
    Poor,
    NotReady,
}

impl ReadinessLevel {
    pub fn label(self) -> &'static str {
        match self {
            ReadinessLevel::Excellent => "Excellent",
            ReadinessLevel::Good => "Good",
            ReadinessLevel::Fair => "Fair",
            ReadinessLevel::Poor => "Poor",
            ReadinessLevel::NotReady => "Not Ready",
        }
    }

    /// Lowest score that still classifies as this level.
    pub fn threshold_low(self) -> u32 {
        match self {
            ReadinessLevel::Excellent => 90,
            ReadinessLevel::Good => 80,
            ReadinessLevel::Fair => 70,
            ReadinessLevel::Poor => 60,
            ReadinessLevel::NotReady => 0,
        }
    }
}

pub fn readiness_level(score: u32) -> ReadinessLevel {
    match score {
        s if s >= 90 => ReadinessLevel::Excellent,
        s if s >= 80 => ReadinessLevel::Good,
        s if s >= 70 => ReadinessLevel::Fair,
        s if s >= 60 => ReadinessLevel::Poor,
        _ => ReadinessLevel::NotReady,
    }
}

fn scored_value(item: &AssessmentScore) -> Option<f64> {
    item.score
        .filter(|s| (1..=5).contains(s))
        .map(f64::from)
}

fn mean_percentage<'a>(items: impl IntoIterator<Item = &'a AssessmentScore>) -> Option<u32> {
    let (sum, count) = items
        .into_iter()
        .filter_map(scored_value)
        .fold((0.0_f64, 0_u32), |(sum, count), s| (sum + s, count + 1));
    if count == 0 {
        return None;
    }
    Some((sum / f64::from(count) / 5.0 * 100.0).round() as u32)
}

/// `round(mean(score) / 5 * 100)` over the scored criteria; 0 when none are scored.
pub fn category_score<'a>(items: impl IntoIterator<Item = &'a AssessmentScore>) -> u32 {
    mean_percentage(items).unwrap_or(0)
}

/// Flattened mean of every scored criterion in the phase; category weights are ignored.
pub fn phase_score<'a>(items: impl IntoIterator<Item = &'a AssessmentScore>) -> u32 {
    mean_percentage(items).unwrap_or(0)
}

/// Weighted mean of phase scores over the phases that have scored criteria.
///
/// Rows whose phase is not in `phases` do not contribute.
pub fn overall_score(all_items: &[AssessmentScore], phases: &[Phase]) -> u32 {
    let mut weighted = 0.0_f64;
    let mut weight_sum = 0.0_f64;
    for phase in phases {
        let in_phase = all_items.iter().filter(|i| i.phase == phase.phase_id);
        let Some(score) = mean_percentage(in_phase) else {
            continue;
        };
        weighted += f64::from(score) * f64::from(phase.weight);
        weight_sum += f64::from(phase.weight);
    }
    if weight_sum == 0.0 {
        return 0;
    }
    (weighted / weight_sum).round() as u32
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: String,
    pub weight: i64,
    pub score: u32,
    pub scored: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseBreakdown {
    pub phase_id: String,
    pub display_name: String,
    pub weight: u32,
    pub score: u32,
    pub scored: usize,
    pub total: usize,
    pub categories: Vec<CategoryBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub overall: u32,
    pub readiness: ReadinessLevel,
    pub phases: Vec<PhaseBreakdown>,
}

/// Full roll-up used by the assessment summary and the status report.
/// Categories keep the order in which they first appear.
pub fn breakdown(all_items: &[AssessmentScore], phases: &[Phase]) -> ScoreBreakdown {
    let phase_rows = phases
        .iter()
        .map(|phase| {
            let in_phase: Vec<&AssessmentScore> = all_items
                .iter()
                .filter(|i| i.phase == phase.phase_id)
                .collect();

            let mut category_names: Vec<&str> = Vec::new();
            for item in &in_phase {
                if !category_names.contains(&item.category.as_str()) {
                    category_names.push(&item.category);
                }
            }
            let categories = category_names
                .into_iter()
                .map(|name| {
                    let rows: Vec<&AssessmentScore> = in_phase
                        .iter()
                        .copied()
                        .filter(|i| i.category == name)
                        .collect();
                    CategoryBreakdown {
                        category: name.to_string(),
                        weight: rows.first().map(|r| r.category_weight).unwrap_or(0),
                        score: category_score(rows.iter().copied()),
                        scored: rows.iter().filter(|r| scored_value(r).is_some()).count(),
                        total: rows.len(),
                    }
                })
                .collect();

            PhaseBreakdown {
                phase_id: phase.phase_id.clone(),
                display_name: phase.display_name.clone(),
                weight: phase.weight,
                score: phase_score(in_phase.iter().copied()),
                scored: in_phase.iter().filter(|r| scored_value(r).is_some()).count(),
                total: in_phase.len(),
                categories,
            }
        })
        .collect();

    let overall = overall_score(all_items, phases);
    ScoreBreakdown {
        overall,
        readiness: readiness_level(overall),
        phases: phase_rows,
    }
}
