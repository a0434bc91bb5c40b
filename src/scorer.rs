//! Candidate scoring: ranks employees against a task's skill requirements.
//!
//! Pure over its inputs; the workload figures it reads may be stale by the
//! time an invitation lands, which is fine because the accept transition is
//! itself guarded by a conditional write.

use std::collections::HashSet;

use serde::Serialize;

use crate::models::Employee;

/// Workload ceiling used by the capacity term. Overridable per deployment
/// through `Config::max_workload`.
pub const MAX_WORKLOAD: u32 = 10;

/// Default number of ranked candidates returned to callers.
pub const DEFAULT_TOP_K: usize = 3;

const WEIGHT_SKILL: f64 = 0.40;
const WEIGHT_WORKLOAD: f64 = 0.30;
const WEIGHT_PERFORMANCE: f64 = 0.20;
const WEIGHT_AVAILABILITY: f64 = 0.10;

/// One employee's composite match against a task's requirements, with the
/// individual terms kept for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateScore {
    pub employee_id: String,
    pub name: String,
    /// Composite score in [0, 100].
    pub score: f64,
    pub skill_match: f64,
    pub workload_capacity: f64,
    pub performance: f64,
    pub availability: f64,
    pub current_workload: u32,
}

fn normalized(skills: &[String]) -> HashSet<String> {
    skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Scores a single employee against the required skill set.
pub fn score_employee(required: &[String], employee: &Employee, max_workload: u32) -> CandidateScore {
    let required_set = normalized(required);

    // An empty requirement set means there is no constraint to fail.
    let skill_match = if required_set.is_empty() {
        100.0
    } else {
        let candidate_set = normalized(&employee.skills);
        let overlap = required_set.intersection(&candidate_set).count();
        100.0 * overlap as f64 / required_set.len() as f64
    };

    let ceiling = max_workload.max(1);
    let headroom = ceiling.saturating_sub(employee.current_workload);
    let workload_capacity = 100.0 * headroom as f64 / ceiling as f64;

    let performance = 100.0 * employee.performance_score.clamp(0.0, 1.0);

    let availability = if !employee.availability {
        0.0
    } else if employee.current_workload < 3 {
        100.0
    } else if employee.current_workload < 5 {
        70.0
    } else {
        40.0
    };

    let score = (WEIGHT_SKILL * skill_match
        + WEIGHT_WORKLOAD * workload_capacity
        + WEIGHT_PERFORMANCE * performance
        + WEIGHT_AVAILABILITY * availability)
        .clamp(0.0, 100.0);

    CandidateScore {
        employee_id: employee.employee_id.clone(),
        name: employee.name.clone(),
        score,
        skill_match,
        workload_capacity,
        performance,
        availability,
        current_workload: employee.current_workload,
    }
}

/// Ranks the pool descending by composite score.
///
/// Ties break on lower current workload, then on employee id so results are
/// deterministic. Inputs are never mutated; an empty pool yields an empty
/// ranking.
pub fn rank_candidates(
    required: &[String],
    pool: &[Employee],
    top_k: usize,
    max_workload: u32,
) -> Vec<CandidateScore> {
    let mut ranked: Vec<CandidateScore> = pool
        .iter()
        .map(|employee| score_employee(required, employee, max_workload))
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.current_workload.cmp(&b.current_workload))
            .then(a.employee_id.cmp(&b.employee_id))
    });
    ranked.truncate(top_k);
    ranked
}
