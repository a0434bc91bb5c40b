use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task lifecycle status.
///
/// `accepted` and `rejected` belong to the stored vocabulary; the transition
/// functions only ever write `unassigned`, `invited`, `ongoing` and
/// `completed`. A rejection is recorded on the invitation while the task
/// itself returns to `unassigned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Unassigned,
    Invited,
    Accepted,
    Ongoing,
    Completed,
    Rejected,
}

impl TaskStatus {
    /// Canonical storage representation, also used in conditional-update
    /// filters.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Unassigned => "unassigned",
            TaskStatus::Invited => "invited",
            TaskStatus::Accepted => "accepted",
            TaskStatus::Ongoing => "ongoing",
            TaskStatus::Completed => "completed",
            TaskStatus::Rejected => "rejected",
        }
    }

    /// Completed tasks are never reopened.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

/// A work item.
///
/// Invariants maintained by the transition functions: `assigned_to` is set
/// exactly when status is invited, accepted, ongoing or completed, and
/// `progress == 100` implies `completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "_id")]
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub required_skills: Vec<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    /// Percent complete in [0, 100].
    pub progress: u32,
    pub assigned_to: Option<String>,
    pub created_by: String,
    pub deadline: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    #[serde(default = "default_complexity")]
    pub complexity_multiplier: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

fn default_complexity() -> f64 {
    1.0
}
