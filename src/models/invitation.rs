use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Invitation outcome. Transitions pending → accepted or pending → rejected
/// exactly once; an invitation is never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl InvitationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Rejected => "rejected",
        }
    }
}

/// An invitation asking an employee to take a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    #[serde(rename = "_id")]
    pub invitation_id: String,
    pub task_id: String,
    pub to_employee: String,
    pub from_user: String,
    pub status: InvitationStatus,
    pub rejection_reason: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}
