use serde::{Deserialize, Serialize};

use crate::models::{Task, TaskStatus};

/// The kinds of state change this engine announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    TaskInvited,
    InvitationAccepted,
    InvitationRejected,
    ProgressUpdated,
    TaskCompleted,
}

/// The task's creator and assignee: the only parties ever eligible to be
/// notified about the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvolvedParties {
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

/// A small, immutable description of a completed state change.
///
/// Carries the minimal task fields notification rendering needs, so the
/// router never re-fetches the full record. Ephemeral: events ride on the
/// action response and the pub/sub path, they are not persisted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub kind: EventKind,
    pub task_id: String,
    pub actor_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_name: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_progress: Option<u32>,
    pub involved_parties: InvolvedParties,
}

impl DomainEvent {
    /// Builds an event from the post-transition task record.
    ///
    /// `new_progress` is only meaningful for progress-driven kinds and is
    /// omitted elsewhere.
    pub fn from_task(kind: EventKind, task: &Task, actor_id: &str, actor_name: Option<String>) -> Self {
        let new_progress = match kind {
            EventKind::ProgressUpdated | EventKind::TaskCompleted => Some(task.progress),
            _ => None,
        };
        DomainEvent {
            kind,
            task_id: task.task_id.clone(),
            actor_id: actor_id.to_string(),
            actor_name,
            title: task.title.clone(),
            new_status: Some(task.status),
            new_progress,
            involved_parties: InvolvedParties {
                created_by: task.created_by.clone(),
                assignee: task.assigned_to.clone(),
            },
        }
    }
}
