//! Guarded task/invitation transitions.
//!
//! Every status change flows through these functions; no caller writes
//! `status` directly. Each function validates its guards against the records
//! it was given and returns the post-transition records plus the domain
//! event describing the change. Applying the result is the dispatcher's job,
//! through conditional writes keyed on the pre-transition status.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::EngineError;
use crate::events::{DomainEvent, EventKind};
use crate::models::{
    Invitation, InvitationStatus, Task, TaskPriority, TaskStatus, TaskUpdate,
};

/// Inputs for creating a task record.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub required_skills: Vec<String>,
    pub priority: TaskPriority,
    pub deadline: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub complexity_multiplier: Option<f64>,
    pub created_by: String,
    pub assigned_to: Option<String>,
}

/// Result of the create transition: the task plus, when an assignee was
/// supplied, the pending invitation and the TaskInvited event.
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub task: Task,
    pub invitation: Option<Invitation>,
    pub event: Option<DomainEvent>,
}

/// Result of accepting an invitation.
#[derive(Debug, Clone)]
pub struct AcceptOutcome {
    pub task: Task,
    pub invitation: Invitation,
    pub event: DomainEvent,
}

/// Result of rejecting an invitation.
#[derive(Debug, Clone)]
pub struct RejectOutcome {
    pub task: Task,
    pub invitation: Invitation,
    pub event: DomainEvent,
}

/// Result of a progress report.
#[derive(Debug, Clone)]
pub struct ProgressOutcome {
    pub task: Task,
    pub update: TaskUpdate,
    pub event: DomainEvent,
}

fn dedup_skills(skills: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    skills
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
        .collect()
}

/// Creates a task, either `unassigned` or `invited` when an assignee is
/// supplied. Authorization (creator/admin only) is checked by the
/// dispatcher before this runs.
pub fn create(
    input: NewTask,
    actor_name: Option<String>,
    now: DateTime<Utc>,
) -> Result<CreateOutcome, EngineError> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(EngineError::Validation("title must not be empty".to_string()));
    }
    if let Some(hours) = input.estimated_hours {
        if hours < 0.0 {
            return Err(EngineError::Validation("estimatedHours must be >= 0".to_string()));
        }
    }

    let status = if input.assigned_to.is_some() {
        TaskStatus::Invited
    } else {
        TaskStatus::Unassigned
    };

    let task = Task {
        task_id: Uuid::new_v4().to_string(),
        title,
        description: input.description,
        required_skills: dedup_skills(input.required_skills),
        priority: input.priority,
        status,
        progress: 0,
        assigned_to: input.assigned_to.clone(),
        created_by: input.created_by.clone(),
        deadline: input.deadline,
        estimated_hours: input.estimated_hours,
        complexity_multiplier: input.complexity_multiplier.unwrap_or(1.0),
        created_at: now,
        updated_at: now,
        started_at: None,
        completed_at: None,
    };

    let invitation = input.assigned_to.as_ref().map(|assignee| Invitation {
        invitation_id: Uuid::new_v4().to_string(),
        task_id: task.task_id.clone(),
        to_employee: assignee.clone(),
        from_user: input.created_by.clone(),
        status: InvitationStatus::Pending,
        rejection_reason: None,
        sent_at: now,
        responded_at: None,
    });

    // An unassigned creation has no observable lifecycle change for anyone
    // but the actor, and the actor never hears about its own action.
    let event = invitation.as_ref().map(|_| {
        DomainEvent::from_task(EventKind::TaskInvited, &task, &input.created_by, actor_name)
    });

    Ok(CreateOutcome { task, invitation, event })
}

fn guard_response(
    task: &Task,
    invitation: &Invitation,
    caller_id: &str,
) -> Result<(), EngineError> {
    if invitation.to_employee != caller_id {
        return Err(EngineError::Authorization(
            "only the invited employee may respond to this invitation".to_string(),
        ));
    }
    if task.status != TaskStatus::Invited {
        return Err(EngineError::Conflict(format!(
            "task {} is {}, not invited",
            task.task_id,
            task.status.as_str()
        )));
    }
    if invitation.status != InvitationStatus::Pending {
        return Err(EngineError::Conflict(format!(
            "invitation {} was already {}",
            invitation.invitation_id,
            invitation.status.as_str()
        )));
    }
    Ok(())
}

/// Accept: invitation pending -> accepted (terminal), task invited ->
/// ongoing. The workload bump for the assignee is applied by the caller
/// alongside the conditional writes.
pub fn accept(
    task: &Task,
    invitation: &Invitation,
    caller_id: &str,
    actor_name: Option<String>,
    now: DateTime<Utc>,
) -> Result<AcceptOutcome, EngineError> {
    guard_response(task, invitation, caller_id)?;

    let mut accepted_task = task.clone();
    accepted_task.status = TaskStatus::Ongoing;
    accepted_task.started_at = Some(now);
    accepted_task.updated_at = now;

    let mut accepted_invitation = invitation.clone();
    accepted_invitation.status = InvitationStatus::Accepted;
    accepted_invitation.responded_at = Some(now);

    let event =
        DomainEvent::from_task(EventKind::InvitationAccepted, &accepted_task, caller_id, actor_name);

    Ok(AcceptOutcome { task: accepted_task, invitation: accepted_invitation, event })
}

/// Reject: invitation pending -> rejected (terminal); the task returns to
/// `unassigned` with its assignee cleared, eligible for a fresh scoring and
/// invitation cycle. Priority, deadline and the rest are untouched.
pub fn reject(
    task: &Task,
    invitation: &Invitation,
    caller_id: &str,
    reason: Option<String>,
    actor_name: Option<String>,
    now: DateTime<Utc>,
) -> Result<RejectOutcome, EngineError> {
    guard_response(task, invitation, caller_id)?;

    let mut rejected_task = task.clone();
    rejected_task.status = TaskStatus::Unassigned;
    rejected_task.assigned_to = None;
    rejected_task.updated_at = now;

    let mut rejected_invitation = invitation.clone();
    rejected_invitation.status = InvitationStatus::Rejected;
    rejected_invitation.rejection_reason = reason;
    rejected_invitation.responded_at = Some(now);

    let event =
        DomainEvent::from_task(EventKind::InvitationRejected, &rejected_task, caller_id, actor_name);

    Ok(RejectOutcome { task: rejected_task, invitation: rejected_invitation, event })
}

/// Progress report: appends a TaskUpdate and moves the task's progress;
/// reaching 100 completes the task. Only the assignee may report, and only
/// while the task is ongoing, which also rules out reopening a completed
/// task or jumping an unassigned/invited one straight to completed.
pub fn report_progress(
    task: &Task,
    caller_id: &str,
    progress: u32,
    hours_logged: Option<f64>,
    note: Option<String>,
    actor_name: Option<String>,
    now: DateTime<Utc>,
) -> Result<ProgressOutcome, EngineError> {
    if task.assigned_to.as_deref() != Some(caller_id) {
        return Err(EngineError::Authorization(
            "only the assignee may report progress on this task".to_string(),
        ));
    }
    if task.status.is_terminal() {
        return Err(EngineError::Conflict(format!(
            "task {} is completed and cannot be reopened",
            task.task_id
        )));
    }
    if task.status != TaskStatus::Ongoing {
        return Err(EngineError::Conflict(format!(
            "task {} is {}, progress can only be reported while ongoing",
            task.task_id,
            task.status.as_str()
        )));
    }
    if let Some(hours) = hours_logged {
        if hours < 0.0 {
            return Err(EngineError::Validation("hoursLogged must be >= 0".to_string()));
        }
    }

    let progress = progress.min(100);
    let mut updated_task = task.clone();
    updated_task.progress = progress;
    updated_task.updated_at = now;

    let kind = if progress == 100 {
        updated_task.status = TaskStatus::Completed;
        updated_task.completed_at = Some(now);
        EventKind::TaskCompleted
    } else {
        EventKind::ProgressUpdated
    };

    let update = TaskUpdate {
        update_id: Uuid::new_v4().to_string(),
        task_id: task.task_id.clone(),
        author_id: caller_id.to_string(),
        note,
        progress,
        hours_logged,
        created_at: now,
    };

    let event = DomainEvent::from_task(kind, &updated_task, caller_id, actor_name);

    Ok(ProgressOutcome { task: updated_task, update, event })
}
