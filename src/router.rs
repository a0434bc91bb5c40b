//! Computes which channels receive a rendered notification for a domain
//! event.
//!
//! Recipient filtering happens here, before publish: only the task's
//! creator and assignee are ever eligible, the actor never hears about its
//! own action, and subscribers therefore need no client-side filter.

use serde::Serialize;

use crate::events::{DomainEvent, EventKind};
use crate::models::TaskStatus;

/// Channel naming convention shared with subscribers: `{role}:{userId}`.
/// A UI subscribes once per role, not once per task.
pub fn owner_channel(user_id: &str) -> String {
    format!("owner:{user_id}")
}

pub fn assignee_channel(user_id: &str) -> String {
    format!("assignee:{user_id}")
}

/// The payload published on a channel, rendered purely from event fields;
/// no task re-fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: EventKind,
    pub task_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_progress: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_name: Option<String>,
    pub message: String,
}

/// One computed delivery: who, where, what.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub recipient_id: String,
    pub channel: String,
    pub notification: Notification,
}

/// Maps an event to its deliveries. Invitation events face the assignee;
/// response and progress events face the creator.
pub fn route(event: &DomainEvent) -> Vec<Delivery> {
    let mut deliveries = Vec::new();
    match event.kind {
        EventKind::TaskInvited => {
            if let Some(assignee) = &event.involved_parties.assignee {
                push_unless_actor(&mut deliveries, event, assignee, assignee_channel(assignee));
            }
        }
        EventKind::InvitationAccepted
        | EventKind::InvitationRejected
        | EventKind::ProgressUpdated
        | EventKind::TaskCompleted => {
            let creator = event.involved_parties.created_by.clone();
            push_unless_actor(&mut deliveries, event, &creator, owner_channel(&creator));
        }
    }
    deliveries
}

fn push_unless_actor(out: &mut Vec<Delivery>, event: &DomainEvent, recipient: &str, channel: String) {
    // Self-exclusion: the actor never hears about its own action.
    if recipient == event.actor_id {
        return;
    }
    out.push(Delivery {
        recipient_id: recipient.to_string(),
        channel,
        notification: render(event),
    });
}

fn render(event: &DomainEvent) -> Notification {
    let actor = event
        .actor_name
        .clone()
        .unwrap_or_else(|| event.actor_id.clone());
    let message = match event.kind {
        EventKind::TaskInvited => format!("{} invited you to \"{}\"", actor, event.title),
        EventKind::InvitationAccepted => format!("{} accepted \"{}\"", actor, event.title),
        EventKind::InvitationRejected => format!("{} declined \"{}\"", actor, event.title),
        EventKind::ProgressUpdated => format!(
            "\"{}\" is at {}%",
            event.title,
            event.new_progress.unwrap_or(0)
        ),
        EventKind::TaskCompleted => format!("{} completed \"{}\"", actor, event.title),
    };
    Notification {
        kind: event.kind,
        task_id: event.task_id.clone(),
        title: event.title.clone(),
        new_status: event.new_status,
        new_progress: event.new_progress,
        actor_name: event.actor_name.clone(),
        message,
    }
}
