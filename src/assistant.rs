//! Conversational front-end.
//!
//! Short chat commands are parsed into the same actions the UI dispatches;
//! the reply is a one-line summary of the structured result. Free-form
//! natural-language generation stays with the hosted language model; this
//! layer only parses and summarises.

use std::sync::OnceLock;

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::api;
use crate::app_state::AppState;
use crate::auth::CallerIdentity;
use crate::dispatcher::{ActionRequest, ActionResponse, TaskAction};
use crate::errors::EngineError;
use crate::events::EventKind;

const SUPPORTED_COMMANDS: &str = "Try: \"my tasks\", \"status of task <id>\", \
\"accept task <id>\", \"reject task <id> because <reason>\", \
\"progress <n> on task <id> logged <h>h note <text>\"";

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub text: String,
}

#[derive(Serialize)]
pub struct CommandResponse {
    pub reply: String,
    pub result: ActionResponse,
}

struct Grammar {
    my_tasks: Regex,
    status: Regex,
    accept: Regex,
    reject: Regex,
    progress: Regex,
}

fn grammar() -> &'static Grammar {
    static GRAMMAR: OnceLock<Grammar> = OnceLock::new();
    GRAMMAR.get_or_init(|| Grammar {
        my_tasks: Regex::new(r"(?i)^\s*(?:show\s+|list\s+)?my\s+tasks\s*$")
            .expect("valid pattern"),
        status: Regex::new(r"(?i)^\s*status\s+(?:of\s+)?task\s+(\S+)\s*$")
            .expect("valid pattern"),
        accept: Regex::new(r"(?i)^\s*accept\s+task\s+(\S+)\s*$").expect("valid pattern"),
        reject: Regex::new(r"(?i)^\s*reject\s+task\s+(\S+)(?:\s+because\s+(.+?))?\s*$")
            .expect("valid pattern"),
        progress: Regex::new(
            r"(?i)^\s*(?:set\s+|report\s+|update\s+)?progress\s+(\d{1,3})\s*%?\s+on\s+task\s+(\S+)(?:\s+logged\s+(\d+(?:\.\d+)?)\s*h(?:ours?)?)?(?:\s+note\s+(.+?))?\s*$",
        )
        .expect("valid pattern"),
    })
}

/// Maps a chat command onto an action, or `None` when nothing matches.
pub fn parse_command(text: &str) -> Option<TaskAction> {
    let g = grammar();
    if g.my_tasks.is_match(text) {
        return Some(TaskAction::ListMyTasks {});
    }
    if let Some(caps) = g.status.captures(text) {
        return Some(TaskAction::GetTaskStatus { task_id: caps[1].to_string() });
    }
    if let Some(caps) = g.accept.captures(text) {
        return Some(TaskAction::AcceptTask { task_id: caps[1].to_string() });
    }
    if let Some(caps) = g.reject.captures(text) {
        return Some(TaskAction::RejectTask {
            task_id: caps[1].to_string(),
            reason: caps.get(2).map(|m| m.as_str().to_string()),
        });
    }
    if let Some(caps) = g.progress.captures(text) {
        let progress: i64 = caps[1].parse().unwrap_or(-1);
        return Some(TaskAction::UpdateTaskProgress {
            task_id: caps[2].to_string(),
            progress,
            hours_logged: caps.get(3).and_then(|m| m.as_str().parse().ok()),
            note: caps.get(4).map(|m| m.as_str().to_string()),
        });
    }
    None
}

fn summarize(response: &ActionResponse) -> String {
    if let Some(event) = response.events().first() {
        return match event.kind {
            EventKind::TaskInvited => format!("Invitation sent for \"{}\".", event.title),
            EventKind::InvitationAccepted => format!("You're on \"{}\" now.", event.title),
            EventKind::InvitationRejected => {
                format!("Declined \"{}\"; it's back in the pool.", event.title)
            }
            EventKind::ProgressUpdated => format!(
                "\"{}\" updated to {}%.",
                event.title,
                event.new_progress.unwrap_or(0)
            ),
            EventKind::TaskCompleted => format!("\"{}\" is done. Nice work.", event.title),
        };
    }
    match response.data() {
        Some(data) => {
            if let Some(tasks) = data.get("tasks").and_then(|t| t.as_array()) {
                format!("You have {} task(s).", tasks.len())
            } else if let Some(status) = data
                .get("task")
                .and_then(|t| t.get("status"))
                .and_then(|s| s.as_str())
            {
                let progress = data
                    .get("task")
                    .and_then(|t| t.get("progress"))
                    .and_then(|p| p.as_u64())
                    .unwrap_or(0);
                format!("That task is {status}, at {progress}%.")
            } else {
                "Done.".to_string()
            }
        }
        None => match response {
            ActionResponse::Failure { message, .. } => format!("That didn't work: {message}"),
            ActionResponse::Success { .. } => "Done.".to_string(),
        },
    }
}

// POST /assistant/command
pub async fn command(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<CommandRequest>,
) -> impl Responder {
    let identity = match req.extensions().get::<CallerIdentity>().cloned() {
        Some(identity) => identity,
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };

    match parse_command(&body.text) {
        Some(action) => {
            let request = ActionRequest {
                caller_id: identity.user_id,
                caller_role: identity.role,
                action,
            };
            let response = data.dispatcher.dispatch(request).await;
            api::publish_events(&data, response.events());
            let reply = summarize(&response);
            HttpResponse::Ok().json(CommandResponse { reply, result: response })
        }
        None => {
            let err = EngineError::Validation("unrecognized command".to_string());
            HttpResponse::Ok().json(CommandResponse {
                reply: format!("I didn't catch that. {SUPPORTED_COMMANDS}"),
                result: ActionResponse::failure(&err),
            })
        }
    }
}
