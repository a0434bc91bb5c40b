// src/api.rs

use actix_web::http::StatusCode;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use log::error;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::auth::CallerIdentity;
use crate::dispatcher::{ActionRequest, ActionResponse, TaskAction};
use crate::errors::http_status_for_kind;
use crate::events::DomainEvent;
use crate::models::TaskPriority;
use crate::notify_server::Publish;
use crate::router;

fn caller(req: &HttpRequest) -> Option<CallerIdentity> {
    req.extensions().get::<CallerIdentity>().cloned()
}

/// Routes the response's events and hands them to the pub/sub actor. The
/// router has already filtered recipients; this just fans out.
pub fn publish_events(data: &AppState, events: &[DomainEvent]) {
    let deliveries: Vec<_> = events.iter().flat_map(router::route).collect();
    if !deliveries.is_empty() {
        data.notifier.do_send(Publish { deliveries });
    }
}

fn to_http(response: ActionResponse) -> HttpResponse {
    if response.is_ok() {
        return HttpResponse::Ok().json(response);
    }
    let status = response
        .error_kind()
        .map(http_status_for_kind)
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(response)
}

/// Dispatches on behalf of the verified caller and publishes any events.
pub async fn run_action(data: &AppState, identity: CallerIdentity, action: TaskAction) -> HttpResponse {
    let request = ActionRequest {
        caller_id: identity.user_id,
        caller_role: identity.role,
        action,
    };
    let response = data.dispatcher.dispatch(request).await;
    publish_events(data, response.events());
    to_http(response)
}

// ─── GENERIC DISPATCH ─────────────────────────────────────────────────────────

// POST /actions
// Accepts the raw `{action, payload}` wire shape used by both front-ends.
// Caller identity always comes from the verified token, never the body.
pub async fn dispatch_action(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> impl Responder {
    let identity = match caller(&req) {
        Some(identity) => identity,
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let action: TaskAction = match serde_json::from_value(body.into_inner()) {
        Ok(action) => action,
        Err(err) => {
            error!("Malformed action request: {}", err);
            return HttpResponse::BadRequest().json(serde_json::json!({
                "ok": false,
                "errorKind": "ValidationError",
                "message": format!("malformed action request: {err}"),
            }));
        }
    };
    run_action(&data, identity, action).await
}

// ─── PER-ACTION ROUTES ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskBody {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub required_skills: Vec<String>,
    pub priority: TaskPriority,
    pub deadline: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub complexity_multiplier: Option<f64>,
    pub assigned_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressBody {
    pub progress: i64,
    pub hours_logged: Option<f64>,
    pub note: Option<String>,
}

// POST /tasks
pub async fn create_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<CreateTaskBody>,
) -> impl Responder {
    let identity = match caller(&req) {
        Some(identity) => identity,
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let body = body.into_inner();
    run_action(
        &data,
        identity,
        TaskAction::CreateTask {
            title: body.title,
            description: body.description,
            required_skills: body.required_skills,
            priority: body.priority,
            deadline: body.deadline,
            estimated_hours: body.estimated_hours,
            complexity_multiplier: body.complexity_multiplier,
            assigned_to: body.assigned_to,
        },
    )
    .await
}

// GET /tasks/mine
pub async fn list_my_tasks(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let identity = match caller(&req) {
        Some(identity) => identity,
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    run_action(&data, identity, TaskAction::ListMyTasks {}).await
}

// GET /tasks/{task_id}/status
pub async fn get_task_status(
    req: HttpRequest,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
) -> impl Responder {
    let identity = match caller(&req) {
        Some(identity) => identity,
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    run_action(
        &data,
        identity,
        TaskAction::GetTaskStatus { task_id: task_id.into_inner() },
    )
    .await
}

// POST /tasks/{task_id}/accept
pub async fn accept_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
) -> impl Responder {
    let identity = match caller(&req) {
        Some(identity) => identity,
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    run_action(
        &data,
        identity,
        TaskAction::AcceptTask { task_id: task_id.into_inner() },
    )
    .await
}

// POST /tasks/{task_id}/reject
pub async fn reject_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
    body: web::Json<RejectBody>,
) -> impl Responder {
    let identity = match caller(&req) {
        Some(identity) => identity,
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    run_action(
        &data,
        identity,
        TaskAction::RejectTask {
            task_id: task_id.into_inner(),
            reason: body.into_inner().reason,
        },
    )
    .await
}

// POST /tasks/{task_id}/progress
pub async fn update_task_progress(
    req: HttpRequest,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
    body: web::Json<ProgressBody>,
) -> impl Responder {
    let identity = match caller(&req) {
        Some(identity) => identity,
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let body = body.into_inner();
    run_action(
        &data,
        identity,
        TaskAction::UpdateTaskProgress {
            task_id: task_id.into_inner(),
            progress: body.progress,
            hours_logged: body.hours_logged,
            note: body.note,
        },
    )
    .await
}

// GET /employees
// The candidate pool as the scorer sees it. Elevated roles only.
pub async fn list_employees(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let identity = match caller(&req) {
        Some(identity) => identity,
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    if !identity.role.is_elevated() {
        return HttpResponse::Forbidden().body("Only managers and admins can list employees");
    }
    match data.dispatcher.store().list_employees().await {
        Ok(employees) => HttpResponse::Ok().json(employees),
        Err(err) => {
            error!("Error listing employees: {}", err);
            HttpResponse::BadGateway().body(format!("Error listing employees: {}", err))
        }
    }
}
