//! Single action-dispatch entry point.
//!
//! Both the HTTP API and the conversational front-end funnel through
//! [`Dispatcher::dispatch`]: one closed action enum, one authorization
//! table, one place where transitions are applied through conditional
//! writes. Every mutating action either fully applies and emits exactly one
//! domain event, or fails with no partial effect.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::EngineError;
use crate::events::DomainEvent;
use crate::models::{Employee, InvitationStatus, Role, TaskPriority, TaskStatus};
use crate::scorer;
use crate::state_machine::{self, NewTask};
use crate::store::TaskStore;

/// The closed set of operations this engine understands. Adding a seventh
/// action is a compile-time change: the dispatch match below is exhaustive.
#[derive(Debug, Clone, Deserialize)]
#[serde(
    tag = "action",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum TaskAction {
    CreateTask {
        title: String,
        description: String,
        required_skills: Vec<String>,
        priority: TaskPriority,
        deadline: Option<DateTime<Utc>>,
        estimated_hours: Option<f64>,
        complexity_multiplier: Option<f64>,
        assigned_to: Option<String>,
    },
    ListMyTasks {},
    GetTaskStatus {
        task_id: String,
    },
    AcceptTask {
        task_id: String,
    },
    RejectTask {
        task_id: String,
        reason: Option<String>,
    },
    UpdateTaskProgress {
        task_id: String,
        progress: i64,
        hours_logged: Option<f64>,
        note: Option<String>,
    },
}

impl TaskAction {
    pub fn name(&self) -> &'static str {
        match self {
            TaskAction::CreateTask { .. } => "createTask",
            TaskAction::ListMyTasks {} => "listMyTasks",
            TaskAction::GetTaskStatus { .. } => "getTaskStatus",
            TaskAction::AcceptTask { .. } => "acceptTask",
            TaskAction::RejectTask { .. } => "rejectTask",
            TaskAction::UpdateTaskProgress { .. } => "updateTaskProgress",
        }
    }
}

/// One action request: who is calling, as what, to do what. The caller
/// fields are filled from the verified token by the transport layers, never
/// parsed out of a request body.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub caller_id: String,
    pub caller_role: Role,
    pub action: TaskAction,
}

/// Wire response: `{ok:true, data, events}` or `{ok:false, errorKind, message}`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ActionResponse {
    Success {
        ok: bool,
        data: Value,
        events: Vec<DomainEvent>,
    },
    Failure {
        ok: bool,
        #[serde(rename = "errorKind")]
        error_kind: &'static str,
        message: String,
    },
}

impl ActionResponse {
    fn success(data: Value, events: Vec<DomainEvent>) -> Self {
        ActionResponse::Success { ok: true, data, events }
    }

    pub fn failure(err: &EngineError) -> Self {
        ActionResponse::Failure {
            ok: false,
            error_kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ActionResponse::Success { .. })
    }

    pub fn events(&self) -> &[DomainEvent] {
        match self {
            ActionResponse::Success { events, .. } => events,
            ActionResponse::Failure { .. } => &[],
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            ActionResponse::Success { data, .. } => Some(data),
            ActionResponse::Failure { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<&'static str> {
        match self {
            ActionResponse::Success { .. } => None,
            ActionResponse::Failure { error_kind, .. } => Some(error_kind),
        }
    }
}

struct CachedCaller {
    profile: Option<Employee>,
    cached_at: Instant,
}

/// Resolved caller profiles keyed by `(role, callerId)`, bounded and TTL'd.
/// Owned by the dispatcher; never a process-global.
struct CallerCache {
    capacity: usize,
    ttl: Duration,
    entries: HashMap<(Role, String), CachedCaller>,
}

impl CallerCache {
    fn new(capacity: usize, ttl: Duration) -> Self {
        CallerCache { capacity, ttl, entries: HashMap::new() }
    }

    fn get(&mut self, role: Role, caller_id: &str) -> Option<Option<Employee>> {
        let key = (role, caller_id.to_string());
        match self.entries.get(&key) {
            Some(entry) if entry.cached_at.elapsed() <= self.ttl => Some(entry.profile.clone()),
            Some(_) => {
                self.entries.remove(&key);
                None
            }
            None => None,
        }
    }

    fn insert(&mut self, role: Role, caller_id: &str, profile: Option<Employee>) {
        let key = (role, caller_id.to_string());
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.entries.retain(|_, entry| entry.cached_at.elapsed() <= self.ttl);
            if self.entries.len() >= self.capacity {
                // Still full after expiry sweep: drop the oldest entry.
                let oldest = self
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.cached_at)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    self.entries.remove(&oldest);
                }
            }
        }
        self.entries.insert(key, CachedCaller { profile, cached_at: Instant::now() });
    }
}

pub struct Dispatcher {
    store: Arc<dyn TaskStore>,
    cache: Mutex<CallerCache>,
    max_workload: u32,
    suggestion_count: usize,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn TaskStore>,
        max_workload: u32,
        suggestion_count: usize,
        cache_capacity: usize,
        cache_ttl: Duration,
    ) -> Self {
        Dispatcher {
            store,
            cache: Mutex::new(CallerCache::new(cache_capacity, cache_ttl)),
            max_workload,
            suggestion_count,
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// The single entry point. Never panics or propagates: every outcome is
    /// a structured [`ActionResponse`].
    pub async fn dispatch(&self, request: ActionRequest) -> ActionResponse {
        let action_name = request.action.name();
        let caller_id = request.caller_id.clone();
        debug!(
            "dispatch {} from {} ({})",
            action_name,
            caller_id,
            request.caller_role.as_str()
        );
        match self.handle(request).await {
            Ok((data, events)) => ActionResponse::success(data, events),
            Err(err) => {
                warn!("{} by {} failed: {}", action_name, caller_id, err);
                ActionResponse::failure(&err)
            }
        }
    }

    async fn handle(
        &self,
        request: ActionRequest,
    ) -> Result<(Value, Vec<DomainEvent>), EngineError> {
        let ActionRequest { caller_id, caller_role, action } = request;
        match action {
            TaskAction::CreateTask {
                title,
                description,
                required_skills,
                priority,
                deadline,
                estimated_hours,
                complexity_multiplier,
                assigned_to,
            } => {
                self.create_task(
                    caller_id,
                    caller_role,
                    NewTask {
                        title,
                        description,
                        required_skills,
                        priority,
                        deadline,
                        estimated_hours,
                        complexity_multiplier,
                        created_by: String::new(),
                        assigned_to,
                    },
                )
                .await
            }
            TaskAction::ListMyTasks {} => self.list_my_tasks(caller_id).await,
            TaskAction::GetTaskStatus { task_id } => {
                self.get_task_status(caller_id, caller_role, task_id).await
            }
            TaskAction::AcceptTask { task_id } => {
                self.accept_task(caller_id, caller_role, task_id).await
            }
            TaskAction::RejectTask { task_id, reason } => {
                self.reject_task(caller_id, caller_role, task_id, reason).await
            }
            TaskAction::UpdateTaskProgress { task_id, progress, hours_logged, note } => {
                self.update_task_progress(caller_id, caller_role, task_id, progress, hours_logged, note)
                    .await
            }
        }
    }

    /// Resolves the caller's employee profile through the bounded cache.
    /// Used for display names on events; workload reads always go to the
    /// store fresh.
    async fn caller_profile(
        &self,
        role: Role,
        caller_id: &str,
    ) -> Result<Option<Employee>, EngineError> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(role, caller_id) {
                return Ok(hit);
            }
        }
        let profile = self.store.get_employee(caller_id).await?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(role, caller_id, profile.clone());
        }
        Ok(profile)
    }

    async fn actor_name(&self, role: Role, caller_id: &str) -> Result<Option<String>, EngineError> {
        Ok(self.caller_profile(role, caller_id).await?.map(|e| e.name))
    }

    async fn create_task(
        &self,
        caller_id: String,
        caller_role: Role,
        mut input: NewTask,
    ) -> Result<(Value, Vec<DomainEvent>), EngineError> {
        if !caller_role.is_elevated() {
            return Err(EngineError::Authorization(
                "only managers and admins can create tasks".to_string(),
            ));
        }
        if let Some(assignee) = &input.assigned_to {
            if self.store.get_employee(assignee).await?.is_none() {
                return Err(EngineError::NotFound(format!("unknown assignee {assignee}")));
            }
        }
        input.created_by = caller_id.clone();

        let actor_name = self.actor_name(caller_role, &caller_id).await?;
        let outcome = state_machine::create(input, actor_name, Utc::now())?;

        self.store.create_task(&outcome.task).await?;
        if let Some(invitation) = &outcome.invitation {
            if let Err(err) = self.store.create_invitation(invitation).await {
                // Roll the half-created task back so the action has no
                // partial effect.
                if let Err(cleanup) = self.store.delete_task(&outcome.task.task_id).await {
                    error!(
                        "rollback of task {} failed: {}",
                        outcome.task.task_id, cleanup
                    );
                }
                return Err(err.into());
            }
        }

        info!(
            "task {} created by {} ({})",
            outcome.task.task_id,
            caller_id,
            outcome.task.status.as_str()
        );

        let mut data = json!({ "task": outcome.task });
        match &outcome.invitation {
            Some(invitation) => {
                data["invitation"] = json!(invitation);
            }
            None => {
                // Unassigned creation: hand back a ranked shortlist so the
                // caller can pick whom to invite next.
                let pool = self.store.list_employees().await?;
                let ranked = scorer::rank_candidates(
                    &outcome.task.required_skills,
                    &pool,
                    self.suggestion_count,
                    self.max_workload,
                );
                data["suggestedCandidates"] = json!(ranked);
            }
        }

        Ok((data, outcome.event.into_iter().collect()))
    }

    async fn list_my_tasks(&self, caller_id: String) -> Result<(Value, Vec<DomainEvent>), EngineError> {
        let tasks = self.store.list_tasks_by_assignee(&caller_id).await?;
        Ok((json!({ "tasks": tasks }), vec![]))
    }

    async fn get_task_status(
        &self,
        caller_id: String,
        caller_role: Role,
        task_id: String,
    ) -> Result<(Value, Vec<DomainEvent>), EngineError> {
        let task = self
            .store
            .get_task(&task_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("task {task_id} not found")))?;

        let involved = task.created_by == caller_id
            || task.assigned_to.as_deref() == Some(caller_id.as_str());
        if !involved && !caller_role.is_elevated() {
            return Err(EngineError::Authorization(
                "only the creator, the assignee or an elevated role may view this task".to_string(),
            ));
        }

        let invitation = self.store.get_invitation_for_task(&task_id).await?;
        Ok((json!({ "task": task, "invitation": invitation }), vec![]))
    }

    async fn accept_task(
        &self,
        caller_id: String,
        caller_role: Role,
        task_id: String,
    ) -> Result<(Value, Vec<DomainEvent>), EngineError> {
        let task = self
            .store
            .get_task(&task_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("task {task_id} not found")))?;
        let invitation = self
            .store
            .get_invitation_for_task(&task_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("no invitation for task {task_id}")))?;

        let actor_name = self.actor_name(caller_role, &caller_id).await?;
        let outcome =
            state_machine::accept(&task, &invitation, &caller_id, actor_name, Utc::now())?;

        // The task-status swap decides the race; the loser conflicts here.
        let stored = self
            .store
            .conditional_update_task(&task_id, TaskStatus::Invited, &outcome.task)
            .await?;
        if let Err(err) = self
            .store
            .conditional_update_invitation(
                &invitation.invitation_id,
                InvitationStatus::Pending,
                &outcome.invitation,
            )
            .await
        {
            // Put the task back so the failed action leaves no partial effect.
            if let Err(revert) = self
                .store
                .conditional_update_task(&task_id, TaskStatus::Ongoing, &task)
                .await
            {
                error!("revert of task {} after invitation failure failed: {}", task_id, revert);
            }
            return Err(err.into());
        }

        if let Err(err) = self.store.adjust_workload(&caller_id, 1).await {
            warn!("workload bump for {} failed: {}", caller_id, err);
        }

        info!("task {} accepted by {}", task_id, caller_id);
        Ok((
            json!({ "task": stored, "invitation": outcome.invitation }),
            vec![outcome.event],
        ))
    }

    async fn reject_task(
        &self,
        caller_id: String,
        caller_role: Role,
        task_id: String,
        reason: Option<String>,
    ) -> Result<(Value, Vec<DomainEvent>), EngineError> {
        let task = self
            .store
            .get_task(&task_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("task {task_id} not found")))?;
        let invitation = self
            .store
            .get_invitation_for_task(&task_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("no invitation for task {task_id}")))?;

        let actor_name = self.actor_name(caller_role, &caller_id).await?;
        let outcome =
            state_machine::reject(&task, &invitation, &caller_id, reason, actor_name, Utc::now())?;

        let stored = self
            .store
            .conditional_update_task(&task_id, TaskStatus::Invited, &outcome.task)
            .await?;
        if let Err(err) = self
            .store
            .conditional_update_invitation(
                &invitation.invitation_id,
                InvitationStatus::Pending,
                &outcome.invitation,
            )
            .await
        {
            if let Err(revert) = self
                .store
                .conditional_update_task(&task_id, TaskStatus::Unassigned, &task)
                .await
            {
                error!("revert of task {} after invitation failure failed: {}", task_id, revert);
            }
            return Err(err.into());
        }

        info!("task {} rejected by {}", task_id, caller_id);
        Ok((
            json!({ "task": stored, "invitation": outcome.invitation }),
            vec![outcome.event],
        ))
    }

    async fn update_task_progress(
        &self,
        caller_id: String,
        caller_role: Role,
        task_id: String,
        progress: i64,
        hours_logged: Option<f64>,
        note: Option<String>,
    ) -> Result<(Value, Vec<DomainEvent>), EngineError> {
        if !(0..=100).contains(&progress) {
            return Err(EngineError::Validation(format!(
                "progress {progress} out of [0,100]"
            )));
        }
        let task = self
            .store
            .get_task(&task_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("task {task_id} not found")))?;

        let actor_name = self.actor_name(caller_role, &caller_id).await?;
        let outcome = state_machine::report_progress(
            &task,
            &caller_id,
            progress as u32,
            hours_logged,
            note,
            actor_name,
            Utc::now(),
        )?;

        let stored = self
            .store
            .conditional_update_task(&task_id, TaskStatus::Ongoing, &outcome.task)
            .await?;
        if let Err(err) = self.store.append_task_update(&outcome.update).await {
            if let Err(revert) = self
                .store
                .conditional_update_task(&task_id, outcome.task.status, &task)
                .await
            {
                error!("revert of task {} after journal failure failed: {}", task_id, revert);
            }
            return Err(err.into());
        }

        if outcome.task.status == TaskStatus::Completed {
            // The assignment is no longer active.
            if let Err(err) = self.store.adjust_workload(&caller_id, -1).await {
                warn!("workload release for {} failed: {}", caller_id, err);
            }
            info!("task {} completed by {}", task_id, caller_id);
        }

        Ok((
            json!({ "task": stored, "update": outcome.update }),
            vec![outcome.event],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Employee;
    use crate::store::memory::MemoryStore;

    fn employee(id: &str, name: &str, skills: &[&str], workload: u32) -> Employee {
        Employee {
            employee_id: id.to_string(),
            name: name.to_string(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            department: "Engineering".to_string(),
            designation: "Developer".to_string(),
            current_workload: workload,
            performance_score: 0.8,
            availability: true,
            hourly_rate: 60.0,
        }
    }

    fn fixture() -> (Arc<Dispatcher>, Arc<MemoryStore>) {
        fixture_with_ttl(Duration::from_secs(300))
    }

    fn fixture_with_ttl(ttl: Duration) -> (Arc<Dispatcher>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.seed_employee(employee("emp-1", "Priya", &["React", "PostgreSQL"], 2));
        store.seed_employee(employee("emp-2", "Jonas", &["React"], 0));
        let dispatcher = Arc::new(Dispatcher::new(store.clone(), 10, 3, 256, ttl));
        (dispatcher, store)
    }

    fn create_request(assigned_to: Option<&str>) -> ActionRequest {
        ActionRequest {
            caller_id: "manager-1".to_string(),
            caller_role: Role::Manager,
            action: TaskAction::CreateTask {
                title: "Fix login flow".to_string(),
                description: "Session cookie dropped on refresh".to_string(),
                required_skills: vec!["React".to_string(), "PostgreSQL".to_string()],
                priority: TaskPriority::High,
                deadline: None,
                estimated_hours: Some(8.0),
                complexity_multiplier: None,
                assigned_to: assigned_to.map(|s| s.to_string()),
            },
        }
    }

    fn employee_request(caller: &str, action: TaskAction) -> ActionRequest {
        ActionRequest {
            caller_id: caller.to_string(),
            caller_role: Role::Employee,
            action,
        }
    }

    async fn invited_task_id(dispatcher: &Dispatcher) -> String {
        let response = dispatcher.dispatch(create_request(Some("emp-1"))).await;
        assert!(response.is_ok(), "create failed: {response:?}");
        response.data().expect("data")["task"]["_id"]
            .as_str()
            .expect("task id")
            .to_string()
    }

    #[tokio::test]
    async fn create_requires_elevated_role() {
        let (dispatcher, _) = fixture();
        let mut request = create_request(None);
        request.caller_role = Role::Employee;
        let response = dispatcher.dispatch(request).await;
        assert_eq!(response.error_kind(), Some("AuthorizationError"));
    }

    #[tokio::test]
    async fn create_with_unknown_assignee_fails() {
        let (dispatcher, _) = fixture();
        let response = dispatcher.dispatch(create_request(Some("ghost"))).await;
        assert_eq!(response.error_kind(), Some("NotFoundError"));
    }

    #[tokio::test]
    async fn create_with_assignee_invites_and_emits_one_event() {
        let (dispatcher, store) = fixture();
        let response = dispatcher.dispatch(create_request(Some("emp-1"))).await;
        assert!(response.is_ok());
        assert_eq!(response.events().len(), 1);
        assert_eq!(response.events()[0].kind, crate::events::EventKind::TaskInvited);

        let task_id = response.data().expect("data")["task"]["_id"]
            .as_str()
            .expect("id")
            .to_string();
        let task = store.get_task(&task_id).await.expect("get").expect("task");
        assert_eq!(task.status, TaskStatus::Invited);
        assert_eq!(task.assigned_to.as_deref(), Some("emp-1"));
        let invitation = store
            .get_invitation_for_task(&task_id)
            .await
            .expect("get")
            .expect("invitation");
        assert_eq!(invitation.status, InvitationStatus::Pending);
    }

    #[tokio::test]
    async fn create_unassigned_returns_ranked_suggestions() {
        let (dispatcher, _) = fixture();
        let response = dispatcher.dispatch(create_request(None)).await;
        assert!(response.is_ok());
        assert!(response.events().is_empty());
        let suggestions = response.data().expect("data")["suggestedCandidates"]
            .as_array()
            .expect("suggestions")
            .clone();
        assert_eq!(suggestions.len(), 2);
        // emp-1 matches both required skills, emp-2 only one.
        assert_eq!(suggestions[0]["employeeId"], "emp-1");
    }

    #[tokio::test]
    async fn accept_moves_task_to_ongoing_and_bumps_workload() {
        let (dispatcher, store) = fixture();
        let task_id = invited_task_id(&dispatcher).await;

        let response = dispatcher
            .dispatch(employee_request("emp-1", TaskAction::AcceptTask { task_id: task_id.clone() }))
            .await;
        assert!(response.is_ok(), "{response:?}");
        assert_eq!(response.events().len(), 1);
        assert_eq!(
            response.events()[0].kind,
            crate::events::EventKind::InvitationAccepted
        );
        assert_eq!(response.events()[0].actor_name.as_deref(), Some("Priya"));

        let task = store.get_task(&task_id).await.expect("get").expect("task");
        assert_eq!(task.status, TaskStatus::Ongoing);
        assert!(task.started_at.is_some());
        let priya = store.get_employee("emp-1").await.expect("get").expect("emp");
        assert_eq!(priya.current_workload, 3);
    }

    #[tokio::test]
    async fn accept_by_wrong_employee_is_denied() {
        let (dispatcher, _) = fixture();
        let task_id = invited_task_id(&dispatcher).await;
        let response = dispatcher
            .dispatch(employee_request("emp-2", TaskAction::AcceptTask { task_id }))
            .await;
        assert_eq!(response.error_kind(), Some("AuthorizationError"));
    }

    #[tokio::test]
    async fn second_accept_observes_conflict() {
        let (dispatcher, _) = fixture();
        let task_id = invited_task_id(&dispatcher).await;
        let first = dispatcher
            .dispatch(employee_request("emp-1", TaskAction::AcceptTask { task_id: task_id.clone() }))
            .await;
        assert!(first.is_ok());
        let second = dispatcher
            .dispatch(employee_request("emp-1", TaskAction::AcceptTask { task_id }))
            .await;
        assert_eq!(second.error_kind(), Some("ConflictError"));
    }

    #[tokio::test]
    async fn concurrent_accepts_have_exactly_one_winner() {
        let (dispatcher, store) = fixture();
        let task_id = invited_task_id(&dispatcher).await;

        let a = dispatcher.dispatch(employee_request(
            "emp-1",
            TaskAction::AcceptTask { task_id: task_id.clone() },
        ));
        let b = dispatcher.dispatch(employee_request(
            "emp-1",
            TaskAction::AcceptTask { task_id: task_id.clone() },
        ));
        let (ra, rb) = tokio::join!(a, b);

        let winners = [&ra, &rb].iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one accept must win: {ra:?} / {rb:?}");
        let loser = if ra.is_ok() { &rb } else { &ra };
        assert_eq!(loser.error_kind(), Some("ConflictError"));

        let task = store.get_task(&task_id).await.expect("get").expect("task");
        assert_eq!(task.status, TaskStatus::Ongoing);
        assert_eq!(task.assigned_to.as_deref(), Some("emp-1"));
    }

    #[tokio::test]
    async fn reject_clears_assignee_and_records_reason() {
        let (dispatcher, store) = fixture();
        let task_id = invited_task_id(&dispatcher).await;

        let response = dispatcher
            .dispatch(employee_request(
                "emp-1",
                TaskAction::RejectTask {
                    task_id: task_id.clone(),
                    reason: Some("too busy".to_string()),
                },
            ))
            .await;
        assert!(response.is_ok(), "{response:?}");

        let task = store.get_task(&task_id).await.expect("get").expect("task");
        assert_eq!(task.status, TaskStatus::Unassigned);
        assert!(task.assigned_to.is_none());
        assert_eq!(task.priority, TaskPriority::High);
        let invitation = store
            .get_invitation_for_task(&task_id)
            .await
            .expect("get")
            .expect("invitation");
        assert_eq!(invitation.status, InvitationStatus::Rejected);
        assert_eq!(invitation.rejection_reason.as_deref(), Some("too busy"));
        // Workload untouched: the task was never accepted.
        let priya = store.get_employee("emp-1").await.expect("get").expect("emp");
        assert_eq!(priya.current_workload, 2);
    }

    async fn ongoing_task_id(dispatcher: &Dispatcher) -> String {
        let task_id = invited_task_id(dispatcher).await;
        let response = dispatcher
            .dispatch(employee_request("emp-1", TaskAction::AcceptTask { task_id: task_id.clone() }))
            .await;
        assert!(response.is_ok());
        task_id
    }

    #[tokio::test]
    async fn progress_to_hundred_completes_and_journals() {
        let (dispatcher, store) = fixture();
        let task_id = ongoing_task_id(&dispatcher).await;

        let partial = dispatcher
            .dispatch(employee_request(
                "emp-1",
                TaskAction::UpdateTaskProgress {
                    task_id: task_id.clone(),
                    progress: 60,
                    hours_logged: None,
                    note: Some("halfway".to_string()),
                },
            ))
            .await;
        assert!(partial.is_ok());
        assert_eq!(
            partial.events()[0].kind,
            crate::events::EventKind::ProgressUpdated
        );

        let done = dispatcher
            .dispatch(employee_request(
                "emp-1",
                TaskAction::UpdateTaskProgress {
                    task_id: task_id.clone(),
                    progress: 100,
                    hours_logged: Some(2.0),
                    note: None,
                },
            ))
            .await;
        assert!(done.is_ok());
        assert_eq!(done.events().len(), 1);
        assert_eq!(done.events()[0].kind, crate::events::EventKind::TaskCompleted);

        let task = store.get_task(&task_id).await.expect("get").expect("task");
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);
        assert!(task.completed_at.is_some());

        let updates = store.updates_for_task(&task_id);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].hours_logged, Some(2.0));

        // Completion releases the workload the accept took.
        let priya = store.get_employee("emp-1").await.expect("get").expect("emp");
        assert_eq!(priya.current_workload, 2);
    }

    #[tokio::test]
    async fn progress_out_of_range_is_rejected_without_effect() {
        let (dispatcher, store) = fixture();
        let task_id = ongoing_task_id(&dispatcher).await;
        let response = dispatcher
            .dispatch(employee_request(
                "emp-1",
                TaskAction::UpdateTaskProgress {
                    task_id: task_id.clone(),
                    progress: 101,
                    hours_logged: None,
                    note: None,
                },
            ))
            .await;
        assert_eq!(response.error_kind(), Some("ValidationError"));
        assert!(store.updates_for_task(&task_id).is_empty());
    }

    #[tokio::test]
    async fn list_my_tasks_is_most_recent_first() {
        let (dispatcher, _) = fixture();
        let first = invited_task_id(&dispatcher).await;
        let second = invited_task_id(&dispatcher).await;

        let response = dispatcher
            .dispatch(employee_request("emp-1", TaskAction::ListMyTasks {}))
            .await;
        assert!(response.is_ok());
        let tasks = response.data().expect("data")["tasks"]
            .as_array()
            .expect("tasks")
            .clone();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0]["_id"], second.as_str());
        assert_eq!(tasks[1]["_id"], first.as_str());
    }

    #[tokio::test]
    async fn list_my_tasks_with_nothing_assigned_is_empty_not_error() {
        let (dispatcher, _) = fixture();
        let response = dispatcher
            .dispatch(employee_request("emp-2", TaskAction::ListMyTasks {}))
            .await;
        assert!(response.is_ok());
        assert!(response.data().expect("data")["tasks"]
            .as_array()
            .expect("tasks")
            .is_empty());
    }

    #[tokio::test]
    async fn task_status_is_restricted_to_involved_parties() {
        let (dispatcher, _) = fixture();
        let task_id = invited_task_id(&dispatcher).await;

        let stranger = dispatcher
            .dispatch(employee_request(
                "emp-2",
                TaskAction::GetTaskStatus { task_id: task_id.clone() },
            ))
            .await;
        assert_eq!(stranger.error_kind(), Some("AuthorizationError"));

        let assignee = dispatcher
            .dispatch(employee_request(
                "emp-1",
                TaskAction::GetTaskStatus { task_id: task_id.clone() },
            ))
            .await;
        assert!(assignee.is_ok());

        let admin = dispatcher
            .dispatch(ActionRequest {
                caller_id: "root".to_string(),
                caller_role: Role::Admin,
                action: TaskAction::GetTaskStatus { task_id: task_id.clone() },
            })
            .await;
        assert!(admin.is_ok());

        let missing = dispatcher
            .dispatch(employee_request(
                "emp-1",
                TaskAction::GetTaskStatus { task_id: "ghost".to_string() },
            ))
            .await;
        assert_eq!(missing.error_kind(), Some("NotFoundError"));
    }

    #[tokio::test]
    async fn caller_profile_is_cached_until_ttl_expires() {
        let (dispatcher, store) = fixture();
        let task_id = ongoing_task_id(&dispatcher).await;

        // Rename the employee behind the cache's back; within the TTL the
        // event keeps the cached display name.
        store.seed_employee(employee("emp-1", "Renamed", &["React"], 3));
        let response = dispatcher
            .dispatch(employee_request(
                "emp-1",
                TaskAction::UpdateTaskProgress {
                    task_id,
                    progress: 10,
                    hours_logged: None,
                    note: None,
                },
            ))
            .await;
        assert_eq!(response.events()[0].actor_name.as_deref(), Some("Priya"));

        // A zero TTL cache always re-resolves.
        let (dispatcher, store) = fixture_with_ttl(Duration::ZERO);
        let task_id = ongoing_task_id(&dispatcher).await;
        store.seed_employee(employee("emp-1", "Renamed", &["React"], 3));
        let response = dispatcher
            .dispatch(employee_request(
                "emp-1",
                TaskAction::UpdateTaskProgress {
                    task_id,
                    progress: 10,
                    hours_logged: None,
                    note: None,
                },
            ))
            .await;
        assert_eq!(response.events()[0].actor_name.as_deref(), Some("Renamed"));
    }

    #[test]
    fn wire_action_shape_deserializes() {
        let raw = r#"{
            "action": "updateTaskProgress",
            "payload": { "taskId": "t-1", "progress": 50, "hoursLogged": 1.5 }
        }"#;
        let action: TaskAction = serde_json::from_str(raw).expect("deserialize");
        match action {
            TaskAction::UpdateTaskProgress { task_id, progress, hours_logged, note } => {
                assert_eq!(task_id, "t-1");
                assert_eq!(progress, 50);
                assert_eq!(hours_logged, Some(1.5));
                assert!(note.is_none());
            }
            other => panic!("unexpected action {other:?}"),
        }

        let raw = r#"{ "action": "listMyTasks", "payload": {} }"#;
        let action: TaskAction = serde_json::from_str(raw).expect("deserialize");
        assert!(matches!(action, TaskAction::ListMyTasks {}));
    }
}
