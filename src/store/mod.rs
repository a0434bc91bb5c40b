//! Persistence port consumed by the dispatcher.
//!
//! Task and invitation records are the only shared mutable state, and every
//! mutation on them is conditional on the expected prior status: racing
//! transitions lose with a conflict instead of silently overwriting each
//! other.

#[cfg(test)]
pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use thiserror::Error;

use crate::errors::EngineError;
use crate::models::{Employee, Invitation, InvitationStatus, Task, TaskStatus, TaskUpdate};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("{record} {id} not found")]
    NotFound { record: &'static str, id: String },

    /// The compare-and-swap precondition no longer held at apply time.
    #[error("{record} {id} is no longer {expected}")]
    Conflict {
        record: &'static str,
        id: String,
        expected: &'static str,
    },

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => EngineError::NotFound(err.to_string()),
            StoreError::Conflict { .. } => EngineError::Conflict(err.to_string()),
            StoreError::Backend(message) => EngineError::Upstream(message),
        }
    }
}

/// Storage contract for the assignment engine.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, task: &Task) -> StoreResult<()>;

    /// Removes a task; used to roll back a half-created task+invitation
    /// pair so `createTask` has no partial effect.
    async fn delete_task(&self, task_id: &str) -> StoreResult<()>;

    async fn get_task(&self, task_id: &str) -> StoreResult<Option<Task>>;

    /// Compare-and-swap write: replaces the record only while its status
    /// still matches `expected`, returning the stored record after the
    /// swap. The loser of a race gets [`StoreError::Conflict`].
    async fn conditional_update_task(
        &self,
        task_id: &str,
        expected: TaskStatus,
        updated: &Task,
    ) -> StoreResult<Task>;

    async fn create_invitation(&self, invitation: &Invitation) -> StoreResult<()>;

    /// Latest invitation for the task, if any.
    async fn get_invitation_for_task(&self, task_id: &str) -> StoreResult<Option<Invitation>>;

    /// Compare-and-swap on the invitation status, mirroring
    /// [`TaskStore::conditional_update_task`].
    async fn conditional_update_invitation(
        &self,
        invitation_id: &str,
        expected: InvitationStatus,
        updated: &Invitation,
    ) -> StoreResult<Invitation>;

    async fn append_task_update(&self, update: &TaskUpdate) -> StoreResult<()>;

    /// Tasks currently assigned to the employee, most recent first.
    async fn list_tasks_by_assignee(&self, employee_id: &str) -> StoreResult<Vec<Task>>;

    async fn get_employee(&self, employee_id: &str) -> StoreResult<Option<Employee>>;

    /// The candidate pool the scorer ranks over.
    async fn list_employees(&self) -> StoreResult<Vec<Employee>>;

    /// Adjusts `current_workload` by `delta`, clamped at zero.
    async fn adjust_workload(&self, employee_id: &str, delta: i32) -> StoreResult<()>;
}
