//! In-memory store with the same compare-and-swap semantics as the MongoDB
//! adapter; backs the dispatcher test-suite.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{StoreError, StoreResult, TaskStore};
use crate::models::{Employee, Invitation, InvitationStatus, Task, TaskStatus, TaskUpdate};

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    tasks: HashMap<String, Task>,
    invitations: HashMap<String, Invitation>,
    updates: Vec<TaskUpdate>,
    employees: HashMap<String, Employee>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an employee profile directly; profile management is outside
    /// the engine, so tests and local setups seed the pool this way.
    pub fn seed_employee(&self, employee: Employee) {
        if let Ok(mut state) = self.state.write() {
            state.employees.insert(employee.employee_id.clone(), employee);
        }
    }

    /// All updates appended for a task, oldest first.
    pub fn updates_for_task(&self, task_id: &str) -> Vec<TaskUpdate> {
        self.state
            .read()
            .map(|state| {
                state
                    .updates
                    .iter()
                    .filter(|u| u.task_id == task_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|err| StoreError::Backend(err.to_string()))
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create_task(&self, task: &Task) -> StoreResult<()> {
        let mut state = self.write()?;
        state.tasks.insert(task.task_id.clone(), task.clone());
        Ok(())
    }

    async fn delete_task(&self, task_id: &str) -> StoreResult<()> {
        let mut state = self.write()?;
        state.tasks.remove(task_id);
        Ok(())
    }

    async fn get_task(&self, task_id: &str) -> StoreResult<Option<Task>> {
        Ok(self.read()?.tasks.get(task_id).cloned())
    }

    async fn conditional_update_task(
        &self,
        task_id: &str,
        expected: TaskStatus,
        updated: &Task,
    ) -> StoreResult<Task> {
        let mut state = self.write()?;
        let current = state.tasks.get(task_id).ok_or_else(|| StoreError::NotFound {
            record: "task",
            id: task_id.to_string(),
        })?;
        if current.status != expected {
            return Err(StoreError::Conflict {
                record: "task",
                id: task_id.to_string(),
                expected: expected.as_str(),
            });
        }
        state.tasks.insert(task_id.to_string(), updated.clone());
        Ok(updated.clone())
    }

    async fn create_invitation(&self, invitation: &Invitation) -> StoreResult<()> {
        let mut state = self.write()?;
        state
            .invitations
            .insert(invitation.invitation_id.clone(), invitation.clone());
        Ok(())
    }

    async fn get_invitation_for_task(&self, task_id: &str) -> StoreResult<Option<Invitation>> {
        let state = self.read()?;
        let latest = state
            .invitations
            .values()
            .filter(|inv| inv.task_id == task_id)
            .max_by_key(|inv| inv.sent_at)
            .cloned();
        Ok(latest)
    }

    async fn conditional_update_invitation(
        &self,
        invitation_id: &str,
        expected: InvitationStatus,
        updated: &Invitation,
    ) -> StoreResult<Invitation> {
        let mut state = self.write()?;
        let current =
            state
                .invitations
                .get(invitation_id)
                .ok_or_else(|| StoreError::NotFound {
                    record: "invitation",
                    id: invitation_id.to_string(),
                })?;
        if current.status != expected {
            return Err(StoreError::Conflict {
                record: "invitation",
                id: invitation_id.to_string(),
                expected: expected.as_str(),
            });
        }
        state
            .invitations
            .insert(invitation_id.to_string(), updated.clone());
        Ok(updated.clone())
    }

    async fn append_task_update(&self, update: &TaskUpdate) -> StoreResult<()> {
        let mut state = self.write()?;
        state.updates.push(update.clone());
        Ok(())
    }

    async fn list_tasks_by_assignee(&self, employee_id: &str) -> StoreResult<Vec<Task>> {
        let state = self.read()?;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| task.assigned_to.as_deref() == Some(employee_id))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn get_employee(&self, employee_id: &str) -> StoreResult<Option<Employee>> {
        Ok(self.read()?.employees.get(employee_id).cloned())
    }

    async fn list_employees(&self) -> StoreResult<Vec<Employee>> {
        let mut employees: Vec<Employee> = self.read()?.employees.values().cloned().collect();
        employees.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));
        Ok(employees)
    }

    async fn adjust_workload(&self, employee_id: &str, delta: i32) -> StoreResult<()> {
        let mut state = self.write()?;
        let employee = state
            .employees
            .get_mut(employee_id)
            .ok_or_else(|| StoreError::NotFound {
                record: "employee",
                id: employee_id.to_string(),
            })?;
        employee.current_workload = employee.current_workload.saturating_add_signed(delta);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::TaskPriority;

    fn task(id: &str, status: TaskStatus) -> Task {
        Task {
            task_id: id.to_string(),
            title: "t".to_string(),
            description: String::new(),
            required_skills: vec![],
            priority: TaskPriority::Medium,
            status,
            progress: 0,
            assigned_to: None,
            created_by: "m".to_string(),
            deadline: None,
            estimated_hours: None,
            complexity_multiplier: 1.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn conditional_update_rejects_stale_status() {
        let store = MemoryStore::new();
        store
            .create_task(&task("t1", TaskStatus::Invited))
            .await
            .expect("create");

        let ongoing = task("t1", TaskStatus::Ongoing);
        store
            .conditional_update_task("t1", TaskStatus::Invited, &ongoing)
            .await
            .expect("first swap wins");

        let err = store
            .conditional_update_task("t1", TaskStatus::Invited, &ongoing)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn conditional_update_of_missing_task_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .conditional_update_task("ghost", TaskStatus::Invited, &task("ghost", TaskStatus::Ongoing))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
