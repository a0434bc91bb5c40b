//! MongoDB-backed store.
//!
//! Conditional updates are expressed as `find_one_and_replace` filtered on
//! the expected status: the compare-and-swap the hosted database gives us,
//! so a racing transition loses instead of overwriting.

use async_trait::async_trait;
use futures_util::StreamExt;
use log::error;
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, ReturnDocument};
use mongodb::{Client, Collection, Database};

use super::{StoreError, StoreResult, TaskStore};
use crate::models::{Employee, Invitation, InvitationStatus, Task, TaskStatus, TaskUpdate};

pub struct MongoStore {
    pub db: Database,
}

impl MongoStore {
    pub async fn init(uri: &str, db_name: &str) -> Self {
        let client_options = ClientOptions::parse(uri)
            .await
            .expect("Failed to parse MongoDB connection string");
        let client = Client::with_options(client_options).expect("Failed to initialize client");
        let db = client.database(db_name);
        MongoStore { db }
    }

    fn tasks(&self) -> Collection<Task> {
        self.db.collection("tasks")
    }

    fn invitations(&self) -> Collection<Invitation> {
        self.db.collection("invitations")
    }

    fn task_updates(&self) -> Collection<TaskUpdate> {
        self.db.collection("task_updates")
    }

    fn employees(&self) -> Collection<Employee> {
        self.db.collection("employees")
    }
}

fn backend(err: mongodb::error::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl TaskStore for MongoStore {
    async fn create_task(&self, task: &Task) -> StoreResult<()> {
        self.tasks().insert_one(task).await.map_err(backend)?;
        Ok(())
    }

    async fn delete_task(&self, task_id: &str) -> StoreResult<()> {
        self.tasks()
            .delete_one(doc! { "_id": task_id })
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get_task(&self, task_id: &str) -> StoreResult<Option<Task>> {
        self.tasks()
            .find_one(doc! { "_id": task_id })
            .await
            .map_err(backend)
    }

    async fn conditional_update_task(
        &self,
        task_id: &str,
        expected: TaskStatus,
        updated: &Task,
    ) -> StoreResult<Task> {
        let filter = doc! { "_id": task_id, "status": expected.as_str() };
        let swapped = self
            .tasks()
            .find_one_and_replace(filter, updated)
            .return_document(ReturnDocument::After)
            .await
            .map_err(backend)?;
        match swapped {
            Some(task) => Ok(task),
            // No match: either the task is gone or its status moved on.
            None => match self.get_task(task_id).await? {
                Some(_) => Err(StoreError::Conflict {
                    record: "task",
                    id: task_id.to_string(),
                    expected: expected.as_str(),
                }),
                None => Err(StoreError::NotFound {
                    record: "task",
                    id: task_id.to_string(),
                }),
            },
        }
    }

    async fn create_invitation(&self, invitation: &Invitation) -> StoreResult<()> {
        self.invitations()
            .insert_one(invitation)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get_invitation_for_task(&self, task_id: &str) -> StoreResult<Option<Invitation>> {
        self.invitations()
            .find_one(doc! { "task_id": task_id })
            .sort(doc! { "sent_at": -1 })
            .await
            .map_err(backend)
    }

    async fn conditional_update_invitation(
        &self,
        invitation_id: &str,
        expected: InvitationStatus,
        updated: &Invitation,
    ) -> StoreResult<Invitation> {
        let filter = doc! { "_id": invitation_id, "status": expected.as_str() };
        let swapped = self
            .invitations()
            .find_one_and_replace(filter, updated)
            .return_document(ReturnDocument::After)
            .await
            .map_err(backend)?;
        match swapped {
            Some(invitation) => Ok(invitation),
            None => {
                let exists = self
                    .invitations()
                    .find_one(doc! { "_id": invitation_id })
                    .await
                    .map_err(backend)?;
                match exists {
                    Some(_) => Err(StoreError::Conflict {
                        record: "invitation",
                        id: invitation_id.to_string(),
                        expected: expected.as_str(),
                    }),
                    None => Err(StoreError::NotFound {
                        record: "invitation",
                        id: invitation_id.to_string(),
                    }),
                }
            }
        }
    }

    async fn append_task_update(&self, update: &TaskUpdate) -> StoreResult<()> {
        self.task_updates()
            .insert_one(update)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn list_tasks_by_assignee(&self, employee_id: &str) -> StoreResult<Vec<Task>> {
        let mut cursor = self
            .tasks()
            .find(doc! { "assigned_to": employee_id })
            .sort(doc! { "created_at": -1 })
            .await
            .map_err(backend)?;

        let mut tasks = Vec::new();
        while let Some(task_result) = cursor.next().await {
            match task_result {
                Ok(task) => tasks.push(task),
                Err(err) => {
                    error!("Error iterating tasks: {}", err);
                    return Err(backend(err));
                }
            }
        }
        Ok(tasks)
    }

    async fn get_employee(&self, employee_id: &str) -> StoreResult<Option<Employee>> {
        self.employees()
            .find_one(doc! { "_id": employee_id })
            .await
            .map_err(backend)
    }

    async fn list_employees(&self) -> StoreResult<Vec<Employee>> {
        let mut cursor = self.employees().find(doc! {}).await.map_err(backend)?;
        let mut employees = Vec::new();
        while let Some(employee_result) = cursor.next().await {
            match employee_result {
                Ok(employee) => employees.push(employee),
                Err(err) => {
                    error!("Error iterating employees: {}", err);
                    return Err(backend(err));
                }
            }
        }
        Ok(employees)
    }

    async fn adjust_workload(&self, employee_id: &str, delta: i32) -> StoreResult<()> {
        // Guard the decrement so the counter never goes below zero.
        let filter = if delta < 0 {
            doc! { "_id": employee_id, "current_workload": { "$gte": -delta } }
        } else {
            doc! { "_id": employee_id }
        };
        let update = doc! { "$inc": { "current_workload": delta } };
        let result = self
            .employees()
            .update_one(filter, update)
            .await
            .map_err(backend)?;
        if delta > 0 && result.matched_count == 0 {
            return Err(StoreError::NotFound {
                record: "employee",
                id: employee_id.to_string(),
            });
        }
        Ok(())
    }
}
