mod invitation;
mod task;
mod task_update;

pub use invitation::{Invitation, InvitationStatus};
pub use task::{Task, TaskPriority, TaskStatus};
pub use task_update::TaskUpdate;

use serde::{Deserialize, Serialize};

/// Caller roles carried in JWT claims and action requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Employee,
}

impl Role {
    /// Roles entitled to create tasks and send invitations.
    pub fn is_elevated(self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Employee => "employee",
        }
    }
}

/// An employee profile as stored in the `employees` collection.
///
/// `current_workload` counts active assignments and is maintained by the
/// lifecycle transitions; skills, rate and the rest are edited externally
/// through the profile screens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    #[serde(rename = "_id")]
    pub employee_id: String,
    pub name: String,
    /// Unique skill strings, e.g. "React", "PostgreSQL".
    pub skills: Vec<String>,
    pub department: String,
    pub designation: String,
    pub current_workload: u32,
    /// Normalized performance rating in [0, 1].
    pub performance_score: f64,
    pub availability: bool,
    pub hourly_rate: f64,
}
