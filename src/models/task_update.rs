use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A progress note on an ongoing task. Append-only; entries are never
/// mutated or deleted in normal flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskUpdate {
    #[serde(rename = "_id")]
    pub update_id: String,
    pub task_id: String,
    pub author_id: String,
    pub note: Option<String>,
    /// Progress snapshot at the time the note was written.
    pub progress: u32,
    /// Hours booked with this update, when the employee logged any.
    pub hours_logged: Option<f64>,
    pub created_at: DateTime<Utc>,
}
