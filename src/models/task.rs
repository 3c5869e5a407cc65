use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::errors::AppError;

/// Lifecycle of a task. `Submitted` is the "under review" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    New,
    Submitted,
    Approved,
    Rejected,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::New => "new",
            TaskStatus::Submitted => "submitted",
            TaskStatus::Approved => "approved",
            TaskStatus::Rejected => "rejected",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::New
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "new" => Ok(TaskStatus::New),
            "submitted" => Ok(TaskStatus::Submitted),
            "approved" => Ok(TaskStatus::Approved),
            "rejected" => Ok(TaskStatus::Rejected),
            other => Err(AppError::validation(format!("unknown task status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub description: String,
    #[schema(value_type = Option<String>, format = Date, example = "2025-10-01")]
    pub deadline: Option<NaiveDate>,
    pub status: TaskStatus,
    /// Assignee username as entered by the task author.
    pub assignee: String,
    pub assignee_id: Option<i64>,
    pub author: String,
    pub author_id: Option<i64>,
    pub completion_message: Option<String>,
    pub review_message: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbTask {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub description: String,
    pub deadline: Option<NaiveDate>,
    pub status: String,
    pub assignee: String,
    pub assignee_id: Option<i64>,
    pub author: String,
    pub author_id: Option<i64>,
    pub completion_message: Option<String>,
    pub review_message: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbTask> for Task {
    type Error = AppError;

    fn try_from(value: DbTask) -> Result<Self, Self::Error> {
        let status = value
            .status
            .parse::<TaskStatus>()
            .map_err(|_| AppError::internal(format!("stored task {} has unknown status", value.id)))?;

        Ok(Task {
            id: value.id,
            project_id: value.project_id,
            title: value.title,
            description: value.description,
            deadline: value.deadline,
            status,
            assignee: value.assignee,
            assignee_id: value.assignee_id,
            author: value.author,
            author_id: value.author_id,
            completion_message: value.completion_message,
            review_message: value.review_message,
            reviewed_by: value.reviewed_by,
            reviewed_at: value.reviewed_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

/// Fields needed to insert a task; everything else starts empty.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub project_id: i64,
    pub title: String,
    pub description: String,
    pub deadline: Option<NaiveDate>,
    pub status: TaskStatus,
    pub assignee: String,
    pub assignee_id: Option<i64>,
    pub author: String,
    pub author_id: Option<i64>,
}

/// Outcome recorded by a review.
#[derive(Debug, Clone)]
pub struct ReviewRecord {
    pub status: TaskStatus,
    pub message: String,
    pub reviewed_by: String,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TaskCreateRequest {
    #[schema(example = 1)]
    pub id_project: i64,
    #[schema(example = "Write release notes")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[schema(value_type = Option<String>, format = Date, example = "2025-10-01")]
    pub deadline: Option<NaiveDate>,
    pub status: Option<TaskStatus>,
    /// Assignee username.
    #[serde(default)]
    #[schema(example = "bob")]
    pub user: String,
    /// Assignee Telegram id; resolved from `user` when absent.
    pub id_user: Option<i64>,
    #[serde(default)]
    pub author: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TaskUpdateRequest {
    pub id_project: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Absent keeps the deadline, `null` clears it.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>, format = Date, nullable, example = "2025-10-15")]
    pub deadline: Option<Option<NaiveDate>>,
    pub status: Option<TaskStatus>,
    pub user: Option<String>,
    pub id_user: Option<i64>,
}

/// Marks a field as present, so an explicit `null` becomes `Some(None)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompletionRequest {
    #[serde(default)]
    #[schema(example = "Done, see the attached link")]
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewRequest {
    pub approved: bool,
    #[serde(default)]
    pub message: String,
}
