use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::models::task::TaskStatus;

pub const STATUS_IN_PROGRESS: &str = "in_progress";
pub const STATUS_COMPLETED: &str = "completed";

/// Lower-cased username with surrounding whitespace and a leading `@` removed.
pub fn normalize_username(username: &str) -> String {
    let trimmed = username.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed).to_lowercase()
}

/// Status a project should move to given its task statuses, or `None` to keep
/// `current`. A project is completed when it has tasks and every one is approved;
/// a completed project with open work goes back to in progress.
pub fn derive_status(current: &str, tasks: &[TaskStatus]) -> Option<&'static str> {
    let all_approved = !tasks.is_empty() && tasks.iter().all(|status| *status == TaskStatus::Approved);

    if all_approved {
        return (current != STATUS_COMPLETED).then_some(STATUS_COMPLETED);
    }
    (current == STATUS_COMPLETED).then_some(STATUS_IN_PROGRESS)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProjectMember {
    #[schema(example = "bob")]
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    #[schema(example = "Руководитель, Модератор")]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: String,
    pub members: Vec<ProjectMember>,
    /// Incremented on every member-list write.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn has_member(&self, username: &str) -> bool {
        let normalized = normalize_username(username);
        self.members
            .iter()
            .any(|member| normalize_username(&member.username) == normalized)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbProject {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: String,
    pub members: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbProject> for Project {
    type Error = AppError;

    fn try_from(value: DbProject) -> Result<Self, Self::Error> {
        let members = crate::db::row_parsers::parse_members(&value.members)?;

        Ok(Project {
            id: value.id,
            title: value.title,
            description: value.description,
            status: value.status,
            members,
            version: value.version,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProjectCreateRequest {
    #[schema(example = "Launch")]
    pub title: String,
    #[serde(default)]
    #[schema(example = "Prepare the public launch")]
    pub description: String,
    #[serde(default)]
    pub members: Vec<ProjectMember>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectStatusRequest {
    #[schema(example = "in_progress")]
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MemberCreateRequest {
    #[schema(example = "@bob")]
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    #[schema(example = "Исполнитель")]
    pub role: String,
    #[serde(default)]
    pub telegram_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MemberRoleRequest {
    #[schema(example = "Руководитель")]
    pub role: String,
}
