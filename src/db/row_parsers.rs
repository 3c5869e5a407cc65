use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::errors::AppError;
use crate::models::project::ProjectMember;
use crate::models::task::TaskStatus;

/// Decodes the inline member list of a project. Blank or `null` columns mean no members.
pub fn parse_members(raw: &str) -> Result<Vec<ProjectMember>, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }

    serde_json::from_str(trimmed).map_err(|err| AppError::internal(format!("invalid project members: {err}")))
}

pub fn encode_members(members: &[ProjectMember]) -> Result<String, AppError> {
    serde_json::to_string(members).map_err(|err| AppError::internal(format!("failed to encode members: {err}")))
}

pub fn task_status_from_row(row: &SqliteRow) -> Result<TaskStatus, AppError> {
    let raw: String = row.try_get("status")?;
    raw.parse::<TaskStatus>()
        .map_err(|_| AppError::internal(format!("invalid stored task status: {raw}")))
}
