use std::sync::Arc;

use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::task::Task;
use crate::models::user::UserProfile;
use crate::store::{ProjectStore, Stores, UserStore};

use super::membership::{resolve_member_role, MemberKey};
use super::roles::{invalid_role_combination, is_moderator, must_include_moderator, parse_roles};
use super::tags::MODERATOR_LABEL;

/// Answers "may this subject do X" by combining the global role with the
/// subject's role inside the affected project.
///
/// Evaluation order for project task management:
/// 1. admin (effective role) -> allow
/// 2. subject 0 or project 0 -> deny
/// 3. not a member of the project -> deny
/// 4. global moderator -> allow
/// 5. allow iff the membership role carries the leader tag
#[derive(Clone)]
pub struct AccessPolicy {
    users: Arc<dyn UserStore>,
    projects: Arc<dyn ProjectStore>,
}

impl AccessPolicy {
    pub fn new(stores: &Stores) -> Self {
        Self {
            users: stores.users.clone(),
            projects: stores.projects.clone(),
        }
    }

    /// Stored profile role when non-empty, otherwise the role carried by the token.
    pub async fn effective_role(&self, subject_id: i64, token_role: &str) -> AppResult<String> {
        let stored = self.users.user_by_telegram_id(subject_id).await?;
        Ok(role_of(stored.as_ref(), token_role))
    }

    pub async fn can_manage_project_tasks(&self, project_id: i64, subject_id: i64, token_role: &str) -> AppResult<bool> {
        let profile = self.users.user_by_telegram_id(subject_id).await?;
        let roles = parse_roles(&role_of(profile.as_ref(), token_role));

        if roles.is_admin() {
            tracing::debug!(subject_id, project_id, "admin bypass");
            return Ok(true);
        }

        if subject_id == 0 || project_id == 0 {
            tracing::debug!(subject_id, project_id, "missing subject or project");
            return Ok(false);
        }

        let Some(project) = self.projects.project_by_id(project_id).await? else {
            tracing::debug!(subject_id, project_id, "project not found");
            return Ok(false);
        };

        let key = MemberKey {
            telegram_id: Some(subject_id),
            username: profile.as_ref().map(|user| user.username.as_str()),
        };
        let Some(member_role) = resolve_member_role(&project, key) else {
            tracing::debug!(subject_id, project_id, "not a project member");
            return Ok(false);
        };

        if roles.is_moderator() {
            tracing::debug!(subject_id, project_id, "global moderator");
            return Ok(true);
        }

        let allowed = parse_roles(member_role).is_leader();
        tracing::debug!(subject_id, project_id, member_role, allowed, "membership role decision");
        Ok(allowed)
    }

    pub async fn can_review_project_tasks(&self, project_id: i64, subject_id: i64, token_role: &str) -> AppResult<bool> {
        self.can_manage_project_tasks(project_id, subject_id, token_role).await
    }

    /// Any authenticated subject may submit a completion; the assignee is not checked.
    pub fn can_submit_completion(&self, task: &Task, subject_id: i64) -> bool {
        let allowed = subject_id != 0;
        if allowed && task.assignee_id.is_some_and(|assignee| assignee != subject_id) {
            tracing::debug!(task_id = task.id, subject_id, "completion submitted by someone other than the assignee");
        }
        allowed
    }

    pub async fn can_manage_members(&self, subject_id: i64, token_role: &str) -> AppResult<bool> {
        let role = self.effective_role(subject_id, token_role).await?;
        Ok(parse_roles(&role).is_admin())
    }

    pub async fn ensure_manage_project_tasks(&self, project_id: i64, user: &AuthUser) -> AppResult<()> {
        if self.can_manage_project_tasks(project_id, user.subject_id, &user.role).await? {
            return Ok(());
        }
        tracing::warn!(subject_id = user.subject_id, project_id, "task management denied");
        Err(AppError::forbidden("insufficient rights to manage tasks of this project"))
    }

    pub async fn ensure_review_project_tasks(&self, project_id: i64, user: &AuthUser) -> AppResult<()> {
        if self.can_review_project_tasks(project_id, user.subject_id, &user.role).await? {
            return Ok(());
        }
        tracing::warn!(subject_id = user.subject_id, project_id, "review denied");
        Err(AppError::forbidden("insufficient rights to review tasks of this project"))
    }

    pub fn ensure_submit_completion(&self, task: &Task, user: &AuthUser) -> AppResult<()> {
        if self.can_submit_completion(task, user.subject_id) {
            return Ok(());
        }
        Err(AppError::forbidden("insufficient rights to submit this task"))
    }

    /// Admin-only operations: member management, user directory edits, project creation.
    pub async fn ensure_admin(&self, user: &AuthUser) -> AppResult<()> {
        if self.can_manage_members(user.subject_id, &user.role).await? {
            return Ok(());
        }
        tracing::warn!(subject_id = user.subject_id, "admin action denied");
        Err(AppError::forbidden("administrator role required"))
    }
}

fn role_of(profile: Option<&UserProfile>, token_role: &str) -> String {
    match profile {
        Some(user) if !user.role.trim().is_empty() => user.role.clone(),
        _ => token_role.to_string(),
    }
}

/// Normalizes a membership role before it is written: developer+admin is
/// rejected and leaders always get the moderator tag.
pub fn guard_member_role(role: &str) -> AppResult<String> {
    let role = role.trim();
    if invalid_role_combination(role) {
        return Err(AppError::validation("developer role cannot be combined with an administrator role"));
    }

    if must_include_moderator(role) && !is_moderator(role) {
        return Ok(format!("{role}, {MODERATOR_LABEL}"));
    }

    Ok(role.to_string())
}
