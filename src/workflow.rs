//! Task lifecycle: `new -> submitted -> approved | rejected`, with rejected
//! tasks going back to `submitted` on resubmission.
//!
//! Every transition is gated by [`AccessPolicy`]. Chat notifications are best
//! effort and never fail the transition that triggered them.

use std::sync::Arc;

use crate::authz::{find_member, AccessPolicy, MemberKey};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::project::Project;
use crate::models::task::{NewTask, ReviewRecord, ReviewRequest, Task, TaskCreateRequest, TaskStatus, TaskUpdateRequest};
use crate::store::{ProjectStore, Stores, TaskStore, UserStore};
use crate::telegram::Notifier;
use crate::utils::{format_deadline, utc_now};

#[derive(Clone)]
pub struct TaskWorkflow {
    stores: Stores,
    policy: AccessPolicy,
    notifier: Arc<dyn Notifier>,
}

impl TaskWorkflow {
    pub fn new(stores: Stores, policy: AccessPolicy, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            stores,
            policy,
            notifier,
        }
    }

    pub async fn create(&self, user: &AuthUser, payload: TaskCreateRequest) -> AppResult<Task> {
        let title = payload.title.trim();
        if title.is_empty() {
            return Err(AppError::validation("title is required"));
        }

        self.policy.ensure_manage_project_tasks(payload.id_project, user).await?;
        let project = self.project(payload.id_project).await?;

        let assignee = payload.user.trim().to_string();
        let assignee_id = match payload.id_user.filter(|id| *id != 0) {
            Some(id) => Some(id),
            None => self.resolve_assignee_id(&project, &assignee).await?,
        };

        let author = match payload.author.trim() {
            "" => self.display_name(user.subject_id).await?,
            author => author.to_string(),
        };

        let task = self
            .stores
            .tasks
            .create_task(&NewTask {
                project_id: project.id,
                title: title.to_string(),
                description: payload.description,
                deadline: payload.deadline,
                status: payload.status.unwrap_or_default(),
                assignee,
                assignee_id,
                author,
                author_id: Some(user.subject_id).filter(|id| *id != 0),
            })
            .await?;

        tracing::info!(task_id = task.id, project_id = project.id, subject_id = user.subject_id, "task created");

        if let Some(recipient) = task.assignee_id {
            self.notify(recipient, new_task_message(&project.title, &task)).await;
        }
        self.stores.projects.refresh_status(project.id).await?;

        Ok(task)
    }

    pub async fn update(&self, user: &AuthUser, id: i64, payload: TaskUpdateRequest) -> AppResult<Task> {
        let mut task = self.task(id).await?;
        self.policy.ensure_manage_project_tasks(task.project_id, user).await?;

        let previous_project = task.project_id;
        if let Some(project_id) = payload.id_project.filter(|pid| *pid != task.project_id) {
            self.policy.ensure_manage_project_tasks(project_id, user).await?;
            self.project(project_id).await?;
            task.project_id = project_id;
        }

        if let Some(title) = payload.title {
            if title.trim().is_empty() {
                return Err(AppError::validation("title must not be empty"));
            }
            task.title = title.trim().to_string();
        }
        if let Some(description) = payload.description {
            task.description = description;
        }
        if let Some(deadline) = payload.deadline {
            task.deadline = deadline;
        }
        if let Some(status) = payload.status {
            task.status = status;
        }
        if let Some(assignee) = payload.user {
            task.assignee = assignee.trim().to_string();
            if payload.id_user.is_none() {
                let project = self.project(task.project_id).await?;
                task.assignee_id = self.resolve_assignee_id(&project, &task.assignee).await?;
            }
        }
        if let Some(assignee_id) = payload.id_user {
            task.assignee_id = Some(assignee_id).filter(|id| *id != 0);
        }

        let task = self.stores.tasks.update_task(&task).await?;
        tracing::info!(task_id = task.id, subject_id = user.subject_id, "task updated");

        self.stores.projects.refresh_status(task.project_id).await?;
        if previous_project != task.project_id {
            self.stores.projects.refresh_status(previous_project).await?;
        }

        Ok(task)
    }

    pub async fn delete(&self, user: &AuthUser, id: i64) -> AppResult<()> {
        let task = self.task(id).await?;
        self.policy.ensure_manage_project_tasks(task.project_id, user).await?;

        self.stores.tasks.delete_task(id).await?;
        tracing::info!(task_id = id, subject_id = user.subject_id, "task deleted");

        self.stores.projects.refresh_status(task.project_id).await?;
        Ok(())
    }

    /// Moves the task to `submitted`. Allowed from any state.
    pub async fn submit(&self, user: &AuthUser, id: i64, message: &str) -> AppResult<Task> {
        let task = self.task(id).await?;
        self.policy.ensure_submit_completion(&task, user)?;

        let task = self.stores.tasks.record_submission(id, message.trim()).await?;
        tracing::info!(task_id = id, subject_id = user.subject_id, "completion submitted");

        if let Some(author) = task.author_id {
            let project_title = self.project_title(task.project_id).await?;
            self.notify(author, submission_message(&project_title, &task)).await;
        }
        self.stores.projects.refresh_status(task.project_id).await?;

        Ok(task)
    }

    /// Approves or rejects a submitted task. Any other current state is a conflict.
    pub async fn review(&self, user: &AuthUser, id: i64, payload: ReviewRequest) -> AppResult<Task> {
        let task = self.task(id).await?;
        self.policy.ensure_review_project_tasks(task.project_id, user).await?;

        if task.status != TaskStatus::Submitted {
            return Err(AppError::conflict("task is not awaiting review"));
        }

        let record = ReviewRecord {
            status: if payload.approved { TaskStatus::Approved } else { TaskStatus::Rejected },
            message: payload.message.trim().to_string(),
            reviewed_by: self.display_name(user.subject_id).await?,
            reviewed_at: utc_now(),
        };
        let task = self.stores.tasks.record_review(id, &record).await?;
        tracing::info!(task_id = id, subject_id = user.subject_id, status = %task.status, "task reviewed");

        if let Some(assignee) = task.assignee_id {
            let project_title = self.project_title(task.project_id).await?;
            self.notify(assignee, review_message(&project_title, &task)).await;
        }
        self.stores.projects.refresh_status(task.project_id).await?;

        Ok(task)
    }

    async fn task(&self, id: i64) -> AppResult<Task> {
        self.stores
            .tasks
            .task_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("task not found"))
    }

    async fn project(&self, id: i64) -> AppResult<Project> {
        self.stores
            .projects
            .project_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("project not found"))
    }

    async fn project_title(&self, id: i64) -> AppResult<String> {
        Ok(self
            .stores
            .projects
            .project_by_id(id)
            .await?
            .map(|project| project.title)
            .unwrap_or_default())
    }

    /// Directory entry first, then the Telegram id recorded on the project member.
    async fn resolve_assignee_id(&self, project: &Project, username: &str) -> AppResult<Option<i64>> {
        if username.is_empty() {
            return Ok(None);
        }
        if let Some(user) = self.stores.users.user_by_username(username).await? {
            return Ok(Some(user.telegram_id));
        }
        Ok(find_member(project, MemberKey::username(username)).and_then(|member| member.telegram_id))
    }

    async fn display_name(&self, subject_id: i64) -> AppResult<String> {
        if subject_id == 0 {
            return Ok(String::new());
        }
        Ok(self
            .stores
            .users
            .user_by_telegram_id(subject_id)
            .await?
            .map(|user| user.display_name())
            .unwrap_or_default())
    }

    async fn notify(&self, recipient: i64, text: String) {
        if let Err(err) = self.notifier.send_message(recipient, &text).await {
            tracing::warn!(recipient, error = %err, "notification not delivered");
        }
    }
}

/// Escapes the characters Telegram's HTML parse mode treats as markup.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub fn new_task_message(project_title: &str, task: &Task) -> String {
    format!(
        "📌 Вам пришла новая задача:\n\n\
         Проект: {}\n\
         Задача: {}\n\
         Описание: {}\n\n\
         👤 Исполнитель: {}\n\
         ✍️ Автор: {}\n\
         ⏰ Дедлайн: {}\n\
         🆔 ID задачи: {}",
        escape_html(project_title),
        escape_html(&task.title),
        escape_html(&task.description),
        escape_html(&task.assignee),
        escape_html(&task.author),
        format_deadline(task.deadline),
        task.id,
    )
}

pub fn submission_message(project_title: &str, task: &Task) -> String {
    format!(
        "📝 Задача отправлена на проверку:\n\n\
         Проект: {}\n\
         Задача: {}\n\
         👤 Исполнитель: {}\n\
         💬 Комментарий: {}\n\
         🆔 ID задачи: {}",
        escape_html(project_title),
        escape_html(&task.title),
        escape_html(&task.assignee),
        escape_html(task.completion_message.as_deref().unwrap_or_default()),
        task.id,
    )
}

pub fn review_message(project_title: &str, task: &Task) -> String {
    let headline = match task.status {
        TaskStatus::Approved => "✅ Задача принята:",
        _ => "↩️ Задача возвращена на доработку:",
    };
    format!(
        "{headline}\n\n\
         Проект: {}\n\
         Задача: {}\n\
         🧑‍💼 Проверил: {}\n\
         💬 Комментарий: {}\n\
         🆔 ID задачи: {}",
        escape_html(project_title),
        escape_html(&task.title),
        escape_html(task.reviewed_by.as_deref().unwrap_or_default()),
        escape_html(task.review_message.as_deref().unwrap_or_default()),
        task.id,
    )
}
