use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::db::row_parsers::{encode_members, task_status_from_row};
use crate::errors::{AppError, AppResult};
use crate::models::event::{Event, NewEvent};
use crate::models::project::{derive_status, normalize_username, DbProject, Project, ProjectMember, STATUS_IN_PROGRESS};
use crate::models::task::{DbTask, NewTask, ReviewRecord, Task, TaskStatus};
use crate::models::user::{DbUser, UserProfile, UserUpdateRequest};
use crate::utils::utc_now;

use super::{EventStore, ProjectStore, TaskStore, UserStore};

const USER_COLUMNS: &str = "telegram_id, first_name, last_name, username, photo_url, full_name, date_of_birthday, phone_number, role, may_to_open, created_at, updated_at";
const PROJECT_COLUMNS: &str = "id, title, description, status, members, version, created_at, updated_at";
const EVENT_COLUMNS: &str = "id, title, date, time_range, created_by, description";
const TASK_COLUMNS: &str = "id, project_id, title, description, deadline, status, assignee, assignee_id, author, author_id, completion_message, review_message, reviewed_by, reviewed_at, created_at, updated_at";

/// SQLite backend for every store trait.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_user(&self, telegram_id: i64) -> AppResult<UserProfile> {
        self.user_by_telegram_id(telegram_id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))
    }

    async fn fetch_project(&self, id: i64) -> AppResult<Project> {
        self.project_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("project not found"))
    }

    async fn fetch_task(&self, id: i64) -> AppResult<Task> {
        self.task_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("task not found"))
    }

    async fn task_exists(&self, id: i64) -> AppResult<bool> {
        let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn user_by_telegram_id(&self, telegram_id: i64) -> AppResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE telegram_id = ?"))
            .bind(telegram_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserProfile::try_from).transpose()
    }

    async fn user_by_username(&self, username: &str) -> AppResult<Option<UserProfile>> {
        let normalized = normalize_username(username);
        if normalized.is_empty() {
            return Ok(None);
        }

        let row = sqlx::query_as::<_, DbUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username_key = ? ORDER BY telegram_id LIMIT 1"
        ))
        .bind(normalized)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserProfile::try_from).transpose()
    }

    async fn list_users(&self) -> AppResult<Vec<UserProfile>> {
        let rows = sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY telegram_id"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(UserProfile::try_from).collect()
    }

    async fn search_users(&self, term: &str) -> AppResult<Vec<UserProfile>> {
        // SQLite's lower() only folds ASCII, names are frequently Cyrillic
        let needle = term.trim().to_lowercase();
        let users = self.list_users().await?;
        Ok(users
            .into_iter()
            .filter(|user| user.full_name.to_lowercase().contains(&needle))
            .collect())
    }

    async fn upsert_user(&self, user: &UserProfile) -> AppResult<UserProfile> {
        let now = utc_now();

        sqlx::query(
            "INSERT INTO users (telegram_id, first_name, last_name, username, username_key, photo_url, full_name, date_of_birthday, phone_number, role, may_to_open, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(telegram_id) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                username = excluded.username,
                username_key = excluded.username_key,
                photo_url = excluded.photo_url,
                full_name = excluded.full_name,
                date_of_birthday = excluded.date_of_birthday,
                phone_number = excluded.phone_number,
                role = excluded.role,
                may_to_open = excluded.may_to_open,
                updated_at = excluded.updated_at",
        )
        .bind(user.telegram_id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.username)
        .bind(normalize_username(&user.username))
        .bind(&user.photo_url)
        .bind(&user.full_name)
        .bind(&user.date_of_birthday)
        .bind(&user.phone_number)
        .bind(&user.role)
        .bind(user.may_to_open)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.fetch_user(user.telegram_id).await
    }

    async fn update_user(&self, telegram_id: i64, update: &UserUpdateRequest) -> AppResult<UserProfile> {
        let result = sqlx::query(
            "UPDATE users SET full_name = ?, username = ?, username_key = ?, date_of_birthday = ?, phone_number = ?, role = ?, may_to_open = ?, updated_at = ? WHERE telegram_id = ?",
        )
        .bind(&update.full_name)
        .bind(&update.username)
        .bind(normalize_username(&update.username))
        .bind(&update.date_of_birthday)
        .bind(&update.phone_number)
        .bind(&update.role)
        .bind(update.may_to_open)
        .bind(utc_now())
        .bind(telegram_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("user not found"));
        }

        self.fetch_user(telegram_id).await
    }
}

#[async_trait]
impl ProjectStore for SqliteStore {
    async fn project_by_id(&self, id: i64) -> AppResult<Option<Project>> {
        let row = sqlx::query_as::<_, DbProject>(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Project::try_from).transpose()
    }

    async fn list_projects(&self) -> AppResult<Vec<Project>> {
        let rows = sqlx::query_as::<_, DbProject>(&format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Project::try_from).collect()
    }

    async fn create_project(&self, title: &str, description: &str, members: &[ProjectMember]) -> AppResult<Project> {
        let now = utc_now();
        let encoded = encode_members(members)?;

        let result = sqlx::query(
            "INSERT INTO projects (title, description, status, members, version, created_at, updated_at) VALUES (?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(title)
        .bind(description)
        .bind(STATUS_IN_PROGRESS)
        .bind(encoded)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.fetch_project(result.last_insert_rowid()).await
    }

    async fn replace_members(&self, id: i64, expected_version: i64, members: &[ProjectMember]) -> AppResult<Project> {
        let encoded = encode_members(members)?;

        let result = sqlx::query(
            "UPDATE projects SET members = ?, version = version + 1, updated_at = ? WHERE id = ? AND version = ?",
        )
        .bind(encoded)
        .bind(utc_now())
        .bind(id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // either the project is gone or someone else wrote the list first
            self.fetch_project(id).await?;
            return Err(AppError::conflict("project members were modified concurrently"));
        }

        self.fetch_project(id).await
    }

    async fn set_status(&self, id: i64, status: &str) -> AppResult<Project> {
        let result = sqlx::query("UPDATE projects SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(utc_now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("project not found"));
        }

        self.fetch_project(id).await
    }

    async fn refresh_status(&self, id: i64) -> AppResult<String> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_scalar::<_, String>("SELECT status FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("project not found"))?;

        let rows = sqlx::query("SELECT status FROM tasks WHERE project_id = ?")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
        let statuses = rows.iter().map(task_status_from_row).collect::<AppResult<Vec<_>>>()?;

        let next = match derive_status(&current, &statuses) {
            Some(next) => {
                sqlx::query("UPDATE projects SET status = ?, updated_at = ? WHERE id = ?")
                    .bind(next)
                    .bind(utc_now())
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                tracing::info!(project_id = id, from = %current, to = next, "project status changed");
                next.to_string()
            }
            None => current,
        };

        tx.commit().await?;
        Ok(next)
    }
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn task_by_id(&self, id: i64) -> AppResult<Option<Task>> {
        let row = sqlx::query_as::<_, DbTask>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Task::try_from).transpose()
    }

    async fn tasks_by_project(&self, project_id: i64) -> AppResult<Vec<Task>> {
        let rows = sqlx::query_as::<_, DbTask>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = ? ORDER BY id"))
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Task::try_from).collect()
    }

    async fn open_tasks_for_assignee(&self, username: &str, telegram_id: Option<i64>) -> AppResult<Vec<Task>> {
        let normalized = normalize_username(username);

        let rows = sqlx::query_as::<_, DbTask>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE status != ?
               AND ((? != '' AND assignee_key = ?) OR (? IS NOT NULL AND assignee_id = ?))
             ORDER BY deadline IS NULL, deadline, id"
        ))
        .bind(TaskStatus::Approved.as_str())
        .bind(&normalized)
        .bind(&normalized)
        .bind(telegram_id)
        .bind(telegram_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Task::try_from).collect()
    }

    async fn create_task(&self, task: &NewTask) -> AppResult<Task> {
        let now = utc_now();

        let result = sqlx::query(
            "INSERT INTO tasks (project_id, title, description, deadline, status, assignee, assignee_key, assignee_id, author, author_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(task.project_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.deadline)
        .bind(task.status.as_str())
        .bind(&task.assignee)
        .bind(normalize_username(&task.assignee))
        .bind(task.assignee_id)
        .bind(&task.author)
        .bind(task.author_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.fetch_task(result.last_insert_rowid()).await
    }

    async fn update_task(&self, task: &Task) -> AppResult<Task> {
        let result = sqlx::query(
            "UPDATE tasks SET project_id = ?, title = ?, description = ?, deadline = ?, status = ?, assignee = ?, assignee_key = ?, assignee_id = ?, updated_at = ? WHERE id = ?",
        )
        .bind(task.project_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.deadline)
        .bind(task.status.as_str())
        .bind(&task.assignee)
        .bind(normalize_username(&task.assignee))
        .bind(task.assignee_id)
        .bind(utc_now())
        .bind(task.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("task not found"));
        }

        self.fetch_task(task.id).await
    }

    async fn record_submission(&self, id: i64, message: &str) -> AppResult<Task> {
        let result = sqlx::query(
            "UPDATE tasks SET status = ?, completion_message = ?, review_message = NULL, reviewed_by = NULL, reviewed_at = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(TaskStatus::Submitted.as_str())
        .bind(message)
        .bind(utc_now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("task not found"));
        }

        self.fetch_task(id).await
    }

    async fn record_review(&self, id: i64, review: &ReviewRecord) -> AppResult<Task> {
        let result = sqlx::query(
            "UPDATE tasks SET status = ?, review_message = ?, reviewed_by = ?, reviewed_at = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(review.status.as_str())
        .bind(&review.message)
        .bind(&review.reviewed_by)
        .bind(review.reviewed_at)
        .bind(utc_now())
        .bind(id)
        .bind(TaskStatus::Submitted.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            if self.task_exists(id).await? {
                return Err(AppError::conflict("task is not awaiting review"));
            }
            return Err(AppError::not_found("task not found"));
        }

        self.fetch_task(id).await
    }

    async fn delete_task(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("task not found"));
        }

        Ok(())
    }
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn list_events(&self) -> AppResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(&format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY id DESC"))
            .fetch_all(&self.pool)
            .await?;

        Ok(events)
    }

    async fn create_event(&self, event: &NewEvent) -> AppResult<Event> {
        let result = sqlx::query(
            "INSERT INTO events (title, date, time_range, created_by, description, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.title)
        .bind(&event.date)
        .bind(&event.time_range)
        .bind(&event.created_by)
        .bind(&event.description)
        .bind(utc_now())
        .execute(&self.pool)
        .await?;

        let created = sqlx::query_as::<_, Event>(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?"))
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }
}
