//! Persistence traits consumed by the authorization engine and the task workflow.
//!
//! Handlers and policy code depend on these traits only; [`sqlite::SqliteStore`]
//! is the production backend.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::errors::AppResult;
use crate::models::event::{Event, NewEvent};
use crate::models::project::{Project, ProjectMember};
use crate::models::task::{NewTask, ReviewRecord, Task};
use crate::models::user::{UserProfile, UserUpdateRequest};

pub mod sqlite;

pub use sqlite::SqliteStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user_by_telegram_id(&self, telegram_id: i64) -> AppResult<Option<UserProfile>>;

    /// Lookup by normalized username (case-insensitive, leading `@` ignored).
    async fn user_by_username(&self, username: &str) -> AppResult<Option<UserProfile>>;

    async fn list_users(&self) -> AppResult<Vec<UserProfile>>;

    /// Case-insensitive substring match on the full name.
    async fn search_users(&self, term: &str) -> AppResult<Vec<UserProfile>>;

    async fn upsert_user(&self, user: &UserProfile) -> AppResult<UserProfile>;

    /// Overwrites the editable profile fields. `NotFound` when the user does not exist.
    async fn update_user(&self, telegram_id: i64, update: &UserUpdateRequest) -> AppResult<UserProfile>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn project_by_id(&self, id: i64) -> AppResult<Option<Project>>;

    async fn list_projects(&self) -> AppResult<Vec<Project>>;

    async fn create_project(&self, title: &str, description: &str, members: &[ProjectMember]) -> AppResult<Project>;

    /// Replaces the member list if the stored version still equals `expected_version`.
    /// A stale version yields `Conflict`, a missing project `NotFound`.
    async fn replace_members(&self, id: i64, expected_version: i64, members: &[ProjectMember]) -> AppResult<Project>;

    async fn set_status(&self, id: i64, status: &str) -> AppResult<Project>;

    /// Re-derives the project status from its tasks and returns the resulting status.
    async fn refresh_status(&self, id: i64) -> AppResult<String>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn task_by_id(&self, id: i64) -> AppResult<Option<Task>>;

    async fn tasks_by_project(&self, project_id: i64) -> AppResult<Vec<Task>>;

    /// Tasks assigned to the given user (by username or Telegram id) that are not yet approved.
    async fn open_tasks_for_assignee(&self, username: &str, telegram_id: Option<i64>) -> AppResult<Vec<Task>>;

    async fn create_task(&self, task: &NewTask) -> AppResult<Task>;

    /// Persists the editable fields of `task`.
    async fn update_task(&self, task: &Task) -> AppResult<Task>;

    /// Moves the task to `submitted` with the completion message and clears earlier review fields.
    async fn record_submission(&self, id: i64, message: &str) -> AppResult<Task>;

    /// Applies a review outcome. Only a task that is currently `submitted` can be
    /// reviewed; anything else yields `Conflict`.
    async fn record_review(&self, id: i64, review: &ReviewRecord) -> AppResult<Task>;

    async fn delete_task(&self, id: i64) -> AppResult<()>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Newest first.
    async fn list_events(&self) -> AppResult<Vec<Event>>;

    async fn create_event(&self, event: &NewEvent) -> AppResult<Event>;
}

/// Store handles shared by the engine, the workflow and the handlers.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub projects: Arc<dyn ProjectStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub events: Arc<dyn EventStore>,
}

impl Stores {
    pub fn sqlite(pool: SqlitePool) -> Self {
        Self::from_shared(Arc::new(SqliteStore::new(pool)))
    }

    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: UserStore + ProjectStore + TaskStore + EventStore + 'static,
    {
        Self {
            users: store.clone(),
            projects: store.clone(),
            tasks: store.clone(),
            events: store,
        }
    }
}
