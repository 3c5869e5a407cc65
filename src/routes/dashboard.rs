use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::app::AppState;
use crate::authz::{find_member, MemberKey};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::dashboard::{Dashboard, DashboardTask};
use crate::store::{EventStore, ProjectStore, TaskStore, UserStore};

#[derive(Debug, Deserialize, IntoParams)]
pub struct DashboardQuery {
    /// Defaults to the caller's own username.
    pub username: Option<String>,
}

#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "Dashboard",
    params(DashboardQuery),
    responses((status = 200, description = "Projects and open tasks of a user, plus team events", body = Dashboard))
)]
pub async fn dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<DashboardQuery>,
) -> AppResult<Json<Dashboard>> {
    let subject = match query.username.as_deref().map(str::trim).filter(|name| !name.is_empty()) {
        Some(username) => state.stores.users.user_by_username(username).await?,
        None => state.stores.users.user_by_telegram_id(auth.subject_id).await?,
    };

    let username = match (&subject, query.username.as_deref()) {
        (Some(user), _) => user.username.clone(),
        (None, Some(username)) if !username.trim().is_empty() => username.trim().to_string(),
        _ => return Err(AppError::not_found("user not found")),
    };
    let telegram_id = subject.as_ref().map(|user| user.telegram_id);

    let key = MemberKey {
        telegram_id,
        username: Some(username.as_str()),
    };
    let all_projects = state.stores.projects.list_projects().await?;
    let titles: HashMap<i64, String> = all_projects
        .iter()
        .map(|project| (project.id, project.title.clone()))
        .collect();
    let projects = all_projects
        .into_iter()
        .filter(|project| find_member(project, key).is_some())
        .collect();

    let tasks = state
        .stores
        .tasks
        .open_tasks_for_assignee(&username, telegram_id)
        .await?
        .into_iter()
        .map(|task| DashboardTask {
            project_title: titles.get(&task.project_id).cloned().unwrap_or_default(),
            task,
        })
        .collect();

    let events = state.stores.events.list_events().await?;

    Ok(Json(Dashboard { projects, tasks, events }))
}
