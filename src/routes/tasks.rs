use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::task::{CompletionRequest, ReviewRequest, Task, TaskCreateRequest, TaskUpdateRequest};
use crate::store::TaskStore;

#[derive(Debug, Deserialize, IntoParams)]
pub struct TaskListQuery {
    pub id_project: i64,
}

#[utoipa::path(
    get,
    path = "/tasks",
    tag = "Tasks",
    params(TaskListQuery),
    responses((status = 200, description = "Tasks of a project", body = [Task]))
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<TaskListQuery>,
) -> AppResult<Json<Vec<Task>>> {
    let tasks = state.stores.tasks.tasks_by_project(query.id_project).await?;
    Ok(Json(tasks))
}

#[utoipa::path(
    get,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task detail", body = Task),
        (status = 404, description = "Task not found")
    )
)]
pub async fn get_task(State(state): State<AppState>, _auth: AuthUser, Path(id): Path<i64>) -> AppResult<Json<Task>> {
    let task = state
        .stores
        .tasks
        .task_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("task not found"))?;
    Ok(Json(task))
}

#[utoipa::path(
    post,
    path = "/tasks",
    tag = "Tasks",
    request_body = TaskCreateRequest,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 403, description = "Not allowed to manage tasks of this project")
    )
)]
pub async fn create_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<TaskCreateRequest>,
) -> AppResult<(StatusCode, Json<Task>)> {
    let task = state.workflow.create(&auth, payload).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    put,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(("id" = i64, Path, description = "Task id")),
    request_body = TaskUpdateRequest,
    responses((status = 200, description = "Task updated", body = Task))
)]
pub async fn update_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<TaskUpdateRequest>,
) -> AppResult<Json<Task>> {
    let task = state.workflow.update(&auth, id, payload).await?;
    Ok(Json(task))
}

#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(("id" = i64, Path, description = "Task id")),
    responses((status = 204, description = "Task deleted"))
)]
pub async fn delete_task(State(state): State<AppState>, auth: AuthUser, Path(id): Path<i64>) -> AppResult<StatusCode> {
    state.workflow.delete(&auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/tasks/{id}/complete",
    tag = "Tasks",
    params(("id" = i64, Path, description = "Task id")),
    request_body = CompletionRequest,
    responses((status = 200, description = "Completion submitted for review", body = Task))
)]
pub async fn submit_completion(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<CompletionRequest>,
) -> AppResult<Json<Task>> {
    let task = state.workflow.submit(&auth, id, &payload.message).await?;
    Ok(Json(task))
}

#[utoipa::path(
    post,
    path = "/tasks/{id}/review",
    tag = "Tasks",
    params(("id" = i64, Path, description = "Task id")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Review recorded", body = Task),
        (status = 409, description = "Task is not awaiting review")
    )
)]
pub async fn review_completion(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<ReviewRequest>,
) -> AppResult<Json<Task>> {
    let task = state.workflow.review(&auth, id, payload).await?;
    Ok(Json(task))
}
