use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::app::AppState;
use crate::authz::guard_member_role;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::project::{
    normalize_username, MemberCreateRequest, MemberRoleRequest, Project, ProjectCreateRequest, ProjectMember,
    ProjectStatusRequest,
};
use crate::store::{ProjectStore, UserStore};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ProjectListQuery {
    /// Only projects that list this username as a member.
    pub username: Option<String>,
}

#[utoipa::path(
    get,
    path = "/projects",
    tag = "Projects",
    params(ProjectListQuery),
    responses((status = 200, description = "List projects", body = [Project]))
)]
pub async fn list_projects(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ProjectListQuery>,
) -> AppResult<Json<Vec<Project>>> {
    let mut projects = state.stores.projects.list_projects().await?;

    if let Some(username) = query.username.as_deref().filter(|name| !name.trim().is_empty()) {
        projects.retain(|project| project.has_member(username));
    }

    Ok(Json(projects))
}

#[utoipa::path(
    get,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = i64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project detail", body = Project),
        (status = 404, description = "Project not found")
    )
)]
pub async fn get_project(State(state): State<AppState>, _auth: AuthUser, Path(id): Path<i64>) -> AppResult<Json<Project>> {
    let project = fetch_project(&state, id).await?;
    Ok(Json(project))
}

#[utoipa::path(
    post,
    path = "/projects",
    tag = "Projects",
    request_body = ProjectCreateRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 403, description = "Administrator role required")
    )
)]
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ProjectCreateRequest>,
) -> AppResult<(StatusCode, Json<Project>)> {
    state.policy.ensure_admin(&auth).await?;

    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::validation("title is required"));
    }

    let mut members: Vec<ProjectMember> = Vec::with_capacity(payload.members.len());
    for member in payload.members {
        let member = prepare_member(member.username, member.full_name, &member.role, member.telegram_id)?;
        if members
            .iter()
            .any(|existing| normalize_username(&existing.username) == normalize_username(&member.username))
        {
            return Err(AppError::conflict(format!("duplicate member {}", member.username)));
        }
        members.push(member);
    }

    let project = state
        .stores
        .projects
        .create_project(title, payload.description.trim(), &members)
        .await?;
    tracing::info!(project_id = project.id, subject_id = auth.subject_id, "project created");

    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    put,
    path = "/projects/{id}/status",
    tag = "Projects",
    params(("id" = i64, Path, description = "Project id")),
    request_body = ProjectStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = Project),
        (status = 403, description = "Not allowed to manage this project")
    )
)]
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<ProjectStatusRequest>,
) -> AppResult<Json<Project>> {
    let status = payload.status.trim();
    if status.is_empty() {
        return Err(AppError::validation("status is required"));
    }

    state.policy.ensure_manage_project_tasks(id, &auth).await?;
    let project = state.stores.projects.set_status(id, status).await?;
    tracing::info!(project_id = id, status, subject_id = auth.subject_id, "project status set");

    Ok(Json(project))
}

#[utoipa::path(
    post,
    path = "/projects/{id}/members",
    tag = "Members",
    params(("id" = i64, Path, description = "Project id")),
    request_body = MemberCreateRequest,
    responses(
        (status = 201, description = "Member added", body = Project),
        (status = 400, description = "Missing username or invalid role"),
        (status = 409, description = "Member already present or concurrent edit")
    )
)]
pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<MemberCreateRequest>,
) -> AppResult<(StatusCode, Json<Project>)> {
    state.policy.ensure_admin(&auth).await?;

    let mut member = prepare_member(payload.username, payload.full_name, &payload.role, payload.telegram_id)?;
    let project = fetch_project(&state, id).await?;
    if project.has_member(&member.username) {
        return Err(AppError::conflict(format!("{} is already a member", member.username)));
    }

    if let Some(user) = state.stores.users.user_by_username(&member.username).await? {
        if member.full_name.is_empty() {
            member.full_name = user.display_name();
        }
        member.telegram_id = member.telegram_id.or(Some(user.telegram_id));
    }

    let mut members = project.members;
    members.push(member);
    let project = state.stores.projects.replace_members(id, project.version, &members).await?;
    tracing::info!(project_id = id, subject_id = auth.subject_id, "project member added");

    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    put,
    path = "/projects/{id}/members/{username}",
    tag = "Members",
    params(
        ("id" = i64, Path, description = "Project id"),
        ("username" = String, Path, description = "Member username")
    ),
    request_body = MemberRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = Project),
        (status = 404, description = "Project or member not found")
    )
)]
pub async fn update_member_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, username)): Path<(i64, String)>,
    Json(payload): Json<MemberRoleRequest>,
) -> AppResult<Json<Project>> {
    state.policy.ensure_admin(&auth).await?;

    let role = guard_member_role(&payload.role)?;
    let project = fetch_project(&state, id).await?;
    let index = member_index(&project, &username)?;

    let mut members = project.members;
    members[index].role = role;
    let project = state.stores.projects.replace_members(id, project.version, &members).await?;
    tracing::info!(project_id = id, member = %username, subject_id = auth.subject_id, "member role changed");

    Ok(Json(project))
}

#[utoipa::path(
    delete,
    path = "/projects/{id}/members/{username}",
    tag = "Members",
    params(
        ("id" = i64, Path, description = "Project id"),
        ("username" = String, Path, description = "Member username")
    ),
    responses(
        (status = 200, description = "Member removed", body = Project),
        (status = 404, description = "Project or member not found")
    )
)]
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, username)): Path<(i64, String)>,
) -> AppResult<Json<Project>> {
    state.policy.ensure_admin(&auth).await?;

    let project = fetch_project(&state, id).await?;
    let index = member_index(&project, &username)?;

    let mut members = project.members;
    members.remove(index);
    let project = state.stores.projects.replace_members(id, project.version, &members).await?;
    tracing::info!(project_id = id, member = %username, subject_id = auth.subject_id, "project member removed");

    Ok(Json(project))
}

async fn fetch_project(state: &AppState, id: i64) -> AppResult<Project> {
    state
        .stores
        .projects
        .project_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("project not found"))
}

fn member_index(project: &Project, username: &str) -> AppResult<usize> {
    let wanted = normalize_username(username);
    project
        .members
        .iter()
        .position(|member| normalize_username(&member.username) == wanted)
        .ok_or_else(|| AppError::not_found("member not found"))
}

/// Member entry as it is written: username without `@`, role through the guard.
fn prepare_member(username: String, full_name: String, role: &str, telegram_id: Option<i64>) -> AppResult<ProjectMember> {
    let username = username.trim();
    let username = username.strip_prefix('@').unwrap_or(username).to_string();
    if username.is_empty() {
        return Err(AppError::validation("username is required"));
    }

    Ok(ProjectMember {
        username,
        full_name: full_name.trim().to_string(),
        role: guard_member_role(role)?,
        telegram_id: telegram_id.filter(|id| *id != 0),
    })
}
