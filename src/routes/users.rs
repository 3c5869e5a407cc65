use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::app::AppState;
use crate::authz::roles::invalid_role_combination;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::user::{UserProfile, UserUpdateRequest};
use crate::store::UserStore;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Substring of the full name, case-insensitive.
    #[serde(default)]
    pub term: String,
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    responses((status = 200, description = "User directory", body = [UserProfile]))
)]
pub async fn list_users(State(state): State<AppState>, _auth: AuthUser) -> AppResult<Json<Vec<UserProfile>>> {
    let users = state.stores.users.list_users().await?;
    Ok(Json(users))
}

#[utoipa::path(
    get,
    path = "/users/search",
    tag = "Users",
    params(SearchQuery),
    responses((status = 200, description = "Users whose full name matches", body = [UserProfile]))
)]
pub async fn search_users(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<UserProfile>>> {
    if query.term.trim().is_empty() {
        return Err(AppError::validation("term is required"));
    }

    let users = state.stores.users.search_users(&query.term).await?;
    Ok(Json(users))
}

#[utoipa::path(
    put,
    path = "/users/{telegram_id}",
    tag = "Users",
    params(("telegram_id" = i64, Path, description = "Telegram id")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "User updated", body = UserProfile),
        (status = 400, description = "Invalid role combination"),
        (status = 403, description = "Administrator role required")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(telegram_id): Path<i64>,
    Json(mut payload): Json<UserUpdateRequest>,
) -> AppResult<Json<UserProfile>> {
    state.policy.ensure_admin(&auth).await?;

    if invalid_role_combination(&payload.role) {
        return Err(AppError::validation("developer role cannot be combined with an administrator role"));
    }

    let username = payload.username.trim();
    payload.username = username.strip_prefix('@').unwrap_or(username).to_string();
    payload.role = payload.role.trim().to_string();

    let user = state.stores.users.update_user(telegram_id, &payload).await?;
    tracing::info!(telegram_id, subject_id = auth.subject_id, "user profile updated");

    Ok(Json(user))
}
