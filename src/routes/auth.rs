use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::user::{AuthResponse, TelegramLoginRequest, UserProfile};
use crate::store::UserStore;
use crate::telegram::verify_login;

#[utoipa::path(
    post,
    path = "/auth/telegram",
    tag = "Auth",
    request_body = TelegramLoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Missing id or hash"),
        (status = 401, description = "Signature mismatch"),
        (status = 404, description = "User is not registered")
    ),
    security(())
)]
pub async fn telegram_login(
    State(state): State<AppState>,
    Json(payload): Json<TelegramLoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    if payload.id == 0 || payload.hash.trim().is_empty() {
        return Err(AppError::validation("id and hash are required"));
    }

    verify_login(&payload.signed_fields(), &state.config.bot_token).map_err(|err| {
        tracing::warn!(telegram_id = payload.id, "telegram login rejected");
        err
    })?;

    let stored = state
        .stores
        .users
        .user_by_telegram_id(payload.id)
        .await?
        .ok_or_else(|| AppError::not_found("user is not registered"))?;

    let profile = merge_login_profile(stored, &payload);
    let jwt = state.tokens.issue(profile.telegram_id, &profile.role)?;

    tracing::info!(telegram_id = profile.telegram_id, "telegram login");

    Ok(Json(AuthResponse { jwt, profile }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current user", body = UserProfile))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<UserProfile>> {
    let user = state
        .stores
        .users
        .user_by_telegram_id(auth.subject_id)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    Ok(Json(user))
}

/// Widget data wins for names, username and photo; directory data wins for
/// everything else. A missing full name is derived from the widget names.
fn merge_login_profile(stored: UserProfile, login: &TelegramLoginRequest) -> UserProfile {
    let pick = |fresh: &str, current: String| if fresh.is_empty() { current } else { fresh.to_string() };

    let full_name = if stored.full_name.is_empty() {
        format!("{} {}", login.first_name, login.last_name).trim().to_string()
    } else {
        stored.full_name
    };

    UserProfile {
        telegram_id: stored.telegram_id,
        first_name: pick(&login.first_name, stored.first_name),
        last_name: pick(&login.last_name, stored.last_name),
        username: pick(&login.username, stored.username),
        photo_url: login.photo_url.clone(),
        full_name,
        date_of_birthday: stored.date_of_birthday,
        phone_number: stored.phone_number,
        role: stored.role,
        may_to_open: stored.may_to_open,
    }
}
