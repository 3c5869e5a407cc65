use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::event::Event;
use crate::store::EventStore;

#[utoipa::path(
    get,
    path = "/events",
    tag = "Events",
    responses((status = 200, description = "Team events, newest first", body = [Event]))
)]
pub async fn list_events(State(state): State<AppState>, _auth: AuthUser) -> AppResult<Json<Vec<Event>>> {
    let events = state.stores.events.list_events().await?;
    Ok(Json(events))
}
