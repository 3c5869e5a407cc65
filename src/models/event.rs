use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow, ToSchema)]
pub struct Event {
    pub id: i64,
    #[schema(example = "Planning")]
    pub title: String,
    #[schema(example = "01.10.2025")]
    pub date: String,
    #[schema(example = "10:00-11:00")]
    pub time_range: String,
    pub created_by: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    pub title: String,
    pub date: String,
    pub time_range: String,
    pub created_by: String,
    pub description: String,
}
