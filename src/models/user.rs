use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub telegram_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub photo_url: String,
    pub full_name: String,
    pub date_of_birthday: String,
    pub phone_number: String,
    pub role: String,
    pub may_to_open: bool,
}

impl UserProfile {
    /// Name shown to other users: full name, then "first last", then username.
    pub fn display_name(&self) -> String {
        if !self.full_name.trim().is_empty() {
            return self.full_name.trim().to_string();
        }
        let joined = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let joined = joined.trim();
        if !joined.is_empty() {
            return joined.to_string();
        }
        self.username.clone()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub telegram_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub photo_url: String,
    pub full_name: String,
    pub date_of_birthday: String,
    pub phone_number: String,
    pub role: String,
    pub may_to_open: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbUser> for UserProfile {
    type Error = AppError;

    fn try_from(value: DbUser) -> Result<Self, Self::Error> {
        Ok(UserProfile {
            telegram_id: value.telegram_id,
            first_name: value.first_name,
            last_name: value.last_name,
            username: value.username,
            photo_url: value.photo_url,
            full_name: value.full_name,
            date_of_birthday: value.date_of_birthday,
            phone_number: value.phone_number,
            role: value.role,
            may_to_open: value.may_to_open,
        })
    }
}

/// Payload produced by the Telegram login widget.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TelegramLoginRequest {
    #[serde(default)]
    #[schema(example = 123456789)]
    pub id: i64,
    #[serde(default)]
    #[schema(example = "Ada")]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    #[schema(example = "ada")]
    pub username: String,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    #[schema(example = 1700000000)]
    pub auth_date: i64,
    #[serde(default)]
    pub hash: String,
}

impl TelegramLoginRequest {
    /// Field map the widget signed, including `hash`. Optional fields are only
    /// present when the widget sent them.
    pub fn signed_fields(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("id".to_string(), self.id.to_string());
        fields.insert("first_name".to_string(), self.first_name.clone());
        fields.insert("auth_date".to_string(), self.auth_date.to_string());
        fields.insert("hash".to_string(), self.hash.clone());
        if !self.last_name.is_empty() {
            fields.insert("last_name".to_string(), self.last_name.clone());
        }
        if !self.username.is_empty() {
            fields.insert("username".to_string(), self.username.clone());
        }
        if !self.photo_url.is_empty() {
            fields.insert("photo_url".to_string(), self.photo_url.clone());
        }
        fields
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub jwt: String,
    pub profile: UserProfile,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UserUpdateRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    #[schema(example = "@ada")]
    pub username: String,
    #[serde(default)]
    pub date_of_birthday: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    #[schema(example = "Разработчик")]
    pub role: String,
    #[serde(default)]
    pub may_to_open: bool,
}
