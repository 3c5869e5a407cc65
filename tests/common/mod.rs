#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use taskgram::config::AppConfig;
use taskgram::models::user::UserProfile;
use taskgram::store::{SqliteStore, UserStore};
use taskgram::telegram::login::sign_fields;
use taskgram::telegram::{Notifier, NotifyError};
use taskgram::{router, AppState};

pub const JWT_SECRET: &str = "test-secret";
pub const BOT_TOKEN: &str = "BOTSECRET";

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(&self, recipient_id: i64, text: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((recipient_id, text.to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: SqliteStore,
    pub notifier: Arc<RecordingNotifier>,
    _dir: TempDir,
}

pub async fn migrated_pool(dir: &TempDir) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        .await?;
    migrator.run(&pool).await?;
    Ok(pool)
}

pub async fn spawn_app() -> Result<TestApp> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let pool = migrated_pool(&dir).await?;

    let notifier = Arc::new(RecordingNotifier::default());
    let state = AppState::new(pool.clone(), AppConfig::for_tests(JWT_SECRET, BOT_TOKEN), notifier.clone());

    Ok(TestApp {
        app: router(state.clone()),
        state,
        store: SqliteStore::new(pool),
        notifier,
        _dir: dir,
    })
}

impl TestApp {
    pub async fn seed_user(&self, telegram_id: i64, username: &str, full_name: &str, role: &str) -> Result<UserProfile> {
        let user = self
            .store
            .upsert_user(&UserProfile {
                telegram_id,
                first_name: String::new(),
                last_name: String::new(),
                username: username.to_string(),
                photo_url: String::new(),
                full_name: full_name.to_string(),
                date_of_birthday: String::new(),
                phone_number: String::new(),
                role: role.to_string(),
                may_to_open: false,
            })
            .await?;
        Ok(user)
    }

    pub fn token_for(&self, telegram_id: i64, role: &str) -> Result<String> {
        Ok(self.state.tokens.issue(telegram_id, role)?)
    }

    /// Sends a request and returns the status with the decoded JSON body (`Null` when empty).
    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, payload: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let req = match payload {
            Some(payload) => builder
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .with_context(|| format!("non-json body: {}", String::from_utf8_lossy(&bytes)))?
        };
        Ok((status, value))
    }

    pub fn sent_to(&self) -> Vec<i64> {
        self.notifier.sent.lock().unwrap().iter().map(|(to, _)| *to).collect()
    }
}

/// Login widget payload signed with [`BOT_TOKEN`].
pub fn signed_login(id: i64, first_name: &str, username: &str, auth_date: i64) -> Result<Value> {
    let mut fields = BTreeMap::new();
    fields.insert("id".to_string(), id.to_string());
    fields.insert("first_name".to_string(), first_name.to_string());
    fields.insert("auth_date".to_string(), auth_date.to_string());
    if !username.is_empty() {
        fields.insert("username".to_string(), username.to_string());
    }
    let hash = sign_fields(&fields, BOT_TOKEN)?;

    Ok(serde_json::json!({
        "id": id,
        "first_name": first_name,
        "username": username,
        "auth_date": auth_date,
        "hash": hash,
    }))
}
