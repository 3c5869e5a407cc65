use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::AccessPolicy;
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::jwt::SessionTokens;
use crate::routes::{auth, dashboard, events, health, projects, tasks, users};
use crate::store::Stores;
use crate::telegram::{LogNotifier, Notifier, TelegramNotifier};
use crate::workflow::TaskWorkflow;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<AppConfig>,
    pub tokens: Arc<SessionTokens>,
    pub stores: Stores,
    pub policy: AccessPolicy,
    pub workflow: TaskWorkflow,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: AppConfig, notifier: Arc<dyn Notifier>) -> Self {
        let stores = Stores::sqlite(pool.clone());
        let policy = AccessPolicy::new(&stores);
        let workflow = TaskWorkflow::new(stores.clone(), policy.clone(), notifier);
        let tokens = SessionTokens::new(&config.jwt_secret, config.token_ttl);

        Self {
            pool,
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            stores,
            policy,
            workflow,
        }
    }

    /// Delivers through the Bot API when a bot token is configured, otherwise only logs.
    pub fn with_default_notifier(pool: SqlitePool, config: AppConfig) -> Result<Self, AppError> {
        let notifier: Arc<dyn Notifier> = if config.bot_token.is_empty() {
            Arc::new(LogNotifier)
        } else {
            let telegram = TelegramNotifier::new(&config.telegram_api_base, &config.bot_token, config.notify_timeout)
                .map_err(|err| AppError::configuration(format!("failed to build telegram client: {err}")))?;
            Arc::new(telegram)
        };

        Ok(Self::new(pool, config, notifier))
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let config = AppConfig::from_env()?;
    let state = AppState::with_default_notifier(pool, config)?;
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/telegram", post(auth::telegram_login))
        .route("/me", get(auth::me));

    let user_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/search", get(users::search_users))
        .route("/:telegram_id", put(users::update_user));

    let project_routes = Router::new()
        .route("/", get(projects::list_projects).post(projects::create_project))
        .route("/:id", get(projects::get_project))
        .route("/:id/status", put(projects::update_status))
        .route("/:id/members", post(projects::add_member))
        .route(
            "/:id/members/:username",
            put(projects::update_member_role).delete(projects::remove_member),
        );

    let task_routes = Router::new()
        .route("/", get(tasks::list_tasks).post(tasks::create_task))
        .route("/:id", get(tasks::get_task).put(tasks::update_task).delete(tasks::delete_task))
        .route("/:id/complete", post(tasks::submit_completion))
        .route("/:id/review", post(tasks::review_completion));

    Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/projects", project_routes)
        .nest("/tasks", task_routes)
        .route("/dashboard", get(dashboard::dashboard))
        .route("/events", get(events::list_events))
        .route("/api/health", get(health::health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
