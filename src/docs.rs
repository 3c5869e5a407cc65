use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::auth::telegram_login,
		routes::auth::me,
		routes::users::list_users,
		routes::users::search_users,
		routes::users::update_user,
		routes::projects::list_projects,
		routes::projects::get_project,
		routes::projects::create_project,
		routes::projects::update_status,
		routes::projects::add_member,
		routes::projects::update_member_role,
		routes::projects::remove_member,
		routes::tasks::list_tasks,
		routes::tasks::get_task,
		routes::tasks::create_task,
		routes::tasks::update_task,
		routes::tasks::delete_task,
		routes::tasks::submit_completion,
		routes::tasks::review_completion,
		routes::dashboard::dashboard,
		routes::events::list_events,
		routes::health::health
	),
	components(
		schemas(
			models::user::UserProfile,
			models::user::AuthResponse,
			models::user::TelegramLoginRequest,
			models::user::UserUpdateRequest,
			models::project::Project,
			models::project::ProjectMember,
			models::project::ProjectCreateRequest,
			models::project::ProjectStatusRequest,
			models::project::MemberCreateRequest,
			models::project::MemberRoleRequest,
			models::task::Task,
			models::task::TaskStatus,
			models::task::TaskCreateRequest,
			models::task::TaskUpdateRequest,
			models::task::CompletionRequest,
			models::task::ReviewRequest,
			models::dashboard::Dashboard,
			models::dashboard::DashboardTask,
			models::event::Event,
			routes::health::HealthResponse
		)
	),
	tags(
		(name = "Auth", description = "Telegram login and session"),
		(name = "Users", description = "User directory"),
		(name = "Projects", description = "Projects"),
		(name = "Members", description = "Project membership"),
		(name = "Tasks", description = "Task lifecycle"),
		(name = "Dashboard", description = "Per-user overview"),
		(name = "Events", description = "Team calendar"),
		(name = "Health", description = "Service health")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	ensure_security_components(&mut doc);
	ensure_global_security(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc = Arc::new(doc);
	let json_route = get(move || {
		let doc = Arc::clone(&doc);
		async move { Json((*doc).clone()) }
	});

	Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config))
}

fn object_entry<'a>(target: &'a mut Value, key: &str) -> Option<&'a mut Map<String, Value>> {
	target
		.as_object_mut()?
		.entry(key)
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
}

fn ensure_security_components(doc: &mut Value) {
	let Some(components) = object_entry(doc, "components") else {
		return;
	};
	let schemes = components
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()));

	if let Some(schemes) = schemes.as_object_mut() {
		schemes.insert(
			"bearerAuth".to_string(),
			json!({
				"type": "http",
				"scheme": "bearer",
				"bearerFormat": "JWT"
			}),
		);
	}
}

fn ensure_global_security(doc: &mut Value) {
	if let Some(root) = doc.as_object_mut() {
		root.entry("security")
			.or_insert_with(|| json!([{ "bearerAuth": [] }]));
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{port}");

	match doc.get_mut("servers") {
		Some(Value::Array(servers)) => {
			let present = servers
				.iter()
				.any(|server| server.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !present {
				servers.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}
