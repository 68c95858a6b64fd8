use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{authz, models, routes};

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::role_permissions::get_role_permissions,
		routes::role_permissions::save_role_permissions,
		routes::session::session_permissions,
		routes::admins::get_admin,
		routes::admins::update_admin_role
	),
	components(
		schemas(
			authz::Role,
			models::admin::AdminIdentity,
			models::admin::UpdateAdminRoleRequest,
			models::role_permission::SaveRolePermissionsRequest,
			models::role_permission::RolePermissionsResponse,
			models::role_permission::SaveRolePermissionsResponse,
			routes::session::SessionPermissionsResponse,
			routes::health::HealthResponse
		)
	),
	tags(
		(name = "Role permissions", description = "Per-role permission overrides"),
		(name = "Session", description = "Permission resolution for the current session"),
		(name = "Admins", description = "Admin directory"),
		(name = "Health", description = "Service health")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	ensure_security_components(&mut doc);
	add_examples(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn ensure_security_components(doc: &mut Value) {
	let Some(root) = doc.as_object_mut() else {
		return;
	};

	let components = root.entry("components").or_insert_with(|| json!({}));
	if let Some(components) = components.as_object_mut() {
		let schemes = components.entry("securitySchemes").or_insert_with(|| json!({}));
		if let Some(schemes) = schemes.as_object_mut() {
			schemes.insert(
				"bearerAuth".to_string(),
				json!({ "type": "http", "scheme": "bearer", "bearerFormat": "JWT" }),
			);
		}
	}
}

fn add_examples(doc: &mut Value) {
	let Some(app_json) = doc.pointer_mut(
		"/paths/~1api~1role-permissions/post/requestBody/content/application~1json",
	) else {
		return;
	};

	let permissions: serde_json::Map<String, Value> = authz::defaults(authz::Role::Support)
		.to_json_map();

	if let Some(app_json) = app_json.as_object_mut() {
		app_json.insert(
			"example".to_string(),
			json!({
				"role": "support",
				"permissions": permissions,
				"adminRole": "super_admin",
				"expectedVersion": 0
			}),
		);
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}
