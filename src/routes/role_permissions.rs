//! Permission store HTTP API
//!
//! `GET` resolves the effective permissions of one role; `POST` replaces a
//! role's override after checking the caller is a super admin. Writes are
//! recorded in the audit log with Critical severity.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;

use crate::app::AppState;
use crate::authz::{Role, SaveRolePermissions};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::Session;
use crate::models::role_permission::{
    RolePermissionsResponse, RoleQuery, SaveRolePermissionsRequest, SaveRolePermissionsResponse,
};

fn parse_role(raw: Option<&str>) -> AppResult<Role> {
    let raw = raw
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| AppError::bad_request("role is required"))?;
    raw.parse::<Role>()
        .map_err(|_| AppError::bad_request(format!("invalid role: {raw}")))
}

#[utoipa::path(
    get,
    path = "/api/role-permissions",
    tag = "Role permissions",
    params(RoleQuery),
    responses(
        (status = 200, description = "Effective permissions of the role", body = RolePermissionsResponse),
        (status = 400, description = "Missing or invalid role"),
        (status = 500, description = "Permission store unavailable"),
    )
)]
pub async fn get_role_permissions(
    State(state): State<AppState>,
    Query(query): Query<RoleQuery>,
) -> AppResult<Json<RolePermissionsResponse>> {
    let role = parse_role(query.role.as_deref())?;
    let current = state.store.get(role).await?;

    Ok(Json(RolePermissionsResponse {
        success: true,
        role,
        permissions: current.permissions,
        version: current.version,
    }))
}

#[utoipa::path(
    post,
    path = "/api/role-permissions",
    tag = "Role permissions",
    request_body = SaveRolePermissionsRequest,
    responses(
        (status = 200, description = "Override saved", body = SaveRolePermissionsResponse),
        (status = 400, description = "Invalid role or incomplete permission map"),
        (status = 403, description = "Caller is not super_admin, or target is super_admin"),
        (status = 409, description = "Override changed since expectedVersion"),
        (status = 500, description = "Permission store unavailable"),
    )
)]
pub async fn save_role_permissions(
    State(state): State<AppState>,
    session: Option<Session>,
    headers: HeaderMap,
    Json(req): Json<SaveRolePermissionsRequest>,
) -> AppResult<Json<SaveRolePermissionsResponse>> {
    let role = parse_role(Some(&req.role))?;

    let mut caller_role = req.admin_role.as_deref().and_then(|r| r.parse::<Role>().ok());
    // A verified session that is not super_admin outranks whatever the body claims
    if let Some(session) = &session {
        if !session.role.is_super_admin() {
            caller_role = Some(session.role);
        }
    }

    let updated_by = session
        .as_ref()
        .map(|s| s.admin_id.to_string())
        .or(req.updated_by);

    let before = if role.is_super_admin() {
        None
    } else {
        state.store.get(role).await.ok()
    };

    let saved = state
        .store
        .save(SaveRolePermissions {
            role,
            permissions: req.permissions,
            caller_role,
            expected_version: req.expected_version,
            updated_by: updated_by.clone(),
        })
        .await?;

    log_activity_with_context(
        &state.event_bus,
        "updated",
        updated_by,
        &saved,
        before.as_ref(),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(SaveRolePermissionsResponse {
        success: true,
        message: format!("permissions for {role} updated"),
        role,
        permissions: saved.permissions,
        version: saved.version,
    }))
}
