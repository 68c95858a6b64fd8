use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Permission, Role};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::Session;
use crate::models::admin::{AdminIdentity, UpdateAdminRoleRequest};
use crate::routes::session::{audit_elevation, hints_from_request};

#[utoipa::path(
    get,
    path = "/api/admin/admins/{id}",
    tag = "Admins",
    params(("id" = Uuid, Path, description = "Admin ID")),
    responses(
        (status = 200, description = "Admin account", body = AdminIdentity),
        (status = 403, description = "Missing canAccessUsersAdmins"),
        (status = 404, description = "Admin not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_admin(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<AdminIdentity>> {
    let hints = hints_from_request(&headers, &session);
    let resolved = state
        .resolver
        .authorize(&hints, Permission::AccessUsersAdmins)
        .await?;
    audit_elevation(&state, &headers, &session, &resolved);

    let admin = state
        .store
        .find_admin(id)
        .await?
        .ok_or_else(|| AppError::not_found("admin not found"))?;

    Ok(Json(admin))
}

#[utoipa::path(
    put,
    path = "/api/admin/admins/{id}/role",
    tag = "Admins",
    params(("id" = Uuid, Path, description = "Admin ID")),
    request_body = UpdateAdminRoleRequest,
    responses(
        (status = 200, description = "Role reassigned", body = AdminIdentity),
        (status = 400, description = "Invalid role"),
        (status = 403, description = "Caller is not super_admin"),
        (status = 404, description = "Admin not found"),
        (status = 409, description = "Would demote the last super_admin"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_admin_role(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAdminRoleRequest>,
) -> AppResult<Json<AdminIdentity>> {
    let role = req
        .role
        .parse::<Role>()
        .map_err(|e| AppError::bad_request(e.to_string()))?;

    let hints = hints_from_request(&headers, &session);
    let resolved = state.resolver.revalidate(&hints).await;
    if resolved.is_degraded() || !resolved.is_super_admin() {
        tracing::warn!(
            admin_id = %session.admin_id,
            resolved_role = %resolved.role,
            target = %id,
            "role reassignment refused"
        );
        return Err(AppError::forbidden("only super_admin can reassign roles"));
    }
    audit_elevation(&state, &headers, &session, &resolved);

    let before = state.store.find_admin(id).await?;
    let updated = state.store.set_admin_role(id, role).await?;

    tracing::info!(target = %id, role = %role, by = %session.admin_id, "admin role reassigned");
    log_activity_with_context(
        &state.event_bus,
        "role_changed",
        Some(session.admin_id.to_string()),
        &updated,
        before.as_ref(),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(updated))
}
