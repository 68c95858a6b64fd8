use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::access::cookie_value;
use crate::app::AppState;
use crate::authz::{PermissionSet, ResolvedPermissions, Role, RoleSource, SessionHints};
use crate::errors::AppResult;
use crate::events::{log_activity_with_context, Loggable, RequestContext, Severity};
use crate::jwt::Session;

pub const RECOVERY_HEADER: &str = "x-recovery-credential";

pub const ADMIN_ID_COOKIE: &str = "adminId";
pub const ADMIN_NAME_COOKIE: &str = "adminName";
pub const ROLE_COOKIE: &str = "userRole";
pub const ROLE_CACHED_AT_COOKIE: &str = "roleCachedAt";

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionQuery {
    /// Ignore the cached role hint and consult the admin directory
    #[serde(default)]
    pub revalidate: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionPermissionsResponse {
    pub role: Role,
    #[schema(value_type = Object)]
    pub permissions: PermissionSet,
    #[schema(value_type = String, example = "directory")]
    pub source: String,
    pub break_glass: bool,
    pub degraded: bool,
    pub error: Option<String>,
}

/// Audit record of a recovery-credential elevation.
#[derive(Debug, Serialize)]
pub struct Elevation {
    pub admin_id: Uuid,
    pub token_role: Role,
}

impl Loggable for Elevation {
    fn entity_type() -> &'static str { "session" }
    fn subject_id(&self) -> String { self.admin_id.to_string() }
    fn severity(&self) -> Severity { Severity::Critical }
}

/// Collects resolver hints from cookies and headers.
///
/// The admin id is always the verified token subject; an `adminId` cookie
/// naming someone else is ignored.
pub fn hints_from_request(headers: &HeaderMap, session: &Session) -> SessionHints {
    let admin_id = session.admin_id;
    if let Some(raw) = cookie_value(headers, ADMIN_ID_COOKIE) {
        if Uuid::parse_str(&raw).ok() != Some(admin_id) {
            tracing::warn!(
                admin_id = %admin_id,
                cookie_admin_id = %raw,
                "adminId cookie does not match session token, ignoring it"
            );
        }
    }

    let role_cached_at = cookie_value(headers, ROLE_CACHED_AT_COOKIE)
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|dt| dt.with_timezone(&Utc));

    SessionHints {
        admin_id: Some(admin_id),
        display_name: cookie_value(headers, ADMIN_NAME_COOKIE),
        role: cookie_value(headers, ROLE_COOKIE),
        role_cached_at,
        recovery_credential: headers
            .get(RECOVERY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}

/// Emits the audit event for a break-glass resolution.
pub fn audit_elevation(state: &AppState, headers: &HeaderMap, session: &Session, resolved: &ResolvedPermissions) {
    if !resolved.break_glass {
        return;
    }
    let elevation = Elevation {
        admin_id: session.admin_id,
        token_role: session.role,
    };
    log_activity_with_context(
        &state.event_bus,
        "elevated",
        Some(session.admin_id.to_string()),
        &elevation,
        None,
        Some(RequestContext::from_headers(headers)),
    );
}

fn source_name(source: RoleSource) -> &'static str {
    match source {
        RoleSource::Recovery => "recovery",
        RoleSource::Cache => "cache",
        RoleSource::Directory => "directory",
        RoleSource::Fallback => "fallback",
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/session/permissions",
    tag = "Session",
    params(SessionQuery),
    responses(
        (status = 200, description = "Resolved role and permissions of the session", body = SessionPermissionsResponse),
        (status = 307, description = "No verified session, redirected to login"),
    )
)]
pub async fn session_permissions(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Query(query): Query<SessionQuery>,
) -> AppResult<Json<SessionPermissionsResponse>> {
    let hints = hints_from_request(&headers, &session);

    let resolved = if query.revalidate {
        state.resolver.revalidate(&hints).await
    } else {
        state.resolver.resolve(&hints).await
    };
    audit_elevation(&state, &headers, &session, &resolved);

    Ok(Json(SessionPermissionsResponse {
        role: resolved.role,
        permissions: resolved.permissions,
        source: source_name(resolved.source).to_string(),
        break_glass: resolved.break_glass,
        degraded: resolved.is_degraded(),
        error: resolved.error,
    }))
}
