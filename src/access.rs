//! Access middleware
//!
//! Coarse gate in front of the admin and support areas. Runs before any
//! handler and independently of the permission resolver: handlers still check
//! individual permissions after a request is admitted.
//!
//! A request to a protected area needs the `isAuthenticated` cookie and a
//! verified session token with a valid role claim. Every failure, including a
//! verification failure, redirects to the area's login page.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use crate::app::AppState;
use crate::jwt::{token_from_parts, TokenError};

pub const AUTHENTICATED_COOKIE: &str = "isAuthenticated";
pub const SESSION_TOKEN_COOKIE: &str = "adminToken";

/// A path prefix and the login page its unauthenticated requests go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedArea {
    pub prefix: String,
    pub login_path: String,
}

impl ProtectedArea {
    pub fn new(prefix: impl Into<String>, login_path: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            login_path: login_path.into(),
        }
    }

    /// Segment-aware: `/admin` covers `/admin` and `/admin/x`, not `/administrator`.
    pub fn covers(&self, path: &str) -> bool {
        path_has_prefix(path, &self.prefix)
    }
}

#[derive(Debug, Clone)]
pub struct AccessPolicy {
    pub areas: Vec<ProtectedArea>,
    pub public_routes: Vec<String>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            areas: vec![
                ProtectedArea::new("/api/admin", "/admin/login"),
                ProtectedArea::new("/api/support", "/support/login"),
                ProtectedArea::new("/admin", "/admin/login"),
                ProtectedArea::new("/support", "/support/login"),
            ],
            public_routes: vec!["/admin/login".to_string(), "/support/login".to_string()],
        }
    }
}

impl AccessPolicy {
    pub fn from_env() -> Self {
        let mut policy = Self::default();
        if let Ok(routes) = std::env::var("ACCESS_PUBLIC_ROUTES") {
            policy.public_routes = routes
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect();
        }
        // `prefix=login_path` pairs, comma separated
        if let Ok(areas) = std::env::var("ACCESS_PROTECTED_AREAS") {
            let parsed: Vec<ProtectedArea> = areas
                .split(',')
                .filter_map(|pair| pair.split_once('='))
                .map(|(prefix, login)| ProtectedArea::new(prefix.trim(), login.trim()))
                .filter(|area| !area.prefix.is_empty() && !area.login_path.is_empty())
                .collect();
            if parsed.is_empty() {
                tracing::warn!("ACCESS_PROTECTED_AREAS has no valid entries, keeping defaults");
            } else {
                policy.areas = parsed;
            }
        }
        policy
    }

    /// The protected area for `path`, unless the path is public.
    pub fn area_for(&self, path: &str) -> Option<&ProtectedArea> {
        if self.public_routes.iter().any(|public| path_has_prefix(path, public)) {
            return None;
        }
        self.areas.iter().find(|area| area.covers(path))
    }
}

fn path_has_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
}

fn login_redirect(area: &ProtectedArea, path: &str) -> Response {
    Redirect::temporary(&format!("{}?redirect={}", area.login_path, urlencoding::encode(path))).into_response()
}

pub async fn require_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();

    let Some(area) = state.access.area_for(&path) else {
        return next.run(req).await;
    };

    let authenticated = cookie_value(req.headers(), AUTHENTICATED_COOKIE).as_deref() == Some("true");
    if !authenticated {
        tracing::debug!(path = %path, "no authenticated session cookie");
        return login_redirect(area, &path);
    }

    let Some(token) = token_from_parts(req.headers()) else {
        tracing::warn!(path = %path, "authenticated cookie without session token");
        return login_redirect(area, &path);
    };

    let verified = state.verifier.verify(&token);
    match verified {
        Ok(session) => {
            tracing::debug!(path = %path, admin_id = %session.admin_id, role = %session.role, "session admitted");
            req.extensions_mut().insert(session);
            next.run(req).await
        }
        Err(TokenError::Rejected(reason)) => {
            tracing::warn!(path = %path, reason = %reason, "session token rejected");
            login_redirect(area, &path)
        }
        Err(TokenError::Unavailable(reason)) => {
            tracing::error!(
                event = "verification_unavailable",
                path = %path,
                reason = %reason,
                "session verification unavailable, denying request"
            );
            login_redirect(area, &path)
        }
    }
}
