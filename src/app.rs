use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::access::{self, AccessPolicy};
use crate::authz::{PermissionResolver, RecoveryConfig, ResolverConfig, RolePermissionStore};
use crate::errors::AppError;
use crate::events::EventBus;
use crate::jwt::{JwtConfig, TokenVerifier};
use crate::routes::{admins, health, role_permissions, session};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub store: RolePermissionStore,
    pub resolver: Arc<PermissionResolver<RolePermissionStore>>,
    pub access: Arc<AccessPolicy>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        jwt: JwtConfig,
        resolver_config: ResolverConfig,
        recovery: RecoveryConfig,
        event_bus: EventBus,
    ) -> Self {
        let store = RolePermissionStore::new(pool.clone());
        let resolver = PermissionResolver::new(store.clone(), resolver_config, recovery);
        let jwt = Arc::new(jwt);

        Self {
            pool,
            verifier: jwt.clone(),
            jwt,
            store,
            resolver: Arc::new(resolver),
            access: Arc::new(AccessPolicy::default()),
            event_bus,
        }
    }

    pub fn with_access_policy(mut self, policy: AccessPolicy) -> Self {
        self.access = Arc::new(policy);
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn from_env(pool: SqlitePool, event_bus: EventBus) -> Result<Self, AppError> {
        let state = Self::new(
            pool,
            JwtConfig::from_env()?,
            ResolverConfig::from_env()?,
            RecoveryConfig::from_env(),
            event_bus,
        )
        .with_access_policy(AccessPolicy::from_env());

        Ok(state)
    }
}

pub async fn create_app(pool: SqlitePool, event_bus: EventBus) -> Result<Router, AppError> {
    let state = AppState::from_env(pool, event_bus)?;
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let admin_routes = Router::new()
        .route("/session/permissions", get(session::session_permissions))
        .route("/admins/:id", get(admins::get_admin))
        .route("/admins/:id/role", put(admins::update_admin_role));

    Router::new()
        .route("/api/health", get(health::health))
        .route(
            "/api/role-permissions",
            get(role_permissions::get_role_permissions).post(role_permissions::save_role_permissions),
        )
        .nest("/api/admin", admin_routes)
        .fallback(health::not_found)
        .layer(axum::middleware::from_fn_with_state(state.clone(), access::require_session))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
