#![allow(dead_code)]

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`

use gate33_rbac::authz::{RecoveryConfig, ResolverConfig, Role};
use gate33_rbac::events::{init_event_bus, start_activity_listener};
use gate33_rbac::jwt::JwtConfig;
use gate33_rbac::models::admin::AdminIdentity;
use gate33_rbac::{router, AppState};

pub const JWT_SECRET: &str = "test-secret";

pub struct TestApp {
    // kept alive so the database file outlives the test
    _dir: TempDir,
    pub pool: SqlitePool,
    pub state: AppState,
}

impl TestApp {
    pub fn app(&self) -> Router {
        router(self.state.clone())
    }

    pub async fn send(&self, req: Request<Body>) -> Result<Response> {
        Ok(self.app().oneshot(req).await?)
    }

    pub async fn admin(&self, name: &str, role: Role) -> Result<AdminIdentity> {
        Ok(self.state.store.create_admin(name, None, role).await?)
    }

    pub fn token_for(&self, admin: &AdminIdentity) -> Result<String> {
        Ok(self.state.jwt.encode(admin.id, admin.role)?)
    }

    /// Cookie header of a logged-in browser session for `admin`.
    pub fn session_cookie(&self, admin: &AdminIdentity) -> Result<String> {
        Ok(format!("isAuthenticated=true; adminToken={}", self.token_for(admin)?))
    }
}

pub async fn setup() -> Result<TestApp> {
    setup_with(RecoveryConfig::disabled(), false).await
}

/// Builds a migrated database and app state; with `audit` the activity
/// listener is spawned against the same pool.
pub async fn setup_with(recovery: RecoveryConfig, audit: bool) -> Result<TestApp> {
    let dir = tempdir()?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    // run migrations
    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    let (event_bus, rx) = init_event_bus();
    if audit {
        tokio::spawn(start_activity_listener(rx, pool.clone()));
    }

    let state = AppState::new(
        pool.clone(),
        JwtConfig::new(JWT_SECRET, 1),
        ResolverConfig::default(),
        recovery,
        event_bus,
    );

    Ok(TestApp { _dir: dir, pool, state })
}

pub async fn json_body(resp: Response) -> Result<Value> {
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn get(uri: &str) -> Result<Request<Body>> {
    Ok(Request::builder().method("GET").uri(uri).body(Body::empty())?)
}

pub fn post_json(uri: &str, body: &Value) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))?)
}

pub fn location(resp: &Response) -> Option<String> {
    resp.headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
