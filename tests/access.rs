mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};

use common::{get, location, setup};
use gate33_rbac::authz::Role;
use gate33_rbac::jwt::JwtConfig;

const SESSION_PATH: &str = "/api/admin/session/permissions";

fn get_with_cookie(uri: &str, cookie: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method("GET")
        .uri(uri)
        .header("cookie", cookie)
        .body(Body::empty())?)
}

#[tokio::test]
async fn unauthenticated_requests_redirect_to_area_login() -> Result<()> {
    let t = setup().await?;

    let resp = t.send(get(SESSION_PATH)?).await?;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&resp).as_deref(),
        Some("/admin/login?redirect=%2Fapi%2Fadmin%2Fsession%2Fpermissions")
    );

    let resp = t.send(get("/support/tickets")?).await?;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp).as_deref(), Some("/support/login?redirect=%2Fsupport%2Ftickets"));

    Ok(())
}

#[tokio::test]
async fn public_and_unprotected_routes_pass_through() -> Result<()> {
    let t = setup().await?;

    // login pages are public; nothing is mounted there so the fallback answers
    let resp = t.send(get("/admin/login")?).await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = t.send(get("/api/health")?).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn authenticated_cookie_without_token_fails_closed() -> Result<()> {
    let t = setup().await?;

    let resp = t.send(get_with_cookie(SESSION_PATH, "isAuthenticated=true")?).await?;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);

    Ok(())
}

#[tokio::test]
async fn forged_or_garbled_tokens_are_refused() -> Result<()> {
    let t = setup().await?;
    let admin = t.admin("Ada", Role::SuperAdmin).await?;

    let forged = JwtConfig::new("some-other-secret", 1).encode(admin.id, Role::SuperAdmin)?;
    for token in [forged.as_str(), "not-a-jwt"] {
        let cookie = format!("isAuthenticated=true; adminToken={token}");
        let resp = t.send(get_with_cookie(SESSION_PATH, &cookie)?).await?;
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT, "token {token} was admitted");
    }

    Ok(())
}

#[tokio::test]
async fn token_without_authenticated_cookie_is_redirected() -> Result<()> {
    let t = setup().await?;
    let admin = t.admin("Ada", Role::SuperAdmin).await?;

    let req = Request::builder()
        .method("GET")
        .uri(SESSION_PATH)
        .header("authorization", format!("Bearer {}", t.token_for(&admin)?))
        .body(Body::empty())?;
    let resp = t.send(req).await?;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);

    Ok(())
}

#[tokio::test]
async fn verified_sessions_are_admitted() -> Result<()> {
    let t = setup().await?;
    let admin = t.admin("Ada", Role::Admin).await?;

    let resp = t.send(get_with_cookie(SESSION_PATH, &t.session_cookie(&admin)?)?).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    Ok(())
}
