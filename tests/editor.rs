mod common;

use anyhow::{Context, Result};

use common::{setup, TestApp};
use gate33_rbac::authz::{Permission, Role};
use gate33_rbac::editor::{
    EditorState, HttpRolePermissionsClient, PermissionEditor, RolePermissionsClient, SaveStatus,
};

/// Serves the router on an ephemeral local port and returns its base URL.
async fn serve(t: &TestApp) -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = t.app();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service()).await;
    });
    Ok(format!("http://{addr}"))
}

#[tokio::test]
async fn http_editor_round_trips_a_toggle() -> Result<()> {
    let t = setup().await?;
    let base = serve(&t).await?;

    let mut editor = PermissionEditor::new(HttpRolePermissionsClient::new(&base), Role::SuperAdmin)
        .with_updated_by("ops");
    editor.select_role(Role::Support).await;
    let loaded = editor.loaded().context("support not loaded")?;
    assert!(!loaded.permissions.get(Permission::AccessJobsConfig));
    assert_eq!(loaded.version, 0);

    editor.toggle(Permission::AccessJobsConfig).await?;
    let loaded = editor.loaded().context("support not loaded")?;
    assert_eq!(loaded.status, SaveStatus::Succeeded);
    assert!(loaded.permissions.get(Permission::AccessJobsConfig));
    assert_eq!(loaded.version, 1);

    let stored = t.state.store.get(Role::Support).await?;
    assert!(stored.permissions.get(Permission::AccessJobsConfig));
    assert_eq!(stored.updated_by.as_deref(), Some("ops"));

    Ok(())
}

#[tokio::test]
async fn stale_editor_sees_the_conflict() -> Result<()> {
    let t = setup().await?;
    let base = serve(&t).await?;

    let mut first = PermissionEditor::new(HttpRolePermissionsClient::new(&base), Role::SuperAdmin);
    let mut second = PermissionEditor::new(HttpRolePermissionsClient::new(&base), Role::SuperAdmin);
    first.select_role(Role::Support).await;
    second.select_role(Role::Support).await;

    first.toggle(Permission::AccessJobsConfig).await?;
    second.toggle(Permission::ViewAnalytics).await?;

    let status = &second.loaded().context("support not loaded")?.status;
    match status {
        SaveStatus::Failed(message) => assert!(message.starts_with("conflict:"), "got {message}"),
        other => panic!("expected a conflict, got {other:?}"),
    }
    // the losing editor keeps what it displayed
    assert!(!second.loaded().context("support not loaded")?.permissions.get(Permission::ViewAnalytics));

    Ok(())
}

#[tokio::test]
async fn http_editor_reports_forbidden_message_verbatim() -> Result<()> {
    let t = setup().await?;
    let base = serve(&t).await?;

    let mut editor = PermissionEditor::new(HttpRolePermissionsClient::new(&base), Role::Admin);
    editor.select_role(Role::Support).await;
    editor.toggle(Permission::AccessJobsConfig).await?;

    assert_eq!(
        editor.loaded().context("support not loaded")?.status,
        SaveStatus::Failed("forbidden: only super_admin can modify role permissions".into())
    );

    Ok(())
}

#[tokio::test]
async fn unreachable_store_fails_the_load() -> Result<()> {
    let mut editor = PermissionEditor::new(HttpRolePermissionsClient::new("http://127.0.0.1:9"), Role::SuperAdmin);
    editor.select_role(Role::Support).await;

    assert!(matches!(editor.state(), EditorState::Failed { role: Role::Support, .. }));

    Ok(())
}

#[tokio::test]
async fn overlapping_in_process_saves_produce_one_conflict() -> Result<()> {
    let t = setup().await?;
    let store = t.state.store.clone();

    let mut editor = PermissionEditor::new(store.clone(), Role::SuperAdmin);
    editor.select_role(Role::Support).await;

    let a = editor.begin_toggle(Permission::AccessJobsConfig)?;
    let b = editor.begin_toggle(Permission::ViewAnalytics)?;
    let (req_a, req_b) = (editor.request_for(&a), editor.request_for(&b));

    let (res_a, res_b) = tokio::join!(
        RolePermissionsClient::save(&store, &req_a),
        RolePermissionsClient::save(&store, &req_b),
    );
    let successes = [res_a.is_ok(), res_b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1);

    editor.finish_save(a, res_a);
    editor.finish_save(b, res_b);

    let loaded = editor.loaded().context("support not loaded")?;
    assert_eq!(loaded.version, 1);
    assert!(loaded.saving.is_empty());

    Ok(())
}
