//! Operator-facing permission editor.
//!
//! Drives the permission store one toggle at a time. Updates are pessimistic:
//! the displayed set only changes once the store confirms a write, and every
//! proposal carries the version it was based on.

mod client;

use std::collections::BTreeSet;

pub use client::{ClientError, HttpRolePermissionsClient, RolePermissionsClient, SaveRequest, Snapshot};

use crate::authz::{Permission, PermissionSet, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Saving,
    Succeeded,
    Failed(String),
}

/// A role's permissions as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedRole {
    pub role: Role,
    pub permissions: PermissionSet,
    pub version: i64,
    pub saving: BTreeSet<Permission>,
    pub status: SaveStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorState {
    Idle,
    Loading(Role),
    Loaded(LoadedRole),
    Failed { role: Role, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditorError {
    #[error("no role loaded")]
    NotLoaded,
    #[error("{} is already being saved", .0.key())]
    AlreadySaving(Permission),
    #[error("{0} permissions are read-only")]
    ReadOnly(Role),
}

/// One in-flight write, created by [`PermissionEditor::begin_toggle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTicket {
    pub role: Role,
    pub permission: Permission,
    pub proposal: PermissionSet,
    pub expected_version: i64,
}

pub struct PermissionEditor<C> {
    client: C,
    caller_role: Role,
    updated_by: Option<String>,
    state: EditorState,
}

impl<C: RolePermissionsClient> PermissionEditor<C> {
    pub fn new(client: C, caller_role: Role) -> Self {
        Self {
            client,
            caller_role,
            updated_by: None,
            state: EditorState::Idle,
        }
    }

    pub fn with_updated_by(mut self, updated_by: impl Into<String>) -> Self {
        self.updated_by = Some(updated_by.into());
        self
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn loaded(&self) -> Option<&LoadedRole> {
        match &self.state {
            EditorState::Loaded(loaded) => Some(loaded),
            _ => None,
        }
    }

    pub fn is_saving(&self, permission: Permission) -> bool {
        self.loaded().is_some_and(|l| l.saving.contains(&permission))
    }

    pub async fn select_role(&mut self, role: Role) {
        self.state = EditorState::Loading(role);

        self.state = match self.client.fetch(role).await {
            Ok(snapshot) => EditorState::Loaded(LoadedRole {
                role,
                permissions: snapshot.permissions,
                version: snapshot.version,
                saving: BTreeSet::new(),
                status: SaveStatus::Idle,
            }),
            Err(err) => {
                tracing::warn!(role = %role, error = %err, "failed to load role permissions");
                EditorState::Failed {
                    role,
                    message: err.message().to_string(),
                }
            }
        };
    }

    /// Marks `permission` as saving and returns the proposal to send. The
    /// displayed set is left untouched.
    pub fn begin_toggle(&mut self, permission: Permission) -> Result<SaveTicket, EditorError> {
        let EditorState::Loaded(loaded) = &mut self.state else {
            return Err(EditorError::NotLoaded);
        };
        if loaded.role.is_super_admin() {
            return Err(EditorError::ReadOnly(loaded.role));
        }
        if !loaded.saving.insert(permission) {
            return Err(EditorError::AlreadySaving(permission));
        }
        loaded.status = SaveStatus::Saving;

        let current = loaded.permissions.get(permission);
        Ok(SaveTicket {
            role: loaded.role,
            permission,
            proposal: loaded.permissions.with(permission, !current),
            expected_version: loaded.version,
        })
    }

    pub fn request_for(&self, ticket: &SaveTicket) -> SaveRequest {
        SaveRequest {
            role: ticket.role,
            permissions: ticket.proposal,
            expected_version: ticket.expected_version,
            caller_role: self.caller_role,
            updated_by: self.updated_by.clone(),
        }
    }

    pub fn finish_save(&mut self, ticket: SaveTicket, result: Result<Snapshot, ClientError>) {
        let loaded = match &mut self.state {
            EditorState::Loaded(loaded) if loaded.role == ticket.role => loaded,
            _ => {
                tracing::debug!(role = %ticket.role, permission = ticket.permission.key(), "dropping response for deselected role");
                return;
            }
        };

        loaded.saving.remove(&ticket.permission);

        match result {
            Ok(snapshot) => {
                if snapshot.version >= loaded.version {
                    loaded.permissions = snapshot.permissions;
                    loaded.version = snapshot.version;
                }
                loaded.status = SaveStatus::Succeeded;
            }
            Err(err) => {
                tracing::warn!(
                    role = %ticket.role,
                    permission = ticket.permission.key(),
                    error = %err,
                    "permission save failed"
                );
                loaded.status = SaveStatus::Failed(err.message().to_string());
            }
        }
    }

    /// Flips one permission through a full store round-trip.
    pub async fn toggle(&mut self, permission: Permission) -> Result<(), EditorError> {
        let ticket = self.begin_toggle(permission)?;
        let request = self.request_for(&ticket);
        let result = self.client.save(&request).await;
        self.finish_save(ticket, result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::authz::defaults;

    #[derive(Default)]
    struct ScriptedClient {
        fetches: Mutex<VecDeque<Result<Snapshot, ClientError>>>,
        saves: Mutex<VecDeque<Result<Snapshot, ClientError>>>,
        sent: Mutex<Vec<SaveRequest>>,
    }

    impl ScriptedClient {
        fn fetch_returns(self, result: Result<Snapshot, ClientError>) -> Self {
            self.fetches.lock().unwrap().push_back(result);
            self
        }

        fn save_returns(self, result: Result<Snapshot, ClientError>) -> Self {
            self.saves.lock().unwrap().push_back(result);
            self
        }
    }

    #[async_trait]
    impl RolePermissionsClient for ScriptedClient {
        async fn fetch(&self, _role: Role) -> Result<Snapshot, ClientError> {
            self.fetches
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Transport("no scripted fetch".into())))
        }

        async fn save(&self, request: &SaveRequest) -> Result<Snapshot, ClientError> {
            self.sent.lock().unwrap().push(request.clone());
            self.saves
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Transport("no scripted save".into())))
        }
    }

    fn support_snapshot(version: i64) -> Snapshot {
        Snapshot {
            role: Role::Support,
            permissions: defaults(Role::Support),
            version,
        }
    }

    async fn loaded_editor(client: ScriptedClient) -> PermissionEditor<ScriptedClient> {
        let mut editor = PermissionEditor::new(client, Role::SuperAdmin).with_updated_by("ops");
        editor.select_role(Role::Support).await;
        editor
    }

    #[tokio::test]
    async fn select_role_loads_snapshot() {
        let editor = loaded_editor(ScriptedClient::default().fetch_returns(Ok(support_snapshot(0)))).await;

        let loaded = editor.loaded().unwrap();
        assert_eq!(loaded.role, Role::Support);
        assert_eq!(loaded.permissions, defaults(Role::Support));
        assert_eq!(loaded.status, SaveStatus::Idle);
    }

    #[tokio::test]
    async fn failed_load_drops_previous_display() {
        let client = ScriptedClient::default()
            .fetch_returns(Ok(support_snapshot(0)))
            .fetch_returns(Err(ClientError::Unavailable("permission store unavailable".into())));
        let mut editor = loaded_editor(client).await;

        editor.select_role(Role::Admin).await;

        assert!(editor.loaded().is_none());
        assert_eq!(
            editor.state(),
            &EditorState::Failed {
                role: Role::Admin,
                message: "permission store unavailable".into()
            }
        );
    }

    #[tokio::test]
    async fn begin_toggle_is_pessimistic_and_blocks_same_key() {
        let mut editor = loaded_editor(ScriptedClient::default().fetch_returns(Ok(support_snapshot(4)))).await;

        let ticket = editor.begin_toggle(Permission::AccessJobsConfig).unwrap();
        assert!(ticket.proposal.get(Permission::AccessJobsConfig));
        assert_eq!(ticket.expected_version, 4);
        assert!(!editor.loaded().unwrap().permissions.get(Permission::AccessJobsConfig));
        assert!(editor.is_saving(Permission::AccessJobsConfig));
        assert_eq!(editor.loaded().unwrap().status, SaveStatus::Saving);

        assert_eq!(
            editor.begin_toggle(Permission::AccessJobsConfig),
            Err(EditorError::AlreadySaving(Permission::AccessJobsConfig))
        );
        assert!(editor.begin_toggle(Permission::AccessSettings).is_ok());
    }

    #[tokio::test]
    async fn super_admin_is_read_only() {
        let client = ScriptedClient::default().fetch_returns(Ok(Snapshot {
            role: Role::SuperAdmin,
            permissions: PermissionSet::all(true),
            version: 0,
        }));
        let mut editor = PermissionEditor::new(client, Role::SuperAdmin);
        editor.select_role(Role::SuperAdmin).await;

        assert_eq!(
            editor.begin_toggle(Permission::AccessDashboard),
            Err(EditorError::ReadOnly(Role::SuperAdmin))
        );
    }

    #[test]
    fn begin_toggle_requires_a_loaded_role() {
        let mut editor = PermissionEditor::new(ScriptedClient::default(), Role::SuperAdmin);
        assert_eq!(editor.begin_toggle(Permission::AccessDashboard), Err(EditorError::NotLoaded));
    }

    #[tokio::test]
    async fn toggle_success_replaces_display() {
        let saved = Snapshot {
            role: Role::Support,
            permissions: defaults(Role::Support).with(Permission::AccessJobsConfig, true),
            version: 1,
        };
        let client = ScriptedClient::default()
            .fetch_returns(Ok(support_snapshot(0)))
            .save_returns(Ok(saved.clone()));
        let mut editor = loaded_editor(client).await;

        editor.toggle(Permission::AccessJobsConfig).await.unwrap();

        let loaded = editor.loaded().unwrap();
        assert_eq!(loaded.permissions, saved.permissions);
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.status, SaveStatus::Succeeded);
        assert!(loaded.saving.is_empty());

        let sent = editor.client.sent.lock().unwrap();
        assert_eq!(sent[0].expected_version, 0);
        assert_eq!(sent[0].caller_role, Role::SuperAdmin);
        assert_eq!(sent[0].updated_by.as_deref(), Some("ops"));
    }

    #[tokio::test]
    async fn toggle_failure_keeps_display_and_message() {
        let client = ScriptedClient::default()
            .fetch_returns(Ok(support_snapshot(0)))
            .save_returns(Err(ClientError::Forbidden("forbidden: only super_admin can modify permissions".into())));
        let mut editor = loaded_editor(client).await;

        editor.toggle(Permission::AccessJobsConfig).await.unwrap();

        let loaded = editor.loaded().unwrap();
        assert_eq!(loaded.permissions, defaults(Role::Support));
        assert_eq!(
            loaded.status,
            SaveStatus::Failed("forbidden: only super_admin can modify permissions".into())
        );
        assert!(!editor.is_saving(Permission::AccessJobsConfig));
    }

    #[tokio::test]
    async fn response_for_deselected_role_is_dropped() {
        let admin = Snapshot {
            role: Role::Admin,
            permissions: defaults(Role::Admin),
            version: 2,
        };
        let client = ScriptedClient::default()
            .fetch_returns(Ok(support_snapshot(0)))
            .fetch_returns(Ok(admin.clone()));
        let mut editor = loaded_editor(client).await;

        let ticket = editor.begin_toggle(Permission::AccessJobsConfig).unwrap();
        editor.select_role(Role::Admin).await;
        editor.finish_save(
            ticket,
            Ok(Snapshot {
                role: Role::Support,
                permissions: PermissionSet::all(false),
                version: 9,
            }),
        );

        let loaded = editor.loaded().unwrap();
        assert_eq!(loaded.role, Role::Admin);
        assert_eq!(loaded.permissions, admin.permissions);
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.status, SaveStatus::Idle);
    }

    #[tokio::test]
    async fn overlapping_toggles_surface_the_conflict() {
        let mut editor = loaded_editor(ScriptedClient::default().fetch_returns(Ok(support_snapshot(3)))).await;

        let first = editor.begin_toggle(Permission::AccessJobsConfig).unwrap();
        let second = editor.begin_toggle(Permission::AccessSettings).unwrap();
        assert_eq!(first.expected_version, second.expected_version);

        // The second response arrives first and wins the version.
        let winner = Snapshot {
            role: Role::Support,
            permissions: second.proposal,
            version: 4,
        };
        editor.finish_save(second, Ok(winner.clone()));
        editor.finish_save(
            first,
            Err(ClientError::Conflict("conflict: role permissions changed".into())),
        );

        let loaded = editor.loaded().unwrap();
        assert_eq!(loaded.permissions, winner.permissions);
        assert_eq!(loaded.version, 4);
        assert_eq!(loaded.status, SaveStatus::Failed("conflict: role permissions changed".into()));
        assert!(loaded.saving.is_empty());
    }
}
