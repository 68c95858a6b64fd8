use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{defaults, Permission, PermissionSet, Role};

/// Untrusted session signals carried by the client between requests.
#[derive(Debug, Clone, Default)]
pub struct SessionHints {
    pub admin_id: Option<Uuid>,
    pub display_name: Option<String>,
    /// Previously resolved role string, as cached by the client
    pub role: Option<String>,
    pub role_cached_at: Option<DateTime<Utc>>,
    /// Out-of-band recovery credential, if presented
    pub recovery_credential: Option<String>,
}

impl SessionHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admin(mut self, admin_id: Uuid) -> Self {
        self.admin_id = Some(admin_id);
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_cached_role(mut self, role: impl Into<String>, cached_at: DateTime<Utc>) -> Self {
        self.role = Some(role.into());
        self.role_cached_at = Some(cached_at);
        self
    }

    pub fn with_recovery_credential(mut self, credential: impl Into<String>) -> Self {
        self.recovery_credential = Some(credential.into());
        self
    }
}

/// Where the resolved role came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSource {
    Recovery,
    Cache,
    Directory,
    Fallback,
}

/// Effective role and permissions for one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPermissions {
    pub role: Role,
    pub permissions: PermissionSet,
    pub source: RoleSource,
    /// Set when the role was granted by the recovery credential
    pub break_glass: bool,
    /// Lookup failure that forced the fallback role, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResolvedPermissions {
    pub fn recovery() -> Self {
        Self {
            role: Role::SuperAdmin,
            permissions: PermissionSet::all(true),
            source: RoleSource::Recovery,
            break_glass: true,
            error: None,
        }
    }

    pub fn degraded(error: impl Into<String>) -> Self {
        Self {
            role: Role::Admin,
            permissions: defaults(Role::Admin),
            source: RoleSource::Fallback,
            break_glass: false,
            error: Some(error.into()),
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.break_glass || self.permissions.get(permission)
    }

    pub fn is_super_admin(&self) -> bool {
        self.role.is_super_admin()
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}
