use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use super::principal::{ResolvedPermissions, RoleSource, SessionHints};
use super::store::RolePermissionStore;
use super::{Permission, PermissionSet, Role};
use crate::errors::{AppError, AppResult};
use crate::models::admin::AdminIdentity;
use crate::utils::verify_secret;

const DEFAULT_ROLE_CACHE_TTL_SECS: i64 = 300;

/// Source of admin identities and per-role permissions.
#[async_trait]
pub trait PermissionDirectory: Send + Sync {
    async fn find_admin(&self, id: Uuid) -> AppResult<Option<AdminIdentity>>;

    /// Effective permissions for a role, overrides applied.
    async fn role_permissions(&self, role: Role) -> AppResult<PermissionSet>;
}

#[async_trait]
impl PermissionDirectory for RolePermissionStore {
    async fn find_admin(&self, id: Uuid) -> AppResult<Option<AdminIdentity>> {
        RolePermissionStore::find_admin(self, id).await
    }

    async fn role_permissions(&self, role: Role) -> AppResult<PermissionSet> {
        Ok(self.get(role).await?.permissions)
    }
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// How long a client-cached role hint is trusted without a directory lookup
    pub role_cache_ttl: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            role_cache_ttl: Duration::seconds(DEFAULT_ROLE_CACHE_TTL_SECS),
        }
    }
}

impl ResolverConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let secs = std::env::var("ROLE_CACHE_TTL_SECS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(DEFAULT_ROLE_CACHE_TTL_SECS))
            .map_err(|_| AppError::configuration("ROLE_CACHE_TTL_SECS must be a valid integer"))?;

        Self::from_secs(secs)
    }

    pub fn from_secs(secs: i64) -> Result<Self, AppError> {
        if secs < 0 {
            return Err(AppError::configuration("ROLE_CACHE_TTL_SECS must not be negative"));
        }

        let role_cache_ttl = Duration::try_seconds(secs)
            .ok_or_else(|| AppError::configuration("ROLE_CACHE_TTL_SECS is out of range"))?;

        Ok(Self { role_cache_ttl })
    }
}

/// Out-of-band recovery credential. Disabled when no hash is configured.
#[derive(Debug, Clone, Default)]
pub struct RecoveryConfig {
    pub credential_hash: Option<String>,
}

impl RecoveryConfig {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_hash(hash: impl Into<String>) -> Self {
        Self {
            credential_hash: Some(hash.into()),
        }
    }

    pub fn from_env() -> Self {
        let credential_hash = std::env::var("RECOVERY_CREDENTIAL_HASH")
            .ok()
            .filter(|v| !v.trim().is_empty());
        Self { credential_hash }
    }

    fn verify(&self, presented: &str) -> bool {
        let Some(hash) = &self.credential_hash else {
            tracing::warn!("recovery credential presented but recovery is not configured");
            return false;
        };

        match verify_secret(presented, hash) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::error!(error = %e, "recovery credential hash is unusable");
                false
            }
        }
    }
}

/// Resolves the effective role and permissions of a session.
///
/// Resolution order:
/// 1. verified recovery credential -> super_admin, everything granted
/// 2. client-cached role hint, if still within its trust window
/// 3. admin directory lookup
///
/// Permissions are always read fresh for the chosen role. Lookup failures
/// degrade to `admin` defaults with the error attached instead of failing.
pub struct PermissionResolver<D> {
    directory: D,
    config: ResolverConfig,
    recovery: RecoveryConfig,
}

impl<D: PermissionDirectory> PermissionResolver<D> {
    pub fn new(directory: D, config: ResolverConfig, recovery: RecoveryConfig) -> Self {
        Self {
            directory,
            config,
            recovery,
        }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub async fn resolve(&self, hints: &SessionHints) -> ResolvedPermissions {
        self.resolve_with(hints, false).await
    }

    /// Resolves without trusting the cached role hint.
    pub async fn revalidate(&self, hints: &SessionHints) -> ResolvedPermissions {
        self.resolve_with(hints, true).await
    }

    /// Revalidates and requires `permission` for a privileged action.
    pub async fn authorize(
        &self,
        hints: &SessionHints,
        permission: Permission,
    ) -> AppResult<ResolvedPermissions> {
        let resolved = self.revalidate(hints).await;

        if let Some(error) = &resolved.error {
            return Err(AppError::forbidden(format!("permissions could not be verified: {error}")));
        }

        if !resolved.has_permission(permission) {
            tracing::debug!(
                admin_id = ?hints.admin_id,
                role = %resolved.role,
                permission = %permission,
                "permission denied"
            );
            return Err(AppError::forbidden(format!("missing permission {permission}")));
        }

        Ok(resolved)
    }

    async fn resolve_with(&self, hints: &SessionHints, revalidate: bool) -> ResolvedPermissions {
        if let Some(credential) = &hints.recovery_credential {
            if self.recovery.verify(credential) {
                tracing::warn!(
                    admin_id = ?hints.admin_id,
                    display_name = ?hints.display_name,
                    "recovery credential accepted, session elevated to super_admin"
                );
                return ResolvedPermissions::recovery();
            }
            tracing::warn!(admin_id = ?hints.admin_id, "recovery credential rejected");
        }

        let (role, source) = match self.determine_role(hints, revalidate).await {
            Ok(found) => found,
            Err(error) => {
                tracing::warn!(admin_id = ?hints.admin_id, error = %error, "role lookup failed, using admin defaults");
                return ResolvedPermissions::degraded(error);
            }
        };

        match self.directory.role_permissions(role).await {
            Ok(permissions) => ResolvedPermissions {
                role,
                permissions,
                source,
                break_glass: false,
                error: None,
            },
            Err(e) => {
                tracing::warn!(role = %role, error = %e, "permission lookup failed, using admin defaults");
                ResolvedPermissions::degraded(e.to_string())
            }
        }
    }

    async fn determine_role(&self, hints: &SessionHints, revalidate: bool) -> Result<(Role, RoleSource), String> {
        if !revalidate {
            if let Some(role) = self.fresh_cached_role(hints) {
                return Ok((role, RoleSource::Cache));
            }
        }

        let admin_id = hints
            .admin_id
            .ok_or_else(|| "no admin id in session".to_string())?;

        match self.directory.find_admin(admin_id).await {
            Ok(Some(admin)) => Ok((admin.role, RoleSource::Directory)),
            Ok(None) => Err("admin not found".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    fn fresh_cached_role(&self, hints: &SessionHints) -> Option<Role> {
        let raw = hints.role.as_deref()?;
        let role = match raw.parse::<Role>() {
            Ok(role) => role,
            Err(_) => {
                tracing::debug!(cached_role = %raw, "ignoring invalid cached role");
                return None;
            }
        };

        let cached_at = hints.role_cached_at?;
        let age = Utc::now() - cached_at;
        if age < Duration::zero() || age > self.config.role_cache_ttl {
            tracing::debug!(cached_role = %raw, age_secs = age.num_seconds(), "cached role outside trust window");
            return None;
        }

        Some(role)
    }
}
