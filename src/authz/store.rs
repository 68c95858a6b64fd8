//! Permission store and admin directory backed by SQLite.
//!
//! Overrides live in `role_permissions`, one row per role. The `super_admin`
//! row is never read or written: its permissions are always the compiled-in
//! all-true table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::{defaults, PermissionSet, Role};
use crate::errors::{AppError, AppResult};
use crate::events::{Loggable, Severity};
use crate::models::admin::{AdminIdentity, DbAdmin};

/// Retries for unversioned writes that lose the compare-and-swap.
const MAX_WRITE_ATTEMPTS: usize = 3;

/// Effective permissions of a role together with the override metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RolePermissions {
    pub role: Role,
    pub permissions: PermissionSet,
    /// 0 when no override has ever been written
    pub version: i64,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

impl RolePermissions {
    fn from_defaults(role: Role) -> Self {
        Self {
            role,
            permissions: defaults(role),
            version: 0,
            updated_at: None,
            updated_by: None,
        }
    }
}

impl Loggable for RolePermissions {
    fn entity_type() -> &'static str { "role_permissions" }
    fn subject_id(&self) -> String { self.role.to_string() }
    fn severity(&self) -> Severity { Severity::Critical }
}

/// A permission write request, already parsed from the wire.
#[derive(Debug, Clone)]
pub struct SaveRolePermissions {
    pub role: Role,
    pub permissions: Map<String, Value>,
    /// Role claimed by the caller; `None` when absent or unparseable
    pub caller_role: Option<Role>,
    pub expected_version: Option<i64>,
    pub updated_by: Option<String>,
}

#[derive(Debug, FromRow)]
struct OverrideRow {
    permissions: String,
    version: i64,
    updated_at: DateTime<Utc>,
    updated_by: Option<String>,
}

impl OverrideRow {
    fn permissions_map(&self) -> Map<String, Value> {
        match serde_json::from_str::<Value>(&self.permissions) {
            Ok(Value::Object(map)) => map,
            _ => {
                tracing::warn!("stored override is not a JSON object, ignoring it");
                Map::new()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RolePermissionStore {
    pool: SqlitePool,
}

impl RolePermissionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Effective permissions for `role`: defaults overlaid by any stored override.
    pub async fn get(&self, role: Role) -> AppResult<RolePermissions> {
        if role.is_super_admin() {
            return Ok(RolePermissions::from_defaults(role));
        }

        let row = self.fetch_override(role).await?;
        Ok(match row {
            None => RolePermissions::from_defaults(role),
            Some(row) => RolePermissions {
                role,
                permissions: defaults(role).overlay(&row.permissions_map()),
                version: row.version,
                updated_at: Some(row.updated_at),
                updated_by: row.updated_by,
            },
        })
    }

    /// Validates, authorizes and merge-writes a proposal.
    pub async fn save(&self, request: SaveRolePermissions) -> AppResult<RolePermissions> {
        let role = request.role;

        if role.is_super_admin() {
            tracing::warn!(caller_role = ?request.caller_role, "rejected write to super_admin permissions");
            return Err(AppError::forbidden("super_admin permissions cannot be modified"));
        }

        if request.caller_role != Some(Role::SuperAdmin) {
            tracing::warn!(role = %role, caller_role = ?request.caller_role, "rejected permission write from non super_admin");
            return Err(AppError::forbidden("only super_admin can modify role permissions"));
        }

        let proposal = PermissionSet::from_full_map(&request.permissions)
            .map_err(|e| AppError::bad_request(e.to_string()))?;

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self.fetch_override(role).await?;
            let base_version = current.as_ref().map(|row| row.version).unwrap_or(0);

            if let Some(expected) = request.expected_version {
                if expected != base_version {
                    return Err(stale_version(role, expected, base_version));
                }
            }

            let mut merged = current.as_ref().map(OverrideRow::permissions_map).unwrap_or_default();
            merged.extend(proposal.to_json_map());
            let merged_json = Value::Object(merged.clone()).to_string();
            let now = Utc::now();

            let written = if current.is_none() {
                sqlx::query(
                    "INSERT INTO role_permissions (role, permissions, version, updated_at, updated_by) VALUES (?, ?, 1, ?, ?) ON CONFLICT(role) DO NOTHING",
                )
                .bind(role.as_str())
                .bind(&merged_json)
                .bind(now)
                .bind(&request.updated_by)
                .execute(&self.pool)
                .await?
            } else {
                sqlx::query(
                    "UPDATE role_permissions SET permissions = ?, version = version + 1, updated_at = ?, updated_by = ? WHERE role = ? AND version = ?",
                )
                .bind(&merged_json)
                .bind(now)
                .bind(&request.updated_by)
                .bind(role.as_str())
                .bind(base_version)
                .execute(&self.pool)
                .await?
            };

            if written.rows_affected() == 1 {
                tracing::info!(
                    role = %role,
                    version = base_version + 1,
                    updated_by = ?request.updated_by,
                    "role permissions updated"
                );
                return Ok(RolePermissions {
                    role,
                    permissions: defaults(role).overlay(&merged),
                    version: base_version + 1,
                    updated_at: Some(now),
                    updated_by: request.updated_by,
                });
            }

            if let Some(expected) = request.expected_version {
                return Err(stale_version(role, expected, base_version + 1));
            }

            tracing::debug!(role = %role, attempt, "concurrent unversioned write, retrying");
        }

        Err(AppError::conflict(format!(
            "permissions for {role} are being modified concurrently, reload and retry"
        )))
    }

    async fn fetch_override(&self, role: Role) -> AppResult<Option<OverrideRow>> {
        let row = sqlx::query_as::<_, OverrideRow>(
            "SELECT permissions, version, updated_at, updated_by FROM role_permissions WHERE role = ?",
        )
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    // Admin directory

    pub async fn find_admin(&self, id: Uuid) -> AppResult<Option<AdminIdentity>> {
        let row = sqlx::query_as::<_, DbAdmin>(
            "SELECT id, name, email, role, created_at, updated_at FROM admins WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(AdminIdentity::try_from).transpose()
    }

    pub async fn create_admin(&self, name: &str, email: Option<&str>, role: Role) -> AppResult<AdminIdentity> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO admins (id, name, email, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(name)
        .bind(email)
        .bind(role.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(AdminIdentity {
            id,
            name: name.to_string(),
            email: email.map(str::to_string),
            role,
            created_at: now,
            updated_at: now,
        })
    }

    /// Reassigns an admin's role. Demoting the last super admin is refused.
    pub async fn set_admin_role(&self, id: Uuid, role: Role) -> AppResult<AdminIdentity> {
        let result = sqlx::query(
            r#"
            UPDATE admins SET role = ?1, updated_at = ?2
            WHERE id = ?3
              AND NOT (
                role = 'super_admin'
                AND ?1 <> 'super_admin'
                AND (SELECT COUNT(1) FROM admins WHERE role = 'super_admin') <= 1
              )
            "#,
        )
        .bind(role.as_str())
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.find_admin(id).await? {
                None => Err(AppError::not_found("admin not found")),
                Some(_) => Err(AppError::conflict("cannot demote the last super_admin")),
            };
        }

        self.find_admin(id)
            .await?
            .ok_or_else(|| AppError::not_found("admin not found"))
    }

    pub async fn count_super_admins(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM admins WHERE role = 'super_admin'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn stale_version(role: Role, expected: i64, current: i64) -> AppError {
    tracing::info!(role = %role, expected, current, "rejected stale permission write");
    AppError::conflict(format!(
        "permissions for {role} changed (expected version {expected}, current {current}), reload and retry"
    ))
}
