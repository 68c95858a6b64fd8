//! Authorization module - roles, permission keys, and resolution
//!
//! This module implements the admin-portal RBAC with support for:
//! - A closed set of roles and permission keys
//! - Compiled-in per-role defaults
//! - Per-role overrides persisted in the permission store
//! - Session resolution with a recovery-credential elevation path

pub mod defaults;
mod permission_set;
mod principal;
pub mod resolver;
pub mod store;

pub use defaults::defaults;
pub use permission_set::{PermissionSet, PermissionSetError};
pub use principal::{ResolvedPermissions, RoleSource, SessionHints};
pub use resolver::{PermissionDirectory, PermissionResolver, RecoveryConfig, ResolverConfig};
pub use store::{RolePermissionStore, RolePermissions, SaveRolePermissions};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Privilege level of an admin-portal account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Support,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::SuperAdmin, Role::Admin, Role::Support];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Support => "support",
        }
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role: {0}")]
pub struct InvalidRole(pub String);

impl FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Role::SuperAdmin),
            "admin" => Ok(Role::Admin),
            "support" => Ok(Role::Support),
            other => Err(InvalidRole(other.to_string())),
        }
    }
}

/// Named capability flag checked by the admin and support portals.
///
/// Adding a variant forces the defaults table and the wire-key mapping to be
/// updated, both are exhaustive matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Permission {
    // Dashboard
    AccessDashboard,
    ViewAnalytics,
    ViewAuditLogs,
    EditContent,

    // NFTs
    AccessNfts,
    AccessNftsAdd,
    AccessNftsDelete,
    AccessNftsDeleteAll,

    // Users
    ManageUsers,
    AccessUsers,
    AccessUsersAdmins,
    AccessUsersEmployers,
    AccessUsersSeekers,
    ApproveCompanies,

    // Jobs
    AccessJobs,
    AccessJobsList,
    AccessJobsCreate,
    AccessJobsPrices,
    AccessJobsConfig,
    DeleteJobs,

    // Marketing
    AccessMarketing,
    AccessMarketingNewsletter,
    AccessMarketingPartners,
    AccessLearn2Earn,

    // Payments
    AccessPayments,
    AccessPaymentsConfig,
    AccessAccounting,

    // Settings
    AccessSettings,
    AccessSettingsProfile,
    AccessSettingsPermissions,
    ManageSettings,
}

impl Permission {
    pub const COUNT: usize = 31;

    /// Canonical key order, used for serialization and validation.
    pub const ALL: [Permission; Permission::COUNT] = [
        Permission::AccessDashboard,
        Permission::ViewAnalytics,
        Permission::ViewAuditLogs,
        Permission::EditContent,
        Permission::AccessNfts,
        Permission::AccessNftsAdd,
        Permission::AccessNftsDelete,
        Permission::AccessNftsDeleteAll,
        Permission::ManageUsers,
        Permission::AccessUsers,
        Permission::AccessUsersAdmins,
        Permission::AccessUsersEmployers,
        Permission::AccessUsersSeekers,
        Permission::ApproveCompanies,
        Permission::AccessJobs,
        Permission::AccessJobsList,
        Permission::AccessJobsCreate,
        Permission::AccessJobsPrices,
        Permission::AccessJobsConfig,
        Permission::DeleteJobs,
        Permission::AccessMarketing,
        Permission::AccessMarketingNewsletter,
        Permission::AccessMarketingPartners,
        Permission::AccessLearn2Earn,
        Permission::AccessPayments,
        Permission::AccessPaymentsConfig,
        Permission::AccessAccounting,
        Permission::AccessSettings,
        Permission::AccessSettingsProfile,
        Permission::AccessSettingsPermissions,
        Permission::ManageSettings,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Permission::AccessDashboard => "canAccessDashboard",
            Permission::ViewAnalytics => "canViewAnalytics",
            Permission::ViewAuditLogs => "canViewAuditLogs",
            Permission::EditContent => "canEditContent",
            Permission::AccessNfts => "canAccessNFTs",
            Permission::AccessNftsAdd => "canAccessNFTsAdd",
            Permission::AccessNftsDelete => "canAccessNFTsDelete",
            Permission::AccessNftsDeleteAll => "canAccessNFTsDeleteAll",
            Permission::ManageUsers => "canManageUsers",
            Permission::AccessUsers => "canAccessUsers",
            Permission::AccessUsersAdmins => "canAccessUsersAdmins",
            Permission::AccessUsersEmployers => "canAccessUsersEmployers",
            Permission::AccessUsersSeekers => "canAccessUsersSeekers",
            Permission::ApproveCompanies => "canApproveCompanies",
            Permission::AccessJobs => "canAccessJobs",
            Permission::AccessJobsList => "canAccessJobsList",
            Permission::AccessJobsCreate => "canAccessJobsCreate",
            Permission::AccessJobsPrices => "canAccessJobsPrices",
            Permission::AccessJobsConfig => "canAccessJobsConfig",
            Permission::DeleteJobs => "canDeleteJobs",
            Permission::AccessMarketing => "canAccessMarketing",
            Permission::AccessMarketingNewsletter => "canAccessMarketingNewsletter",
            Permission::AccessMarketingPartners => "canAccessMarketingPartners",
            Permission::AccessLearn2Earn => "canAccessLearn2Earn",
            Permission::AccessPayments => "canAccessPayments",
            Permission::AccessPaymentsConfig => "canAccessPaymentsConfig",
            Permission::AccessAccounting => "canAccessAccounting",
            Permission::AccessSettings => "canAccessSettings",
            Permission::AccessSettingsProfile => "canAccessSettingsProfile",
            Permission::AccessSettingsPermissions => "canAccessSettingsPermissions",
            Permission::ManageSettings => "canManageSettings",
        }
    }

    pub fn from_key(key: &str) -> Option<Permission> {
        Permission::ALL.iter().copied().find(|p| p.key() == key)
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for Permission {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        Permission::from_key(&key)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown permission key: {key}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn role_round_trips_through_wire_names() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("root".parse::<Role>().is_err());
        assert!("Admin".parse::<Role>().is_err());
    }

    #[test]
    fn canonical_order_matches_discriminants() {
        for (idx, perm) in Permission::ALL.iter().enumerate() {
            assert_eq!(perm.index(), idx, "{perm} out of canonical order");
        }
    }

    #[test]
    fn permission_keys_are_unique_and_resolvable() {
        let keys: HashSet<&str> = Permission::ALL.iter().map(|p| p.key()).collect();
        assert_eq!(keys.len(), Permission::COUNT);
        assert_eq!(Permission::from_key("canAccessNFTs"), Some(Permission::AccessNfts));
        assert_eq!(Permission::from_key("canDoAnything"), None);
    }
}
