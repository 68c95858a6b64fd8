//! Compiled-in role to permission table.

use super::{Permission, PermissionSet, Role};

/// Baseline permissions for `role` when no override is stored.
pub fn defaults(role: Role) -> PermissionSet {
    let mut set = PermissionSet::all(false);
    for permission in Permission::ALL {
        set.set(permission, granted_by_default(role, permission));
    }
    set
}

fn granted_by_default(role: Role, permission: Permission) -> bool {
    use Permission::*;

    match role {
        Role::SuperAdmin => true,
        Role::Admin => !matches!(
            permission,
            AccessUsersAdmins
                | AccessNftsDeleteAll
                | AccessPaymentsConfig
                | AccessSettingsPermissions
                | ManageSettings
        ),
        Role::Support => match permission {
            AccessDashboard
            | AccessUsers
            | AccessUsersEmployers
            | AccessUsersSeekers
            | AccessJobs
            | AccessJobsList
            | AccessSettings
            | AccessSettingsProfile => true,
            ViewAnalytics
            | ViewAuditLogs
            | EditContent
            | AccessNfts
            | AccessNftsAdd
            | AccessNftsDelete
            | AccessNftsDeleteAll
            | ManageUsers
            | AccessUsersAdmins
            | ApproveCompanies
            | AccessJobsCreate
            | AccessJobsPrices
            | AccessJobsConfig
            | DeleteJobs
            | AccessMarketing
            | AccessMarketingNewsletter
            | AccessMarketingPartners
            | AccessLearn2Earn
            | AccessPayments
            | AccessPaymentsConfig
            | AccessAccounting
            | AccessSettingsPermissions
            | ManageSettings => false,
        },
    }
}
