//! Built-in principals, catalog and role templates shipped with the product.
//!
//! These mirror the deployment data the platform is initialized with: three
//! administrator accounts, three administrator roles with fixed ids, and the
//! permission declarations of the shipped application modules.

use cirrus_core::AppResult;

use crate::catalog::{CatalogEntry, CatalogModule, PermissionCatalog, RoleTemplate, grant_block};
use crate::role::{AUDIT_ADMIN_ROLE_ID, ROOT_ROLE_ID, SECURITY_ADMIN_ROLE_ID};
use crate::user::{
    AUDIT_ADMIN_USER_ID, SECURITY_ADMIN_USER_ID, SYSTEM_ADMIN_USER_ID, UserAccount,
};

/// Returns the built-in administrator accounts, active and in fixed-id order.
#[must_use]
pub fn built_in_users() -> Vec<UserAccount> {
    vec![
        UserAccount {
            id: SYSTEM_ADMIN_USER_ID,
            username: "sysadmin".to_owned(),
            is_superuser: true,
            is_active: true,
        },
        UserAccount {
            id: SECURITY_ADMIN_USER_ID,
            username: "secadmin".to_owned(),
            is_superuser: false,
            is_active: true,
        },
        UserAccount {
            id: AUDIT_ADMIN_USER_ID,
            username: "auditadmin".to_owned(),
            is_superuser: false,
            is_active: true,
        },
    ]
}

fn module(scope: &str, entries: &[(&str, &str)]) -> AppResult<CatalogModule> {
    let entries = entries
        .iter()
        .map(|(action, description)| CatalogEntry::new(*action, *description))
        .collect();

    CatalogModule::new(scope, entries)
}

/// Returns the permission catalog declared by the shipped modules.
pub fn built_in_catalog() -> AppResult<PermissionCatalog> {
    let modules = vec![
        module(
            "auth",
            &[
                ("list_permission", "Can list permissions"),
                // role
                ("list_role", "Can list roles"),
                ("list_role_perms", "Can list role permissions"),
                ("list_role_users", "Can list role users"),
                ("create_role", "Can create sub-roles"),
                ("update_role", "Can update roles"),
                ("delete_role", "Can delete roles"),
                ("add_role_users", "Can add users to a role"),
                ("remove_role_users", "Can remove users from a role"),
            ],
        )?,
        module(
            "base",
            &[
                // user
                ("list_user", "Can list users"),
                ("detail_user", "Can view user detail"),
                ("create_user", "Can create users"),
                ("update_user", "Can update users"),
                ("delete_user", "Can delete users"),
                ("active_user", "Can activate users"),
                ("lock_user", "Can lock users"),
                // operation log
                ("view_operation_log", "Can view operation logs"),
                ("delete_operation_log", "Can delete operation logs"),
                ("download_operation_log", "Can download operation logs"),
                // system settings
                ("view_system_settings", "Can view system settings"),
                ("change_system_settings", "Can change system settings"),
            ],
        )?,
        module(
            "compute",
            &[
                ("get_dashboard", "Can view the dashboard"),
                // data center
                ("list_datacenter", "Can list data centers"),
                ("detail_datacenter", "Can view data center detail"),
                // cluster
                ("list_cluster", "Can list clusters"),
                ("detail_cluster", "Can view cluster detail"),
                // host
                ("list_host", "Can list hosts"),
                ("detail_host", "Can view host detail"),
                // instance
                ("list_instance", "Can list instances"),
                ("detail_instance", "Can view instance detail"),
                ("start_instance", "Can start instances"),
                ("stop_instance", "Can stop instances"),
                ("migrate_instance", "Can migrate instances"),
                // disk
                ("list_disk", "Can list disks"),
                ("detail_disk", "Can view disk detail"),
                // storage
                ("list_storage", "Can list storage domains"),
                ("detail_storage", "Can view storage domain detail"),
                // network
                ("list_network", "Can list networks"),
                ("detail_network", "Can view network detail"),
                // snapshot
                ("list_snapshot", "Can list snapshots"),
                ("create_snapshot", "Can create snapshots"),
                ("delete_snapshot", "Can delete snapshots"),
                // image
                ("list_image", "Can list images"),
                ("detail_image", "Can view image detail"),
                // alarms
                ("list_alarm_rule", "Can list alarm rules"),
                ("detail_alarm_rule", "Can view alarm rule detail"),
                ("list_event_report", "Can list event reports"),
            ],
        )?,
    ];

    PermissionCatalog::new(modules)
}

/// Returns the declared permission lists of the three built-in roles.
#[must_use]
pub fn built_in_role_templates() -> Vec<RoleTemplate> {
    vec![system_admin(), security_admin(), audit_admin()]
}

fn system_admin() -> RoleTemplate {
    RoleTemplate::new(
        ROOT_ROLE_ID,
        "system_admin",
        "System administrator",
        vec![
            grant_block(
                "auth",
                &[
                    "list_permission",
                    "list_role",
                    "list_role_perms",
                    "list_role_users",
                    "create_role",
                    "update_role",
                    "delete_role",
                    "add_role_users",
                    "remove_role_users",
                ],
            ),
            grant_block(
                "base",
                &[
                    "list_user",
                    "detail_user",
                    "create_user",
                    "update_user",
                    "delete_user",
                    "active_user",
                    "lock_user",
                    "view_operation_log",
                    "delete_operation_log",
                    "download_operation_log",
                    "view_system_settings",
                    "change_system_settings",
                ],
            ),
            grant_block(
                "compute",
                &[
                    "get_dashboard",
                    "list_datacenter",
                    "detail_datacenter",
                    "list_cluster",
                    "detail_cluster",
                    "list_host",
                    "detail_host",
                    "list_instance",
                    "detail_instance",
                    "start_instance",
                    "stop_instance",
                    "migrate_instance",
                    "list_disk",
                    "detail_disk",
                    "list_storage",
                    "detail_storage",
                    "list_network",
                    "detail_network",
                    "list_snapshot",
                    "create_snapshot",
                    "delete_snapshot",
                    "list_image",
                    "detail_image",
                    "list_alarm_rule",
                    "detail_alarm_rule",
                    "list_event_report",
                ],
            ),
        ],
    )
}

fn security_admin() -> RoleTemplate {
    RoleTemplate::new(
        SECURITY_ADMIN_ROLE_ID,
        "security_admin",
        "Security administrator",
        vec![
            grant_block(
                "auth",
                &[
                    "list_permission",
                    "list_role",
                    "list_role_perms",
                    "list_role_users",
                ],
            ),
            grant_block(
                "base",
                &[
                    "list_user",
                    "detail_user",
                    "active_user",
                    "lock_user",
                    "view_operation_log",
                    "delete_operation_log",
                    "download_operation_log",
                    "view_system_settings",
                    "change_system_settings",
                ],
            ),
            grant_block(
                "compute",
                &[
                    "get_dashboard",
                    "list_datacenter",
                    "detail_datacenter",
                    "list_cluster",
                    "detail_cluster",
                    "list_host",
                    "detail_host",
                    "list_instance",
                    "detail_instance",
                    "list_alarm_rule",
                    "detail_alarm_rule",
                    "list_event_report",
                ],
            ),
        ],
    )
}

fn audit_admin() -> RoleTemplate {
    RoleTemplate::new(
        AUDIT_ADMIN_ROLE_ID,
        "audit_admin",
        "Audit administrator",
        vec![
            grant_block(
                "auth",
                &[
                    "list_permission",
                    "list_role",
                    "list_role_perms",
                    "list_role_users",
                ],
            ),
            grant_block(
                "base",
                &[
                    "list_user",
                    "detail_user",
                    "view_operation_log",
                    "download_operation_log",
                    "view_system_settings",
                ],
            ),
            grant_block(
                "compute",
                &[
                    "get_dashboard",
                    "list_datacenter",
                    "list_cluster",
                    "list_host",
                    "list_instance",
                    "list_alarm_rule",
                    "list_event_report",
                ],
            ),
        ],
    )
}
