use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use cirrus_core::{PermissionId, RoleId};
use serde::Serialize;

use crate::permission::ScopeAction;

/// Fixed id of the root role, the system administrator archetype.
///
/// The root role is the only valid parent for sub-roles and the only
/// built-in role whose membership is not managed through the restricted
/// membership operations.
pub const ROOT_ROLE_ID: RoleId = RoleId::new(1);

/// Fixed id of the built-in security administrator role.
pub const SECURITY_ADMIN_ROLE_ID: RoleId = RoleId::new(2);

/// Fixed id of the built-in audit administrator role.
pub const AUDIT_ADMIN_ROLE_ID: RoleId = RoleId::new(3);

/// All built-in role ids, protected from rename, permission mutation and
/// deletion through the normal administrative operations.
pub const BUILT_IN_ROLE_IDS: [RoleId; 3] =
    [ROOT_ROLE_ID, SECURITY_ADMIN_ROLE_ID, AUDIT_ADMIN_ROLE_ID];

/// Permissions reserved for root-level administration. Children of the root
/// role may never hold these, regardless of what the root role itself holds.
const SUB_ROLE_EXCLUSIONS: &[(&str, &str)] = &[
    ("auth", "create_role"),
    ("auth", "update_role"),
    ("auth", "delete_role"),
    ("auth", "add_role_users"),
    ("auth", "remove_role_users"),
    ("base", "create_user"),
    ("base", "update_user"),
    ("base", "delete_user"),
    ("base", "change_system_settings"),
];

/// Returns the fixed sub-role exclusion list.
#[must_use]
pub fn sub_role_exclusions() -> Vec<ScopeAction> {
    SUB_ROLE_EXCLUSIONS
        .iter()
        .map(|(scope, action)| ScopeAction {
            scope: (*scope).to_owned(),
            action: (*action).to_owned(),
        })
        .collect()
}

/// A named principal grouping with a permission set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    /// Surrogate key assigned by the store.
    pub id: RoleId,
    /// Unique role name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Parent reference; when present it must point at the root role.
    pub parent_id: Option<RoleId>,
    /// Creation timestamp, immutable after creation.
    pub created_at: DateTime<Utc>,
    /// Permissions granted to the role.
    pub permission_ids: BTreeSet<PermissionId>,
}

impl Role {
    /// Returns whether the role is one of the fixed built-in roles.
    #[must_use]
    pub fn is_built_in(&self) -> bool {
        BUILT_IN_ROLE_IDS.contains(&self.id)
    }

    /// Returns whether the role is the root role.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.id == ROOT_ROLE_ID
    }

    /// Builds the serializable projection handed to the web layer.
    #[must_use]
    pub fn summarize(&self, member_count: usize) -> RoleSummary {
        RoleSummary {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            parent_id: self.parent_id,
            created_at: self.created_at,
            permission_ids: self.permission_ids.iter().copied().collect(),
            member_count,
        }
    }
}

/// Serializable role projection returned by administrative operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSummary {
    /// Role id.
    pub id: RoleId,
    /// Role name.
    pub name: String,
    /// Role description.
    pub description: String,
    /// Parent role id, if any.
    pub parent_id: Option<RoleId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Granted permission ids, ascending.
    pub permission_ids: Vec<PermissionId>,
    /// Number of users currently holding the role.
    pub member_count: usize,
}
