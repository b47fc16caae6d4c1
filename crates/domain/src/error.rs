use std::fmt::Display;

use cirrus_core::{AppError, PermissionId, RoleId, UserId};
use thiserror::Error;

use crate::permission::ScopeAction;

fn join_ids<T: Display>(ids: &[T]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Recoverable validation errors raised by role administration and access
/// evaluation. Reported to the caller; never abort the process, and no
/// partial mutation is committed alongside them.
#[derive(Debug, Error)]
pub enum AccessControlError {
    /// Sub-role creation targeted a parent other than the root role.
    #[error("role {parent_id} cannot own sub-roles; only the root role may")]
    InvalidHierarchy {
        /// The rejected parent id.
        parent_id: RoleId,
    },

    /// Requested permissions fall outside the grantable set derived from
    /// the parent role and the sub-role exclusion list.
    #[error(
        "permissions [{}] are not grantable; sub-roles may only inherit permissions held by their parent",
        join_ids(.permission_ids)
    )]
    IllegalPermission {
        /// Every offending permission id, ascending.
        permission_ids: Vec<PermissionId>,
    },

    /// Requested permission ids are absent from the permission store.
    #[error("permissions [{}] do not exist", join_ids(.permission_ids))]
    UnknownPermission {
        /// Every offending permission id, ascending.
        permission_ids: Vec<PermissionId>,
    },

    /// Update attempted on a built-in role.
    #[error("role {role_id} is a built-in role and cannot be modified")]
    ProtectedRole {
        /// The targeted role id.
        role_id: RoleId,
    },

    /// Deletion attempted on a built-in role.
    #[error("role {role_id} is a built-in role and cannot be deleted")]
    OperationNotAllowed {
        /// The targeted role id.
        role_id: RoleId,
    },

    /// Membership operation referenced users that do not exist.
    #[error("users [{}] do not exist", join_ids(.user_ids))]
    UnknownUser {
        /// Every offending user id, ascending.
        user_ids: Vec<UserId>,
    },

    /// Membership operation targeted built-in protected users.
    #[error("users [{}] are built-in accounts and cannot change role", join_ids(.user_ids))]
    ProtectedUser {
        /// Every offending user id, ascending.
        user_ids: Vec<UserId>,
    },

    /// Membership operation targeted the root role through the restricted
    /// membership path.
    #[error("membership of role {role_id} is not managed through this operation")]
    InvalidRole {
        /// The targeted role id.
        role_id: RoleId,
    },

    /// Store I/O failure, propagated unchanged.
    #[error(transparent)]
    Store(#[from] AppError),
}

/// Errors raised by the reconciliation engine. Configuration variants are
/// fatal: they abort the whole run and must surface as a non-zero exit so
/// deployment tooling halts.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A role template declares the same scope or scope.action twice.
    #[error(
        "role template '{template}' declares '{entry}' more than once; fix the template before rerunning"
    )]
    DuplicateCatalogEntry {
        /// Name of the offending role template.
        template: String,
        /// The duplicated scope or scope.action entry.
        entry: String,
    },

    /// A role template declares a permission that was never registered.
    #[error(
        "permission '{entry}' declared by role template '{template}' is not registered; \
         run the catalog registration step first, then rerun reconciliation"
    )]
    MissingCatalogRegistration {
        /// Name of the offending role template.
        template: String,
        /// The unregistered permission.
        entry: ScopeAction,
    },

    /// Store I/O failure, propagated unchanged.
    #[error(transparent)]
    Store(#[from] AppError),
}
