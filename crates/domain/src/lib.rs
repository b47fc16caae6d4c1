//! Domain entities and invariants for the Cirrus access-control core.

#![forbid(unsafe_code)]

mod catalog;
mod defaults;
mod error;
mod permission;
mod role;
mod user;

pub use catalog::{CatalogEntry, CatalogModule, PermissionCatalog, RoleTemplate};
pub use defaults::{built_in_catalog, built_in_role_templates, built_in_users};
pub use error::{AccessControlError, ReconcileError};
pub use permission::{PermissionRecord, ScopeAction};
pub use role::{
    AUDIT_ADMIN_ROLE_ID, BUILT_IN_ROLE_IDS, ROOT_ROLE_ID, Role, RoleSummary,
    SECURITY_ADMIN_ROLE_ID, sub_role_exclusions,
};
pub use user::{
    AUDIT_ADMIN_USER_ID, BUILT_IN_USER_IDS, SECURITY_ADMIN_USER_ID, SYSTEM_ADMIN_USER_ID,
    UserAccount,
};
