//! Application services and ports for the Cirrus access-control core.

#![forbid(unsafe_code)]

mod access_evaluator;
mod access_ports;
mod reconciliation_service;
mod role_admin_service;

pub use access_evaluator::AccessEvaluator;
pub use access_ports::{NewRole, PermissionStore, RoleStore, UserStore};
pub use reconciliation_service::{ReconcileReport, ReconciliationService, RoleReconciliation};
pub use role_admin_service::{CreateSubRoleInput, RoleAdminService, UpdateRoleInput};
