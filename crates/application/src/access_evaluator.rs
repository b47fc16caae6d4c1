use std::sync::Arc;

use cirrus_core::{AppError, AppResult};
use cirrus_domain::{ScopeAction, UserAccount};

use crate::access_ports::{PermissionStore, RoleStore, UserStore};

/// Read-side service answering authorization queries.
///
/// Evaluation is a pure read: superuser bypass, then the user's single role,
/// then membership of the role's permission set. Safe for unlimited
/// concurrent callers.
#[derive(Clone)]
pub struct AccessEvaluator {
    permission_store: Arc<dyn PermissionStore>,
    role_store: Arc<dyn RoleStore>,
    user_store: Arc<dyn UserStore>,
}

impl AccessEvaluator {
    /// Creates an evaluator from store implementations.
    #[must_use]
    pub fn new(
        permission_store: Arc<dyn PermissionStore>,
        role_store: Arc<dyn RoleStore>,
        user_store: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            permission_store,
            role_store,
            user_store,
        }
    }

    /// Returns whether the user currently holds the permission.
    ///
    /// Deactivated accounts hold nothing, superusers hold everything.
    pub async fn has_permission(
        &self,
        user: &UserAccount,
        permission: &ScopeAction,
    ) -> AppResult<bool> {
        if !user.is_active {
            return Ok(false);
        }

        if user.is_superuser {
            return Ok(true);
        }

        let Some(role_id) = self.user_store.role_of_user(user.id).await? else {
            return Ok(false);
        };

        let Some(record) = self.permission_store.find_permission(permission).await? else {
            return Ok(false);
        };

        let Some(role) = self.role_store.find_role(role_id).await? else {
            return Ok(false);
        };

        Ok(role.permission_ids.contains(&record.id))
    }

    /// Ensures the user holds the permission, failing with `Forbidden`.
    pub async fn require_permission(
        &self,
        user: &UserAccount,
        permission: &ScopeAction,
    ) -> AppResult<()> {
        if self.has_permission(user, permission).await? {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "user '{}' is missing permission '{permission}'",
            user.username
        )))
    }
}
