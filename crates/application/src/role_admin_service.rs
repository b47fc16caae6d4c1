use std::collections::BTreeSet;
use std::sync::Arc;

use cirrus_core::{AppError, NonEmptyString, PermissionId, RoleId, UserId};
use cirrus_domain::{
    AccessControlError, BUILT_IN_ROLE_IDS, BUILT_IN_USER_IDS, ROOT_ROLE_ID, Role, RoleSummary,
    sub_role_exclusions,
};
use tracing::info;

use crate::access_ports::{NewRole, PermissionStore, RoleStore, UserStore};

/// Input payload for creating a sub-role under the root role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSubRoleInput {
    /// Unique role name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Parent role id; must be the root role.
    pub parent_id: RoleId,
    /// Permissions to grant, drawn from the parent's grantable set.
    pub permission_ids: Vec<PermissionId>,
}

/// Input payload for updating a non-built-in role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRoleInput {
    /// Role to update.
    pub role_id: RoleId,
    /// New role name.
    pub name: String,
    /// New description.
    pub description: String,
    /// Full replacement permission set; the service applies the delta.
    pub permission_ids: Vec<PermissionId>,
}

/// Application service for role hierarchy and membership mutation.
///
/// Every operation validates fully before committing, so a returned error
/// implies no partial mutation.
#[derive(Clone)]
pub struct RoleAdminService {
    permission_store: Arc<dyn PermissionStore>,
    role_store: Arc<dyn RoleStore>,
    user_store: Arc<dyn UserStore>,
}

impl RoleAdminService {
    /// Creates a new service from store implementations.
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

    /// Creates a sub-role under the root role.
    ///
    /// The grantable set is the parent's permission set minus the fixed
    /// sub-role exclusion list.
    pub async fn create_sub_role(
        &self,
        input: CreateSubRoleInput,
    ) -> Result<RoleSummary, AccessControlError> {
        if input.parent_id != ROOT_ROLE_ID {
            return Err(AccessControlError::InvalidHierarchy {
                parent_id: input.parent_id,
            });
        }

        let name = NonEmptyString::new(input.name)?;
        let parent = self.load_role(input.parent_id).await?;

        let mut available = parent.permission_ids.clone();
        for excluded in sub_role_exclusions() {
            if let Some(record) = self.permission_store.find_permission(&excluded).await? {
                available.remove(&record.id);
            }
        }

        let requested = dedup_sorted(input.permission_ids);
        let illegal: Vec<PermissionId> = requested
            .iter()
            .filter(|permission_id| !available.contains(permission_id))
            .copied()
            .collect();
        if !illegal.is_empty() {
            return Err(AccessControlError::IllegalPermission {
                permission_ids: illegal,
            });
        }

        let role = self
            .role_store
            .create_role(NewRole {
                name: name.into(),
                description: input.description,
                parent_id: Some(ROOT_ROLE_ID),
            })
            .await?;
        self.role_store
            .add_role_permissions(role.id, &requested)
            .await?;

        info!(role_id = %role.id, name = %role.name, "created sub-role");
        self.summarize(role.id).await
    }

    /// Updates a role's name, description and permission set.
    ///
    /// Permission ids are only checked for existence here, not against the
    /// parent's grantable set; creation is the stricter path.
    pub async fn update_role(
        &self,
        input: UpdateRoleInput,
    ) -> Result<RoleSummary, AccessControlError> {
        if BUILT_IN_ROLE_IDS.contains(&input.role_id) {
            return Err(AccessControlError::ProtectedRole {
                role_id: input.role_id,
            });
        }

        let name = NonEmptyString::new(input.name)?;
        let role = self.load_role(input.role_id).await?;

        let requested = dedup_sorted(input.permission_ids);
        let known: BTreeSet<PermissionId> = self
            .permission_store
            .find_permissions_by_ids(&requested)
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect();
        let unknown: Vec<PermissionId> = requested
            .iter()
            .filter(|permission_id| !known.contains(permission_id))
            .copied()
            .collect();
        if !unknown.is_empty() {
            return Err(AccessControlError::UnknownPermission {
                permission_ids: unknown,
            });
        }

        self.role_store
            .update_role_fields(role.id, name.as_str(), input.description.as_str())
            .await?;

        let requested_set: BTreeSet<PermissionId> = requested.iter().copied().collect();
        let to_add: Vec<PermissionId> = requested
            .iter()
            .filter(|permission_id| !role.permission_ids.contains(permission_id))
            .copied()
            .collect();
        let to_remove: Vec<PermissionId> = role
            .permission_ids
            .iter()
            .filter(|permission_id| !requested_set.contains(permission_id))
            .copied()
            .collect();
        self.role_store.add_role_permissions(role.id, &to_add).await?;
        self.role_store
            .remove_role_permissions(role.id, &to_remove)
            .await?;

        info!(role_id = %role.id, added = to_add.len(), removed = to_remove.len(), "updated role");
        self.summarize(role.id).await
    }

    /// Deletes a role; membership and permission associations cascade.
    pub async fn delete_role(&self, role_id: RoleId) -> Result<(), AccessControlError> {
        if BUILT_IN_ROLE_IDS.contains(&role_id) {
            return Err(AccessControlError::OperationNotAllowed { role_id });
        }

        let role = self.load_role(role_id).await?;
        self.role_store.delete_role(role.id).await?;
        info!(role_id = %role.id, name = %role.name, "deleted role");
        Ok(())
    }

    /// Adds users to a role. Membership is singular, so each user's prior
    /// role membership is replaced.
    pub async fn add_users(
        &self,
        role_id: RoleId,
        user_ids: &[UserId],
    ) -> Result<RoleSummary, AccessControlError> {
        let role = self.membership_target(role_id).await?;
        let requested = self.validate_members(user_ids).await?;

        for user_id in &requested {
            self.user_store
                .set_role_of_user(*user_id, Some(role.id))
                .await?;
        }

        info!(role_id = %role.id, users = requested.len(), "added users to role");
        self.summarize(role.id).await
    }

    /// Removes users from a role. Users that are not members are ignored.
    pub async fn remove_users(
        &self,
        role_id: RoleId,
        user_ids: &[UserId],
    ) -> Result<RoleSummary, AccessControlError> {
        let role = self.membership_target(role_id).await?;
        let requested = self.validate_members(user_ids).await?;

        for user_id in &requested {
            if self.user_store.role_of_user(*user_id).await? == Some(role.id) {
                self.user_store.set_role_of_user(*user_id, None).await?;
            }
        }

        info!(role_id = %role.id, users = requested.len(), "removed users from role");
        self.summarize(role.id).await
    }

    /// Lists every role as a serializable summary, ordered by id.
    pub async fn list_roles(&self) -> Result<Vec<RoleSummary>, AccessControlError> {
        let mut summaries = Vec::new();
        for role in self.role_store.list_roles().await? {
            let members = self.role_store.list_role_members(role.id).await?;
            summaries.push(role.summarize(members.len()));
        }
        Ok(summaries)
    }

    async fn membership_target(&self, role_id: RoleId) -> Result<Role, AccessControlError> {
        let role = self.load_role(role_id).await?;
        if role.is_root() {
            return Err(AccessControlError::InvalidRole { role_id });
        }
        Ok(role)
    }

    async fn validate_members(
        &self,
        user_ids: &[UserId],
    ) -> Result<Vec<UserId>, AccessControlError> {
        let requested = dedup_sorted(user_ids.to_vec());

        let existing: BTreeSet<UserId> = self
            .user_store
            .filter_existing(&requested)
            .await?
            .into_iter()
            .collect();
        let missing: Vec<UserId> = requested
            .iter()
            .filter(|user_id| !existing.contains(user_id))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(AccessControlError::UnknownUser { user_ids: missing });
        }

        let protected: Vec<UserId> = requested
            .iter()
            .filter(|user_id| BUILT_IN_USER_IDS.contains(user_id))
            .copied()
            .collect();
        if !protected.is_empty() {
            return Err(AccessControlError::ProtectedUser {
                user_ids: protected,
            });
        }

        Ok(requested)
    }

    async fn load_role(&self, role_id: RoleId) -> Result<Role, AccessControlError> {
        let role = self
            .role_store
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role {role_id} does not exist")))?;
        Ok(role)
    }

    async fn summarize(&self, role_id: RoleId) -> Result<RoleSummary, AccessControlError> {
        let role = self.load_role(role_id).await?;
        let members = self.role_store.list_role_members(role.id).await?;
        Ok(role.summarize(members.len()))
    }
}

fn dedup_sorted<T: Ord + Copy>(mut values: Vec<T>) -> Vec<T> {
    values.sort_unstable();
    values.dedup();
    values
}
