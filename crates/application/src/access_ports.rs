use async_trait::async_trait;
use cirrus_core::{AppResult, PermissionId, RoleId, UserId};
use cirrus_domain::{PermissionRecord, Role, ScopeAction, UserAccount};

/// Input payload for creating a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    /// Unique role name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Parent role reference, if any.
    pub parent_id: Option<RoleId>,
}

/// Store port for permission records and resource-scope records.
///
/// Implementations must keep (scope, action) unique and cascade-clear role
/// associations when a permission record is deleted.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Lists every permission record.
    async fn list_permissions(&self) -> AppResult<Vec<PermissionRecord>>;

    /// Looks up a permission record by its (scope, action) identity.
    async fn find_permission(&self, key: &ScopeAction) -> AppResult<Option<PermissionRecord>>;

    /// Returns the records matching the given ids; unknown ids are absent
    /// from the result rather than an error.
    async fn find_permissions_by_ids(
        &self,
        permission_ids: &[PermissionId],
    ) -> AppResult<Vec<PermissionRecord>>;

    /// Creates a permission record and registers its scope.
    async fn create_permission(
        &self,
        key: &ScopeAction,
        description: &str,
    ) -> AppResult<PermissionRecord>;

    /// Updates the mutable description of a permission record.
    async fn update_permission_description(
        &self,
        permission_id: PermissionId,
        description: &str,
    ) -> AppResult<()>;

    /// Deletes a permission record; role associations cascade-clear.
    async fn delete_permission(&self, permission_id: PermissionId) -> AppResult<()>;

    /// Lists every registered resource scope.
    async fn list_scopes(&self) -> AppResult<Vec<String>>;

    /// Registers a resource scope; registering twice is a no-op.
    async fn register_scope(&self, scope: &str) -> AppResult<()>;

    /// Deletes a resource-scope record.
    async fn delete_scope(&self, scope: &str) -> AppResult<()>;
}

/// Store port for roles, their permission sets and their member edges.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Looks up a role by id, including its permission set.
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>>;

    /// Lists every role ordered by id.
    async fn list_roles(&self) -> AppResult<Vec<Role>>;

    /// Creates a role; the name must be unique.
    async fn create_role(&self, input: NewRole) -> AppResult<Role>;

    /// Creates or updates a role under a fixed id, used for built-in role
    /// bootstrap. Returns the role and whether it was created.
    async fn upsert_role(
        &self,
        role_id: RoleId,
        name: &str,
        description: &str,
    ) -> AppResult<(Role, bool)>;

    /// Updates the mutable name and description of a role.
    async fn update_role_fields(
        &self,
        role_id: RoleId,
        name: &str,
        description: &str,
    ) -> AppResult<Role>;

    /// Deletes a role; membership edges and permission associations
    /// cascade-remove.
    async fn delete_role(&self, role_id: RoleId) -> AppResult<()>;

    /// Adds permissions to a role's set; already-present ids are no-ops.
    async fn add_role_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<()>;

    /// Removes permissions from a role's set; absent ids are no-ops.
    async fn remove_role_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<()>;

    /// Lists the users currently holding the role, ascending by id.
    async fn list_role_members(&self, role_id: RoleId) -> AppResult<Vec<UserId>>;
}

/// Store port for user accounts and their single-role membership.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Looks up a user account by id.
    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserAccount>>;

    /// Returns the subset of the given ids that exist in the store.
    async fn filter_existing(&self, user_ids: &[UserId]) -> AppResult<Vec<UserId>>;

    /// Creates or updates a user account under its fixed id, used for
    /// built-in account bootstrap. Returns whether it was created.
    async fn upsert_user(&self, account: &UserAccount) -> AppResult<bool>;

    /// Returns the role the user currently holds, if any.
    async fn role_of_user(&self, user_id: UserId) -> AppResult<Option<RoleId>>;

    /// Replaces the user's role membership, or clears it with `None`.
    /// Membership is singular: any prior edge is dropped first.
    async fn set_role_of_user(&self, user_id: UserId, role_id: Option<RoleId>) -> AppResult<()>;
}
