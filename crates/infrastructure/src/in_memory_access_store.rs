use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use cirrus_application::{NewRole, PermissionStore, RoleStore, UserStore};
use cirrus_core::{AppError, AppResult, PermissionId, RoleId, UserId};
use cirrus_domain::{PermissionRecord, Role, ScopeAction, UserAccount};
use tokio::sync::RwLock;

/// In-memory implementation of all three access-control store ports.
///
/// Holding permissions, roles and memberships behind one struct keeps the
/// cascade rules consistent without cross-store coordination.
#[derive(Debug, Default)]
pub struct InMemoryAccessStore {
    permissions: RwLock<HashMap<PermissionId, PermissionRecord>>,
    scopes: RwLock<BTreeSet<String>>,
    roles: RwLock<HashMap<RoleId, Role>>,
    users: RwLock<HashMap<UserId, UserAccount>>,
    memberships: RwLock<HashMap<UserId, RoleId>>,
}

impl InMemoryAccessStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionStore for InMemoryAccessStore {
    async fn list_permissions(&self) -> AppResult<Vec<PermissionRecord>> {
        let permissions = self.permissions.read().await;

        let mut records: Vec<PermissionRecord> = permissions.values().cloned().collect();
        records.sort_by_key(|record| record.id);
        Ok(records)
    }

    async fn find_permission(&self, key: &ScopeAction) -> AppResult<Option<PermissionRecord>> {
        Ok(self
            .permissions
            .read()
            .await
            .values()
            .find(|record| &record.key == key)
            .cloned())
    }

    async fn find_permissions_by_ids(
        &self,
        permission_ids: &[PermissionId],
    ) -> AppResult<Vec<PermissionRecord>> {
        let permissions = self.permissions.read().await;

        Ok(permission_ids
            .iter()
            .filter_map(|permission_id| permissions.get(permission_id).cloned())
            .collect())
    }

    async fn create_permission(
        &self,
        key: &ScopeAction,
        description: &str,
    ) -> AppResult<PermissionRecord> {
        let mut permissions = self.permissions.write().await;
        if permissions.values().any(|record| &record.key == key) {
            return Err(AppError::Conflict(format!(
                "permission '{key}' already exists"
            )));
        }

        let next_id = permissions
            .keys()
            .map(|permission_id| permission_id.as_i64())
            .max()
            .unwrap_or(0)
            + 1;
        let record = PermissionRecord {
            id: PermissionId::new(next_id),
            key: key.clone(),
            description: description.to_owned(),
        };
        permissions.insert(record.id, record.clone());
        self.scopes.write().await.insert(key.scope().to_owned());
        Ok(record)
    }

    async fn update_permission_description(
        &self,
        permission_id: PermissionId,
        description: &str,
    ) -> AppResult<()> {
        let mut permissions = self.permissions.write().await;
        let record = permissions.get_mut(&permission_id).ok_or_else(|| {
            AppError::NotFound(format!("permission {permission_id} does not exist"))
        })?;

        record.description = description.to_owned();
        Ok(())
    }

    async fn delete_permission(&self, permission_id: PermissionId) -> AppResult<()> {
        let removed = self.permissions.write().await.remove(&permission_id);
        if removed.is_none() {
            return Err(AppError::NotFound(format!(
                "permission {permission_id} does not exist"
            )));
        }

        for role in self.roles.write().await.values_mut() {
            role.permission_ids.remove(&permission_id);
        }
        Ok(())
    }

    async fn list_scopes(&self) -> AppResult<Vec<String>> {
        Ok(self.scopes.read().await.iter().cloned().collect())
    }

    async fn register_scope(&self, scope: &str) -> AppResult<()> {
        self.scopes.write().await.insert(scope.to_owned());
        Ok(())
    }

    async fn delete_scope(&self, scope: &str) -> AppResult<()> {
        self.scopes.write().await.remove(scope);
        Ok(())
    }
}

#[async_trait]
impl RoleStore for InMemoryAccessStore {
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.roles.read().await.get(&role_id).cloned())
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let roles = self.roles.read().await;

        let mut values: Vec<Role> = roles.values().cloned().collect();
        values.sort_by_key(|role| role.id);
        Ok(values)
    }

    async fn create_role(&self, input: NewRole) -> AppResult<Role> {
        let mut roles = self.roles.write().await;
        if roles.values().any(|role| role.name == input.name) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                input.name
            )));
        }

        let next_id = roles
            .keys()
            .map(|role_id| role_id.as_i64())
            .max()
            .unwrap_or(0)
            + 1;
        let role = Role {
            id: RoleId::new(next_id),
            name: input.name,
            description: input.description,
            parent_id: input.parent_id,
            created_at: Utc::now(),
            permission_ids: BTreeSet::new(),
        };
        roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn upsert_role(
        &self,
        role_id: RoleId,
        name: &str,
        description: &str,
    ) -> AppResult<(Role, bool)> {
        let mut roles = self.roles.write().await;

        if let Some(role) = roles.get_mut(&role_id) {
            role.name = name.to_owned();
            role.description = description.to_owned();
            return Ok((role.clone(), false));
        }

        let role = Role {
            id: role_id,
            name: name.to_owned(),
            description: description.to_owned(),
            parent_id: None,
            created_at: Utc::now(),
            permission_ids: BTreeSet::new(),
        };
        roles.insert(role_id, role.clone());
        Ok((role, true))
    }

    async fn update_role_fields(
        &self,
        role_id: RoleId,
        name: &str,
        description: &str,
    ) -> AppResult<Role> {
        let mut roles = self.roles.write().await;
        let role = roles
            .get_mut(&role_id)
            .ok_or_else(|| AppError::NotFound(format!("role {role_id} does not exist")))?;

        role.name = name.to_owned();
        role.description = description.to_owned();
        Ok(role.clone())
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let removed = self.roles.write().await.remove(&role_id);
        if removed.is_none() {
            return Err(AppError::NotFound(format!("role {role_id} does not exist")));
        }

        self.memberships
            .write()
            .await
            .retain(|_, member_of| *member_of != role_id);
        Ok(())
    }

    async fn add_role_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        let role = roles
            .get_mut(&role_id)
            .ok_or_else(|| AppError::NotFound(format!("role {role_id} does not exist")))?;

        role.permission_ids.extend(permission_ids.iter().copied());
        Ok(())
    }

    async fn remove_role_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        let role = roles
            .get_mut(&role_id)
            .ok_or_else(|| AppError::NotFound(format!("role {role_id} does not exist")))?;

        for permission_id in permission_ids {
            role.permission_ids.remove(permission_id);
        }
        Ok(())
    }

    async fn list_role_members(&self, role_id: RoleId) -> AppResult<Vec<UserId>> {
        let memberships = self.memberships.read().await;

        let mut members: Vec<UserId> = memberships
            .iter()
            .filter_map(|(user_id, member_of)| (*member_of == role_id).then_some(*user_id))
            .collect();
        members.sort_unstable();
        Ok(members)
    }
}

#[async_trait]
impl UserStore for InMemoryAccessStore {
    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserAccount>> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn filter_existing(&self, user_ids: &[UserId]) -> AppResult<Vec<UserId>> {
        let users = self.users.read().await;

        Ok(user_ids
            .iter()
            .filter(|user_id| users.contains_key(user_id))
            .copied()
            .collect())
    }

    async fn upsert_user(&self, account: &UserAccount) -> AppResult<bool> {
        let created = self
            .users
            .write()
            .await
            .insert(account.id, account.clone())
            .is_none();
        Ok(created)
    }

    async fn role_of_user(&self, user_id: UserId) -> AppResult<Option<RoleId>> {
        Ok(self.memberships.read().await.get(&user_id).copied())
    }

    async fn set_role_of_user(&self, user_id: UserId, role_id: Option<RoleId>) -> AppResult<()> {
        let mut memberships = self.memberships.write().await;
        match role_id {
            Some(role_id) => {
                memberships.insert(user_id, role_id);
            }
            None => {
                memberships.remove(&user_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
