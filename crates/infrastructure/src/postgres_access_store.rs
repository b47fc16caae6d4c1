use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use cirrus_application::{NewRole, PermissionStore, RoleStore, UserStore};
use cirrus_core::{AppError, AppResult, PermissionId, RoleId, UserId};
use cirrus_domain::{PermissionRecord, Role, ScopeAction, UserAccount};

/// PostgreSQL-backed implementation of all three access-control store ports.
#[derive(Clone)]
pub struct PostgresAccessStore {
    pool: PgPool,
}

impl PostgresAccessStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PermissionRow {
    id: i64,
    scope: String,
    action: String,
    description: String,
}

impl PermissionRow {
    fn into_record(self) -> AppResult<PermissionRecord> {
        let key = ScopeAction::new(self.scope.as_str(), self.action.as_str()).map_err(|error| {
            AppError::Internal(format!(
                "failed to decode permission '{}.{}': {error}",
                self.scope, self.action
            ))
        })?;

        Ok(PermissionRecord {
            id: PermissionId::new(self.id),
            key,
            description: self.description,
        })
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    description: String,
    parent_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl RoleRow {
    fn into_role(self, permission_ids: impl IntoIterator<Item = i64>) -> Role {
        Role {
            id: RoleId::new(self.id),
            name: self.name,
            description: self.description,
            parent_id: self.parent_id.map(RoleId::new),
            created_at: self.created_at,
            permission_ids: permission_ids.into_iter().map(PermissionId::new).collect(),
        }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    is_superuser: bool,
    is_active: bool,
}

#[async_trait]
impl PermissionStore for PostgresAccessStore {
    async fn list_permissions(&self) -> AppResult<Vec<PermissionRecord>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT id, scope, action, description
            FROM access_permissions
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list permissions: {error}")))?;

        rows.into_iter().map(PermissionRow::into_record).collect()
    }

    async fn find_permission(&self, key: &ScopeAction) -> AppResult<Option<PermissionRecord>> {
        let row = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT id, scope, action, description
            FROM access_permissions
            WHERE scope = $1 AND action = $2
            "#,
        )
        .bind(key.scope())
        .bind(key.action())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find permission: {error}")))?;

        row.map(PermissionRow::into_record).transpose()
    }

    async fn find_permissions_by_ids(
        &self,
        permission_ids: &[PermissionId],
    ) -> AppResult<Vec<PermissionRecord>> {
        let ids: Vec<i64> = permission_ids
            .iter()
            .map(|permission_id| permission_id.as_i64())
            .collect();

        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT id, scope, action, description
            FROM access_permissions
            WHERE id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load permissions: {error}")))?;

        rows.into_iter().map(PermissionRow::into_record).collect()
    }

    async fn create_permission(
        &self,
        key: &ScopeAction,
        description: &str,
    ) -> AppResult<PermissionRecord> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO access_scopes (name)
            VALUES ($1)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(key.scope())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to register scope: {error}")))?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO access_permissions (scope, action, description)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(key.scope())
        .bind(key.action())
        .bind(description)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| map_unique_conflict(error, format!("permission '{key}'")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(PermissionRecord {
            id: PermissionId::new(id),
            key: key.clone(),
            description: description.to_owned(),
        })
    }

    async fn update_permission_description(
        &self,
        permission_id: PermissionId,
        description: &str,
    ) -> AppResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE access_permissions
            SET description = $2
            WHERE id = $1
            "#,
        )
        .bind(permission_id.as_i64())
        .bind(description)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to update permission description: {error}"))
        })?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "permission {permission_id} does not exist"
            )));
        }

        Ok(())
    }

    async fn delete_permission(&self, permission_id: PermissionId) -> AppResult<()> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM access_permissions
            WHERE id = $1
            "#,
        )
        .bind(permission_id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete permission: {error}")))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "permission {permission_id} does not exist"
            )));
        }

        Ok(())
    }

    async fn list_scopes(&self) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT name
            FROM access_scopes
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list scopes: {error}")))
    }

    async fn register_scope(&self, scope: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO access_scopes (name)
            VALUES ($1)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(scope)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to register scope: {error}")))?;

        Ok(())
    }

    async fn delete_scope(&self, scope: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM access_scopes
            WHERE name = $1
            "#,
        )
        .bind(scope)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete scope: {error}")))?;

        Ok(())
    }
}

#[async_trait]
impl RoleStore for PostgresAccessStore {
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        let Some(row) = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, description, parent_id, created_at
            FROM access_roles
            WHERE id = $1
            "#,
        )
        .bind(role_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role: {error}")))?
        else {
            return Ok(None);
        };

        let permission_ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT permission_id
            FROM access_role_permissions
            WHERE role_id = $1
            "#,
        )
        .bind(role_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role grants: {error}")))?;

        Ok(Some(row.into_role(permission_ids)))
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, description, parent_id, created_at
            FROM access_roles
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        let grants = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT role_id, permission_id
            FROM access_role_permissions
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role grants: {error}")))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let role_id = row.id;
                let permission_ids: Vec<i64> = grants
                    .iter()
                    .filter_map(|(grant_role_id, permission_id)| {
                        (*grant_role_id == role_id).then_some(*permission_id)
                    })
                    .collect();
                row.into_role(permission_ids)
            })
            .collect())
    }

    async fn create_role(&self, input: NewRole) -> AppResult<Role> {
        let row = sqlx::query_as::<_, RoleRow>(
            r#"
            INSERT INTO access_roles (name, description, parent_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, parent_id, created_at
            "#,
        )
        .bind(input.name.as_str())
        .bind(input.description.as_str())
        .bind(input.parent_id.map(|parent_id| parent_id.as_i64()))
        .fetch_one(&self.pool)
        .await
        .map_err(|error| map_unique_conflict(error, format!("role '{}'", input.name)))?;

        Ok(row.into_role(Vec::new()))
    }

    async fn upsert_role(
        &self,
        role_id: RoleId,
        name: &str,
        description: &str,
    ) -> AppResult<(Role, bool)> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let (row, created) = sqlx::query_as::<_, (i64, String, String, Option<i64>, DateTime<Utc>, bool)>(
            r#"
            INSERT INTO access_roles (id, name, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
                SET name = EXCLUDED.name, description = EXCLUDED.description
            RETURNING id, name, description, parent_id, created_at, (xmax = 0) AS created
            "#,
        )
        .bind(role_id.as_i64())
        .bind(name)
        .bind(description)
        .fetch_one(&mut *transaction)
        .await
        .map(|(id, name, description, parent_id, created_at, created)| {
            (
                RoleRow {
                    id,
                    name,
                    description,
                    parent_id,
                    created_at,
                },
                created,
            )
        })
        .map_err(|error| AppError::Internal(format!("failed to upsert role: {error}")))?;

        // Explicit-id inserts must not leave the identity sequence behind.
        sqlx::query(
            r#"
            SELECT setval(
                pg_get_serial_sequence('access_roles', 'id'),
                GREATEST((SELECT MAX(id) FROM access_roles), 1)
            )
            "#,
        )
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to advance role sequence: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        let permission_ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT permission_id
            FROM access_role_permissions
            WHERE role_id = $1
            "#,
        )
        .bind(role_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role grants: {error}")))?;

        Ok((row.into_role(permission_ids), created))
    }

    async fn update_role_fields(
        &self,
        role_id: RoleId,
        name: &str,
        description: &str,
    ) -> AppResult<Role> {
        let row = sqlx::query_as::<_, RoleRow>(
            r#"
            UPDATE access_roles
            SET name = $2, description = $3
            WHERE id = $1
            RETURNING id, name, description, parent_id, created_at
            "#,
        )
        .bind(role_id.as_i64())
        .bind(name)
        .bind(description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| map_unique_conflict(error, format!("role '{name}'")))?
        .ok_or_else(|| AppError::NotFound(format!("role {role_id} does not exist")))?;

        let permission_ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT permission_id
            FROM access_role_permissions
            WHERE role_id = $1
            "#,
        )
        .bind(role_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role grants: {error}")))?;

        Ok(row.into_role(permission_ids))
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM access_roles
            WHERE id = $1
            "#,
        )
        .bind(role_id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete role: {error}")))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("role {role_id} does not exist")));
        }

        Ok(())
    }

    async fn add_role_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        for permission_id in permission_ids {
            sqlx::query(
                r#"
                INSERT INTO access_role_permissions (role_id, permission_id)
                VALUES ($1, $2)
                ON CONFLICT (role_id, permission_id) DO NOTHING
                "#,
            )
            .bind(role_id.as_i64())
            .bind(permission_id.as_i64())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to persist role grants: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(())
    }

    async fn remove_role_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<()> {
        let ids: Vec<i64> = permission_ids
            .iter()
            .map(|permission_id| permission_id.as_i64())
            .collect();

        sqlx::query(
            r#"
            DELETE FROM access_role_permissions
            WHERE role_id = $1 AND permission_id = ANY($2)
            "#,
        )
        .bind(role_id.as_i64())
        .bind(&ids)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to revoke role grants: {error}")))?;

        Ok(())
    }

    async fn list_role_members(&self, role_id: RoleId) -> AppResult<Vec<UserId>> {
        let members = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT user_id
            FROM access_user_roles
            WHERE role_id = $1
            ORDER BY user_id
            "#,
        )
        .bind(role_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list role members: {error}")))?;

        Ok(members.into_iter().map(UserId::new).collect())
    }
}

#[async_trait]
impl UserStore for PostgresAccessStore {
    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserAccount>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, is_superuser, is_active
            FROM access_users
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find user: {error}")))?;

        Ok(row.map(|row| UserAccount {
            id: UserId::new(row.id),
            username: row.username,
            is_superuser: row.is_superuser,
            is_active: row.is_active,
        }))
    }

    async fn filter_existing(&self, user_ids: &[UserId]) -> AppResult<Vec<UserId>> {
        let ids: Vec<i64> = user_ids.iter().map(|user_id| user_id.as_i64()).collect();

        let found = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id
            FROM access_users
            WHERE id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to filter users: {error}")))?;

        Ok(found.into_iter().map(UserId::new).collect())
    }

    async fn upsert_user(&self, account: &UserAccount) -> AppResult<bool> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let created = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO access_users (id, username, is_superuser, is_active)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
                SET username = EXCLUDED.username,
                    is_superuser = EXCLUDED.is_superuser,
                    is_active = EXCLUDED.is_active
            RETURNING (xmax = 0) AS created
            "#,
        )
        .bind(account.id.as_i64())
        .bind(account.username.as_str())
        .bind(account.is_superuser)
        .bind(account.is_active)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to upsert user: {error}")))?;

        // Explicit-id inserts must not leave the identity sequence behind.
        sqlx::query(
            r#"
            SELECT setval(
                pg_get_serial_sequence('access_users', 'id'),
                GREATEST((SELECT MAX(id) FROM access_users), 1)
            )
            "#,
        )
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to advance user sequence: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(created)
    }

    async fn role_of_user(&self, user_id: UserId) -> AppResult<Option<RoleId>> {
        let role_id = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT role_id
            FROM access_user_roles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to resolve membership: {error}")))?;

        Ok(role_id.map(RoleId::new))
    }

    async fn set_role_of_user(&self, user_id: UserId, role_id: Option<RoleId>) -> AppResult<()> {
        match role_id {
            Some(role_id) => {
                sqlx::query(
                    r#"
                    INSERT INTO access_user_roles (user_id, role_id)
                    VALUES ($1, $2)
                    ON CONFLICT (user_id) DO UPDATE
                        SET role_id = EXCLUDED.role_id
                    "#,
                )
                .bind(user_id.as_i64())
                .bind(role_id.as_i64())
                .execute(&self.pool)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to assign membership: {error}"))
                })?;
            }
            None => {
                sqlx::query(
                    r#"
                    DELETE FROM access_user_roles
                    WHERE user_id = $1
                    "#,
                )
                .bind(user_id.as_i64())
                .execute(&self.pool)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to clear membership: {error}"))
                })?;
            }
        }

        Ok(())
    }
}

fn map_unique_conflict(error: sqlx::Error, entity: String) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("{entity} already exists"));
    }

    AppError::Internal(format!("failed to persist {entity}: {error}"))
}

#[cfg(test)]
mod tests;
