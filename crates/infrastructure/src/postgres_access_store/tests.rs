use std::sync::Arc;

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use cirrus_application::{
    CreateSubRoleInput, PermissionStore, ReconciliationService, RoleAdminService, UserStore,
};
use cirrus_core::{RoleId, UserId};
use cirrus_domain::{
    ROOT_ROLE_ID, ScopeAction, UserAccount, built_in_catalog, built_in_role_templates,
};

use super::PostgresAccessStore;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres access store tests: {error}");
    }

    Some(pool)
}

async fn reset(pool: &PgPool) {
    let truncated = sqlx::query(
        r#"
        TRUNCATE access_user_roles, access_role_permissions, access_users,
            access_roles, access_permissions, access_scopes
        "#,
    )
    .execute(pool)
    .await;

    assert!(truncated.is_ok());
}

#[tokio::test]
async fn reconciliation_provisions_and_is_idempotent() {
    let Some(pool) = test_pool().await else {
        return;
    };
    reset(&pool).await;

    let store = Arc::new(PostgresAccessStore::new(pool));
    let service = ReconciliationService::new(store.clone(), store.clone(), store.clone());
    let catalog = built_in_catalog().unwrap_or_else(|_| unreachable!());
    let templates = built_in_role_templates();

    let registered = service.register_catalog(&catalog).await;
    assert_eq!(
        registered.unwrap_or_default().len(),
        catalog.declared_pairs().len()
    );

    let first = service.reconcile_all(&catalog, &templates).await;
    assert!(first.is_ok());

    let rerun = service.reconcile_all(&catalog, &templates).await;
    assert!(rerun.is_ok());
    let rerun = rerun.unwrap_or_default();
    assert_eq!(rerun.updated_descriptions, 0);
    assert!(rerun.pruned_permissions.is_empty());
    for changes in rerun.per_role.values() {
        assert!(changes.added.is_empty() && changes.removed.is_empty());
    }
}

#[tokio::test]
async fn membership_replacement_is_singular() {
    let Some(pool) = test_pool().await else {
        return;
    };
    reset(&pool).await;

    let store = Arc::new(PostgresAccessStore::new(pool));
    let reconciliation =
        ReconciliationService::new(store.clone(), store.clone(), store.clone());
    let admin = RoleAdminService::new(store.clone(), store.clone(), store.clone());
    let catalog = built_in_catalog().unwrap_or_else(|_| unreachable!());

    let registered = reconciliation.register_catalog(&catalog).await;
    assert!(registered.is_ok());
    let report = reconciliation
        .reconcile_all(&catalog, &built_in_role_templates())
        .await;
    assert!(report.is_ok());

    let account = UserAccount {
        id: UserId::new(50),
        username: "carol".to_owned(),
        is_superuser: false,
        is_active: true,
    };
    let upserted = store.upsert_user(&account).await;
    assert!(upserted.is_ok());

    let key = ScopeAction::new("auth", "list_role").unwrap_or_else(|_| unreachable!());
    let grant = store
        .find_permission(&key)
        .await
        .unwrap_or_default()
        .map(|record| record.id);
    assert!(grant.is_some());

    let created = admin
        .create_sub_role(CreateSubRoleInput {
            name: "viewers".to_owned(),
            description: String::new(),
            parent_id: ROOT_ROLE_ID,
            permission_ids: grant.into_iter().collect(),
        })
        .await;
    assert!(created.is_ok());
    let role_id = created
        .map(|summary| summary.id)
        .unwrap_or_else(|_| unreachable!());

    let joined = admin.add_users(RoleId::new(2), &[account.id]).await;
    assert!(joined.is_ok());
    let moved = admin.add_users(role_id, &[account.id]).await;
    assert!(moved.is_ok());

    let membership = store.role_of_user(account.id).await.unwrap_or_default();
    assert_eq!(membership, Some(role_id));
}
