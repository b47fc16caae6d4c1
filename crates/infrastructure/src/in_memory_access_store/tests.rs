use std::sync::Arc;

use cirrus_application::{
    AccessEvaluator, CreateSubRoleInput, PermissionStore, ReconciliationService, RoleAdminService,
    UpdateRoleInput, UserStore,
};
use cirrus_core::{PermissionId, RoleId, UserId};
use cirrus_domain::{
    AccessControlError, BUILT_IN_ROLE_IDS, CatalogEntry, CatalogModule, PermissionCatalog,
    ROOT_ROLE_ID, SYSTEM_ADMIN_USER_ID, ScopeAction, UserAccount, built_in_catalog,
    built_in_role_templates,
};

use super::InMemoryAccessStore;

struct Harness {
    store: Arc<InMemoryAccessStore>,
    reconciliation: ReconciliationService,
    admin: RoleAdminService,
    evaluator: AccessEvaluator,
}

/// Stands up a store with the built-in catalog registered and the built-in
/// roles reconciled, the state a deployment starts from.
async fn provisioned() -> Harness {
    let store = Arc::new(InMemoryAccessStore::new());
    let reconciliation =
        ReconciliationService::new(store.clone(), store.clone(), store.clone());
    let admin = RoleAdminService::new(store.clone(), store.clone(), store.clone());
    let evaluator = AccessEvaluator::new(store.clone(), store.clone(), store.clone());

    let catalog = built_in_catalog().unwrap_or_else(|_| unreachable!());
    let registered = reconciliation.register_catalog(&catalog).await;
    assert!(registered.is_ok());
    let report = reconciliation
        .reconcile_all(&catalog, &built_in_role_templates())
        .await;
    assert!(report.is_ok());

    Harness {
        store,
        reconciliation,
        admin,
        evaluator,
    }
}

async fn permission_id(store: &InMemoryAccessStore, scope: &str, action: &str) -> PermissionId {
    let key = ScopeAction::new(scope, action).unwrap_or_else(|_| unreachable!());
    store
        .find_permission(&key)
        .await
        .unwrap_or_default()
        .map(|record| record.id)
        .unwrap_or_else(|| unreachable!())
}

async fn regular_user(store: &InMemoryAccessStore, id: i64, username: &str) -> UserAccount {
    let account = UserAccount {
        id: UserId::new(id),
        username: username.to_owned(),
        is_superuser: false,
        is_active: true,
    };
    let upserted = store.upsert_user(&account).await;
    assert!(upserted.is_ok());
    account
}

#[tokio::test]
async fn reconciliation_rerun_changes_nothing() {
    let harness = provisioned().await;
    let catalog = built_in_catalog().unwrap_or_else(|_| unreachable!());

    let rerun = harness
        .reconciliation
        .reconcile_all(&catalog, &built_in_role_templates())
        .await;
    assert!(rerun.is_ok());
    let rerun = rerun.unwrap_or_default();

    assert_eq!(rerun.updated_descriptions, 0);
    assert!(rerun.pruned_permissions.is_empty());
    assert!(rerun.pruned_scopes.is_empty());
    for changes in rerun.per_role.values() {
        assert!(changes.added.is_empty());
        assert!(changes.removed.is_empty());
    }
}

#[tokio::test]
async fn root_role_holds_the_entire_catalog() {
    let harness = provisioned().await;
    let catalog = built_in_catalog().unwrap_or_else(|_| unreachable!());

    let root = harness.store.roles.read().await.get(&ROOT_ROLE_ID).cloned();
    assert_eq!(
        root.map(|role| role.permission_ids.len()),
        Some(catalog.declared_pairs().len())
    );
}

#[tokio::test]
async fn sub_roles_cannot_receive_reserved_permissions() {
    let harness = provisioned().await;
    let reserved = permission_id(&harness.store, "auth", "create_role").await;
    let allowed = permission_id(&harness.store, "compute", "list_instance").await;

    let result = harness
        .admin
        .create_sub_role(CreateSubRoleInput {
            name: "operators".to_owned(),
            description: String::new(),
            parent_id: ROOT_ROLE_ID,
            permission_ids: vec![allowed, reserved],
        })
        .await;
    assert!(matches!(
        result,
        Err(AccessControlError::IllegalPermission { ref permission_ids })
            if permission_ids == &vec![reserved]
    ));
}

#[tokio::test]
async fn built_in_roles_reject_update_and_delete() {
    let harness = provisioned().await;

    for role_id in BUILT_IN_ROLE_IDS {
        let updated = harness
            .admin
            .update_role(UpdateRoleInput {
                role_id,
                name: "renamed".to_owned(),
                description: String::new(),
                permission_ids: Vec::new(),
            })
            .await;
        assert!(matches!(
            updated,
            Err(AccessControlError::ProtectedRole { role_id: rejected }) if rejected == role_id
        ));

        let deleted = harness.admin.delete_role(role_id).await;
        assert!(matches!(
            deleted,
            Err(AccessControlError::OperationNotAllowed { role_id: rejected })
                if rejected == role_id
        ));
    }
}

#[tokio::test]
async fn membership_is_singular_across_roles() {
    let harness = provisioned().await;
    let carol = regular_user(&harness.store, 50, "carol").await;
    let list_role = permission_id(&harness.store, "auth", "list_role").await;
    let list_user = permission_id(&harness.store, "base", "list_user").await;

    let first = harness
        .admin
        .create_sub_role(CreateSubRoleInput {
            name: "first-line".to_owned(),
            description: String::new(),
            parent_id: ROOT_ROLE_ID,
            permission_ids: vec![list_role],
        })
        .await;
    let second = harness
        .admin
        .create_sub_role(CreateSubRoleInput {
            name: "second-line".to_owned(),
            description: String::new(),
            parent_id: ROOT_ROLE_ID,
            permission_ids: vec![list_user],
        })
        .await;
    assert!(first.is_ok() && second.is_ok());
    let first_id = first.map(|summary| summary.id).unwrap_or_else(|_| unreachable!());
    let second_id = second.map(|summary| summary.id).unwrap_or_else(|_| unreachable!());

    let joined = harness.admin.add_users(first_id, &[carol.id]).await;
    assert!(joined.is_ok());
    let moved = harness.admin.add_users(second_id, &[carol.id]).await;
    assert!(moved.is_ok());
    assert_eq!(moved.map(|summary| summary.member_count).unwrap_or(0), 1);

    let summaries = harness.admin.list_roles().await.unwrap_or_default();
    let first_members = summaries
        .iter()
        .find(|summary| summary.id == first_id)
        .map(|summary| summary.member_count);
    assert_eq!(first_members, Some(0));
}

#[tokio::test]
async fn evaluation_reflects_the_single_role_grants() {
    let harness = provisioned().await;
    let carol = regular_user(&harness.store, 50, "carol").await;
    let list_role = permission_id(&harness.store, "auth", "list_role").await;

    let created = harness
        .admin
        .create_sub_role(CreateSubRoleInput {
            name: "viewers".to_owned(),
            description: String::new(),
            parent_id: ROOT_ROLE_ID,
            permission_ids: vec![list_role],
        })
        .await;
    assert!(created.is_ok());
    let role_id = created.map(|summary| summary.id).unwrap_or_else(|_| unreachable!());
    let joined = harness.admin.add_users(role_id, &[carol.id]).await;
    assert!(joined.is_ok());

    let granted = ScopeAction::new("auth", "list_role").unwrap_or_else(|_| unreachable!());
    let withheld = ScopeAction::new("base", "list_user").unwrap_or_else(|_| unreachable!());
    let allowed = harness.evaluator.has_permission(&carol, &granted).await;
    let denied = harness.evaluator.has_permission(&carol, &withheld).await;
    assert!(allowed.unwrap_or(false));
    assert!(!denied.unwrap_or(true));
}

#[tokio::test]
async fn unknown_users_are_reported_together() {
    let harness = provisioned().await;
    let carol = regular_user(&harness.store, 50, "carol").await;

    let result = harness
        .admin
        .add_users(
            RoleId::new(2),
            &[carol.id, UserId::new(999_999), UserId::new(999_998)],
        )
        .await;
    assert!(matches!(
        result,
        Err(AccessControlError::UnknownUser { ref user_ids })
            if user_ids == &vec![UserId::new(999_998), UserId::new(999_999)]
    ));
    assert_eq!(harness.store.role_of_user(carol.id).await.unwrap_or_default(), None);
}

#[tokio::test]
async fn built_in_accounts_cannot_change_membership() {
    let harness = provisioned().await;

    let result = harness
        .admin
        .add_users(RoleId::new(2), &[SYSTEM_ADMIN_USER_ID])
        .await;
    assert!(matches!(
        result,
        Err(AccessControlError::ProtectedUser { ref user_ids })
            if user_ids == &vec![SYSTEM_ADMIN_USER_ID]
    ));
}

#[tokio::test]
async fn narrowed_catalog_prunes_grants_everywhere() {
    let harness = provisioned().await;
    let carol = regular_user(&harness.store, 50, "carol").await;
    let dashboard = permission_id(&harness.store, "compute", "get_dashboard").await;

    let created = harness
        .admin
        .create_sub_role(CreateSubRoleInput {
            name: "dashboard-only".to_owned(),
            description: String::new(),
            parent_id: ROOT_ROLE_ID,
            permission_ids: vec![dashboard],
        })
        .await;
    assert!(created.is_ok());
    let role_id = created.map(|summary| summary.id).unwrap_or_else(|_| unreachable!());
    let joined = harness.admin.add_users(role_id, &[carol.id]).await;
    assert!(joined.is_ok());

    // A later deployment stops declaring everything but auth.list_role.
    let narrowed = PermissionCatalog::new(vec![
        CatalogModule::new(
            "auth",
            vec![CatalogEntry::new("list_role", "Can view role list")],
        )
        .unwrap_or_else(|_| unreachable!()),
    ])
    .unwrap_or_else(|_| unreachable!());

    let report = harness.reconciliation.reconcile_all(&narrowed, &[]).await;
    assert!(report.is_ok());
    let report = report.unwrap_or_default();
    assert!(report
        .pruned_permissions
        .contains(&"compute.get_dashboard".to_owned()));
    assert!(report.pruned_scopes.contains(&"compute".to_owned()));

    let key = ScopeAction::new("compute", "get_dashboard").unwrap_or_else(|_| unreachable!());
    let decision = harness.evaluator.has_permission(&carol, &key).await;
    assert!(decision.is_ok());
    assert!(!decision.unwrap_or(true));
}
