use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use cirrus_core::{AppError, AppResult, PermissionId, RoleId};
use cirrus_domain::{
    PermissionCatalog, ReconcileError, RoleTemplate, ScopeAction, built_in_users,
};
use serde::Serialize;
use tracing::info;

use crate::access_ports::{PermissionStore, RoleStore, UserStore};

/// Grant changes applied to one role during a reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleReconciliation {
    /// Permissions granted to the role, as `scope.action` strings.
    pub added: Vec<String>,
    /// Permissions revoked from the role, as `scope.action` strings.
    pub removed: Vec<String>,
}

/// Summary of one reconciliation run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Count of permission descriptions rewritten from the catalog.
    pub updated_descriptions: usize,
    /// Deleted permission records no longer declared anywhere.
    pub pruned_permissions: Vec<String>,
    /// Grant changes per role template, keyed by template name.
    pub per_role: BTreeMap<String, RoleReconciliation>,
    /// Deleted resource scopes no longer declared by any module.
    pub pruned_scopes: Vec<String>,
}

/// Deploy-time service that converges stored permission and role state onto
/// the code-declared catalog and role templates.
#[derive(Clone)]
pub struct ReconciliationService {
    permission_store: Arc<dyn PermissionStore>,
    role_store: Arc<dyn RoleStore>,
    user_store: Arc<dyn UserStore>,
}

impl ReconciliationService {
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

    /// Registers every catalog declaration, creating scope and permission
    /// records that do not exist yet. Returns the newly created pairs.
    ///
    /// This is the registration step reconciliation depends on; running it
    /// twice creates nothing the second time.
    pub async fn register_catalog(
        &self,
        catalog: &PermissionCatalog,
    ) -> AppResult<Vec<ScopeAction>> {
        let mut created = Vec::new();

        for module in catalog.modules() {
            self.permission_store.register_scope(module.scope()).await?;

            for entry in module.entries() {
                let key = ScopeAction::new(module.scope(), entry.action.as_str())?;
                if self.permission_store.find_permission(&key).await?.is_none() {
                    self.permission_store
                        .create_permission(&key, entry.description.as_str())
                        .await?;
                    created.push(key);
                }
            }
        }

        info!(created = created.len(), "registered permission catalog");
        Ok(created)
    }

    /// Runs a full reconciliation pass.
    ///
    /// Order: template validation, built-in account and role bootstrap,
    /// description sync, orphan permission pruning, per-template grant
    /// convergence, stale scope pruning. Configuration errors abort the run
    /// before the corresponding state is committed.
    pub async fn reconcile_all(
        &self,
        catalog: &PermissionCatalog,
        templates: &[RoleTemplate],
    ) -> Result<ReconcileReport, ReconcileError> {
        let mut flattened = Vec::with_capacity(templates.len());
        for template in templates {
            flattened.push((template, template.flattened()?));
        }

        let mut report = ReconcileReport::default();

        self.bootstrap_built_ins(templates).await?;
        report.updated_descriptions = self.sync_descriptions(catalog).await?;
        report.pruned_permissions = self.prune_orphan_permissions(catalog).await?;
        for (template, declared) in &flattened {
            let changes = self.converge_role(template, declared).await?;
            report.per_role.insert(template.name.clone(), changes);
        }
        report.pruned_scopes = self.prune_stale_scopes(catalog).await?;

        info!(
            updated_descriptions = report.updated_descriptions,
            pruned_permissions = report.pruned_permissions.len(),
            pruned_scopes = report.pruned_scopes.len(),
            "reconciliation run complete"
        );
        Ok(report)
    }

    /// Converges the built-in accounts and role rows onto their fixed ids.
    /// A freshly created built-in account is assigned the role sharing its
    /// id; existing accounts keep whatever membership they have.
    async fn bootstrap_built_ins(&self, templates: &[RoleTemplate]) -> AppResult<()> {
        for template in templates {
            self.role_store
                .upsert_role(
                    template.role_id,
                    template.name.as_str(),
                    template.description.as_str(),
                )
                .await?;
        }

        for account in built_in_users() {
            let created = self.user_store.upsert_user(&account).await?;
            if !created {
                continue;
            }

            // Built-in account ids mirror their role ids.
            let role_id = RoleId::new(account.id.as_i64());
            if templates.iter().any(|template| template.role_id == role_id) {
                self.user_store
                    .set_role_of_user(account.id, Some(role_id))
                    .await?;
            }
        }

        Ok(())
    }

    /// Rewrites stored descriptions from the catalog for scopes on the
    /// description-sync allow-list.
    async fn sync_descriptions(&self, catalog: &PermissionCatalog) -> AppResult<usize> {
        let mut updated = 0;

        for record in self.permission_store.list_permissions().await? {
            if !catalog.syncs_descriptions_for(record.key.scope()) {
                continue;
            }

            let Some(declared) = catalog.description_of(&record.key) else {
                continue;
            };
            if record.description != declared {
                self.permission_store
                    .update_permission_description(record.id, declared)
                    .await?;
                updated += 1;
            }
        }

        Ok(updated)
    }

    /// Deletes permission records whose (scope, action) pair no module
    /// declares any more. Role associations cascade in the store.
    async fn prune_orphan_permissions(
        &self,
        catalog: &PermissionCatalog,
    ) -> AppResult<Vec<String>> {
        let declared = catalog.declared_pairs();
        let mut pruned = Vec::new();

        for record in self.permission_store.list_permissions().await? {
            if declared.contains(&record.key) {
                continue;
            }

            self.permission_store.delete_permission(record.id).await?;
            info!(permission = %record.key, "pruned orphan permission");
            pruned.push(record.key.to_string());
        }

        Ok(pruned)
    }

    /// Converges one role's grant set onto its template declaration.
    async fn converge_role(
        &self,
        template: &RoleTemplate,
        declared: &[ScopeAction],
    ) -> Result<RoleReconciliation, ReconcileError> {
        let role = self
            .role_store
            .find_role(template.role_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("role {} does not exist", template.role_id))
            })?;

        let current_ids: Vec<PermissionId> = role.permission_ids.iter().copied().collect();
        let current = self
            .permission_store
            .find_permissions_by_ids(&current_ids)
            .await?;
        let declared_set: BTreeSet<&ScopeAction> = declared.iter().collect();

        let mut changes = RoleReconciliation::default();

        let stale: Vec<PermissionId> = current
            .iter()
            .filter(|record| !declared_set.contains(&record.key))
            .map(|record| record.id)
            .collect();
        if !stale.is_empty() {
            self.role_store
                .remove_role_permissions(role.id, &stale)
                .await?;
            changes.removed = current
                .iter()
                .filter(|record| !declared_set.contains(&record.key))
                .map(|record| record.key.to_string())
                .collect();
        }

        let current_keys: BTreeSet<&ScopeAction> =
            current.iter().map(|record| &record.key).collect();
        let mut missing = Vec::new();
        for key in declared {
            if current_keys.contains(key) {
                continue;
            }

            let record = self.permission_store.find_permission(key).await?.ok_or_else(
                || ReconcileError::MissingCatalogRegistration {
                    template: template.name.clone(),
                    entry: key.clone(),
                },
            )?;
            missing.push(record.id);
            changes.added.push(key.to_string());
        }
        if !missing.is_empty() {
            self.role_store
                .add_role_permissions(role.id, &missing)
                .await?;
        }

        if !changes.added.is_empty() || !changes.removed.is_empty() {
            info!(
                role = template.name.as_str(),
                added = changes.added.len(),
                removed = changes.removed.len(),
                "converged role grants"
            );
        }

        Ok(changes)
    }

    /// Deletes scope records no declared module covers any more.
    async fn prune_stale_scopes(&self, catalog: &PermissionCatalog) -> AppResult<Vec<String>> {
        let declared = catalog.declared_scopes();
        let mut pruned = Vec::new();

        for scope in self.permission_store.list_scopes().await? {
            if declared.contains(&scope) {
                continue;
            }

            self.permission_store.delete_scope(scope.as_str()).await?;
            info!(scope = scope.as_str(), "pruned stale scope");
            pruned.push(scope);
        }

        Ok(pruned)
    }
}
