use std::collections::BTreeSet;

use cirrus_core::{AppError, AppResult, RoleId};

use crate::error::ReconcileError;
use crate::permission::ScopeAction;

/// One declared capability inside a catalog module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Action name, unique within the module's scope.
    pub action: String,
    /// Human-readable description synchronized into the store.
    pub description: String,
}

impl CatalogEntry {
    /// Creates a catalog entry.
    #[must_use]
    pub fn new(action: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            description: description.into(),
        }
    }
}

/// Permissions declared by one application module under a single scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogModule {
    scope: String,
    entries: Vec<CatalogEntry>,
}

impl CatalogModule {
    /// Creates a module declaration.
    ///
    /// A duplicate action within the declaration is a configuration error
    /// and fails fast instead of being silently deduplicated.
    pub fn new(scope: impl Into<String>, entries: Vec<CatalogEntry>) -> AppResult<Self> {
        let scope = scope.into();
        if scope.is_empty() || scope.contains('.') {
            return Err(AppError::Validation(format!(
                "invalid catalog scope '{scope}'"
            )));
        }

        let mut seen = BTreeSet::new();
        for entry in &entries {
            ScopeAction::new(scope.as_str(), entry.action.as_str())?;
            if !seen.insert(entry.action.as_str()) {
                return Err(AppError::Validation(format!(
                    "module '{scope}' declares action '{}' more than once",
                    entry.action
                )));
            }
        }

        Ok(Self { scope, entries })
    }

    /// Returns the module's scope namespace.
    #[must_use]
    pub fn scope(&self) -> &str {
        self.scope.as_str()
    }

    /// Returns the declared entries in declaration order.
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        self.entries.as_slice()
    }
}

/// The code-declared permission catalog, frozen for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionCatalog {
    modules: Vec<CatalogModule>,
    sync_scopes: BTreeSet<String>,
}

impl PermissionCatalog {
    /// Creates a catalog from module declarations.
    ///
    /// Description synchronization defaults to every declared scope; use
    /// [`PermissionCatalog::restrict_description_sync`] to narrow it.
    pub fn new(modules: Vec<CatalogModule>) -> AppResult<Self> {
        let mut scopes = BTreeSet::new();
        for module in &modules {
            if !scopes.insert(module.scope().to_owned()) {
                return Err(AppError::Validation(format!(
                    "catalog declares scope '{}' more than once",
                    module.scope()
                )));
            }
        }

        Ok(Self {
            modules,
            sync_scopes: scopes,
        })
    }

    /// Restricts description synchronization to the given scope allow-list.
    /// Orphan pruning still considers every declared module.
    #[must_use]
    pub fn restrict_description_sync(mut self, scopes: impl IntoIterator<Item = String>) -> Self {
        self.sync_scopes = scopes.into_iter().collect();
        self
    }

    /// Returns the declared modules.
    #[must_use]
    pub fn modules(&self) -> &[CatalogModule] {
        self.modules.as_slice()
    }

    /// Returns every declared scope.
    #[must_use]
    pub fn declared_scopes(&self) -> BTreeSet<String> {
        self.modules
            .iter()
            .map(|module| module.scope().to_owned())
            .collect()
    }

    /// Returns whether description sync covers the scope.
    #[must_use]
    pub fn syncs_descriptions_for(&self, scope: &str) -> bool {
        self.sync_scopes.contains(scope)
    }

    /// Returns the full set of declared (scope, action) pairs.
    #[must_use]
    pub fn declared_pairs(&self) -> BTreeSet<ScopeAction> {
        self.modules
            .iter()
            .flat_map(|module| {
                module.entries().iter().map(|entry| ScopeAction {
                    scope: module.scope().to_owned(),
                    action: entry.action.clone(),
                })
            })
            .collect()
    }

    /// Returns the declared description for a (scope, action) pair.
    #[must_use]
    pub fn description_of(&self, key: &ScopeAction) -> Option<&str> {
        self.modules
            .iter()
            .find(|module| module.scope() == key.scope())
            .and_then(|module| {
                module
                    .entries()
                    .iter()
                    .find(|entry| entry.action == key.action())
            })
            .map(|entry| entry.description.as_str())
    }
}

/// Declared permission list of one built-in role, keyed by scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleTemplate {
    /// Fixed id of the role this template converges.
    pub role_id: RoleId,
    /// Role name, used in diagnostics and the reconciliation report.
    pub name: String,
    /// Role description, converged during the bootstrap phase.
    pub description: String,
    grants: Vec<(String, Vec<String>)>,
}

impl RoleTemplate {
    /// Creates a role template from ordered per-scope action lists.
    #[must_use]
    pub fn new(
        role_id: RoleId,
        name: impl Into<String>,
        description: impl Into<String>,
        grants: Vec<(String, Vec<String>)>,
    ) -> Self {
        Self {
            role_id,
            name: name.into(),
            description: description.into(),
            grants,
        }
    }

    /// Flattens the template into `scope.action` pairs.
    ///
    /// A duplicated scope block or a duplicated action within a scope is a
    /// fatal configuration error that aborts the reconciliation run.
    pub fn flattened(&self) -> Result<Vec<ScopeAction>, ReconcileError> {
        let mut seen_scopes = BTreeSet::new();
        let mut pairs = Vec::new();

        for (scope, actions) in &self.grants {
            if !seen_scopes.insert(scope.as_str()) {
                return Err(ReconcileError::DuplicateCatalogEntry {
                    template: self.name.clone(),
                    entry: scope.clone(),
                });
            }

            let mut seen_actions = BTreeSet::new();
            for action in actions {
                if !seen_actions.insert(action.as_str()) {
                    return Err(ReconcileError::DuplicateCatalogEntry {
                        template: self.name.clone(),
                        entry: format!("{scope}.{action}"),
                    });
                }
                pairs.push(
                    ScopeAction::new(scope.as_str(), action.as_str())
                        .map_err(ReconcileError::Store)?,
                );
            }
        }

        Ok(pairs)
    }

    /// Returns the grants grouped by scope, in declaration order.
    #[must_use]
    pub fn grants(&self) -> &[(String, Vec<String>)] {
        self.grants.as_slice()
    }
}

/// Builds an ordered grant mapping for [`RoleTemplate::new`] from string
/// slices, the way the built-in templates declare theirs.
#[must_use]
pub(crate) fn grant_block(scope: &str, actions: &[&str]) -> (String, Vec<String>) {
    (
        scope.to_owned(),
        actions.iter().map(|action| (*action).to_owned()).collect(),
    )
}

#[cfg(test)]
mod tests {
    use cirrus_core::RoleId;

    use super::{CatalogEntry, CatalogModule, PermissionCatalog, RoleTemplate, grant_block};
    use crate::error::ReconcileError;

    fn module(scope: &str, actions: &[&str]) -> CatalogModule {
        let entries = actions
            .iter()
            .map(|action| CatalogEntry::new(*action, format!("Can {action}")))
            .collect();
        CatalogModule::new(scope, entries).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn duplicate_action_in_module_fails_fast() {
        let entries = vec![
            CatalogEntry::new("list_role", "Can list roles"),
            CatalogEntry::new("list_role", "Can list roles again"),
        ];
        assert!(CatalogModule::new("auth", entries).is_err());
    }

    #[test]
    fn duplicate_scope_in_catalog_fails_fast() {
        let result = PermissionCatalog::new(vec![
            module("auth", &["list_role"]),
            module("auth", &["list_permission"]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn declared_pairs_span_all_modules() {
        let catalog = PermissionCatalog::new(vec![
            module("auth", &["list_role"]),
            module("base", &["list_user"]),
        ])
        .unwrap_or_else(|_| unreachable!());

        let pairs = catalog.declared_pairs();
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().any(|pair| pair.to_string() == "auth.list_role"));
        assert!(pairs.iter().any(|pair| pair.to_string() == "base.list_user"));
    }

    #[test]
    fn description_sync_allow_list_is_separate_from_declared_modules() {
        let catalog = PermissionCatalog::new(vec![
            module("auth", &["list_role"]),
            module("base", &["list_user"]),
        ])
        .unwrap_or_else(|_| unreachable!())
        .restrict_description_sync(["auth".to_owned()]);

        assert!(catalog.syncs_descriptions_for("auth"));
        assert!(!catalog.syncs_descriptions_for("base"));
        assert_eq!(catalog.declared_pairs().len(), 2);
    }

    #[test]
    fn template_flattening_rejects_duplicate_action() {
        let template = RoleTemplate::new(
            RoleId::new(2),
            "security_admin",
            "Security administrator",
            vec![grant_block("auth", &["list_role", "list_role"])],
        );
        let result = template.flattened();
        assert!(matches!(
            result,
            Err(ReconcileError::DuplicateCatalogEntry { .. })
        ));
    }

    #[test]
    fn template_flattening_rejects_duplicate_scope_block() {
        let template = RoleTemplate::new(
            RoleId::new(2),
            "security_admin",
            "Security administrator",
            vec![
                grant_block("auth", &["list_role"]),
                grant_block("auth", &["list_permission"]),
            ],
        );
        assert!(matches!(
            template.flattened(),
            Err(ReconcileError::DuplicateCatalogEntry { .. })
        ));
    }

    #[test]
    fn template_flattening_preserves_declaration_order() {
        let template = RoleTemplate::new(
            RoleId::new(3),
            "audit_admin",
            "Audit administrator",
            vec![
                grant_block("auth", &["list_role"]),
                grant_block("base", &["list_user", "view_operation_log"]),
            ],
        );
        let flattened = template.flattened().unwrap_or_else(|_| unreachable!());
        let rendered: Vec<String> = flattened.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["auth.list_role", "base.list_user", "base.view_operation_log"]
        );
    }
}
