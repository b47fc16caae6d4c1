use std::fmt::{Display, Formatter};
use std::str::FromStr;

use cirrus_core::{AppError, AppResult, PermissionId};
use serde::{Deserialize, Serialize};

/// Identity of a permission: a coarse scope namespace plus an action name.
///
/// The scope corresponds to one application module (`auth`, `base`, ...);
/// the action names one capability inside it (`list_role`, `lock_user`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopeAction {
    pub(crate) scope: String,
    pub(crate) action: String,
}

impl ScopeAction {
    /// Creates a validated scope/action pair.
    pub fn new(scope: impl Into<String>, action: impl Into<String>) -> AppResult<Self> {
        let scope = scope.into();
        let action = action.into();

        if scope.is_empty() || action.is_empty() {
            return Err(AppError::Validation(
                "permission scope and action must not be empty".to_owned(),
            ));
        }
        if scope.contains('.') || action.contains('.') {
            return Err(AppError::Validation(format!(
                "permission scope and action must not contain '.': '{scope}.{action}'"
            )));
        }

        Ok(Self { scope, action })
    }

    /// Returns the scope namespace.
    #[must_use]
    pub fn scope(&self) -> &str {
        self.scope.as_str()
    }

    /// Returns the action name.
    #[must_use]
    pub fn action(&self) -> &str {
        self.action.as_str()
    }
}

impl Display for ScopeAction {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}.{}", self.scope, self.action)
    }
}

impl FromStr for ScopeAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let Some((scope, action)) = value.split_once('.') else {
            return Err(AppError::Validation(format!(
                "permission identifier '{value}' must have the form 'scope.action'"
            )));
        };

        Self::new(scope, action)
    }
}

/// Persisted permission record.
///
/// The (scope, action) identity is immutable; only the human-readable
/// description may change over the lifetime of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    /// Surrogate key assigned by the store.
    pub id: PermissionId,
    /// Immutable (scope, action) identity.
    pub key: ScopeAction,
    /// Mutable human-readable description.
    pub description: String,
}
