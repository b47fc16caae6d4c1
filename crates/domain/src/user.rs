use cirrus_core::UserId;
use serde::{Deserialize, Serialize};

/// Fixed id of the built-in system administrator account.
pub const SYSTEM_ADMIN_USER_ID: UserId = UserId::new(1);

/// Fixed id of the built-in security administrator account.
pub const SECURITY_ADMIN_USER_ID: UserId = UserId::new(2);

/// Fixed id of the built-in audit administrator account.
pub const AUDIT_ADMIN_USER_ID: UserId = UserId::new(3);

/// All built-in user ids; their role membership cannot be changed through
/// the normal membership operations.
pub const BUILT_IN_USER_IDS: [UserId; 3] = [
    SYSTEM_ADMIN_USER_ID,
    SECURITY_ADMIN_USER_ID,
    AUDIT_ADMIN_USER_ID,
];

/// A user account as seen by the access-control core.
///
/// Authentication, credentials and profile data live in the web layer; the
/// core only needs identity, the superuser flag and activation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    /// Surrogate key assigned by the store.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Superuser bypass flag, reserved for the maintenance account.
    pub is_superuser: bool,
    /// Whether the account may authenticate at all.
    pub is_active: bool,
}

impl UserAccount {
    /// Returns whether the account is one of the fixed built-in accounts.
    #[must_use]
    pub fn is_built_in(&self) -> bool {
        BUILT_IN_USER_IDS.contains(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use cirrus_core::UserId;

    use super::UserAccount;

    #[test]
    fn built_in_classification() {
        let account = UserAccount {
            id: UserId::new(2),
            username: "secadmin".to_owned(),
            is_superuser: false,
            is_active: true,
        };
        assert!(account.is_built_in());

        let other = UserAccount {
            id: UserId::new(40),
            username: "operator".to_owned(),
            is_superuser: false,
            is_active: true,
        };
        assert!(!other.is_built_in());
    }
}
