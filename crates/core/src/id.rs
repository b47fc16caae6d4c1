use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

macro_rules! surrogate_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw surrogate key.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw surrogate key.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

surrogate_id!(
    /// Surrogate key of a persisted permission record.
    PermissionId
);
surrogate_id!(
    /// Surrogate key of a role.
    RoleId
);
surrogate_id!(
    /// Surrogate key of a user account.
    UserId
);

#[cfg(test)]
mod tests {
    use super::{PermissionId, RoleId};

    #[test]
    fn ids_format_as_plain_integers() {
        assert_eq!(RoleId::new(3).to_string(), "3");
        assert_eq!(PermissionId::new(42).as_i64(), 42);
    }
}
