use core::str::FromStr;

use serde::{Deserialize, Serialize};

use kardex_core::DomainError;

/// Account role.
///
/// A closed set rather than opaque strings: the account core only ever gates
/// on these three, and the database stores them as their uppercase names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
            Role::Owner => "OWNER",
        }
    }

    /// Does this role grant the capability named by `required`?
    ///
    /// Every role grants the base `User` capability. `Admin` and `Owner` are
    /// distinct capabilities: an owner is not implicitly an administrator.
    pub fn grants(&self, required: Role) -> bool {
        match required {
            Role::User => true,
            Role::Admin => matches!(self, Role::Admin),
            Role::Owner => matches!(self, Role::Owner),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            "OWNER" => Ok(Role::Owner),
            other => Err(DomainError::validation(format!("unknown role: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_round_trip_through_strings() {
        for role in [Role::User, Role::Admin, Role::Owner] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!("SUPERUSER".parse::<Role>().is_err());
    }
}
