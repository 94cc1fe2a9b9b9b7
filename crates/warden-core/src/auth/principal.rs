use serde::{Deserialize, Serialize};
use std::fmt;

/// Privilege level of a caller.
///
/// Variants are declared in ascending order so the derived `Ord` is the role
/// hierarchy: `User < Moderator < Admin`. Anything permitted for a lower role is
/// permitted for every higher one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Moderator, Role::Admin];

    /// Numeric level as stored alongside role names.
    #[must_use]
    pub fn level(&self) -> u8 {
        match self {
            Self::User => 1,
            Self::Moderator => 2,
            Self::Admin => 3,
        }
    }

    /// Parse role from string (for database storage)
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(Self::User),
            "moderator" => Some(Self::Moderator),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }

    /// True when this role meets or exceeds `minimum`.
    #[must_use]
    pub fn satisfies(&self, minimum: Role) -> bool {
        *self >= minimum
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The authenticated caller. Built once per request and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub role: Role,
}

impl Principal {
    #[must_use]
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }
}
