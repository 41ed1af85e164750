use crate::CoreError;
use chrono::{DateTime, Utc};
use secu_types::NonEmptyText;
use secu_uuid::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Authorization roles. Assigned explicitly when an account is registered.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    User,
    Insured,
    Doctor,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
            Role::Insured => "INSURED",
            Role::Doctor => "DOCTOR",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.strip_prefix("ROLE_").unwrap_or(&upper) {
            "ADMIN" => Ok(Self::Admin),
            "USER" => Ok(Self::User),
            "INSURED" => Ok(Self::Insured),
            "DOCTOR" => Ok(Self::Doctor),
            other => Err(CoreError::InvalidArgument(format!("unknown role '{other}'"))),
        }
    }
}

/// Login credentials and roles. Never serialised to API clients.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Account {
    pub id: RecordId,
    pub username: NonEmptyText,
    /// PHC-format PBKDF2-SHA256 hash.
    pub password_hash: String,
    pub roles: BTreeSet<Role>,
    #[serde(default)]
    pub person_id: Option<RecordId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl_record!(Account, Account, |a| vec![(
    "username",
    a.username.as_str().to_lowercase()
)]);

impl Account {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}
