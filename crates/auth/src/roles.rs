use serde::{Deserialize, Serialize};

use warden_core::{DomainError, RoleId};

/// Maximum length of a role name.
pub const MAX_ROLE_NAME_LEN: usize = 50;

/// Validated role name (e.g. "Manager").
///
/// Role names are free-form display strings; uniqueness is enforced by the
/// store, not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleName(String);

impl RoleName {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(DomainError::validation("role name cannot be empty"));
        }
        if name.chars().count() > MAX_ROLE_NAME_LEN {
            return Err(DomainError::validation(format!(
                "role name exceeds {MAX_ROLE_NAME_LEN} characters"
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoleName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoleName> for String {
    fn from(value: RoleName) -> Self {
        value.0
    }
}

/// A named bundle of permission rules, assignable to many principals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: RoleName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_are_trimmed_and_bounded() {
        assert_eq!(RoleName::parse(" Manager ").unwrap().as_str(), "Manager");
        assert!(RoleName::parse("").is_err());
        assert!(RoleName::parse(&"r".repeat(51)).is_err());
        assert!(RoleName::parse(&"r".repeat(50)).is_ok());
    }
}
