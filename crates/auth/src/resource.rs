use serde::{Deserialize, Serialize};

use warden_core::{DomainError, ResourceTypeId};

/// Maximum length of a resource type name.
pub const MAX_RESOURCE_NAME_LEN: usize = 50;

/// Validated resource type name (e.g. "orders", "reports").
///
/// Names are lowercase ASCII letters, digits, `_`, `-` and `.`; anything else is
/// a configuration error rather than a silently unknown type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceTypeName(String);

impl ResourceTypeName {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(DomainError::validation("resource type name cannot be empty"));
        }
        if name.len() > MAX_RESOURCE_NAME_LEN {
            return Err(DomainError::validation(format!(
                "resource type name exceeds {MAX_RESOURCE_NAME_LEN} characters"
            )));
        }
        let valid = name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(DomainError::validation(format!(
                "resource type name '{name}' may only contain lowercase letters, digits, '_', '-' and '.'"
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ResourceTypeName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ResourceTypeName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ResourceTypeName> for String {
    fn from(value: ResourceTypeName) -> Self {
        value.0
    }
}

/// A registered class of protected resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceType {
    pub id: ResourceTypeId,
    pub name: ResourceTypeName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_conventional_names() {
        for name in ["orders", "reports", "billing.invoices", "audit-log", "v2_items"] {
            assert!(ResourceTypeName::parse(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(ResourceTypeName::parse("  orders ").unwrap().as_str(), "orders");
    }

    #[test]
    fn rejects_malformed_names() {
        for name in ["", "   ", "Orders", "orders/1", "or ders", &"x".repeat(51)] {
            assert!(ResourceTypeName::parse(name).is_err(), "{name:?}");
        }
    }

    #[test]
    fn deserialization_validates() {
        let ok: ResourceTypeName = serde_json::from_str("\"orders\"").unwrap();
        assert_eq!(ok.as_str(), "orders");
        assert!(serde_json::from_str::<ResourceTypeName>("\"ORDERS\"").is_err());
    }
}
