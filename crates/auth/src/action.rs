use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the four grantable operations on a resource type.
///
/// This is a closed set: a rule can only ever grant these, and the engine maps
/// each action to exactly one boolean on a [`crate::Grants`] record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown action '{0}'")]
pub struct UnknownAction(pub String);

impl Action {
    pub const ALL: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    /// Fixed HTTP verb table. Anything not listed (HEAD, OPTIONS, ...) maps to
    /// `None`, which the engine treats as a deny.
    pub fn from_http_method(method: &str) -> Option<Self> {
        match method {
            "GET" => Some(Action::Read),
            "POST" => Some(Action::Create),
            "PUT" | "PATCH" => Some(Action::Update),
            "DELETE" => Some(Action::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    /// Name of the grant flag this action is checked against.
    pub fn grant_field(&self) -> &'static str {
        match self {
            Action::Create => "can_create",
            Action::Read => "can_read",
            Action::Update => "can_update",
            Action::Delete => "can_delete",
        }
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Action::Create),
            "read" => Ok(Action::Read),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            _ => Err(UnknownAction(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_verb_table_is_fixed() {
        assert_eq!(Action::from_http_method("GET"), Some(Action::Read));
        assert_eq!(Action::from_http_method("POST"), Some(Action::Create));
        assert_eq!(Action::from_http_method("PUT"), Some(Action::Update));
        assert_eq!(Action::from_http_method("PATCH"), Some(Action::Update));
        assert_eq!(Action::from_http_method("DELETE"), Some(Action::Delete));
    }

    #[test]
    fn unlisted_verbs_have_no_action() {
        for verb in ["HEAD", "OPTIONS", "TRACE", "CONNECT", "get", ""] {
            assert_eq!(Action::from_http_method(verb), None, "verb {verb:?}");
        }
    }

    #[test]
    fn parses_action_names_case_insensitively() {
        assert_eq!("Create".parse::<Action>().unwrap(), Action::Create);
        assert_eq!(" delete ".parse::<Action>().unwrap(), Action::Delete);
        assert!("approve".parse::<Action>().is_err());
    }
}
