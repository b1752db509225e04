//! Principals: the accounts that authenticate and act on resources.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{DomainError, DomainResult, PrincipalId, RoleId};

/// Maximum length of a single name field on a profile.
pub const MAX_NAME_LEN: usize = 150;

// ─────────────────────────────────────────────────────────────────────────────
// Email
// ─────────────────────────────────────────────────────────────────────────────

/// Normalized login email (trimmed, lowercased).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let email = raw.trim().to_lowercase();
        let Some((local, domain)) = email.split_once('@') else {
            return Err(DomainError::validation("invalid email format"));
        };
        if local.is_empty()
            || domain.is_empty()
            || domain.contains('@')
            || email.chars().any(char::is_whitespace)
            || email.len() > 254
        {
            return Err(DomainError::validation("invalid email format"));
        }
        Ok(Self(email))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn local_part(&self) -> &str {
        self.0.split_once('@').map(|(l, _)| l).unwrap_or(&self.0)
    }
}

impl core::fmt::Display for Email {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile
// ─────────────────────────────────────────────────────────────────────────────

/// Self-editable personal details. Email, roles and flags are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub middle_name: String,
}

impl Profile {
    pub fn new(first_name: &str, last_name: &str, middle_name: Option<&str>) -> DomainResult<Self> {
        Ok(Self {
            first_name: required_name("first_name", first_name)?,
            last_name: required_name("last_name", last_name)?,
            middle_name: optional_name("middle_name", middle_name.unwrap_or_default())?,
        })
    }

    pub fn full_name(&self) -> String {
        [&self.first_name, &self.middle_name, &self.last_name]
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Partial profile update; absent fields keep their current value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfilePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
}

impl ProfilePatch {
    pub fn apply(&self, profile: &Profile) -> DomainResult<Profile> {
        Ok(Profile {
            first_name: match &self.first_name {
                Some(v) => required_name("first_name", v)?,
                None => profile.first_name.clone(),
            },
            last_name: match &self.last_name {
                Some(v) => required_name("last_name", v)?,
                None => profile.last_name.clone(),
            },
            middle_name: match &self.middle_name {
                Some(v) => optional_name("middle_name", v)?,
                None => profile.middle_name.clone(),
            },
        })
    }
}

fn required_name(field: &str, value: &str) -> DomainResult<String> {
    let v = optional_name(field, value)?;
    if v.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(v)
}

fn optional_name(field: &str, value: &str) -> DomainResult<String> {
    let v = value.trim();
    if v.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "{field} exceeds {MAX_NAME_LEN} characters"
        )));
    }
    Ok(v.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Principal
// ─────────────────────────────────────────────────────────────────────────────

/// A fully loaded principal as seen by the authorization engine.
///
/// The API layer reloads this from the store on every request, so flag and role
/// changes take effect on the next decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: Email,
    pub profile: Profile,
    pub is_active: bool,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub roles: BTreeSet<RoleId>,
    pub date_joined: DateTime<Utc>,
}

impl Principal {
    /// A fresh, active principal with no roles and no elevated flags.
    pub fn new(email: Email, profile: Profile, now: DateTime<Utc>) -> Self {
        Self {
            id: PrincipalId::new(),
            email,
            profile,
            is_active: true,
            is_superuser: false,
            is_staff: false,
            roles: BTreeSet::new(),
            date_joined: now,
        }
    }

    /// Superuser with staff access, as created by seeding.
    pub fn superuser(email: Email, profile: Profile, now: DateTime<Utc>) -> Self {
        Self {
            is_superuser: true,
            is_staff: true,
            ..Self::new(email, profile, now)
        }
    }

    /// May use the administrative surface.
    pub fn is_admin(&self) -> bool {
        self.is_active && self.is_staff
    }

    pub fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }

    /// Returns `false` when the role was already assigned.
    pub fn assign_role(&mut self, role: RoleId) -> bool {
        self.roles.insert(role)
    }

    /// Returns `false` when the role was not assigned.
    pub fn revoke_role(&mut self, role: RoleId) -> bool {
        self.roles.remove(&role)
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }
}
