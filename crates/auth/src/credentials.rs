//! Password policy and Argon2id hashing.

use std::sync::OnceLock;

use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("password must contain at least {MIN_PASSWORD_LEN} characters")]
    TooShort,

    #[error("password cannot be entirely numeric")]
    EntirelyNumeric,

    #[error("password is too similar to the email address")]
    TooSimilar,

    #[error("password fields didn't match")]
    Mismatch,

    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Check a new password (and its confirmation) against the policy.
///
/// `email_local_part` is used to reject passwords that contain the account name.
pub fn validate_new_password(
    password: &str,
    confirmation: &str,
    email_local_part: &str,
) -> Result<(), CredentialError> {
    if password != confirmation {
        return Err(CredentialError::Mismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CredentialError::TooShort);
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(CredentialError::EntirelyNumeric);
    }
    let local = email_local_part.to_lowercase();
    if local.chars().count() >= 3 && password.to_lowercase().contains(&local) {
        return Err(CredentialError::TooSimilar);
    }
    Ok(())
}

/// Hash a password into a PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| CredentialError::Hash(e.to_string()))
}

/// Constant-time verification against a stored PHC string. A corrupt hash
/// never verifies.
pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Verify `password` against a stored hash, or, when there is no account,
/// against a fixed hash so the miss costs the same as a wrong password.
/// Always `false` for a missing account.
pub fn verify_password_or_dummy(password: &str, phc: Option<&str>) -> bool {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    match phc {
        Some(phc) => verify_password(password, phc),
        None => {
            if let Some(dummy) = DUMMY.get_or_init(|| hash_password("warden-unknown-account").ok()) {
                let _ = verify_password(password, dummy);
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_rejects_weak_passwords() {
        assert_eq!(validate_new_password("short1", "short1", "bob"), Err(CredentialError::TooShort));
        assert_eq!(
            validate_new_password("12345678901", "12345678901", "bob"),
            Err(CredentialError::EntirelyNumeric)
        );
        assert_eq!(
            validate_new_password("secure-pass-1", "secure-pass-2", "bob"),
            Err(CredentialError::Mismatch)
        );
        assert_eq!(
            validate_new_password("Alice-2024!", "Alice-2024!", "alice"),
            Err(CredentialError::TooSimilar)
        );
        assert_eq!(validate_new_password("correct horse", "correct horse", "alice"), Ok(()));
    }

    #[test]
    fn hash_and_verify() {
        let phc = hash_password("correct horse").unwrap();
        assert!(phc.starts_with("$argon2"));
        assert!(verify_password("correct horse", &phc));
        assert!(!verify_password("wrong horse", &phc));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }

    #[test]
    fn missing_account_never_verifies() {
        assert!(!verify_password_or_dummy("warden-unknown-account", None));
        assert!(!verify_password_or_dummy("anything", None));
        let phc = hash_password("correct horse").unwrap();
        assert!(verify_password_or_dummy("correct horse", Some(&phc)));
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_password("same password").unwrap(), hash_password("same password").unwrap());
    }
}
