//! User domain entity and related types.

use serde::Serialize;

use crate::constants::{MAX_LOGIN_LENGTH, MIN_LOGIN_LENGTH};
use crate::error::{DomainError, DomainResult};

/// User domain entity
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Engine-assigned identifier
    pub id: i64,
    /// Unique, case-sensitive login
    pub login: String,
    /// Opaque password hash, never inspected by this crate
    #[serde(skip_serializing)]
    pub password_hash: Vec<u8>,
}

impl User {
    /// Create a user from its stored parts
    pub fn new(id: i64, login: impl Into<String>, password_hash: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            login: login.into(),
            password_hash: password_hash.into(),
        }
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("login", &self.login)
            .field(
                "password_hash",
                &format_args!("[REDACTED; {} bytes]", self.password_hash.len()),
            )
            .finish()
    }
}

/// Check that a login is acceptable for storage.
///
/// Logins are compared byte-for-byte, so no trimming or case folding happens here.
pub fn validate_login(login: &str) -> DomainResult<()> {
    if login.len() < MIN_LOGIN_LENGTH {
        return Err(DomainError::validation("login must not be empty"));
    }
    if login.len() > MAX_LOGIN_LENGTH {
        return Err(DomainError::validation(format!(
            "login must be at most {} bytes",
            MAX_LOGIN_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_login_accepts_regular_login() {
        assert!(validate_login("alice").is_ok());
        assert!(validate_login(&"a".repeat(MAX_LOGIN_LENGTH)).is_ok());
    }

    #[test]
    fn test_validate_login_rejects_empty() {
        assert!(matches!(validate_login(""), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_validate_login_rejects_too_long() {
        let login = "a".repeat(MAX_LOGIN_LENGTH + 1);
        assert!(matches!(validate_login(&login), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_debug_redacts_password_hash() {
        let user = User::new(1, "alice", vec![0xAA, 0xBB]);
        let rendered = format!("{:?}", user);

        assert!(rendered.contains("alice"));
        assert!(rendered.contains("REDACTED; 2 bytes"));
        assert!(!rendered.contains("170"));
    }
}
