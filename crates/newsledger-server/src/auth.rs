//! Privileges and user lookup for AUTHINFO and client certificates.

use std::collections::HashMap;
use std::fmt;

use sha2::{Digest, Sha256};

/// What a session may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserPriv {
    /// Reading commands (GROUP, ARTICLE, OVER, ...).
    pub read: bool,
    /// Posting and transfer commands (POST, IHAVE, CHECK, TAKETHIS).
    pub post: bool,
}

impl UserPriv {
    /// Everything allowed.
    pub const ALL: Self = Self {
        read: true,
        post: true,
    };

    /// Nothing allowed.
    pub const NONE: Self = Self {
        read: false,
        post: false,
    };

    /// Grants whatever `other` grants on top of `self`.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            read: self.read || other.read,
            post: self.post || other.post,
        }
    }
}

/// A known user.
#[derive(Clone, PartialEq, Eq)]
pub struct UserInfo {
    /// Normalised user name.
    pub name: String,
    /// Password; `None` accepts the user at `AUTHINFO USER`.
    pub password: Option<String>,
    /// Privileges granted on successful authentication.
    pub privileges: UserPriv,
}

impl fmt::Debug for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserInfo")
            .field("name", &self.name)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("privileges", &self.privileges)
            .finish()
    }
}

/// Looks up users by name for `AUTHINFO USER/PASS`.
pub trait UserPassProvider: Send + Sync {
    /// Returns the user, if known. `name` is already normalised.
    fn user(&self, name: &str) -> Option<UserInfo>;
}

/// Looks up users by client certificate fingerprint.
pub trait CertFpProvider: Send + Sync {
    /// Returns the user owning the certificate with this SHA-256
    /// fingerprint.
    fn user_by_fingerprint(&self, fingerprint: &[u8; 32]) -> Option<UserInfo>;
}

/// Error returned for an unusable user name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserNameError {
    /// Empty after trimming.
    #[error("empty user name")]
    Empty,
    /// Contains control characters.
    #[error("user name contains control characters")]
    Control,
}

/// Normalises a user name: surrounding whitespace is dropped, case is
/// kept, control characters are refused.
///
/// # Errors
///
/// Returns [`UserNameError`] for empty names or names with control
/// characters.
pub fn normalise_user(name: &str) -> Result<String, UserNameError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(UserNameError::Empty);
    }
    if name.chars().any(char::is_control) {
        return Err(UserNameError::Control);
    }
    Ok(name.to_owned())
}

/// In-memory user/password table.
#[derive(Debug, Clone, Default)]
pub struct UserPassMap {
    users: HashMap<String, UserInfo>,
}

impl UserPassMap {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user, replacing any previous entry of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`UserNameError`] if the name does not normalise.
    pub fn insert(
        &mut self,
        name: &str,
        password: Option<String>,
        privileges: UserPriv,
    ) -> Result<(), UserNameError> {
        let name = normalise_user(name)?;
        self.users.insert(
            name.clone(),
            UserInfo {
                name,
                password,
                privileges,
            },
        );
        Ok(())
    }

    /// Number of users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns true if no users are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserPassProvider for UserPassMap {
    fn user(&self, name: &str) -> Option<UserInfo> {
        self.users.get(name).cloned()
    }
}

/// Computes the SHA-256 fingerprint of a DER certificate.
#[must_use]
pub fn cert_fingerprint(der: &[u8]) -> [u8; 32] {
    Sha256::digest(der).into()
}

/// Error returned for a malformed fingerprint string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid SHA-256 fingerprint {0:?}")]
pub struct InvalidFingerprint(pub String);

/// Parses a hex fingerprint, with or without `:` separators.
///
/// # Errors
///
/// Returns [`InvalidFingerprint`] unless the input holds exactly 32 hex
/// bytes.
pub fn parse_fingerprint(s: &str) -> Result<[u8; 32], InvalidFingerprint> {
    let digits: Vec<u8> = s.bytes().filter(|&c| c != b':').collect();
    let mut out = [0u8; 32];
    hex::decode_to_slice(&digits, &mut out).map_err(|_| InvalidFingerprint(s.to_owned()))?;
    Ok(out)
}

/// In-memory certificate fingerprint table.
#[derive(Debug, Clone, Default)]
pub struct CertFpMap {
    users: HashMap<[u8; 32], UserInfo>,
}

impl CertFpMap {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a fingerprint to a user.
    ///
    /// # Errors
    ///
    /// Returns [`UserNameError`] if the name does not normalise.
    pub fn insert(
        &mut self,
        fingerprint: [u8; 32],
        name: &str,
        privileges: UserPriv,
    ) -> Result<(), UserNameError> {
        let name = normalise_user(name)?;
        self.users.insert(
            fingerprint,
            UserInfo {
                name,
                password: None,
                privileges,
            },
        );
        Ok(())
    }
}

impl CertFpProvider for CertFpMap {
    fn user_by_fingerprint(&self, fingerprint: &[u8; 32]) -> Option<UserInfo> {
        self.users.get(fingerprint).cloned()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_priv_merge() {
        let read = UserPriv {
            read: true,
            post: false,
        };
        let post = UserPriv {
            read: false,
            post: true,
        };
        assert_eq!(read.merge(post), UserPriv::ALL);
        assert_eq!(UserPriv::NONE.merge(read), read);
    }

    #[test]
    fn test_normalise_user() {
        assert_eq!(normalise_user("  Alice ").unwrap(), "Alice");
        assert_eq!(normalise_user("   "), Err(UserNameError::Empty));
        assert_eq!(normalise_user("a\u{7}b"), Err(UserNameError::Control));
    }

    #[test]
    fn test_user_pass_map() {
        let mut map = UserPassMap::new();
        map.insert(" bob", Some("hunter2".into()), UserPriv::ALL)
            .unwrap();
        map.insert("guest", None, UserPriv::NONE).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.user("bob").unwrap().password.as_deref(), Some("hunter2"));
        assert!(map.user("Bob").is_none());
        assert!(map.user("guest").unwrap().password.is_none());
    }

    #[test]
    fn test_debug_hides_password() {
        let user = UserInfo {
            name: "bob".into(),
            password: Some("hunter2".into()),
            privileges: UserPriv::ALL,
        };
        assert!(!format!("{user:?}").contains("hunter2"));
    }

    #[test]
    fn test_fingerprints() {
        let fp = cert_fingerprint(b"not really a certificate");
        assert_eq!(parse_fingerprint(&hex::encode_upper(fp)).unwrap(), fp);
        let colons = fp
            .iter()
            .map(|b| hex::encode([*b]))
            .collect::<Vec<_>>()
            .join(":");
        assert_eq!(parse_fingerprint(&colons).unwrap(), fp);
        assert!(parse_fingerprint("abcd").is_err());
        assert!(parse_fingerprint(&"zz".repeat(32)).is_err());

        let mut map = CertFpMap::new();
        map.insert(fp, "carol", UserPriv::ALL).unwrap();
        assert_eq!(map.user_by_fingerprint(&fp).unwrap().name, "carol");
        assert!(map.user_by_fingerprint(&[0; 32]).is_none());
    }
}
