//! User repository and password comparison traits.

use crate::error::Result;
use crate::state::UserId;
use std::fmt;
use std::future::Future;

/// Stored user as returned by the repository.
#[derive(Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Stable identifier.
    pub id: UserId,

    /// Login name (matched exactly, case-sensitive).
    pub username: String,

    /// Stored secret in whatever form the configured comparator understands.
    pub password_hash: String,
}

impl UserRecord {
    /// Create a user record.
    #[must_use]
    pub fn new(id: UserId, username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            password_hash: password_hash.into(),
        }
    }
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// User repository.
///
/// Injected by the surrounding application; the authenticator never writes to it.
pub trait UserRepository: Send + Sync {
    /// Find a user by exact username.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if no user has this username.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be reached.
    fn find_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>>> + Send;
}

/// Compares a presented password with a stored one.
///
/// Implementations must not short-circuit on the first differing byte.
pub trait PasswordComparator: Send + Sync {
    /// Returns `true` if `presented` matches `stored`.
    fn matches(&self, presented: &str, stored: &str) -> bool;
}
