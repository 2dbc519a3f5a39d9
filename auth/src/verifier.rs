//! Credential verification.
//!
//! Turns an [`AuthAttempt`] into a sanitized [`Principal`]. The unknown-user
//! and wrong-password branches stay distinct internally (see
//! [`Rejection`]) but produce the same outward error.

use crate::credentials::AuthAttempt;
use crate::error::{AuthError, Rejection, Result};
use crate::providers::{PasswordComparator, UserRepository};
use crate::state::Principal;
use std::time::Duration;

/// Compared against when the username is unknown, so both rejection
/// branches run a comparison.
const DUMMY_SECRET: &str = "gatehouse-dummy-secret-for-unknown-users";

/// Options for principal construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifierOptions {
    /// Copy the username into [`Principal::display_name`].
    ///
    /// Default: `false` (principal carries the id only)
    pub include_display_name: bool,
}

/// Validates identity claims against the injected user repository.
#[derive(Debug, Clone)]
pub struct CredentialVerifier<U, P> {
    users: U,
    comparator: P,
    timeout: Duration,
    options: VerifierOptions,
}

impl<U, P> CredentialVerifier<U, P>
where
    U: UserRepository,
    P: PasswordComparator,
{
    /// Create a verifier bounding each lookup by `timeout`.
    #[must_use]
    pub fn new(users: U, comparator: P, timeout: Duration) -> Self {
        Self {
            users,
            comparator,
            timeout,
            options: VerifierOptions::default(),
        }
    }

    /// Replace the principal options.
    #[must_use]
    pub const fn with_options(mut self, options: VerifierOptions) -> Self {
        self.options = options;
        self
    }

    /// Verify an attempt.
    ///
    /// Reads from the repository only; calling it repeatedly has no effect
    /// on stored users.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentials`] for empty input, unknown users and
    ///   wrong passwords (indistinguishable by `Display`)
    /// - [`AuthError::BackendUnavailable`] if the repository fails or the
    ///   lookup exceeds the timeout
    pub async fn verify(&self, attempt: &AuthAttempt) -> Result<Principal> {
        let username = attempt.username();
        let password = attempt.secret();

        if username.is_empty() || password.is_empty() {
            return Err(AuthError::invalid(Rejection::EmptyInput));
        }

        let lookup = tokio::time::timeout(self.timeout, self.users.find_by_username(username))
            .await
            .map_err(|_| AuthError::BackendUnavailable("user lookup timed out".into()))?;

        let user = match lookup {
            Ok(user) => user,
            Err(AuthError::BackendUnavailable(detail)) => {
                return Err(AuthError::BackendUnavailable(detail));
            }
            Err(other) => return Err(AuthError::BackendUnavailable(other.to_string())),
        };

        let Some(user) = user else {
            std::hint::black_box(self.comparator.matches(password, DUMMY_SECRET));
            return Err(AuthError::invalid(Rejection::UnknownUser));
        };

        // Repositories are trusted to be exact, but the match must be too.
        if user.username != username {
            std::hint::black_box(self.comparator.matches(password, DUMMY_SECRET));
            return Err(AuthError::invalid(Rejection::UnknownUser));
        }

        if !self.comparator.matches(password, &user.password_hash) {
            return Err(AuthError::invalid(Rejection::WrongPassword));
        }

        let principal = Principal::new(user.id);
        Ok(if self.options.include_display_name {
            principal.with_display_name(user.username)
        } else {
            principal
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::{FailingUserRepository, MockUserRepository, SlowUserRepository};
    use crate::providers::ConstantTimeComparator;
    use crate::state::UserId;

    fn verifier() -> CredentialVerifier<MockUserRepository, ConstantTimeComparator> {
        CredentialVerifier::new(
            MockUserRepository::with_admin(),
            ConstantTimeComparator,
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_valid_credentials_yield_id_only_principal() {
        let principal = verifier()
            .verify(&AuthAttempt::password("admin", "supersecret"))
            .await
            .unwrap();

        assert_eq!(principal.id, UserId::from(1));
        assert!(principal.display_name.is_none());
    }

    #[tokio::test]
    async fn test_display_name_is_opt_in() {
        let principal = verifier()
            .with_options(VerifierOptions {
                include_display_name: true,
            })
            .verify(&AuthAttempt::password("admin", "supersecret"))
            .await
            .unwrap();

        assert_eq!(principal.display_name.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_branches_are_distinct_internally() {
        let v = verifier();

        let wrong = v.verify(&AuthAttempt::password("admin", "wrong")).await;
        let unknown = v.verify(&AuthAttempt::password("nobody", "supersecret")).await;
        let empty = v.verify(&AuthAttempt::password("", "")).await;

        assert_eq!(wrong, Err(AuthError::invalid(Rejection::WrongPassword)));
        assert_eq!(unknown, Err(AuthError::invalid(Rejection::UnknownUser)));
        assert_eq!(empty, Err(AuthError::invalid(Rejection::EmptyInput)));
    }

    #[tokio::test]
    async fn test_username_match_is_case_sensitive() {
        let result = verifier()
            .verify(&AuthAttempt::password("Admin", "supersecret"))
            .await;
        assert_eq!(result, Err(AuthError::invalid(Rejection::UnknownUser)));
    }

    #[tokio::test]
    async fn test_repository_failure_is_backend_unavailable() {
        let v = CredentialVerifier::new(
            FailingUserRepository,
            ConstantTimeComparator,
            Duration::from_secs(1),
        );
        let result = v.verify(&AuthAttempt::password("admin", "supersecret")).await;
        assert!(matches!(result, Err(AuthError::BackendUnavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_repository_times_out() {
        let v = CredentialVerifier::new(
            SlowUserRepository::new(Duration::from_secs(30)),
            ConstantTimeComparator,
            Duration::from_millis(100),
        );
        let result = v.verify(&AuthAttempt::password("admin", "supersecret")).await;
        assert!(matches!(result, Err(AuthError::BackendUnavailable(_))));
    }

    #[tokio::test]
    async fn test_verify_is_repeatable() {
        let v = verifier();
        let attempt = AuthAttempt::password("admin", "supersecret");
        let first = v.verify(&attempt).await.unwrap();
        let second = v.verify(&attempt).await.unwrap();
        assert_eq!(first, second);
    }

    #[derive(Default)]
    struct CountingComparator {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl PasswordComparator for CountingComparator {
        fn matches(&self, presented: &str, stored: &str) -> bool {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            ConstantTimeComparator.matches(presented, stored)
        }
    }

    #[tokio::test]
    async fn test_unknown_user_still_runs_a_comparison() {
        let v = CredentialVerifier::new(
            MockUserRepository::with_admin(),
            CountingComparator::default(),
            Duration::from_secs(1),
        );

        let err = v
            .verify(&AuthAttempt::password("nobody", "wrong"))
            .await
            .unwrap_err();
        assert!(err.is_user_error());
        assert_eq!(v.comparator.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
