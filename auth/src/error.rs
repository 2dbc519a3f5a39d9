//! Error types for authentication and session operations.

use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Outward-facing message for every rejected credential check.
///
/// Shared by the unknown-user and wrong-password branches so responses
/// cannot be used to enumerate usernames.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Username and password combo isn't registered.";

/// Why a credential check was rejected.
///
/// Internal only. It never appears in [`AuthError`]'s `Display` output and is
/// logged at debug level at most.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Username or password was empty.
    EmptyInput,
    /// No user with this username.
    UnknownUser,
    /// User exists but the password did not match.
    WrongPassword,
}

impl Rejection {
    /// Short label used in debug logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::UnknownUser => "unknown_user",
            Self::WrongPassword => "wrong_password",
        }
    }
}

/// Error taxonomy for authentication and session handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // Authentication Errors
    // ═══════════════════════════════════════════════════════════

    /// Credentials did not match a stored user.
    #[error("Username and password combo isn't registered.")]
    InvalidCredentials {
        /// Internal branch that produced the rejection
        reason: Rejection,
    },

    /// Basic header or form fields were missing or garbled.
    #[error("Malformed credential input: {0}")]
    MalformedCredentialInput(String),

    // ═══════════════════════════════════════════════════════════
    // Session Errors
    // ═══════════════════════════════════════════════════════════

    /// Session has expired.
    #[error("Session has expired")]
    SessionExpired,

    /// Session not found (never existed, destroyed, or retired by regeneration).
    #[error("Session not found")]
    SessionNotFound,

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// User store or session store failed or timed out.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Record encoding or decoding failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration rejected at construction time.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error (should not be exposed to users).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Shorthand for an [`AuthError::InvalidCredentials`] with the given reason.
    #[must_use]
    pub const fn invalid(reason: Rejection) -> Self {
        Self::InvalidCredentials { reason }
    }

    /// Returns `true` if this error is due to what the user presented.
    ///
    /// # Examples
    ///
    /// ```
    /// # use gatehouse_auth::{AuthError, error::Rejection};
    /// assert!(AuthError::invalid(Rejection::WrongPassword).is_user_error());
    /// assert!(AuthError::MalformedCredentialInput("no colon".into()).is_user_error());
    /// assert!(!AuthError::BackendUnavailable("timeout".into()).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials { .. } | Self::MalformedCredentialInput(_)
        )
    }

    /// Returns `true` if this error must abort the request with a 5xx.
    ///
    /// # Examples
    ///
    /// ```
    /// # use gatehouse_auth::AuthError;
    /// assert!(AuthError::BackendUnavailable("redis down".into()).is_fatal());
    /// assert!(!AuthError::SessionExpired.is_fatal());
    /// ```
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable(_)
                | Self::SerializationError(_)
                | Self::ConfigError(_)
                | Self::InternalError(_)
        )
    }

    /// Message that may be shown to the client or flashed to the session.
    ///
    /// Malformed input gets the same message as a wrong password; internal
    /// details are never included.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials { .. } | Self::MalformedCredentialInput(_) => {
                INVALID_CREDENTIALS_MESSAGE
            }
            Self::SessionExpired | Self::SessionNotFound => "Unauthorized",
            Self::BackendUnavailable(_) => "Service temporarily unavailable",
            Self::SerializationError(_) | Self::ConfigError(_) | Self::InternalError(_) => {
                "Internal error"
            }
        }
    }
}

impl From<redis::RedisError> for AuthError {
    fn from(err: redis::RedisError) -> Self {
        Self::BackendUnavailable(err.to_string())
    }
}

impl From<bincode::Error> for AuthError {
    fn from(err: bincode::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
