//! Credential attempts presented by a client.
//!
//! An [`AuthAttempt`] lives only for the duration of one request. It is never
//! stored, and its `Debug` output redacts the password.

use crate::error::{AuthError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

/// Authorization scheme accepted by [`AuthAttempt::from_basic_header`].
const BASIC_SCHEME: &str = "Basic";

/// Identity claim to verify.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthAttempt {
    /// Username/password from a form body.
    Password {
        /// Submitted username
        username: String,
        /// Submitted password
        password: String,
    },

    /// Username/password decoded from an `Authorization: Basic` header.
    Basic {
        /// Decoded name
        username: String,
        /// Decoded pass
        password: String,
    },
}

impl AuthAttempt {
    /// Attempt from form fields.
    #[must_use]
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Password {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Decode an `Authorization` header value of the form `Basic <base64(name:pass)>`.
    ///
    /// The scheme is matched case-insensitively and the decoded token is split
    /// on the first `:`, so passwords may contain colons.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedCredentialInput`] if the scheme is not
    /// Basic, the token is not base64, is not UTF-8, or has no `:`.
    ///
    /// # Examples
    ///
    /// ```
    /// use gatehouse_auth::AuthAttempt;
    ///
    /// // "admin:supersecret"
    /// let attempt = AuthAttempt::from_basic_header("Basic YWRtaW46c3VwZXJzZWNyZXQ=").unwrap();
    /// assert_eq!(attempt.username(), "admin");
    /// assert!(AuthAttempt::from_basic_header("Bearer abc").is_err());
    /// ```
    pub fn from_basic_header(value: &str) -> Result<Self> {
        let (scheme, token) = value
            .trim()
            .split_once(' ')
            .ok_or_else(|| AuthError::MalformedCredentialInput("missing scheme".into()))?;

        if !scheme.eq_ignore_ascii_case(BASIC_SCHEME) {
            return Err(AuthError::MalformedCredentialInput(format!(
                "unsupported scheme {scheme}"
            )));
        }

        let decoded = STANDARD
            .decode(token.trim())
            .map_err(|e| AuthError::MalformedCredentialInput(format!("invalid base64: {e}")))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| AuthError::MalformedCredentialInput("token is not utf-8".into()))?;

        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| AuthError::MalformedCredentialInput("missing ':' separator".into()))?;

        Ok(Self::Basic {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Claimed username.
    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Self::Password { username, .. } | Self::Basic { username, .. } => username,
        }
    }

    /// Presented secret.
    #[must_use]
    pub fn secret(&self) -> &str {
        match self {
            Self::Password { password, .. } | Self::Basic { password, .. } => password,
        }
    }

    /// Whether this attempt came from an `Authorization` header.
    #[must_use]
    pub const fn is_basic(&self) -> bool {
        matches!(self, Self::Basic { .. })
    }
}

impl fmt::Debug for AuthAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_basic() { "Basic" } else { "Password" };
        f.debug_struct(kind)
            .field("username", &self.username())
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn header(raw: &str) -> String {
        format!("Basic {}", STANDARD.encode(raw))
    }

    #[test]
    fn test_basic_header_decodes() {
        let attempt = AuthAttempt::from_basic_header(&header("admin:supersecret")).unwrap();
        assert!(attempt.is_basic());
        assert_eq!(attempt.username(), "admin");
        assert_eq!(attempt.secret(), "supersecret");
    }

    #[test]
    fn test_basic_header_splits_on_first_colon() {
        let attempt = AuthAttempt::from_basic_header(&header("admin:pa:ss")).unwrap();
        assert_eq!(attempt.secret(), "pa:ss");
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        let value = header("admin:x").replacen("Basic", "basic", 1);
        assert!(AuthAttempt::from_basic_header(&value).is_ok());
    }

    #[test]
    fn test_malformed_headers_rejected() {
        for value in [
            "",
            "Basic",
            "Bearer token",
            "Basic !!!not-base64!!!",
            &header("no-separator"),
        ] {
            let result = AuthAttempt::from_basic_header(value);
            assert!(
                matches!(result, Err(AuthError::MalformedCredentialInput(_))),
                "expected malformed input for {value:?}, got {result:?}"
            );
        }
    }

    #[test]
    fn test_debug_redacts_password() {
        let attempt = AuthAttempt::password("admin", "supersecret");
        let printed = format!("{attempt:?}");
        assert!(printed.contains("admin"));
        assert!(!printed.contains("supersecret"));
    }
}
