//! Authentication configuration.
//!
//! Configuration values are provided by the application. The signing secret
//! has no default: construction fails without one.

use crate::error::{AuthError, Result};
use chrono::Duration;
use std::env;

/// Minimum accepted length of the cookie signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Default session cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "gatehouse.sid";

/// Default realm advertised in Basic challenges.
pub const DEFAULT_REALM: &str = "gatehouse";

/// How an unauthenticated request to a protected route is answered.
///
/// Chosen per deployment, never per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Form login with redirects and flash messages.
    Session {
        /// Login entry point for unauthenticated requests.
        login_path: String,
        /// Where a successful login redirects.
        success_path: String,
        /// Where a failed login redirects.
        failure_path: String,
    },

    /// `401` with a `WWW-Authenticate: Basic` challenge.
    Basic {
        /// Realm advertised in the challenge.
        realm: String,
    },
}

impl AuthMode {
    /// Session mode with the conventional `/login`, `/members`, `/auth-failed` paths.
    #[must_use]
    pub fn session() -> Self {
        Self::Session {
            login_path: "/login".to_string(),
            success_path: "/members".to_string(),
            failure_path: "/auth-failed".to_string(),
        }
    }

    /// Basic mode with the given realm.
    #[must_use]
    pub fn basic(realm: impl Into<String>) -> Self {
        Self::Basic {
            realm: realm.into(),
        }
    }
}

/// Whether Basic-auth requests interact with sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BasicSessionPolicy {
    /// Basic requests never create, attach to, or flash a session.
    ///
    /// Under [`AuthMode::Session`] a failed header therefore gets the login
    /// redirect, not the failure page.
    #[default]
    Stateless,

    /// A successful Basic check regenerates and issues a session cookie, so
    /// later requests ride on the session (and its TTL) without the header.
    Attach,
}

/// Authenticator configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// Secret used to sign session cookies.
    secret: Vec<u8>,

    /// Response mode for unauthenticated requests.
    pub mode: AuthMode,

    /// Session cookie name.
    ///
    /// Default: `gatehouse.sid`
    pub cookie_name: String,

    /// Set the `Secure` cookie attribute (deployment is TLS-terminated).
    ///
    /// Default: `false`
    pub secure_cookie: bool,

    /// Lifetime of an authenticated session, counted from login.
    ///
    /// `None` means authenticated sessions do not expire.
    /// Default: `None`
    pub session_ttl: Option<Duration>,

    /// Upper bound for any single store or repository call.
    ///
    /// Default: 2 seconds
    pub store_timeout: std::time::Duration,

    /// Backend key lifetime for sessions without `expires_at`.
    ///
    /// Only used by stores with native key expiry (Redis).
    /// Default: 24 hours
    pub storage_ttl: Duration,

    /// Basic-auth session behaviour.
    ///
    /// Default: [`BasicSessionPolicy::Stateless`]
    pub basic_session_policy: BasicSessionPolicy,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"[REDACTED]")
            .field("mode", &self.mode)
            .field("cookie_name", &self.cookie_name)
            .field("secure_cookie", &self.secure_cookie)
            .field("session_ttl", &self.session_ttl)
            .field("store_timeout", &self.store_timeout)
            .field("storage_ttl", &self.storage_ttl)
            .field("basic_session_policy", &self.basic_session_policy)
            .finish()
    }
}

impl AuthConfig {
    /// Create configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ConfigError`] if `secret` is empty or shorter
    /// than [`MIN_SECRET_LEN`] bytes.
    pub fn new(secret: impl Into<Vec<u8>>, mode: AuthMode) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(AuthError::ConfigError("session secret is required".into()));
        }
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::ConfigError(format!(
                "session secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }

        Ok(Self {
            secret,
            mode,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            secure_cookie: false,
            session_ttl: None,
            store_timeout: std::time::Duration::from_secs(2),
            storage_ttl: Duration::hours(24),
            basic_session_policy: BasicSessionPolicy::Stateless,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Meaning | Default |
    /// |----------|---------|---------|
    /// | `GATEHOUSE_SECRET` | Cookie signing secret | required |
    /// | `GATEHOUSE_MODE` | `session` or `basic` | `session` |
    /// | `GATEHOUSE_REALM` | Basic realm | `gatehouse` |
    /// | `GATEHOUSE_SESSION_TTL_SECS` | Authenticated session lifetime | none |
    /// | `GATEHOUSE_SECURE_COOKIE` | `true` behind TLS | `false` |
    /// | `GATEHOUSE_COOKIE_NAME` | Cookie name | `gatehouse.sid` |
    /// | `GATEHOUSE_STORE_TIMEOUT_MS` | Store call bound | `2000` |
    /// | `GATEHOUSE_BASIC_SESSIONS` | `attach` or `stateless` | `stateless` |
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ConfigError`] if the secret is missing or too
    /// short, or a variable has an unrecognised value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`AuthConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secret = lookup("GATEHOUSE_SECRET")
            .ok_or_else(|| AuthError::ConfigError("GATEHOUSE_SECRET is not set".into()))?;

        let realm = lookup("GATEHOUSE_REALM").unwrap_or_else(|| DEFAULT_REALM.to_string());
        let mode = match lookup("GATEHOUSE_MODE").as_deref() {
            None | Some("session") => AuthMode::session(),
            Some("basic") => AuthMode::basic(realm),
            Some(other) => {
                return Err(AuthError::ConfigError(format!(
                    "GATEHOUSE_MODE must be 'session' or 'basic', got '{other}'"
                )));
            }
        };

        let mut config = Self::new(secret.into_bytes(), mode)?;

        if let Some(secs) = lookup("GATEHOUSE_SESSION_TTL_SECS") {
            let ttl = secs
                .parse::<i64>()
                .ok()
                .filter(|n| *n > 0)
                .and_then(Duration::try_seconds)
                .ok_or_else(|| {
                    AuthError::ConfigError(format!(
                        "GATEHOUSE_SESSION_TTL_SECS must be a positive number of seconds, got '{secs}'"
                    ))
                })?;
            config = config.with_session_ttl(ttl);
        }

        if let Some(flag) = lookup("GATEHOUSE_SECURE_COOKIE") {
            config.secure_cookie = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        if let Some(name) = lookup("GATEHOUSE_COOKIE_NAME") {
            config.cookie_name = name;
        }

        if let Some(ms) = lookup("GATEHOUSE_STORE_TIMEOUT_MS") {
            let ms: u64 = ms.parse().map_err(|_| {
                AuthError::ConfigError("GATEHOUSE_STORE_TIMEOUT_MS must be an integer".into())
            })?;
            config.store_timeout = std::time::Duration::from_millis(ms);
        }

        config.basic_session_policy = match lookup("GATEHOUSE_BASIC_SESSIONS").as_deref() {
            None | Some("stateless") => BasicSessionPolicy::Stateless,
            Some("attach") => BasicSessionPolicy::Attach,
            Some(other) => {
                return Err(AuthError::ConfigError(format!(
                    "GATEHOUSE_BASIC_SESSIONS must be 'attach' or 'stateless', got '{other}'"
                )));
            }
        };

        Ok(config)
    }

    /// Signing secret.
    #[must_use]
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    /// Set the authenticated session lifetime.
    ///
    /// A non-positive `ttl` expires sessions at the moment of login.
    #[must_use]
    pub const fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = Some(ttl);
        self
    }

    /// Set the cookie name.
    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set the `Secure` cookie attribute.
    #[must_use]
    pub const fn with_secure_cookie(mut self, secure: bool) -> Self {
        self.secure_cookie = secure;
        self
    }

    /// Set the store call bound.
    #[must_use]
    pub const fn with_store_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Set the backend key lifetime for sessions without expiry.
    #[must_use]
    pub const fn with_storage_ttl(mut self, ttl: Duration) -> Self {
        self.storage_ttl = ttl;
        self
    }

    /// Set the Basic-auth session behaviour.
    #[must_use]
    pub const fn with_basic_session_policy(mut self, policy: BasicSessionPolicy) -> Self {
        self.basic_session_policy = policy;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_empty_secret_rejected() {
        let result = AuthConfig::new(Vec::new(), AuthMode::session());
        assert!(matches!(result, Err(AuthError::ConfigError(_))));
    }

    #[test]
    fn test_short_secret_rejected() {
        let result = AuthConfig::new("Not Really A Secret", AuthMode::session());
        assert!(matches!(result, Err(AuthError::ConfigError(_))));
    }

    #[test]
    fn test_defaults() {
        let config = AuthConfig::new(SECRET, AuthMode::session()).unwrap();
        assert_eq!(config.cookie_name, DEFAULT_COOKIE_NAME);
        assert!(config.session_ttl.is_none());
        assert_eq!(config.basic_session_policy, BasicSessionPolicy::Stateless);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = AuthConfig::new(SECRET, AuthMode::session()).unwrap();
        assert!(!format!("{config:?}").contains(SECRET));
    }

    #[test]
    fn test_from_lookup_requires_secret() {
        let result = AuthConfig::from_lookup(|_| None);
        assert!(matches!(result, Err(AuthError::ConfigError(_))));
    }

    #[test]
    fn test_from_lookup_basic_mode() {
        let vars: HashMap<&str, &str> = [
            ("GATEHOUSE_SECRET", SECRET),
            ("GATEHOUSE_MODE", "basic"),
            ("GATEHOUSE_REALM", "members"),
            ("GATEHOUSE_SESSION_TTL_SECS", "15"),
            ("GATEHOUSE_BASIC_SESSIONS", "attach"),
        ]
        .into_iter()
        .collect();

        let config =
            AuthConfig::from_lookup(|key| vars.get(key).map(ToString::to_string)).unwrap();

        assert_eq!(config.mode, AuthMode::basic("members"));
        assert_eq!(config.session_ttl, Some(Duration::seconds(15)));
        assert_eq!(config.basic_session_policy, BasicSessionPolicy::Attach);
    }

    #[test]
    fn test_from_lookup_rejects_unknown_mode() {
        let result = AuthConfig::from_lookup(|key| match key {
            "GATEHOUSE_SECRET" => Some(SECRET.to_string()),
            "GATEHOUSE_MODE" => Some("digest".to_string()),
            _ => None,
        });
        assert!(matches!(result, Err(AuthError::ConfigError(_))));
    }

    #[test]
    fn test_from_lookup_rejects_unusable_ttl() {
        for ttl in ["0", "-5", "soon", "9223372036854775807"] {
            let result = AuthConfig::from_lookup(|key| match key {
                "GATEHOUSE_SECRET" => Some(SECRET.to_string()),
                "GATEHOUSE_SESSION_TTL_SECS" => Some(ttl.to_string()),
                _ => None,
            });
            assert!(
                matches!(result, Err(AuthError::ConfigError(_))),
                "ttl {ttl} accepted"
            );
        }
    }
}
