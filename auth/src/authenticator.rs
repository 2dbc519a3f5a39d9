//! Per-request authentication state machine.
//!
//! ```text
//! NoSession ──cookie──▶ Unauthenticated ──credentials──▶ Authenticating
//!     ▲                                                     │
//!     │                                       regenerate ok │
//!     └──────── logout / expiry ──────── Authenticated ◀────┘
//! ```
//!
//! The [`Authenticator`] owns no HTTP types. A web layer feeds it the
//! session id from the cookie and the presented credentials, and turns the
//! returned outcomes into responses.

use crate::config::{AuthConfig, AuthMode, BasicSessionPolicy};
use crate::credentials::AuthAttempt;
use crate::environment::{AuthEnvironment, Clock};
use crate::error::{AuthError, Result};
use crate::flash::{FlashChannel, FLASH_ERROR};
use crate::providers::{PasswordComparator, SessionStore, UserRepository};
use crate::state::{AuthPhase, Principal, SessionId, SessionPayload, SessionRecord};
use crate::verifier::{CredentialVerifier, VerifierOptions};
use std::future::Future;
use std::sync::Arc;

/// Session state of one request after cookie resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Where the request stands.
    pub phase: AuthPhase,

    /// The live record, if the cookie matched one.
    pub record: Option<SessionRecord>,
}

impl Resolution {
    /// No session presented (or the presented one is gone).
    #[must_use]
    pub const fn none() -> Self {
        Self {
            phase: AuthPhase::NoSession,
            record: None,
        }
    }

    /// Whether the request is authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.phase == AuthPhase::Authenticated
    }

    /// Principal for downstream handlers. `None` unless authenticated.
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        if self.is_authenticated() {
            self.record.as_ref()?.principal.as_ref()
        } else {
            None
        }
    }

    /// Id of the live session, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.record.as_ref().map(|record| &record.session_id)
    }
}

/// Result of a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Credentials accepted and the session regenerated.
    ///
    /// `record` is the committed post-login record; its id goes in the cookie.
    Authenticated {
        /// New session record
        record: SessionRecord,
    },

    /// Basic credentials accepted under [`BasicSessionPolicy::Stateless`].
    ///
    /// No session was touched.
    Verified {
        /// Verified identity for this request only
        principal: Principal,
    },

    /// Credentials rejected.
    ///
    /// When `record` is present, an `"error"` flash was pushed to it and the
    /// client should hold its cookie. `None` for stateless Basic attempts.
    Rejected {
        /// Session carrying the flash message
        record: Option<SessionRecord>,
    },

    /// The source session was retired by a concurrent request mid-login.
    ///
    /// Handled as a rejection without a flash message.
    Conflict,
}

/// What to send an unauthenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    /// Redirect to the login entry point.
    Redirect {
        /// Target location
        location: String,
    },

    /// `401` with `WWW-Authenticate: Basic realm="<realm>"`.
    Basic {
        /// Realm for the challenge header
        realm: String,
    },
}

/// Result of a logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// The session was destroyed.
    Destroyed {
        /// Retired id
        session_id: SessionId,
    },

    /// There was no live session to destroy.
    NoSession,
}

/// Session-backed authenticator.
///
/// # Type Parameters
///
/// - `U`: User repository
/// - `P`: Password comparator
/// - `S`: Session store
pub struct Authenticator<U, P, S> {
    verifier: CredentialVerifier<U, P>,
    sessions: Arc<S>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<U, P, S> std::fmt::Debug for Authenticator<U, P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<U, P, S> Authenticator<U, P, S>
where
    U: UserRepository,
    P: PasswordComparator,
    S: SessionStore + 'static,
{
    /// Create an authenticator.
    ///
    /// User lookups share the store timeout from `config`.
    #[must_use]
    pub fn new(env: AuthEnvironment<U, P, S>, config: AuthConfig) -> Self {
        let verifier = CredentialVerifier::new(env.users, env.comparator, config.store_timeout);
        Self {
            verifier,
            sessions: Arc::new(env.sessions),
            config: Arc::new(config),
            clock: env.clock,
        }
    }

    /// Replace the verifier's principal options.
    #[must_use]
    pub fn with_verifier_options(mut self, options: VerifierOptions) -> Self {
        self.verifier = self.verifier.with_options(options);
        self
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Bound a store call by the configured timeout.
    async fn bounded<T>(&self, op: impl Future<Output = Result<T>>) -> Result<T> {
        let result = tokio::time::timeout(self.config.store_timeout, op)
            .await
            .unwrap_or_else(|_| Err(AuthError::BackendUnavailable("session store timed out".into())));

        if let Err(AuthError::BackendUnavailable(detail)) = &result {
            tracing::error!(error = %detail, "Session store unavailable");
        }
        result
    }

    /// Resolve the session named by the request cookie.
    ///
    /// An unknown, retired, or expired id resolves to [`AuthPhase::NoSession`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::BackendUnavailable`] if the store fails or times out.
    pub async fn resolve(&self, cookie: Option<&SessionId>) -> Result<Resolution> {
        let Some(session_id) = cookie else {
            return Ok(Resolution::none());
        };

        let Some(record) = self.bounded(self.sessions.load(session_id)).await? else {
            tracing::debug!(session_id = %session_id, "Cookie names no live session");
            return Ok(Resolution::none());
        };

        let phase = if record.is_authenticated(self.clock.now()) {
            AuthPhase::Authenticated
        } else {
            AuthPhase::Unauthenticated
        };

        Ok(Resolution {
            phase,
            record: Some(record),
        })
    }

    /// Verify credentials and move the session accordingly.
    ///
    /// On success the session is regenerated with a fresh payload (principal
    /// plus expiry when a TTL is configured) and the old id retired. The
    /// commit runs on its own task, so it completes even if the caller is
    /// dropped. In session mode a rejection flashes the public message under
    /// `"error"`, creating a session first if the request had none. Basic
    /// mode rejections never touch the store.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::BackendUnavailable`] if the repository or store
    /// fails. Credential rejections are outcomes, not errors.
    pub async fn login(&self, resolution: Resolution, attempt: &AuthAttempt) -> Result<LoginOutcome> {
        let stateless =
            attempt.is_basic() && self.config.basic_session_policy == BasicSessionPolicy::Stateless;

        tracing::debug!(
            phase = ?AuthPhase::Authenticating,
            basic = attempt.is_basic(),
            "Verifying credentials"
        );

        match self.verifier.verify(attempt).await {
            Ok(principal) if stateless => Ok(LoginOutcome::Verified { principal }),
            Ok(principal) => self.commit_login(resolution.record, principal).await,
            Err(err) if err.is_user_error() => {
                if let AuthError::InvalidCredentials { reason } = &err {
                    tracing::debug!(reason = reason.as_str(), "Credential check failed");
                }
                tracing::info!("Login rejected");
                if stateless {
                    Ok(LoginOutcome::Rejected { record: None })
                } else {
                    self.reject(resolution.record, &err).await
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "Credential verification failed");
                Err(err)
            }
        }
    }

    async fn commit_login(
        &self,
        record: Option<SessionRecord>,
        principal: Principal,
    ) -> Result<LoginOutcome> {
        let expires_at = match self.config.session_ttl {
            Some(ttl) => Some(self.clock.now().checked_add_signed(ttl).ok_or_else(|| {
                AuthError::ConfigError("session_ttl overflows the session expiry".into())
            })?),
            None => None,
        };

        let source = match record {
            Some(record) => record,
            None => self.bounded(self.sessions.create()).await?,
        };

        let payload = SessionPayload::fresh()
            .with_principal(principal)
            .expiring_at(expires_at);

        let sessions = Arc::clone(&self.sessions);
        let source_id = source.session_id.clone();
        let commit = tokio::spawn(async move { sessions.regenerate(&source, payload).await });

        // Timing out here detaches the task; the write still lands or fails whole.
        let joined = self
            .bounded(async {
                commit
                    .await
                    .map_err(|e| AuthError::InternalError(format!("login commit task failed: {e}")))?
            })
            .await;

        match joined {
            Ok(record) => {
                tracing::info!(
                    old_session_id = %source_id,
                    session_id = %record.session_id,
                    "Login succeeded"
                );
                Ok(LoginOutcome::Authenticated { record })
            }
            Err(AuthError::SessionNotFound) => {
                tracing::warn!(
                    session_id = %source_id,
                    "Session retired by a concurrent login"
                );
                Ok(LoginOutcome::Conflict)
            }
            Err(err) => Err(err),
        }
    }

    async fn reject(&self, record: Option<SessionRecord>, err: &AuthError) -> Result<LoginOutcome> {
        // A Basic challenge carries no cookie, so a flash would never be read.
        if matches!(self.config.mode, AuthMode::Basic { .. }) {
            return Ok(LoginOutcome::Rejected { record: None });
        }

        let record = match record {
            Some(record) => record,
            None => self.bounded(self.sessions.create()).await?,
        };

        let flash = FlashChannel::new(&*self.sessions, &record.session_id);
        match self.bounded(flash.push(FLASH_ERROR, err.public_message())).await {
            Ok(()) => Ok(LoginOutcome::Rejected {
                record: Some(record),
            }),
            Err(AuthError::SessionNotFound) => {
                tracing::warn!(
                    session_id = %record.session_id,
                    "Session retired by a concurrent login"
                );
                Ok(LoginOutcome::Conflict)
            }
            Err(err) => Err(err),
        }
    }

    /// Response for an unauthenticated request without credentials.
    #[must_use]
    pub fn challenge(&self) -> Challenge {
        match &self.config.mode {
            AuthMode::Session { login_path, .. } => Challenge::Redirect {
                location: login_path.clone(),
            },
            AuthMode::Basic { realm } => Challenge::Basic {
                realm: realm.clone(),
            },
        }
    }

    /// Destroy the request's session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::BackendUnavailable`] if the store fails or times out.
    pub async fn logout(&self, resolution: Resolution) -> Result<LogoutOutcome> {
        let Some(record) = resolution.record else {
            return Ok(LogoutOutcome::NoSession);
        };

        self.bounded(self.sessions.destroy(&record.session_id)).await?;
        tracing::info!(session_id = %record.session_id, "Logged out");

        Ok(LogoutOutcome::Destroyed {
            session_id: record.session_id,
        })
    }

    /// Read and clear a flash category of `session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::BackendUnavailable`] if the store fails or times out.
    pub async fn consume_flash(&self, session_id: &SessionId, category: &str) -> Result<Vec<String>> {
        let flash = FlashChannel::new(&*self.sessions, session_id);
        self.bounded(flash.consume(category)).await
    }
}
