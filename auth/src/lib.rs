//! # Gatehouse Authentication
//!
//! Session-backed authentication: credential verification, session
//! regeneration on login, lazy expiry, and one-shot flash messages.
//!
//! ## Architecture
//!
//! The crate is the functional core. It knows nothing about HTTP; a web
//! layer (see `gatehouse-web`) drives the [`Authenticator`]:
//!
//! ```text
//! cookie → resolve → (Authenticated | credentials → verify → regenerate | flash) → outcome
//! ```
//!
//! User records come from an injected [`providers::UserRepository`] and
//! sessions live behind the [`providers::SessionStore`] trait, with
//! in-memory and Redis implementations in [`stores`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use gatehouse_auth::config::{AuthConfig, AuthMode};
//! use gatehouse_auth::environment::AuthEnvironment;
//! use gatehouse_auth::mocks::MockUserRepository;
//! use gatehouse_auth::providers::ConstantTimeComparator;
//! use gatehouse_auth::stores::MemorySessionStore;
//! use gatehouse_auth::{AuthAttempt, Authenticator, LoginOutcome};
//!
//! # async fn example() -> gatehouse_auth::Result<()> {
//! let config = AuthConfig::new("a-secret-of-at-least-thirty-two-bytes!", AuthMode::session())?;
//! let env = AuthEnvironment::new(
//!     MockUserRepository::with_admin(),
//!     ConstantTimeComparator,
//!     MemorySessionStore::new(),
//! );
//! let auth = Authenticator::new(env, config);
//!
//! let resolution = auth.resolve(None).await?;
//! let outcome = auth
//!     .login(resolution, &AuthAttempt::password("admin", "supersecret"))
//!     .await?;
//! assert!(matches!(outcome, LoginOutcome::Authenticated { .. }));
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod authenticator;
pub mod codec;
pub mod config;
pub mod credentials;
pub mod environment;
pub mod error;
pub mod flash;
pub mod providers;
pub mod state;
pub mod stores;
pub mod verifier;

// Mock implementations for testing
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use authenticator::{Authenticator, Challenge, LoginOutcome, LogoutOutcome, Resolution};
pub use config::{AuthConfig, AuthMode, BasicSessionPolicy};
pub use credentials::AuthAttempt;
pub use error::{AuthError, Result};
pub use flash::{FlashChannel, FLASH_ERROR};
pub use state::{AuthPhase, Principal, SessionId, SessionPayload, SessionRecord, UserId};
pub use verifier::{CredentialVerifier, VerifierOptions};
