//! Axum integration for Gatehouse session authentication.
//!
//! The imperative shell around `gatehouse-auth`: cookies in, redirects and
//! challenges out. All authentication decisions are made by the
//! [`Authenticator`](gatehouse_auth::Authenticator).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (Axum)         │  ← cookies, forms, headers
//! │  - session_layer: cookie → Resolution   │
//! │  - require_auth: pass / verify / 401    │
//! │  - login / logout handlers              │
//! ├─────────────────────────────────────────┤
//! │         Functional Core (auth)          │
//! │  - CredentialVerifier                   │
//! │  - SessionStore (regenerate, flash)     │
//! │  - Authenticator state machine          │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use axum::{middleware::from_fn_with_state, routing::get, Router};
//! use gatehouse_web::{auth_routes, require_auth, session_layer, GateState};
//!
//! let state = GateState::new(authenticator)?;
//!
//! let protected = Router::new()
//!     .route("/members", get(members))
//!     .route_layer(from_fn_with_state(state.clone(), require_auth));
//!
//! let app = Router::new()
//!     .merge(protected)
//!     .merge(auth_routes(state.clone()))
//!     .layer(session_layer(state));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cookie;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod response;
pub mod session;
pub mod state;

// Re-export key types for convenience
pub use cookie::{CookieCodec, CookieError};
pub use error::AppError;
pub use guard::require_auth;
pub use handlers::auth_routes;
pub use session::{session_layer, AuthContext, SessionHandle, SessionLayer};
pub use state::GateState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
