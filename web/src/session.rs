//! Session-resolving middleware.
//!
//! # Flow
//!
//! 1. **Extract** the signed session cookie (a bad signature counts as none)
//! 2. **Resolve** it through [`Authenticator::resolve`](gatehouse_auth::Authenticator::resolve)
//! 3. **Store** the [`Resolution`], an [`AuthContext`], and a
//!    [`SessionHandle`] in request extensions
//! 4. **Run** the inner service inside a span carrying the session prefix
//!
//! A store failure during resolution short-circuits with `503`.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use gatehouse_web::{session_layer, GateState};
//!
//! let app = Router::new()
//!     .route("/members", get(members))
//!     .layer(session_layer(state));
//! ```

use crate::error::AppError;
use crate::state::{FlashAccess, GateState};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use gatehouse_auth::providers::{PasswordComparator, SessionStore, UserRepository};
use gatehouse_auth::{Principal, Resolution, Result, SessionId};
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;

/// Authentication state handed to downstream handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Whether the request carries a live, authenticated session.
    pub is_authenticated: bool,
    /// The authenticated principal, if any.
    pub principal: Option<Principal>,
}

impl AuthContext {
    pub(crate) fn from_resolution(resolution: &Resolution) -> Self {
        Self {
            is_authenticated: resolution.is_authenticated(),
            principal: resolution.principal().cloned(),
        }
    }

    pub(crate) const fn verified(principal: Principal) -> Self {
        Self {
            is_authenticated: true,
            principal: Some(principal),
        }
    }
}

/// The request's session, as seen by handlers.
///
/// Exposes the id and flash messages. It cannot create, regenerate, or
/// destroy sessions.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: Option<SessionId>,
    flash: Arc<dyn FlashAccess>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    pub(crate) fn new(session_id: Option<SessionId>, flash: Arc<dyn FlashAccess>) -> Self {
        Self { session_id, flash }
    }

    /// Id of the request's live session, if any.
    #[must_use]
    pub const fn id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Read and clear a flash category. Empty without a session.
    ///
    /// # Errors
    ///
    /// Returns [`gatehouse_auth::AuthError::BackendUnavailable`] if the
    /// store fails or times out.
    pub async fn consume_flash(&self, category: &str) -> Result<Vec<String>> {
        match &self.session_id {
            Some(session_id) => self.flash.consume(session_id, category).await,
            None => Ok(Vec::new()),
        }
    }
}

fn missing_layer() -> AppError {
    AppError::internal("An internal error occurred")
        .with_source(anyhow::anyhow!("session layer not installed"))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or_else(missing_layer)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or_else(missing_layer)
    }
}

/// Create a layer that resolves the session of every request.
#[must_use]
pub fn session_layer<U, P, S>(state: GateState<U, P, S>) -> SessionLayer<U, P, S> {
    SessionLayer { state }
}

/// Layer for session resolution.
pub struct SessionLayer<U, P, S> {
    state: GateState<U, P, S>,
}

impl<U, P, S> Clone for SessionLayer<U, P, S> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<Inner, U, P, S> Layer<Inner> for SessionLayer<U, P, S> {
    type Service = SessionMiddleware<Inner, U, P, S>;

    fn layer(&self, inner: Inner) -> Self::Service {
        SessionMiddleware {
            inner,
            state: self.state.clone(),
        }
    }
}

/// Middleware service for session resolution.
pub struct SessionMiddleware<Inner, U, P, S> {
    inner: Inner,
    state: GateState<U, P, S>,
}

impl<Inner: Clone, U, P, S> Clone for SessionMiddleware<Inner, U, P, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            state: self.state.clone(),
        }
    }
}

impl<Inner, U, P, S> Service<Request> for SessionMiddleware<Inner, U, P, S>
where
    Inner: Service<Request, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    U: UserRepository + 'static,
    P: PasswordComparator + 'static,
    S: SessionStore + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        // The ready clone is the one that must be called
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let state = self.state.clone();

        Box::pin(async move {
            let cookie = state.cookies.from_headers(req.headers());

            let resolution = match state.auth.resolve(cookie.as_ref()).await {
                Ok(resolution) => resolution,
                Err(err) => return Ok(AppError::from(err).into_response()),
            };

            let span = tracing::info_span!(
                "session",
                session_id = resolution.session_id().map(SessionId::short).unwrap_or("-"),
                phase = ?resolution.phase,
            );

            let flash: Arc<dyn FlashAccess> = state.auth.clone();
            let extensions = req.extensions_mut();
            extensions.insert(AuthContext::from_resolution(&resolution));
            extensions.insert(SessionHandle::new(resolution.session_id().cloned(), flash));
            extensions.insert(resolution);

            inner.call(req).instrument(span).await
        })
    }
}
