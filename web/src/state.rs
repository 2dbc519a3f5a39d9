//! Shared state for the session layer, guard, and handlers.

use crate::cookie::{CookieCodec, CookieError};
use futures::future::BoxFuture;
use gatehouse_auth::providers::{PasswordComparator, SessionStore, UserRepository};
use gatehouse_auth::{Authenticator, Result, SessionId};
use std::sync::Arc;

/// State shared by every request.
///
/// Cheap to clone; everything sits behind an `Arc`.
pub struct GateState<U, P, S> {
    /// The authenticator driving the state machine.
    pub auth: Arc<Authenticator<U, P, S>>,

    /// Session cookie codec.
    pub cookies: Arc<CookieCodec>,
}

impl<U, P, S> Clone for GateState<U, P, S> {
    fn clone(&self) -> Self {
        Self {
            auth: Arc::clone(&self.auth),
            cookies: Arc::clone(&self.cookies),
        }
    }
}

impl<U, P, S> GateState<U, P, S>
where
    U: UserRepository + 'static,
    P: PasswordComparator + 'static,
    S: SessionStore + 'static,
{
    /// Wrap an authenticator, deriving the cookie codec from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CookieError`] if the configured cookie name is invalid.
    pub fn new(auth: Authenticator<U, P, S>) -> std::result::Result<Self, CookieError> {
        let cookies = CookieCodec::new(auth.config())?;
        Ok(Self {
            auth: Arc::new(auth),
            cookies: Arc::new(cookies),
        })
    }
}

/// Flash access for [`crate::session::SessionHandle`], with the
/// authenticator's type parameters erased.
pub(crate) trait FlashAccess: Send + Sync {
    fn consume<'a>(
        &'a self,
        session_id: &'a SessionId,
        category: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>>>;
}

impl<U, P, S> FlashAccess for Authenticator<U, P, S>
where
    U: UserRepository + 'static,
    P: PasswordComparator + 'static,
    S: SessionStore + 'static,
{
    fn consume<'a>(
        &'a self,
        session_id: &'a SessionId,
        category: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(self.consume_flash(session_id, category))
    }
}
