//! Route guard for protected resources.

use crate::error::AppError;
use crate::response;
use crate::session::{AuthContext, SessionHandle};
use crate::state::{FlashAccess, GateState};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use gatehouse_auth::providers::{PasswordComparator, SessionStore, UserRepository};
use gatehouse_auth::{
    AuthAttempt, AuthError, AuthMode, AuthPhase, LoginOutcome, Resolution, SessionRecord,
};
use std::sync::Arc;

/// Require an authenticated request.
///
/// - Authenticated session: pass through
/// - `Authorization: Basic` present: verify it, then pass or challenge
/// - Otherwise: challenge per [`AuthMode`] (redirect or `401`)
///
/// Must run inside [`crate::session_layer`].
///
/// # Example
///
/// ```ignore
/// let protected = Router::new()
///     .route("/members", get(members))
///     .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth));
/// ```
pub async fn require_auth<U, P, S>(
    State(state): State<GateState<U, P, S>>,
    mut req: Request,
    next: Next,
) -> Response
where
    U: UserRepository + 'static,
    P: PasswordComparator + 'static,
    S: SessionStore + 'static,
{
    let Some(resolution) = req.extensions().get::<Resolution>().cloned() else {
        return AppError::internal("An internal error occurred")
            .with_source(anyhow::anyhow!("session layer not installed"))
            .into_response();
    };

    if resolution.phase == AuthPhase::Authenticated {
        return next.run(req).await;
    }

    let Some(authorization) = req.headers().get(header::AUTHORIZATION) else {
        return response::challenge(&state.auth.challenge());
    };

    let attempt = authorization
        .to_str()
        .map_err(|_| AuthError::MalformedCredentialInput("non-visible characters".into()))
        .and_then(AuthAttempt::from_basic_header);
    let attempt = match attempt {
        Ok(attempt) => attempt,
        Err(err) => {
            tracing::debug!(error = %err, "Malformed Authorization header");
            return reject(&state, None);
        }
    };

    match state.auth.login(resolution, &attempt).await {
        Ok(LoginOutcome::Verified { principal }) => {
            req.extensions_mut().insert(AuthContext::verified(principal));
            next.run(req).await
        }
        Ok(LoginOutcome::Authenticated { record }) => {
            let cookie = match state.cookies.issue(&record.session_id) {
                Ok(cookie) => cookie,
                Err(err) => return AppError::from(err).into_response(),
            };
            let flash: Arc<dyn FlashAccess> = state.auth.clone();
            let handle = SessionHandle::new(Some(record.session_id.clone()), flash);
            let resolution = Resolution {
                phase: AuthPhase::Authenticated,
                record: Some(record),
            };
            let extensions = req.extensions_mut();
            extensions.insert(AuthContext::from_resolution(&resolution));
            extensions.insert(handle);
            extensions.insert(resolution);

            let mut response = next.run(req).await;
            response.headers_mut().append(header::SET_COOKIE, cookie);
            response
        }
        Ok(LoginOutcome::Rejected { record }) => reject(&state, record.as_ref()),
        Ok(LoginOutcome::Conflict) => reject(&state, None),
        Err(err) => AppError::from(err).into_response(),
    }
}

/// Response for rejected header credentials.
///
/// Basic mode re-challenges. Session mode sends the client to the failure
/// location with the cookie of the session holding the flash. Without such
/// a session (stateless Basic, malformed header, lost race) there is nothing
/// to show there, so the request is challenged like any anonymous one.
fn reject<U, P, S>(state: &GateState<U, P, S>, record: Option<&SessionRecord>) -> Response
where
    U: UserRepository + 'static,
    P: PasswordComparator + 'static,
    S: SessionStore + 'static,
{
    match (&state.auth.config().mode, record) {
        (AuthMode::Basic { realm }, _) => response::basic_challenge(realm),
        (AuthMode::Session { failure_path, .. }, Some(record)) => {
            match state.cookies.issue(&record.session_id) {
                Ok(cookie) => response::found(failure_path, Some(cookie)),
                Err(err) => AppError::from(err).into_response(),
            }
        }
        (AuthMode::Session { .. }, None) => response::challenge(&state.auth.challenge()),
    }
}
