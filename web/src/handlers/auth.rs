//! Login and logout endpoints.
//!
//! # Endpoints
//!
//! ```text
//! POST <login_path>   (form: username, password)
//! GET|POST /logout
//! ```

use crate::error::AppError;
use crate::response;
use crate::state::GateState;
use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
    Extension, Form, Router,
};
use gatehouse_auth::providers::{PasswordComparator, SessionStore, UserRepository};
use gatehouse_auth::{AuthAttempt, AuthMode, LoginOutcome, Resolution, SessionRecord};
use serde::Deserialize;
use std::fmt;

/// Login form body.
///
/// Missing fields deserialize as empty strings and are rejected like any
/// other invalid credential.
#[derive(Deserialize)]
pub struct LoginForm {
    /// Username
    #[serde(default)]
    pub username: String,
    /// Password
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Where a successful form login lands.
fn success_location(mode: &AuthMode) -> &str {
    match mode {
        AuthMode::Session { success_path, .. } => success_path,
        AuthMode::Basic { .. } => "/",
    }
}

/// Path the login form posts to.
fn login_location(mode: &AuthMode) -> &str {
    match mode {
        AuthMode::Session { login_path, .. } => login_path,
        AuthMode::Basic { .. } => "/login",
    }
}

fn rejected<U, P, S>(
    state: &GateState<U, P, S>,
    record: Option<&SessionRecord>,
) -> Result<Response, AppError>
where
    U: UserRepository + 'static,
    P: PasswordComparator + 'static,
    S: SessionStore + 'static,
{
    match &state.auth.config().mode {
        AuthMode::Session { failure_path, .. } => {
            let cookie = record
                .map(|record| state.cookies.issue(&record.session_id))
                .transpose()?;
            Ok(response::found(failure_path, cookie))
        }
        AuthMode::Basic { realm } => Ok(response::basic_challenge(realm)),
    }
}

/// Verify a login form.
///
/// - Success: `302` to the success location with the regenerated session cookie
/// - Rejection: `302` to the failure location with the flash-carrying
///   session cookie (`401` challenge in Basic mode)
///
/// # Errors
///
/// Returns `503` if the user repository or session store is unavailable.
pub async fn login<U, P, S>(
    State(state): State<GateState<U, P, S>>,
    Extension(resolution): Extension<Resolution>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError>
where
    U: UserRepository + 'static,
    P: PasswordComparator + 'static,
    S: SessionStore + 'static,
{
    let attempt = AuthAttempt::password(form.username, form.password);

    match state.auth.login(resolution, &attempt).await? {
        LoginOutcome::Authenticated { record } => {
            let cookie = state.cookies.issue(&record.session_id)?;
            Ok(response::found(
                success_location(&state.auth.config().mode),
                Some(cookie),
            ))
        }
        LoginOutcome::Verified { .. } => Ok(response::found(
            success_location(&state.auth.config().mode),
            None,
        )),
        LoginOutcome::Rejected { record } => rejected(&state, record.as_ref()),
        LoginOutcome::Conflict => rejected(&state, None),
    }
}

/// Destroy the session and clear the cookie, then `302` to `/`.
///
/// # Errors
///
/// Returns `503` if the session store is unavailable.
pub async fn logout<U, P, S>(
    State(state): State<GateState<U, P, S>>,
    Extension(resolution): Extension<Resolution>,
) -> Result<Response, AppError>
where
    U: UserRepository + 'static,
    P: PasswordComparator + 'static,
    S: SessionStore + 'static,
{
    state.auth.logout(resolution).await?;
    Ok(response::found("/", Some(state.cookies.clear()?)))
}

/// Login and logout routes, bound to `state`.
///
/// Must be wrapped in [`crate::session_layer`].
pub fn auth_routes<U, P, S>(state: GateState<U, P, S>) -> Router
where
    U: UserRepository + 'static,
    P: PasswordComparator + 'static,
    S: SessionStore + 'static,
{
    let login_path = login_location(&state.auth.config().mode).to_string();

    Router::new()
        .route(&login_path, post(login::<U, P, S>))
        .route("/logout", get(logout::<U, P, S>).post(logout::<U, P, S>))
        .with_state(state)
}
