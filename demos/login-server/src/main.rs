//! Form-login demo server.
//!
//! Serves a login page and one protected route on top of `gatehouse-web`.
//! Sign in as `admin` / `supersecret`.
//!
//! ```text
//! GATEHOUSE_SECRET=0123456789abcdef0123456789abcdef cargo run -p login-server
//! ```
//!
//! Sessions live in memory unless `GATEHOUSE_REDIS_URL` is set.
//! `GATEHOUSE_BIND` overrides the listen address (default `127.0.0.1:3000`).

use axum::{
    Router,
    middleware::from_fn_with_state,
    response::{Html, IntoResponse},
    routing::get,
};
use gatehouse_auth::{
    AuthConfig, Authenticator, FLASH_ERROR,
    environment::AuthEnvironment,
    mocks::MockUserRepository,
    providers::{ConstantTimeComparator, SessionStore},
    stores::{MemorySessionStore, RedisSessionStore},
};
use gatehouse_web::{
    AppError, AuthContext, GateState, SessionHandle, auth_routes, require_auth, session_layer,
};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_BIND: &str = "127.0.0.1:3000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "login_server=info,gatehouse_auth=info,gatehouse_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Gatehouse login server");

    let config = AuthConfig::from_env()?;
    info!(mode = ?config.mode, cookie = %config.cookie_name, "Configuration loaded");

    let bind = std::env::var("GATEHOUSE_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());

    match std::env::var("GATEHOUSE_REDIS_URL") {
        Ok(url) => {
            info!("Connecting to Redis session store...");
            let store = RedisSessionStore::new(&url, config.storage_ttl).await?;
            info!("Redis session store connected");
            serve(config, store, &bind).await
        }
        Err(_) => {
            warn!("GATEHOUSE_REDIS_URL not set, sessions are held in memory");
            serve(config, MemorySessionStore::new(), &bind).await
        }
    }
}

async fn serve<S>(config: AuthConfig, store: S, bind: &str) -> anyhow::Result<()>
where
    S: SessionStore + 'static,
{
    let env = AuthEnvironment::new(MockUserRepository::with_admin(), ConstantTimeComparator, store);
    let state = GateState::new(Authenticator::new(env, config))?;

    let protected = Router::new()
        .route("/members", get(members))
        .route_layer(from_fn_with_state(
            state.clone(),
            require_auth::<MockUserRepository, ConstantTimeComparator, S>,
        ));

    let app = Router::new()
        .route("/", get(index))
        .route("/login", get(login_page))
        .route("/auth-failed", get(auth_failed))
        .merge(protected)
        .merge(auth_routes(state.clone()))
        .layer(session_layer(state));

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn index(ctx: AuthContext) -> Html<String> {
    let body = match ctx.principal {
        Some(principal) => format!(
            "<p>Signed in as user {}.</p><p><a href=\"/members\">Members</a> | <a href=\"/logout\">Log out</a></p>",
            principal.id
        ),
        None => "<p><a href=\"/login\">Log in</a></p>".to_string(),
    };
    Html(body)
}

async fn login_page() -> Html<&'static str> {
    Html(
        "<form method=\"post\" action=\"/login\">\
         <input name=\"username\" placeholder=\"username\">\
         <input name=\"password\" type=\"password\" placeholder=\"password\">\
         <button type=\"submit\">Log in</button>\
         </form>",
    )
}

async fn auth_failed(session: SessionHandle) -> Result<impl IntoResponse, AppError> {
    let messages = session.consume_flash(FLASH_ERROR).await?;
    let items: String = messages.iter().map(|m| format!("<li>{m}</li>")).collect();
    Ok(Html(format!(
        "<ul>{items}</ul><p><a href=\"/login\">Try again</a></p>"
    )))
}

async fn members(ctx: AuthContext) -> String {
    let id = ctx.principal.map(|p| p.id.to_string()).unwrap_or_default();
    format!("Welcome, member {id}")
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
