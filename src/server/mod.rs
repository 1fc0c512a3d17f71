//! HTTP server for the gateway
//!
//! # Module Layout
//!
//! - [`state`]    -- shared [`AppState`] and cookie helpers
//! - [`provider`] -- background discovery of the OIDC client
//! - [`auth`]     -- `check_auth` middleware and session loading
//! - [`handlers`] -- route handlers
//! - [`views`]    -- handlebars templates
//! - [`metrics`]  -- login flow counters

pub mod auth;
pub mod handlers;
pub mod metrics;
pub mod provider;
pub mod state;
pub mod views;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{middleware, Router};

use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::session::MemorySessionStore;

pub use auth::AuthContext;
pub use state::AppState;

/// How often expired sessions are purged from the in-memory store.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Builds the router for `state`.
///
/// If `provider.callback_path` is invalid the callback route is left out
/// and every other route is still served.
pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(handlers::home))
        .route("/login", get(handlers::login))
        .route("/logout", get(handlers::logout))
        .route("/healthz", get(handlers::healthz));

    match state.config.provider.callback_route() {
        Ok(path) => {
            tracing::debug!(path = %path, "Registering callback route");
            router = router.route(&path, get(handlers::callback));
        }
        Err(e) => {
            tracing::error!("Callback route disabled: {:#}", e);
        }
    }

    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::check_auth,
        ))
        .with_state(state)
}

/// Runs the gateway until Ctrl-C.
///
/// Binds the listener first and starts discovery in the background, so
/// the server answers (with 503 on login) while the provider is unknown.
///
/// # Errors
///
/// Returns an error if the state cannot be built or the listener cannot
/// bind.
pub async fn serve(config: Config) -> Result<()> {
    metrics::init_metrics_exporter(config.server.metrics_port);

    let store = Arc::new(
        MemorySessionStore::new(Duration::from_secs(config.session.ttl_seconds))
            .with_login_ttl(Duration::from_secs(config.session.login_ttl_seconds)),
    );
    let sweeper = Arc::clone(&store).spawn_sweeper(SESSION_SWEEP_INTERVAL);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let state = AppState::new(config, store)?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GatewayError::Config(format!("failed to bind {addr}: {e}")))?;
    tracing::info!("Gateway listening on {}", addr);

    let discovery = provider::spawn_discovery(state.clone());
    let app = router(state);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    discovery.abort();
    sweeper.abort();
    result?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
