//! Route handlers
//!
//! # Routes
//!
//! - `GET /`          -- home page reflecting the session
//! - `GET /login`     -- start the authorization code flow
//! - `GET <callback>` -- complete the flow and store user info
//! - `GET /logout`    -- destroy the session
//! - `GET /healthz`   -- readiness of the OIDC client
//!
//! The callback never shows an error page. Every failure is logged and the
//! browser is sent home without user info in its session.

use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Extension;
use axum_extra::extract::cookie::SignedCookieJar;

use crate::error::{GatewayError, Result};
use crate::oidc::{CallbackParams, LoginAttempt, OidcClient, UserInfo};
use crate::server::auth::{self, AuthContext};
use crate::server::metrics;
use crate::server::state::AppState;
use crate::session::{SessionId, SessionRecord};

/// `302 Found` to `location`.
fn found(location: &str) -> Response {
    let value = HeaderValue::from_str(location).unwrap_or_else(|_| {
        tracing::warn!(location, "Redirect target is not a valid header value");
        HeaderValue::from_static("/")
    });
    (StatusCode::FOUND, [(header::LOCATION, value)]).into_response()
}

fn not_ready() -> Response {
    (
        GatewayError::NotReady.status_code(),
        "Service unavailable: identity provider not ready",
    )
        .into_response()
}

fn internal_error(error: &anyhow::Error) -> Response {
    let status = error
        .downcast_ref::<GatewayError>()
        .map(GatewayError::status_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, "Internal server error").into_response()
}

/// `GET /`
pub async fn home(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Response {
    match state.views.render_home(&context) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Failed to render home page: {:#}", e);
            internal_error(&e)
        }
    }
}

/// `GET /login`
///
/// Stores a fresh nonce and state in the session, creating the session if
/// needed, and redirects to the authorization endpoint.
pub async fn login(State(state): State<AppState>, jar: SignedCookieJar) -> Response {
    let Some(client) = state.client() else {
        tracing::warn!("Login requested before the OIDC client is ready");
        return not_ready();
    };

    let (id, mut record) = match auth::load_session(&state, &jar).await {
        Some(session) => session,
        None => (SessionId::generate(), SessionRecord::default()),
    };

    let attempt = LoginAttempt::generate();
    let url = match client.authorization_url(&attempt) {
        Ok(url) => url,
        Err(e) => {
            tracing::error!("Failed to build authorization URL: {:#}", e);
            return internal_error(&e);
        }
    };

    record.begin_login(&attempt);
    if let Err(e) = state.sessions.set(&id, record).await {
        tracing::error!("Failed to store login attempt: {:#}", e);
        return internal_error(&e);
    }

    metrics::record_login_started();
    tracing::debug!("Redirecting to authorization endpoint");

    let jar = jar.add(state.session_cookie(&id));
    (jar, found(url.as_str())).into_response()
}

/// `GET <callback_path>`
///
/// The stored nonce and state are cleared before the exchange and the
/// cleared record is persisted, so a pair is consumed even when the
/// exchange fails.
pub async fn callback(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    query: Option<Query<CallbackParams>>,
) -> Response {
    let Some(client) = state.client() else {
        tracing::warn!("Callback received before the OIDC client is ready");
        return not_ready();
    };

    let params = query.map(|Query(params)| params).unwrap_or_default();

    match complete_login(&state, client, &jar, &params).await {
        Ok(info) => {
            let subject = info.get("sub").and_then(|v| v.as_str()).unwrap_or("unknown");
            tracing::info!(sub = %subject, "User logged in");
            metrics::record_callback("success");
        }
        Err(e) => {
            tracing::warn!("Login callback failed: {:#}", e);
            metrics::record_callback(metrics::failure_outcome(&e));
        }
    }

    found("/")
}

async fn complete_login(
    state: &AppState,
    client: &OidcClient,
    jar: &SignedCookieJar,
    params: &CallbackParams,
) -> Result<UserInfo> {
    let (id, mut pending) = auth::load_session(state, jar)
        .await
        .ok_or(GatewayError::MissingState)?;

    let attempt = pending.take_login_attempt();
    state
        .sessions
        .set(&id, pending)
        .await
        .map_err(|e| GatewayError::Session(format!("failed to clear login attempt: {e:#}")))?;
    let attempt = attempt.ok_or(GatewayError::MissingState)?;

    let tokens = client.callback(params, &attempt).await?;
    let info = client.userinfo(&tokens).await?;

    // A logout during the exchange destroyed the record; do not revive it.
    let mut record = state
        .sessions
        .get(&id)
        .await
        .map_err(|e| GatewayError::Session(format!("failed to reload session: {e:#}")))?
        .ok_or_else(|| GatewayError::Session("session ended during login".to_string()))?;
    record.user_info = Some(info.clone());
    state
        .sessions
        .set(&id, record)
        .await
        .map_err(|e| GatewayError::Session(format!("failed to store user info: {e:#}")))?;

    Ok(info)
}

/// `GET /logout`
///
/// Redirects to `provider.logout_url`, falling back to the provider's
/// end-session endpoint and then to `/`.
pub async fn logout(State(state): State<AppState>, jar: SignedCookieJar) -> Response {
    if let Some(id) = auth::session_id(&state, &jar) {
        if let Err(e) = state.sessions.destroy(&id).await {
            tracing::warn!("Failed to destroy session: {:#}", e);
        }
    }

    metrics::record_logout();

    let target = state
        .config
        .provider
        .logout_url
        .clone()
        .or_else(|| {
            state
                .client()
                .and_then(OidcClient::end_session_url)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "/".to_string());

    let jar = jar.remove(state.removal_cookie());
    (jar, found(&target)).into_response()
}

/// `GET /healthz`
pub async fn healthz(State(state): State<AppState>) -> Response {
    if state.client().is_some() {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "discovering").into_response()
    }
}
