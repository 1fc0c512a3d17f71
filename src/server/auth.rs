//! Authentication check middleware

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::SignedCookieJar;

use crate::oidc::UserInfo;
use crate::server::state::AppState;
use crate::session::{SessionId, SessionRecord};

/// Authentication status of the current request.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// Whether the session holds user info
    pub is_authenticated: bool,
    /// Claims of the logged-in user
    pub user_info: Option<UserInfo>,
}

impl From<&SessionRecord> for AuthContext {
    fn from(record: &SessionRecord) -> Self {
        Self {
            is_authenticated: record.is_authenticated(),
            user_info: record.user_info.clone(),
        }
    }
}

/// Session id carried by the request's signed cookie, if any.
pub fn session_id(state: &AppState, jar: &SignedCookieJar) -> Option<SessionId> {
    jar.get(&state.config.session.cookie_name)
        .map(|cookie| SessionId::from(cookie.value().to_string()))
}

/// Loads the session referenced by the request cookie.
///
/// Store failures are logged and treated as "no session".
pub async fn load_session(
    state: &AppState,
    jar: &SignedCookieJar,
) -> Option<(SessionId, SessionRecord)> {
    let id = session_id(state, jar)?;
    match state.sessions.get(&id).await {
        Ok(Some(record)) => Some((id, record)),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("Failed to load session: {:#}", e);
            None
        }
    }
}

/// Attaches an [`AuthContext`] to every request.
///
/// Only reads the session; never talks to the provider.
pub async fn check_auth(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let context = load_session(&state, &jar)
        .await
        .map(|(_, record)| AuthContext::from(&record))
        .unwrap_or_default();

    req.extensions_mut().insert(context);
    next.run(req).await
}
