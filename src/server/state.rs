//! Shared state handed to every handler

use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use tokio::sync::OnceCell;

use crate::config::{Config, MIN_SESSION_SECRET_LEN};
use crate::error::{GatewayError, Result};
use crate::oidc::OidcClient;
use crate::server::views::Views;
use crate::session::{SessionId, SessionStore};

/// Application state injected into the router.
///
/// The provider slot starts empty and is filled once by the discovery task;
/// handlers that need the client check [`AppState::client`] first.
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<Config>,
    /// OIDC client, set once discovery succeeds
    pub provider: Arc<OnceCell<OidcClient>>,
    /// Session storage
    pub sessions: Arc<dyn SessionStore>,
    /// Compiled templates
    pub views: Arc<Views>,
    key: Key,
}

impl AppState {
    /// Builds the state with an empty provider slot.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if the session secret is too short to
    /// derive a signing key from, or [`GatewayError::Template`] if the views
    /// fail to compile.
    pub fn new(config: Config, sessions: Arc<dyn SessionStore>) -> Result<Self> {
        if config.session.secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(GatewayError::Config(format!(
                "session.secret must be at least {MIN_SESSION_SECRET_LEN} bytes"
            ))
            .into());
        }

        let key = Key::derive_from(config.session.secret.as_bytes());

        Ok(Self {
            config: Arc::new(config),
            provider: Arc::new(OnceCell::new()),
            sessions,
            views: Arc::new(Views::new()?),
            key,
        })
    }

    /// The OIDC client, or `None` while discovery is pending or has failed.
    pub fn client(&self) -> Option<&OidcClient> {
        self.provider.get()
    }

    /// Installs the discovered client.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Discovery`] if a client is already installed.
    pub fn set_client(&self, client: OidcClient) -> Result<()> {
        self.provider.set(client).map_err(|_| {
            GatewayError::Discovery("OIDC client is already initialized".to_string()).into()
        })
    }

    /// Cookie carrying `id`, before signing.
    pub fn session_cookie(&self, id: &SessionId) -> Cookie<'static> {
        Cookie::build((self.config.session.cookie_name.clone(), id.to_string()))
            .http_only(true)
            .secure(self.config.session.secure_cookie)
            .same_site(SameSite::Lax)
            .path("/")
            .build()
    }

    /// Cookie used to expire the session cookie in the browser.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((self.config.session.cookie_name.clone(), ""))
            .path("/")
            .build()
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}
