//! Values exchanged between the gateway and the OIDC client

use serde::Deserialize;

use crate::oidc::generators;
use crate::oidc::id_token::IdTokenClaims;

/// Profile claims returned by the userinfo endpoint, keyed by claim name.
pub type UserInfo = serde_json::Map<String, serde_json::Value>;

/// The `(nonce, state)` pair bound to one `/login` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttempt {
    /// Bound into the ID token by the provider.
    pub nonce: String,
    /// Echoed back on the callback.
    pub state: String,
}

impl LoginAttempt {
    /// Creates an attempt with freshly generated random values.
    pub fn generate() -> Self {
        Self {
            nonce: generators::nonce(),
            state: generators::state(),
        }
    }
}

/// Query parameters the provider appends to the redirect URI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code, present on success.
    #[serde(default)]
    pub code: Option<String>,
    /// Echo of the `state` sent in the authorization request.
    #[serde(default)]
    pub state: Option<String>,
    /// OAuth error code, present on failure.
    #[serde(default)]
    pub error: Option<String>,
    /// Human-readable companion to `error`.
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Tokens obtained from a successful code exchange.
#[derive(Debug, Clone)]
pub struct TokenSet {
    /// Bearer token for the userinfo endpoint.
    pub access_token: String,
    /// Verified claims of the ID token.
    pub claims: IdTokenClaims,
}
