//! Error types for the OIDC gateway
//!
//! This module defines all error types used throughout the gateway,
//! using `thiserror` for ergonomic error handling.

use axum::http::StatusCode;
use thiserror::Error;

/// Main error type for gateway operations
///
/// Covers configuration loading, provider discovery, the callback
/// exchange, session storage and view rendering.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider metadata or JWKS could not be fetched or parsed
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Discovery has not completed, or failed, so no client is available
    #[error("OIDC client is not ready")]
    NotReady,

    /// The callback arrived for a session with no login attempt in flight
    #[error("No login attempt state stored in session")]
    MissingState,

    /// The `state` echoed by the provider differs from the stored one
    #[error("State mismatch: callback state does not match session")]
    StateMismatch,

    /// The ID token carries no `nonce` claim
    #[error("ID token is missing the nonce claim")]
    MissingNonce,

    /// The ID token `nonce` differs from the stored one
    #[error("Nonce mismatch: ID token nonce does not match session")]
    NonceMismatch,

    /// ID token signature, issuer, audience or expiry checks failed
    #[error("ID token validation failed: {0}")]
    IdToken(String),

    /// Token endpoint rejected the exchange or returned garbage
    #[error("Token endpoint error: {0}")]
    TokenEndpoint(String),

    /// Userinfo endpoint rejected the request or returned garbage
    #[error("Userinfo error: {0}")]
    UserInfo(String),

    /// The provider redirected back with an `error` parameter
    #[error("Provider returned error '{error}': {}", .description.as_deref().unwrap_or("no description"))]
    Provider {
        /// OAuth error code (e.g. `access_denied`)
        error: String,
        /// Optional human-readable description
        description: Option<String>,
    },

    /// The callback carried no authorization code
    #[error("Authorization code missing from callback")]
    MissingCode,

    /// Session store failures
    #[error("Session error: {0}")]
    Session(String),

    /// View rendering errors
    #[error("Template error: {0}")]
    Template(String),
}

impl GatewayError {
    /// HTTP status a handler should answer with when this error escapes it.
    ///
    /// The callback handler never uses this for protocol failures; those
    /// always become a redirect to the home page.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NotReady | GatewayError::Discovery(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::MissingState
            | GatewayError::StateMismatch
            | GatewayError::MissingNonce
            | GatewayError::NonceMismatch
            | GatewayError::IdToken(_)
            | GatewayError::Provider { .. }
            | GatewayError::MissingCode => StatusCode::BAD_REQUEST,
            GatewayError::TokenEndpoint(_) | GatewayError::UserInfo(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type alias for gateway operations
///
/// Uses `anyhow::Error` so call sites can attach context; handlers
/// downcast to [`GatewayError`] when they need to pick a response.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = GatewayError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_not_ready_maps_to_service_unavailable() {
        assert_eq!(
            GatewayError::NotReady.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_state_mismatch_maps_to_bad_request() {
        assert_eq!(
            GatewayError::StateMismatch.status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_token_endpoint_maps_to_bad_gateway() {
        let error = GatewayError::TokenEndpoint("400 invalid_grant".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_provider_error_display_with_description() {
        let error = GatewayError::Provider {
            error: "access_denied".to_string(),
            description: Some("user cancelled".to_string()),
        };
        assert_eq!(
            error.to_string(),
            "Provider returned error 'access_denied': user cancelled"
        );
    }

    #[test]
    fn test_provider_error_display_without_description() {
        let error = GatewayError::Provider {
            error: "server_error".to_string(),
            description: None,
        };
        assert!(error.to_string().contains("no description"));
    }

    #[test]
    fn test_session_error_maps_to_internal_error() {
        let error = GatewayError::Session("backend down".to_string());
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GatewayError>();
    }

    #[test]
    fn test_anyhow_downcast_recovers_variant() {
        let err: anyhow::Error = GatewayError::NotReady.into();
        assert!(matches!(
            err.downcast_ref::<GatewayError>(),
            Some(GatewayError::NotReady)
        ));
    }
}
