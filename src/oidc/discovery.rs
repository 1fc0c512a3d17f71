//! OpenID Connect provider discovery
//!
//! Locates the provider's metadata document and signing keys before any
//! login can start.
//!
//! # Discovery sequence
//!
//! 1. The configured discovery URL is either the issuer itself or the full
//!    metadata URL. [`candidate_urls`] turns it into the URLs worth trying.
//! 2. [`fetch_provider_metadata`] GETs each candidate in order and returns
//!    the first document that parses and passes [`ProviderMetadata::validate`].
//! 3. [`fetch_jwks`] downloads the key set referenced by `jwks_uri`.
//!
//! # References
//!
//! - OpenID Connect Discovery 1.0 <https://openid.net/specs/openid-connect-discovery-1_0.html>
//! - RFC 8414 <https://www.rfc-editor.org/rfc/rfc8414>

use std::collections::HashMap;

use jsonwebtoken::jwk::JwkSet;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{GatewayError, Result};

const OPENID_CONFIGURATION: &str = "/.well-known/openid-configuration";
const OAUTH_AUTHORIZATION_SERVER: &str = "/.well-known/oauth-authorization-server";

/// Metadata document describing an OpenID provider.
///
/// # Examples
///
/// ```
/// use oidc_gateway::oidc::discovery::ProviderMetadata;
///
/// let json = r#"{
///     "issuer": "https://idp.example.com",
///     "authorization_endpoint": "https://idp.example.com/oauth2/authorize",
///     "token_endpoint": "https://idp.example.com/oauth2/token",
///     "userinfo_endpoint": "https://idp.example.com/oauth2/userInfo",
///     "jwks_uri": "https://idp.example.com/.well-known/jwks.json",
///     "response_types_supported": ["code", "token"]
/// }"#;
///
/// let meta: ProviderMetadata = serde_json::from_str(json).unwrap();
/// assert_eq!(meta.issuer, "https://idp.example.com");
/// assert!(meta.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProviderMetadata {
    /// Issuer identifier; ID tokens must carry it as `iss`.
    pub issuer: String,

    /// Where the browser is sent to log in.
    pub authorization_endpoint: String,

    /// Where authorization codes are exchanged for tokens.
    pub token_endpoint: String,

    /// Where profile claims are fetched with an access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,

    /// Location of the provider's signing keys.
    pub jwks_uri: String,

    /// RP-initiated logout endpoint, when the provider offers one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,

    /// List of `response_type` values the provider supports.
    #[serde(default)]
    pub response_types_supported: Vec<String>,

    /// Scopes the provider advertises.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// JWS algorithms the provider signs ID tokens with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token_signing_alg_values_supported: Option<Vec<String>>,

    /// Token endpoint client authentication methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_methods_supported: Option<Vec<String>>,

    /// Additional provider metadata fields not explicitly modelled above.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ProviderMetadata {
    /// Checks that the document can drive the authorization code flow.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Discovery`] if the issuer is empty, any
    /// endpoint is not an absolute URL, or the provider does not list the
    /// `code` response type.
    pub fn validate(&self) -> Result<()> {
        if self.issuer.trim().is_empty() {
            return Err(GatewayError::Discovery("metadata has an empty issuer".to_string()).into());
        }

        let endpoints = [
            ("authorization_endpoint", Some(&self.authorization_endpoint)),
            ("token_endpoint", Some(&self.token_endpoint)),
            ("jwks_uri", Some(&self.jwks_uri)),
            ("userinfo_endpoint", self.userinfo_endpoint.as_ref()),
            ("end_session_endpoint", self.end_session_endpoint.as_ref()),
        ];
        for (name, value) in endpoints {
            if let Some(value) = value {
                Url::parse(value).map_err(|e| {
                    GatewayError::Discovery(format!("metadata {name} is not a URL ({value}): {e}"))
                })?;
            }
        }

        if !self.response_types_supported.is_empty()
            && !self.response_types_supported.iter().any(|t| t == "code")
        {
            return Err(GatewayError::Discovery(
                "provider does not support the 'code' response type".to_string(),
            )
            .into());
        }

        Ok(())
    }

    /// Whether the provider accepts `client_secret_basic` at the token
    /// endpoint. Providers that do not advertise methods get the default,
    /// which is `client_secret_basic`.
    pub fn supports_client_secret_basic(&self) -> bool {
        match &self.token_endpoint_auth_methods_supported {
            None => true,
            Some(methods) => methods.iter().any(|m| m == "client_secret_basic"),
        }
    }
}

/// Builds the ordered list of metadata URLs to try for `discovery_url`.
///
/// A URL that already points at a `.well-known` document is used as is.
/// Otherwise it is treated as the issuer and two orderings are produced:
///
/// 1. `<issuer>/.well-known/openid-configuration` (path appending)
/// 2. `/.well-known/oauth-authorization-server<path>` (path insertion)
pub fn candidate_urls(discovery_url: &Url) -> Vec<Url> {
    if discovery_url.path().contains("/.well-known/") {
        return vec![discovery_url.clone()];
    }

    let path = discovery_url.path().trim_end_matches('/').to_string();
    let mut candidates = Vec::with_capacity(2);

    let mut appended = discovery_url.clone();
    appended.set_path(&format!("{path}{OPENID_CONFIGURATION}"));
    appended.set_query(None);
    appended.set_fragment(None);
    candidates.push(appended);

    let mut inserted = discovery_url.clone();
    inserted.set_path(&format!("{OAUTH_AUTHORIZATION_SERVER}{path}"));
    inserted.set_query(None);
    inserted.set_fragment(None);
    candidates.push(inserted);

    candidates
}

/// Fetches and validates the provider metadata document.
///
/// # Arguments
///
/// * `http` - Shared [`reqwest::Client`]; its timeout bounds each attempt.
/// * `discovery_url` - Issuer URL or full metadata URL.
///
/// # Errors
///
/// Returns [`GatewayError::Discovery`] carrying the last failure if no
/// candidate yields a valid document.
///
/// # Examples
///
/// ```no_run
/// use url::Url;
/// use oidc_gateway::oidc::discovery::fetch_provider_metadata;
///
/// # async fn example() -> oidc_gateway::error::Result<()> {
/// let http = reqwest::Client::new();
/// let issuer = Url::parse("https://idp.example.com")?;
/// let meta = fetch_provider_metadata(&http, &issuer).await?;
/// println!("token endpoint: {}", meta.token_endpoint);
/// # Ok(())
/// # }
/// ```
pub async fn fetch_provider_metadata(
    http: &reqwest::Client,
    discovery_url: &Url,
) -> Result<ProviderMetadata> {
    let mut last_error = format!("no metadata candidates for {discovery_url}");

    for candidate in candidate_urls(discovery_url) {
        tracing::debug!(url = %candidate, "Fetching provider metadata");

        let resp = match http.get(candidate.clone()).send().await {
            Ok(r) => r,
            Err(e) => {
                last_error = format!("{candidate}: {e}");
                continue;
            }
        };

        if !resp.status().is_success() {
            last_error = format!("{candidate}: HTTP {}", resp.status());
            continue;
        }

        let meta = match resp.json::<ProviderMetadata>().await {
            Ok(meta) => meta,
            Err(e) => {
                last_error = format!("{candidate}: malformed metadata: {e}");
                continue;
            }
        };

        meta.validate()?;
        return Ok(meta);
    }

    Err(GatewayError::Discovery(last_error).into())
}

/// Fetches the provider's JSON Web Key Set.
///
/// # Errors
///
/// Returns [`GatewayError::Discovery`] if the request fails, the endpoint
/// answers with a non-success status, or the body is not a key set.
pub async fn fetch_jwks(http: &reqwest::Client, jwks_uri: &str) -> Result<JwkSet> {
    let resp = http
        .get(jwks_uri)
        .send()
        .await
        .map_err(|e| GatewayError::Discovery(format!("JWKS fetch failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(GatewayError::Discovery(format!(
            "JWKS endpoint returned {}: {}",
            resp.status(),
            jwks_uri
        ))
        .into());
    }

    let jwks: JwkSet = resp
        .json()
        .await
        .map_err(|e| GatewayError::Discovery(format!("failed to parse JWKS: {e}")))?;

    Ok(jwks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata_json() -> serde_json::Value {
        serde_json::json!({
            "issuer": "https://idp.example.com/pool",
            "authorization_endpoint": "https://auth.example.com/oauth2/authorize",
            "token_endpoint": "https://auth.example.com/oauth2/token",
            "userinfo_endpoint": "https://auth.example.com/oauth2/userInfo",
            "jwks_uri": "https://idp.example.com/pool/.well-known/jwks.json",
            "response_types_supported": ["code", "token"],
            "token_endpoint_auth_methods_supported": ["client_secret_basic", "client_secret_post"],
            "subject_types_supported": ["public"]
        })
    }

    #[test]
    fn test_candidate_urls_for_issuer_with_path() {
        let url = Url::parse("https://idp.example.com/eu-west-1_abc").unwrap();
        let candidates = candidate_urls(&url);
        assert_eq!(candidates.len(), 2);
        assert_eq!(
            candidates[0].as_str(),
            "https://idp.example.com/eu-west-1_abc/.well-known/openid-configuration"
        );
        assert_eq!(
            candidates[1].as_str(),
            "https://idp.example.com/.well-known/oauth-authorization-server/eu-west-1_abc"
        );
    }

    #[test]
    fn test_candidate_urls_for_root_issuer_with_trailing_slash() {
        let url = Url::parse("https://idp.example.com/").unwrap();
        let candidates = candidate_urls(&url);
        assert_eq!(
            candidates[0].as_str(),
            "https://idp.example.com/.well-known/openid-configuration"
        );
        assert_eq!(
            candidates[1].as_str(),
            "https://idp.example.com/.well-known/oauth-authorization-server"
        );
    }

    #[test]
    fn test_candidate_urls_uses_well_known_url_as_is() {
        let url =
            Url::parse("https://idp.example.com/pool/.well-known/openid-configuration").unwrap();
        let candidates = candidate_urls(&url);
        assert_eq!(candidates, vec![url]);
    }

    #[test]
    fn test_metadata_deserializes_and_captures_extra_fields() {
        let meta: ProviderMetadata = serde_json::from_value(metadata_json()).unwrap();
        assert_eq!(meta.issuer, "https://idp.example.com/pool");
        assert!(meta.end_session_endpoint.is_none());
        assert!(meta.extra.contains_key("subject_types_supported"));
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn test_metadata_missing_jwks_uri_fails_to_parse() {
        let mut json = metadata_json();
        json.as_object_mut().unwrap().remove("jwks_uri");
        assert!(serde_json::from_value::<ProviderMetadata>(json).is_err());
    }

    #[test]
    fn test_validate_rejects_provider_without_code_flow() {
        let mut meta: ProviderMetadata = serde_json::from_value(metadata_json()).unwrap();
        meta.response_types_supported = vec!["token".to_string()];
        assert!(meta.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_endpoint() {
        let mut meta: ProviderMetadata = serde_json::from_value(metadata_json()).unwrap();
        meta.token_endpoint = "/oauth2/token".to_string();
        let err = meta.validate().unwrap_err();
        assert!(err.to_string().contains("token_endpoint"));
    }

    #[test]
    fn test_supports_client_secret_basic() {
        let mut meta: ProviderMetadata = serde_json::from_value(metadata_json()).unwrap();
        assert!(meta.supports_client_secret_basic());

        meta.token_endpoint_auth_methods_supported = Some(vec!["client_secret_post".to_string()]);
        assert!(!meta.supports_client_secret_basic());

        meta.token_endpoint_auth_methods_supported = None;
        assert!(meta.supports_client_secret_basic());
    }

    // Wiremock integration tests are in tests/oidc_discovery_test.rs
}
