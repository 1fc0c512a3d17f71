//! OpenID Connect relying-party client for the authorization code flow
//!
//! An [`OidcClient`] is built once from discovered provider metadata and
//! reused for every login. It never stores per-login state; the nonce and
//! state of an attempt live in the caller's session and are handed back in
//! as a [`LoginAttempt`].
//!
//! # Flow overview
//!
//! 1. [`OidcClient::authorization_url`] builds the redirect for `/login`.
//! 2. [`OidcClient::callback`] checks the echoed `state`, exchanges the code
//!    at the token endpoint and verifies the ID token and its `nonce`.
//! 3. [`OidcClient::userinfo`] fetches the profile claims with the access
//!    token.

use std::collections::HashMap;
use std::time::Duration;

use jsonwebtoken::jwk::JwkSet;
use url::Url;

use crate::config::ProviderConfig;
use crate::error::{GatewayError, Result};
use crate::oidc::discovery::{fetch_jwks, fetch_provider_metadata, ProviderMetadata};
use crate::oidc::id_token::IdTokenVerifier;
use crate::oidc::types::{CallbackParams, LoginAttempt, TokenSet, UserInfo};

/// Raw JSON response from the token endpoint.
#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    #[serde(default)]
    id_token: Option<String>,
}

/// Builds the HTTP client used for every call to the provider.
///
/// # Errors
///
/// Returns [`GatewayError::Config`] if the TLS backend cannot be set up.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {e}")).into())
}

/// Relying-party client bound to one provider and one client registration.
pub struct OidcClient {
    http: reqwest::Client,
    metadata: ProviderMetadata,
    verifier: IdTokenVerifier,
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
    scopes: Vec<String>,
}

impl std::fmt::Debug for OidcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcClient")
            .field("issuer", &self.metadata.issuer)
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .finish_non_exhaustive()
    }
}

impl OidcClient {
    /// Runs discovery for `config` and builds a ready client.
    ///
    /// Fetches the metadata document and the JWKS using an HTTP client
    /// whose timeout is `config.timeout_seconds`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Discovery`] if the metadata or key set
    /// cannot be obtained, or [`GatewayError::Config`] if the discovery URL
    /// is malformed.
    pub async fn discover(config: &ProviderConfig) -> Result<Self> {
        let http = build_http_client(Duration::from_secs(config.timeout_seconds))?;
        let discovery_url = Url::parse(&config.discovery_url).map_err(|e| {
            GatewayError::Config(format!("invalid discovery URL {}: {e}", config.discovery_url))
        })?;

        let metadata = fetch_provider_metadata(&http, &discovery_url).await?;
        let jwks = fetch_jwks(&http, &metadata.jwks_uri).await?;

        tracing::info!(
            issuer = %metadata.issuer,
            keys = jwks.keys.len(),
            "Discovered OIDC provider"
        );

        Ok(Self::from_parts(http, metadata, jwks, config))
    }

    /// Builds a client from metadata and keys that were obtained elsewhere.
    pub fn from_parts(
        http: reqwest::Client,
        metadata: ProviderMetadata,
        jwks: JwkSet,
        config: &ProviderConfig,
    ) -> Self {
        let verifier = IdTokenVerifier::new(
            http.clone(),
            metadata.issuer.clone(),
            config.client_id.clone(),
            metadata.jwks_uri.clone(),
            jwks,
        );

        Self {
            http,
            metadata,
            verifier,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
        }
    }

    /// Provider metadata this client was built from.
    pub fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    /// Builds the authorization request URL for `attempt`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Discovery`] if the authorization endpoint is
    /// not a valid URL.
    pub fn authorization_url(&self, attempt: &LoginAttempt) -> Result<Url> {
        let mut url = Url::parse(&self.metadata.authorization_endpoint).map_err(|e| {
            GatewayError::Discovery(format!("invalid authorization endpoint URL: {e}"))
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.client_id);
            query.append_pair("response_type", "code");
            query.append_pair("redirect_uri", &self.redirect_uri);
            query.append_pair("scope", &self.scopes.join(" "));
            query.append_pair("state", &attempt.state);
            query.append_pair("nonce", &attempt.nonce);
        }

        Ok(url)
    }

    /// Completes the authorization code flow for `attempt`.
    ///
    /// Order of checks: provider `error` parameter, `state` echo, presence
    /// of `code`, token exchange, ID token verification including `nonce`.
    ///
    /// # Errors
    ///
    /// Returns the [`GatewayError`] for the first failing step.
    pub async fn callback(
        &self,
        params: &CallbackParams,
        attempt: &LoginAttempt,
    ) -> Result<TokenSet> {
        if let Some(error) = &params.error {
            return Err(GatewayError::Provider {
                error: error.clone(),
                description: params.error_description.clone(),
            }
            .into());
        }

        if params.state.as_deref() != Some(attempt.state.as_str()) {
            return Err(GatewayError::StateMismatch.into());
        }

        let code = params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(GatewayError::MissingCode)?;

        let raw = self.exchange_code(code).await?;
        let id_token = raw.id_token.as_deref().ok_or_else(|| {
            GatewayError::TokenEndpoint("token response has no id_token".to_string())
        })?;

        let claims = self.verifier.verify(id_token, &attempt.nonce).await?;

        Ok(TokenSet {
            access_token: raw.access_token,
            claims,
        })
    }

    /// Fetches profile claims for the subject of `tokens`.
    ///
    /// The `sub` claim of the response must equal the ID token subject.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UserInfo`] if the provider has no userinfo
    /// endpoint, the request fails, or the response is not a JSON object for
    /// the same subject.
    pub async fn userinfo(&self, tokens: &TokenSet) -> Result<UserInfo> {
        let endpoint = self.metadata.userinfo_endpoint.as_deref().ok_or_else(|| {
            GatewayError::UserInfo("provider does not advertise a userinfo endpoint".to_string())
        })?;

        let resp = self
            .http
            .get(endpoint)
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .map_err(|e| GatewayError::UserInfo(format!("userinfo request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(
                GatewayError::UserInfo(format!("userinfo endpoint returned {status}: {body}"))
                    .into(),
            );
        }

        let info: UserInfo = resp
            .json()
            .await
            .map_err(|e| GatewayError::UserInfo(format!("failed to parse userinfo: {e}")))?;

        match info.get("sub").and_then(|v| v.as_str()) {
            Some(sub) if sub == tokens.claims.sub => Ok(info),
            Some(_) => Err(GatewayError::UserInfo(
                "userinfo subject does not match ID token subject".to_string(),
            )
            .into()),
            None => Err(GatewayError::UserInfo("userinfo has no sub claim".to_string()).into()),
        }
    }

    /// URL `/logout` should redirect to when none is configured.
    pub fn end_session_url(&self) -> Option<&str> {
        self.metadata.end_session_endpoint.as_deref()
    }

    /// Exchanges an authorization code for tokens at the token endpoint.
    ///
    /// Confidential clients authenticate with `client_secret_basic` unless
    /// the provider only advertises `client_secret_post`.
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        let mut params: HashMap<&str, &str> = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", &self.redirect_uri);

        let mut request = self.http.post(&self.metadata.token_endpoint);
        match &self.client_secret {
            Some(secret) if self.metadata.supports_client_secret_basic() => {
                request = request.basic_auth(&self.client_id, Some(secret));
            }
            Some(secret) => {
                params.insert("client_id", &self.client_id);
                params.insert("client_secret", secret);
            }
            None => {
                params.insert("client_id", &self.client_id);
            }
        }

        let resp = request
            .form(&params)
            .send()
            .await
            .map_err(|e| GatewayError::TokenEndpoint(format!("token exchange request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(
                GatewayError::TokenEndpoint(format!("token endpoint returned {status}: {body}"))
                    .into(),
            );
        }

        let raw: TokenResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::TokenEndpoint(format!("failed to parse token response: {e}")))?;

        // The access token is only ever sent as a bearer credential.
        if !raw.token_type.eq_ignore_ascii_case("bearer") {
            return Err(GatewayError::TokenEndpoint(format!(
                "unsupported token_type '{}'",
                raw.token_type
            ))
            .into());
        }

        Ok(raw)
    }
}
