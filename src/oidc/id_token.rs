//! ID token validation with JWT signature verification

use std::collections::HashMap;

use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{GatewayError, Result};
use crate::oidc::discovery::fetch_jwks;

/// Accepted clock skew when checking `exp` and `iat` (seconds).
const CLOCK_LEEWAY_SECS: u64 = 60;

/// `aud` may be a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// One audience.
    Single(String),
    /// Several audiences.
    Multiple(Vec<String>),
}

impl Audience {
    /// Whether more than one party is named.
    pub fn is_multiple(&self) -> bool {
        matches!(self, Audience::Multiple(values) if values.len() > 1)
    }
}

/// Claims of a verified ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer
    pub iss: String,
    /// Subject identifier
    pub sub: String,
    /// Audience
    pub aud: Audience,
    /// Expiry (seconds since epoch)
    pub exp: i64,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Nonce echoed from the authorization request
    #[serde(default)]
    pub nonce: Option<String>,
    /// Authorized party
    #[serde(default)]
    pub azp: Option<String>,
    /// Every other claim
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Verifies ID tokens issued by one provider for one client.
///
/// Holds the provider's key set and refetches it once when a token names a
/// key id the cached set does not contain.
pub struct IdTokenVerifier {
    http: reqwest::Client,
    issuer: String,
    client_id: String,
    jwks_uri: String,
    jwks: RwLock<JwkSet>,
}

impl IdTokenVerifier {
    /// Creates a verifier seeded with an already fetched key set.
    pub fn new(
        http: reqwest::Client,
        issuer: String,
        client_id: String,
        jwks_uri: String,
        jwks: JwkSet,
    ) -> Self {
        Self {
            http,
            issuer,
            client_id,
            jwks_uri,
            jwks: RwLock::new(jwks),
        }
    }

    /// Validates signature, issuer, audience, expiry and the `nonce` claim.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::IdToken`] for malformed tokens, unsupported
    ///   algorithms, unknown keys or failed standard claim checks.
    /// - [`GatewayError::MissingNonce`] / [`GatewayError::NonceMismatch`]
    ///   when the `nonce` claim is absent or differs from `expected_nonce`.
    pub async fn verify(&self, id_token: &str, expected_nonce: &str) -> Result<IdTokenClaims> {
        let header = decode_header(id_token)
            .map_err(|e| GatewayError::IdToken(format!("failed to decode header: {e}")))?;

        if !is_asymmetric(header.alg) {
            return Err(GatewayError::IdToken(format!(
                "unsupported signing algorithm {:?}",
                header.alg
            ))
            .into());
        }

        let key = self.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.client_id]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = CLOCK_LEEWAY_SECS;

        let claims = decode::<IdTokenClaims>(id_token, &key, &validation)
            .map_err(|e| GatewayError::IdToken(format!("JWT validation failed: {e}")))?
            .claims;

        let now = chrono::Utc::now().timestamp();
        if claims.iat > now + CLOCK_LEEWAY_SECS as i64 {
            return Err(GatewayError::IdToken(format!(
                "token issued in the future (iat={}, now={})",
                claims.iat, now
            ))
            .into());
        }

        if claims.aud.is_multiple() && claims.azp.as_deref() != Some(self.client_id.as_str()) {
            return Err(GatewayError::IdToken(
                "token has several audiences but azp is not this client".to_string(),
            )
            .into());
        }

        let token_nonce = claims.nonce.as_deref().ok_or(GatewayError::MissingNonce)?;
        if token_nonce != expected_nonce {
            return Err(GatewayError::NonceMismatch.into());
        }

        Ok(claims)
    }

    async fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey> {
        if let Some(key) = self.lookup(kid).await? {
            return Ok(key);
        }

        // Unknown key id, the provider may have rotated its keys.
        tracing::debug!(kid = ?kid, "Signing key not cached, refetching JWKS");
        let fresh = fetch_jwks(&self.http, &self.jwks_uri).await?;
        *self.jwks.write().await = fresh;

        self.lookup(kid).await?.ok_or_else(|| {
            GatewayError::IdToken(format!("no signing key matches kid {kid:?}")).into()
        })
    }

    async fn lookup(&self, kid: Option<&str>) -> Result<Option<DecodingKey>> {
        let jwks = self.jwks.read().await;
        let jwk: Option<&Jwk> = match kid {
            Some(kid) => jwks.find(kid),
            None if jwks.keys.len() == 1 => jwks.keys.first(),
            None => None,
        };

        match jwk {
            Some(jwk) => {
                let key = DecodingKey::from_jwk(jwk)
                    .map_err(|e| GatewayError::IdToken(format!("unusable JWK: {e}")))?;
                Ok(Some(key))
            }
            None => Ok(None),
        }
    }
}

fn is_asymmetric(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
            | Algorithm::ES256
            | Algorithm::ES384
            | Algorithm::EdDSA
    )
}
