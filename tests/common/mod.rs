//! Shared helpers for integration tests
//!
//! [`MockIdp`] runs a wiremock server that plays the identity provider:
//! discovery document, JWKS, token and userinfo endpoints. ID tokens are
//! signed with the RSA key in `tests/fixtures/`.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, Response};
use axum::Router;
use axum_extra::extract::cookie::{Key, SignedCookieJar};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use oidc_gateway::config::Config;
use oidc_gateway::server::{router, AppState};
use oidc_gateway::session::{MemorySessionStore, SessionId, SessionRecord, SessionStore};
use oidc_gateway::OidcClient;

pub const CLIENT_ID: &str = "gateway-client";
pub const CLIENT_SECRET: &str = "gateway-client-secret";
pub const SESSION_SECRET: &str = "integration-test-session-secret-0123456789";
pub const ACCESS_TOKEN: &str = "access-token-1";
pub const SUBJECT: &str = "user-123";
pub const EMAIL: &str = "user@example.com";
pub const REDIRECT_URI: &str = "http://localhost:3000/auth/callback";

const SIGNING_KEY: &str = include_str!("../fixtures/idp_signing_key.pem");
const JWKS: &str = include_str!("../fixtures/idp_jwks.json");
const KEY_ID: &str = "test-key-1";

// ---------------------------------------------------------------------------
// Mock identity provider
// ---------------------------------------------------------------------------

/// Wiremock server standing in for the identity provider.
pub struct MockIdp {
    pub server: MockServer,
}

impl MockIdp {
    /// Starts a provider serving discovery and JWKS.
    pub async fn start() -> Self {
        let idp = Self::start_bare().await;
        idp.mount_discovery().await;
        idp.mount_jwks().await;
        idp
    }

    /// Starts a provider with no endpoints mounted.
    pub async fn start_bare() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Issuer identifier, equal to the server base URL.
    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    /// Discovery document advertising this server's endpoints.
    pub fn metadata(&self) -> Value {
        let base = self.issuer();
        json!({
            "issuer": base,
            "authorization_endpoint": format!("{base}/authorize"),
            "token_endpoint": format!("{base}/token"),
            "userinfo_endpoint": format!("{base}/userinfo"),
            "jwks_uri": format!("{base}/jwks"),
            "end_session_endpoint": format!("{base}/logout"),
            "response_types_supported": ["code"],
            "id_token_signing_alg_values_supported": ["RS256"]
        })
    }

    pub async fn mount_discovery(&self) {
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(self.metadata()))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_jwks(&self) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks()))
            .mount(&self.server)
            .await;
    }

    /// Token endpoint returning an ID token bound to `nonce`.
    pub async fn mount_token(&self, nonce: &str) {
        let body = token_response(&self.id_token(nonce));
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Userinfo endpoint answering for [`ACCESS_TOKEN`].
    pub async fn mount_userinfo(&self) {
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header_matcher(
                "authorization",
                format!("Bearer {ACCESS_TOKEN}").as_str(),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(userinfo_claims()))
            .mount(&self.server)
            .await;
    }

    /// ID token for [`SUBJECT`] issued by this server.
    pub fn id_token(&self, nonce: &str) -> String {
        sign(&id_token_claims(&self.issuer(), nonce))
    }
}

pub fn jwks() -> Value {
    serde_json::from_str(JWKS).expect("fixture JWKS is valid JSON")
}

pub fn id_token_claims(issuer: &str, nonce: &str) -> Value {
    let now = chrono::Utc::now().timestamp();
    json!({
        "iss": issuer,
        "sub": SUBJECT,
        "aud": CLIENT_ID,
        "exp": now + 300,
        "iat": now,
        "nonce": nonce,
        "email": EMAIL
    })
}

/// Signs `claims` with the fixture key.
pub fn sign(claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KEY_ID.to_string());
    let key = EncodingKey::from_rsa_pem(SIGNING_KEY.as_bytes()).expect("fixture key parses");
    encode(&header, claims, &key).expect("token signs")
}

pub fn token_response(id_token: &str) -> Value {
    json!({
        "access_token": ACCESS_TOKEN,
        "token_type": "Bearer",
        "expires_in": 3600,
        "id_token": id_token
    })
}

pub fn userinfo_claims() -> Value {
    json!({
        "sub": SUBJECT,
        "email": EMAIL,
        "email_verified": true,
        "phone_number": "+15555550100"
    })
}

// ---------------------------------------------------------------------------
// Gateway setup
// ---------------------------------------------------------------------------

/// Valid configuration pointing at `issuer`.
pub fn gateway_config(issuer: &str) -> Config {
    let mut config = Config::default();
    config.provider.discovery_url = issuer.to_string();
    config.provider.client_id = CLIENT_ID.to_string();
    config.provider.client_secret = Some(CLIENT_SECRET.to_string());
    config.provider.redirect_uri = REDIRECT_URI.to_string();
    config.provider.timeout_seconds = 5;
    config.provider.discovery_attempts = 1;
    config.provider.discovery_retry_delay_ms = 10;
    config.session.secret = SESSION_SECRET.to_string();
    config
}

/// A gateway under test with direct access to its session store.
pub struct TestGateway {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemorySessionStore>,
}

impl TestGateway {
    /// Gateway whose OIDC client has not been discovered.
    pub fn not_ready(config: Config) -> Self {
        let store = Arc::new(MemorySessionStore::new(Duration::from_secs(600)));
        let state = AppState::new(config, store.clone()).expect("state builds");
        Self {
            app: router(state.clone()),
            state,
            store,
        }
    }

    /// Gateway with a client discovered from `idp`.
    pub async fn ready(idp: &MockIdp) -> Self {
        Self::ready_with(gateway_config(&idp.issuer())).await
    }

    /// Gateway with a client discovered using `config`.
    pub async fn ready_with(config: Config) -> Self {
        let client = OidcClient::discover(&config.provider)
            .await
            .expect("discovery against mock provider succeeds");
        let gateway = Self::not_ready(config);
        gateway.state.set_client(client).expect("client installs once");
        gateway
    }

    /// Sends a GET request for `uri`, with `cookie` if given.
    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = builder.body(Body::empty()).expect("request builds");
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Runs `/login` and returns the browser's view of it.
    pub async fn login(&self, cookie: Option<&str>) -> LoginRedirect {
        let resp = self.get("/login", cookie).await;
        assert_eq!(resp.status(), 302, "login must redirect");

        let location = location(&resp);
        let url = Url::parse(&location).expect("authorization URL is absolute");
        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
                .unwrap_or_else(|| panic!("authorization URL has no {name}"))
        };

        LoginRedirect {
            state: param("state"),
            nonce: param("nonce"),
            cookie: session_cookie(resp.headers()).or_else(|| cookie.map(str::to_string)),
            url,
        }
    }

    /// Session id behind a `name=value` cookie pair.
    pub fn session_id(&self, cookie: &str) -> SessionId {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, cookie.parse().expect("cookie header"));
        let jar = SignedCookieJar::from_headers(&headers, Key::derive_from(SESSION_SECRET.as_bytes()));
        let value = jar
            .get(&self.state.config.session.cookie_name)
            .expect("cookie signature verifies")
            .value()
            .to_string();
        SessionId::from(value)
    }

    /// Stored record for the session behind `cookie`.
    pub async fn record(&self, cookie: &str) -> Option<SessionRecord> {
        self.store
            .get(&self.session_id(cookie))
            .await
            .expect("memory store never fails")
    }
}

/// What the browser sees after `/login`.
pub struct LoginRedirect {
    pub url: Url,
    pub state: String,
    pub nonce: String,
    pub cookie: Option<String>,
}

impl LoginRedirect {
    pub fn cookie(&self) -> &str {
        self.cookie.as_deref().expect("login sets a session cookie")
    }
}

pub fn location(resp: &Response<Body>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .expect("response has Location")
        .to_str()
        .expect("Location is ASCII")
        .to_string()
}

/// `name=value` part of the first `Set-Cookie` header.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|pair| pair.trim().to_string())
}

pub async fn body_text(resp: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body reads");
    String::from_utf8(bytes.to_vec()).expect("body is UTF-8")
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
