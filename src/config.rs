//! Configuration management for the OIDC gateway
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Paths the gateway always registers; the callback may not reuse them.
const RESERVED_PATHS: [&str; 4] = ["/", "/login", "/logout", "/healthz"];

/// Placeholder written over secrets by [`Config::redacted`].
const REDACTED: &str = "********";

/// Minimum length of the cookie signing secret in bytes.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

/// Main configuration structure for the gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Listener settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Identity provider and client registration
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Session cookie and store settings
    #[serde(default)]
    pub session: SessionConfig,
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Port for the Prometheus exporter (only with the `prometheus` feature)
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            metrics_port: None,
        }
    }
}

/// Identity provider configuration
///
/// Holds the discovery URL and the client registration the provider
/// issued for this gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Issuer URL or full `.well-known/openid-configuration` URL
    #[serde(default)]
    pub discovery_url: String,

    /// Registered client identifier
    #[serde(default)]
    pub client_id: String,

    /// Registered client secret; `None` for public clients
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Redirect URI registered with the provider
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Path the callback route is served on; must match `redirect_uri`
    #[serde(default = "default_callback_path")]
    pub callback_path: String,

    /// Scopes requested at login
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Where `/logout` sends the browser after the session is destroyed
    #[serde(default)]
    pub logout_url: Option<String>,

    /// Timeout applied to every outbound call to the provider (seconds)
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,

    /// How many times startup discovery is attempted before giving up
    #[serde(default = "default_discovery_attempts")]
    pub discovery_attempts: u32,

    /// Delay between discovery attempts (milliseconds)
    #[serde(default = "default_discovery_retry_delay_ms")]
    pub discovery_retry_delay_ms: u64,
}

fn default_redirect_uri() -> String {
    "http://localhost:3000/auth/callback".to_string()
}

fn default_callback_path() -> String {
    "/auth/callback".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["email".to_string(), "openid".to_string(), "phone".to_string()]
}

fn default_provider_timeout() -> u64 {
    10
}

fn default_discovery_attempts() -> u32 {
    3
}

fn default_discovery_retry_delay_ms() -> u64 {
    2000
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            discovery_url: String::new(),
            client_id: String::new(),
            client_secret: None,
            redirect_uri: default_redirect_uri(),
            callback_path: default_callback_path(),
            scopes: default_scopes(),
            logout_url: None,
            timeout_seconds: default_provider_timeout(),
            discovery_attempts: default_discovery_attempts(),
            discovery_retry_delay_ms: default_discovery_retry_delay_ms(),
        }
    }
}

impl ProviderConfig {
    /// Validates `callback_path` and returns it as a route path.
    ///
    /// The path must be absolute, free of query, fragment and route
    /// wildcards, must not collide with the gateway's fixed routes, and
    /// must equal the path component of `redirect_uri`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] describing the first problem found.
    ///
    /// # Examples
    ///
    /// ```
    /// use oidc_gateway::config::ProviderConfig;
    ///
    /// let provider = ProviderConfig::default();
    /// assert_eq!(provider.callback_route().unwrap(), "/auth/callback");
    /// ```
    pub fn callback_route(&self) -> Result<String> {
        let path = self.callback_path.trim();

        if !path.starts_with('/') {
            return Err(GatewayError::Config(format!(
                "callback_path must start with '/': {path:?}"
            ))
            .into());
        }

        if path.contains(['?', '#', ':', '*']) {
            return Err(GatewayError::Config(format!(
                "callback_path must be a plain path: {path:?}"
            ))
            .into());
        }

        if RESERVED_PATHS.contains(&path) {
            return Err(GatewayError::Config(format!(
                "callback_path {path:?} collides with a built-in route"
            ))
            .into());
        }

        let redirect = Url::parse(&self.redirect_uri).map_err(|e| {
            GatewayError::Config(format!("invalid redirect_uri {:?}: {e}", self.redirect_uri))
        })?;

        if redirect.path() != path {
            return Err(GatewayError::Config(format!(
                "callback_path {path:?} does not match redirect_uri path {:?}",
                redirect.path()
            ))
            .into());
        }

        Ok(path.to_string())
    }
}

/// Session cookie and store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Secret the session cookie is signed with (at least 32 bytes)
    #[serde(default)]
    pub secret: String,

    /// Name of the session cookie
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Idle lifetime of a session record (seconds)
    #[serde(default = "default_session_ttl")]
    pub ttl_seconds: u64,

    /// Idle lifetime of a record that only holds a login attempt (seconds)
    #[serde(default = "default_login_ttl")]
    pub login_ttl_seconds: u64,

    /// Emit the cookie with the `Secure` attribute
    #[serde(default)]
    pub secure_cookie: bool,
}

fn default_cookie_name() -> String {
    "gateway.sid".to_string()
}

fn default_session_ttl() -> u64 {
    86_400
}

fn default_login_ttl() -> u64 {
    600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            cookie_name: default_cookie_name(),
            ttl_seconds: default_session_ttl(),
            login_ttl_seconds: default_login_ttl(),
            secure_cookie: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "oidc_gateway=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| GatewayError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(url) = std::env::var("GATEWAY_DISCOVERY_URL") {
            self.provider.discovery_url = url;
        }

        if let Ok(client_id) = std::env::var("GATEWAY_CLIENT_ID") {
            self.provider.client_id = client_id;
        }

        if let Ok(secret) = std::env::var("GATEWAY_CLIENT_SECRET") {
            self.provider.client_secret = Some(secret);
        }

        if let Ok(redirect_uri) = std::env::var("GATEWAY_REDIRECT_URI") {
            self.provider.redirect_uri = redirect_uri;
        }

        if let Ok(callback_path) = std::env::var("GATEWAY_CALLBACK_PATH") {
            self.provider.callback_path = callback_path;
        }

        if let Ok(logout_url) = std::env::var("GATEWAY_LOGOUT_URL") {
            self.provider.logout_url = Some(logout_url);
        }

        if let Ok(timeout) = std::env::var("GATEWAY_PROVIDER_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.provider.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid GATEWAY_PROVIDER_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(secret) = std::env::var("GATEWAY_SESSION_SECRET") {
            self.session.secret = secret;
        }

        if let Ok(bind) = std::env::var("GATEWAY_BIND") {
            self.server.bind = bind;
        }

        if let Ok(port) = std::env::var("GATEWAY_PORT") {
            if let Ok(value) = port.parse() {
                self.server.port = value;
            } else {
                tracing::warn!("Invalid GATEWAY_PORT: {}", port);
            }
        }

        if let Ok(level) = std::env::var("GATEWAY_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(json) = std::env::var("GATEWAY_JSON_LOGS") {
            match json.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.logging.json = true,
                "0" | "false" | "no" => self.logging.json = false,
                _ => tracing::warn!("Invalid GATEWAY_JSON_LOGS: {}", json),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(port) = cli.port {
            self.server.port = port;
        }

        if cli.verbose {
            self.logging.level = "oidc_gateway=debug".to_string();
        }
    }

    /// Validate the configuration
    ///
    /// The callback path is checked separately by
    /// [`ProviderConfig::callback_route`] so that a bad path only disables
    /// the callback route instead of the whole gateway.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.provider.discovery_url.trim().is_empty() {
            return Err(
                GatewayError::Config("provider.discovery_url cannot be empty".to_string()).into(),
            );
        }

        Url::parse(&self.provider.discovery_url).map_err(|e| {
            GatewayError::Config(format!("provider.discovery_url is not a valid URL: {e}"))
        })?;

        if self.provider.client_id.trim().is_empty() {
            return Err(
                GatewayError::Config("provider.client_id cannot be empty".to_string()).into(),
            );
        }

        Url::parse(&self.provider.redirect_uri).map_err(|e| {
            GatewayError::Config(format!("provider.redirect_uri is not a valid URL: {e}"))
        })?;

        if !self.provider.scopes.iter().any(|s| s == "openid") {
            return Err(
                GatewayError::Config("provider.scopes must include 'openid'".to_string()).into(),
            );
        }

        if let Some(logout_url) = &self.provider.logout_url {
            Url::parse(logout_url).map_err(|e| {
                GatewayError::Config(format!("provider.logout_url is not a valid URL: {e}"))
            })?;
        }

        if self.provider.timeout_seconds == 0 {
            return Err(GatewayError::Config(
                "provider.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.provider.discovery_attempts == 0 {
            return Err(GatewayError::Config(
                "provider.discovery_attempts must be greater than 0".to_string(),
            )
            .into());
        }

        if self.session.secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(GatewayError::Config(format!(
                "session.secret must be at least {MIN_SESSION_SECRET_LEN} bytes"
            ))
            .into());
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(
                GatewayError::Config("session.cookie_name cannot be empty".to_string()).into(),
            );
        }

        if self.session.ttl_seconds == 0 {
            return Err(GatewayError::Config(
                "session.ttl_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.session.login_ttl_seconds == 0 {
            return Err(GatewayError::Config(
                "session.login_ttl_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.server.port == 0 {
            return Err(
                GatewayError::Config("server.port must be greater than 0".to_string()).into(),
            );
        }

        Ok(())
    }

    /// Returns a copy with every secret replaced by a placeholder.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.provider.client_secret.is_some() {
            copy.provider.client_secret = Some(REDACTED.to_string());
        }
        if !copy.session.secret.is_empty() {
            copy.session.secret = REDACTED.to_string();
        }
        copy
    }
}
