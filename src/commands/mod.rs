/*!
Command handlers for the CLI

This module provides the handlers invoked by the CLI entrypoint:

- `serve`        -- Run the gateway (see [`crate::server::serve`])
- `check_config` -- Validate configuration and print a redacted copy
- `discover`     -- Fetch and print the provider metadata
*/

use std::time::Duration;

use url::Url;

use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::oidc::client::build_http_client;
use crate::oidc::discovery::fetch_provider_metadata;

/// Validate `config` and start the server
///
/// # Errors
///
/// Returns error if validation fails or the server cannot start
pub async fn serve(config: Config) -> Result<()> {
    config.validate()?;
    crate::server::serve(config).await
}

/// Validate configuration and render it with secrets redacted
///
/// A bad callback path does not fail the check because the gateway still
/// starts in that case; it is reported as a warning line instead.
///
/// # Errors
///
/// Returns error if validation fails or the configuration cannot be
/// serialized
pub fn check_config(config: &Config) -> Result<String> {
    config.validate()?;

    let mut out = serde_yaml::to_string(&config.redacted())?;
    if let Err(e) = config.provider.callback_route() {
        out.push_str(&format!("# warning: callback route disabled: {e}\n"));
    }
    Ok(out)
}

/// Fetch the provider metadata document as pretty JSON
///
/// Only `provider.discovery_url` and `provider.timeout_seconds` are used,
/// so this works before a client is registered.
///
/// # Errors
///
/// Returns error if the discovery URL is invalid or discovery fails
pub async fn discover(config: &Config) -> Result<String> {
    let url = Url::parse(&config.provider.discovery_url).map_err(|e| {
        GatewayError::Config(format!(
            "provider.discovery_url is not a valid URL: {e}"
        ))
    })?;

    let http = build_http_client(Duration::from_secs(config.provider.timeout_seconds.max(1)))?;
    let metadata = fetch_provider_metadata(&http, &url).await?;
    Ok(serde_json::to_string_pretty(&metadata)?)
}
