//! Background provider discovery
//!
//! The server starts answering before the provider is known. Discovery runs
//! in its own task, retries a bounded number of times and, on success,
//! installs the client into [`AppState`]. If every attempt fails the gateway
//! keeps running without a client and client-dependent routes answer 503.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::ProviderConfig;
use crate::error::Result;
use crate::oidc::OidcClient;
use crate::server::state::AppState;

/// Runs discovery up to `config.discovery_attempts` times.
///
/// # Errors
///
/// Returns the error of the last attempt.
pub async fn discover_with_retry(config: &ProviderConfig) -> Result<OidcClient> {
    let attempts = config.discovery_attempts.max(1);
    let delay = Duration::from_millis(config.discovery_retry_delay_ms);
    let mut attempt = 1;

    loop {
        match OidcClient::discover(config).await {
            Ok(client) => return Ok(client),
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    attempt,
                    attempts,
                    "Provider discovery failed, retrying in {:?}: {:#}",
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Spawns the discovery task for `state`.
pub fn spawn_discovery(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let config = &state.config.provider;
        tracing::info!(url = %config.discovery_url, "Starting provider discovery");

        match discover_with_retry(config).await {
            Ok(client) => {
                if let Err(e) = state.set_client(client) {
                    tracing::warn!("{:#}", e);
                } else {
                    tracing::info!("OIDC client ready");
                }
            }
            Err(e) => {
                tracing::error!(
                    "Provider discovery failed, login is unavailable: {:#}",
                    e
                );
            }
        }
    })
}
