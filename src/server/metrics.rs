//! Login flow counters
//!
//! Counters are emitted through the `metrics` facade and cost nothing
//! unless a recorder is installed. With the `prometheus` feature,
//! [`init_metrics_exporter`] serves them on `server.metrics_port`.

use metrics::increment_counter;

use crate::error::GatewayError;

/// Counts a `/login` redirect.
pub fn record_login_started() {
    increment_counter!("gateway_logins_started_total");
}

/// Counts a callback by outcome.
pub fn record_callback(outcome: &'static str) {
    increment_counter!("gateway_callbacks_total", "outcome" => outcome);
}

/// Counts a `/logout`.
pub fn record_logout() {
    increment_counter!("gateway_logouts_total");
}

/// Label describing why a callback failed.
pub fn failure_outcome(error: &anyhow::Error) -> &'static str {
    match error.downcast_ref::<GatewayError>() {
        Some(GatewayError::MissingState) => "missing_state",
        Some(GatewayError::StateMismatch) => "state_mismatch",
        Some(GatewayError::MissingNonce | GatewayError::NonceMismatch) => "nonce_mismatch",
        Some(GatewayError::IdToken(_)) => "invalid_id_token",
        Some(GatewayError::Provider { .. }) => "provider_error",
        Some(GatewayError::MissingCode) => "missing_code",
        Some(GatewayError::TokenEndpoint(_)) => "token_error",
        Some(GatewayError::UserInfo(_)) => "userinfo_error",
        Some(GatewayError::Session(_)) => "session_error",
        _ => "error",
    }
}

/// Installs the Prometheus exporter on `port`.
///
/// Does nothing when `port` is `None` or the `prometheus` feature is off.
pub fn init_metrics_exporter(port: Option<u16>) {
    #[cfg(feature = "prometheus")]
    {
        use metrics_exporter_prometheus::PrometheusBuilder;
        if let Some(port) = port {
            let builder = PrometheusBuilder::new().with_http_listener(([0, 0, 0, 0], port));
            match builder.install() {
                Ok(()) => tracing::info!(port, "Prometheus exporter listening"),
                Err(e) => tracing::warn!("Failed to install Prometheus exporter: {}", e),
            }
        }
    }

    #[cfg(not(feature = "prometheus"))]
    {
        if port.is_some() {
            tracing::warn!("server.metrics_port is set but the prometheus feature is disabled");
        }
    }
}
