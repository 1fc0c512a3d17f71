//! OIDC gateway - OpenID Connect login in front of a web page
//!
//! Main entry point for the gateway binary.

use anyhow::Result;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use oidc_gateway::cli::{Cli, Commands};
use oidc_gateway::commands;
use oidc_gateway::config::{Config, LoggingConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Initialize tracing
    init_tracing(&config.logging)?;
    tracing::debug!("Loaded configuration from {}", config_path);

    // Execute command
    match cli.command() {
        Commands::Serve => {
            tracing::info!("Starting gateway");
            commands::serve(config).await?;
        }
        Commands::CheckConfig => {
            let summary = commands::check_config(&config)?;
            println!("{summary}");
        }
        Commands::Discover => {
            let metadata = commands::discover(&config).await?;
            println!("{metadata}");
        }
    }

    Ok(())
}

/// Initialize tracing subscriber from the logging configuration
///
/// `RUST_LOG` wins over `logging.level` when set.
fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.json {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }

    Ok(())
}
