//! Command-line interface definition for the OIDC gateway
//!
//! This module defines the CLI structure using clap's derive API.
//! Running without a subcommand is the same as `serve`.

use clap::{Parser, Subcommand};

/// OIDC gateway - OpenID Connect login in front of a web page
///
/// Redirects visitors to an identity provider, completes the authorization
/// code flow and keeps the resulting user info in a server-side session.
#[derive(Parser, Debug, Clone)]
#[command(name = "oidc-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the listening port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the gateway HTTP server
    Serve,

    /// Load and validate the configuration, then print it with secrets redacted
    CheckConfig,

    /// Fetch the provider's discovery document and print it as JSON
    Discover,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The subcommand to run, defaulting to [`Commands::Serve`].
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}
