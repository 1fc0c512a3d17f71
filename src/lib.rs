//! OIDC gateway - OpenID Connect login in front of a web page
//!
//! This library provides the pieces of a small login gateway that runs the
//! authorization code flow against a hosted identity provider and keeps the
//! resulting user info in a server-side session.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `oidc`: Provider discovery, authorization URL, code exchange, ID token
//!   verification and userinfo
//! - `session`: Session records and the `SessionStore` trait
//! - `server`: axum router, handlers, middleware and views
//! - `commands`: Handlers for the CLI subcommands
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use oidc_gateway::server::{provider, router, AppState};
//! use oidc_gateway::session::MemorySessionStore;
//! use oidc_gateway::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cli = oidc_gateway::cli::Cli::parse_args();
//!     let config = Config::load("config/config.yaml", &cli)?;
//!     config.validate()?;
//!
//!     let store = Arc::new(MemorySessionStore::new(Duration::from_secs(3600)));
//!     let state = AppState::new(config, store)?;
//!     provider::spawn_discovery(state.clone());
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, router(state)).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod oidc;
pub mod server;
pub mod session;

// Re-export commonly used types
pub use config::Config;
pub use error::{GatewayError, Result};
pub use oidc::OidcClient;
pub use server::{router, AppState};
pub use session::{MemorySessionStore, SessionStore};
