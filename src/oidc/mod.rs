//! OpenID Connect relying-party support
//!
//! Everything the gateway needs to talk to the identity provider.
//!
//! # Module Layout
//!
//! - [`discovery`]  -- provider metadata and JWKS retrieval
//! - [`client`]     -- authorization URL, code exchange and userinfo
//! - [`id_token`]   -- ID token signature and claim validation
//! - [`generators`] -- random nonce, state and session identifiers
//! - [`types`]      -- login attempt, callback parameters and token set

pub mod client;
pub mod discovery;
pub mod generators;
pub mod id_token;
pub mod types;

pub use client::OidcClient;
pub use discovery::ProviderMetadata;
pub use types::{CallbackParams, LoginAttempt, TokenSet, UserInfo};
