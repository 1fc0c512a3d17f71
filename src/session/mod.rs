//! Server-side sessions
//!
//! A session is an opaque identifier carried in a cookie plus a
//! [`SessionRecord`] held by a [`SessionStore`]. The gateway only talks to
//! the trait, so any key-value backend can stand behind it;
//! [`MemorySessionStore`] is the process-local default.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::oidc::generators;
use crate::oidc::{LoginAttempt, UserInfo};

pub use memory::MemorySessionStore;

/// Opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new random identifier.
    pub fn generate() -> Self {
        Self(generators::random_token())
    }

    /// The identifier as stored in the cookie.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the gateway keeps for one browser.
///
/// `nonce` and `state` only live between `/login` and the callback;
/// `user_info` is set once the callback succeeds and marks the session as
/// authenticated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Nonce of the in-flight login attempt
    #[serde(default)]
    pub nonce: Option<String>,
    /// State of the in-flight login attempt
    #[serde(default)]
    pub state: Option<String>,
    /// Claims of the authenticated user
    #[serde(default)]
    pub user_info: Option<UserInfo>,
}

impl SessionRecord {
    /// Whether the session belongs to a logged-in user.
    pub fn is_authenticated(&self) -> bool {
        self.user_info.is_some()
    }

    /// Records a new login attempt, replacing any previous one.
    pub fn begin_login(&mut self, attempt: &LoginAttempt) {
        self.nonce = Some(attempt.nonce.clone());
        self.state = Some(attempt.state.clone());
    }

    /// Removes the in-flight login attempt and returns it.
    ///
    /// Both fields are cleared even when only one of them was present, in
    /// which case `None` is returned.
    pub fn take_login_attempt(&mut self) -> Option<LoginAttempt> {
        match (self.nonce.take(), self.state.take()) {
            (Some(nonce), Some(state)) => Some(LoginAttempt { nonce, state }),
            _ => None,
        }
    }
}

/// Key-value storage for session records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the record for `id`, or `None` if it does not exist or expired.
    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>>;

    /// Creates or replaces the record for `id`.
    async fn set(&self, id: &SessionId, record: SessionRecord) -> Result<()>;

    /// Deletes the record for `id`. Deleting a missing record is not an error.
    async fn destroy(&self, id: &SessionId) -> Result<()>;
}
