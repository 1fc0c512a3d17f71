//! Process-local session store with idle expiry

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::session::{SessionId, SessionRecord, SessionStore};

#[derive(Debug, Clone)]
struct Entry {
    record: SessionRecord,
    expires_at: DateTime<Utc>,
}

/// In-memory [`SessionStore`].
///
/// Each read or write of a live record pushes its expiry `ttl` into the
/// future. Records that are not authenticated yet use the shorter login
/// TTL. Reads of an expired record behave as if it did not exist and drop
/// it.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use oidc_gateway::session::{MemorySessionStore, SessionId, SessionRecord, SessionStore};
///
/// # async fn example() -> oidc_gateway::error::Result<()> {
/// let store = MemorySessionStore::new(Duration::from_secs(60));
/// let id = SessionId::generate();
/// store.set(&id, SessionRecord::default()).await?;
/// assert!(store.get(&id).await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MemorySessionStore {
    ttl: chrono::Duration,
    login_ttl: chrono::Duration,
    entries: RwLock<HashMap<SessionId, Entry>>,
}

impl MemorySessionStore {
    /// Creates an empty store whose records expire after `ttl` of inactivity.
    pub fn new(ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            ttl,
            login_ttl: ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Sets the idle lifetime of records without user info.
    pub fn with_login_ttl(mut self, login_ttl: Duration) -> Self {
        self.login_ttl = chrono::Duration::from_std(login_ttl).unwrap_or(chrono::Duration::MAX);
        self
    }

    /// Number of records currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drops every expired record and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Runs [`Self::purge_expired`] every `interval` until the task is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.purge_expired().await;
                if removed > 0 {
                    tracing::debug!(removed, "Purged expired sessions");
                }
            }
        })
    }

    fn expiry_from_now(&self, record: &SessionRecord) -> DateTime<Utc> {
        let ttl = if record.is_authenticated() {
            self.ttl
        } else {
            self.login_ttl
        };
        Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(id) {
            None => Ok(None),
            Some(entry) if entry.expires_at > Utc::now() => {
                entry.expires_at = self.expiry_from_now(&entry.record);
                Ok(Some(entry.record.clone()))
            }
            Some(_) => {
                entries.remove(id);
                Ok(None)
            }
        }
    }

    async fn set(&self, id: &SessionId, record: SessionRecord) -> Result<()> {
        let entry = Entry {
            expires_at: self.expiry_from_now(&record),
            record,
        };
        self.entries.write().await.insert(id.clone(), entry);
        Ok(())
    }

    async fn destroy(&self, id: &SessionId) -> Result<()> {
        self.entries.write().await.remove(id);
        Ok(())
    }
}
