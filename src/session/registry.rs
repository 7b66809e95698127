//! In-memory registry of live sessions.

use crate::session::{DocumentSession, SessionServices};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

/// Sessions untouched for this long are ended unless configured otherwise.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(60 * 60);

/// Handle to a single session. The mutex serializes turns within that session.
pub type SessionHandle = Arc<Mutex<DocumentSession>>;

struct Entry {
    handle: SessionHandle,
    last_active: Instant,
}

/// Process-local map from session id to session. Nothing is persisted.
///
/// Sessions end on explicit removal or once idle for longer than the configured TTL.
pub struct SessionRegistry {
    services: Arc<SessionServices>,
    sessions: RwLock<HashMap<Uuid, Entry>>,
    idle_ttl: Duration,
}

impl SessionRegistry {
    /// Create an empty registry whose sessions share `services`.
    pub fn new(services: Arc<SessionServices>) -> Self {
        Self {
            services,
            sessions: RwLock::new(HashMap::new()),
            idle_ttl: DEFAULT_IDLE_TTL,
        }
    }

    /// Override how long a session may sit idle before it is evicted.
    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    /// Shared collaborators handed to every session.
    pub fn services(&self) -> &Arc<SessionServices> {
        &self.services
    }

    /// Start a new empty session and return its id.
    pub async fn create(&self) -> Uuid {
        self.evict_idle().await;
        let id = Uuid::new_v4();
        let session = DocumentSession::new(Arc::clone(&self.services));
        self.sessions.write().await.insert(
            id,
            Entry {
                handle: Arc::new(Mutex::new(session)),
                last_active: Instant::now(),
            },
        );
        tracing::info!(session_id = %id, "Session created");
        id
    }

    /// Look up a session by id, marking it active.
    pub async fn get(&self, id: Uuid) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id)?;
        entry.last_active = Instant::now();
        Some(Arc::clone(&entry.handle))
    }

    /// Drop a session and all of its state. Returns whether it existed.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::info!(session_id = %id, "Session ended");
        }
        removed
    }

    /// End every session idle for longer than the TTL and return how many were dropped.
    ///
    /// A session whose lock is held is mid-operation and is never evicted.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let idle = entry.last_active.elapsed();
            let expired = idle > self.idle_ttl && entry.handle.try_lock().is_ok();
            if expired {
                tracing::info!(session_id = %id, idle_secs = idle.as_secs(), "Session expired");
            }
            !expired
        });
        before - sessions.len()
    }

    /// Sweep idle sessions every `period` in a background task.
    pub fn spawn_eviction(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let evicted = self.evict_idle().await;
                if evicted > 0 {
                    tracing::debug!(evicted, "Evicted idle sessions");
                }
            }
        })
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
