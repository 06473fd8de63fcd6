//! In-process registry of live signup flows.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

use super::flow::SignupFlow;
use crate::backend::SignupBackend;
use crate::config::SignupConfig;

struct SessionEntry {
    flow: Arc<SignupFlow>,
    last_seen: Instant,
}

/// Signup flows keyed by id, dropped after a period of inactivity.
pub struct SessionStore {
    backend: Arc<dyn SignupBackend>,
    config: SignupConfig,
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn SignupBackend>, config: SignupConfig) -> Arc<Self> {
        Arc::new(Self {
            backend,
            config,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Start a new signup flow.
    pub async fn create(&self) -> Arc<SignupFlow> {
        let flow = Arc::new(SignupFlow::new(Arc::clone(&self.backend), &self.config));
        self.sessions.write().await.insert(
            flow.id(),
            SessionEntry {
                flow: Arc::clone(&flow),
                last_seen: Instant::now(),
            },
        );
        info!(flow_id = %flow.id(), "Signup session started");
        flow
    }

    /// Look up a flow and mark it as active.
    pub async fn get(&self, id: Uuid) -> Option<Arc<SignupFlow>> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id)?;
        entry.last_seen = Instant::now();
        Some(Arc::clone(&entry.flow))
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions idle for longer than `ttl`. Returns how many went.
    ///
    /// Dropping a flow drops its checkers, which aborts any pending lookup.
    pub async fn expire_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() <= ttl);
        let expired = before - sessions.len();
        if expired > 0 {
            info!(expired, "Expired idle signup sessions");
        }
        expired
    }
}

/// Spawn a background task that sweeps idle sessions every minute.
pub fn spawn_expiry_task(
    store: Arc<SessionStore>,
    ttl: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            store.expire_idle(ttl).await;
        }
    })
}
