// ABOUTME: Registry of live sandbox sessions keyed by sandbox id
// ABOUTME: Bounded capacity with least-recently-used eviction; evicted sessions are terminated

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::SandboxConfig;
use crate::error::{Result, SandboxError};
use crate::factory::SandboxFactory;
use crate::providers::SandboxProvider;
use crate::types::ProviderKind;

pub const DEFAULT_CAPACITY: usize = 16;

/// A provider shared between request handlers; the mutex serializes calls
pub type SharedProvider = Arc<Mutex<Box<dyn SandboxProvider>>>;

struct Entry {
    provider: SharedProvider,
    last_used: Instant,
}

/// Live sandbox sessions, constructed explicitly and passed to whoever needs it
pub struct SandboxManager {
    sessions: RwLock<HashMap<String, Entry>>,
    active: RwLock<Option<String>>,
    capacity: usize,
}

impl Default for SandboxManager {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SandboxManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            active: RwLock::new(None),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Track a provider holding a live session and mark it active
    ///
    /// Registering past capacity terminates the least recently used session.
    pub async fn register(&self, provider: Box<dyn SandboxProvider>) -> Result<String> {
        let sandbox_id = provider
            .sandbox_info()
            .map(|info| info.sandbox_id.clone())
            .ok_or_else(|| SandboxError::no_session("register"))?;

        let evicted = {
            let mut sessions = self.sessions.write().await;
            let replaced = sessions.insert(
                sandbox_id.clone(),
                Entry {
                    provider: Arc::new(Mutex::new(provider)),
                    last_used: Instant::now(),
                },
            );
            if replaced.is_some() {
                debug!("Replaced provider registered for sandbox {}", sandbox_id);
            }

            let mut evicted = Vec::new();
            while sessions.len() > self.capacity {
                let oldest = sessions
                    .iter()
                    .filter(|(id, _)| **id != sandbox_id)
                    .min_by_key(|(_, entry)| entry.last_used)
                    .map(|(id, _)| id.clone());
                match oldest.and_then(|id| sessions.remove(&id).map(|entry| (id, entry))) {
                    Some(pair) => evicted.push(pair),
                    None => break,
                }
            }
            evicted
        };

        for (id, entry) in evicted {
            warn!("Sandbox capacity {} reached, terminating {}", self.capacity, id);
            entry.provider.lock().await.terminate().await;
            self.clear_active_if(&id).await;
        }

        *self.active.write().await = Some(sandbox_id.clone());
        info!("Registered sandbox {}", sandbox_id);
        Ok(sandbox_id)
    }

    pub async fn get(&self, sandbox_id: &str) -> Option<SharedProvider> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(sandbox_id).map(|entry| {
            entry.last_used = Instant::now();
            entry.provider.clone()
        })
    }

    pub async fn active_id(&self) -> Option<String> {
        self.active.read().await.clone()
    }

    pub async fn active(&self) -> Option<SharedProvider> {
        let id = self.active_id().await?;
        self.get(&id).await
    }

    /// Mark a registered sandbox as the active one
    pub async fn set_active(&self, sandbox_id: &str) -> bool {
        if !self.sessions.read().await.contains_key(sandbox_id) {
            return false;
        }
        *self.active.write().await = Some(sandbox_id.to_string());
        true
    }

    /// Registered provider for `sandbox_id`, or a freshly reconnected one
    ///
    /// `make_provider` builds an idle provider for the reconnect attempt.
    /// Returns `None` when the sandbox cannot be re-attached.
    pub async fn get_or_reconnect_with<F>(
        &self,
        sandbox_id: &str,
        make_provider: F,
    ) -> Result<Option<SharedProvider>>
    where
        F: FnOnce() -> Result<Box<dyn SandboxProvider>>,
    {
        if let Some(provider) = self.get(sandbox_id).await {
            return Ok(Some(provider));
        }

        let mut provider = make_provider()?;
        if !provider.reconnect(sandbox_id).await {
            return Ok(None);
        }

        self.register(provider).await?;
        Ok(self.get(sandbox_id).await)
    }

    /// Like [`get_or_reconnect_with`](Self::get_or_reconnect_with), building the provider from the environment
    pub async fn get_or_reconnect(
        &self,
        sandbox_id: &str,
        kind: ProviderKind,
        config: SandboxConfig,
    ) -> Result<Option<SharedProvider>> {
        self.get_or_reconnect_with(sandbox_id, || {
            SandboxFactory::create(Some(kind.as_str()), Some(config))
        })
        .await
    }

    /// Terminate and forget one sandbox; `false` if it was not registered
    pub async fn terminate(&self, sandbox_id: &str) -> bool {
        let entry = self.sessions.write().await.remove(sandbox_id);
        let Some(entry) = entry else {
            return false;
        };

        entry.provider.lock().await.terminate().await;
        self.clear_active_if(sandbox_id).await;
        info!("Terminated sandbox {}", sandbox_id);
        true
    }

    /// Terminate every registered sandbox, returning how many there were
    pub async fn terminate_all(&self) -> usize {
        let drained: Vec<(String, Entry)> = self.sessions.write().await.drain().collect();
        let count = drained.len();

        for (id, entry) in drained {
            debug!("Terminating sandbox {}", id);
            entry.provider.lock().await.terminate().await;
        }
        *self.active.write().await = None;

        if count > 0 {
            info!("Terminated {} sandbox(es)", count);
        }
        count
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    async fn clear_active_if(&self, sandbox_id: &str) {
        let mut active = self.active.write().await;
        if active.as_deref() == Some(sandbox_id) {
            *active = None;
        }
    }
}
