//! Session module - message types and per-session agent storage
//!
//! This module provides:
//! - The conversation message model ([`Message`], [`ToolCall`], ...)
//! - [`SessionStore`], mapping a session id to the [`Agent`] that owns its
//!   conversation, for connectors that serve many users
//!
//! Each session's agent sits behind its own `tokio::sync::Mutex`, so a long
//! run in one session never blocks another. The map lock is held only while
//! looking up, inserting or removing entries.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lapka::agent::Agent;
//! use lapka::config::{Config, SessionConfig};
//! use lapka::session::SessionStore;
//! use lapka::tools::builtin_registry;
//!
//! async fn handle(store: &SessionStore, user: &str, text: &str) -> lapka::error::Result<String> {
//!     let agent = store.get_or_create(user).await?;
//!     let mut agent = agent.lock().await;
//!     let answer = agent.run(text, None, None).await?;
//!     agent.save(user).await?;
//!     Ok(answer)
//! }
//!
//! let config = Config::load()?;
//! let tools = Arc::new(builtin_registry());
//! let factory_config = config.clone();
//! let store = SessionStore::new(
//!     Arc::new(move |_id: &str| Agent::from_config(&factory_config, Arc::clone(&tools))),
//!     config.sessions.clone(),
//! );
//! ```

pub mod types;

pub use types::{ContentPart, ImageUrl, Message, MessageContent, Role, ToolCall};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::agent::Agent;
use crate::config::SessionConfig;
use crate::error::Result;

/// Builds a fresh agent for a session id.
pub type AgentFactory = Arc<dyn Fn(&str) -> Result<Agent> + Send + Sync>;

/// Shared handle to one session's agent.
pub type SharedAgent = Arc<Mutex<Agent>>;

struct SessionEntry {
    agent: SharedAgent,
    last_used: Instant,
}

/// Session id → agent map with create-on-first-use and eviction.
///
/// Evicted sessions have their checkpoint saved first, so a later
/// `get_or_create` for the same id picks up where it left off.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    factory: AgentFactory,
    config: SessionConfig,
    restore_checkpoints: bool,
}

impl SessionStore {
    /// Create an empty store.
    ///
    /// # Arguments
    /// * `factory` - Called once per new session id
    /// * `config` - Capacity and idle-timeout limits
    pub fn new(factory: AgentFactory, config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            factory,
            config,
            restore_checkpoints: true,
        }
    }

    /// Whether new sessions load their saved checkpoint (default: true).
    pub fn with_restore(mut self, restore: bool) -> Self {
        self.restore_checkpoints = restore;
        self
    }

    /// Get the agent for `id`, creating it on first use.
    ///
    /// A new agent restores its checkpoint when one exists; an unreadable
    /// checkpoint is moved aside and the session starts fresh. If the store
    /// is full, the least recently used session is saved and dropped.
    ///
    /// The agent is built and restored outside the map lock. When two callers
    /// race on the same new id, the first insert wins and the other agent is
    /// discarded.
    pub async fn get_or_create(&self, id: &str) -> Result<SharedAgent> {
        if let Some(agent) = self.touch(id).await {
            return Ok(agent);
        }

        let mut agent = (self.factory)(id)?;
        if self.restore_checkpoints && agent.resume(id).await {
            crate::log_component!(info, "session", "Session restored from checkpoint", session = id);
        }

        let mut evicted = Vec::new();
        let agent = {
            let mut sessions = self.sessions.write().await;
            if let Some(entry) = sessions.get_mut(id) {
                entry.last_used = Instant::now();
                debug!(session = id, "Session created concurrently, using existing agent");
                return Ok(Arc::clone(&entry.agent));
            }

            while self.config.max_sessions > 0 && sessions.len() >= self.config.max_sessions {
                let oldest = sessions
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_used)
                    .map(|(key, _)| key.clone());
                match oldest.and_then(|key| sessions.remove(&key).map(|e| (key, e))) {
                    Some((key, entry)) => evicted.push((key, entry.agent)),
                    None => break,
                }
            }

            let agent = Arc::new(Mutex::new(agent));
            sessions.insert(
                id.to_string(),
                SessionEntry {
                    agent: Arc::clone(&agent),
                    last_used: Instant::now(),
                },
            );
            debug!(session = id, total = sessions.len(), "Session created");
            agent
        };

        for (key, agent) in evicted {
            crate::log_component!(
                info,
                "session",
                "Evicting least recently used session",
                session = key.as_str()
            );
            persist_and_close(&key, agent).await;
        }
        Ok(agent)
    }

    /// Existing agent for `id` with its last-use time refreshed.
    async fn touch(&self, id: &str) -> Option<SharedAgent> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(id).map(|entry| {
            entry.last_used = Instant::now();
            Arc::clone(&entry.agent)
        })
    }

    /// Get the agent for `id` without creating one.
    pub async fn get(&self, id: &str) -> Option<SharedAgent> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|entry| Arc::clone(&entry.agent))
    }

    /// Clear the conversation of `id` and overwrite its checkpoint.
    ///
    /// Returns `false` if the session does not exist.
    pub async fn reset(&self, id: &str) -> Result<bool> {
        let Some(agent) = self.get(id).await else {
            return Ok(false);
        };
        let mut agent = agent.lock().await;
        agent.reset();
        agent.save(id).await?;
        Ok(true)
    }

    /// Remove `id` from the store, saving its checkpoint and closing it.
    ///
    /// Returns `false` if the session does not exist.
    pub async fn remove(&self, id: &str) -> bool {
        let entry = self.sessions.write().await.remove(id);
        match entry {
            Some(entry) => {
                persist_and_close(id, entry.agent).await;
                true
            }
            None => false,
        }
    }

    /// Save and drop every session idle longer than the configured timeout.
    ///
    /// Returns the number of evicted sessions.
    pub async fn evict_idle(&self) -> usize {
        let timeout = Duration::from_secs(self.config.idle_timeout_secs);
        let expired: Vec<(String, SharedAgent)> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, entry)| entry.last_used.elapsed() > timeout)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id).map(|entry| (id, entry.agent)))
                .collect()
        };

        let count = expired.len();
        for (id, agent) in expired {
            debug!(session = %id, "Evicting idle session");
            persist_and_close(&id, agent).await;
        }
        if count > 0 {
            info!(evicted = count, "Idle sessions evicted");
        }
        count
    }

    /// Save every session's checkpoint. Failures are logged and skipped.
    pub async fn save_all(&self) -> usize {
        let agents: Vec<(String, SharedAgent)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, entry)| (id.clone(), Arc::clone(&entry.agent)))
            .collect();

        let mut saved = 0;
        for (id, agent) in agents {
            match agent.lock().await.save(&id).await {
                Ok(Some(_)) => saved += 1,
                Ok(None) => {}
                Err(e) => warn!(session = %id, error = %e, "Failed to save session"),
            }
        }
        saved
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

/// Save the checkpoint of a session leaving the store, then close its agent
/// once no caller still holds it.
async fn persist_and_close(id: &str, agent: SharedAgent) {
    if let Err(e) = agent.lock().await.save(id).await {
        warn!(session = %id, error = %e, "Failed to save evicted session");
    }
    if let Ok(mutex) = Arc::try_unwrap(agent) {
        mutex.into_inner().close();
    }
}
