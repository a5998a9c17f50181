// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared application state for the UI transport (spec §6.1): the live
//! session table plus the on-disk registry used for startup recovery.
//!
//! Grounded on `crates/mux/src/state.rs`'s `MuxState` — a `RwLock<HashMap<Id,
//! Arc<SessionEntry>>>` session table alongside a process-wide
//! `CancellationToken` — generalized from upstream-bridge entries to
//! locally-owned `SessionHandle`s, and paired with the registry persistence
//! `crates/cli/src/run.rs` performs around session start/stop.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AttnError;
use crate::session::{self, SessionHandle, SpawnParams};
use crate::supervisor::registry::{Registry, RegistryEntry};
use crate::supervisor::{SessionState, Supervisor};

/// Shared state handed to every UI WebSocket connection.
pub struct AppState {
    pub config: Arc<Config>,
    pub supervisor: Arc<Supervisor>,
    pub sessions: RwLock<HashMap<Uuid, Arc<SessionHandle>>>,
    pub registry: RwLock<Registry>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: Arc<Config>, supervisor: Arc<Supervisor>, shutdown: CancellationToken) -> Self {
        let registry = Registry::load(&config.effective_registry_path());
        Self { config, supervisor, sessions: RwLock::new(HashMap::new()), registry: RwLock::new(registry), shutdown }
    }

    /// Spawn a new session, track it in the live table, and persist a
    /// recovery entry for it.
    pub async fn spawn(&self, params: SpawnParams) -> Result<Arc<SessionHandle>, AttnError> {
        let id = params.id;
        let agent = params.agent.clone();
        let label = params.label.clone();
        let cwd = params.cwd.display().to_string();
        let resume_id = params.resume_id.clone();

        let handle =
            Arc::new(session::spawn_session(Arc::clone(&self.config), Arc::clone(&self.supervisor), params).await?);
        self.sessions.write().await.insert(id, Arc::clone(&handle));

        let entry = RegistryEntry {
            id,
            agent,
            cwd,
            label,
            resume_id,
            started_at_epoch_ms: epoch_ms(),
            transcript_path: None,
            last_known_state: SessionState::Launching,
        };
        self.persist(|registry| registry.upsert(entry)).await;

        Ok(handle)
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn list(&self) -> Vec<Arc<SessionHandle>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Close a session: cancel its runtime, drop it from the live table, and
    /// prune its registry entry.
    pub async fn close(&self, id: Uuid) -> Result<(), AttnError> {
        let handle = self.sessions.write().await.remove(&id).ok_or(AttnError::SessionNotFound(id))?;
        handle.shutdown.cancel();
        self.supervisor.remove(id).await;
        self.persist(|registry| registry.remove(&id)).await;
        Ok(())
    }

    /// Recover sessions from the on-disk registry at startup (spec §4.7
    /// "Recovery on startup"), pruning entries the driver refused.
    pub async fn recover(&self) {
        let pruned = {
            let registry = self.registry.read().await;
            self.supervisor.recover(&registry, crate::driver::lookup).await
        };
        if pruned.is_empty() {
            return;
        }
        self.persist(|registry| {
            for id in pruned {
                registry.remove(&id);
            }
        })
        .await;
    }

    async fn persist(&self, mutate: impl FnOnce(&mut Registry)) {
        let mut registry = self.registry.write().await;
        mutate(&mut registry);
        let path = self.config.effective_registry_path();
        if let Err(err) = registry.save(&path) {
            tracing::warn!(%err, "failed to persist session registry");
        }
    }
}

fn epoch_ms() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
