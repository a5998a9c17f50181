// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk registry used for recovery after a supervisor restart
//! (SPEC_FULL.md §3.1, §4.7 Recovery).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::SessionState;

/// Durable record of one session, written whenever its state changes and
/// read back at startup to drive recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: Uuid,
    pub agent: String,
    pub cwd: String,
    pub label: String,
    pub resume_id: Option<String>,
    pub started_at_epoch_ms: u64,
    pub transcript_path: Option<String>,
    pub last_known_state: SessionState,
}

/// The full on-disk registry: a flat map keyed by session id.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Registry {
    pub sessions: HashMap<Uuid, RegistryEntry>,
}

impl Registry {
    /// Load the registry from disk, returning an empty registry if the file
    /// doesn't exist or fails to parse (a corrupt registry must never block
    /// startup — spec §7 error containment).
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(error = %e, path = %path.display(), "ignoring unparseable registry");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Write the registry to disk atomically (write to a temp file, then
    /// rename) so a crash mid-write never leaves a truncated registry.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_vec_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn upsert(&mut self, entry: RegistryEntry) {
        self.sessions.insert(entry.id, entry);
    }

    pub fn remove(&mut self, id: &Uuid) {
        self.sessions.remove(id);
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
