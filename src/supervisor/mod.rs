// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session Supervisor (spec §4.7): the single writer of `Session.state`.
//! Owns a keyed arena of sessions; hints for the same session are applied
//! one at a time, different sessions are processed independently.
//!
//! Grounded on `crates/cli/src/session/{run.rs,transition.rs}` for the
//! per-session event-loop and transition-apply shape, and `crates/mux/src/
//! state.rs`'s keyed-session-table (`HashMap<Id, Arc<SessionEntry>>` behind
//! a lock) for the arena itself.

pub mod registry;
pub mod state;

pub use registry::{Registry, RegistryEntry};
pub use state::{Hint, HintSource, SessionState};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::driver::RecoveryPolicy;

/// One applied state change, returned to the caller for UI fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: SessionState,
    pub to: SessionState,
    pub reason: Option<String>,
}

/// Per-session bookkeeping the Supervisor mutates as hints arrive.
///
/// `hint_counter` versions every accepted hint so an in-flight classifier
/// result can be checked for staleness on completion (spec §4.7 item 5):
/// the Supervisor captures `hint_counter` when it launches a classify; the
/// result is applied only if the counter is unchanged.
pub struct SessionEntry {
    pub id: Uuid,
    pub agent: String,
    pub state: SessionState,
    pub quiet_since: Instant,
    pub last_seen: Instant,
    pub hint_counter: u64,
    pub classify_in_flight: Option<u64>,
}

impl SessionEntry {
    pub fn new(id: Uuid, agent: String) -> Self {
        let now = Instant::now();
        Self {
            id,
            agent,
            state: SessionState::Launching,
            quiet_since: now,
            last_seen: now,
            hint_counter: 0,
            classify_in_flight: None,
        }
    }

    pub fn recovered(id: Uuid, agent: String, state: SessionState) -> Self {
        let mut entry = Self::new(id, agent);
        entry.state = state;
        entry
    }

    /// Apply one hint per the precedence rules of spec §4.7. This method
    /// enforces the source-independent rules, including the one rule no
    /// driver is trusted to self-police:
    ///
    /// - `Exited` is terminal and always wins.
    /// - Once exited, no further hint is accepted.
    /// - `pending_approval` is sticky against output-heuristic noise: a
    ///   `Detector`-sourced `Working` proposal never clears it (a driver's
    ///   `PtyStatePolicy`, where implemented, is an earlier, driver-specific
    ///   filter — this is the backstop that applies regardless of driver).
    ///   `Hook` and `Transcript` hints, being explicit signals rather than
    ///   tier-3 heuristics, may still clear it.
    /// - `Hook` and `Transcript` hints are otherwise accepted directly.
    /// - `Classifier` hints apply only while still `Working` and only if no
    ///   newer hint has been accepted since the classify was launched
    ///   (caller supplies the counter value captured at launch time).
    pub fn apply_hint(&mut self, hint: &Hint, classify_launch_counter: Option<u64>) -> Option<Transition> {
        self.last_seen = hint.occurred_at;

        if self.state.is_exited() {
            return None;
        }

        if hint.proposed_state.is_exited() {
            return self.commit(hint.proposed_state.clone(), hint.evidence.clone());
        }

        match hint.source {
            HintSource::Hook | HintSource::Transcript => {
                self.quiet_since = hint.occurred_at;
                self.commit(hint.proposed_state.clone(), hint.evidence.clone())
            }
            HintSource::Detector => {
                if self.state == SessionState::PendingApproval && hint.proposed_state == SessionState::Working {
                    return None;
                }
                self.quiet_since = hint.occurred_at;
                self.commit(hint.proposed_state.clone(), hint.evidence.clone())
            }
            HintSource::Classifier => {
                if self.state != SessionState::Working {
                    return None;
                }
                if let Some(launch_counter) = classify_launch_counter {
                    if launch_counter != self.hint_counter {
                        return None;
                    }
                }
                self.commit(hint.proposed_state.clone(), hint.evidence.clone())
            }
            HintSource::Runtime => None,
        }
    }

    fn commit(&mut self, to: SessionState, reason: Option<String>) -> Option<Transition> {
        if to == self.state {
            return None;
        }
        let from = std::mem::replace(&mut self.state, to.clone());
        self.hint_counter += 1;
        Some(Transition { from, to, reason })
    }

    /// Whether the quiet-window classifier should be invoked right now
    /// (spec §4.7 "Quiet-window classification"): still `working`, and the
    /// quiet window `Q` has elapsed since the last assistant activity, and
    /// no classification is already in flight.
    pub fn should_classify(&self, quiet_window: Duration, now: Instant) -> bool {
        self.state == SessionState::Working
            && self.classify_in_flight.is_none()
            && now.duration_since(self.quiet_since) >= quiet_window
    }

    /// Mark a classify as launched, capturing the current hint counter so
    /// the result can later be checked for staleness.
    pub fn begin_classify(&mut self) -> u64 {
        self.classify_in_flight = Some(self.hint_counter);
        self.hint_counter
    }

    pub fn finish_classify(&mut self) {
        self.classify_in_flight = None;
    }
}

/// The `SessionId → SessionEntry` arena (spec §9 Design Notes). Behind an
/// `RwLock` rather than per-entry locks since sessions are added/removed
/// far less often than their state is read by UI fan-out.
#[derive(Default)]
pub struct Supervisor {
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self { sessions: RwLock::new(HashMap::new()) }
    }

    pub async fn insert(&self, entry: SessionEntry) {
        self.sessions.write().await.insert(entry.id, entry);
    }

    pub async fn remove(&self, id: Uuid) -> Option<SessionEntry> {
        self.sessions.write().await.remove(&id)
    }

    pub async fn state_of(&self, id: Uuid) -> Option<SessionState> {
        self.sessions.read().await.get(&id).map(|e| e.state.clone())
    }

    /// Timestamp of the last accepted Hook/Detector/Transcript hint, used by
    /// a driver's `skip_classification` freshness check (spec §4.4).
    pub async fn quiet_since(&self, id: Uuid) -> Option<Instant> {
        self.sessions.read().await.get(&id).map(|e| e.quiet_since)
    }

    /// Apply a hint to its target session, returning the transition if the
    /// state actually changed. Unknown session ids are ignored — the
    /// session may have been closed concurrently.
    pub async fn apply_hint(&self, hint: Hint, classify_launch_counter: Option<u64>) -> Option<Transition> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&hint.session_id)?;
        entry.apply_hint(&hint, classify_launch_counter)
    }

    pub async fn should_classify(&self, id: Uuid, quiet_window: Duration) -> bool {
        let sessions = self.sessions.read().await;
        sessions.get(&id).map(|e| e.should_classify(quiet_window, Instant::now())).unwrap_or(false)
    }

    pub async fn begin_classify(&self, id: Uuid) -> Option<u64> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(&id).map(|e| e.begin_classify())
    }

    pub async fn finish_classify(&self, id: Uuid) {
        if let Some(entry) = self.sessions.write().await.get_mut(&id) {
            entry.finish_classify();
        }
    }

    /// Recover sessions from the on-disk registry at startup (spec §4.7
    /// "Recovery on startup"). For each entry whose driver's
    /// `RecoveryPolicy::should_recover()` is true, the session is restored
    /// with its state mapped through `recovered_running_state` — always
    /// `launching`, since the PTY backend is absent after a restart
    /// (decision recorded in SPEC_FULL.md §9, scenario 6). Refused entries
    /// are dropped (pruned from the registry by the caller).
    pub async fn recover(&self, registry: &Registry, lookup: impl Fn(&str) -> Option<&'static dyn crate::driver::Driver>) -> Vec<Uuid> {
        let mut pruned = Vec::new();
        for (id, entry) in &registry.sessions {
            let Some(driver) = lookup(&entry.agent) else {
                pruned.push(*id);
                continue;
            };
            let should_recover = driver.as_recovery_policy().map(RecoveryPolicy::should_recover).unwrap_or(true);
            if !should_recover {
                pruned.push(*id);
                continue;
            }
            let recovered_state = driver
                .as_recovery_policy()
                .map(|policy| policy.recovered_running_state(&entry.last_known_state))
                .unwrap_or(SessionState::Launching);
            self.insert(SessionEntry::recovered(*id, entry.agent.clone(), recovered_state)).await;
        }
        pruned
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
