// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::ExitStatus;

/// Lifecycle state of a supervised session.
///
/// `Exited` is terminal: once entered it never leaves (invariant, data model
/// §3). `PendingApproval` may only be cleared by an explicit hint — a
/// `working` heartbeat from a detector must not clear it on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Launching,
    Working,
    PendingApproval,
    WaitingInput,
    Idle,
    Exited { status: ExitStatus },
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Launching => "launching",
            Self::Working => "working",
            Self::PendingApproval => "pending_approval",
            Self::WaitingInput => "waiting_input",
            Self::Idle => "idle",
            Self::Exited { .. } => "exited",
        }
    }

    /// Relative priority used to decide whether a lower-confidence tier may
    /// escalate the state (spec §4.3/§4.7): a tier may only move priority
    /// upward, never down, unless it is equal-or-higher confidence.
    ///
    /// `launching(0) < idle(1) < working(2) < waiting_input(3) < pending_approval(4)`.
    /// `exited` is handled separately and always accepted.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Launching => 0,
            Self::Idle => 1,
            Self::Working => 2,
            Self::WaitingInput => 3,
            Self::PendingApproval => 4,
            Self::Exited { .. } => 5,
        }
    }

    pub fn is_exited(&self) -> bool {
        matches!(self, Self::Exited { .. })
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a proposed state transition originated (data model §3 Hint).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintSource {
    Detector,
    Transcript,
    Hook,
    Classifier,
    Runtime,
}

/// An internal proposed-state message from a signal source to the
/// Supervisor (data model §3).
#[derive(Debug, Clone)]
pub struct Hint {
    pub session_id: Uuid,
    pub proposed_state: SessionState,
    pub source: HintSource,
    pub occurred_at: std::time::Instant,
    pub turn_id: Option<String>,
    pub evidence: Option<String>,
}

impl Hint {
    pub fn new(session_id: Uuid, proposed_state: SessionState, source: HintSource) -> Self {
        Self {
            session_id,
            proposed_state,
            source,
            occurred_at: std::time::Instant::now(),
            turn_id: None,
            evidence: None,
        }
    }

    pub fn with_turn_id(mut self, turn_id: impl Into<String>) -> Self {
        self.turn_id = Some(turn_id.into());
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
