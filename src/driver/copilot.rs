// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Copilot driver: hooks plus approval-tool-stall transcript policy, with a
//! PTY detector fallback for unwrapped invocations (spec §4.1, §4.4
//! "Copilot"). Generalized from the Claude hook-config shape since no
//! teacher driver ships a Copilot hooks/transcript policy directly.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use super::{
    Capabilities, Driver, HookProvider, LineOutcome, PtyStatePolicy, SpawnOptions, SpawnPlan, TickOutcome,
    TranscriptWatcherBehavior,
};
use crate::detector::DetectorEmission;
use crate::supervisor::state::SessionState;

const APPROVAL_TOOLS: &[&str] = &["bash", "create"];
const APPROVAL_GRACE: Duration = Duration::from_millis(1200);

pub struct CopilotDriver {
    open_turn: AtomicU32,
    pending_approval_tools: AtomicU32,
    stall_started_at: Mutex<Option<Instant>>,
}

impl CopilotDriver {
    pub fn new() -> Self {
        Self { open_turn: AtomicU32::new(0), pending_approval_tools: AtomicU32::new(0), stall_started_at: Mutex::new(None) }
    }
}

impl Default for CopilotDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for CopilotDriver {
    fn name(&self) -> &'static str {
        "copilot"
    }

    fn display_name(&self) -> &'static str {
        "GitHub Copilot CLI"
    }

    fn build_spawn(&self, _opts: &SpawnOptions<'_>) -> anyhow::Result<SpawnPlan> {
        let executable = self.resolve_executable(None);
        Ok(SpawnPlan { argv: vec![executable.display().to_string()], env: vec![] })
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            hooks: true,
            transcript: true,
            transcript_watcher: true,
            classifier: true,
            state_detector: true,
            resume: false,
            fork: false,
        }
        .with_env_overrides(self.name())
    }

    fn as_hook_provider(&self) -> Option<&dyn HookProvider> {
        Some(self)
    }

    fn as_transcript_watcher_behavior(&self) -> Option<&dyn TranscriptWatcherBehavior> {
        Some(self)
    }

    fn as_pty_state_policy(&self) -> Option<&dyn PtyStatePolicy> {
        Some(self)
    }
}

impl HookProvider for CopilotDriver {
    fn generate_hook_config(&self, _hook_socket: &Path, session_id: uuid::Uuid) -> Value {
        let register = format!(
            "input=$(cat); printf '{{\"cmd\":\"register\",\"id\":\"{session_id}\",\"label\":\"%s\",\"cwd\":\"%s\",\"agent\":\"copilot\"}}' \"$ATTN_LABEL\" \"$PWD\" | attn hook"
        );
        let unregister = format!("printf '{{\"cmd\":\"unregister\",\"id\":\"{session_id}\"}}' | attn hook");
        json!({
            "hooks": {
                "SessionStart": [{ "command": register }],
                "SessionEnd": [{ "command": unregister }]
            }
        })
    }

    fn write_hook_config(&self, cwd: &Path, config: &Value) -> anyhow::Result<()> {
        let dir = cwd.join(".copilot");
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("hooks.json"), serde_json::to_vec_pretty(config)?)?;
        Ok(())
    }
}

/// Tracks pending approval-tool calls. A tool in `APPROVAL_TOOLS` that stays
/// pending past `APPROVAL_GRACE` while the turn is still open promotes to
/// `pending_approval`; the condition clearing demotes back to `working`
/// (spec §4.4 "Copilot").
impl TranscriptWatcherBehavior for CopilotDriver {
    fn handle_line(&self, line: &Value, now: Instant, _current_state: &SessionState) -> LineOutcome {
        let kind = line.get("type").and_then(Value::as_str).unwrap_or("");
        let tool = line.get("tool").and_then(Value::as_str).unwrap_or("");

        match kind {
            "turn.started" => {
                self.open_turn.store(1, Ordering::Relaxed);
                LineOutcome::default()
            }
            "turn.completed" | "turn.aborted" => {
                self.open_turn.store(0, Ordering::Relaxed);
                self.pending_approval_tools.store(0, Ordering::Relaxed);
                *self.stall_started_at.lock().unwrap() = None;
                LineOutcome::default()
            }
            "tool_call.started" if APPROVAL_TOOLS.contains(&tool) => {
                self.pending_approval_tools.fetch_add(1, Ordering::Relaxed);
                let mut stall = self.stall_started_at.lock().unwrap();
                if stall.is_none() {
                    *stall = Some(now);
                }
                LineOutcome::default()
            }
            "tool_call.completed" | "tool_call.failed" if APPROVAL_TOOLS.contains(&tool) => {
                let remaining = self.pending_approval_tools.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
                if remaining == 0 {
                    *self.stall_started_at.lock().unwrap() = None;
                    LineOutcome { new_state: Some(SessionState::Working), log: Some("copilot:approval_cleared".into()) }
                } else {
                    LineOutcome::default()
                }
            }
            _ => LineOutcome::default(),
        }
    }

    fn handle_assistant_message(&self, _now: Instant) {}

    fn tick(&self, now: Instant, _current_state: &SessionState) -> TickOutcome {
        let turn_open = self.open_turn.load(Ordering::Relaxed) > 0;
        let stalled = self.pending_approval_tools.load(Ordering::Relaxed) > 0;
        let stall_started = *self.stall_started_at.lock().unwrap();

        if turn_open && stalled {
            if let Some(started) = stall_started {
                if now.duration_since(started) >= APPROVAL_GRACE {
                    return TickOutcome { new_state: Some(SessionState::PendingApproval), block_classification: true };
                }
            }
        }
        TickOutcome::default()
    }
}

/// Copilot may promote to `pending_approval` on its own transcript evidence
/// but a raw PTY "working" heuristic must never demote away from
/// `pending_approval` (spec §4.3 PTYStatePolicy, §4.7 item 3).
impl PtyStatePolicy for CopilotDriver {
    fn admit(&self, current: &SessionState, emission: &DetectorEmission) -> bool {
        let (proposed, _, _) = emission;
        if *current == SessionState::PendingApproval && *proposed == SessionState::Working {
            return false;
        }
        true
    }
}

#[cfg(test)]
#[path = "copilot_tests.rs"]
mod tests;
