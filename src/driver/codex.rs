// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codex driver: no hooks, transcript-only turn tracking (spec §4.1, §4.4
//! "Codex"). Generalized from the Claude watcher's `TranscriptWatcherBehavior`
//! shape since no teacher driver ships a Codex-specific transcript policy.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use serde_json::Value;

use super::{
    Capabilities, Driver, LineOutcome, SpawnOptions, SpawnPlan, TickOutcome, TranscriptFinder,
    TranscriptWatcherBehavior,
};
use crate::supervisor::state::SessionState;

pub struct CodexDriver {
    open_turns: AtomicU32,
    pending_tool_calls: AtomicU32,
    assistant_messages_this_turn: AtomicU32,
    last_activity_ms: AtomicU64,
    created_at: Instant,
}

impl CodexDriver {
    pub fn new() -> Self {
        Self {
            open_turns: AtomicU32::new(0),
            pending_tool_calls: AtomicU32::new(0),
            assistant_messages_this_turn: AtomicU32::new(0),
            last_activity_ms: AtomicU64::new(0),
            created_at: Instant::now(),
        }
    }

    fn is_live(&self) -> bool {
        self.open_turns.load(Ordering::Relaxed) > 0 || self.pending_tool_calls.load(Ordering::Relaxed) > 0
    }
}

impl Default for CodexDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for CodexDriver {
    fn name(&self) -> &'static str {
        "codex"
    }

    fn display_name(&self) -> &'static str {
        "Codex"
    }

    fn build_spawn(&self, _opts: &SpawnOptions<'_>) -> anyhow::Result<SpawnPlan> {
        let executable = self.resolve_executable(None);
        Ok(SpawnPlan { argv: vec![executable.display().to_string()], env: vec![] })
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            hooks: false,
            transcript: true,
            transcript_watcher: true,
            classifier: true,
            state_detector: true,
            resume: false,
            fork: false,
        }
        .with_env_overrides(self.name())
    }

    fn as_transcript_finder(&self) -> Option<&dyn TranscriptFinder> {
        Some(self)
    }

    fn as_transcript_watcher_behavior(&self) -> Option<&dyn TranscriptWatcherBehavior> {
        Some(self)
    }
}

impl TranscriptFinder for CodexDriver {
    fn find(&self, _session_id: uuid::Uuid, cwd: &Path, _started_at: std::time::SystemTime) -> Option<PathBuf> {
        let sessions_dir = cwd.join(".codex").join("sessions");
        if !sessions_dir.is_dir() {
            return None;
        }
        latest_jsonl(&sessions_dir)
    }

    fn find_for_resume(&self, resume_id: &str, cwd: &Path) -> Option<PathBuf> {
        let candidate = cwd.join(".codex").join("sessions").join(format!("{resume_id}.jsonl"));
        candidate.is_file().then_some(candidate)
    }
}

fn latest_jsonl(dir: &Path) -> Option<PathBuf> {
    let mut best: Option<(PathBuf, std::time::SystemTime)> = None;
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        let Ok(modified) = meta.modified() else { continue };
        if best.as_ref().map(|(_, t)| modified > *t).unwrap_or(true) {
            best = Some((path, modified));
        }
    }
    best.map(|(path, _)| path)
}

/// Tracks open turns, pending tool calls, and last-activity. While any
/// remain live the session is held in `working`; a turn ending with zero
/// assistant messages pushes to `waiting_input`, as does a turn-aborted
/// event, unless already awaiting input (spec §4.4 "Codex").
impl TranscriptWatcherBehavior for CodexDriver {
    fn handle_line(&self, line: &Value, now: Instant, current_state: &SessionState) -> LineOutcome {
        let kind = line.get("type").and_then(Value::as_str).unwrap_or("");
        self.last_activity_ms.store(now.duration_since(self.created_at).as_millis() as u64, Ordering::Relaxed);

        match kind {
            "turn.started" => {
                self.open_turns.fetch_add(1, Ordering::Relaxed);
                self.assistant_messages_this_turn.store(0, Ordering::Relaxed);
                LineOutcome { new_state: Some(SessionState::Working), log: None }
            }
            "tool_call.started" => {
                self.pending_tool_calls.fetch_add(1, Ordering::Relaxed);
                LineOutcome { new_state: Some(SessionState::Working), log: None }
            }
            "tool_call.completed" | "tool_call.failed" => {
                self.pending_tool_calls.fetch_sub(1, Ordering::Relaxed);
                LineOutcome::default()
            }
            // Counted in `handle_assistant_message`, which `TranscriptWatcher::run`
            // calls once per assistant line alongside `handle_line` itself.
            "assistant_message" => LineOutcome::default(),
            "turn.aborted" => {
                self.open_turns.fetch_sub(1, Ordering::Relaxed);
                if *current_state == SessionState::WaitingInput {
                    LineOutcome::default()
                } else {
                    LineOutcome { new_state: Some(SessionState::WaitingInput), log: Some("codex:turn_aborted".into()) }
                }
            }
            "turn.completed" => {
                self.open_turns.fetch_sub(1, Ordering::Relaxed);
                if self.assistant_messages_this_turn.swap(0, Ordering::Relaxed) == 0 {
                    LineOutcome {
                        new_state: Some(SessionState::WaitingInput),
                        log: Some("codex:empty_turn".into()),
                    }
                } else if self.is_live() {
                    LineOutcome::default()
                } else {
                    LineOutcome { new_state: Some(SessionState::Idle), log: None }
                }
            }
            _ => LineOutcome::default(),
        }
    }

    fn handle_assistant_message(&self, _now: Instant) {
        self.assistant_messages_this_turn.fetch_add(1, Ordering::Relaxed);
    }

    fn tick(&self, _now: Instant, _current_state: &SessionState) -> TickOutcome {
        TickOutcome::default()
    }
}

#[cfg(test)]
#[path = "codex_tests.rs"]
mod tests;
