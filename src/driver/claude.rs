// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude Code driver: hooks + transcript watcher + Tier 5 screen detector
//! (spec §4.1, §4.4 "Claude").

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use super::{
    Capabilities, ClassifierVerdict, Driver, HookProvider, LineOutcome, RecoveryPolicy, ResumePolicy,
    SpawnOptions, SpawnPlan, TickOutcome, TranscriptFinder, TranscriptWatcherBehavior,
};
use crate::supervisor::state::SessionState;

pub struct ClaudeDriver;

impl ClaudeDriver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClaudeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for ClaudeDriver {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn display_name(&self) -> &'static str {
        "Claude Code"
    }

    fn build_spawn(&self, opts: &SpawnOptions<'_>) -> anyhow::Result<SpawnPlan> {
        let executable = self.resolve_executable(None);
        let mut argv = vec![executable.display().to_string()];
        if let Some(resume_id) = opts.resume_id {
            argv.push("--resume".to_string());
            argv.push(resume_id.to_string());
        } else if opts.resume_picker {
            argv.push("--resume".to_string());
        }
        Ok(SpawnPlan { argv, env: vec![] })
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            hooks: true,
            transcript: true,
            transcript_watcher: true,
            classifier: true,
            state_detector: true,
            resume: true,
            fork: true,
        }
        .with_env_overrides(self.name())
    }

    fn as_hook_provider(&self) -> Option<&dyn HookProvider> {
        Some(self)
    }

    fn as_transcript_finder(&self) -> Option<&dyn TranscriptFinder> {
        Some(self)
    }

    fn as_transcript_watcher_behavior(&self) -> Option<&dyn TranscriptWatcherBehavior> {
        Some(self)
    }

    fn as_resume_policy(&self) -> Option<&dyn ResumePolicy> {
        Some(self)
    }

    fn as_recovery_policy(&self) -> Option<&dyn RecoveryPolicy> {
        Some(self)
    }
}

impl HookProvider for ClaudeDriver {
    /// Hooks pipe their JSON payload through the `attn hook` CLI subcommand
    /// (SPEC_FULL.md §6.2), which forwards one line to the shared hook
    /// socket (spec §4.6 message grammar). `SessionStart`/`SessionEnd` map
    /// to `register`/`unregister`; `Stop` maps to `stop`; `Notification`
    /// and approval-adjacent `PreToolUse` events map to `state` with only
    /// `working`/`waiting_input` values — `pending_approval` is never
    /// reported by a Claude hook, only by the PTY detector (spec precedence
    /// table, §4.7).
    fn generate_hook_config(&self, _hook_socket: &Path, session_id: uuid::Uuid) -> Value {
        let register = format!(
            "input=$(cat); printf '{{\"cmd\":\"register\",\"id\":\"{session_id}\",\"label\":\"%s\",\"cwd\":\"%s\",\"agent\":\"claude\"}}' \"$ATTN_LABEL\" \"$PWD\" | attn hook"
        );
        let stop = format!(
            "input=$(cat); path=$(printf '%s' \"$input\" | sed -n 's/.*\"transcript_path\":\"\\([^\"]*\\)\".*/\\1/p'); printf '{{\"cmd\":\"stop\",\"id\":\"{session_id}\",\"transcript_path\":\"%s\"}}' \"$path\" | attn hook"
        );
        let waiting_input = format!(
            "printf '{{\"cmd\":\"state\",\"id\":\"{session_id}\",\"state\":\"waiting_input\"}}' | attn hook"
        );
        let unregister = format!("printf '{{\"cmd\":\"unregister\",\"id\":\"{session_id}\"}}' | attn hook");

        json!({
            "hooks": {
                "SessionStart": [{ "matcher": "", "hooks": [{ "type": "command", "command": register }] }],
                "Stop": [{ "matcher": "", "hooks": [{ "type": "command", "command": stop }] }],
                "Notification": [{
                    "matcher": "idle_prompt|permission_prompt",
                    "hooks": [{ "type": "command", "command": waiting_input.clone() }]
                }],
                "PreToolUse": [{
                    "matcher": "ExitPlanMode|AskUserQuestion|EnterPlanMode",
                    "hooks": [{ "type": "command", "command": waiting_input }]
                }],
                "SessionEnd": [{ "matcher": "", "hooks": [{ "type": "command", "command": unregister }] }]
            }
        })
    }

    fn write_hook_config(&self, cwd: &Path, config: &Value) -> anyhow::Result<()> {
        let dir = cwd.join(".claude");
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("settings.local.json"), serde_json::to_vec_pretty(config)?)?;
        Ok(())
    }
}

impl TranscriptFinder for ClaudeDriver {
    fn find(&self, _session_id: uuid::Uuid, cwd: &Path, _started_at: std::time::SystemTime) -> Option<PathBuf> {
        discover_session_log(&cwd.display().to_string()).ok().flatten()
    }

    fn find_for_resume(&self, resume_id: &str, _cwd: &Path) -> Option<PathBuf> {
        discover_session_log(resume_id).ok().flatten()
    }
}

/// Scan `~/.claude/projects/<workspace-hash>/` for the most recent `.jsonl`
/// session log matching `workspace_hint`.
fn discover_session_log(workspace_hint: &str) -> anyhow::Result<Option<PathBuf>> {
    let direct = Path::new(workspace_hint);
    if direct.is_file() && matches!(direct.extension().and_then(|e| e.to_str()), Some("jsonl")) {
        return Ok(Some(direct.to_path_buf()));
    }

    let home = std::env::var("HOME").unwrap_or_default();
    if home.is_empty() {
        return Ok(None);
    }

    let projects_dir = Path::new(&home).join(".claude").join("projects");
    if !projects_dir.is_dir() {
        return Ok(None);
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(entries) = std::fs::read_dir(&projects_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                let dir_name = path.file_name().unwrap_or_default().to_string_lossy().to_string();
                if dir_name.contains(workspace_hint) || workspace_hint.contains(&dir_name) {
                    candidates.push(path);
                }
            }
        }
    }

    let mut best: Option<(PathBuf, std::time::SystemTime)> = None;
    for dir in &candidates {
        if let Ok(entries) = std::fs::read_dir(dir) {
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
        }
    }

    Ok(best.map(|(path, _)| path))
}

/// Claude's hook traffic freshness window: classification is skipped while
/// a hook marked the session working/waiting within the last 2 minutes
/// (spec §4.4 "Claude").
const HOOK_FRESHNESS_WINDOW: Duration = Duration::from_secs(120);

impl TranscriptWatcherBehavior for ClaudeDriver {
    /// Claude assistant events are not deduplicated and no turn lifecycle is
    /// inferred from the transcript (spec §4.4) — all state comes from
    /// hooks and the screen detector.
    fn handle_line(&self, _line: &Value, _now: Instant, _current_state: &SessionState) -> LineOutcome {
        LineOutcome::default()
    }

    fn handle_assistant_message(&self, _now: Instant) {}

    fn tick(&self, _now: Instant, _current_state: &SessionState) -> TickOutcome {
        TickOutcome::default()
    }

    fn skip_classification(&self, _state: &SessionState, last_seen: Instant, now: Instant) -> (bool, &'static str) {
        if now.duration_since(last_seen) < HOOK_FRESHNESS_WINDOW {
            (true, "claude:hook_fresh")
        } else {
            (false, "")
        }
    }
}

impl ResumePolicy for ClaudeDriver {
    fn resume_id_for_spawn(&self, requested: Option<&str>) -> Option<String> {
        requested.map(str::to_string)
    }

    fn extract_resume_id(&self, transcript_path: &Path) -> Option<String> {
        transcript_path.file_stem().map(|s| s.to_string_lossy().to_string())
    }
}

impl RecoveryPolicy for ClaudeDriver {
    fn should_recover(&self) -> bool {
        true
    }

    fn recovered_running_state(&self, _last_pty_state: &SessionState) -> SessionState {
        SessionState::Launching
    }
}

/// A Claude-specific [`ClassifierVerdict`] mapping helper used by tests and
/// by the Supervisor when wiring a `SubprocessClassifier` result back into
/// the state machine.
pub fn verdict_to_state(verdict: ClassifierVerdict) -> Option<SessionState> {
    match verdict {
        ClassifierVerdict::WaitingInput => Some(SessionState::WaitingInput),
        ClassifierVerdict::Idle => Some(SessionState::Idle),
        ClassifierVerdict::Unknown => None,
    }
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
