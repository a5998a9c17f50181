// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent driver interface (spec §4.1): a capability bundle queried by name so
//! the supervisor treats every agent uniformly.

pub mod claude;
pub mod codex;
pub mod composite;
pub mod copilot;
pub mod process;
pub mod registry;
pub mod unknown;

pub use composite::{CompositeDetector, DetectedState, Detector};
pub use process::ProcessMonitor;
pub use registry::{lookup, register_defaults};

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detector::DetectorEmission;
use crate::supervisor::state::SessionState;

/// Boolean feature flags enabling or suppressing a core code path per
/// session (spec §4.1). Environment overrides are applied after the
/// driver's declared defaults (`ATTN_AGENT_<NAME>_<CAPABILITY>=0|1`).
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub hooks: bool,
    pub transcript: bool,
    pub transcript_watcher: bool,
    pub classifier: bool,
    pub state_detector: bool,
    pub resume: bool,
    pub fork: bool,
}

impl Capabilities {
    /// Apply `ATTN_AGENT_<NAME>_<CAPABILITY>` overrides. Disabling
    /// `transcript` transitively disables `transcript_watcher`.
    pub fn with_env_overrides(mut self, agent_name: &str) -> Self {
        let name = agent_name.to_uppercase();
        self.hooks = env_flag(&name, "HOOKS", self.hooks);
        self.transcript = env_flag(&name, "TRANSCRIPT", self.transcript);
        self.transcript_watcher = env_flag(&name, "TRANSCRIPT_WATCHER", self.transcript_watcher);
        self.classifier = env_flag(&name, "CLASSIFIER", self.classifier);
        self.state_detector = env_flag(&name, "STATE_DETECTOR", self.state_detector);
        self.resume = env_flag(&name, "RESUME", self.resume);
        self.fork = env_flag(&name, "FORK", self.fork);
        if !self.transcript {
            self.transcript_watcher = false;
        }
        self
    }
}

fn env_flag(agent: &str, capability: &str, default: bool) -> bool {
    match std::env::var(format!("ATTN_AGENT_{agent}_{capability}")).as_deref() {
        Ok("1") => true,
        Ok("0") => false,
        _ => default,
    }
}

/// Options for building a session's spawn command (spec §4.1 `build_spawn`).
pub struct SpawnOptions<'a> {
    pub session_id: uuid::Uuid,
    pub cwd: &'a Path,
    pub cols: u16,
    pub rows: u16,
    pub resume_id: Option<&'a str>,
    pub resume_picker: bool,
    pub fork: bool,
}

/// The resolved command line and environment additions for a spawn.
pub struct SpawnPlan {
    pub argv: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Mandatory per-agent operations (spec §4.1).
pub trait Driver: Send + Sync {
    fn name(&self) -> &'static str;
    fn display_name(&self) -> &'static str;

    /// Resolve the agent's executable: env override > config > default.
    fn resolve_executable(&self, configured: Option<&str>) -> PathBuf {
        if let Ok(path) = std::env::var(format!("ATTN_AGENT_{}_BIN", self.name().to_uppercase())) {
            return PathBuf::from(path);
        }
        if let Some(path) = configured {
            return PathBuf::from(path);
        }
        PathBuf::from(self.name())
    }

    fn build_spawn(&self, opts: &SpawnOptions<'_>) -> anyhow::Result<SpawnPlan>;

    fn capabilities(&self) -> Capabilities;

    /// Optional capability: produces a hooks/settings document for the
    /// wrapper. Down-cast target for [`HookProvider`].
    fn as_hook_provider(&self) -> Option<&dyn HookProvider> {
        None
    }

    fn as_transcript_finder(&self) -> Option<&dyn TranscriptFinder> {
        None
    }

    fn as_transcript_watcher_behavior(&self) -> Option<&dyn TranscriptWatcherBehavior> {
        None
    }

    fn as_classifier_provider(&self) -> Option<&dyn ClassifierProvider> {
        None
    }

    fn as_resume_policy(&self) -> Option<&dyn ResumePolicy> {
        None
    }

    fn as_recovery_policy(&self) -> Option<&dyn RecoveryPolicy> {
        None
    }

    fn as_pty_state_policy(&self) -> Option<&dyn PtyStatePolicy> {
        None
    }

    fn as_launch_preparer(&self) -> Option<&dyn LaunchPreparer> {
        None
    }
}

/// Produces an agent-specific hooks/settings document the wrapper can hand
/// to the child, enabling hook-driven state reporting.
pub trait HookProvider: Send + Sync {
    fn generate_hook_config(&self, hook_socket: &Path, session_id: uuid::Uuid) -> serde_json::Value;
    fn write_hook_config(&self, cwd: &Path, config: &serde_json::Value) -> anyhow::Result<()>;
}

/// Locates a transcript file for a session.
pub trait TranscriptFinder: Send + Sync {
    /// Returns the transcript path, or `None` if not yet known.
    fn find(&self, session_id: uuid::Uuid, cwd: &Path, started_at: std::time::SystemTime) -> Option<PathBuf>;

    /// Separate lookup used when resuming a previous session.
    fn find_for_resume(&self, resume_id: &str, cwd: &Path) -> Option<PathBuf>;

    /// How many trailing bytes to read on first watch (bootstrap tail size).
    fn bootstrap_bytes(&self) -> u64 {
        64 * 1024
    }
}

/// Outcome of handling one transcript line (spec §4.4 `handle_line`).
#[derive(Debug, Default)]
pub struct LineOutcome {
    pub new_state: Option<SessionState>,
    pub log: Option<String>,
}

/// Outcome of a periodic transcript tick (spec §4.4 `tick`).
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub new_state: Option<SessionState>,
    pub block_classification: bool,
}

/// Per-agent policy for how transcript events affect state (spec §4.4).
pub trait TranscriptWatcherBehavior: Send + Sync {
    fn handle_line(
        &self,
        line: &serde_json::Value,
        now: std::time::Instant,
        current_state: &SessionState,
    ) -> LineOutcome;

    fn handle_assistant_message(&self, now: std::time::Instant);

    fn tick(&self, now: std::time::Instant, current_state: &SessionState) -> TickOutcome;

    /// Suppress quiet-window classification while hook traffic is fresh.
    fn skip_classification(
        &self,
        state: &SessionState,
        last_seen: std::time::Instant,
        now: std::time::Instant,
    ) -> (bool, &'static str) {
        let _ = (state, last_seen, now);
        (false, "")
    }
}

/// Outcome of a classifier call (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierVerdict {
    WaitingInput,
    Idle,
    Unknown,
}

/// Called on quiet-window stop to decide waiting_input vs idle.
///
/// Object-safe (no `async fn` in a trait object): returns a boxed future,
/// the same pattern [`Detector::run`] uses.
pub trait ClassifierProvider: Send + Sync {
    fn classify<'a>(
        &'a self,
        text: &'a str,
        timeout: Duration,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ClassifierVerdict> + Send + 'a>>;
}

/// Decides which resume id to use when spawning, and how to correlate a
/// hook `stop`'s transcript path back to the canonical transcript.
pub trait ResumePolicy: Send + Sync {
    fn resume_id_for_spawn(&self, requested: Option<&str>) -> Option<String>;

    /// Extract a resume id from a transcript path reported at stop time.
    fn extract_resume_id(&self, transcript_path: &Path) -> Option<String>;
}

/// Whether to recover orphaned registry entries at startup, and what state
/// to restore.
pub trait RecoveryPolicy: Send + Sync {
    fn should_recover(&self) -> bool;

    /// Map the last known PTY-backed state to the state a recovered session
    /// should start in (spec §4.7, scenario 6: always `launching` because
    /// the PTY backend is missing after restart).
    fn recovered_running_state(&self, _last_pty_state: &SessionState) -> SessionState {
        SessionState::Launching
    }
}

/// Whether a given detector hint should be applied in the current state
/// (spec §4.3 PTYStatePolicy).
pub trait PtyStatePolicy: Send + Sync {
    fn admit(&self, current: &SessionState, emission: &DetectorEmission) -> bool;
}

/// Best-effort pre-spawn setup (e.g. copying a parent transcript for forked
/// conversations).
pub trait LaunchPreparer: Send + Sync {
    fn prepare(&self, opts: &SpawnOptions<'_>) -> anyhow::Result<()>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
