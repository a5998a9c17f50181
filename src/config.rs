// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Session-state supervisor for concurrent coding-agent CLI sessions.
#[derive(Debug, Parser)]
#[command(name = "attn", version, about)]
pub struct Config {
    /// HTTP/WS port to listen on.
    #[arg(long, env = "ATTN_PORT")]
    pub port: Option<u16>,

    /// Unix socket path for the UI WebSocket transport.
    #[arg(long, env = "ATTN_SOCKET")]
    pub socket: Option<String>,

    /// Host address to bind to.
    #[arg(long, env = "ATTN_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Unix socket path for the hook listener (spec §4.6).
    #[arg(long, env = "ATTN_HOOK_SOCKET")]
    pub hook_socket: Option<PathBuf>,

    /// Ring buffer size in bytes (default 8 MiB per spec §3).
    #[arg(long, env = "ATTN_RING_SIZE", default_value = "8388608")]
    pub ring_size: usize,

    /// Default terminal columns for new sessions.
    #[arg(long, env = "ATTN_COLS", default_value = "200")]
    pub cols: u16,

    /// Default terminal rows for new sessions.
    #[arg(long, env = "ATTN_ROWS", default_value = "50")]
    pub rows: u16,

    /// Quiet window (seconds) before the classifier may be consulted.
    #[arg(long, env = "ATTN_QUIET_WINDOW_MS", default_value = "1200")]
    pub quiet_window_ms: u64,

    /// Per-call classifier timeout in milliseconds.
    #[arg(long, env = "ATTN_CLASSIFIER_TIMEOUT_MS", default_value = "3000")]
    pub classifier_timeout_ms: u64,

    /// Helper command invoked by `SubprocessClassifier` (unset disables classification).
    #[arg(long, env = "ATTN_CLASSIFIER_CMD")]
    pub classifier_cmd: Option<String>,

    /// Transcript watcher poll interval in milliseconds (notify fallback).
    #[arg(long, env = "ATTN_WATCHER_POLL_MS", default_value = "1000")]
    pub watcher_poll_ms: u64,

    /// Subscriber write deadline in milliseconds before treating as a drop.
    #[arg(long, env = "ATTN_SUBSCRIBER_WRITE_MS", default_value = "2000")]
    pub subscriber_write_ms: u64,

    /// Grace period in seconds after SIGTERM before SIGKILL.
    #[arg(long, env = "ATTN_KILL_GRACE_SECS", default_value = "10")]
    pub kill_grace_secs: u64,

    /// Shell-environment capture timeout in milliseconds.
    #[arg(long, env = "ATTN_SHELL_ENV_TIMEOUT_MS", default_value = "2000")]
    pub shell_env_timeout_ms: u64,

    /// Session grace TTL (seconds) after exit with zero live subscribers.
    #[arg(long, env = "ATTN_EXIT_GRACE_SECS", default_value = "300")]
    pub exit_grace_secs: u64,

    /// Log format (json or text).
    #[arg(long, env = "ATTN_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "ATTN_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Path to the session registry file used for startup recovery (spec §3.1).
    #[arg(long, env = "ATTN_REGISTRY_PATH")]
    pub registry_path: Option<PathBuf>,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.port.is_none() && self.socket.is_none() {
            anyhow::bail!("either --port or --socket must be specified");
        }
        if self.ring_size == 0 {
            anyhow::bail!("--ring-size must be greater than zero");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        Ok(())
    }

    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.quiet_window_ms)
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_millis(self.classifier_timeout_ms)
    }

    pub fn watcher_poll_interval(&self) -> Duration {
        Duration::from_millis(self.watcher_poll_ms)
    }

    pub fn subscriber_write_deadline(&self) -> Duration {
        Duration::from_millis(self.subscriber_write_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_secs)
    }

    pub fn shell_env_timeout(&self) -> Duration {
        Duration::from_millis(self.shell_env_timeout_ms)
    }

    pub fn exit_grace(&self) -> Duration {
        Duration::from_secs(self.exit_grace_secs)
    }

    /// Default registry path: `$XDG_STATE_HOME/attn/registry.json`, falling
    /// back to `~/.local/state/attn/registry.json`.
    pub fn effective_registry_path(&self) -> PathBuf {
        if let Some(path) = &self.registry_path {
            return path.clone();
        }
        let state_home = std::env::var("XDG_STATE_HOME").unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_default();
            format!("{home}/.local/state")
        });
        PathBuf::from(state_home).join("attn").join("registry.json")
    }

    /// Default hook socket path: `$XDG_RUNTIME_DIR/attn.sock`, falling back
    /// to `$TMPDIR/attn-<uid>.sock`.
    pub fn effective_hook_socket(&self) -> PathBuf {
        if let Some(path) = &self.hook_socket {
            return path.clone();
        }
        if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
            return PathBuf::from(runtime_dir).join("attn.sock");
        }
        let tmp = std::env::var("TMPDIR").unwrap_or_else(|_| "/tmp".to_string());
        #[allow(unsafe_code)]
        let uid = unsafe { nix::libc::getuid() };
        PathBuf::from(tmp).join(format!("attn-{uid}.sock"))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
