// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook listener (spec §4.6): a single process-wide Unix socket, rather
//! than a per-session named pipe, that every wrapped agent's hooks connect
//! to and write line-delimited JSON messages on.
//!
//! The line-buffered, non-blocking read loop per connection is grounded on
//! `crates/cli/src/driver/hook_recv.rs`'s `HookReceiver`; the
//! connection-acceptance shape (`UnixListener::accept()` looping, one
//! reader task per connection, all funneling into one channel tagged by
//! message `id`) is new, since the teacher's hook transport is a per-session
//! FIFO rather than a shared socket.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// One parsed line from the hook socket (spec §4.6 message grammar).
#[derive(Debug, Clone, PartialEq)]
pub enum HookMessage {
    Register { id: Uuid, label: String, cwd: String, agent: String },
    State { id: Uuid, state: String },
    Stop { id: Uuid, transcript_path: Option<String> },
    Todos { id: Uuid, todos: Vec<Value> },
    Unregister { id: Uuid },
}

impl HookMessage {
    pub fn session_id(&self) -> Uuid {
        match self {
            HookMessage::Register { id, .. }
            | HookMessage::State { id, .. }
            | HookMessage::Stop { id, .. }
            | HookMessage::Todos { id, .. }
            | HookMessage::Unregister { id, .. } => *id,
        }
    }
}

#[derive(Deserialize)]
struct RawHookLine {
    cmd: String,
    id: Uuid,
    label: Option<String>,
    cwd: Option<String>,
    agent: Option<String>,
    state: Option<String>,
    transcript_path: Option<String>,
    todos: Option<Vec<Value>>,
}

fn parse_hook_line(line: &str) -> Option<HookMessage> {
    let raw: RawHookLine = serde_json::from_str(line).ok()?;
    match raw.cmd.as_str() {
        "register" => Some(HookMessage::Register {
            id: raw.id,
            label: raw.label.unwrap_or_default(),
            cwd: raw.cwd.unwrap_or_default(),
            agent: raw.agent.unwrap_or_default(),
        }),
        "state" => Some(HookMessage::State { id: raw.id, state: raw.state? }),
        "stop" => Some(HookMessage::Stop { id: raw.id, transcript_path: raw.transcript_path }),
        "todos" => Some(HookMessage::Todos { id: raw.id, todos: raw.todos.unwrap_or_default() }),
        "unregister" => Some(HookMessage::Unregister { id: raw.id }),
        _ => None,
    }
}

/// Rate-limits identical consecutive `state` messages for the same session
/// within `window` (spec §4.6: "rate-limits per-session rapid duplicates").
pub struct DuplicateStateFilter {
    window: Duration,
    last: HashMap<Uuid, (String, Instant)>,
}

impl DuplicateStateFilter {
    pub fn new(window: Duration) -> Self {
        Self { window, last: HashMap::new() }
    }

    /// Returns `true` if `message` should be dropped as a rapid duplicate.
    pub fn should_drop(&mut self, message: &HookMessage) -> bool {
        let HookMessage::State { id, state } = message else { return false };
        let now = Instant::now();
        if let Some((last_state, seen_at)) = self.last.get(id) {
            if last_state == state && now.duration_since(*seen_at) < self.window {
                return true;
            }
        }
        self.last.insert(*id, (state.clone(), now));
        false
    }
}

/// Accepts connections on `socket_path` until `shutdown` fires, spawning one
/// reader task per connection. Every successfully parsed message is sent on
/// `message_tx`, tagged by the message's own `id` field.
pub async fn serve(socket_path: &Path, message_tx: mpsc::Sender<HookMessage>, shutdown: CancellationToken) -> anyhow::Result<()> {
    let _ = std::fs::remove_file(socket_path);
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(socket_path)?;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let tx = message_tx.clone();
                        let conn_shutdown = shutdown.clone();
                        tokio::spawn(handle_connection(stream, tx, conn_shutdown));
                    }
                    Err(err) => {
                        tracing::warn!(%err, "hook socket accept failed");
                    }
                }
            }
        }
    }

    let _ = std::fs::remove_file(socket_path);
    Ok(())
}

async fn handle_connection(stream: UnixStream, message_tx: mpsc::Sender<HookMessage>, shutdown: CancellationToken) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        tokio::select! {
            _ = shutdown.cancelled() => return,
            result = reader.read_line(&mut line) => {
                match result {
                    Ok(0) => return,
                    Ok(_) => {
                        if let Some(message) = parse_hook_line(line.trim()) {
                            if message_tx.send(message).await.is_err() {
                                return;
                            }
                        } else {
                            tracing::debug!(line = %line.trim(), "skipping malformed hook line");
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%err, "hook connection read error");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
