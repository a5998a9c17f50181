// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generic transcript tail engine (spec §4.4): locates a transcript via the
//! driver's `TranscriptFinder` with backoff, tails it in append-only JSONL
//! mode, and drives a per-agent `TranscriptWatcherBehavior`.
//!
//! Grounded on `crates/cli/src/driver/log_watch.rs`'s `LogWatcher`: the
//! notify-plus-poll wake-up loop, truncation-via-shrink detection, and
//! byte-offset tracking are carried over near verbatim.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::driver::TranscriptWatcherBehavior;
use crate::supervisor::state::SessionState;

/// How many trailing JSONL records the watcher keeps in memory for
/// classify-on-stop extraction.
const RECENT_LINES_CAP: usize = 200;

/// A state proposal or log line emitted by the watcher while running.
#[derive(Debug, Clone)]
pub enum TranscriptEmission {
    State { state: SessionState, cause: String },
    Log { message: String },
}

/// A quiet-window classify request: `char_limit` plus a reply channel for
/// the extraction result. Routed through the long-lived `TranscriptWatcher`
/// task rather than re-reading the transcript from scratch, so classify
/// calls share the same `last_classified_turn_id` dedup state the line-by-
/// line tail uses (spec §3, §8 classifier-idempotence).
pub type ExtractRequest = (usize, oneshot::Sender<Result<Extraction, ExtractError>>);

pub struct TranscriptWatcher {
    path: PathBuf,
    offset: u64,
    poll_interval: Duration,
    recent_lines: VecDeque<Value>,
    last_classified_turn_id: Option<String>,
}

impl TranscriptWatcher {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            offset: 0,
            poll_interval: Duration::from_secs(1),
            recent_lines: VecDeque::with_capacity(RECENT_LINES_CAP),
            last_classified_turn_id: None,
        }
    }

    /// Seek to `max(0, file_size - bootstrap_bytes)` before the first read,
    /// so a freshly-attached watcher doesn't replay the whole history.
    pub fn bootstrap(path: PathBuf, bootstrap_bytes: u64) -> Self {
        let offset = std::fs::metadata(&path).map(|m| m.len().saturating_sub(bootstrap_bytes)).unwrap_or(0);
        let mut watcher = Self::new(path);
        watcher.offset = offset;
        watcher
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read new complete lines appended since the last read, recording
    /// parsed JSON into the recent-lines ring for later extraction.
    /// Non-JSON lines are skipped rather than treated as fatal.
    fn read_new_lines(&mut self) -> anyhow::Result<Vec<Value>> {
        let file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        if let Ok(meta) = file.metadata() {
            if meta.len() < self.offset {
                tracing::warn!(path = %self.path.display(), "transcript shrank below tracked offset, resetting (truncation)");
                self.offset = 0;
            }
        }

        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(self.offset))?;

        let mut parsed = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line)?;
            if bytes_read == 0 {
                break;
            }
            self.offset += bytes_read as u64;
            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(value) => {
                    if self.recent_lines.len() >= RECENT_LINES_CAP {
                        self.recent_lines.pop_front();
                    }
                    self.recent_lines.push_back(value.clone());
                    parsed.push(value);
                }
                Err(err) => {
                    tracing::debug!(path = %self.path.display(), %err, "skipping non-JSON transcript line");
                }
            }
        }

        Ok(parsed)
    }

    fn setup_notify_watcher(&self, wake_tx: mpsc::Sender<()>) -> Option<notify::RecommendedWatcher> {
        use notify::{RecursiveMode, Watcher};

        let mut watcher = notify::recommended_watcher(move |_: notify::Result<notify::Event>| {
            let _ = wake_tx.try_send(());
        })
        .ok()?;

        let watch_path = self.path.parent().unwrap_or(self.path.as_ref());
        watcher.watch(watch_path, RecursiveMode::NonRecursive).ok()?;
        Some(watcher)
    }

    /// Run the tail loop, driving `behavior`'s four hooks and forwarding
    /// resulting state proposals to `emit_tx`. Runs until `shutdown` fires.
    pub async fn run(
        mut self,
        behavior: &dyn TranscriptWatcherBehavior,
        emit_tx: mpsc::Sender<TranscriptEmission>,
        mut extract_rx: mpsc::Receiver<ExtractRequest>,
        shutdown: CancellationToken,
    ) {
        let (wake_tx, mut wake_rx) = mpsc::channel::<()>(1);
        let _notify_guard = self.setup_notify_watcher(wake_tx);

        let mut poll_interval = tokio::time::interval(self.poll_interval);
        let mut current_state = SessionState::Launching;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = wake_rx.recv() => {}
                _ = poll_interval.tick() => {}
                request = extract_rx.recv() => {
                    let Some((char_limit, reply)) = request else { continue };
                    let _ = reply.send(self.extract_last_assistant_turn(char_limit));
                    continue;
                }
            }

            match self.read_new_lines() {
                Ok(lines) => {
                    for line in &lines {
                        let is_assistant = line.get("role").and_then(Value::as_str) == Some("assistant")
                            || line.get("type").and_then(Value::as_str) == Some("assistant_message");
                        let now = Instant::now();
                        if is_assistant {
                            behavior.handle_assistant_message(now);
                        }
                        let outcome = behavior.handle_line(line, now, &current_state);
                        if let Some(log) = outcome.log {
                            let _ = emit_tx.send(TranscriptEmission::Log { message: log }).await;
                        }
                        if let Some(new_state) = outcome.new_state {
                            current_state = new_state;
                            if emit_tx
                                .send(TranscriptEmission::State { state: new_state, cause: "transcript:line".into() })
                                .await
                                .is_err()
                            {
                                return;
                            }
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(path = %self.path.display(), %err, "failed to read transcript");
                }
            }

            let tick = behavior.tick(Instant::now(), &current_state);
            if let Some(new_state) = tick.new_state {
                current_state = new_state;
                if emit_tx
                    .send(TranscriptEmission::State { state: new_state, cause: "transcript:tick".into() })
                    .await
                    .is_err()
                {
                    return;
                }
            }
        }
    }

    /// Extract the last assistant message after the last user message from
    /// the in-memory recent-lines buffer, bounded by `char_limit`. Returns
    /// `Err(ExtractError::NoNewTurn)` when the candidate turn id matches the
    /// last one classified (Claude-style dedup); drivers that don't track
    /// turn ids simply never populate one, so dedup never triggers.
    pub fn extract_last_assistant_turn(&mut self, char_limit: usize) -> Result<Extraction, ExtractError> {
        let last_user_idx = self
            .recent_lines
            .iter()
            .rposition(|line| line.get("role").and_then(Value::as_str) == Some("user"));

        let search_from = last_user_idx.map(|idx| idx + 1).unwrap_or(0);
        let candidate = self
            .recent_lines
            .iter()
            .skip(search_from)
            .rev()
            .find(|line| line.get("role").and_then(Value::as_str) == Some("assistant"));

        let Some(candidate) = candidate else {
            return Err(ExtractError::NoNewTurn);
        };

        let turn_id = candidate.get("turn_id").and_then(Value::as_str).map(str::to_string);
        if let (Some(turn_id), Some(last)) = (&turn_id, &self.last_classified_turn_id) {
            if turn_id == last {
                return Err(ExtractError::NoNewTurn);
            }
        }

        let mut text = candidate
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| candidate.to_string());
        if text.chars().count() > char_limit {
            text = text.chars().take(char_limit).collect();
        }
        if text.is_empty() {
            return Err(ExtractError::NoNewTurn);
        }

        if let Some(turn_id) = turn_id.clone() {
            self.last_classified_turn_id = Some(turn_id);
        }

        Ok(Extraction { text, turn_id })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub turn_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractError {
    NoNewTurn,
}

/// Locate a transcript with backoff, retrying until found or `shutdown`
/// fires. Caps the backoff at 2s so a slow-to-appear transcript doesn't
/// stall session startup indefinitely.
pub async fn locate_with_backoff(
    mut find: impl FnMut() -> Option<PathBuf>,
    shutdown: &CancellationToken,
) -> Option<PathBuf> {
    let mut delay = Duration::from_millis(100);
    loop {
        if let Some(path) = find() {
            return Some(path);
        }
        if shutdown.is_cancelled() {
            return None;
        }
        tokio::select! {
            _ = shutdown.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = (delay * 2).min(Duration::from_secs(2));
    }
}

#[cfg(test)]
#[path = "transcript_tests.rs"]
mod tests;
