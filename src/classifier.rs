// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Classifier (spec §4.5): decides `waiting_input` vs `idle` for a quiet
//! session by inspecting its last assistant turn.
//!
//! No teacher file implements an equivalent component (confirmed empty via
//! `original_source/`'s retrieval for this concern). Grounded instead by
//! generalizing this codebase's own subprocess-spawn idiom (`pty/spawn.rs`'s
//! `execvp`-based child process) into a short-lived, stdin/stdout-JSON,
//! timeout-bounded helper rather than a long-lived PTY child.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::driver::{ClassifierProvider, ClassifierVerdict};

/// Spawns `cmd` for each classification, writes `text` to its stdin, reads
/// one line of `{"state": "waiting_input"|"idle"|"unknown"}` JSON from
/// stdout. The whole child lifecycle is bounded by `timeout`; the child is
/// killed on timeout. Errors and malformed output are treated as `unknown`
/// (spec §4.5: "errors are logged and treated as unknown").
pub struct SubprocessClassifier {
    cmd: String,
}

impl SubprocessClassifier {
    pub fn new(cmd: String) -> Self {
        Self { cmd }
    }

    async fn run_classify(cmd: &str, text: &str) -> anyhow::Result<ClassifierVerdict> {
        let mut parts = cmd.split_whitespace();
        let program = parts.next().ok_or_else(|| anyhow::anyhow!("empty classifier command"))?;
        let args: Vec<&str> = parts.collect();

        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let stdout = child.stdout.take().ok_or_else(|| anyhow::anyhow!("classifier stdout missing"))?;
        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        let _ = child.wait().await;

        let parsed: serde_json::Value = serde_json::from_str(line.trim())?;
        match parsed.get("state").and_then(serde_json::Value::as_str) {
            Some("waiting_input") => Ok(ClassifierVerdict::WaitingInput),
            Some("idle") => Ok(ClassifierVerdict::Idle),
            _ => Ok(ClassifierVerdict::Unknown),
        }
    }
}

impl ClassifierProvider for SubprocessClassifier {
    fn classify<'a>(
        &'a self,
        text: &'a str,
        timeout: Duration,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ClassifierVerdict> + Send + 'a>> {
        Box::pin(async move {
            match tokio::time::timeout(timeout, Self::run_classify(&self.cmd, text)).await {
                Ok(Ok(verdict)) => verdict,
                Ok(Err(err)) => {
                    tracing::warn!(%err, "classifier subprocess failed");
                    ClassifierVerdict::Unknown
                }
                Err(_) => {
                    tracing::warn!(cmd = %self.cmd, "classifier subprocess timed out");
                    ClassifierVerdict::Unknown
                }
            }
        })
    }
}

/// Used when no classifier command is configured: always `unknown`,
/// leaving sessions in `working` until a hook or transcript event moves
/// them (spec §4.5.1 — matches §7's `classification_unavailable`
/// contained-failure semantics).
pub struct NullClassifier;

impl ClassifierProvider for NullClassifier {
    fn classify<'a>(
        &'a self,
        _text: &'a str,
        _timeout: Duration,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ClassifierVerdict> + Send + 'a>> {
        Box::pin(async move { ClassifierVerdict::Unknown })
    }
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
