// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `attn list` — print the on-disk session registry as JSON.
//!
//! Grounded on `crates/cli/src/send.rs`'s small CLI-subcommand-function
//! shape (`run(...) -> i32`, a single stdout write, no subprocess of its
//! own). Reads the registry the running daemon persists rather than
//! querying it live, since the spec draws the query surface at the UI
//! WebSocket and the hook socket, not a third RPC channel.

use crate::config::Config;
use crate::supervisor::registry::Registry;

/// Run the `list` subcommand. Returns a process exit code.
pub fn run(config: &Config) -> i32 {
    let registry = Registry::load(&config.effective_registry_path());
    let mut sessions: Vec<_> = registry.sessions.into_values().collect();
    sessions.sort_by(|a, b| a.started_at_epoch_ms.cmp(&b.started_at_epoch_ms));

    match serde_json::to_string_pretty(&sessions) {
        Ok(json) => {
            println!("{json}");
            0
        }
        Err(err) => {
            eprintln!("error: failed to encode session registry: {err}");
            1
        }
    }
}

#[cfg(test)]
#[path = "list_tests.rs"]
mod tests;
