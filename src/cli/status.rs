// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `attn status` — a single-line summary for status bars.
//!
//! Grounded on the same small-subcommand shape as [`crate::cli::list`];
//! reduces the persisted registry to counts per lifecycle state rather than
//! the full listing.

use std::collections::BTreeMap;

use crate::config::Config;
use crate::supervisor::registry::Registry;

/// Run the `status` subcommand. Returns a process exit code.
pub fn run(config: &Config) -> i32 {
    let registry = Registry::load(&config.effective_registry_path());

    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for entry in registry.sessions.values() {
        *counts.entry(entry.last_known_state.as_str()).or_insert(0) += 1;
    }

    if counts.is_empty() {
        println!("attn: no sessions");
        return 0;
    }

    let summary =
        counts.iter().map(|(state, count)| format!("{count} {state}")).collect::<Vec<_>>().join(", ");
    println!("attn: {} session(s) — {summary}", registry.sessions.len());
    0
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
