// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fallback driver for agents with no dedicated integration: PTY heuristics
//! only, no hooks or transcript watcher (spec §4.1).
//!
//! Grounded on `crates/cli/src/driver/unknown/mod.rs`'s Tier 4
//! `ProcessMonitor`-only detector set; this crate's equivalent liveness
//! fallback lives in the composite detector tier wiring rather than here,
//! since `Driver` itself carries no detector-construction method.

use super::{Capabilities, Driver, SpawnOptions, SpawnPlan};

pub struct UnknownDriver;

impl UnknownDriver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UnknownDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for UnknownDriver {
    fn name(&self) -> &'static str {
        "unknown"
    }

    fn display_name(&self) -> &'static str {
        "Unknown Agent"
    }

    fn build_spawn(&self, opts: &SpawnOptions<'_>) -> anyhow::Result<SpawnPlan> {
        let executable = self.resolve_executable(None);
        let _ = opts;
        Ok(SpawnPlan { argv: vec![executable.display().to_string()], env: vec![] })
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            hooks: false,
            transcript: false,
            transcript_watcher: false,
            classifier: true,
            state_detector: true,
            resume: false,
            fork: false,
        }
        .with_env_overrides(self.name())
    }
}

#[cfg(test)]
#[path = "unknown_tests.rs"]
mod tests;
