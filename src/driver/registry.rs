// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide driver registry (spec §4.1, §9 "Global registry"): built
//! once before the supervisor starts, no runtime mutation.

use std::collections::HashMap;
use std::sync::OnceLock;

use super::{claude::ClaudeDriver, codex::CodexDriver, copilot::CopilotDriver, unknown::UnknownDriver, Driver};

static REGISTRY: OnceLock<HashMap<&'static str, Box<dyn Driver>>> = OnceLock::new();

/// Register the built-in Claude, Codex, Copilot, and Unknown drivers.
/// Idempotent — subsequent calls are no-ops since [`OnceLock`] only
/// initializes once.
pub fn register_defaults() {
    REGISTRY.get_or_init(|| {
        let mut map: HashMap<&'static str, Box<dyn Driver>> = HashMap::new();
        let claude = ClaudeDriver::new();
        map.insert(claude.name(), Box::new(claude));
        let codex = CodexDriver::new();
        map.insert(codex.name(), Box::new(codex));
        let copilot = CopilotDriver::new();
        map.insert(copilot.name(), Box::new(copilot));
        let unknown = UnknownDriver::new();
        map.insert(unknown.name(), Box::new(unknown));
        map
    });
}

/// Look up a driver by name. Returns `None` for unregistered agent names —
/// callers reject the spawn at that point (spec §4.1).
pub fn lookup(name: &str) -> Option<&'static dyn Driver> {
    register_defaults();
    REGISTRY.get().and_then(|map| map.get(name)).map(|b| b.as_ref())
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
