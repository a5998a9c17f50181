// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing setup, driven by [`crate::config::Config`].

use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Initialize the global tracing subscriber from config.
///
/// Uses `try_init` so it's safe to call more than once (tests do so freely).
/// Priority: `--log-level` / `ATTN_LOG_LEVEL` takes precedence unless left at
/// its default, in which case `RUST_LOG` wins if set.
pub fn init(config: &Config) {
    use tracing_subscriber::fmt;

    let filter = if std::env::var("ATTN_LOG_LEVEL").is_err() && config.log_level == "info" {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    } else {
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
