// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `attn hook` — forward one line of JSON from stdin (or `$1`) to the
//! running daemon's hook socket.
//!
//! Grounded on `crates/cli/src/send.rs`'s thin wrapper-side client (read,
//! forward, translate the outcome into an exit code); the transport is a
//! Unix stream write rather than an HTTP POST, matching [`crate::hook`]'s
//! socket instead of the teacher's `COOP_URL`.

use std::io::Read;

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;

use crate::config::Config;

/// Run the `hook` subcommand. Returns a process exit code.
///
/// `payload_arg` is the positional argument (`$1`); when absent, the
/// payload is read from stdin instead (spec §6.2).
pub async fn run(config: &Config, payload_arg: Option<&str>) -> i32 {
    let owned;
    let line = match payload_arg {
        Some(arg) => arg.trim(),
        None => {
            let mut buf = String::new();
            if let Err(err) = std::io::stdin().read_to_string(&mut buf) {
                eprintln!("error: failed to read hook payload from stdin: {err}");
                return 2;
            }
            owned = buf;
            owned.trim()
        }
    };
    if line.is_empty() {
        eprintln!("error: empty hook payload");
        return 2;
    }
    if serde_json::from_str::<serde_json::Value>(line).is_err() {
        eprintln!("error: hook payload is not valid JSON");
        return 2;
    }

    let socket_path = config.effective_hook_socket();
    let mut stream = match UnixStream::connect(&socket_path).await {
        Ok(stream) => stream,
        Err(err) => {
            eprintln!("error: failed to connect to hook socket {}: {err}", socket_path.display());
            return 1;
        }
    };

    if let Err(err) = stream.write_all(line.as_bytes()).await {
        eprintln!("error: failed to write hook payload: {err}");
        return 1;
    }
    if let Err(err) = stream.write_all(b"\n").await {
        eprintln!("error: failed to write hook payload: {err}");
        return 1;
    }

    0
}

#[cfg(test)]
#[path = "hook_tests.rs"]
mod tests;
