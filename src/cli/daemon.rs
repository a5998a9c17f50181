// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `attn` (no subcommand) — run the supervisor in the foreground.
//!
//! Grounded on `crates/cli/src/run.rs`'s top-level runner: build shared
//! state, spawn the listener tasks, wait for a shutdown signal, let every
//! task drain against a shared `CancellationToken`.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::hook::{DuplicateStateFilter, HookMessage};
use crate::session::publish_transition;
use crate::supervisor::state::{Hint, HintSource, SessionState};
use crate::supervisor::Supervisor;
use crate::transport::state::AppState;

/// Run the supervisor until a shutdown signal arrives. Returns a process
/// exit code.
pub async fn run(config: Config) -> i32 {
    crate::logging::init(&config);

    let config = Arc::new(config);
    let supervisor = Arc::new(Supervisor::new());
    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(Arc::clone(&config), Arc::clone(&supervisor), shutdown.clone()));

    state.recover().await;

    let (hook_tx, hook_rx) = mpsc::channel::<HookMessage>(256);
    let hook_socket = config.effective_hook_socket();
    let hook_shutdown = shutdown.clone();
    let hook_server = tokio::spawn(async move {
        if let Err(err) = crate::hook::serve(&hook_socket, hook_tx, hook_shutdown).await {
            tracing::error!(%err, "hook listener exited");
        }
    });

    let hook_consumer = tokio::spawn(consume_hooks(Arc::clone(&state), hook_rx, config.quiet_window()));

    let transport = {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(err) = crate::transport::serve(state).await {
                tracing::error!(%err, "UI transport exited");
            }
        })
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
        _ = shutdown.cancelled() => {}
    }

    shutdown.cancel();
    let _ = hook_server.await;
    let _ = hook_consumer.await;
    let _ = transport.await;

    0
}

/// Drain hook messages, translate each into a `Hint` against the
/// corresponding session's `Supervisor` entry, and broadcast the resulting
/// transition on that session's `state_tx` the same way the session loop
/// does for detector/transcript hints (spec §4.6).
async fn consume_hooks(
    state: Arc<AppState>,
    mut hook_rx: mpsc::Receiver<HookMessage>,
    quiet_window: std::time::Duration,
) {
    let mut dedup = DuplicateStateFilter::new(quiet_window);

    while let Some(message) = hook_rx.recv().await {
        if dedup.should_drop(&message) {
            continue;
        }

        let session_id = message.session_id();
        let Some(handle) = state.get(session_id).await else {
            tracing::debug!(%session_id, "hook message for unknown session");
            continue;
        };

        match message {
            HookMessage::State { id, state: raw } => {
                let Some(proposed) = parse_hook_state(&raw) else {
                    tracing::debug!(%id, state = %raw, "unrecognized hook state");
                    continue;
                };
                let hint = Hint::new(id, proposed, HintSource::Hook);
                let transition = state.supervisor.apply_hint(hint, None).await;
                publish_transition(&handle.state_tx, &handle.state_seq, transition);
            }

            HookMessage::Stop { id, transcript_path } => {
                tracing::debug!(%id, ?transcript_path, "hook stop notice");
            }

            HookMessage::Register { id, label, cwd, agent } => {
                tracing::debug!(%id, %label, %cwd, %agent, "hook register notice");
            }

            HookMessage::Todos { id, todos } => {
                tracing::debug!(%id, count = todos.len(), "hook todos notice");
            }

            HookMessage::Unregister { id } => {
                tracing::debug!(%id, "hook unregister notice");
            }
        }
    }
}

fn parse_hook_state(raw: &str) -> Option<SessionState> {
    match raw {
        "launching" => Some(SessionState::Launching),
        "working" => Some(SessionState::Working),
        "pending_approval" => Some(SessionState::PendingApproval),
        "waiting_input" => Some(SessionState::WaitingInput),
        "idle" => Some(SessionState::Idle),
        _ => None,
    }
}
