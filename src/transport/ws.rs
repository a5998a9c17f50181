// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UI-facing WebSocket transport (spec §6, §6.1): one `axum::extract::ws::
//! WebSocket` per connected UI client, multiplexing every live session's
//! commands and events over that single connection.
//!
//! Grounded on `crates/cli/src/transport/ws.rs`'s per-connection
//! `tokio::select!` loop (subscribe to broadcast channels once, forward as
//! JSON text frames, decode inbound text into a command enum) and
//! `crates/mux/src/transport/ws.rs`'s per-session subscription shape —
//! generalized so one connection attaches to and detaches from an arbitrary
//! set of sessions over its lifetime via explicit `attach`/`detach`
//! commands, instead of being bound to one session at upgrade time.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::event::{InputEvent, OutputEvent, PtySignal, StateChangeEvent, UiCommand, UiEvent};
use crate::session::SpawnParams;
use crate::supervisor::SessionState;
use crate::transport::state::AppState;

/// Build the Axum router exposing the UI WebSocket endpoint.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

async fn ws_handler(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(state, socket))
}

/// Forwarder tasks feeding one session's events into this connection's
/// outbound stream; aborted on `detach` or connection close.
struct Attachment {
    output_task: JoinHandle<()>,
    state_task: JoinHandle<()>,
}

impl Attachment {
    fn abort(self) {
        self.output_task.abort();
        self.state_task.abort();
    }
}

async fn handle_connection(state: Arc<AppState>, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<UiEvent>(256);
    let mut attachments: HashMap<Uuid, Attachment> = HashMap::new();

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,

            event = out_rx.recv() => {
                let Some(event) = event else { break };
                if send_json(&mut ws_tx, &event).await.is_err() {
                    break;
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<UiCommand>(&text) {
                            Ok(command) => handle_command(&state, command, &out_tx, &mut attachments).await,
                            Err(err) => tracing::debug!(%err, "dropping malformed UI command"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    for (_, attachment) in attachments {
        attachment.abort();
    }
}

async fn handle_command(
    state: &Arc<AppState>,
    command: UiCommand,
    out_tx: &mpsc::Sender<UiEvent>,
    attachments: &mut HashMap<Uuid, Attachment>,
) {
    match command {
        UiCommand::SpawnSession { id, label, cwd, agent, resume_id, resume_picker, fork, cols, rows } => {
            let id = id.unwrap_or_else(Uuid::new_v4);
            let params = SpawnParams {
                id,
                agent: agent.clone(),
                label: label.clone(),
                cwd: cwd.into(),
                resume_id,
                resume_picker,
                fork,
                cols,
                rows,
            };
            match state.spawn(params).await {
                Ok(_handle) => {
                    let _ = out_tx.send(UiEvent::SessionCreated { id, agent, label }).await;
                }
                Err(err) => {
                    let _ = out_tx.send(UiEvent::SessionDropped { id, reason: err.to_string() }).await;
                }
            }
        }

        UiCommand::Attach { session_id, subscriber_id: _ } => {
            let Some(handle) = state.get(session_id).await else {
                let _ = out_tx
                    .send(UiEvent::SessionDropped { id: session_id, reason: "session not found".to_string() })
                    .await;
                return;
            };

            if let Some(old) = attachments.remove(&session_id) {
                old.abort();
            }

            let (snapshot, _truncated) = handle.ring.read().await.snapshot();
            let total_written = handle.ring.read().await.total_written();
            if !snapshot.is_empty() {
                let _ = out_tx.send(UiEvent::output(session_id, total_written, &snapshot)).await;
            }
            if let Some(current) = state.supervisor.state_of(session_id).await {
                let _ = out_tx.send(UiEvent::SessionState { id: session_id, state: current, reason: None }).await;
            }

            let output_task = spawn_output_forwarder(session_id, handle.output_tx.subscribe(), out_tx.clone());
            let state_task = spawn_state_forwarder(session_id, handle.state_tx.subscribe(), out_tx.clone());
            attachments.insert(session_id, Attachment { output_task, state_task });
        }

        UiCommand::Detach { session_id, subscriber_id: _ } => {
            if let Some(attachment) = attachments.remove(&session_id) {
                attachment.abort();
            }
        }

        UiCommand::Input { session_id, data_base64 } => {
            let Some(handle) = state.get(session_id).await else { return };
            match UiCommand::decode_input_data(&data_base64) {
                Ok(bytes) => {
                    let _ = handle.input_tx.send(InputEvent::Write(bytes.into())).await;
                }
                Err(err) => tracing::debug!(%err, %session_id, "dropping malformed input payload"),
            }
        }

        UiCommand::Resize { session_id, cols, rows } => {
            if let Some(handle) = state.get(session_id).await {
                let _ = handle.input_tx.send(InputEvent::Resize { cols, rows }).await;
            }
        }

        UiCommand::Signal { session_id, signal } => {
            let Some(handle) = state.get(session_id).await else { return };
            match PtySignal::from_name(&signal) {
                Some(sig) => {
                    let _ = handle.input_tx.send(InputEvent::Signal(sig)).await;
                }
                None => tracing::debug!(%signal, %session_id, "unknown signal name"),
            }
        }

        UiCommand::CloseSession { session_id } => {
            if let Some(attachment) = attachments.remove(&session_id) {
                attachment.abort();
            }
            if let Err(err) = state.close(session_id).await {
                let _ = out_tx.send(UiEvent::SessionDropped { id: session_id, reason: err.to_string() }).await;
            }
        }

        UiCommand::ListSessions => {
            for handle in state.list().await {
                let _ = out_tx
                    .send(UiEvent::SessionCreated {
                        id: handle.id,
                        agent: handle.agent.clone(),
                        label: handle.label.clone(),
                    })
                    .await;
                if let Some(current) = state.supervisor.state_of(handle.id).await {
                    let _ = out_tx.send(UiEvent::SessionState { id: handle.id, state: current, reason: None }).await;
                }
            }
        }
    }
}

/// Forward one session's raw PTY output to this connection. A `Lagged`
/// receiver error becomes an explicit drop notice rather than a silent gap
/// (spec §5: "no reordering, no gaps except on overflow-drop ... UI must
/// re-attach").
fn spawn_output_forwarder(
    session_id: Uuid,
    mut rx: broadcast::Receiver<OutputEvent>,
    out_tx: mpsc::Sender<UiEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(OutputEvent::Raw { data, seq }) => {
                    if out_tx.send(UiEvent::output(session_id, seq, &data)).await.is_err() {
                        break;
                    }
                }
                Ok(OutputEvent::ScreenUpdate { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    let _ = out_tx
                        .send(UiEvent::SessionDropped { id: session_id, reason: "buffer_overflow".to_string() })
                        .await;
                    break;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn spawn_state_forwarder(
    session_id: Uuid,
    mut rx: broadcast::Receiver<StateChangeEvent>,
    out_tx: mpsc::Sender<UiEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if out_tx
                        .send(UiEvent::SessionState { id: session_id, state: event.next.clone(), reason: event.reason })
                        .await
                        .is_err()
                    {
                        break;
                    }
                    if let SessionState::Exited { status } = event.next {
                        let _ = out_tx
                            .send(UiEvent::SessionExited {
                                id: session_id,
                                exit_code: status.code,
                                exit_signal: status.signal,
                            })
                            .await;
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    let _ = out_tx
                        .send(UiEvent::SessionDropped { id: session_id, reason: "buffer_overflow".to_string() })
                        .await;
                    break;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn send_json<S>(tx: &mut S, event: &UiEvent) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let text = serde_json::to_string(event).map_err(|_| ())?;
    tx.send(Message::Text(text.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
