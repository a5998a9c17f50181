// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use base64::Engine;
use bytes::Bytes;
use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::supervisor::SessionState;

/// Raw terminal output or a screen-repaint notice fanned out to subscribers.
#[derive(Debug, Clone)]
pub enum OutputEvent {
    Raw { data: Bytes, seq: u64 },
    ScreenUpdate { seq: u64 },
}

/// A state transition for one session, stamped with the supervisor's
/// monotonic per-session sequence counter.
#[derive(Debug, Clone)]
pub struct StateChangeEvent {
    pub prev: SessionState,
    pub next: SessionState,
    pub seq: u64,
    pub reason: Option<String>,
}

/// Input delivered to the child process through the PTY.
#[derive(Debug, Clone)]
pub enum InputEvent {
    Write(Bytes),
    Resize { cols: u16, rows: u16 },
    Signal(PtySignal),
}

/// Named signals that can be delivered to a session's child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PtySignal {
    Hup,
    Int,
    Quit,
    Kill,
    Usr1,
    Usr2,
    Term,
    Cont,
    Stop,
    Tstp,
    Winch,
}

impl PtySignal {
    /// Parse a signal name (e.g. `"SIGINT"`, `"INT"`, `"2"`) into a `PtySignal`.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.to_uppercase();
        let bare: &str = upper.strip_prefix("SIG").unwrap_or(&upper);

        match bare {
            "HUP" | "1" => Some(Self::Hup),
            "INT" | "2" => Some(Self::Int),
            "QUIT" | "3" => Some(Self::Quit),
            "KILL" | "9" => Some(Self::Kill),
            "USR1" | "10" => Some(Self::Usr1),
            "USR2" | "12" => Some(Self::Usr2),
            "TERM" | "15" => Some(Self::Term),
            "CONT" | "18" => Some(Self::Cont),
            "STOP" | "19" => Some(Self::Stop),
            "TSTP" | "20" => Some(Self::Tstp),
            "WINCH" | "28" => Some(Self::Winch),
            _ => None,
        }
    }

    /// Convert to the corresponding `nix` signal for delivery.
    pub fn to_nix(self) -> Signal {
        match self {
            Self::Hup => Signal::SIGHUP,
            Self::Int => Signal::SIGINT,
            Self::Quit => Signal::SIGQUIT,
            Self::Kill => Signal::SIGKILL,
            Self::Usr1 => Signal::SIGUSR1,
            Self::Usr2 => Signal::SIGUSR2,
            Self::Term => Signal::SIGTERM,
            Self::Cont => Signal::SIGCONT,
            Self::Stop => Signal::SIGSTOP,
            Self::Tstp => Signal::SIGTSTP,
            Self::Winch => Signal::SIGWINCH,
        }
    }
}

/// Exit status of a session's child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// Inbound UI command, enumerated fully by spec §6.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum UiCommand {
    SpawnSession {
        id: Option<Uuid>,
        label: String,
        cwd: String,
        agent: String,
        resume_id: Option<String>,
        #[serde(default)]
        resume_picker: bool,
        #[serde(default)]
        fork: bool,
        cols: u16,
        rows: u16,
    },
    Attach {
        session_id: Uuid,
        subscriber_id: Uuid,
    },
    Detach {
        session_id: Uuid,
        subscriber_id: Uuid,
    },
    Input {
        session_id: Uuid,
        data_base64: String,
    },
    Resize {
        session_id: Uuid,
        cols: u16,
        rows: u16,
    },
    Signal {
        session_id: Uuid,
        signal: String,
    },
    CloseSession {
        session_id: Uuid,
    },
    ListSessions,
}

impl UiCommand {
    /// Decode the base64 payload of an `Input` command.
    pub fn decode_input_data(data_base64: &str) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(data_base64)
    }
}

/// Outbound UI event, enumerated fully by spec §6.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UiEvent {
    SessionCreated {
        id: Uuid,
        agent: String,
        label: String,
    },
    SessionState {
        id: Uuid,
        state: SessionState,
        reason: Option<String>,
    },
    SessionOutput {
        id: Uuid,
        seq: u64,
        data_base64: String,
    },
    SessionExited {
        id: Uuid,
        exit_code: Option<i32>,
        exit_signal: Option<i32>,
    },
    SessionDropped {
        id: Uuid,
        reason: String,
    },
}

impl UiEvent {
    /// Build a `session_output` event, base64-encoding the payload.
    pub fn output(id: Uuid, seq: u64, data: &[u8]) -> Self {
        Self::SessionOutput {
            id,
            seq,
            data_base64: base64::engine::general_purpose::STANDARD.encode(data),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
