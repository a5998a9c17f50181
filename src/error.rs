// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error taxonomy for the core, shared between the hook socket and
/// the UI WebSocket transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    SpawnFailed,
    SessionNotFound,
    SessionNotRunning,
    SubscriberOverflow,
    TransportError,
    ClassificationUnavailable,
    TranscriptMissing,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::SpawnFailed => 500,
            Self::SessionNotFound => 404,
            Self::SessionNotRunning => 409,
            Self::SubscriberOverflow => 429,
            Self::TransportError => 502,
            Self::ClassificationUnavailable => 503,
            Self::TranscriptMissing => 404,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpawnFailed => "spawn_failed",
            Self::SessionNotFound => "session_not_found",
            Self::SessionNotRunning => "session_not_running",
            Self::SubscriberOverflow => "subscriber_overflow",
            Self::TransportError => "transport_error",
            Self::ClassificationUnavailable => "classification_unavailable",
            Self::TranscriptMissing => "transcript_missing",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for the core. Every suspension point returns a
/// `Result` carrying one of these kinds; nothing unwinds across a session
/// boundary (spec §9).
#[derive(Debug, Error)]
pub enum AttnError {
    #[error("failed to spawn agent process: {0}")]
    SpawnFailed(String),

    #[error("session {0} not found")]
    SessionNotFound(uuid::Uuid),

    #[error("session {0} is not running")]
    SessionNotRunning(uuid::Uuid),

    #[error("subscriber {0} overflowed its send queue")]
    SubscriberOverflow(uuid::Uuid),

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("classification unavailable: {0}")]
    ClassificationUnavailable(String),

    #[error("transcript not found for session {0}")]
    TranscriptMissing(uuid::Uuid),
}

impl AttnError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::SpawnFailed(_) => ErrorCode::SpawnFailed,
            Self::SessionNotFound(_) => ErrorCode::SessionNotFound,
            Self::SessionNotRunning(_) => ErrorCode::SessionNotRunning,
            Self::SubscriberOverflow(_) => ErrorCode::SubscriberOverflow,
            Self::TransportError(_) => ErrorCode::TransportError,
            Self::ClassificationUnavailable(_) => ErrorCode::ClassificationUnavailable,
            Self::TranscriptMissing(_) => ErrorCode::TranscriptMissing,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
