// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent output state detectors: pure functions of a cleaned PTY byte
//! stream that propose a [`SessionState`] (SPEC_FULL.md §4.3).

mod ansi;
mod heuristics;

pub use ansi::strip_ansi;
pub use heuristics::{classify_tail, Classification};

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::driver::composite::Detector;
use crate::supervisor::state::SessionState;

/// Bounded tail of cleaned text a detector looks at — the spec calls for
/// roughly the last 2000 characters.
const TAIL_CAPACITY: usize = 2000;

/// Emission from a detector: proposed state, human-readable cause, and an
/// optional tier override for high-confidence signals.
pub type DetectorEmission = (SessionState, String, Option<u8>);

/// Stateful wrapper around [`classify_tail`] that maintains the bounded tail
/// across chunks and rate-limits repeated `working` pulses (spec §4.3
/// pulse/heartbeat rule).
pub struct OutputDetector {
    tail: String,
    last_classification: Option<Classification>,
    last_pulse_at: Option<Instant>,
    pulse_interval: Duration,
}

impl OutputDetector {
    pub fn new(pulse_interval: Duration) -> Self {
        Self { tail: String::new(), last_classification: None, last_pulse_at: None, pulse_interval }
    }

    /// Feed a chunk of raw PTY bytes (already boundary-aligned by the
    /// runtime). Returns a new emission only when the inferred state
    /// changes, or for a rate-limited `working` pulse.
    pub fn feed(&mut self, data: &[u8]) -> Option<DetectorEmission> {
        let cleaned = strip_ansi(&String::from_utf8_lossy(data));
        self.tail.push_str(&cleaned);
        if self.tail.len() > TAIL_CAPACITY {
            let excess = self.tail.len() - TAIL_CAPACITY;
            let cut = self.tail.char_indices().find(|(i, _)| *i >= excess).map(|(i, _)| i).unwrap_or(0);
            self.tail.drain(..cut);
        }

        let classification = classify_tail(&self.tail);
        let state = classification.state();

        let is_repeat = self.last_classification.as_ref() == Some(&classification);
        if is_repeat {
            if matches!(classification, Classification::Working) {
                let now = Instant::now();
                let due = self.last_pulse_at.map(|t| now.duration_since(t) >= self.pulse_interval).unwrap_or(true);
                if due {
                    self.last_pulse_at = Some(now);
                    return Some((state, "detector:pulse".to_string(), None));
                }
            }
            return None;
        }

        self.last_classification = Some(classification.clone());
        if matches!(classification, Classification::Working) {
            self.last_pulse_at = Some(Instant::now());
        }
        Some((state, format!("detector:{}", classification.cause()), None))
    }
}

/// Tier 3 [`Detector`] adapter that drives an [`OutputDetector`] from a raw
/// PTY output stream. Grounded on `crates/cli/src/driver/stdout_detect.rs`'s
/// `StdoutDetector` (same tier, same owned-`mpsc::Receiver<Bytes>`-field
/// shape), swapped from stdout-JSONL classification to raw-byte heuristics.
pub struct OutputDetectorTask {
    detector: OutputDetector,
    output_rx: mpsc::Receiver<Bytes>,
}

impl OutputDetectorTask {
    pub fn new(pulse_interval: Duration, output_rx: mpsc::Receiver<Bytes>) -> Self {
        Self { detector: OutputDetector::new(pulse_interval), output_rx }
    }
}

impl Detector for OutputDetectorTask {
    fn run(
        mut self: Box<Self>,
        state_tx: mpsc::Sender<(SessionState, String)>,
        shutdown: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    chunk = self.output_rx.recv() => {
                        match chunk {
                            Some(data) => {
                                if let Some((state, cause, _tier_override)) = self.detector.feed(&data) {
                                    if state_tx.send((state, cause)).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
        })
    }

    fn tier(&self) -> u8 {
        3
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
