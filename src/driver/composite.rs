// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::supervisor::state::SessionState;

/// A state detection source that monitors PTY output and emits
/// [`SessionState`] proposals (spec §4.3). Object-safe for `Box<dyn Detector>`.
pub trait Detector: Send + 'static {
    fn run(
        self: Box<Self>,
        state_tx: mpsc::Sender<(SessionState, String)>,
        shutdown: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>>;

    fn tier(&self) -> u8;
}

/// A state emission from the composite detector, including the tier that
/// produced it.
#[derive(Debug, Clone)]
pub struct DetectedState {
    pub state: SessionState,
    pub tier: u8,
    pub cause: String,
}

/// Combines multiple [`Detector`] tiers into a unified session-state stream.
///
/// Tier resolution rules (spec §4.3, §4.7):
/// - Lower tier number = higher confidence.
/// - States from equal-or-higher confidence tiers are accepted immediately.
/// - Lower confidence tiers may only *escalate* state priority; downgrades
///   are silently rejected.
/// - Duplicate states (prev == next) are suppressed.
pub struct CompositeDetector {
    pub tiers: Vec<Box<dyn Detector>>,
}

impl CompositeDetector {
    pub async fn run(mut self, output_tx: mpsc::Sender<DetectedState>, shutdown: CancellationToken) {
        let (tag_tx, mut tag_rx) = mpsc::channel::<(u8, SessionState, String)>(64);

        for detector in self.tiers.drain(..) {
            let tier = detector.tier();
            let inner_tx = tag_tx.clone();
            let sd = shutdown.clone();
            let (det_tx, mut det_rx) = mpsc::channel::<(SessionState, String)>(16);

            tokio::spawn(detector.run(det_tx, sd));
            tokio::spawn(async move {
                while let Some((state, cause)) = det_rx.recv().await {
                    if inner_tx.send((tier, state, cause)).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(tag_tx);

        let mut current_state = SessionState::Launching;
        let mut current_tier: u8 = u8::MAX;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                tagged = tag_rx.recv() => {
                    let Some((tier, new_state, cause)) = tagged else { break };

                    if new_state.is_exited() {
                        current_state = new_state.clone();
                        current_tier = tier;
                        let _ = output_tx.send(DetectedState { state: new_state, tier, cause }).await;
                        continue;
                    }

                    if new_state == current_state {
                        if tier < current_tier {
                            current_tier = tier;
                        }
                        continue;
                    }

                    if tier <= current_tier {
                        current_state = new_state.clone();
                        current_tier = tier;
                        let _ = output_tx.send(DetectedState { state: new_state, tier, cause }).await;
                    } else if new_state.priority() > current_state.priority() {
                        current_state = new_state.clone();
                        current_tier = tier;
                        let _ = output_tx.send(DetectedState { state: new_state, tier, cause }).await;
                    } else {
                        debug!(
                            tier,
                            new = new_state.as_str(),
                            current = current_state.as_str(),
                            "rejected state downgrade from lower confidence tier"
                        );
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for CompositeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeDetector").field("tiers", &self.tiers.len()).finish()
    }
}

#[cfg(test)]
#[path = "composite_tests.rs"]
mod tests;
