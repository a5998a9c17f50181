// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session runtime (SPEC_FULL.md §4.2, §5): owns the PTY backend, ring
//! buffer, screen, and the Tier-3/Tier-4 composite detector for one agent
//! session, and multiplexes them onto the Supervisor through one select
//! loop.
//!
//! Grounded on `crates/cli/src/session/run.rs`'s `Session` struct and
//! `run()` select loop: the output/input/detector arms are carried over
//! near-verbatim; the switch-credential and drain-on-shutdown machinery
//! (this system has no equivalent of agent switching) is dropped, and a
//! transcript-watcher task with a quiet-window classify tick is added in
//! its place.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use bytes::Bytes;
use nix::sys::signal::Signal;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::classifier::{NullClassifier, SubprocessClassifier};
use crate::config::Config;
use crate::detector::OutputDetectorTask;
use crate::driver::{
    ClassifierProvider, ClassifierVerdict, CompositeDetector, DetectedState, Driver, ProcessMonitor, SpawnOptions,
    TranscriptWatcherBehavior,
};
use crate::error::AttnError;
use crate::event::{ExitStatus, InputEvent, OutputEvent, StateChangeEvent};
use crate::pty::spawn::{capture_login_shell_env, NativePty};
use crate::pty::{Backend, BackendInput};
use crate::ring::RingBuffer;
use crate::screen::Screen;
use crate::supervisor::{Hint, HintSource, SessionEntry, SessionState, Supervisor, Transition};
use crate::transcript::{
    locate_with_backoff, ExtractError, Extraction, ExtractRequest, TranscriptEmission, TranscriptWatcher,
};

/// How many trailing characters of the last assistant turn are handed to
/// the classifier (spec §4.5).
const CLASSIFY_CHAR_LIMIT: usize = 4000;

/// A session's screen is redrawn to subscribers on this cadence rather than
/// on every PTY chunk, the same debounce purpose as `crates/cli/src/
/// session/run.rs`'s `screen_debounce` interval.
const SCREEN_DEBOUNCE: Duration = Duration::from_millis(50);

/// Parameters for spawning a new session (UI `spawn_session` command, spec §6).
pub struct SpawnParams {
    pub id: Uuid,
    pub agent: String,
    pub label: String,
    pub cwd: PathBuf,
    pub resume_id: Option<String>,
    pub resume_picker: bool,
    pub fork: bool,
    pub cols: u16,
    pub rows: u16,
}

/// Live handle to a running session, held by the transport layer.
pub struct SessionHandle {
    pub id: Uuid,
    pub agent: String,
    pub label: String,
    pub cwd: PathBuf,
    pub input_tx: mpsc::Sender<InputEvent>,
    pub ring: Arc<RwLock<RingBuffer>>,
    pub screen: Arc<RwLock<Screen>>,
    pub output_tx: broadcast::Sender<OutputEvent>,
    pub state_tx: broadcast::Sender<StateChangeEvent>,
    pub state_seq: Arc<AtomicU64>,
    pub shutdown: CancellationToken,
    pub join: JoinHandle<()>,
}

/// Spawn a new session: resolve the driver, fork a PTY child, and start
/// every background task that feeds the Supervisor. Returns once the child
/// has been forked; `handle.join` resolves when the session loop exits.
pub async fn spawn_session(
    config: Arc<Config>,
    supervisor: Arc<Supervisor>,
    params: SpawnParams,
) -> Result<SessionHandle, AttnError> {
    let driver = crate::driver::lookup(&params.agent)
        .ok_or_else(|| AttnError::SpawnFailed(format!("unknown agent {}", params.agent)))?;

    let opts = SpawnOptions {
        session_id: params.id,
        cwd: &params.cwd,
        cols: params.cols,
        rows: params.rows,
        resume_id: params.resume_id.as_deref(),
        resume_picker: params.resume_picker,
        fork: params.fork,
    };

    if let Some(preparer) = driver.as_launch_preparer() {
        preparer.prepare(&opts).map_err(|err| AttnError::SpawnFailed(err.to_string()))?;
    }

    let mut plan = driver.build_spawn(&opts).map_err(|err| AttnError::SpawnFailed(err.to_string()))?;

    if let Some(hooks) = driver.as_hook_provider() {
        let hook_socket = config.effective_hook_socket();
        let doc = hooks.generate_hook_config(&hook_socket, params.id);
        if let Err(err) = hooks.write_hook_config(&params.cwd, &doc) {
            tracing::warn!(%err, session_id = %params.id, "failed to write hook config");
        }
        plan.env.push(("ATTN_SESSION_ID".to_string(), params.id.to_string()));
        plan.env.push(("ATTN_HOOK_SOCKET".to_string(), hook_socket.display().to_string()));
    }

    // Login-shell env capture (spec §4.2 step 1) runs before the driver's
    // own overrides (hook socket, session id) so the latter always win.
    let mut full_env = capture_login_shell_env(config.shell_env_timeout()).await;
    full_env.extend(plan.env.iter().cloned());

    let mut backend = NativePty::spawn(&plan.argv, params.cols, params.rows, &params.cwd, &full_env, config.kill_grace())
        .map_err(|err| AttnError::SpawnFailed(err.to_string()))?;
    let child_pid = backend.child_pid();
    let started_at = SystemTime::now();

    supervisor.insert(SessionEntry::new(params.id, params.agent.clone())).await;

    let ring = Arc::new(RwLock::new(RingBuffer::new(config.ring_size)));
    let screen = Arc::new(RwLock::new(Screen::new(params.cols, params.rows)));
    let (output_tx, _) = broadcast::channel(1024);
    let (state_tx, _) = broadcast::channel::<StateChangeEvent>(256);
    let state_seq = Arc::new(AtomicU64::new(0));

    let (backend_output_tx, backend_output_rx) = mpsc::channel::<Bytes>(256);
    let (backend_input_tx, backend_input_rx) = mpsc::channel::<BackendInput>(64);
    let (resize_tx, resize_rx) = mpsc::channel::<(u16, u16)>(4);
    let (signal_tx, signal_rx) = mpsc::channel::<Signal>(4);
    let (input_tx, input_rx) = mpsc::channel::<InputEvent>(64);

    let shutdown = CancellationToken::new();

    let backend_shutdown = shutdown.clone();
    let backend_handle: JoinHandle<anyhow::Result<ExitStatus>> = tokio::spawn(async move {
        backend.run(backend_output_tx, backend_input_rx, resize_rx, signal_rx, backend_shutdown).await
    });

    let ring_total_written = Arc::new(AtomicU64::new(0));
    let (detector_feed_tx, detector_feed_rx) = mpsc::channel::<Bytes>(256);
    let output_detector = OutputDetectorTask::new(Duration::from_secs(30), detector_feed_rx);
    let process_monitor = {
        let ring_total_written = Arc::clone(&ring_total_written);
        ProcessMonitor::new(Arc::new(move || child_pid), Arc::new(move || ring_total_written.load(Ordering::Relaxed)))
    };
    let composite = CompositeDetector { tiers: vec![Box::new(output_detector), Box::new(process_monitor)] };
    let (detector_tx, detector_rx) = mpsc::channel::<DetectedState>(32);
    tokio::spawn(composite.run(detector_tx, shutdown.clone()));

    spawn_transcript_task(
        Arc::clone(&config),
        Arc::clone(&supervisor),
        driver,
        params.id,
        params.cwd.clone(),
        started_at,
        shutdown.clone(),
        state_tx.clone(),
        Arc::clone(&state_seq),
    );

    let session = Session {
        id: params.id,
        driver,
        supervisor: Arc::clone(&supervisor),
        ring: Arc::clone(&ring),
        screen: Arc::clone(&screen),
        ring_total_written,
        output_tx: output_tx.clone(),
        state_tx: state_tx.clone(),
        state_seq: Arc::clone(&state_seq),
        backend_output_rx,
        backend_input_tx,
        resize_tx,
        signal_tx,
        detector_feed_tx,
        detector_rx,
        input_rx,
        shutdown: shutdown.clone(),
        backend_handle,
    };

    let join = tokio::spawn(session.run());

    Ok(SessionHandle {
        id: params.id,
        agent: params.agent,
        label: params.label,
        cwd: params.cwd,
        input_tx,
        ring,
        screen,
        output_tx,
        state_tx,
        state_seq,
        shutdown,
        join,
    })
}

/// The select-loop multiplexer for one session: backend output, consumer
/// input, detector state, and a periodic screen repaint.
struct Session {
    id: Uuid,
    driver: &'static dyn Driver,
    supervisor: Arc<Supervisor>,
    ring: Arc<RwLock<RingBuffer>>,
    screen: Arc<RwLock<Screen>>,
    ring_total_written: Arc<AtomicU64>,
    output_tx: broadcast::Sender<OutputEvent>,
    state_tx: broadcast::Sender<StateChangeEvent>,
    state_seq: Arc<AtomicU64>,
    backend_output_rx: mpsc::Receiver<Bytes>,
    backend_input_tx: mpsc::Sender<BackendInput>,
    resize_tx: mpsc::Sender<(u16, u16)>,
    signal_tx: mpsc::Sender<Signal>,
    detector_feed_tx: mpsc::Sender<Bytes>,
    detector_rx: mpsc::Receiver<DetectedState>,
    input_rx: mpsc::Receiver<InputEvent>,
    shutdown: CancellationToken,
    backend_handle: JoinHandle<anyhow::Result<ExitStatus>>,
}

impl Session {
    async fn run(mut self) {
        let mut seq: u64 = 0;
        let mut screen_debounce = tokio::time::interval(SCREEN_DEBOUNCE);

        loop {
            tokio::select! {
                data = self.backend_output_rx.recv() => {
                    match data {
                        Some(chunk) => {
                            seq += 1;
                            {
                                let mut ring = self.ring.write().await;
                                ring.write(&chunk);
                                self.ring_total_written.store(ring.total_written(), Ordering::Relaxed);
                            }
                            {
                                let mut screen = self.screen.write().await;
                                screen.feed(&chunk);
                            }
                            let _ = self.output_tx.send(OutputEvent::Raw { data: chunk.clone(), seq });
                            let _ = self.detector_feed_tx.send(chunk).await;
                        }
                        None => break,
                    }
                }

                event = self.input_rx.recv() => {
                    match event {
                        Some(InputEvent::Write(data)) => {
                            if self.backend_input_tx.send(BackendInput::Write(data)).await.is_err() {
                                break;
                            }
                        }
                        Some(InputEvent::Resize { cols, rows }) => {
                            self.screen.write().await.resize(cols, rows);
                            let _ = self.resize_tx.try_send((cols, rows));
                        }
                        Some(InputEvent::Signal(sig)) => {
                            let _ = self.signal_tx.try_send(sig.to_nix());
                        }
                        None => break,
                    }
                }

                detected = self.detector_rx.recv() => {
                    let Some(detected) = detected else { continue };
                    if !self.admit(&detected).await {
                        continue;
                    }
                    let hint = Hint::new(self.id, detected.state, HintSource::Detector).with_evidence(detected.cause);
                    let transition = self.supervisor.apply_hint(hint, None).await;
                    self.publish_transition(transition);
                }

                _ = screen_debounce.tick() => {
                    let mut screen = self.screen.write().await;
                    if screen.changed() {
                        let seq = screen.seq();
                        screen.clear_changed();
                        drop(screen);
                        let _ = self.output_tx.send(OutputEvent::ScreenUpdate { seq });
                    }
                }

                _ = self.shutdown.cancelled() => break,
            }
        }

        let status = match (&mut self.backend_handle).await {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => {
                tracing::warn!(%err, session_id = %self.id, "backend task failed");
                ExitStatus { code: Some(1), signal: None }
            }
            Err(err) => {
                tracing::warn!(%err, session_id = %self.id, "backend task panicked");
                ExitStatus { code: Some(1), signal: None }
            }
        };

        let hint = Hint::new(self.id, SessionState::Exited { status }, HintSource::Runtime);
        let transition = self.supervisor.apply_hint(hint, None).await;
        self.publish_transition(transition);
        self.shutdown.cancel();
    }

    /// Gate a detector emission through the driver's `PtyStatePolicy`, if it
    /// declares one (spec §4.3). Drivers without an opinion admit everything.
    async fn admit(&self, detected: &DetectedState) -> bool {
        let Some(policy) = self.driver.as_pty_state_policy() else { return true };
        let current = self.supervisor.state_of(self.id).await.unwrap_or(SessionState::Launching);
        policy.admit(&current, &(detected.state.clone(), detected.cause.clone(), Some(detected.tier)))
    }

    /// Broadcast an applied transition to UI subscribers (spec §6 `session_state`).
    fn publish_transition(&self, transition: Option<Transition>) {
        publish_transition(&self.state_tx, &self.state_seq, transition);
    }
}

/// Stamp a transition with the session's monotonic sequence counter and
/// broadcast it. Shared by the session loop and the transcript/classifier
/// task, which both apply hints against the same Supervisor entry.
pub(crate) fn publish_transition(
    state_tx: &broadcast::Sender<StateChangeEvent>,
    state_seq: &AtomicU64,
    transition: Option<Transition>,
) {
    let Some(transition) = transition else { return };
    let seq = state_seq.fetch_add(1, Ordering::Relaxed) + 1;
    let _ = state_tx.send(StateChangeEvent {
        prev: transition.from,
        next: transition.to,
        seq,
        reason: transition.reason,
    });
}

/// Locate the transcript once it appears, tail it for state proposals, and
/// periodically run the quiet-window classifier against the last assistant
/// turn (spec §4.4, §4.5). A no-op for drivers without transcript support.
#[allow(clippy::too_many_arguments)]
fn spawn_transcript_task(
    config: Arc<Config>,
    supervisor: Arc<Supervisor>,
    driver: &'static dyn Driver,
    session_id: Uuid,
    cwd: PathBuf,
    started_at: SystemTime,
    shutdown: CancellationToken,
    state_tx: broadcast::Sender<StateChangeEvent>,
    state_seq: Arc<AtomicU64>,
) {
    if !driver.capabilities().transcript {
        return;
    }
    let (Some(finder), Some(behavior)) = (driver.as_transcript_finder(), driver.as_transcript_watcher_behavior())
    else {
        return;
    };

    tokio::spawn(async move {
        let found = locate_with_backoff(|| finder.find(session_id, &cwd, started_at), &shutdown).await;
        let Some(path) = found else { return };

        let watcher = TranscriptWatcher::bootstrap(path.clone(), finder.bootstrap_bytes());
        let (emit_tx, mut emit_rx) = mpsc::channel::<TranscriptEmission>(64);
        let (extract_tx, extract_rx) = mpsc::channel::<ExtractRequest>(4);
        let watcher_task = tokio::spawn(watcher.run(behavior, emit_tx, extract_rx, shutdown.clone()));

        let classifier: Box<dyn ClassifierProvider> = match &config.classifier_cmd {
            Some(cmd) => Box::new(SubprocessClassifier::new(cmd.clone())),
            None => Box::new(NullClassifier),
        };

        let mut quiet_poll = tokio::time::interval(config.quiet_window());
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                emission = emit_rx.recv() => {
                    let Some(emission) = emission else { break };
                    if let TranscriptEmission::State { state, cause } = emission {
                        let hint = Hint::new(session_id, state, HintSource::Transcript).with_evidence(cause);
                        let transition = supervisor.apply_hint(hint, None).await;
                        publish_transition(&state_tx, &state_seq, transition);
                    }
                }
                _ = quiet_poll.tick() => {
                    let transition =
                        run_quiet_classify(&config, &supervisor, behavior, classifier.as_ref(), session_id, &extract_tx).await;
                    publish_transition(&state_tx, &state_seq, transition);
                }
            }
        }
        let _ = watcher_task.await;
    });
}

/// One quiet-window classify attempt: skip if not due, skip if the driver's
/// hook-freshness window says recent hook traffic already covers it,
/// otherwise ask the transcript watcher for the last assistant turn and
/// classify it. Extraction is routed through the watcher task (rather than
/// re-read from disk here) so a quiet-window classify shares the same
/// `last_classified_turn_id` dedup the line-by-line tail already applies —
/// without this, a turn already classified `unknown` would be resubmitted
/// every tick instead of waiting for a new one.
async fn run_quiet_classify(
    config: &Config,
    supervisor: &Supervisor,
    behavior: &dyn TranscriptWatcherBehavior,
    classifier: &dyn ClassifierProvider,
    session_id: Uuid,
    extract_tx: &mpsc::Sender<ExtractRequest>,
) -> Option<Transition> {
    if !supervisor.should_classify(session_id, config.quiet_window()).await {
        return None;
    }

    let current = supervisor.state_of(session_id).await.unwrap_or(SessionState::Working);
    let last_seen = supervisor.quiet_since(session_id).await.unwrap_or_else(Instant::now);
    let (skip, cause) = behavior.skip_classification(&current, last_seen, Instant::now());
    if skip {
        tracing::debug!(session_id = %session_id, cause, "quiet-window classification skipped");
        return None;
    }

    let (reply_tx, reply_rx) = oneshot::channel();
    if extract_tx.send((CLASSIFY_CHAR_LIMIT, reply_tx)).await.is_err() {
        return None;
    }
    let extraction = match reply_rx.await {
        Ok(Ok(extraction)) => extraction,
        Ok(Err(ExtractError::NoNewTurn)) => return None,
        Err(_) => return None,
    };

    let launch_counter = supervisor.begin_classify(session_id).await;
    let verdict = classifier.classify(&extraction.text, config.classifier_timeout()).await;
    supervisor.finish_classify(session_id).await;

    let state = verdict_to_state(verdict)?;
    let hint = Hint::new(session_id, state, HintSource::Classifier);
    supervisor.apply_hint(hint, launch_counter).await
}

fn verdict_to_state(verdict: ClassifierVerdict) -> Option<SessionState> {
    match verdict {
        ClassifierVerdict::WaitingInput => Some(SessionState::WaitingInput),
        ClassifierVerdict::Idle => Some(SessionState::Idle),
        ClassifierVerdict::Unknown => None,
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
