use super::*;
use crate::driver::PtyStatePolicy;

struct RejectEscalations;

impl PtyStatePolicy for RejectEscalations {
    fn admit(&self, current: &SessionState, _emission: &crate::detector::DetectorEmission) -> bool {
        !matches!(current, SessionState::PendingApproval)
    }
}

#[test]
fn verdict_to_state_maps_waiting_input_and_idle() {
    assert_eq!(verdict_to_state(ClassifierVerdict::WaitingInput), Some(SessionState::WaitingInput));
    assert_eq!(verdict_to_state(ClassifierVerdict::Idle), Some(SessionState::Idle));
    assert_eq!(verdict_to_state(ClassifierVerdict::Unknown), None);
}

struct AlwaysIdle;

impl ClassifierProvider for AlwaysIdle {
    fn classify<'a>(
        &'a self,
        _text: &'a str,
        _timeout: Duration,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ClassifierVerdict> + Send + 'a>> {
        Box::pin(async { ClassifierVerdict::Idle })
    }
}

struct NeverClassifies;

impl crate::driver::TranscriptWatcherBehavior for NeverClassifies {
    fn handle_line(
        &self,
        _line: &serde_json::Value,
        _now: Instant,
        _current_state: &SessionState,
    ) -> crate::driver::LineOutcome {
        crate::driver::LineOutcome::default()
    }

    fn handle_assistant_message(&self, _now: Instant) {}

    fn tick(&self, _now: Instant, _current_state: &SessionState) -> crate::driver::TickOutcome {
        crate::driver::TickOutcome::default()
    }
}

async fn make_working_session(quiet_window_ms: u64) -> (Config, Arc<Supervisor>, Uuid) {
    let mut config = test_config();
    config.quiet_window_ms = quiet_window_ms;
    let supervisor = Arc::new(Supervisor::new());
    let id = Uuid::new_v4();
    supervisor.insert(SessionEntry::new(id, "claude".to_string())).await;
    let hint = Hint::new(id, SessionState::Working, HintSource::Hook);
    supervisor.apply_hint(hint, None).await;
    (config, supervisor, id)
}

#[tokio::test]
async fn run_quiet_classify_routes_extraction_through_watcher_channel() {
    let (config, supervisor, id) = make_working_session(0).await;
    let behavior = NeverClassifies;
    let classifier = AlwaysIdle;
    let (extract_tx, mut extract_rx) = mpsc::channel::<ExtractRequest>(1);

    let responder = tokio::spawn(async move {
        let (char_limit, reply) = extract_rx.recv().await.expect("extraction request");
        assert_eq!(char_limit, CLASSIFY_CHAR_LIMIT);
        let _ = reply.send(Ok(Extraction { text: "all done".to_string(), turn_id: Some("t1".to_string()) }));
    });

    tokio::time::sleep(Duration::from_millis(5)).await;
    let transition = run_quiet_classify(&config, &supervisor, &behavior, &classifier, id, &extract_tx).await;
    responder.await.unwrap();

    assert_eq!(transition.map(|t| t.to), Some(SessionState::Idle));
}

#[tokio::test]
async fn run_quiet_classify_skips_when_watcher_reports_no_new_turn() {
    let (config, supervisor, id) = make_working_session(0).await;
    let behavior = NeverClassifies;
    let classifier = AlwaysIdle;
    let (extract_tx, mut extract_rx) = mpsc::channel::<ExtractRequest>(1);

    let responder = tokio::spawn(async move {
        let (_char_limit, reply) = extract_rx.recv().await.expect("extraction request");
        let _ = reply.send(Err(ExtractError::NoNewTurn));
    });

    tokio::time::sleep(Duration::from_millis(5)).await;
    let transition = run_quiet_classify(&config, &supervisor, &behavior, &classifier, id, &extract_tx).await;
    responder.await.unwrap();

    assert!(transition.is_none());
}

fn test_config() -> Config {
    Config {
        port: Some(0),
        socket: None,
        host: "127.0.0.1".to_string(),
        hook_socket: None,
        ring_size: 1024,
        cols: 80,
        rows: 24,
        quiet_window_ms: 1200,
        classifier_timeout_ms: 3000,
        classifier_cmd: None,
        watcher_poll_ms: 1000,
        subscriber_write_ms: 2000,
        kill_grace_secs: 10,
        shell_env_timeout_ms: 2000,
        exit_grace_secs: 300,
        log_format: "json".to_string(),
        log_level: "info".to_string(),
        registry_path: None,
    }
}

#[tokio::test]
async fn spawn_session_rejects_unknown_agent() {
    let config = Arc::new(test_config());
    let supervisor = Arc::new(Supervisor::new());
    let params = SpawnParams {
        id: Uuid::new_v4(),
        agent: "not-a-real-agent".to_string(),
        label: "test".to_string(),
        cwd: std::env::temp_dir(),
        resume_id: None,
        resume_picker: false,
        fork: false,
        cols: 80,
        rows: 24,
    };

    let err = spawn_session(config, supervisor, params).await.expect_err("unknown agent must fail");
    assert_eq!(err.code(), crate::error::ErrorCode::SpawnFailed);
}

#[tokio::test]
async fn admit_defers_to_driver_policy_using_live_supervisor_state() {
    let supervisor = Arc::new(Supervisor::new());
    let id = Uuid::new_v4();
    supervisor.insert(SessionEntry::new(id, "claude".to_string())).await;

    let hint = Hint::new(id, SessionState::PendingApproval, HintSource::Hook);
    supervisor.apply_hint(hint, None).await;

    let policy = RejectEscalations;
    let current = supervisor.state_of(id).await.unwrap_or(SessionState::Launching);
    assert_eq!(current, SessionState::PendingApproval);

    let emission = (SessionState::Working, "heuristic".to_string(), Some(3));
    assert!(!policy.admit(&current, &emission));
}

#[tokio::test]
async fn publish_transition_broadcasts_with_increasing_sequence() {
    let (state_tx, mut state_rx) = broadcast::channel::<StateChangeEvent>(8);
    let state_seq = AtomicU64::new(0);

    publish_transition(
        &state_tx,
        &state_seq,
        Some(Transition { from: SessionState::Launching, to: SessionState::Working, reason: None }),
    );
    publish_transition(
        &state_tx,
        &state_seq,
        Some(Transition {
            from: SessionState::Working,
            to: SessionState::WaitingInput,
            reason: Some("prompt detected".to_string()),
        }),
    );

    let first = state_rx.recv().await.expect("first event");
    assert_eq!(first.prev, SessionState::Launching);
    assert_eq!(first.next, SessionState::Working);
    assert_eq!(first.seq, 1);

    let second = state_rx.recv().await.expect("second event");
    assert_eq!(second.prev, SessionState::Working);
    assert_eq!(second.next, SessionState::WaitingInput);
    assert_eq!(second.reason.as_deref(), Some("prompt detected"));
    assert_eq!(second.seq, 2);
}

#[tokio::test]
async fn publish_transition_is_a_noop_for_unchanged_state() {
    let (state_tx, mut state_rx) = broadcast::channel::<StateChangeEvent>(8);
    let state_seq = AtomicU64::new(0);

    publish_transition(&state_tx, &state_seq, None);

    assert!(state_rx.try_recv().is_err());
    assert_eq!(state_seq.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn quiet_since_reflects_last_hook_hint_not_launch_time() {
    let supervisor = Arc::new(Supervisor::new());
    let id = Uuid::new_v4();
    supervisor.insert(SessionEntry::new(id, "claude".to_string())).await;
    let launch_quiet_since = supervisor.quiet_since(id).await.expect("entry exists");

    std::thread::sleep(std::time::Duration::from_millis(5));
    let hint = Hint::new(id, SessionState::Working, HintSource::Hook);
    supervisor.apply_hint(hint, None).await;

    let updated_quiet_since = supervisor.quiet_since(id).await.expect("entry exists");
    assert!(updated_quiet_since > launch_quiet_since);
}
