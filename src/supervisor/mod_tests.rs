use super::*;
use std::time::Duration;

fn hint(id: Uuid, state: SessionState, source: HintSource) -> Hint {
    Hint::new(id, state, source)
}

#[test]
fn hook_hint_is_always_accepted() {
    let id = Uuid::new_v4();
    let mut entry = SessionEntry::new(id, "claude".into());
    entry.state = SessionState::Working;
    let transition = entry.apply_hint(&hint(id, SessionState::WaitingInput, HintSource::Hook), None);
    assert_eq!(transition.unwrap().to, SessionState::WaitingInput);
}

#[test]
fn exited_is_terminal_and_overrides_everything() {
    let id = Uuid::new_v4();
    let mut entry = SessionEntry::new(id, "claude".into());
    entry.state = SessionState::Working;
    let exited = SessionState::Exited { status: crate::event::ExitStatus { code: Some(0), signal: None } };
    entry.apply_hint(&hint(id, exited.clone(), HintSource::Hook), None);
    assert!(entry.state.is_exited());

    let after = entry.apply_hint(&hint(id, SessionState::Working, HintSource::Hook), None);
    assert!(after.is_none());
    assert!(entry.state.is_exited());
}

#[test]
fn classifier_hint_only_applies_while_working() {
    let id = Uuid::new_v4();
    let mut entry = SessionEntry::new(id, "claude".into());
    entry.state = SessionState::PendingApproval;
    let result = entry.apply_hint(&hint(id, SessionState::Idle, HintSource::Classifier), None);
    assert!(result.is_none());
    assert_eq!(entry.state, SessionState::PendingApproval);
}

#[test]
fn classifier_hint_rejected_when_a_newer_hint_arrived_since_launch() {
    let id = Uuid::new_v4();
    let mut entry = SessionEntry::new(id, "claude".into());
    entry.state = SessionState::Working;
    let launch_counter = entry.begin_classify();

    entry.apply_hint(&hint(id, SessionState::WaitingInput, HintSource::Hook), None);
    assert_eq!(entry.state, SessionState::WaitingInput);

    entry.state = SessionState::Working;
    let result = entry.apply_hint(&hint(id, SessionState::Idle, HintSource::Classifier), Some(launch_counter));
    assert!(result.is_none());
}

#[test]
fn classifier_hint_accepted_when_counter_unchanged() {
    let id = Uuid::new_v4();
    let mut entry = SessionEntry::new(id, "claude".into());
    entry.state = SessionState::Working;
    let launch_counter = entry.begin_classify();
    let result = entry.apply_hint(&hint(id, SessionState::Idle, HintSource::Classifier), Some(launch_counter));
    assert_eq!(result.unwrap().to, SessionState::Idle);
}

#[test]
fn pending_approval_to_idle_direct_classifier_transition_is_disallowed_by_state_guard() {
    let id = Uuid::new_v4();
    let mut entry = SessionEntry::new(id, "copilot".into());
    entry.state = SessionState::PendingApproval;
    let launch_counter = entry.begin_classify();
    let result = entry.apply_hint(&hint(id, SessionState::Idle, HintSource::Classifier), Some(launch_counter));
    assert!(result.is_none());
}

#[test]
fn detector_working_hint_never_clears_pending_approval() {
    let id = Uuid::new_v4();
    let mut entry = SessionEntry::new(id, "codex".into());
    entry.state = SessionState::PendingApproval;
    let result = entry.apply_hint(&hint(id, SessionState::Working, HintSource::Detector), None);
    assert!(result.is_none());
    assert_eq!(entry.state, SessionState::PendingApproval);
}

#[test]
fn detector_non_working_hint_still_applies_during_pending_approval() {
    let id = Uuid::new_v4();
    let mut entry = SessionEntry::new(id, "codex".into());
    entry.state = SessionState::PendingApproval;
    let result = entry.apply_hint(&hint(id, SessionState::Idle, HintSource::Detector), None);
    assert_eq!(result.unwrap().to, SessionState::Idle);
}

#[test]
fn hook_and_transcript_hints_can_still_clear_pending_approval() {
    let id = Uuid::new_v4();
    let mut entry = SessionEntry::new(id, "codex".into());
    entry.state = SessionState::PendingApproval;
    let result = entry.apply_hint(&hint(id, SessionState::Working, HintSource::Transcript), None);
    assert_eq!(result.unwrap().to, SessionState::Working);

    entry.state = SessionState::PendingApproval;
    let result = entry.apply_hint(&hint(id, SessionState::Working, HintSource::Hook), None);
    assert_eq!(result.unwrap().to, SessionState::Working);
}

#[test]
fn should_classify_true_only_when_working_and_quiet_window_elapsed() {
    let id = Uuid::new_v4();
    let mut entry = SessionEntry::new(id, "claude".into());
    entry.state = SessionState::Working;
    entry.quiet_since = Instant::now() - Duration::from_secs(5);
    assert!(entry.should_classify(Duration::from_millis(1200), Instant::now()));

    entry.quiet_since = Instant::now();
    assert!(!entry.should_classify(Duration::from_millis(1200), Instant::now()));
}

#[test]
fn should_classify_false_while_a_classify_is_already_in_flight() {
    let id = Uuid::new_v4();
    let mut entry = SessionEntry::new(id, "claude".into());
    entry.state = SessionState::Working;
    entry.quiet_since = Instant::now() - Duration::from_secs(5);
    entry.begin_classify();
    assert!(!entry.should_classify(Duration::from_millis(1200), Instant::now()));
}

#[tokio::test]
async fn supervisor_apply_hint_updates_session_state() {
    let supervisor = Supervisor::new();
    let id = Uuid::new_v4();
    supervisor.insert(SessionEntry::new(id, "claude".into())).await;

    let transition = supervisor.apply_hint(hint(id, SessionState::Working, HintSource::Hook), None).await;
    assert_eq!(transition.unwrap().to, SessionState::Working);
    assert_eq!(supervisor.state_of(id).await, Some(SessionState::Working));
}

#[tokio::test]
async fn supervisor_apply_hint_ignores_unknown_session() {
    let supervisor = Supervisor::new();
    let id = Uuid::new_v4();
    let transition = supervisor.apply_hint(hint(id, SessionState::Working, HintSource::Hook), None).await;
    assert!(transition.is_none());
}

#[tokio::test]
async fn supervisor_recover_restores_sessions_in_launching_with_known_driver() {
    crate::driver::register_defaults();
    let supervisor = Supervisor::new();
    let mut registry = Registry::default();
    let id = Uuid::new_v4();
    registry.upsert(RegistryEntry {
        id,
        agent: "claude".into(),
        cwd: "/tmp".into(),
        label: "demo".into(),
        resume_id: None,
        started_at_epoch_ms: 0,
        transcript_path: None,
        last_known_state: SessionState::Working,
    });

    let pruned = supervisor.recover(&registry, crate::driver::lookup).await;
    assert!(pruned.is_empty());
    assert_eq!(supervisor.state_of(id).await, Some(SessionState::Launching));
}

#[tokio::test]
async fn supervisor_recover_prunes_sessions_with_unregistered_agent() {
    let supervisor = Supervisor::new();
    let mut registry = Registry::default();
    let id = Uuid::new_v4();
    registry.upsert(RegistryEntry {
        id,
        agent: "no-such-agent".into(),
        cwd: "/tmp".into(),
        label: "demo".into(),
        resume_id: None,
        started_at_epoch_ms: 0,
        transcript_path: None,
        last_known_state: SessionState::Working,
    });

    let pruned = supervisor.recover(&registry, crate::driver::lookup).await;
    assert_eq!(pruned, vec![id]);
    assert_eq!(supervisor.state_of(id).await, None);
}
