use super::*;
use serde_json::json;
use std::time::Instant;

#[test]
fn turn_started_reports_working() {
    let driver = CodexDriver::new();
    let outcome = driver.handle_line(&json!({"type": "turn.started"}), Instant::now(), &SessionState::Idle);
    assert_eq!(outcome.new_state, Some(SessionState::Working));
}

#[test]
fn turn_completed_with_zero_assistant_messages_reports_waiting_input() {
    let driver = CodexDriver::new();
    driver.handle_line(&json!({"type": "turn.started"}), Instant::now(), &SessionState::Idle);
    let outcome = driver.handle_line(&json!({"type": "turn.completed"}), Instant::now(), &SessionState::Working);
    assert_eq!(outcome.new_state, Some(SessionState::WaitingInput));
}

#[test]
fn turn_completed_with_assistant_messages_and_no_other_live_turns_reports_idle() {
    let driver = CodexDriver::new();
    driver.handle_line(&json!({"type": "turn.started"}), Instant::now(), &SessionState::Idle);
    driver.handle_line(&json!({"type": "assistant_message"}), Instant::now(), &SessionState::Working);
    driver.handle_assistant_message(Instant::now());
    let outcome = driver.handle_line(&json!({"type": "turn.completed"}), Instant::now(), &SessionState::Working);
    assert_eq!(outcome.new_state, Some(SessionState::Idle));
}

#[test]
fn turn_aborted_pushes_to_waiting_input_unless_already_waiting() {
    let driver = CodexDriver::new();
    driver.handle_line(&json!({"type": "turn.started"}), Instant::now(), &SessionState::Idle);
    let outcome = driver.handle_line(&json!({"type": "turn.aborted"}), Instant::now(), &SessionState::Working);
    assert_eq!(outcome.new_state, Some(SessionState::WaitingInput));

    let driver2 = CodexDriver::new();
    driver2.handle_line(&json!({"type": "turn.started"}), Instant::now(), &SessionState::Idle);
    let outcome2 =
        driver2.handle_line(&json!({"type": "turn.aborted"}), Instant::now(), &SessionState::WaitingInput);
    assert_eq!(outcome2.new_state, None);
}

#[test]
fn pending_tool_call_keeps_session_live() {
    let driver = CodexDriver::new();
    driver.handle_line(&json!({"type": "turn.started"}), Instant::now(), &SessionState::Idle);
    driver.handle_line(&json!({"type": "turn.completed"}), Instant::now(), &SessionState::Working);
    driver.handle_line(&json!({"type": "tool_call.started"}), Instant::now(), &SessionState::Idle);
    assert!(driver.is_live());
    driver.handle_line(&json!({"type": "tool_call.completed"}), Instant::now(), &SessionState::Working);
    assert!(!driver.is_live());
}

#[test]
fn find_returns_none_without_codex_sessions_dir() {
    let driver = CodexDriver::new();
    let dir = tempfile::tempdir().unwrap();
    let found = driver.find(uuid::Uuid::new_v4(), dir.path(), std::time::SystemTime::now());
    assert!(found.is_none());
}

#[test]
fn find_returns_latest_jsonl_in_sessions_dir() {
    let driver = CodexDriver::new();
    let dir = tempfile::tempdir().unwrap();
    let sessions = dir.path().join(".codex").join("sessions");
    std::fs::create_dir_all(&sessions).unwrap();
    std::fs::write(sessions.join("one.jsonl"), "{}\n").unwrap();
    let found = driver.find(uuid::Uuid::new_v4(), dir.path(), std::time::SystemTime::now());
    assert_eq!(found, Some(sessions.join("one.jsonl")));
}
