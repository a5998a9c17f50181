use super::*;
use serde_json::json;

#[test]
fn read_new_lines_parses_appended_jsonl_and_advances_offset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.jsonl");
    std::fs::write(&path, "{\"role\":\"user\",\"content\":\"hi\"}\n").unwrap();

    let mut watcher = TranscriptWatcher::new(path.clone());
    let lines = watcher.read_new_lines().unwrap();
    assert_eq!(lines.len(), 1);
    assert!(watcher.offset() > 0);

    let lines2 = watcher.read_new_lines().unwrap();
    assert!(lines2.is_empty());
}

#[test]
fn read_new_lines_resets_offset_on_truncation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.jsonl");
    std::fs::write(&path, "{\"role\":\"user\",\"content\":\"hello world this is long\"}\n").unwrap();

    let mut watcher = TranscriptWatcher::new(path.clone());
    watcher.read_new_lines().unwrap();
    assert!(watcher.offset() > 0);

    std::fs::write(&path, "{}\n").unwrap();
    let lines = watcher.read_new_lines().unwrap();
    assert_eq!(lines.len(), 1);
}

#[test]
fn read_new_lines_skips_malformed_json_without_failing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.jsonl");
    std::fs::write(&path, "not json\n{\"role\":\"assistant\",\"content\":\"ok\"}\n").unwrap();

    let mut watcher = TranscriptWatcher::new(path);
    let lines = watcher.read_new_lines().unwrap();
    assert_eq!(lines.len(), 1);
}

#[test]
fn bootstrap_seeks_to_tail_window() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.jsonl");
    let big_line = format!("{{\"role\":\"user\",\"content\":\"{}\"}}\n", "x".repeat(200));
    std::fs::write(&path, &big_line).unwrap();

    let watcher = TranscriptWatcher::bootstrap(path, 10);
    assert!(watcher.offset() > 0);
    assert!(watcher.offset() < big_line.len() as u64);
}

#[test]
fn extract_last_assistant_turn_finds_message_after_last_user() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.jsonl");
    let mut watcher = TranscriptWatcher::new(path);
    watcher.recent_lines.push_back(json!({"role": "user", "content": "question"}));
    watcher.recent_lines.push_back(json!({"role": "assistant", "content": "answer one"}));
    watcher.recent_lines.push_back(json!({"role": "assistant", "content": "answer two"}));

    let extraction = watcher.extract_last_assistant_turn(1000).unwrap();
    assert_eq!(extraction.text, "answer two");
}

#[test]
fn extract_last_assistant_turn_errors_when_no_assistant_message_follows_user() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.jsonl");
    let mut watcher = TranscriptWatcher::new(path);
    watcher.recent_lines.push_back(json!({"role": "user", "content": "question"}));

    let result = watcher.extract_last_assistant_turn(1000);
    assert_eq!(result, Err(ExtractError::NoNewTurn));
}

#[test]
fn extract_last_assistant_turn_dedups_by_turn_id() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.jsonl");
    let mut watcher = TranscriptWatcher::new(path);
    watcher.recent_lines.push_back(json!({"role": "assistant", "content": "hi", "turn_id": "t1"}));

    let first = watcher.extract_last_assistant_turn(1000).unwrap();
    assert_eq!(first.turn_id.as_deref(), Some("t1"));

    let second = watcher.extract_last_assistant_turn(1000);
    assert_eq!(second, Err(ExtractError::NoNewTurn));
}

#[test]
fn extract_last_assistant_turn_truncates_to_char_limit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.jsonl");
    let mut watcher = TranscriptWatcher::new(path);
    watcher.recent_lines.push_back(json!({"role": "assistant", "content": "abcdefghij"}));

    let extraction = watcher.extract_last_assistant_turn(4).unwrap();
    assert_eq!(extraction.text, "abcd");
}

struct NoOpBehavior;

impl TranscriptWatcherBehavior for NoOpBehavior {
    fn handle_line(&self, _line: &Value, _now: std::time::Instant, _current_state: &SessionState) -> crate::driver::LineOutcome {
        crate::driver::LineOutcome::default()
    }

    fn handle_assistant_message(&self, _now: std::time::Instant) {}

    fn tick(&self, _now: std::time::Instant, _current_state: &SessionState) -> crate::driver::TickOutcome {
        crate::driver::TickOutcome::default()
    }
}

#[tokio::test]
async fn run_answers_extract_requests_against_live_recent_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.jsonl");
    std::fs::write(&path, "{\"role\":\"user\",\"content\":\"hi\"}\n{\"role\":\"assistant\",\"content\":\"hello\"}\n").unwrap();

    let watcher = TranscriptWatcher::new(path).with_poll_interval(Duration::from_millis(20));
    let behavior = NoOpBehavior;
    let (emit_tx, _emit_rx) = mpsc::channel(8);
    let (extract_tx, extract_rx) = mpsc::channel(4);
    let shutdown = CancellationToken::new();

    let shutdown_for_run = shutdown.clone();
    let run_task = tokio::spawn(async move { watcher.run(&behavior, emit_tx, extract_rx, shutdown_for_run).await });

    // Give the poll loop a chance to read the file into `recent_lines`.
    tokio::time::sleep(Duration::from_millis(60)).await;

    let (reply_tx, reply_rx) = oneshot::channel();
    extract_tx.send((1000, reply_tx)).await.unwrap();
    let extraction = reply_rx.await.unwrap().expect("assistant turn available");
    assert_eq!(extraction.text, "hello");

    shutdown.cancel();
    let _ = run_task.await;
}

#[tokio::test]
async fn locate_with_backoff_returns_as_soon_as_finder_succeeds() {
    let shutdown = CancellationToken::new();
    let mut attempts = 0;
    let found = locate_with_backoff(
        || {
            attempts += 1;
            if attempts >= 2 {
                Some(PathBuf::from("/tmp/found.jsonl"))
            } else {
                None
            }
        },
        &shutdown,
    )
    .await;
    assert_eq!(found, Some(PathBuf::from("/tmp/found.jsonl")));
}

#[tokio::test]
async fn locate_with_backoff_returns_none_once_shutdown_fires() {
    let shutdown = CancellationToken::new();
    shutdown.cancel();
    let found = locate_with_backoff(|| None, &shutdown).await;
    assert!(found.is_none());
}
