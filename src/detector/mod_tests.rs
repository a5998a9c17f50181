use super::*;
use std::time::Duration;

#[test]
fn feed_emits_on_state_change_and_suppresses_repeats() {
    let mut detector = OutputDetector::new(Duration::from_secs(60));
    let first = detector.feed(b"Compiling...\n");
    assert!(first.is_some());
    let (state, _, _) = first.unwrap();
    assert_eq!(state, SessionState::Working);

    let repeat = detector.feed(b"Compiling...\n");
    assert!(repeat.is_none(), "identical working chunk before the pulse interval elapses is suppressed");
}

#[test]
fn feed_transitions_from_working_to_pending_approval() {
    let mut detector = OutputDetector::new(Duration::from_secs(60));
    detector.feed(b"Compiling...\n");
    let emission = detector.feed(b"Do you want to run this command? (y/n)\n");
    let (state, _, _) = emission.unwrap();
    assert_eq!(state, SessionState::PendingApproval);
}

#[test]
fn tail_is_capped_to_bounded_capacity() {
    let mut detector = OutputDetector::new(Duration::from_secs(60));
    let chunk = "x".repeat(3000);
    detector.feed(chunk.as_bytes());
    assert!(detector.tail.len() <= TAIL_CAPACITY);
}

#[test]
fn output_detector_task_reports_tier_3() {
    let (_tx, rx) = mpsc::channel(1);
    let task = OutputDetectorTask::new(Duration::from_secs(60), rx);
    assert_eq!(task.tier(), 3);
}

#[tokio::test]
async fn output_detector_task_forwards_state_changes_from_fed_chunks() {
    let (output_tx, output_rx) = mpsc::channel(8);
    let (state_tx, mut state_rx) = mpsc::channel(8);
    let shutdown = CancellationToken::new();
    let task = OutputDetectorTask::new(Duration::from_secs(60), output_rx);

    let handle = tokio::spawn(Box::new(task).run(state_tx, shutdown.clone()));
    output_tx.send(Bytes::from_static(b"Compiling...\n")).await.unwrap();

    let (state, _cause) = state_rx.recv().await.unwrap();
    assert_eq!(state, SessionState::Working);

    shutdown.cancel();
    drop(output_tx);
    let _ = handle.await;
}
