use uuid::Uuid;

use super::*;
use crate::supervisor::registry::RegistryEntry;
use crate::supervisor::state::SessionState;

fn test_config(registry_path: std::path::PathBuf) -> Config {
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
        registry_path: Some(registry_path),
    }
}

#[test]
fn status_with_no_sessions_exits_zero() {
    let path = std::env::temp_dir().join(format!("attn-status-test-{}.json", Uuid::new_v4()));
    assert_eq!(run(&test_config(path)), 0);
}

#[test]
fn status_counts_sessions_by_state() {
    let path = std::env::temp_dir().join(format!("attn-status-test-{}.json", Uuid::new_v4()));
    let mut registry = Registry::default();
    for (i, state) in [SessionState::Working, SessionState::WaitingInput].into_iter().enumerate() {
        registry.upsert(RegistryEntry {
            id: Uuid::new_v4(),
            agent: "claude".to_string(),
            cwd: "/tmp".to_string(),
            label: format!("session-{i}"),
            resume_id: None,
            started_at_epoch_ms: i as u64,
            transcript_path: None,
            last_known_state: state,
        });
    }
    registry.save(&path).expect("save registry");

    assert_eq!(run(&test_config(path)), 0);
}
