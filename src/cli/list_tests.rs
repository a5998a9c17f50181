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
fn list_empty_registry_still_exits_zero() {
    let path = std::env::temp_dir().join(format!("attn-list-test-{}.json", Uuid::new_v4()));
    let config = test_config(path);
    assert_eq!(run(&config), 0);
}

#[test]
fn list_prints_persisted_sessions() {
    let path = std::env::temp_dir().join(format!("attn-list-test-{}.json", Uuid::new_v4()));
    let mut registry = Registry::default();
    registry.upsert(RegistryEntry {
        id: Uuid::new_v4(),
        agent: "claude".to_string(),
        cwd: "/tmp".to_string(),
        label: "test".to_string(),
        resume_id: None,
        started_at_epoch_ms: 1,
        transcript_path: None,
        last_known_state: SessionState::Working,
    });
    registry.save(&path).expect("save registry");

    let config = test_config(path);
    assert_eq!(run(&config), 0);
}
