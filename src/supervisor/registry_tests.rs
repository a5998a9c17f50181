use super::*;
use tempfile::tempdir;

fn sample_entry() -> RegistryEntry {
    RegistryEntry {
        id: Uuid::new_v4(),
        agent: "claude".to_string(),
        cwd: "/home/user/project".to_string(),
        label: "project".to_string(),
        resume_id: None,
        started_at_epoch_ms: 0,
        transcript_path: None,
        last_known_state: SessionState::Working,
    }
}

#[test]
fn load_on_missing_file_returns_empty_registry() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("registry.json");
    let registry = Registry::load(&path);
    assert!(registry.sessions.is_empty());
}

#[test]
fn save_then_load_round_trips_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("registry.json");

    let mut registry = Registry::default();
    let entry = sample_entry();
    let id = entry.id;
    registry.upsert(entry);
    registry.save(&path).unwrap();

    let reloaded = Registry::load(&path);
    assert_eq!(reloaded.sessions.len(), 1);
    assert_eq!(reloaded.sessions.get(&id).unwrap().agent, "claude");
}

#[test]
fn corrupt_registry_file_is_ignored_not_fatal() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("registry.json");
    std::fs::write(&path, b"not json").unwrap();
    let registry = Registry::load(&path);
    assert!(registry.sessions.is_empty());
}

#[test]
fn remove_drops_an_entry() {
    let mut registry = Registry::default();
    let entry = sample_entry();
    let id = entry.id;
    registry.upsert(entry);
    registry.remove(&id);
    assert!(registry.sessions.is_empty());
}
