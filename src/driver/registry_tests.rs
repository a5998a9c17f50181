use super::*;

#[test]
fn lookup_finds_all_built_in_drivers() {
    assert!(lookup("claude").is_some());
    assert!(lookup("codex").is_some());
    assert!(lookup("copilot").is_some());
    assert!(lookup("unknown").is_some());
}

#[test]
fn lookup_returns_none_for_unregistered_name() {
    assert!(lookup("some-agent-that-does-not-exist").is_none());
}
