use super::*;

#[test]
fn code_round_trips_through_as_str() {
    let codes = [
        ErrorCode::SpawnFailed,
        ErrorCode::SessionNotFound,
        ErrorCode::SessionNotRunning,
        ErrorCode::SubscriberOverflow,
        ErrorCode::TransportError,
        ErrorCode::ClassificationUnavailable,
        ErrorCode::TranscriptMissing,
    ];
    for code in codes {
        assert_eq!(code.to_string(), code.as_str());
    }
}

#[test]
fn session_not_found_maps_to_404() {
    let id = uuid::Uuid::nil();
    let err = AttnError::SessionNotFound(id);
    assert_eq!(err.code(), ErrorCode::SessionNotFound);
    assert_eq!(err.code().http_status(), 404);
}

#[test]
fn subscriber_overflow_maps_to_429() {
    let err = AttnError::SubscriberOverflow(uuid::Uuid::nil());
    assert_eq!(err.code().http_status(), 429);
}
