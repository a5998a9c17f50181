use super::*;
use std::time::Duration;

#[tokio::test]
async fn null_classifier_always_returns_unknown() {
    let classifier = NullClassifier;
    let verdict = classifier.classify("anything", Duration::from_secs(1)).await;
    assert_eq!(verdict, ClassifierVerdict::Unknown);
}

#[tokio::test]
async fn subprocess_classifier_parses_waiting_input_from_echo() {
    // `echo` writes its argument followed by a newline, fulfilling the
    // one-line JSON stdout contract without needing a dedicated fixture
    // binary.
    let classifier = SubprocessClassifier::new(r#"echo {"state":"waiting_input"}"#.to_string());
    let verdict = classifier.classify("hello", Duration::from_secs(2)).await;
    assert_eq!(verdict, ClassifierVerdict::WaitingInput);
}

#[tokio::test]
async fn subprocess_classifier_treats_malformed_output_as_unknown() {
    let classifier = SubprocessClassifier::new("echo not-json".to_string());
    let verdict = classifier.classify("hello", Duration::from_secs(2)).await;
    assert_eq!(verdict, ClassifierVerdict::Unknown);
}

#[tokio::test]
async fn subprocess_classifier_treats_missing_binary_as_unknown() {
    let classifier = SubprocessClassifier::new("this-binary-does-not-exist-xyz".to_string());
    let verdict = classifier.classify("hello", Duration::from_secs(2)).await;
    assert_eq!(verdict, ClassifierVerdict::Unknown);
}

#[tokio::test]
async fn subprocess_classifier_times_out_on_a_hanging_child() {
    let classifier = SubprocessClassifier::new("sleep 5".to_string());
    let verdict = classifier.classify("hello", Duration::from_millis(100)).await;
    assert_eq!(verdict, ClassifierVerdict::Unknown);
}
