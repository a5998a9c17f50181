use super::*;

#[test]
fn classifies_approval_request() {
    let tail = "Reason: this will delete files\nYes, proceed? (y/n)";
    assert_eq!(classify_tail(tail), Classification::PendingApproval);
}

#[test]
fn classifies_run_command_confirmation() {
    let tail = "Do you want to run this command?\n(y/n)";
    assert_eq!(classify_tail(tail), Classification::PendingApproval);
}

#[test]
fn classifies_waiting_input_on_question_before_prompt() {
    let tail = "What should I do next?\n> ";
    assert_eq!(classify_tail(tail), Classification::WaitingInput);
}

#[test]
fn classifies_idle_on_bare_prompt_with_no_question() {
    let tail = "Task complete.\n> ";
    assert_eq!(classify_tail(tail), Classification::Idle);
}

#[test]
fn classifies_waiting_input_on_bare_prompt_with_no_preceding_text() {
    assert_eq!(classify_tail("> "), Classification::WaitingInput);
}

#[test]
fn classifies_working_for_non_empty_non_prompt_tail() {
    let tail = "Compiling crate foo v0.1.0\nRunning cargo check...";
    assert_eq!(classify_tail(tail), Classification::Working);
}

#[test]
fn classifies_idle_on_empty_tail() {
    assert_eq!(classify_tail("   \n  "), Classification::Idle);
}

#[test]
fn classifies_waiting_input_on_choose_verb() {
    let tail = "Pick one of the following options:\n1. foo\n2. bar\n❯ ";
    assert_eq!(classify_tail(tail), Classification::WaitingInput);
}
