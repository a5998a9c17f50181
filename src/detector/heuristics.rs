// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered heuristics over a cleaned text tail (spec §4.3): pending_approval
//! > waiting_input > idle > working.

use crate::supervisor::state::SessionState;

const APPROVAL_KEYWORDS: &[&str] =
    &["approve", "permission", "confirm", "proceed", "run this command"];
const CONFIRM_PROMPTS: &[&str] = &["y/n", "yes/no", "press y"];
const PROMPT_LEADERS: &[char] = &['>', '›', '❯', '»', '❱'];
const INPUT_REQUEST_VERBS: &[&str] = &["pick one", "choose", "select"];
const INPUT_REQUEST_PHRASES: &[&str] = &["what should i do", "can you"];

/// Outcome of classifying a tail, carrying enough evidence for logging.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    PendingApproval,
    WaitingInput,
    Idle,
    Working,
}

impl Classification {
    pub fn state(&self) -> SessionState {
        match self {
            Self::PendingApproval => SessionState::PendingApproval,
            Self::WaitingInput => SessionState::WaitingInput,
            Self::Idle => SessionState::Idle,
            Self::Working => SessionState::Working,
        }
    }

    pub fn cause(&self) -> &'static str {
        match self {
            Self::PendingApproval => "pending_approval",
            Self::WaitingInput => "waiting_input",
            Self::Idle => "idle",
            Self::Working => "working",
        }
    }
}

/// Classify a cleaned tail of terminal text using the spec's ordered
/// heuristics. Returns `Working` for any non-empty tail that doesn't match
/// a more specific rule.
pub fn classify_tail(tail: &str) -> Classification {
    let lower = tail.to_lowercase();

    if looks_like_approval_request(&lower) {
        return Classification::PendingApproval;
    }

    let last_line = tail.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
    let trimmed = last_line.trim_start();
    let is_prompt_line = PROMPT_LEADERS.iter().any(|&c| trimmed.starts_with(c));

    if is_prompt_line {
        let preceding = preceding_assistant_text(tail, last_line);
        if preceding.is_empty() || requests_input(&preceding.to_lowercase()) {
            return Classification::WaitingInput;
        }
        return Classification::Idle;
    }

    if tail.trim().is_empty() {
        return Classification::Idle;
    }

    Classification::Working
}

fn looks_like_approval_request(lower: &str) -> bool {
    let has_keyword = APPROVAL_KEYWORDS.iter().any(|k| lower.contains(k));
    let has_confirm = CONFIRM_PROMPTS.iter().any(|k| lower.contains(k));
    let structural = lower.contains("reason:") && lower.contains("yes, proceed");
    (has_keyword && has_confirm) || structural
}

fn requests_input(lower: &str) -> bool {
    lower.trim_end().ends_with('?')
        || INPUT_REQUEST_PHRASES.iter().any(|p| lower.contains(p))
        || INPUT_REQUEST_VERBS.iter().any(|v| lower.contains(v))
}

/// Text preceding the prompt line, used to decide whether the assistant is
/// actively requesting input versus simply idling at a prompt.
fn preceding_assistant_text<'a>(tail: &'a str, last_line: &str) -> &'a str {
    match tail.rfind(last_line) {
        Some(idx) => tail[..idx].trim(),
        None => "",
    }
}

#[cfg(test)]
#[path = "heuristics_tests.rs"]
mod tests;
