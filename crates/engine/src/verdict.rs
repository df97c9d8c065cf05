//! Evidence-based completion verdicts.
//!
//! The verifier is application-agnostic: every signal is structural (URL
//! shape, action-kind presence, generic confirmation/error phrasing). All
//! three criteria groups must hold for Success; there is no weighted
//! percentage, and a failing group attaches its specific reasons.

use std::collections::BTreeMap;

use url::Url;
use webpilot_core_types::{
    ActionKind, ActionRecord, PageState, SatisfiedCriteria, TaskSpec, VerificationEvidence,
    VerificationResult, VerificationStatus,
};

/// Task classification derived from the description's leading verb.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TaskKind {
    Creation,
    Modification,
    Deletion,
    Search,
    Read,
}

const CREATION_VERBS: &[&str] = &[
    "create", "add", "new", "register", "compose", "post", "write", "submit",
];
const MODIFICATION_VERBS: &[&str] = &[
    "update", "edit", "change", "rename", "modify", "assign", "move", "set",
];
const DELETION_VERBS: &[&str] = &["delete", "remove", "archive", "clear", "unsubscribe"];
const SEARCH_VERBS: &[&str] = &["search", "find", "filter", "query", "locate", "look"];

const SUCCESS_TEXT_HINTS: &[&str] = &[
    "success",
    "successfully",
    "created",
    "saved",
    "added",
    "updated",
    "deleted",
    "removed",
    "submitted",
    "confirmed",
    "confirmation",
    "thank you",
    "complete",
];
const ERROR_TEXT_HINTS: &[&str] = &[
    "error",
    "failed",
    "failure",
    "invalid",
    "denied",
    "forbidden",
    "not found",
    "404",
    "500",
    "unable to",
    "something went wrong",
];
const LOGIN_HINTS: &[&str] = &["login", "log in", "sign in", "signin", "authenticate"];
const LOADING_HINTS: &[&str] = &["loading", "please wait", "just a moment"];
const SUCCESS_URL_HINTS: &[&str] = &["success", "confirm", "thank-you", "done", "complete"];

const DESCRIPTION_STOPWORDS: &[&str] = &[
    "the", "and", "with", "from", "into", "that", "this", "named", "called", "then", "please",
    "them", "their", "your", "onto", "have", "every",
];

/// Classify a task description by its first recognised verb.
pub fn classify(description: &str) -> TaskKind {
    for token in tokens(description) {
        if CREATION_VERBS.contains(&token.as_str()) {
            return TaskKind::Creation;
        }
        if DELETION_VERBS.contains(&token.as_str()) {
            return TaskKind::Deletion;
        }
        if MODIFICATION_VERBS.contains(&token.as_str()) {
            return TaskKind::Modification;
        }
        if SEARCH_VERBS.contains(&token.as_str()) {
            return TaskKind::Search;
        }
    }
    TaskKind::Read
}

/// Action-kind signature implied by a classification: kinds that must all
/// appear, and a group of which at least one must appear.
fn required_kinds(kind: TaskKind) -> (&'static [ActionKind], &'static [ActionKind]) {
    match kind {
        TaskKind::Creation => (&[ActionKind::TypeText, ActionKind::Click], &[]),
        TaskKind::Modification => (
            &[ActionKind::Click],
            &[ActionKind::TypeText, ActionKind::Select],
        ),
        TaskKind::Deletion => (&[ActionKind::Click], &[]),
        TaskKind::Search => (&[ActionKind::TypeText], &[]),
        TaskKind::Read => (&[], &[]),
    }
}

/// Render a strict verdict from the task intent, the final observable state
/// and the full action history. Pure and deterministic: identical inputs
/// always yield an identical result.
pub fn verify(
    task: &TaskSpec,
    final_state: &PageState,
    history: &[ActionRecord],
) -> VerificationResult {
    let kind = classify(&task.description);
    let mut reasons = Vec::new();
    let mut evidence = VerificationEvidence {
        urls_visited: visited_urls(task, final_state, history),
        action_counts: count_actions(history),
        matched_patterns: Vec::new(),
    };

    let navigation = navigation_criteria(task, final_state, &evidence.urls_visited, &mut reasons);
    let action = action_criteria(kind, history, &mut reasons);
    let success_indicators =
        indicator_criteria(final_state, &mut evidence.matched_patterns, &mut reasons);

    let satisfied = SatisfiedCriteria {
        navigation,
        action,
        success_indicators,
    };
    let status = if satisfied.all() {
        VerificationStatus::Success
    } else {
        VerificationStatus::Failure
    };

    VerificationResult {
        status,
        satisfied,
        reasons,
        evidence,
    }
}

fn navigation_criteria(
    task: &TaskSpec,
    final_state: &PageState,
    urls_visited: &[String],
    reasons: &mut Vec<String>,
) -> bool {
    let mut ok = true;

    let start = urls_visited
        .first()
        .cloned()
        .unwrap_or_else(|| task.target_context.clone());
    if final_state.url == start && urls_visited.len() < 2 {
        reasons.push("navigation: never left the starting location".to_string());
        ok = false;
    }

    let haystack = page_haystack(final_state);
    if contains_any(&haystack, ERROR_TEXT_HINTS).is_some() || url_matches_error(&final_state.url) {
        reasons.push(format!(
            "navigation: destination looks like an error page ({})",
            final_state.url
        ));
        ok = false;
    }
    if contains_any(&haystack, LOGIN_HINTS).is_some() {
        reasons.push("navigation: destination is a login wall".to_string());
        ok = false;
    }
    if contains_any(&final_state.text_sample.to_lowercase(), LOADING_HINTS).is_some() {
        reasons.push("navigation: destination page is still loading".to_string());
        ok = false;
    }

    let keywords = description_keywords(&task.description);
    if !keywords.is_empty() && !keywords.iter().any(|kw| haystack.contains(kw.as_str())) {
        reasons.push("navigation: destination does not mention any task terms".to_string());
        ok = false;
    }

    ok
}

fn action_criteria(kind: TaskKind, history: &[ActionRecord], reasons: &mut Vec<String>) -> bool {
    let (all_of, any_of) = required_kinds(kind);
    let mut ok = true;

    for required in all_of {
        let present = history
            .iter()
            .any(|record| record.kind == *required && record.executed);
        if !present {
            reasons.push(format!(
                "action: required {} action absent from history",
                required
            ));
            ok = false;
        }
    }

    if !any_of.is_empty() {
        let present = history
            .iter()
            .any(|record| record.executed && any_of.contains(&record.kind));
        if !present {
            let expected: Vec<&str> = any_of.iter().map(|kind| kind.as_str()).collect();
            reasons.push(format!(
                "action: none of the expected actions ({}) present",
                expected.join(", ")
            ));
            ok = false;
        }
    }

    ok
}

fn indicator_criteria(
    final_state: &PageState,
    matched: &mut Vec<String>,
    reasons: &mut Vec<String>,
) -> bool {
    let text = final_state.text_sample.to_lowercase();
    let mut positive = false;

    for hint in SUCCESS_TEXT_HINTS {
        if text.contains(hint) {
            matched.push(format!("text:{hint}"));
            positive = true;
        }
    }
    if let Some(shape) = url_success_shape(&final_state.url) {
        matched.push(format!("url:{shape}"));
        positive = true;
    }
    if !positive {
        reasons.push("indicators: no generic confirmation phrasing or URL shape".to_string());
    }

    let mut clean = true;
    if let Some(hit) = contains_any(&text, ERROR_TEXT_HINTS) {
        reasons.push(format!("indicators: error pattern '{hit}' present"));
        clean = false;
    }

    positive && clean
}

/// Ordered, deduplicated URLs touched by the run.
fn visited_urls(task: &TaskSpec, final_state: &PageState, history: &[ActionRecord]) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    let mut push = |url: &str| {
        if !url.is_empty() && !urls.iter().any(|existing| existing == url) {
            urls.push(url.to_string());
        }
    };
    if history.is_empty() {
        push(&task.target_context);
    }
    for record in history {
        push(&record.url_before);
        push(&record.url_after);
    }
    push(&final_state.url);
    urls
}

fn count_actions(history: &[ActionRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in history {
        *counts.entry(record.kind.as_str().to_string()).or_insert(0) += 1;
    }
    counts
}

fn page_haystack(state: &PageState) -> String {
    let mut haystack = state.url.to_lowercase();
    if let Some(title) = &state.title {
        haystack.push(' ');
        haystack.push_str(&title.to_lowercase());
    }
    haystack.push(' ');
    haystack.push_str(&state.text_sample.to_lowercase());
    haystack
}

fn contains_any<'a>(haystack: &str, hints: &'a [&str]) -> Option<&'a str> {
    hints.iter().copied().find(|hint| haystack.contains(hint))
}

fn url_matches_error(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.contains("/404") || lower.contains("/error") || lower.ends_with("/not-found")
}

/// Detail-page or confirmation URL shapes: a trailing numeric id segment,
/// an id query parameter, or a generic confirmation path.
fn url_success_shape(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if let Some(segments) = parsed.path_segments() {
        if let Some(last) = segments.filter(|segment| !segment.is_empty()).last() {
            if last.chars().all(|ch| ch.is_ascii_digit()) && !last.is_empty() {
                return Some(format!("detail path /{last}"));
            }
        }
    }
    if parsed
        .query_pairs()
        .any(|(key, _)| key == "id" || key.ends_with("_id"))
    {
        return Some("id query parameter".to_string());
    }
    let path = parsed.path().to_lowercase();
    SUCCESS_URL_HINTS
        .iter()
        .find(|hint| path.contains(*hint))
        .map(|hint| format!("path contains '{hint}'"))
}

fn description_keywords(description: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for token in tokens(description) {
        if token.len() >= 4
            && !DESCRIPTION_STOPWORDS.contains(&token.as_str())
            && !keywords.contains(&token)
        {
            keywords.push(token);
        }
    }
    keywords.truncate(8);
    keywords
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| chunk.to_lowercase())
}
