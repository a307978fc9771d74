//! Decay classifier and expiry calculator (§4.2).
//!
//! Pure functions: `classify_decay` maps (entity, key, value, text) to a
//! [`DecayClass`]; `calculate_expiry` maps (class, now) to an absolute
//! expiry. Rule precedence is first-match-wins and is preserved exactly
//! as specified, including the open question about the English
//! permanence regex being broader than its French counterpart.

use once_cell::sync::Lazy;
use regex::RegexSet;

use crate::entry::{DecayClass, Expiry};

const PERMANENT_KEY_SUBSTRINGS: &[&str] = &[
    "birthday",
    "born",
    "email",
    "phone",
    "name",
    "real_name",
    "full_name",
    "api_key",
    "architecture",
    "language",
    "location",
    "stack",
];

const SESSION_KEY_SUBSTRINGS: &[&str] = &["current_file", "temp", "debug", "working_on_right_now"];

const ACTIVE_KEY_SUBSTRINGS: &[&str] = &[
    "current_task",
    "active_branch",
    "sprint",
    "milestone",
    "task",
    "todo",
    "wip",
    "branch",
    "blocker",
];

// Rule 2: explicit identity facts.
static PERMANENT_TEXT_RE: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)born on",
        r"(?i)birthday is",
        r"(?i)email is",
        r"(?i)phone number",
    ])
    .expect("valid regex set")
});

// Rule 3: decisions/conventions. Deliberately preserves the broad bare
// `always`/`never` match called out as an open question in §9 — the
// French extractor (see `extractor.rs`) narrows its equivalent with
// `utiliser|faire|mettre`, but the English rule here does not.
static PERMANENT_RULE_RE: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)decided",
        r"(?i)architecture",
        r"(?i)always use",
        r"(?i)never use",
        r"(?i)\balways\b",
        r"(?i)\bnever\b",
    ])
    .expect("valid regex set")
});

static SESSION_TEXT_RE: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)currently debugging",
        r"(?i)right now",
        r"(?i)this session",
    ])
    .expect("valid regex set")
});

static ACTIVE_TEXT_RE: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)working on",
        r"(?i)need to fix",
        r"(?i)todo:?",
        r"(?i)\bwip\b",
    ])
    .expect("valid regex set")
});

fn contains_any_ci(haystack: &str, needles: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

/// Classify decay for a candidate entry. `entity`/`key` are matched
/// case-insensitively against their substring lists; `text` is matched
/// against the English permanence/session/active regex sets only —
/// French statements fall through to whatever the extractor itself
/// already resolved into `entity`/`key` before this runs.
pub fn classify_decay(entity: Option<&str>, key: Option<&str>, text: &str) -> DecayClass {
    let key = key.unwrap_or("");
    let entity_lower = entity.unwrap_or("").to_lowercase();

    // 1. key → permanent
    if contains_any_ci(key, PERMANENT_KEY_SUBSTRINGS) {
        return DecayClass::Permanent;
    }
    // 2. text → permanent (explicit identity facts)
    if PERMANENT_TEXT_RE.is_match(text) {
        return DecayClass::Permanent;
    }
    // 3. text → permanent (decisions/conventions)
    if PERMANENT_RULE_RE.is_match(text) {
        return DecayClass::Permanent;
    }
    // 4. entity → permanent
    if entity_lower == "decision" || entity_lower == "convention" {
        return DecayClass::Permanent;
    }
    // 5. session
    if contains_any_ci(key, SESSION_KEY_SUBSTRINGS) || SESSION_TEXT_RE.is_match(text) {
        return DecayClass::Session;
    }
    // 6. active
    if contains_any_ci(key, ACTIVE_KEY_SUBSTRINGS)
        || entity_lower == "project"
        || entity_lower == "sprint"
        || ACTIVE_TEXT_RE.is_match(text)
    {
        return DecayClass::Active;
    }
    // 7. checkpoint
    if key.to_lowercase().starts_with("checkpoint:") || key.to_lowercase().contains("preflight") {
        return DecayClass::Checkpoint;
    }
    // 8. default
    DecayClass::Stable
}

/// Compute the absolute expiry for a class given the current time.
pub fn calculate_expiry(class: DecayClass, now: i64) -> Expiry {
    match class.ttl_seconds() {
        Some(ttl) => Expiry::At(now + ttl),
        None => Expiry::Never,
    }
}
