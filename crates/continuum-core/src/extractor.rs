//! Structured extractor (§4.4).
//!
//! A first-match-wins ordered list of named matchers, each returning an
//! `Option<(entity, key, value)>` — the grammar is modeled as data, not
//! nested `if`/`else`, so the declared precedence order is visible at a
//! glance and easy to extend.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::entry::Category;

const MAX_KEY_LEN: usize = 100;

fn truncate_key(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.chars().count() <= MAX_KEY_LEN {
        trimmed.to_string()
    } else {
        trimmed.chars().take(MAX_KEY_LEN).collect()
    }
}

/// A structured (entity, key, value) triple extracted from free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub entity: Option<String>,
    pub key: Option<String>,
    pub value: Option<String>,
}

impl Extracted {
    fn new(entity: Option<&str>, key: Option<String>, value: Option<String>) -> Self {
        Self {
            entity: entity.map(str::to_string),
            key,
            value,
        }
    }
}

fn contains_never(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("never") || lower.contains("jamais")
}

// ============================================================================
// PATTERNS
// ============================================================================

static DECISION_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:decided(?: to)?|chose|picked|went with|selected)\s+(?P<what>.+?)(?:\s+because\s+(?P<why>.+))?[.!]?$")
        .expect("valid regex")
});

static DECISION_FR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:a décidé de|a choisi|a opté pour)\s+(?P<what>.+?)(?:\s+parce que\s+(?P<why>.+))?[.!]?$")
        .expect("valid regex")
});

static CHOICE_EN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)use\s+(?P<chosen>.+?)\s+over\s+(?P<rejected>.+?)[.!]?$").expect("valid regex"));

static CHOICE_FR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)utiliser\s+(?P<chosen>.+?)\s+plutôt que\s+(?P<rejected>.+?)[.!]?$")
        .expect("valid regex")
});

static RULE_EN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:always|never)\s+(?P<rest>.+?)[.!]?$").expect("valid regex"));

// Narrower than the English rule on purpose: the French extractor
// requires an explicit verb (utiliser/faire/mettre) after
// toujours/jamais, where the English rule matches any text following
// always/never. Preserved per the open question in §9/DESIGN.md.
static RULE_FR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:toujours|jamais)\s+(?:utiliser|faire|mettre)\s+(?P<rest>.+?)[.!]?$")
        .expect("valid regex")
});

static POSSESSIVE_NAMED_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<entity>[A-Z][\w]*)'s\s+(?P<key>.+?)\s+is\s+(?P<value>.+?)[.!]?$")
        .expect("valid regex")
});

static POSSESSIVE_MY_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^my\s+(?P<key>.+?)\s+is\s+(?P<value>.+?)[.!]?$").expect("valid regex")
});

static POSSESSIVE_NAMED_FR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:le|la|l['’])\s*(?P<key>.+?)\s+de\s+(?P<entity>\w+)\s+est\s+(?P<value>.+?)[.!]?$")
        .expect("valid regex")
});

static POSSESSIVE_MY_FR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:mon|ma)\s+(?P<key>.+?)\s+est\s+(?P<value>.+?)[.!]?$").expect("valid regex")
});

static PREFERENCE_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bi\s+(?:prefer|like|love|hate|want|need|use)\s+(?P<value>.+?)[.!]?$")
        .expect("valid regex")
});

static PREFERENCE_FR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bj['’]?(?:e\s+)?(?:préfère|aime|adore|déteste|veux|utilise)\s+(?P<value>.+?)[.!]?$")
        .expect("valid regex")
});

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}").expect("valid regex")
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[\s.-]?)?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}\b").expect("valid regex")
});

static CAPITALIZED_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-zA-Z]+\b").expect("valid regex"));

/// Run the ordered matcher list and return the first non-empty triple.
/// `category`, if already known (e.g. from [`detect_category`]), enables
/// the entity-fallback rule (first capitalized word) when nothing else
/// matched and the category is `Entity`.
pub fn extract(text: &str, category: Category) -> Extracted {
    if let Some(caps) = DECISION_EN.captures(text) {
        return decision_triple(&caps, "no rationale recorded");
    }
    if let Some(caps) = DECISION_FR.captures(text) {
        return decision_triple(&caps, "aucune justification enregistrée");
    }
    if let Some(caps) = CHOICE_EN.captures(text) {
        return choice_triple(&caps);
    }
    if let Some(caps) = CHOICE_FR.captures(text) {
        return choice_triple(&caps);
    }
    if let Some(caps) = RULE_EN.captures(text) {
        return rule_triple(text, &caps);
    }
    if let Some(caps) = RULE_FR.captures(text) {
        return rule_triple(text, &caps);
    }
    if let Some(caps) = POSSESSIVE_NAMED_EN.captures(text) {
        return Extracted::new(
            Some(&caps["entity"]),
            Some(truncate_key(&caps["key"])),
            Some(caps["value"].trim().to_string()),
        );
    }
    if let Some(caps) = POSSESSIVE_NAMED_FR.captures(text) {
        return Extracted::new(
            Some(&caps["entity"]),
            Some(truncate_key(&caps["key"])),
            Some(caps["value"].trim().to_string()),
        );
    }
    if let Some(caps) = POSSESSIVE_MY_EN.captures(text) {
        return Extracted::new(
            Some("user"),
            Some(truncate_key(&caps["key"])),
            Some(caps["value"].trim().to_string()),
        );
    }
    if let Some(caps) = POSSESSIVE_MY_FR.captures(text) {
        return Extracted::new(
            Some("user"),
            Some(truncate_key(&caps["key"])),
            Some(caps["value"].trim().to_string()),
        );
    }
    if let Some(caps) = PREFERENCE_EN.captures(text) {
        return Extracted::new(None, Some("preference".into()), Some(caps["value"].trim().to_string()));
    }
    if let Some(caps) = PREFERENCE_FR.captures(text) {
        return Extracted::new(None, Some("preference".into()), Some(caps["value"].trim().to_string()));
    }
    if let Some(m) = EMAIL_RE.find(text) {
        return Extracted::new(None, Some("email".into()), Some(m.as_str().to_string()));
    }
    if let Some(m) = PHONE_RE.find(text) {
        return Extracted::new(None, Some("phone".into()), Some(m.as_str().to_string()));
    }
    if category == Category::Entity {
        if let Some(m) = CAPITALIZED_WORD.find(text) {
            return Extracted::new(Some(m.as_str()), None, None);
        }
    }
    Extracted::new(None, None, None)
}

fn decision_triple(caps: &regex::Captures<'_>, no_rationale: &str) -> Extracted {
    let what = truncate_key(&caps["what"]);
    let why = caps
        .name("why")
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| no_rationale.to_string());
    Extracted::new(Some("decision"), Some(what), Some(why))
}

fn choice_triple(caps: &regex::Captures<'_>) -> Extracted {
    Extracted::new(
        Some("decision"),
        Some(truncate_key(&caps["chosen"])),
        Some(caps["rejected"].trim().to_string()),
    )
}

fn rule_triple(text: &str, caps: &regex::Captures<'_>) -> Extracted {
    let value = if contains_never(text) { "never" } else { "always" };
    Extracted::new(
        Some("convention"),
        Some(truncate_key(&caps["rest"])),
        Some(value.to_string()),
    )
}

// ============================================================================
// CAPTURE FILTER
// ============================================================================

const SENSITIVE_SUBSTRINGS: &[&str] = &[
    "password",
    "api key",
    "secret",
    "token is",
    "ssn",
    "credit card",
];

static HTML_TAG_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(\w+)[^>]*>.*?</\1>").expect("valid regex"));

static MARKDOWN_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s").expect("valid regex"));

fn emoji_count(text: &str) -> usize {
    text.chars()
        .filter(|c| {
            let cp = *c as u32;
            (0x1F300..=0x1FAFF).contains(&cp)
                || (0x2600..=0x27BF).contains(&cp)
                || (0x2190..=0x21FF).contains(&cp) // arrows, sometimes used decoratively
        })
        .count()
}

/// Bilingual trigger patterns used by [`should_capture`]. Kept separate
/// from the extraction patterns above since a statement can be worth
/// capturing even if the extractor can't structure it (it falls back to
/// category `Other` with null entity/key).
static TRIGGER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    let patterns = [
        r"(?i)\bi\s+prefer\b",
        r"(?i)\bi\s+like\b",
        r"(?i)\bi\s+love\b",
        r"(?i)\bi\s+hate\b",
        r"(?i)\bi\s+want\b",
        r"(?i)\bi\s+need\b",
        r"(?i)\bi\s+use\b",
        r"(?i)\bmy\s+\w+\s+is\b",
        r"(?i)'s\s+\w+\s+is\b",
        r"(?i)\bdecided\b",
        r"(?i)\bchose\b",
        r"(?i)\bpicked\b",
        r"(?i)\bwent with\b",
        r"(?i)\bselected\b",
        r"(?i)\balways\b",
        r"(?i)\bnever\b",
        r"(?i)\bworking on\b",
        r"(?i)\btodo\b",
        r"(?i)\bremember\b",
        r"(?i)\bje\s+préfère\b",
        r"(?i)\bj['’]aime\b",
        r"(?i)\ba décidé de\b",
        r"(?i)\btoujours\b",
        r"(?i)\bjamais\b",
    ];
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
});

/// All of the eligibility rules in §4.4 must hold for a statement to be
/// auto-captured.
pub fn should_capture(text: &str) -> bool {
    let len = text.chars().count();
    if !(10..=500).contains(&len) {
        return false;
    }
    if text.contains("<relevant-memories>") {
        return false;
    }
    if HTML_TAG_PAIR.is_match(text) {
        return false;
    }
    if MARKDOWN_HEADER.is_match(text) {
        return false;
    }
    if emoji_count(text) > 3 {
        return false;
    }
    let lower = text.to_lowercase();
    if SENSITIVE_SUBSTRINGS.iter().any(|s| lower.contains(s)) {
        return false;
    }
    TRIGGER_PATTERNS.iter().any(|re| re.is_match(text))
}

// ============================================================================
// CATEGORY DETECTION
// ============================================================================

static DECISION_CATEGORY_TRIGGERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bdecided\b",
        r"(?i)\bchose\b",
        r"(?i)\bpicked\b",
        r"(?i)\bwent with\b",
        r"(?i)\bselected\b",
        r"(?i)\balways\b",
        r"(?i)\bnever\b",
        r"(?i)\ba décidé de\b",
        r"(?i)\btoujours\b",
        r"(?i)\bjamais\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static PREFERENCE_CATEGORY_TRIGGERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bi\s+prefer\b",
        r"(?i)\bi\s+like\b",
        r"(?i)\bi\s+love\b",
        r"(?i)\bi\s+hate\b",
        r"(?i)\bi\s+want\b",
        r"(?i)\bi\s+need\b",
        r"(?i)\bje\s+préfère\b",
        r"(?i)\bj['’]aime\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static ENTITY_CATEGORY_TRIGGERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)'s\s+\w+\s+is\b",
        r"(?i)^[A-Z][a-zA-Z]+\s+(?:is|works|likes)\b",
        r"(?i)\bde\s+\w+\s+est\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static FACT_CATEGORY_TRIGGERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bis\b",
        r"(?i)\bare\b",
        r"(?i)\bhas\b",
        r"(?i)\bhave\b",
        r"(?i)\best\b",
        r"(?i)\bsont\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Classify category by applying bilingual pattern groups in the
/// documented order: decision -> preference -> entity -> fact -> other.
pub fn detect_category(text: &str) -> Category {
    if DECISION_CATEGORY_TRIGGERS.iter().any(|re| re.is_match(text)) {
        return Category::Decision;
    }
    if PREFERENCE_CATEGORY_TRIGGERS.iter().any(|re| re.is_match(text)) {
        return Category::Preference;
    }
    if ENTITY_CATEGORY_TRIGGERS.iter().any(|re| re.is_match(text)) {
        return Category::Entity;
    }
    if FACT_CATEGORY_TRIGGERS.iter().any(|re| re.is_match(text)) {
        return Category::Fact;
    }
    Category::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_without_rationale_gets_default() {
        let e = extract("We decided to use PostgreSQL", Category::Decision);
        assert_eq!(e.entity.as_deref(), Some("decision"));
        assert_eq!(e.value.as_deref(), Some("no rationale recorded"));
    }

    #[test]
    fn decision_with_rationale_is_captured() {
        let e = extract(
            "We decided to use PostgreSQL because it has great JSON support",
            Category::Decision,
        );
        assert_eq!(e.value.as_deref(), Some("it has great JSON support"));
    }

    #[test]
    fn choice_pattern_captures_both_sides() {
        let e = extract("use Rust over Go", Category::Decision);
        assert_eq!(e.key.as_deref(), Some("Rust"));
        assert_eq!(e.value.as_deref(), Some("Go"));
    }

    #[test]
    fn rule_defaults_to_always_and_convention_entity() {
        let e = extract("always use tabs over spaces", Category::Other);
        assert_eq!(e.entity.as_deref(), Some("convention"));
        assert_eq!(e.value.as_deref(), Some("always"));
    }

    #[test]
    fn rule_detects_never() {
        let e = extract("never commit directly to main", Category::Other);
        assert_eq!(e.value.as_deref(), Some("never"));
    }

    #[test]
    fn named_possessive_extracts_entity_key_value() {
        let e = extract("Fred's editor is VSCode", Category::Entity);
        assert_eq!(e.entity.as_deref(), Some("Fred"));
        assert_eq!(e.key.as_deref(), Some("editor"));
        assert_eq!(e.value.as_deref(), Some("VSCode"));
    }

    #[test]
    fn my_possessive_defaults_entity_to_user() {
        let e = extract("My favorite language is Rust", Category::Entity);
        assert_eq!(e.entity.as_deref(), Some("user"));
        assert_eq!(e.key.as_deref(), Some("favorite language"));
        assert_eq!(e.value.as_deref(), Some("Rust"));
    }

    #[test]
    fn preference_pattern_captures_value_only() {
        let e = extract("I prefer TypeScript over JavaScript", Category::Preference);
        assert_eq!(e.key.as_deref(), Some("preference"));
        assert_eq!(e.value.as_deref(), Some("TypeScript over JavaScript"));
    }

    #[test]
    fn email_takes_precedence_over_phone() {
        // Contains digits that could look phone-ish inside the local part.
        let e = extract("reach me at jane.doe@example.com or 555-123-4567", Category::Fact);
        assert_eq!(e.key.as_deref(), Some("email"));
    }

    #[test]
    fn entity_fallback_on_first_capitalized_word() {
        let e = extract("Anthropic builds helpful assistants", Category::Entity);
        assert_eq!(e.entity.as_deref(), Some("Anthropic"));
        assert_eq!(e.key, None);
        assert_eq!(e.value, None);
    }

    #[test]
    fn key_is_truncated_at_100_chars() {
        let long = "x".repeat(150);
        let text = format!("always {}", long);
        let e = extract(&text, Category::Other);
        assert_eq!(e.key.unwrap().chars().count(), 100);
    }

    #[test]
    fn should_capture_enforces_length_bounds() {
        assert!(!should_capture("short"));
        assert!(!should_capture(&"I prefer Rust ".repeat(60)));
    }

    #[test]
    fn should_capture_rejects_relevant_memories_marker() {
        assert!(!should_capture("<relevant-memories>I prefer Rust</relevant-memories>"));
    }

    #[test]
    fn should_capture_rejects_sensitive_patterns() {
        assert!(!should_capture("my password is hunter2 I prefer that"));
    }

    #[test]
    fn should_capture_requires_a_trigger() {
        assert!(!should_capture("the weather today is quite nice outside"));
        assert!(should_capture("I prefer tabs over spaces in this project"));
    }

    #[test]
    fn detect_category_order_decision_before_preference() {
        // Contains both a decision trigger and would-be preference wording;
        // decision must win because it's checked first.
        assert_eq!(
            detect_category("I decided I prefer PostgreSQL"),
            Category::Decision
        );
    }

    #[test]
    fn detect_category_falls_back_to_other() {
        assert_eq!(detect_category("zzz qqq wwwww"), Category::Other);
    }
}
