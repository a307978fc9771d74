//! Tokenizer & query compiler (§4.1).
//!
//! Splits a query on Unicode whitespace, strips characters outside the
//! allowed alphabet, drops stopwords and single-character tokens, and
//! recombines the rest into an FTS5 disjunction: tokens of length >=3
//! become prefix terms (`tok*`), shorter ones become exact phrases.
//! Never concatenates raw user tokens into the MATCH string — every
//! token is filtered to the allowed alphabet first.

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// ~130-entry bilingual (English/French) stopword set.
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // English
        "a", "about", "above", "after", "again", "all", "am", "an", "and", "any", "are",
        "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
        "but", "by", "could", "did", "do", "does", "doing", "down", "during", "each",
        "few", "for", "from", "further", "had", "has", "have", "having", "he", "her",
        "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in",
        "into", "is", "it", "its", "itself", "just", "me", "more", "most", "my",
        "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "only",
        "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same",
        "she", "should", "so", "some", "such", "than", "that", "the", "their",
        "theirs", "them", "themselves", "then", "there", "these", "they", "this",
        "those", "through", "to", "too", "under", "until", "up", "very", "was",
        "we", "were", "what", "when", "where", "which", "while", "who", "whom",
        "why", "will", "with", "would", "you", "your", "yours", "yourself",
        "yourselves",
        // French
        "au", "aux", "avec", "ce", "ces", "dans", "de", "des", "du", "elle",
        "en", "et", "eux", "il", "je", "la", "le", "leur", "lui", "ma", "mais",
        "me", "même", "mes", "moi", "mon", "ne", "nos", "notre", "nous", "on",
        "ou", "par", "pas", "pour", "qu", "que", "qui", "sa", "se", "ses",
        "son", "sur", "ta", "te", "tes", "toi", "ton", "tu", "un", "une",
        "vos", "votre", "vous", "c", "d", "j", "l", "m", "n", "s", "t", "y",
        "été", "étée", "étées", "étés", "étant",
    ]
    .into_iter()
    .collect()
});

/// Returns `true` for characters allowed in a search token: ASCII
/// alphanumerics, underscore, hyphen, and the Latin-1 accented range.
fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c == '_'
        || c == '-'
        || ('\u{00C0}'..='\u{00FF}').contains(&c)
}

/// Split on Unicode whitespace, strip disallowed characters from each
/// token, lowercase for stopword comparison, and drop stopwords/short
/// tokens. Returns the surviving tokens in original (stripped, but not
/// lowercased for index matching) form — the tokenizer itself
/// lowercases only for the stopword check, matching the bilingual FTS5
/// tokenizer's own case folding.
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .filter_map(|raw| {
            let cleaned: String = raw.chars().filter(|c| is_allowed_char(*c)).collect();
            if cleaned.len() <= 1 {
                return None;
            }
            if STOPWORDS.contains(cleaned.to_lowercase().as_str()) {
                return None;
            }
            Some(cleaned)
        })
        .collect()
}

/// Compile a query string into an FTS5 MATCH expression. Tokens of
/// length >=3 become prefix terms (`tok*`); shorter surviving tokens
/// become exact-match phrases (`"tok"`). Returns `None` for an empty
/// disjunction (all-stopword or empty query) so callers can skip
/// touching storage entirely, per §4.1/§8.
pub fn compile_query(query: &str) -> Option<String> {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        return None;
    }

    let terms: Vec<String> = tokens
        .iter()
        .map(|t| {
            if t.len() >= 3 {
                format!("{}*", t)
            } else {
                format!("\"{}\"", t)
            }
        })
        .collect();

    Some(terms.join(" OR "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_compiles_to_none() {
        assert_eq!(compile_query(""), None);
    }

    #[test]
    fn all_stopwords_compiles_to_none() {
        assert_eq!(compile_query("a a a"), None);
        assert_eq!(compile_query("the and of"), None);
    }

    #[test]
    fn long_tokens_become_prefix_terms() {
        let q = compile_query("typescript preference").unwrap();
        assert!(q.contains("typescript*"));
        assert!(q.contains("preference*"));
        assert!(q.contains(" OR "));
    }

    #[test]
    fn short_surviving_tokens_become_phrases() {
        // "ok" survives (length 2, not a stopword) and gets phrase form.
        let q = compile_query("ok typescript").unwrap();
        assert!(q.contains("\"ok\""));
    }

    #[test]
    fn strips_disallowed_characters() {
        let q = compile_query("héllo!! world??").unwrap();
        assert!(q.contains("héllo*") || q.contains("hllo*"));
        assert!(q.contains("world*"));
    }

    #[test]
    fn single_char_tokens_are_dropped() {
        assert_eq!(compile_query("a"), None);
        assert_eq!(compile_query("x y z"), None);
    }
}
