//! Hybrid result fuser (§4.7).
//!
//! Combines lexical and vector hits into one ranked list. Lexical hits
//! are authoritative for identity: when the same id (or the same
//! case-folded text) appears in both result sets, the lexical copy wins
//! and the vector duplicate is dropped rather than merged or re-scored.

use std::collections::HashSet;

use crate::entry::{Category, DecayClass, Expiry, VectorRecord};

/// One fused search hit, carrying enough of [`crate::entry::MemoryEntry`]
/// to render a result plus the score that placed it.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    pub id: String,
    pub text: String,
    pub category: Category,
    pub importance: f64,
    pub entity: Option<String>,
    pub key: Option<String>,
    pub value: Option<String>,
    pub decay_class: DecayClass,
    pub expires_at: Expiry,
    pub score: f64,
    pub source: HitSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitSource {
    Lexical,
    Vector,
}

/// A lexical hit carries the full row plus its composite score
/// (`0.60*bm25 + 0.25*freshness + 0.15*confidence`, computed upstream by
/// the lexical store).
#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub id: String,
    pub text: String,
    pub category: Category,
    pub importance: f64,
    pub entity: Option<String>,
    pub key: Option<String>,
    pub value: Option<String>,
    pub decay_class: DecayClass,
    pub expires_at: Expiry,
    pub score: f64,
}

/// A vector hit: the store only ever projects the [`VectorRecord`]
/// shell, so `entity`/`key`/`value` are unknown (null) and the decay
/// class is always reported as `Stable` (§4.6, §9 open question).
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub record: VectorRecord,
    pub score: f64,
}

fn fold(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Merge lexical and vector hits: lexical-first id/text dedup, then a
/// stable score-descending sort, then truncate to `limit`.
pub fn merge_results(lexical: Vec<LexicalHit>, vector: Vec<VectorHit>, limit: usize) -> Vec<FusedHit> {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut seen_texts: HashSet<String> = HashSet::new();

    let mut fused: Vec<FusedHit> = Vec::with_capacity(lexical.len() + vector.len());

    for hit in lexical {
        seen_ids.insert(hit.id.clone());
        seen_texts.insert(fold(&hit.text));
        fused.push(FusedHit {
            id: hit.id,
            text: hit.text,
            category: hit.category,
            importance: hit.importance,
            entity: hit.entity,
            key: hit.key,
            value: hit.value,
            decay_class: hit.decay_class,
            expires_at: hit.expires_at,
            score: hit.score,
            source: HitSource::Lexical,
        });
    }

    for hit in vector {
        if seen_ids.contains(&hit.record.id) {
            continue;
        }
        if seen_texts.contains(&fold(&hit.record.text)) {
            continue;
        }
        seen_ids.insert(hit.record.id.clone());
        seen_texts.insert(fold(&hit.record.text));
        fused.push(FusedHit {
            id: hit.record.id,
            text: hit.record.text,
            category: hit.record.category,
            importance: hit.record.importance,
            entity: None,
            key: None,
            value: None,
            decay_class: DecayClass::Stable,
            expires_at: Expiry::Never,
            score: hit.score,
            source: HitSource::Vector,
        });
    }

    // Stable sort: ties keep lexical-before-vector and within-source
    // insertion order, matching the order the stores themselves returned.
    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    fused.truncate(limit);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(id: &str, text: &str, score: f64) -> LexicalHit {
        LexicalHit {
            id: id.into(),
            text: text.into(),
            category: Category::Fact,
            importance: 0.5,
            entity: None,
            key: None,
            value: None,
            decay_class: DecayClass::Stable,
            expires_at: Expiry::Never,
            score,
        }
    }

    fn vec_hit(id: &str, text: &str, score: f64) -> VectorHit {
        VectorHit {
            record: VectorRecord {
                id: id.into(),
                text: text.into(),
                importance: 0.5,
                category: Category::Fact,
                created_at: 0,
            },
            score,
        }
    }

    #[test]
    fn lexical_id_wins_over_vector_duplicate() {
        let out = merge_results(vec![lex("1", "hello", 0.9)], vec![vec_hit("1", "hello", 0.99)], 10);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, HitSource::Lexical);
        assert_eq!(out[0].score, 0.9);
    }

    #[test]
    fn case_folded_text_dedup_drops_vector_copy() {
        let out = merge_results(
            vec![lex("1", "Hello World", 0.9)],
            vec![vec_hit("2", "hello world", 0.99)],
            10,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "1");
    }

    #[test]
    fn distinct_hits_are_sorted_by_score_descending() {
        let out = merge_results(
            vec![lex("1", "a", 0.3)],
            vec![vec_hit("2", "b", 0.8), vec_hit("3", "c", 0.5)],
            10,
        );
        let scores: Vec<f64> = out.iter().map(|h| h.score).collect();
        assert_eq!(scores, vec![0.8, 0.5, 0.3]);
    }

    #[test]
    fn truncates_to_limit() {
        let vector = (0..10).map(|i| vec_hit(&i.to_string(), &format!("text{i}"), i as f64)).collect();
        let out = merge_results(vec![], vector, 3);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].score, 9.0);
    }

    #[test]
    fn vector_only_hits_project_null_structured_fields_and_stable_decay() {
        let out = merge_results(vec![], vec![vec_hit("1", "x", 0.5)], 10);
        assert_eq!(out[0].entity, None);
        assert_eq!(out[0].key, None);
        assert_eq!(out[0].value, None);
        assert_eq!(out[0].decay_class, DecayClass::Stable);
    }
}
