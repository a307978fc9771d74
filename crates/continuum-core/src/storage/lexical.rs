//! The lexical store: SQLite + FTS5 backing for [`MemoryEntry`] rows.
//!
//! Single-writer/multi-reader split: all mutating statements go through
//! `writer` (held for the duration of the call), reads go through
//! `reader`. Both connections point at the same file opened in WAL mode
//! so reads never block on a write in progress.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::clock::Clock;
use crate::decay;
use crate::entry::{Category, DecayClass, Expiry, MemoryEntry, StoreCandidate};
use crate::error::{Result, StorageError};
use crate::extractor;
use crate::fuse::LexicalHit;
use crate::synonyms::expand_synonyms;

use super::migrations::migrate;

const CANDIDATE_MULTIPLIER: usize = 2;
const BM25_WEIGHT: f64 = 0.60;
const FRESHNESS_WEIGHT: f64 = 0.25;
const CONFIDENCE_WEIGHT: f64 = 0.15;
const FRESHNESS_WINDOW_SECS: f64 = 7.0 * 86_400.0;
const MIN_CONFIDENCE: f64 = 0.05;

pub struct LexicalStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl LexicalStore {
    /// Open (creating if needed) the SQLite database at `path`, running
    /// every migration before returning.
    pub fn open(path: &Path, clock: Arc<dyn Clock>) -> Result<Self> {
        let writer = Connection::open(path)?;
        writer.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
        migrate(&writer)?;

        let reader = Connection::open(path)?;
        reader.execute_batch("PRAGMA journal_mode = WAL;")?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            clock,
        })
    }

    /// In-process store for tests: a private, file-backed temp database
    /// rather than `:memory:`, since two independent connections to an
    /// in-memory database don't see each other's data.
    #[cfg(test)]
    pub fn open_temp(clock: Arc<dyn Clock>) -> (Self, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("memories.sqlite3");
        let store = Self::open(&path, clock).expect("open lexical store");
        (store, dir)
    }

    fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Insert a new entry, or upsert in place when it collides with an
    /// existing (entity, key) pair.
    pub fn store(&self, candidate: StoreCandidate) -> Result<MemoryEntry> {
        if candidate.text.trim().is_empty() {
            return Err(StorageError::InvalidInput("text must not be empty".into()));
        }

        let now = self.now();
        let category = candidate
            .category
            .unwrap_or_else(|| extractor::detect_category(&candidate.text));
        let importance = candidate.importance.unwrap_or(0.5).clamp(0.0, 1.0);
        let decay_class = candidate
            .decay_class
            .unwrap_or_else(|| decay::classify_decay(candidate.entity.as_deref(), candidate.key.as_deref(), &candidate.text));
        let expires_at = candidate
            .expires_at
            .unwrap_or_else(|| decay::calculate_expiry(decay_class, now));
        let derived_tags = expand_synonyms(
            &candidate.text,
            candidate.entity.as_deref(),
            candidate.key.as_deref(),
            candidate.value.as_deref(),
        );
        let search_tags = match candidate.search_tags {
            Some(extra) if !extra.trim().is_empty() => format!("{derived_tags} {extra}").trim().to_string(),
            _ => derived_tags,
        };

        let entry = MemoryEntry {
            id: Uuid::new_v4().to_string(),
            text: candidate.text,
            category,
            importance,
            entity: candidate.entity,
            key: candidate.key,
            value: candidate.value,
            source: candidate.source,
            created_at: now,
            decay_class,
            expires_at,
            last_confirmed_at: now,
            confidence: 1.0,
            search_tags,
        };
        entry
            .check_invariants()
            .map_err(StorageError::InvalidInput)?;

        let conn = self.writer.lock().expect("writer lock poisoned");
        if let (Some(entity), Some(key)) = (entry.entity.as_deref(), entry.key.as_deref()) {
            if let Some(existing_id) = lookup_id_by_entity_key(&conn, entity, key)? {
                return self.upsert_existing(&conn, &existing_id, entry);
            }
        }
        insert_row(&conn, &entry)?;
        Ok(entry)
    }

    fn upsert_existing(&self, conn: &Connection, id: &str, mut entry: MemoryEntry) -> Result<MemoryEntry> {
        entry.id = id.to_string();
        conn.execute(
            "UPDATE memories SET
                text = ?1, category = ?2, importance = ?3, value = ?4, source = ?5,
                decay_class = ?6, expires_at = ?7, last_confirmed_at = ?8,
                confidence = 1.0, search_tags = ?9
             WHERE id = ?10",
            params![
                entry.text,
                entry.category.as_str(),
                entry.importance,
                entry.value,
                entry.source,
                entry.decay_class.as_str(),
                entry.expires_at.as_seconds(),
                entry.last_confirmed_at,
                entry.search_tags,
                entry.id,
            ],
        )?;
        Ok(entry)
    }

    /// FTS5 search with composite ranking. Pulls `2 * limit` candidates
    /// by raw bm25 rank before computing the composite score, so a
    /// high-bm25 but low-freshness row just outside that window is
    /// never reconsidered — preserved intentionally as documented.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<LexicalHit>> {
        let Some(match_expr) = crate::tokenizer::compile_query(query) else {
            return Ok(Vec::new());
        };
        let now = self.now();
        let candidate_limit = (limit * CANDIDATE_MULTIPLIER).max(limit);

        let conn = self.reader.lock().expect("reader lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT m.id, m.text, m.category, m.importance, m.entity, m.key, m.value,
                    m.source, m.created_at, m.decay_class, m.expires_at, m.last_confirmed_at,
                    m.confidence, m.search_tags, bm25(memories_fts) as rank
             FROM memories_fts
             JOIN memories m ON m.id = memories_fts.id
             WHERE memories_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![match_expr, candidate_limit as i64], |row| {
            let entry = row_to_entry(row)?;
            let rank: f64 = row.get("rank")?;
            Ok((entry, rank))
        })?;

        let mut candidates = Vec::new();
        for row in rows {
            let (entry, rank) = row?;
            if entry.expires_at.is_expired_at(now) {
                continue;
            }
            candidates.push((entry, rank));
        }

        // bm25's normalization range comes from this batch, not a fixed
        // scale, so a tie across every candidate scores them all 1.0.
        let (min_rank, max_rank) = candidates.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), (_, rank)| (lo.min(*rank), hi.max(*rank)),
        );

        let mut hits: Vec<LexicalHit> = candidates
            .into_iter()
            .map(|(entry, rank)| {
                let score = composite_score(rank, min_rank, max_rank, &entry, now);
                LexicalHit {
                    id: entry.id,
                    text: entry.text,
                    category: entry.category,
                    importance: entry.importance,
                    entity: entry.entity,
                    key: entry.key,
                    value: entry.value,
                    decay_class: entry.decay_class,
                    expires_at: entry.expires_at,
                    score,
                }
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    /// All non-expired records matching `entity` (case-insensitive),
    /// optionally narrowed further to an exact `key` (also
    /// case-insensitive); ordered by confidence desc, then createdAt
    /// desc. Triggers an access refresh on every returned row.
    pub fn lookup(&self, entity: &str, key: Option<&str>) -> Result<Vec<MemoryEntry>> {
        let now = self.now();
        let entries: Vec<MemoryEntry> = {
            let conn = self.reader.lock().expect("reader lock poisoned");
            match key {
                Some(key) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, text, category, importance, entity, key, value, source, created_at,
                                decay_class, expires_at, last_confirmed_at, confidence, search_tags
                         FROM memories
                         WHERE lower(entity) = lower(?1) AND lower(key) = lower(?2)
                         ORDER BY confidence DESC, created_at DESC",
                    )?;
                    stmt.query_map(params![entity, key], row_to_entry)?
                        .collect::<std::result::Result<_, _>>()?
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, text, category, importance, entity, key, value, source, created_at,
                                decay_class, expires_at, last_confirmed_at, confidence, search_tags
                         FROM memories
                         WHERE lower(entity) = lower(?1)
                         ORDER BY confidence DESC, created_at DESC",
                    )?;
                    stmt.query_map(params![entity], row_to_entry)?
                        .collect::<std::result::Result<_, _>>()?
                }
            }
        };

        let live: Vec<MemoryEntry> = entries.into_iter().filter(|e| !e.expires_at.is_expired_at(now)).collect();
        for entry in &live {
            self.refresh_access(&entry.id)?;
        }
        live.into_iter()
            .map(|entry| self.get(&entry.id).map(|refreshed| refreshed.unwrap_or(entry)))
            .collect()
    }

    pub fn get(&self, id: &str) -> Result<Option<MemoryEntry>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        conn.query_row(
            "SELECT id, text, category, importance, entity, key, value, source, created_at,
                    decay_class, expires_at, last_confirmed_at, confidence, search_tags
             FROM memories WHERE id = ?1",
            params![id],
            row_to_entry,
        )
        .optional()
        .map_err(StorageError::from)
    }

    /// Bump `last_confirmed_at` to now; extend `expires_at` for
    /// refreshable decay classes (stable/active) per §4.5.
    pub fn refresh_access(&self, id: &str) -> Result<()> {
        let now = self.now();
        let conn = self.writer.lock().expect("writer lock poisoned");
        let decay_class: Option<String> = conn
            .query_row("SELECT decay_class FROM memories WHERE id = ?1", params![id], |r| r.get(0))
            .optional()?;
        let Some(decay_class) = decay_class.and_then(|s| DecayClass::parse_name(&s)) else {
            return Ok(());
        };
        if decay_class.is_refreshable() {
            let new_expiry = decay::calculate_expiry(decay_class, now);
            conn.execute(
                "UPDATE memories SET last_confirmed_at = ?1, expires_at = ?2 WHERE id = ?3",
                params![now, new_expiry.as_seconds(), id],
            )?;
        } else {
            conn.execute("UPDATE memories SET last_confirmed_at = ?1 WHERE id = ?2", params![now, id])?;
        }
        Ok(())
    }

    /// Explicit re-confirmation: resets confidence to 1.0 in addition to
    /// the access refresh above.
    pub fn confirm_fact(&self, id: &str) -> Result<()> {
        self.refresh_access(id)?;
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute("UPDATE memories SET confidence = 1.0 WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Periodic soft decay: confidence is recomputed from scratch each
    /// pass as the fraction of an entry's lifetime remaining, floored at
    /// [`MIN_CONFIDENCE`]. Pure and idempotent: re-running it without an
    /// intervening access never moves confidence further than a single
    /// pass would.
    pub fn decay_confidence_pass(&self) -> Result<usize> {
        let now = self.now();
        let conn = self.writer.lock().expect("writer lock poisoned");
        let updated = conn.execute(
            "UPDATE memories SET confidence = MAX(
                ?1,
                1.0 - CAST(?2 - last_confirmed_at AS REAL) / CAST(expires_at - last_confirmed_at AS REAL)
             )
             WHERE decay_class != 'permanent' AND expires_at IS NOT NULL",
            params![MIN_CONFIDENCE, now],
        )?;
        tracing::debug!(updated, "applied confidence decay pass");
        Ok(updated)
    }

    /// Hard-delete every row whose `expires_at` has passed, returning the
    /// count and the deleted ids (the caller mirrors the latter into the
    /// vector index). Permanent entries are never eligible (their
    /// `expires_at` is always null).
    pub fn prune_expired(&self) -> Result<(usize, Vec<String>)> {
        let now = self.now();
        let conn = self.writer.lock().expect("writer lock poisoned");
        let ids: Vec<String> = {
            let mut stmt = conn
                .prepare("DELETE FROM memories WHERE expires_at IS NOT NULL AND expires_at <= ?1 RETURNING id")?;
            stmt.query_map(params![now], |row| row.get(0))?
                .collect::<std::result::Result<_, _>>()?
        };
        if !ids.is_empty() {
            tracing::info!(deleted = ids.len(), "pruned expired memories");
        }
        Ok((ids.len(), ids))
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        let deleted = conn.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// Exact-text duplicate check, used by the store path's idempotency
    /// guard before a new row is written.
    pub fn has_duplicate(&self, text: &str) -> Result<bool> {
        Ok(self.find_by_text(text)?.is_some())
    }

    pub fn find_by_text(&self, text: &str) -> Result<Option<MemoryEntry>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        conn.query_row(
            "SELECT id, text, category, importance, entity, key, value, source, created_at,
                    decay_class, expires_at, last_confirmed_at, confidence, search_tags
             FROM memories WHERE text = ?1 LIMIT 1",
            params![text],
            row_to_entry,
        )
        .optional()
        .map_err(StorageError::from)
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        conn.query_row("SELECT COUNT(*) FROM memories", [], |r| r.get(0))
            .map_err(StorageError::from)
    }

    pub fn count_expired(&self) -> Result<i64> {
        let now = self.now();
        let conn = self.reader.lock().expect("reader lock poisoned");
        conn.query_row(
            "SELECT COUNT(*) FROM memories WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now],
            |r| r.get(0),
        )
        .map_err(StorageError::from)
    }

    /// Row counts grouped by decay class, for CLI `stats`.
    pub fn stats_breakdown(&self) -> Result<HashMap<String, i64>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let mut stmt = conn.prepare("SELECT decay_class, COUNT(*) FROM memories GROUP BY decay_class")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        let mut map = HashMap::new();
        for row in rows {
            let (class, count) = row?;
            map.insert(class, count);
        }
        Ok(map)
    }

    /// Re-run the decay classifier against every row and persist any
    /// class that changed, recomputing `expires_at` to match. Used by
    /// the CLI `backfill-decay` subcommand after classifier changes.
    pub fn backfill_decay_classes(&self) -> Result<usize> {
        let now = self.now();
        let conn = self.writer.lock().expect("writer lock poisoned");
        let mut stmt = conn.prepare("SELECT id, entity, key, text, decay_class FROM memories")?;
        let rows: Vec<(String, Option<String>, Option<String>, String, String)> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;
        drop(stmt);

        let mut updated = 0;
        for (id, entity, key, text, current) in rows {
            let recomputed = decay::classify_decay(entity.as_deref(), key.as_deref(), &text);
            if recomputed.as_str() != current {
                let expiry = decay::calculate_expiry(recomputed, now);
                conn.execute(
                    "UPDATE memories SET decay_class = ?1, expires_at = ?2 WHERE id = ?3",
                    params![recomputed.as_str(), expiry.as_seconds(), id],
                )?;
                updated += 1;
            }
        }
        Ok(updated)
    }

    /// Persist a checkpoint under `entity="system"`,
    /// `key="checkpoint:<label>"`, upserting if the label already
    /// exists.
    pub fn save_checkpoint(&self, label: &str, payload: &str) -> Result<MemoryEntry> {
        self.store(StoreCandidate {
            text: payload.to_string(),
            category: Some(Category::Other),
            entity: Some("system".to_string()),
            key: Some(format!("checkpoint:{label}")),
            decay_class: Some(DecayClass::Checkpoint),
            ..Default::default()
        })
    }

    pub fn restore_checkpoint(&self, label: &str) -> Result<Option<MemoryEntry>> {
        Ok(self.lookup("system", Some(&format!("checkpoint:{label}")))?.into_iter().next())
    }

    /// Restore the most recently created non-expired checkpoint,
    /// regardless of its label.
    pub fn latest_checkpoint(&self) -> Result<Option<MemoryEntry>> {
        let now = self.now();
        let conn = self.reader.lock().expect("reader lock poisoned");
        let entry = conn
            .query_row(
                "SELECT id, text, category, importance, entity, key, value, source, created_at,
                        decay_class, expires_at, last_confirmed_at, confidence, search_tags
                 FROM memories
                 WHERE entity = 'system' AND key LIKE 'checkpoint:%'
                 ORDER BY created_at DESC
                 LIMIT 1",
                [],
                row_to_entry,
            )
            .optional()?;
        Ok(entry.filter(|e| !e.expires_at.is_expired_at(now)))
    }
}

fn lookup_id_by_entity_key(conn: &Connection, entity: &str, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT id FROM memories WHERE lower(entity) = lower(?1) AND lower(key) = lower(?2)",
        params![entity, key],
        |row| row.get(0),
    )
    .optional()
    .map_err(StorageError::from)
}

fn insert_row(conn: &Connection, entry: &MemoryEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO memories (
            id, text, category, importance, entity, key, value, source,
            created_at, decay_class, expires_at, last_confirmed_at, confidence, search_tags
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            entry.id,
            entry.text,
            entry.category.as_str(),
            entry.importance,
            entry.entity,
            entry.key,
            entry.value,
            entry.source,
            entry.created_at,
            entry.decay_class.as_str(),
            entry.expires_at.as_seconds(),
            entry.last_confirmed_at,
            entry.confidence,
            entry.search_tags,
        ],
    )?;
    Ok(())
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<MemoryEntry> {
    let category: String = row.get("category")?;
    let decay_class: String = row.get("decay_class")?;
    let expires_at: Option<i64> = row.get("expires_at")?;
    Ok(MemoryEntry {
        id: row.get("id")?,
        text: row.get("text")?,
        category: Category::parse_name(&category),
        importance: row.get("importance")?,
        entity: row.get("entity")?,
        key: row.get("key")?,
        value: row.get("value")?,
        source: row.get("source")?,
        created_at: row.get("created_at")?,
        decay_class: DecayClass::parse_name(&decay_class).unwrap_or(DecayClass::Stable),
        expires_at: Expiry::from_seconds(expires_at),
        last_confirmed_at: row.get("last_confirmed_at")?,
        confidence: row.get("confidence")?,
        search_tags: row.get("search_tags")?,
    })
}

/// `bm25_rank` is SQLite's raw (negative-is-better) rank; `min_rank` and
/// `max_rank` are its range across the whole candidate batch, so the
/// normalized bm25 term is always 1.0 for the batch's best match and 0.0
/// for its worst (1.0 across the board when every candidate ties).
/// Freshness comes from time-to-expiry, not recency of confirmation:
/// permanent entries are always fresh, already-expired ones never are,
/// and everything else ramps linearly over the week before it expires.
fn composite_score(bm25_rank: f64, min_rank: f64, max_rank: f64, entry: &MemoryEntry, now: i64) -> f64 {
    let denom = (max_rank - min_rank).max(1.0);
    let bm25 = 1.0 - (bm25_rank - min_rank) / denom;
    let freshness = match entry.expires_at {
        Expiry::Never => 1.0,
        Expiry::At(expires_at) if expires_at <= now => 0.0,
        Expiry::At(expires_at) => ((expires_at - now) as f64 / FRESHNESS_WINDOW_SECS).min(1.0),
    };
    BM25_WEIGHT * bm25 + FRESHNESS_WEIGHT * freshness + CONFIDENCE_WEIGHT * entry.confidence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;

    fn store_with_clock(seconds: i64) -> (LexicalStore, tempfile::TempDir, Arc<TestClock>) {
        let clock = Arc::new(TestClock::new(seconds));
        let (store, dir) = LexicalStore::open_temp(clock.clone());
        (store, dir, clock)
    }

    #[test]
    fn store_and_search_round_trip() {
        let (store, _dir, _clock) = store_with_clock(1_000);
        store
            .store(StoreCandidate {
                text: "I prefer TypeScript over JavaScript for new projects".into(),
                ..Default::default()
            })
            .unwrap();
        let hits = store.search("typescript", 5).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn entity_key_collision_upserts_instead_of_duplicating() {
        let (store, _dir, _clock) = store_with_clock(1_000);
        store
            .store(StoreCandidate {
                text: "Fred's editor is VSCode".into(),
                entity: Some("Fred".into()),
                key: Some("editor".into()),
                value: Some("VSCode".into()),
                ..Default::default()
            })
            .unwrap();
        store
            .store(StoreCandidate {
                text: "Fred's editor is Neovim".into(),
                entity: Some("Fred".into()),
                key: Some("editor".into()),
                value: Some("Neovim".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(store.count().unwrap(), 1);
        let looked_up = store.lookup("fred", Some("EDITOR")).unwrap();
        assert_eq!(looked_up.len(), 1);
        assert_eq!(looked_up[0].value.as_deref(), Some("Neovim"));
    }

    #[test]
    fn prune_expired_removes_only_past_due_rows() {
        let (store, _dir, clock) = store_with_clock(1_000);
        let entry = store
            .store(StoreCandidate {
                text: "short-lived session note".into(),
                decay_class: Some(DecayClass::Session),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(store.prune_expired().unwrap(), (0, Vec::new()));
        clock.advance(25 * 3_600);
        assert_eq!(store.prune_expired().unwrap(), (1, vec![entry.id]));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn permanent_entries_never_expire() {
        let (store, _dir, clock) = store_with_clock(1_000);
        store
            .store(StoreCandidate {
                text: "My birthday is June 3rd".into(),
                decay_class: Some(DecayClass::Permanent),
                ..Default::default()
            })
            .unwrap();
        clock.advance(1_000 * 86_400);
        assert_eq!(store.prune_expired().unwrap().0, 0);
    }

    #[test]
    fn lookup_without_key_returns_every_entity_row() {
        let (store, _dir, _clock) = store_with_clock(1_000);
        store
            .store(StoreCandidate {
                text: "Fred's editor is VSCode".into(),
                entity: Some("Fred".into()),
                key: Some("editor".into()),
                value: Some("VSCode".into()),
                ..Default::default()
            })
            .unwrap();
        store
            .store(StoreCandidate {
                text: "Fred's shell is fish".into(),
                entity: Some("Fred".into()),
                key: Some("shell".into()),
                value: Some("fish".into()),
                ..Default::default()
            })
            .unwrap();
        let rows = store.lookup("FRED", None).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn has_duplicate_matches_exact_text_only() {
        let (store, _dir, _clock) = store_with_clock(1_000);
        store
            .store(StoreCandidate { text: "I prefer tabs over spaces".into(), ..Default::default() })
            .unwrap();
        assert!(store.has_duplicate("I prefer tabs over spaces").unwrap());
        assert!(!store.has_duplicate("I prefer spaces over tabs").unwrap());
    }

    #[test]
    fn decay_confidence_pass_is_idempotent() {
        let (store, _dir, clock) = store_with_clock(1_000);
        let entry = store
            .store(StoreCandidate {
                text: "working on the parser this week".into(),
                decay_class: Some(DecayClass::Active),
                ..Default::default()
            })
            .unwrap();
        clock.advance(3 * 86_400);
        store.decay_confidence_pass().unwrap();
        let once = store.get(&entry.id).unwrap().unwrap().confidence;
        store.decay_confidence_pass().unwrap();
        let twice = store.get(&entry.id).unwrap().unwrap().confidence;
        assert_eq!(once, twice);
    }

    #[test]
    fn refresh_access_extends_expiry_for_refreshable_classes() {
        let (store, _dir, clock) = store_with_clock(1_000);
        let entry = store
            .store(StoreCandidate {
                text: "working on the parser this week".into(),
                decay_class: Some(DecayClass::Active),
                ..Default::default()
            })
            .unwrap();
        let original_expiry = entry.expires_at.as_seconds().unwrap();
        clock.advance(3_600);
        store.refresh_access(&entry.id).unwrap();
        let refreshed = store.get(&entry.id).unwrap().unwrap();
        assert!(refreshed.expires_at.as_seconds().unwrap() > original_expiry);
    }

    #[test]
    fn confirm_fact_resets_confidence() {
        let (store, _dir, clock) = store_with_clock(1_000);
        let entry = store
            .store(StoreCandidate {
                text: "I prefer dark themes in every editor I use".into(),
                ..Default::default()
            })
            .unwrap();
        clock.advance(2 * 86_400);
        store.decay_confidence_pass().unwrap();
        let decayed = store.get(&entry.id).unwrap().unwrap();
        assert!(decayed.confidence < 1.0);
        store.confirm_fact(&entry.id).unwrap();
        let confirmed = store.get(&entry.id).unwrap().unwrap();
        assert_eq!(confirmed.confidence, 1.0);
    }

    #[test]
    fn checkpoint_save_and_restore() {
        let (store, _dir, _clock) = store_with_clock(1_000);
        store.save_checkpoint("pre-refactor", "{\"branch\":\"main\"}").unwrap();
        let restored = store.restore_checkpoint("pre-refactor").unwrap().unwrap();
        assert_eq!(restored.text, "{\"branch\":\"main\"}");
        assert_eq!(restored.decay_class, DecayClass::Checkpoint);
    }

    #[test]
    fn backfill_decay_classes_updates_misclassified_rows() {
        let (store, _dir, _clock) = store_with_clock(1_000);
        let entry = store
            .store(StoreCandidate {
                text: "My birthday is June 3rd".into(),
                decay_class: Some(DecayClass::Stable),
                ..Default::default()
            })
            .unwrap();
        let updated = store.backfill_decay_classes().unwrap();
        assert_eq!(updated, 1);
        let fixed = store.get(&entry.id).unwrap().unwrap();
        assert_eq!(fixed.decay_class, DecayClass::Permanent);
    }

    #[test]
    fn empty_text_is_rejected() {
        let (store, _dir, _clock) = store_with_clock(1_000);
        let result = store.store(StoreCandidate { text: "   ".into(), ..Default::default() });
        assert!(result.is_err());
    }
}
