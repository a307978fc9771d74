//! The recall/store facade (§4.8): orchestrates extractor -> stores ->
//! fuser behind five async operations, plus the scheduled maintenance
//! loop and the auto-recall/auto-capture conversation hooks.

use std::sync::Arc;

use continuum_core::{
    extractor, merge_results, Category, Clock, FusedHit, HitSource, LexicalHit, MemoryEntry, StoreCandidate,
    SystemClock,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{FacadeError, Result};
use crate::markdown::MarkdownCandidate;

#[cfg(feature = "vector-search")]
use continuum_core::{embedding::EmbeddingProvider, VectorStore};

/// Prompts shorter than this never trigger auto-recall (§4.8).
const AUTO_RECALL_MIN_PROMPT_LEN: usize = 5;
/// Auto-recall fans out to this many lexical and this many vector hits
/// before fusing down to [`AUTO_RECALL_FUSED_LIMIT`].
const AUTO_RECALL_SUB_LIMIT: usize = 3;
const AUTO_RECALL_FUSED_LIMIT: usize = 5;
/// Auto-capture never stores more than this many statements per turn.
const AGENT_END_CAPTURE_CAP: usize = 3;
/// `forget` without an id fuses this many disambiguation candidates.
const FORGET_CANDIDATE_LIMIT: usize = 5;
/// Startup markdown ingestion only looks at daily notes from this far back.
const MARKDOWN_INGEST_LOOKBACK_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointPayload {
    pub intent: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_files: Option<Vec<String>>,
    pub saved_at: i64,
}

#[derive(Debug, Default, Serialize)]
pub struct MaintenanceReport {
    pub pruned: usize,
    pub confidence_decayed: usize,
}

/// Whether `store` wrote a new row or matched an existing one by exact
/// text (§4.8's `hasDuplicate(text)` guard).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreAction {
    Created,
    Duplicate,
}

/// What `forget` did: either it deleted a row by id, or (called with a
/// query instead) it returns disambiguation candidates without deleting
/// anything.
#[derive(Debug, Clone)]
pub enum ForgetOutcome {
    Deleted(bool),
    Candidates(Vec<FusedHit>),
}

pub struct MemoryFacade {
    lexical: Arc<continuum_core::LexicalStore>,
    #[cfg(feature = "vector-search")]
    vector: Arc<VectorStore>,
    #[cfg(feature = "vector-search")]
    embedder: Arc<dyn EmbeddingProvider>,
    config: Config,
    clock: Arc<dyn Clock>,
}

impl MemoryFacade {
    pub async fn new(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let lexical_path = config.lexical_db_path();
        let clock_for_open = clock.clone();
        let lexical = tokio::task::spawn_blocking(move || {
            continuum_core::LexicalStore::open(&lexical_path, clock_for_open)
        })
        .await??;

        #[cfg(feature = "vector-search")]
        let embedder: Arc<dyn EmbeddingProvider> = {
            #[cfg(feature = "embeddings")]
            {
                Arc::new(continuum_core::embedding::LocalEmbeddingProvider::new()?)
            }
            #[cfg(not(feature = "embeddings"))]
            {
                Arc::new(continuum_core::embedding::StaticEmbeddingProvider::default())
            }
        };

        #[cfg(feature = "vector-search")]
        let vector = {
            let dims = embedder.dimensions();
            let vector_dir = config.vector_index_dir();
            Arc::new(tokio::task::spawn_blocking(move || VectorStore::open(&vector_dir, dims)).await??)
        };

        Ok(Self {
            lexical,
            #[cfg(feature = "vector-search")]
            vector,
            #[cfg(feature = "vector-search")]
            embedder,
            config,
            clock,
        })
    }

    fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Hybrid recall: lexical FTS search plus (when available) vector
    /// kNN search, fused with `merge_results`. When `entity` is set this
    /// bypasses the hybrid search entirely and does a structured lookup
    /// instead, matching §4.8.
    pub async fn recall(&self, query: &str, entity: Option<&str>, limit: Option<usize>) -> Result<Vec<FusedHit>> {
        let limit = limit.unwrap_or(self.config.recall_limit);
        if let Some(entity) = entity {
            let mut hits: Vec<FusedHit> = self.lookup(entity, None).await?.into_iter().map(entry_to_fused_hit).collect();
            hits.truncate(limit);
            return Ok(hits);
        }
        self.hybrid_search(query, limit, limit, limit).await
    }

    /// Run lexical and vector search concurrently and fuse the results.
    /// Shared by `recall` and the auto-recall hook, which fan out to
    /// different sub-limits before fusing.
    async fn hybrid_search(
        &self,
        query: &str,
        lexical_limit: usize,
        vector_limit: usize,
        fused_limit: usize,
    ) -> Result<Vec<FusedHit>> {
        let lexical = self.lexical.clone();
        let query_owned = query.to_string();
        let lexical_hits: Vec<LexicalHit> =
            tokio::task::spawn_blocking(move || lexical.search(&query_owned, lexical_limit)).await??;

        #[cfg(feature = "vector-search")]
        let vector_hits = {
            let embedder = self.embedder.clone();
            let vector = self.vector.clone();
            let min_score = self.config.min_vector_score;
            let query_owned = query.to_string();
            tokio::task::spawn_blocking(move || {
                let embedding = vector.embed_query(embedder.as_ref(), &query_owned).map_err(FacadeError::from)?;
                vector.search(&embedding, vector_limit, Some(min_score)).map_err(FacadeError::from)
            })
            .await??
        };
        #[cfg(not(feature = "vector-search"))]
        let vector_hits = Vec::new();

        Ok(merge_results(lexical_hits, vector_hits, fused_limit))
    }

    /// Structured lookup by entity, optionally narrowed to an exact key.
    /// Triggers an access refresh on every returned row.
    pub async fn lookup(&self, entity: &str, key: Option<&str>) -> Result<Vec<MemoryEntry>> {
        let lexical = self.lexical.clone();
        let entity_owned = entity.to_string();
        let key_owned = key.map(str::to_string);
        Ok(tokio::task::spawn_blocking(move || lexical.lookup(&entity_owned, key_owned.as_deref())).await??)
    }

    /// Store a new statement. Runs the extractor when the caller hasn't
    /// already supplied structured fields, then checks for an exact-text
    /// duplicate before upserting into both stores.
    pub async fn store(&self, mut candidate: StoreCandidate) -> Result<(MemoryEntry, StoreAction)> {
        if candidate.category.is_none() {
            candidate.category = Some(extractor::detect_category(&candidate.text));
        }
        if candidate.entity.is_none() && candidate.key.is_none() {
            let extracted = extractor::extract(&candidate.text, candidate.category.unwrap_or(Category::Other));
            candidate.entity = extracted.entity;
            candidate.key = extracted.key;
            candidate.value = extracted.value;
        }

        let lexical = self.lexical.clone();
        let text_for_check = candidate.text.clone();
        let existing = {
            let lexical = lexical.clone();
            tokio::task::spawn_blocking(move || lexical.find_by_text(&text_for_check)).await??
        };
        if let Some(entry) = existing {
            return Ok((entry, StoreAction::Duplicate));
        }

        let candidate_for_store = candidate.clone();
        let entry =
            tokio::task::spawn_blocking(move || lexical.store(candidate_for_store)).await??;

        #[cfg(feature = "vector-search")]
        {
            let embedder = self.embedder.clone();
            let vector = self.vector.clone();
            let entry_for_embed = entry.clone();
            tokio::task::spawn_blocking(move || {
                vector.embed_and_upsert(
                    embedder.as_ref(),
                    &entry_for_embed.id,
                    &entry_for_embed.text,
                    entry_for_embed.category,
                    entry_for_embed.importance,
                    entry_for_embed.created_at,
                )
            })
            .await??;
        }

        Ok((entry, StoreAction::Created))
    }

    /// Delete a memory by id from both stores, or — when called with a
    /// query instead of an id — return fused top candidates for the
    /// caller to disambiguate rather than guessing which one to delete.
    pub async fn forget(&self, id: Option<&str>, query: Option<&str>) -> Result<ForgetOutcome> {
        if let Some(id) = id {
            let lexical = self.lexical.clone();
            let id_owned = id.to_string();
            let deleted = tokio::task::spawn_blocking(move || lexical.delete(&id_owned)).await??;

            #[cfg(feature = "vector-search")]
            {
                let vector = self.vector.clone();
                let id_owned = id.to_string();
                let _ = tokio::task::spawn_blocking(move || vector.delete(&id_owned)).await??;
            }

            return Ok(ForgetOutcome::Deleted(deleted));
        }

        let query = query.ok_or_else(|| FacadeError::InvalidInput("forget requires id or query".into()))?;
        let hits = self
            .hybrid_search(query, FORGET_CANDIDATE_LIMIT, FORGET_CANDIDATE_LIMIT, FORGET_CANDIDATE_LIMIT)
            .await?;
        Ok(ForgetOutcome::Candidates(hits))
    }

    /// Save a checkpoint under the current time as its key.
    pub async fn checkpoint(&self, payload: CheckpointPayload) -> Result<MemoryEntry> {
        let label = payload.saved_at.to_string();
        let json = serde_json::to_string(&payload)?;
        let lexical = self.lexical.clone();
        let entry = tokio::task::spawn_blocking(move || lexical.save_checkpoint(&label, &json)).await??;
        Ok(entry)
    }

    /// Restore a checkpoint by its label (the timestamp it was saved
    /// under).
    pub async fn restore_checkpoint(&self, label: &str) -> Result<Option<CheckpointPayload>> {
        let lexical = self.lexical.clone();
        let label_owned = label.to_string();
        let entry = tokio::task::spawn_blocking(move || lexical.restore_checkpoint(&label_owned)).await??;
        decode_checkpoint(entry)
    }

    /// Restore the most recent non-expired checkpoint, regardless of label.
    pub async fn restore_latest_checkpoint(&self) -> Result<Option<CheckpointPayload>> {
        let lexical = self.lexical.clone();
        let entry = tokio::task::spawn_blocking(move || lexical.latest_checkpoint()).await??;
        decode_checkpoint(entry)
    }

    /// Hard-prune expired entries, mirror the deletions into the vector
    /// index, and apply the soft confidence decay pass. Called on the
    /// maintenance tick and exposed directly as a CLI/tool operation.
    pub async fn prune(&self) -> Result<MaintenanceReport> {
        let lexical = self.lexical.clone();
        let (pruned_ids, confidence_decayed) = tokio::task::spawn_blocking(move || {
            let (_, ids) = lexical.prune_expired()?;
            let decayed = lexical.decay_confidence_pass()?;
            Ok::<_, FacadeError>((ids, decayed))
        })
        .await??;

        #[cfg(feature = "vector-search")]
        if !pruned_ids.is_empty() {
            let vector = self.vector.clone();
            let ids = pruned_ids.clone();
            tokio::task::spawn_blocking(move || vector.delete_many(&ids)).await??;
        }

        Ok(MaintenanceReport { pruned: pruned_ids.len(), confidence_decayed })
    }

    /// One-time startup sequence: prune (which mirrors into the vector
    /// index as part of `prune` above), then ingest recent daily
    /// markdown notes plus `MEMORY.md`.
    async fn run_startup_maintenance(&self) -> Result<()> {
        let report = self.prune().await?;
        tracing::info!(pruned = report.pruned, confidence_decayed = report.confidence_decayed, "startup prune complete");
        let stored = self.ingest_recent_markdown().await?;
        if stored > 0 {
            tracing::info!(stored, "ingested markdown notes on startup");
        }
        Ok(())
    }

    /// Scan `MEMORY.md` and daily notes from the last
    /// [`MARKDOWN_INGEST_LOOKBACK_DAYS`] days under the data directory
    /// and store any eligible candidates found.
    async fn ingest_recent_markdown(&self) -> Result<usize> {
        let mut candidates = Vec::new();

        let memory_md = self.config.data_dir.join("MEMORY.md");
        if memory_md.is_file() {
            candidates.extend(crate::markdown::scan_file(&memory_md)?);
        }

        let daily_dir = self.config.data_dir.join("daily");
        if daily_dir.is_dir() {
            let cutoff_secs = (MARKDOWN_INGEST_LOOKBACK_DAYS * 86_400) as u64;
            for entry in std::fs::read_dir(&daily_dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("md") {
                    continue;
                }
                let modified = std::fs::metadata(&path)?.modified()?;
                let age_secs = modified.elapsed().map(|d| d.as_secs()).unwrap_or(0);
                if age_secs <= cutoff_secs {
                    candidates.extend(crate::markdown::scan_file(&path)?);
                }
            }
        }

        self.ingest_markdown(candidates).await
    }

    /// Store markdown-derived candidates directly, bypassing the
    /// per-turn auto-capture cap. Used by startup ingestion and the CLI
    /// `extract-daily` command.
    pub async fn ingest_markdown(&self, candidates: Vec<MarkdownCandidate>) -> Result<usize> {
        let mut stored = 0;
        for candidate in candidates {
            if !extractor::should_capture(&candidate.text) {
                continue;
            }
            let store_candidate = StoreCandidate {
                text: candidate.text,
                source: Some(candidate.source),
                ..Default::default()
            };
            let (_, action) = self.store(store_candidate).await?;
            if action == StoreAction::Created {
                stored += 1;
            }
        }
        Ok(stored)
    }

    /// Spawn the maintenance task: an immediate startup pass (prune,
    /// vector mirror, markdown ingestion), then the periodic prune tick.
    /// The returned handle is detached; callers that need to stop it
    /// should abort it.
    pub fn spawn_maintenance_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let facade = self.clone();
        let interval_secs = facade.config.maintenance_interval_secs;
        tokio::spawn(async move {
            if let Err(err) = facade.run_startup_maintenance().await {
                tracing::warn!(error = %err, "startup maintenance failed");
            }
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                ticker.tick().await;
                match facade.prune().await {
                    Ok(report) => tracing::info!(
                        pruned = report.pruned,
                        confidence_decayed = report.confidence_decayed,
                        "maintenance tick complete"
                    ),
                    Err(err) => tracing::warn!(error = %err, "maintenance tick failed"),
                }
            }
        })
    }

    /// Pre-turn hook: gated on prompt length, fans out to lexical top-3
    /// and vector top-3, fuses to the combined top-5, and renders the
    /// result as a fenced block the agent can inline.
    pub async fn before_agent_start(&self, prompt: &str) -> Result<Option<String>> {
        if prompt.trim().chars().count() < AUTO_RECALL_MIN_PROMPT_LEN {
            return Ok(None);
        }
        let hits = self
            .hybrid_search(prompt, AUTO_RECALL_SUB_LIMIT, AUTO_RECALL_SUB_LIMIT, AUTO_RECALL_FUSED_LIMIT)
            .await?;
        if hits.is_empty() {
            return Ok(None);
        }
        let mut block = String::from("<relevant-memories>\n");
        for hit in hits {
            block.push_str(&format!("- {}\n", hit.text));
        }
        block.push_str("</relevant-memories>");
        Ok(Some(block))
    }

    /// Post-turn hook: on a successful turn, capture up to
    /// [`AGENT_END_CAPTURE_CAP`] eligible statements that resolve to an
    /// entity or key, skipping exact-text duplicates.
    pub async fn agent_end(&self, success: bool, messages: &[String]) -> Result<Vec<MemoryEntry>> {
        if !success {
            return Ok(Vec::new());
        }
        let mut captured = Vec::new();
        for text in messages {
            if captured.len() >= AGENT_END_CAPTURE_CAP {
                break;
            }
            if !extractor::should_capture(text) {
                continue;
            }
            let category = extractor::detect_category(text);
            let extracted = extractor::extract(text, category);
            if extracted.entity.is_none() && extracted.key.is_none() {
                continue;
            }
            let candidate = StoreCandidate {
                text: text.clone(),
                category: Some(category),
                entity: extracted.entity,
                key: extracted.key,
                value: extracted.value,
                source: Some("conversation".to_string()),
                ..Default::default()
            };
            let (entry, action) = self.store(candidate).await?;
            if action == StoreAction::Created {
                captured.push(entry);
            }
        }
        Ok(captured)
    }

    pub fn clock_now(&self) -> i64 {
        self.now()
    }

    /// Row counts grouped by decay class, for CLI `stats`.
    pub async fn stats(&self) -> Result<std::collections::HashMap<String, i64>> {
        let lexical = self.lexical.clone();
        Ok(tokio::task::spawn_blocking(move || lexical.stats_breakdown()).await??)
    }

    /// Re-run the decay classifier against every stored row. Used by the
    /// CLI `backfill-decay` subcommand after classifier changes.
    pub async fn backfill_decay_classes(&self) -> Result<usize> {
        let lexical = self.lexical.clone();
        Ok(tokio::task::spawn_blocking(move || lexical.backfill_decay_classes()).await??)
    }
}

fn decode_checkpoint(entry: Option<MemoryEntry>) -> Result<Option<CheckpointPayload>> {
    match entry {
        Some(entry) => Ok(Some(serde_json::from_str(&entry.text)?)),
        None => Ok(None),
    }
}

/// Project a structured-lookup row into the same shape hybrid search
/// hits carry, so callers don't need two result types.
fn entry_to_fused_hit(entry: MemoryEntry) -> FusedHit {
    FusedHit {
        id: entry.id,
        text: entry.text,
        category: entry.category,
        importance: entry.importance,
        entity: entry.entity,
        key: entry.key,
        value: entry.value,
        decay_class: entry.decay_class,
        expires_at: entry.expires_at,
        score: entry.confidence,
        source: HitSource::Lexical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config() -> (Config, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            maintenance_interval_secs: 1,
            min_vector_score: 0.0,
            recall_limit: 5,
        };
        (config, dir)
    }

    #[tokio::test]
    async fn store_then_recall_round_trip() {
        let (config, _dir) = temp_config();
        let facade = MemoryFacade::new(config).await.unwrap();
        facade
            .store(StoreCandidate {
                text: "I prefer TypeScript over JavaScript for new projects".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let hits = facade.recall("typescript", None, None).await.unwrap();
        assert!(!hits.is_empty());
    }

    #[tokio::test]
    async fn store_rejects_exact_text_duplicate() {
        let (config, _dir) = temp_config();
        let facade = MemoryFacade::new(config).await.unwrap();
        let (first, action) = facade
            .store(StoreCandidate { text: "I use Helix for everything".into(), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(action, StoreAction::Created);
        let (second, action) = facade
            .store(StoreCandidate { text: "I use Helix for everything".into(), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(action, StoreAction::Duplicate);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn recall_by_entity_bypasses_hybrid_search() {
        let (config, _dir) = temp_config();
        let facade = MemoryFacade::new(config).await.unwrap();
        facade
            .store(StoreCandidate {
                text: "Fred's editor is Helix".into(),
                entity: Some("Fred".into()),
                key: Some("editor".into()),
                value: Some("Helix".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let hits = facade.recall("irrelevant query text", Some("fred"), None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value.as_deref(), Some("Helix"));
    }

    #[tokio::test]
    async fn forget_removes_from_recall() {
        let (config, _dir) = temp_config();
        let facade = MemoryFacade::new(config).await.unwrap();
        let (entry, _) = facade
            .store(StoreCandidate {
                text: "I use Neovim for everything".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let outcome = facade.forget(Some(&entry.id), None).await.unwrap();
        assert!(matches!(outcome, ForgetOutcome::Deleted(true)));
        let hits = facade.recall("neovim", None, None).await.unwrap();
        assert!(hits.iter().all(|h| h.id != entry.id));
    }

    #[tokio::test]
    async fn forget_by_query_returns_candidates_without_deleting() {
        let (config, _dir) = temp_config();
        let facade = MemoryFacade::new(config).await.unwrap();
        facade
            .store(StoreCandidate { text: "I use Neovim for everything".into(), ..Default::default() })
            .await
            .unwrap();
        let outcome = facade.forget(None, Some("neovim")).await.unwrap();
        let ForgetOutcome::Candidates(hits) = outcome else { panic!("expected candidates") };
        assert!(!hits.is_empty());
        let hits = facade.recall("neovim", None, None).await.unwrap();
        assert!(!hits.is_empty());
    }

    #[tokio::test]
    async fn checkpoint_round_trip() {
        let (config, _dir) = temp_config();
        let facade = MemoryFacade::new(config).await.unwrap();
        let saved_at = facade.clock_now();
        facade
            .checkpoint(CheckpointPayload {
                intent: "refactor parser".into(),
                state: "halfway through tokenizer".into(),
                expected_outcome: None,
                working_files: Some(vec!["src/tokenizer.rs".into()]),
                saved_at,
            })
            .await
            .unwrap();
        let restored = facade.restore_checkpoint(&saved_at.to_string()).await.unwrap().unwrap();
        assert_eq!(restored.intent, "refactor parser");
    }

    #[tokio::test]
    async fn auto_capture_rejects_ineligible_text() {
        let (config, _dir) = temp_config();
        let facade = MemoryFacade::new(config).await.unwrap();
        let result = facade.agent_end(true, &["ok".to_string()]).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn auto_capture_skips_everything_on_a_failed_turn() {
        let (config, _dir) = temp_config();
        let facade = MemoryFacade::new(config).await.unwrap();
        let result = facade
            .agent_end(false, &["I prefer dark themes in every editor I use".to_string()])
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn auto_capture_accepts_eligible_text() {
        let (config, _dir) = temp_config();
        let facade = MemoryFacade::new(config).await.unwrap();
        let result = facade
            .agent_end(true, &["I prefer dark themes in every editor I use".to_string()])
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn auto_capture_caps_at_three_per_turn() {
        let (config, _dir) = temp_config();
        let facade = MemoryFacade::new(config).await.unwrap();
        let messages: Vec<String> = vec![
            "I prefer dark themes in every editor I use".to_string(),
            "I prefer tabs over spaces in every project".to_string(),
            "I prefer Rust over Go for new services".to_string(),
            "I prefer Neovim over every other editor I have tried".to_string(),
        ];
        let result = facade.agent_end(true, &messages).await.unwrap();
        assert_eq!(result.len(), 3);
    }

    #[tokio::test]
    async fn auto_capture_requires_an_entity_or_key() {
        let (config, _dir) = temp_config();
        let facade = MemoryFacade::new(config).await.unwrap();
        let result = facade
            .agent_end(true, &["remember to water the plants every single day".to_string()])
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn prune_reports_zero_when_nothing_is_expired() {
        let (config, _dir) = temp_config();
        let facade = MemoryFacade::new(config).await.unwrap();
        let report = facade.prune().await.unwrap();
        assert_eq!(report.pruned, 0);
    }
}
