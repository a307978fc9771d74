//! The vector store: a persisted `usearch` HNSW index over embedding
//! vectors, keyed by the same memory id used in the lexical store (§4.6).

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use lru::LruCache;
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};
use uuid::Uuid;

use crate::embedding::EmbeddingProvider;
use crate::entry::{Category, VectorRecord};
use crate::error::{Result, StorageError};
use crate::fuse::VectorHit;

const DEFAULT_MIN_SCORE: f64 = 0.3;
const DUPLICATE_THRESHOLD: f64 = 0.95;
const INDEX_FILE_NAME: &str = "memories.usearch";
const META_FILE_NAME: &str = "memories.meta.json";
const QUERY_CACHE_SIZE: usize = 100;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct RecordMeta {
    text: String,
    importance: f64,
    category: String,
    created_at: i64,
}

pub struct VectorStore {
    index: Mutex<Index>,
    metadata: Mutex<HashMap<String, RecordMeta>>,
    ids: Mutex<HashMap<String, u64>>,
    query_cache: Mutex<LruCache<String, Vec<f32>>>,
    dir: PathBuf,
    dims: usize,
}

fn validate_id(id: &str) -> Result<()> {
    Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| StorageError::InvalidInput(format!("id is not a valid uuid: {id}")))
}

/// Stable, deterministic numeric key derived from a uuid string. usearch
/// indexes by `u64`; we keep an id<->key table alongside since our
/// public records are addressed by uuid string everywhere else.
fn numeric_key(id: &str, existing: &HashMap<String, u64>) -> u64 {
    if let Some(key) = existing.get(id) {
        return *key;
    }
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::hash::Hash::hash(&id, &mut hasher);
    std::hash::Hasher::finish(&hasher)
}

impl VectorStore {
    /// Open or create the index directory at `dir`. The on-disk
    /// artifact is conceptually a table named "memories", matching the
    /// directory layout the external interface documents.
    pub fn open(dir: &Path, dims: usize) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let options = IndexOptions {
            dimensions: dims,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            ..Default::default()
        };
        let index = Index::new(&options).map_err(|e| StorageError::Init(e.to_string()))?;

        let index_path = dir.join(INDEX_FILE_NAME);
        let meta_path = dir.join(META_FILE_NAME);

        let mut metadata: HashMap<String, RecordMeta> = HashMap::new();
        let mut ids: HashMap<String, u64> = HashMap::new();

        if index_path.exists() {
            index.load(index_path.to_string_lossy().as_ref()).map_err(|e| StorageError::Init(e.to_string()))?;
        } else {
            index.reserve(1_000).map_err(|e| StorageError::Init(e.to_string()))?;
        }

        if meta_path.exists() {
            let raw = std::fs::read_to_string(&meta_path)?;
            let loaded: HashMap<String, (u64, RecordMeta)> = serde_json::from_str(&raw)
                .map_err(|e| StorageError::Init(format!("corrupt vector metadata: {e}")))?;
            for (id, (key, meta)) in loaded {
                ids.insert(id.clone(), key);
                metadata.insert(id, meta);
            }
        }

        Ok(Self {
            index: Mutex::new(index),
            metadata: Mutex::new(metadata),
            ids: Mutex::new(ids),
            query_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(QUERY_CACHE_SIZE).expect("cache size is non-zero"),
            )),
            dir: dir.to_path_buf(),
            dims,
        })
    }

    /// Embed a query string through `provider`, caching the result so
    /// repeated recall queries skip inference. Keyed on the raw query
    /// text, not normalized, since callers pass the same string verbatim
    /// on cache hits.
    pub fn embed_query(&self, provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
        if let Some(cached) = self.query_cache.lock().expect("query cache lock poisoned").get(text) {
            return Ok(cached.clone());
        }
        let embedding = provider.embed(text).map_err(|e| StorageError::Transient(e.to_string()))?;
        self.query_cache
            .lock()
            .expect("query cache lock poisoned")
            .put(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    fn persist(&self) -> Result<()> {
        let index = self.index.lock().expect("index lock poisoned");
        let index_path = self.dir.join(INDEX_FILE_NAME);
        index
            .save(index_path.to_string_lossy().as_ref())
            .map_err(|e| StorageError::Init(e.to_string()))?;
        drop(index);

        let ids = self.ids.lock().expect("ids lock poisoned");
        let metadata = self.metadata.lock().expect("metadata lock poisoned");
        let combined: HashMap<&String, (u64, &RecordMeta)> = metadata
            .iter()
            .map(|(id, meta)| (id, (*ids.get(id).expect("id must have numeric key"), meta)))
            .collect();
        let raw = serde_json::to_string(&combined)
            .map_err(|e| StorageError::Init(format!("failed to serialize vector metadata: {e}")))?;
        std::fs::write(self.dir.join(META_FILE_NAME), raw)?;
        Ok(())
    }

    /// Insert or replace the vector and metadata for `id`.
    pub fn upsert(&self, id: &str, text: &str, category: Category, importance: f64, created_at: i64, vector: &[f32]) -> Result<()> {
        validate_id(id)?;
        if vector.len() != self.dims {
            return Err(StorageError::InvalidInput(format!(
                "expected a {}-dimensional vector, got {}",
                self.dims,
                vector.len()
            )));
        }

        let mut ids = self.ids.lock().expect("ids lock poisoned");
        let key = numeric_key(id, &ids);
        let is_new = !ids.contains_key(id);
        ids.insert(id.to_string(), key);
        drop(ids);

        let index = self.index.lock().expect("index lock poisoned");
        if !is_new {
            let _ = index.remove(key);
        }
        if index.size() + 1 > index.capacity() {
            index
                .reserve(index.capacity() * 2 + 64)
                .map_err(|e| StorageError::Init(e.to_string()))?;
        }
        index.add(key, vector).map_err(|e| StorageError::Init(e.to_string()))?;
        drop(index);

        self.metadata.lock().expect("metadata lock poisoned").insert(
            id.to_string(),
            RecordMeta {
                text: text.to_string(),
                importance,
                category: category.as_str().to_string(),
                created_at,
            },
        );
        self.persist()
    }

    /// k-nearest-neighbor search, filtering hits below `min_score`
    /// (defaults to 0.3 when `None`).
    pub fn search(&self, vector: &[f32], limit: usize, min_score: Option<f64>) -> Result<Vec<VectorHit>> {
        if vector.len() != self.dims {
            return Err(StorageError::InvalidInput(format!(
                "expected a {}-dimensional query vector, got {}",
                self.dims,
                vector.len()
            )));
        }
        let min_score = min_score.unwrap_or(DEFAULT_MIN_SCORE);
        let index = self.index.lock().expect("index lock poisoned");
        let matches = index
            .search(vector, limit)
            .map_err(|e| StorageError::Init(e.to_string()))?;
        drop(index);

        let ids = self.ids.lock().expect("ids lock poisoned");
        let metadata = self.metadata.lock().expect("metadata lock poisoned");

        let mut hits = Vec::new();
        for (key, distance) in matches.keys.iter().zip(matches.distances.iter()) {
            let Some(id) = ids.iter().find(|(_, v)| *v == key).map(|(k, _)| k.clone()) else {
                continue;
            };
            let Some(meta) = metadata.get(&id) else { continue };
            let score = 1.0 / (1.0 + *distance as f64);
            if score < min_score {
                continue;
            }
            hits.push(VectorHit {
                record: VectorRecord {
                    id,
                    text: meta.text.clone(),
                    importance: meta.importance,
                    category: Category::parse_name(&meta.category),
                    created_at: meta.created_at,
                },
                score,
            });
        }
        Ok(hits)
    }

    /// Whether any existing vector is within [`DUPLICATE_THRESHOLD`]
    /// similarity of `vector`.
    pub fn has_duplicate(&self, vector: &[f32]) -> Result<bool> {
        let hits = self.search(vector, 1, Some(DUPLICATE_THRESHOLD))?;
        Ok(!hits.is_empty())
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        let mut ids = self.ids.lock().expect("ids lock poisoned");
        let Some(key) = ids.remove(id) else { return Ok(false) };
        let index = self.index.lock().expect("index lock poisoned");
        let _ = index.remove(key);
        drop(index);
        self.metadata.lock().expect("metadata lock poisoned").remove(id);
        drop(ids);
        self.persist()?;
        Ok(true)
    }

    pub fn delete_many(&self, ids: &[String]) -> Result<usize> {
        let mut deleted = 0;
        for id in ids {
            if self.delete(id)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    pub fn embed_and_upsert(
        &self,
        provider: &dyn EmbeddingProvider,
        id: &str,
        text: &str,
        category: Category,
        importance: f64,
        created_at: i64,
    ) -> Result<()> {
        let vector = provider
            .embed(text)
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        self.upsert(id, text, category, importance, created_at, &vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::StaticEmbeddingProvider;

    fn open_temp_store(dims: usize) -> (VectorStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = VectorStore::open(dir.path(), dims).expect("open vector store");
        (store, dir)
    }

    #[test]
    fn upsert_then_search_returns_the_hit() {
        let (store, _dir) = open_temp_store(16);
        let provider = StaticEmbeddingProvider::new(16);
        let id = Uuid::new_v4().to_string();
        let vector = provider.embed("I prefer tabs over spaces").unwrap();
        store.upsert(&id, "I prefer tabs over spaces", Category::Preference, 0.5, 1_000, &vector).unwrap();

        let hits = store.search(&vector, 5, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id, id);
        assert!(hits[0].score > 0.9);
    }

    #[test]
    fn search_filters_hits_below_min_score() {
        let (store, _dir) = open_temp_store(16);
        let provider = StaticEmbeddingProvider::new(16);
        let id = Uuid::new_v4().to_string();
        let vector = provider.embed("completely unrelated statement").unwrap();
        store.upsert(&id, "completely unrelated statement", Category::Fact, 0.5, 1_000, &vector).unwrap();

        let query = provider.embed("an entirely different topic altogether").unwrap();
        let hits = store.search(&query, 5, Some(0.999)).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn upsert_rejects_non_uuid_ids() {
        let (store, _dir) = open_temp_store(16);
        let vector = vec![0.1; 16];
        let result = store.upsert("not-a-uuid", "x", Category::Fact, 0.5, 1_000, &vector);
        assert!(result.is_err());
    }

    #[test]
    fn upsert_rejects_wrong_dimensionality() {
        let (store, _dir) = open_temp_store(16);
        let id = Uuid::new_v4().to_string();
        let vector = vec![0.1; 8];
        let result = store.upsert(&id, "x", Category::Fact, 0.5, 1_000, &vector);
        assert!(result.is_err());
    }

    #[test]
    fn delete_removes_from_index_and_metadata() {
        let (store, _dir) = open_temp_store(16);
        let provider = StaticEmbeddingProvider::new(16);
        let id = Uuid::new_v4().to_string();
        let vector = provider.embed("to be deleted").unwrap();
        store.upsert(&id, "to be deleted", Category::Fact, 0.5, 1_000, &vector).unwrap();
        assert!(store.delete(&id).unwrap());
        let hits = store.search(&vector, 5, Some(0.0)).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn has_duplicate_detects_near_identical_vectors() {
        let (store, _dir) = open_temp_store(16);
        let provider = StaticEmbeddingProvider::new(16);
        let id = Uuid::new_v4().to_string();
        let vector = provider.embed("I really like Rust").unwrap();
        store.upsert(&id, "I really like Rust", Category::Preference, 0.5, 1_000, &vector).unwrap();
        assert!(store.has_duplicate(&vector).unwrap());
    }

    #[test]
    fn embed_query_caches_repeated_lookups() {
        let (store, _dir) = open_temp_store(16);
        let provider = StaticEmbeddingProvider::new(16);
        let first = store.embed_query(&provider, "tabs vs spaces").unwrap();
        let second = store.embed_query(&provider, "tabs vs spaces").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn reopening_the_directory_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let provider = StaticEmbeddingProvider::new(16);
        let id = Uuid::new_v4().to_string();
        {
            let store = VectorStore::open(dir.path(), 16).unwrap();
            let vector = provider.embed("persisted across reopen").unwrap();
            store.upsert(&id, "persisted across reopen", Category::Fact, 0.5, 1_000, &vector).unwrap();
        }
        let reopened = VectorStore::open(dir.path(), 16).unwrap();
        let vector = provider.embed("persisted across reopen").unwrap();
        let hits = reopened.search(&vector, 5, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id, id);
    }
}
