//! Vector index: bulk build, SQLite persistence, and k-nearest-neighbor
//! query by cosine similarity.
//!
//! The index always reflects exactly one document batch. [`VectorIndex::build`]
//! embeds every chunk as a unit — any embedding failure aborts the whole
//! build and nothing is persisted. [`IndexStore::replace`] writes a fresh
//! SQLite file and renames it over the previous one, so readers observe
//! either the prior complete index or the new one, never a partial state.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Result;
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use crate::error::QaError;
use crate::models::{Chunk, ScoredChunk};

/// File name of the persisted index inside the configured directory.
pub const INDEX_FILE: &str = "index.sqlite";

/// One indexed chunk with its embedding vector.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// The searchable structure over one document batch.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    /// Embedding model the vectors were produced with.
    pub model: String,
    pub dims: usize,
    /// SHA-256 over the chunk texts, for staleness reporting.
    pub corpus_hash: String,
    pub built_at: i64,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Embed every chunk and construct the index. All-or-nothing: if any
    /// embedding fails the whole build fails and no index exists.
    pub async fn build(chunks: Vec<Chunk>, embedder: &dyn Embedder) -> Result<Self, QaError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed_batch(&texts).await?
        };
        if vectors.len() != chunks.len() {
            return Err(QaError::Embedding(format!(
                "expected {} vectors, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let mut hasher = Sha256::new();
        for text in &texts {
            hasher.update(text.as_bytes());
        }
        let corpus_hash = format!("{:x}", hasher.finalize());

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();

        Ok(Self {
            model: embedder.model_name().to_string(),
            dims: embedder.dims(),
            corpus_hash,
            built_at: chrono::Utc::now().timestamp(),
            entries,
        })
    }

    /// The k entries most similar to `vector`, sorted by descending cosine
    /// similarity. Fewer than k entries returns all of them; ties break by
    /// original chunk insertion order.
    pub fn query(&self, vector: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<(&IndexEntry, f32)> = self
            .entries
            .iter()
            .map(|e| (e, cosine_similarity(vector, &e.vector)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.chunk.index.cmp(&b.0.chunk.index))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(e, score)| ScoredChunk {
                text: e.chunk.text.clone(),
                score,
            })
            .collect()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The single persisted index location. Only `replace` writes it; queries
/// only read it; a write fully replaces the previous file.
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    /// Whether a persisted index exists. This is the sole ready/empty
    /// signal across process restarts.
    pub fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// Persist `index`, atomically replacing any previous version.
    pub async fn replace(&self, index: &VectorIndex) -> Result<(), QaError> {
        self.replace_inner(index)
            .await
            .map_err(|e| QaError::Storage(e.to_string()))
    }

    async fn replace_inner(&self, index: &VectorIndex) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let tmp = self.dir.join(format!("{}.tmp", INDEX_FILE));
        if tmp.exists() {
            std::fs::remove_file(&tmp)?;
        }

        let pool = connect(&tmp, true).await?;

        sqlx::query(
            r#"
            CREATE TABLE index_meta (
                model TEXT NOT NULL,
                dims INTEGER NOT NULL,
                corpus_hash TEXT NOT NULL,
                chunk_count INTEGER NOT NULL,
                built_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE index_entries (
                chunk_index INTEGER PRIMARY KEY,
                text TEXT NOT NULL,
                start_offset INTEGER NOT NULL,
                end_offset INTEGER NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT INTO index_meta (model, dims, corpus_hash, chunk_count, built_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&index.model)
        .bind(index.dims as i64)
        .bind(&index.corpus_hash)
        .bind(index.entries.len() as i64)
        .bind(index.built_at)
        .execute(&mut *tx)
        .await?;

        for entry in &index.entries {
            sqlx::query(
                "INSERT INTO index_entries (chunk_index, text, start_offset, end_offset, embedding) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(entry.chunk.index as i64)
            .bind(&entry.chunk.text)
            .bind(entry.chunk.start as i64)
            .bind(entry.chunk.end as i64)
            .bind(vec_to_blob(&entry.vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        pool.close().await;

        std::fs::rename(&tmp, self.path())?;
        Ok(())
    }

    /// Load the persisted index, or `None` when no submit has succeeded yet.
    pub async fn load(&self) -> Result<Option<VectorIndex>, QaError> {
        self.load_inner()
            .await
            .map_err(|e| QaError::Storage(e.to_string()))
    }

    async fn load_inner(&self) -> Result<Option<VectorIndex>> {
        let path = self.path();
        if !path.is_file() {
            return Ok(None);
        }

        let pool = connect(&path, false).await?;

        let meta = sqlx::query(
            "SELECT model, dims, corpus_hash, chunk_count, built_at FROM index_meta",
        )
        .fetch_one(&pool)
        .await?;

        let rows = sqlx::query(
            "SELECT chunk_index, text, start_offset, end_offset, embedding \
             FROM index_entries ORDER BY chunk_index",
        )
        .fetch_all(&pool)
        .await?;

        let entries: Vec<IndexEntry> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                IndexEntry {
                    chunk: Chunk {
                        index: row.get::<i64, _>("chunk_index") as usize,
                        text: row.get("text"),
                        start: row.get::<i64, _>("start_offset") as usize,
                        end: row.get::<i64, _>("end_offset") as usize,
                    },
                    vector: blob_to_vec(&blob),
                }
            })
            .collect();

        let index = VectorIndex {
            model: meta.get("model"),
            dims: meta.get::<i64, _>("dims") as usize,
            corpus_hash: meta.get("corpus_hash"),
            built_at: meta.get("built_at"),
            entries,
        };

        pool.close().await;
        Ok(Some(index))
    }

    /// Remove the persisted index (and any stale temp file).
    pub fn discard(&self) -> Result<(), QaError> {
        let discard_one = |p: &Path| -> std::io::Result<()> {
            if p.is_file() {
                std::fs::remove_file(p)?;
            }
            Ok(())
        };
        discard_one(&self.path()).map_err(|e| QaError::Storage(e.to_string()))?;
        discard_one(&self.dir.join(format!("{}.tmp", INDEX_FILE)))
            .map_err(|e| QaError::Storage(e.to_string()))
    }
}

async fn connect(path: &Path, create: bool) -> Result<SqlitePool> {
    // Delete-mode journaling keeps the index a single file, so the rename
    // in `replace` swaps the whole version at once.
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(create)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Delete);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}
