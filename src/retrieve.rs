//! Question-time retrieval: embed the question and rank indexed chunks.

use crate::embedding::{embed_query, Embedder};
use crate::error::QaError;
use crate::index::IndexStore;
use crate::models::ScoredChunk;

/// Retrieves the chunks most relevant to a question from the persisted index.
pub struct Retriever<'a> {
    embedder: &'a dyn Embedder,
    store: &'a IndexStore,
    top_k: usize,
}

impl<'a> Retriever<'a> {
    pub fn new(embedder: &'a dyn Embedder, store: &'a IndexStore, top_k: usize) -> Self {
        Self {
            embedder,
            store,
            top_k,
        }
    }

    /// Embed `question` and return up to `top_k` chunks by descending cosine
    /// similarity. Fails with [`QaError::NoIndex`] when nothing has been
    /// indexed yet. An empty index yields an empty result, which downstream
    /// synthesis turns into the fixed fallback answer.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>, QaError> {
        let index = self.store.load().await?.ok_or(QaError::NoIndex)?;
        if index.is_empty() {
            return Ok(Vec::new());
        }
        let vector = embed_query(self.embedder, question).await?;
        Ok(index.query(&vector, self.top_k))
    }
}
