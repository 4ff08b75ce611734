use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::database::docstore::InMemoryDocstore;
use crate::database::flat_index::{FlatL2Index, IndexError};
use crate::database::mmr::maximal_marginal_relevance;
use crate::document::Chunk;
use crate::providers::traits::EmbeddingProvider;

/// Text embedded once before indexing to learn the model's dimension.
pub const PROBE_TEXT: &str = "this is some text data";

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Embedding backend error: {0}")]
    Embedding(String),
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Index error: {0}")]
    Index(String),
}

impl From<IndexError> for VectorStoreError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::DimensionMismatch { expected, actual } => {
                VectorStoreError::DimensionMismatch { expected, actual }
            }
            other => VectorStoreError::Index(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Squared L2 distance to the query.
    pub distance: f32,
}

/// In-memory vector store: flat index, docstore and the position → id mapping.
///
/// Built once per document and never mutated afterwards.
pub struct VectorStore {
    embedder: Arc<dyn EmbeddingProvider>,
    index: FlatL2Index,
    docstore: InMemoryDocstore,
    index_to_docstore_id: Vec<String>,
}

impl VectorStore {
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
    ) -> Result<Self, VectorStoreError> {
        let probe = embedder.embed(PROBE_TEXT).await
            .map_err(|e| VectorStoreError::Embedding(e.to_string()))?;
        let dim = probe.len();
        log::debug!("Embedding model {} has dimension {}", embedder.model_name(), dim);

        let mut index = FlatL2Index::new(dim)?;

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());

        for batch in texts.chunks(batch_size.max(1)) {
            let embedded = embedder.embed_batch(batch).await
                .map_err(|e| VectorStoreError::Embedding(e.to_string()))?;

            if embedded.len() != batch.len() {
                return Err(VectorStoreError::Embedding(format!(
                    "Backend returned {} embeddings for {} chunks",
                    embedded.len(),
                    batch.len()
                )));
            }
            if let Some(bad) = embedded.iter().find(|v| v.len() != dim) {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: dim,
                    actual: bad.len(),
                });
            }

            vectors.extend(embedded);
            log::debug!("Embedded {}/{} chunks", vectors.len(), texts.len());
        }

        // Nothing is stored until every embedding succeeded
        index.add(&vectors)?;

        let mut docstore = InMemoryDocstore::new();
        let index_to_docstore_id = chunks.into_iter().map(|chunk| docstore.add(chunk)).collect();

        Ok(Self {
            embedder,
            index,
            docstore,
            index_to_docstore_id,
        })
    }

    pub fn dimension(&self) -> usize {
        self.index.dim()
    }

    pub fn len(&self) -> usize {
        self.index_to_docstore_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_to_docstore_id.is_empty()
    }

    /// Stored chunks in index order.
    pub fn chunks(&self) -> Vec<&Chunk> {
        self.index_to_docstore_id
            .iter()
            .filter_map(|id| self.docstore.search(id))
            .collect()
    }

    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>, VectorStoreError> {
        let vector = self.embedder.embed(query).await
            .map_err(|e| VectorStoreError::Embedding(e.to_string()))?;

        if vector.len() != self.dimension() {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension(),
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    pub fn similarity_search_by_vector(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        let hits = self.index.search(query, k)?;
        Ok(hits
            .into_iter()
            .filter_map(|(pos, distance)| self.resolve(pos, distance))
            .collect())
    }

    /// Fetch `fetch_k` nearest candidates, then rerank them down to `k` with MMR.
    pub fn max_marginal_relevance_search_by_vector(
        &self,
        query: &[f32],
        k: usize,
        fetch_k: usize,
        lambda_mult: f32,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        let hits = self.index.search(query, fetch_k.max(k))?;

        let candidates: Vec<&[f32]> = hits
            .iter()
            .filter_map(|(pos, _)| self.index.reconstruct(*pos))
            .collect();

        let picks = maximal_marginal_relevance(query, &candidates, k, lambda_mult);

        Ok(picks
            .into_iter()
            .filter_map(|i| {
                let (pos, distance) = hits[i];
                self.resolve(pos, distance)
            })
            .collect())
    }

    fn resolve(&self, pos: usize, distance: f32) -> Option<ScoredChunk> {
        let id = self.index_to_docstore_id.get(pos)?;
        let chunk = self.docstore.search(id)?.clone();
        Some(ScoredChunk { chunk, distance })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Maps text to a vector from a fixed lookup; unknown text embeds to zeros.
    struct LookupEmbedder {
        dim: usize,
        calls: AtomicUsize,
        fail_after: Option<usize>,
        wrong_dim_for: Option<&'static str>,
    }

    impl LookupEmbedder {
        fn new(dim: usize) -> Self {
            Self { dim, calls: AtomicUsize::new(0), fail_after: None, wrong_dim_for: None }
        }

        fn vector_for(&self, text: &str) -> Vec<f32> {
            let mut v = vec![0.0; self.dim];
            if let Some(first) = text.bytes().next() {
                v[first as usize % self.dim] = 1.0;
            }
            v
        }
    }

    #[async_trait]
    impl EmbeddingProvider for LookupEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.map_or(false, |limit| n >= limit) {
                return Err(anyhow!("backend down"));
            }
            if self.wrong_dim_for == Some(text) {
                return Ok(vec![1.0; self.dim + 1]);
            }
            Ok(self.vector_for(text))
        }

        fn model_name(&self) -> &str {
            "lookup"
        }
    }

    fn chunk(index: usize, content: &str) -> Chunk {
        Chunk { index, content: content.to_string(), headers: Vec::new() }
    }

    #[tokio::test]
    async fn probe_fixes_dimension_and_ids_line_up() {
        let embedder = Arc::new(LookupEmbedder::new(8));
        let chunks = vec![chunk(0, "alpha"), chunk(1, "beta"), chunk(2, "gamma")];
        let store = VectorStore::build(chunks, embedder.clone(), 2).await.unwrap();

        assert_eq!(store.dimension(), 8);
        assert_eq!(store.len(), 3);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 4);
        let contents: Vec<&str> = store.chunks().iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["alpha", "beta", "gamma"]);
    }

    #[tokio::test]
    async fn backend_failure_aborts_build() {
        let mut embedder = LookupEmbedder::new(8);
        embedder.fail_after = Some(2);
        let chunks = vec![chunk(0, "a"), chunk(1, "b"), chunk(2, "c")];
        let result = VectorStore::build(chunks, Arc::new(embedder), 1).await;
        assert!(matches!(result, Err(VectorStoreError::Embedding(_))));
    }

    #[tokio::test]
    async fn wrong_dimension_is_rejected() {
        let mut embedder = LookupEmbedder::new(8);
        embedder.wrong_dim_for = Some("odd one");
        let chunks = vec![chunk(0, "fine"), chunk(1, "odd one")];
        let result = VectorStore::build(chunks, Arc::new(embedder), 4).await;
        assert!(matches!(
            result,
            Err(VectorStoreError::DimensionMismatch { expected: 8, actual: 9 })
        ));
    }

    #[tokio::test]
    async fn query_dimension_is_checked() {
        let mut embedder = LookupEmbedder::new(8);
        embedder.wrong_dim_for = Some("bad query");
        let store = VectorStore::build(vec![chunk(0, "x")], Arc::new(embedder), 4).await.unwrap();
        assert!(store.embed_query("good query").await.is_ok());
        assert!(matches!(
            store.embed_query("bad query").await,
            Err(VectorStoreError::DimensionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn searches_return_distinct_chunks_bounded_by_size() {
        let embedder = Arc::new(LookupEmbedder::new(16));
        let chunks = vec![chunk(0, "apple"), chunk(1, "banana")];
        let store = VectorStore::build(chunks, embedder, 8).await.unwrap();

        let query = store.embed_query("apricot").await.unwrap();
        let similar = store.similarity_search_by_vector(&query, 3).unwrap();
        assert_eq!(similar.len(), 2);
        assert_eq!(similar[0].chunk.content, "apple");

        let diverse = store.max_marginal_relevance_search_by_vector(&query, 3, 20, 0.5).unwrap();
        assert_eq!(diverse.len(), 2);
        assert_eq!(diverse[0].chunk.content, "apple");
        assert_ne!(diverse[0].chunk.index, diverse[1].chunk.index);
    }

    #[tokio::test]
    async fn empty_chunk_list_builds_empty_store() {
        let store = VectorStore::build(Vec::new(), Arc::new(LookupEmbedder::new(4)), 8).await.unwrap();
        assert!(store.is_empty());
        assert_eq!(store.dimension(), 4);
        assert!(store.similarity_search_by_vector(&[0.0; 4], 3).unwrap().is_empty());
    }
}
