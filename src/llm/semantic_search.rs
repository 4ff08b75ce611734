use std::sync::Arc;

use crate::config::{RagConfig, SearchKind};
use crate::database::{ScoredChunk, VectorStore, VectorStoreError};

/// Query-time view over a built vector store.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<VectorStore>,
    k: usize,
    search: SearchKind,
}

impl Retriever {
    pub fn new(store: Arc<VectorStore>, k: usize, search: SearchKind) -> Self {
        Self { store, k, search }
    }

    pub fn from_config(store: Arc<VectorStore>, config: &RagConfig) -> Self {
        Self::new(store, config.retrieval_k, config.search)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Up to `k` distinct chunks for `query`, in selection order.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        if self.store.is_empty() {
            log::debug!("Index is empty, nothing to retrieve");
            return Ok(Vec::new());
        }

        let query_vector = self.store.embed_query(query).await?;
        let results = match self.search {
            SearchKind::Similarity => self.store.similarity_search_by_vector(&query_vector, self.k)?,
            SearchKind::Mmr { fetch_k, lambda_mult } => self.store
                .max_marginal_relevance_search_by_vector(&query_vector, self.k, fetch_k, lambda_mult)?,
        };

        log::info!("Retrieved {} of {} chunks", results.len(), self.store.len());
        Ok(results)
    }
}
