use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::path::Path;

/// Lazily produced answer fragments. Finite; ends when the backend signals completion.
pub type FragmentStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert the file at `path` into markdown, keeping heading structure.
    async fn convert(&self, path: &Path) -> Result<String>;

    fn name(&self) -> &str;
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    fn model_name(&self) -> &str;
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream>;

    fn model_name(&self) -> &str;
}
