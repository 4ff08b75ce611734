use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::config::{endpoint_url, RagConfig};
use crate::providers::traits::EmbeddingProvider;
use crate::providers::utils::{build_http_client, ensure_success};

#[derive(Clone)]
pub struct OllamaEmbeddings {
    client: Client,
    url: Url,
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
    error: Option<String>,
}

impl OllamaEmbeddings {
    pub fn new(config: &RagConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config.request_timeout_secs)?,
            url: endpoint_url(&config.embedding_endpoint, "api/embed")?,
            model: config.embedding_model.clone(),
        })
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self.client
            .post(self.url.clone())
            .json(&json!({
                "model": self.model,
                "input": input,
            }))
            .send()
            .await
            .map_err(|e| anyhow!("Embedding service unreachable at {}: {}", self.url, e))?;

        let response = ensure_success(response, "Ollama embed").await?;
        let body: EmbedResponse = response.json().await
            .map_err(|e| anyhow!("Malformed embedding response: {}", e))?;

        if let Some(error) = body.error {
            return Err(anyhow!("Embedding service returned error: {}", error));
        }
        if body.embeddings.len() != input.len() {
            return Err(anyhow!(
                "Embedding service returned {} vectors for {} inputs",
                body.embeddings.len(),
                input.len()
            ));
        }

        Ok(body.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| anyhow!("No embedding returned from Ollama"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
