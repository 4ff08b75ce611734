pub mod document;
pub mod ollama;
pub mod traits;
pub mod utils;

use anyhow::Result;
use std::sync::Arc;

use crate::config::{ConversionBackend, RagConfig};
use traits::{DocumentConverter, EmbeddingProvider, GenerationProvider};

/// The three external capabilities a session talks to.
#[derive(Clone)]
pub struct Backends {
    pub converter: Arc<dyn DocumentConverter>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub generator: Arc<dyn GenerationProvider>,
}

impl Backends {
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let converter: Arc<dyn DocumentConverter> = match config.conversion_backend {
            ConversionBackend::Docling => Arc::new(document::DoclingConverter::new(config)?),
            ConversionBackend::PdfExtract => Arc::new(document::PdfExtractConverter::new()),
        };

        Ok(Self {
            converter,
            embedder: Arc::new(ollama::OllamaEmbeddings::new(config)?),
            generator: Arc::new(ollama::OllamaChat::new(config)?),
        })
    }
}
