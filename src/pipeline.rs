use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::RagConfig;
use crate::database::{ScoredChunk, VectorStore, VectorStoreError};
use crate::document::{Chunk, DocumentLoader, MarkdownHeaderSplitter};
use crate::llm::answer::{AnswerGenerator, AnswerStream};
use crate::llm::semantic_search::Retriever;
use crate::providers::Backends;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Conversion error: {0}")]
    Conversion(String),
    #[error("Embedding backend error: {0}")]
    EmbeddingBackend(String),
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Generation backend error: {0}")]
    GenerationBackend(String),
    #[error("No document has been indexed yet")]
    NotReady,
}

impl From<VectorStoreError> for PipelineError {
    fn from(e: VectorStoreError) -> Self {
        match e {
            VectorStoreError::DimensionMismatch { expected, actual } => {
                PipelineError::DimensionMismatch { expected, actual }
            }
            other => PipelineError::EmbeddingBackend(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Converting,
    Chunking,
    Indexing,
    Ready,
    Retrieving,
    Generating,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Converting => "converting",
            PipelineStage::Chunking => "chunking",
            PipelineStage::Indexing => "indexing",
            PipelineStage::Ready => "ready",
            PipelineStage::Retrieving => "retrieving",
            PipelineStage::Generating => "generating",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub source: String,
    pub markdown_bytes: usize,
    pub chunk_count: usize,
    pub dimension: usize,
    pub indexed_at: DateTime<Utc>,
}

struct ActiveDocument {
    report: IngestReport,
    store: Arc<VectorStore>,
    retriever: Retriever,
}

/// One user's pipeline: a single active document index at a time.
///
/// Ingesting a new document drops the previous index before conversion
/// starts. Nothing outlives the session.
pub struct RagSession {
    config: RagConfig,
    loader: DocumentLoader,
    splitter: MarkdownHeaderSplitter,
    backends: Backends,
    generator: AnswerGenerator,
    stage: PipelineStage,
    last_error: Option<String>,
    active: Option<ActiveDocument>,
    // Bumped on every ingest so answers can be matched to their document
    epoch: u64,
}

impl RagSession {
    pub fn new(config: RagConfig, backends: Backends) -> Self {
        Self {
            loader: DocumentLoader::new(backends.converter.clone()),
            splitter: MarkdownHeaderSplitter::new(config.chunk_headers.clone()),
            generator: AnswerGenerator::new(backends.generator.clone()),
            config,
            backends,
            stage: PipelineStage::Idle,
            last_error: None,
            active: None,
            epoch: 0,
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn report(&self) -> Option<&IngestReport> {
        self.active.as_ref().map(|a| &a.report)
    }

    pub fn chunks(&self) -> Vec<&Chunk> {
        self.active.as_ref().map(|a| a.store.chunks()).unwrap_or_default()
    }

    pub fn converter_name(&self) -> &str {
        self.loader.converter_name()
    }

    pub async fn ingest_path(&mut self, path: &Path) -> Result<IngestReport, PipelineError> {
        self.begin_ingest();
        let markdown = self.loader.load(path).await;
        self.finish_ingest(path.display().to_string(), markdown).await
    }

    pub async fn ingest_upload(&mut self, file_name: &str, bytes: &[u8]) -> Result<IngestReport, PipelineError> {
        self.begin_ingest();
        let markdown = self.loader.load_upload(file_name, bytes).await;
        self.finish_ingest(file_name.to_string(), markdown).await
    }

    /// Split already-converted markdown and index it.
    pub async fn ingest_markdown(&mut self, source: &str, markdown: String) -> Result<IngestReport, PipelineError> {
        self.begin_ingest();
        self.finish_ingest(source.to_string(), Ok(markdown)).await
    }

    pub async fn retrieve(&mut self, question: &str) -> Result<Vec<ScoredChunk>, PipelineError> {
        let retriever = match &self.active {
            Some(active) => active.retriever.clone(),
            None => return Err(PipelineError::NotReady),
        };

        self.stage = PipelineStage::Retrieving;
        match retriever.retrieve(question).await {
            Ok(chunks) => {
                self.stage = PipelineStage::Ready;
                Ok(chunks)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Retrieve context for `question` and start streaming the answer.
    ///
    /// The caller drains the stream and then reports the outcome with
    /// [`RagSession::finish_answer`].
    pub async fn ask(&mut self, question: &str) -> Result<(Vec<ScoredChunk>, AnswerStream), PipelineError> {
        let chunks = self.retrieve(question).await?;

        self.stage = PipelineStage::Generating;
        match self.generator.stream_answer(question, &chunks).await {
            Ok(stream) => Ok((chunks, stream.with_epoch(self.epoch))),
            Err(e) => Err(self.fail(PipelineError::GenerationBackend(e.to_string()))),
        }
    }

    /// Record how a drained stream ended. A stream started against a
    /// document that has since been replaced leaves the session untouched.
    pub fn finish_answer(&mut self, stream: &AnswerStream) -> Result<(), PipelineError> {
        if stream.epoch() != self.epoch {
            log::debug!("Ignoring answer outcome for a replaced document");
            return match stream.error() {
                Some(e) => Err(PipelineError::GenerationBackend(e.to_string())),
                None => Ok(()),
            };
        }

        match stream.error() {
            Some(e) => Err(self.fail(PipelineError::GenerationBackend(e.to_string()))),
            None => {
                self.stage = PipelineStage::Done;
                Ok(())
            }
        }
    }

    /// Retrieve, generate and collect the whole answer in one call.
    pub async fn answer(&mut self, question: &str) -> Result<(Vec<ScoredChunk>, String), PipelineError> {
        let (chunks, mut stream) = self.ask(question).await?;
        match stream.collect_answer().await {
            Ok(answer) => {
                self.stage = PipelineStage::Done;
                Ok((chunks, answer))
            }
            Err(e) => Err(self.fail(PipelineError::GenerationBackend(e.to_string()))),
        }
    }

    fn begin_ingest(&mut self) {
        if self.active.take().is_some() {
            log::info!("Discarding previous document index");
        }
        self.epoch += 1;
        self.last_error = None;
        self.stage = PipelineStage::Converting;
    }

    async fn finish_ingest(
        &mut self,
        source: String,
        markdown: anyhow::Result<String>,
    ) -> Result<IngestReport, PipelineError> {
        let markdown = match markdown {
            Ok(markdown) => markdown,
            Err(e) => return Err(self.fail(PipelineError::Conversion(format!("{:#}", e)))),
        };

        self.stage = PipelineStage::Chunking;
        let chunks = self.splitter.split_text(&markdown);
        log::info!("Split {} into {} chunks", source, chunks.len());
        if chunks.is_empty() {
            log::warn!("{} produced no text; answers will have empty context", source);
        }

        self.stage = PipelineStage::Indexing;
        let store = match VectorStore::build(
            chunks,
            self.backends.embedder.clone(),
            self.config.embed_batch_size,
        )
        .await
        {
            Ok(store) => Arc::new(store),
            Err(e) => return Err(self.fail(e.into())),
        };

        let report = IngestReport {
            source,
            markdown_bytes: markdown.len(),
            chunk_count: store.len(),
            dimension: store.dimension(),
            indexed_at: Utc::now(),
        };

        self.active = Some(ActiveDocument {
            report: report.clone(),
            retriever: Retriever::from_config(store.clone(), &self.config),
            store,
        });
        self.stage = PipelineStage::Ready;
        log::info!("Index ready: {} chunks, dimension {}", report.chunk_count, report.dimension);
        Ok(report)
    }

    fn fail(&mut self, error: PipelineError) -> PipelineError {
        log::error!("Pipeline failed while {}: {}", self.stage, error);
        self.stage = PipelineStage::Failed;
        self.last_error = Some(error.to_string());
        error
    }
}
