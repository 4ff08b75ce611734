use anyhow::{anyhow, Result};
use serde::Serialize;
use std::env;
use std::str::FromStr;
use url::Url;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_DOCLING_URL: &str = "http://localhost:5001";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_GENERATION_MODEL: &str = "deepseek-r1:1.5b";

/// Which engine turns an uploaded PDF into markdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionBackend {
    Docling,
    PdfExtract,
}

impl FromStr for ConversionBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "docling" => Ok(Self::Docling),
            "pdf-extract" | "pdf_extract" | "local" => Ok(Self::PdfExtract),
            other => Err(anyhow!("Unknown conversion backend: {} (expected docling or pdf-extract)", other)),
        }
    }
}

/// Retrieval strategy used by the retriever.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SearchKind {
    Similarity,
    Mmr { fetch_k: usize, lambda_mult: f32 },
}

impl Default for SearchKind {
    fn default() -> Self {
        SearchKind::Mmr {
            fetch_k: 20,
            lambda_mult: 0.5,
        }
    }
}

/// A heading marker the chunker splits on, e.g. `("##", "Header 2")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderMarker {
    pub marker: String,
    pub name: String,
}

impl HeaderMarker {
    pub fn new(marker: &str, name: &str) -> Self {
        Self {
            marker: marker.to_string(),
            name: name.to_string(),
        }
    }

    pub fn level(&self) -> usize {
        self.marker.chars().filter(|c| *c == '#').count()
    }
}

pub fn default_chunk_headers() -> Vec<HeaderMarker> {
    vec![
        HeaderMarker::new("#", "Header 1"),
        HeaderMarker::new("##", "Header 2"),
        HeaderMarker::new("###", "Header 3"),
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct RagConfig {
    pub embedding_model: String,
    pub embedding_endpoint: String,
    pub generation_model: String,
    pub generation_endpoint: String,
    pub chunk_headers: Vec<HeaderMarker>,
    pub retrieval_k: usize,
    pub search: SearchKind,
    pub conversion_backend: ConversionBackend,
    pub conversion_endpoint: String,
    pub embed_batch_size: usize,
    pub temperature: Option<f32>,
    /// Whole-request timeout. `None` leaves long streams and slow conversions alone.
    pub request_timeout_secs: Option<u64>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_endpoint: DEFAULT_OLLAMA_URL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            generation_endpoint: DEFAULT_OLLAMA_URL.to_string(),
            chunk_headers: default_chunk_headers(),
            retrieval_k: 3,
            search: SearchKind::default(),
            conversion_backend: ConversionBackend::Docling,
            conversion_endpoint: DEFAULT_DOCLING_URL.to_string(),
            embed_batch_size: 16,
            temperature: None,
            request_timeout_secs: None,
        }
    }
}

impl RagConfig {
    /// Build the configuration from `RAG_*` environment variables, falling
    /// back to the local Ollama/docling defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let embedding_model = env::var("RAG_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model);
        let embedding_endpoint = env::var("RAG_EMBEDDING_URL").unwrap_or(defaults.embedding_endpoint);
        let generation_model = env::var("RAG_GENERATION_MODEL").unwrap_or(defaults.generation_model);
        let generation_endpoint = env::var("RAG_GENERATION_URL").unwrap_or(defaults.generation_endpoint);
        let conversion_endpoint = env::var("RAG_DOCLING_URL").unwrap_or(defaults.conversion_endpoint);

        // Headers are given as "#,##,###"
        let chunk_headers = env::var("RAG_CHUNK_HEADERS")
            .map(|h| parse_chunk_headers(&h))
            .unwrap_or_else(|_| Ok(defaults.chunk_headers))?;

        let retrieval_k = parse_var("RAG_RETRIEVAL_K")?.unwrap_or(defaults.retrieval_k);
        let embed_batch_size = parse_var("RAG_EMBED_BATCH_SIZE")?.unwrap_or(defaults.embed_batch_size);
        let request_timeout_secs = parse_var("RAG_REQUEST_TIMEOUT_SECS")?.or(defaults.request_timeout_secs);
        let temperature = parse_var("RAG_TEMPERATURE")?;

        let conversion_backend = match env::var("RAG_CONVERTER") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.conversion_backend,
        };

        let search = match env::var("RAG_SEARCH_TYPE").ok().as_deref() {
            Some("similarity") => SearchKind::Similarity,
            Some("mmr") | None => SearchKind::Mmr {
                fetch_k: parse_var("RAG_FETCH_K")?.unwrap_or(20),
                lambda_mult: parse_var("RAG_LAMBDA_MULT")?.unwrap_or(0.5),
            },
            Some(other) => return Err(anyhow!("Unknown search type: {} (expected mmr or similarity)", other)),
        };

        let config = Self {
            embedding_model,
            embedding_endpoint,
            generation_model,
            generation_endpoint,
            chunk_headers,
            retrieval_k,
            search,
            conversion_backend,
            conversion_endpoint,
            embed_batch_size,
            temperature,
            request_timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (label, endpoint) in [
            ("embedding", &self.embedding_endpoint),
            ("generation", &self.generation_endpoint),
            ("conversion", &self.conversion_endpoint),
        ] {
            Url::parse(endpoint).map_err(|e| anyhow!("Invalid {} endpoint {}: {}", label, endpoint, e))?;
        }

        if self.retrieval_k == 0 {
            return Err(anyhow!("retrieval_k must be at least 1"));
        }
        if self.embed_batch_size == 0 {
            return Err(anyhow!("embed_batch_size must be at least 1"));
        }
        if self.chunk_headers.is_empty() {
            return Err(anyhow!("At least one chunk header marker is required"));
        }
        if let SearchKind::Mmr { fetch_k, lambda_mult } = self.search {
            if fetch_k < self.retrieval_k {
                return Err(anyhow!("fetch_k ({}) must be >= retrieval_k ({})", fetch_k, self.retrieval_k));
            }
            if !(0.0..=1.0).contains(&lambda_mult) {
                return Err(anyhow!("lambda_mult must be within 0.0..=1.0, got {}", lambda_mult));
            }
        }
        Ok(())
    }
}

/// Join a base endpoint and an API path without doubling slashes.
pub fn endpoint_url(base: &str, path: &str) -> Result<Url> {
    let base = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };
    let url = Url::parse(&base)?.join(path.trim_start_matches('/'))?;
    Ok(url)
}

fn parse_chunk_headers(raw: &str) -> Result<Vec<HeaderMarker>> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|marker| {
            if !marker.chars().all(|c| c == '#') {
                return Err(anyhow!("Invalid header marker: {}", marker));
            }
            Ok(HeaderMarker::new(marker, &format!("Header {}", marker.len())))
        })
        .collect()
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid value for {}: {}", name, value)),
        Err(_) => Ok(None),
    }
}
