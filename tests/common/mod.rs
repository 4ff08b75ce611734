#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use pdf_rag_agent::providers::traits::{
    DocumentConverter, EmbeddingProvider, FragmentStream, GenerationProvider,
};
use pdf_rag_agent::{Backends, RagConfig, RagSession};

pub const VOCABULARY: &[&str] = &[
    "apples", "oranges", "bananas", "rockets", "engines", "fuel", "rivers", "lakes", "oceans",
];

pub const THREE_SECTIONS: &str = "# Orchard\napples oranges bananas\n\n\
# Launch\nrockets engines fuel\n\n\
# Water\nrivers lakes oceans\n";

pub const FAKE_PDF: &[u8] = b"%PDF-1.4\n% test upload\n";

pub const SCRIPTED_ANSWER: &str = "- Rockets burn fuel.";

/// Returns canned markdown and records the paths it was asked to convert.
pub struct FakeConverter {
    pub markdown: Mutex<Result<String, String>>,
    pub seen: Mutex<Vec<String>>,
    pub delay: Mutex<Option<Duration>>,
    pub started: Notify,
}

impl FakeConverter {
    pub fn returning(markdown: &str) -> Arc<Self> {
        Arc::new(Self {
            markdown: Mutex::new(Ok(markdown.to_string())),
            seen: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
            started: Notify::new(),
        })
    }

    pub fn set(&self, result: Result<&str, &str>) {
        *self.markdown.lock().unwrap() = result.map(str::to_string).map_err(str::to_string);
    }
}

#[async_trait]
impl DocumentConverter for FakeConverter {
    async fn convert(&self, path: &Path) -> Result<String> {
        assert!(path.exists(), "upload must exist during conversion");
        self.seen.lock().unwrap().push(path.display().to_string());
        self.started.notify_one();

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = self.markdown.lock().unwrap().clone();
        result.map_err(|e| anyhow!(e))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Word counts over a small vocabulary plus a constant component.
pub struct VocabularyEmbedder {
    pub calls: Mutex<usize>,
    pub fail: Mutex<bool>,
}

impl VocabularyEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { calls: Mutex::new(0), fail: Mutex::new(false) })
    }
}

#[async_trait]
impl EmbeddingProvider for VocabularyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        *self.calls.lock().unwrap() += 1;
        if *self.fail.lock().unwrap() {
            return Err(anyhow!("embedding service unavailable"));
        }

        let mut vector = vec![0.0; VOCABULARY.len() + 1];
        vector[VOCABULARY.len()] = 0.1;
        for word in text.split(|c: char| !c.is_alphanumeric()) {
            let word = word.to_lowercase();
            if let Some(pos) = VOCABULARY.iter().position(|v| *v == word) {
                vector[pos] += 1.0;
            }
        }
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        "vocabulary"
    }
}

/// Streams a fixed answer word by word, optionally failing partway.
pub struct ScriptedGenerator {
    pub fragments: Vec<&'static str>,
    pub fail_at: Mutex<Option<usize>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(fragments: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self { fragments, fail_at: Mutex::new(None), prompts: Mutex::new(Vec::new()) })
    }

    pub fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let fail_at = *self.fail_at.lock().unwrap();

        let items: Vec<Result<String>> = self.fragments
            .iter()
            .enumerate()
            .map(|(i, f)| match fail_at {
                Some(n) if i == n => Err(anyhow!("generation connection dropped")),
                _ => Ok(f.to_string()),
            })
            .collect();
        Ok(stream::iter(items).boxed())
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

pub struct Harness {
    pub converter: Arc<FakeConverter>,
    pub embedder: Arc<VocabularyEmbedder>,
    pub generator: Arc<ScriptedGenerator>,
    pub session: RagSession,
}

pub fn harness(markdown: &str, config: RagConfig) -> Harness {
    let converter = FakeConverter::returning(markdown);
    let embedder = VocabularyEmbedder::new();
    let generator = ScriptedGenerator::new(vec!["- Rockets", " burn", " fuel."]);

    let backends = Backends {
        converter: converter.clone(),
        embedder: embedder.clone(),
        generator: generator.clone(),
    };

    Harness {
        converter,
        embedder,
        generator,
        session: RagSession::new(config, backends),
    }
}
