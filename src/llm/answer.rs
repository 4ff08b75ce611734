use anyhow::{anyhow, Result};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::database::ScoredChunk;
use crate::providers::traits::{FragmentStream, GenerationProvider};

pub const PROMPT_TEMPLATE: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question.
If you don't know the answer, just say that you don't know.
Answer in bullet points. Make sure your answer is relevant to the question and it is answered from the context only.
Question: {question}
Context: {context}
Answer:";

/// Chunk texts in retrieval order, separated by a blank line.
pub fn format_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fill the `{question}` and `{context}` slots in one pass, so slot-like text
/// inside the values is left alone.
pub fn render_prompt(template: &str, question: &str, context: &str) -> String {
    let mut out = String::with_capacity(template.len() + question.len() + context.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{question}") {
            out.push_str(question);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{context}") {
            out.push_str(context);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Streamed answer that remembers what it has yielded so far.
///
/// Fragments concatenated in yield order equal `answer_so_far()` once the
/// stream has ended. A backend error ends the stream; the partial answer
/// stays readable.
pub struct AnswerStream {
    inner: FragmentStream,
    answer: String,
    error: Option<String>,
    finished: bool,
    epoch: u64,
}

impl AnswerStream {
    pub fn new(inner: FragmentStream) -> Self {
        Self {
            inner,
            answer: String::new(),
            error: None,
            finished: false,
            epoch: 0,
        }
    }

    /// Tag the stream with the ingest it answers from.
    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn answer_so_far(&self) -> &str {
        &self.answer
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Drain the remaining fragments and return the full answer.
    pub async fn collect_answer(&mut self) -> Result<String> {
        while let Some(fragment) = self.next().await {
            fragment?;
        }
        Ok(self.answer.clone())
    }

    pub fn into_answer(self) -> String {
        self.answer
    }
}

impl Stream for AnswerStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        match self.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(fragment))) => {
                self.answer.push_str(&fragment);
                Poll::Ready(Some(Ok(fragment)))
            }
            Poll::Ready(Some(Err(e))) => {
                self.error = Some(e.to_string());
                self.finished = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

pub struct AnswerGenerator {
    provider: Arc<dyn GenerationProvider>,
}

impl AnswerGenerator {
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self { provider }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn build_prompt(question: &str, chunks: &[ScoredChunk]) -> String {
        render_prompt(PROMPT_TEMPLATE, question, &format_context(chunks))
    }

    pub async fn stream_answer(&self, question: &str, chunks: &[ScoredChunk]) -> Result<AnswerStream> {
        let prompt = Self::build_prompt(question, chunks);
        log::debug!("Prompt is {} bytes with {} context chunks", prompt.len(), chunks.len());

        let fragments = self.provider
            .generate_stream(&prompt)
            .await
            .map_err(|e| anyhow!("Failed to start generation with {}: {}", self.provider.model_name(), e))?;

        Ok(AnswerStream::new(fragments))
    }
}
