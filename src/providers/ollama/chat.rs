use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::VecDeque;
use url::Url;

use crate::config::{endpoint_url, RagConfig};
use crate::providers::traits::{FragmentStream, GenerationProvider};
use crate::providers::utils::{build_http_client, drain_lines, ensure_success};

#[derive(Clone)]
pub struct OllamaChat {
    client: Client,
    url: Url,
    model: String,
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    message: Option<ChatMessage>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

impl OllamaChat {
    pub fn new(config: &RagConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config.request_timeout_secs)?,
            url: endpoint_url(&config.generation_endpoint, "api/chat")?,
            model: config.generation_model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl GenerationProvider for OllamaChat {
    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream> {
        let mut body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "stream": true
        });
        if let Some(temperature) = self.temperature {
            body["options"] = json!({ "temperature": temperature });
        }

        let response = self.client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow!("Generation service unreachable at {}: {}", self.url, e))?;

        let response = ensure_success(response, "Ollama chat").await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(anyhow::Error::from))
            .boxed();

        Ok(ndjson_fragments(bytes))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

struct NdjsonState {
    body: BoxStream<'static, Result<Vec<u8>>>,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    finished: bool,
}

/// Decode a newline-delimited JSON chat body into answer fragments.
pub(crate) fn ndjson_fragments(body: BoxStream<'static, Result<Vec<u8>>>) -> FragmentStream {
    let state = NdjsonState {
        body,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.pending.pop_front() {
                match parse_chunk(&line) {
                    Ok((content, done)) => {
                        if done {
                            state.finished = true;
                            state.pending.clear();
                        }
                        if !content.is_empty() {
                            return Some((Ok(content), state));
                        }
                        continue;
                    }
                    Err(e) => {
                        state.finished = true;
                        state.pending.clear();
                        return Some((Err(e), state));
                    }
                }
            }

            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    state.buffer.extend_from_slice(&bytes);
                    let lines = drain_lines(&mut state.buffer);
                    state.pending.extend(lines);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(anyhow!("Generation stream interrupted: {}", e)), state));
                }
                None => {
                    // Body closed; a final line may lack its newline
                    state.finished = true;
                    let tail = String::from_utf8_lossy(&state.buffer).trim().to_string();
                    state.buffer.clear();
                    if !tail.is_empty() {
                        state.pending.push_back(tail);
                    }
                }
            }
        }
    })
    .boxed()
}

fn parse_chunk(line: &str) -> Result<(String, bool)> {
    let chunk: ChatChunk = serde_json::from_str(line)
        .map_err(|e| anyhow!("Malformed generation chunk {:?}: {}", line, e))?;

    if let Some(error) = chunk.error {
        return Err(anyhow!("Generation service returned error: {}", error));
    }

    let content = chunk.message.map(|m| m.content).unwrap_or_default();
    Ok((content, chunk.done))
}
