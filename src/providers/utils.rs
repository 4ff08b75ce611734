use anyhow::{anyhow, Result};
use reqwest::{Client, Response};
use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Only connecting is bounded by default; a response body may take as long
/// as the backend needs unless `timeout_secs` is set.
pub fn build_http_client(timeout_secs: Option<u64>) -> Result<Client> {
    let mut builder = Client::builder().connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS));
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))
}

/// Turn a non-success response into an error carrying the status and body.
pub async fn ensure_success(response: Response, service: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    Err(anyhow!("{} request failed: Status {}, Body: {}", service, status, error_text))
}

/// Split complete newline-terminated lines off the front of `buffer`.
pub fn drain_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line).trim().to_string();
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}
