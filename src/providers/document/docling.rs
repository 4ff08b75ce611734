use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use url::Url;

use crate::config::{endpoint_url, RagConfig};
use crate::providers::traits::DocumentConverter;
use crate::providers::utils::{build_http_client, ensure_success};

/// Converts documents through a docling-serve instance.
#[derive(Clone)]
pub struct DoclingConverter {
    client: Client,
    url: Url,
}

#[derive(Debug, Deserialize)]
struct ConvertResponse {
    document: Option<ConvertedDocument>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ConvertedDocument {
    md_content: Option<String>,
}

impl DoclingConverter {
    pub fn new(config: &RagConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config.request_timeout_secs)?,
            url: endpoint_url(&config.conversion_endpoint, "v1/convert/file")?,
        })
    }
}

#[async_trait]
impl DocumentConverter for DoclingConverter {
    async fn convert(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = Form::new()
            .text("to_formats", "md")
            .part("files", part);

        log::debug!("Sending {} to docling at {}", path.display(), self.url);
        let response = self.client
            .post(self.url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| anyhow!("Conversion service unreachable at {}: {}", self.url, e))?;

        let response = ensure_success(response, "Docling convert").await?;
        let body: ConvertResponse = response.json().await
            .map_err(|e| anyhow!("Malformed conversion response: {}", e))?;

        parse_markdown(body)
    }

    fn name(&self) -> &str {
        "docling"
    }
}

fn parse_markdown(body: ConvertResponse) -> Result<String> {
    if body.status != "success" && body.status != "partial_success" {
        return Err(anyhow!(
            "Conversion failed with status '{}': {}",
            body.status,
            serde_json::to_string(&body.errors).unwrap_or_default()
        ));
    }

    if body.status == "partial_success" {
        log::warn!("Docling reported partial conversion: {} error(s)", body.errors.len());
    }

    body.document
        .and_then(|d| d.md_content)
        .ok_or_else(|| anyhow!("Conversion response did not include markdown content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_markdown_from_success() {
        let body: ConvertResponse = serde_json::from_str(
            r##"{"document":{"filename":"a.pdf","md_content":"# Title\n\nBody"},"status":"success","errors":[]}"##
        ).unwrap();
        assert_eq!(parse_markdown(body).unwrap(), "# Title\n\nBody");
    }

    #[test]
    fn failure_status_is_an_error() {
        let body: ConvertResponse = serde_json::from_str(
            r#"{"document":{"md_content":null},"status":"failure","errors":[{"error_message":"not a pdf"}]}"#
        ).unwrap();
        let err = parse_markdown(body).unwrap_err().to_string();
        assert!(err.contains("failure"));
        assert!(err.contains("not a pdf"));
    }

    #[test]
    fn missing_markdown_is_an_error() {
        let body: ConvertResponse = serde_json::from_str(r#"{"document":{},"status":"success"}"#).unwrap();
        assert!(parse_markdown(body).is_err());
    }
}
