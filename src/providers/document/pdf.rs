use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::providers::traits::DocumentConverter;

/// Offline converter backed by `pdf-extract`.
///
/// Plain PDF text carries no heading markup, so the output is rooted under a
/// single `#` title built from the file name.
#[derive(Clone, Default)]
pub struct PdfExtractConverter;

impl PdfExtractConverter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentConverter for PdfExtractConverter {
    async fn convert(&self, path: &Path) -> Result<String> {
        let owned: PathBuf = path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned))
            .await
            .map_err(|e| anyhow!("PDF extraction task failed: {}", e))?
            .map_err(|e| anyhow!("Failed to extract text from {}: {}", path.display(), e))?;

        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Document".to_string());

        Ok(to_markdown(&title, &text))
    }

    fn name(&self) -> &str {
        "pdf-extract"
    }
}

fn to_markdown(title: &str, text: &str) -> String {
    // Form feeds separate pages
    let body = text
        .replace('\u{c}', "\n\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    let body = body.trim();

    if body.is_empty() {
        return String::new();
    }
    format!("# {}\n\n{}\n", title, body)
}
