use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;

use crate::providers::traits::DocumentConverter;

/// An uploaded document parked on disk for the length of one conversion.
///
/// The file is removed when this value is dropped, whichever way the
/// conversion ends.
pub struct TempUpload {
    file: NamedTempFile,
}

impl TempUpload {
    pub fn create(file_name: &str, bytes: &[u8]) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("rag-upload-")
            .suffix(".pdf")
            .tempfile()
            .context("Failed to create temporary upload file")?;

        file.write_all(bytes)
            .and_then(|_| file.flush())
            .with_context(|| format!("Failed to write upload {}", file_name))?;

        log::debug!("Stored upload {} at {}", file_name, file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Remove the file now, reporting removal errors instead of ignoring them.
    pub fn close(self) -> Result<()> {
        self.file.close().context("Failed to remove temporary upload")
    }
}

pub struct DocumentLoader {
    converter: Arc<dyn DocumentConverter>,
}

impl DocumentLoader {
    pub fn new(converter: Arc<dyn DocumentConverter>) -> Self {
        Self { converter }
    }

    pub fn converter_name(&self) -> &str {
        self.converter.name()
    }

    pub async fn load(&self, path: &Path) -> Result<String> {
        ensure_pdf_name(path)?;
        if !path.is_file() {
            return Err(anyhow!("File not found: {}", path.display()));
        }

        log::info!("Converting {} with {}", path.display(), self.converter.name());
        let markdown = self.converter.convert(path).await?;
        log::info!("Converted {} into {} bytes of markdown", path.display(), markdown.len());
        Ok(markdown)
    }

    pub async fn load_upload(&self, file_name: &str, bytes: &[u8]) -> Result<String> {
        ensure_pdf_name(Path::new(file_name))?;
        if bytes.is_empty() {
            return Err(anyhow!("Uploaded file {} is empty", file_name));
        }

        let upload = TempUpload::create(file_name, bytes)?;
        let result = self.load(upload.path()).await;

        if let Err(e) = upload.close() {
            log::warn!("{}", e);
        }
        result
    }
}

fn ensure_pdf_name(path: &Path) -> Result<()> {
    let is_pdf = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    if is_pdf {
        Ok(())
    } else {
        Err(anyhow!("Only PDF documents are supported: {}", path.display()))
    }
}
