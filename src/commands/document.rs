use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

use crate::pipeline::RagSession;

pub async fn load(session: &mut RagSession, file_path: &str) -> Result<(), String> {
    if file_path.is_empty() {
        return Err("Missing file path. Usage: load <file_path>".to_string());
    }

    println!("📄 Loading document: {}", file_path.bright_yellow());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!(
        "Converting with {}, splitting and indexing...",
        session.converter_name()
    ));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = session.ingest_path(Path::new(file_path)).await;
    spinner.finish_and_clear();

    let report = result.map_err(|e| format!("Failed to load document: {}", e))?;

    println!("✅ Document converted to markdown ({} bytes).", report.markdown_bytes);
    println!("✂️  Document split into {} chunks.", report.chunk_count.to_string().cyan());
    println!(
        "🗂️  Vector store ready (dimension {}). Ask a question about the document.",
        report.dimension.to_string().cyan()
    );
    if report.chunk_count == 0 {
        println!("{}", "⚠️  No text was found; answers will have no context.".yellow());
    }
    Ok(())
}

pub fn print_chunks(session: &RagSession) {
    let chunks = session.chunks();
    if chunks.is_empty() {
        println!("No chunks indexed. Use: load <file_path>");
        return;
    }

    for chunk in chunks {
        let heading = chunk.heading_path();
        let heading = if heading.is_empty() { "(no heading)".to_string() } else { heading };
        let preview: String = chunk.content.chars().take(120).collect();
        println!(
            "{} {} - {}",
            format!("[{}]", chunk.index).cyan(),
            heading.bright_yellow(),
            preview.replace('\n', " ")
        );
    }
}

pub fn print_status(session: &RagSession) {
    println!("\n📋 Session status: {}", session.stage().to_string().cyan());
    match session.report() {
        Some(report) => {
            println!("  Document:  {}", report.source);
            println!("  Chunks:    {}", report.chunk_count);
            println!("  Dimension: {}", report.dimension);
            println!("  Indexed:   {}", report.indexed_at.to_rfc3339());
        }
        None => println!("  No document loaded."),
    }
    if let Some(error) = session.last_error() {
        println!("  Last error: {}", error.red());
    }
    println!();
}
