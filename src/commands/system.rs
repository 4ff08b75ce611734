use colored::Colorize;

use super::CommandFlow;
use crate::config::{RagConfig, SearchKind};

pub fn handle_command(input: &str) -> Result<CommandFlow, String> {
    match input.to_lowercase().as_str() {
        "help" => {
            println!("\n🤖 PDF Q&A Commands:");
            println!("  Just type your question once a document is loaded");
            println!();

            println!("📄 Document Commands:");
            println!("  load <file>     - Convert, split and index a PDF (replaces the current one)");
            println!("  chunks          - List the indexed chunks");
            println!("  status          - Show the pipeline state");
            println!();

            println!("❓ Question Commands:");
            println!("  ask <question>  - Retrieve relevant chunks and stream an answer");
            println!("  <question>      - Same as ask");
            println!();

            println!("⚙️ System Commands:");
            println!("  config - Show backend configuration");
            println!("  help   - Show this help menu");
            println!("  exit   - Exit the program");
            println!();
            Ok(CommandFlow::Continue)
        },
        "exit" | "quit" => {
            println!("👋 Goodbye!");
            Ok(CommandFlow::Exit)
        },
        _ => Err("Unknown system command. Type 'help' for available commands.".to_string())
    }
}

pub fn print_config(config: &RagConfig) {
    println!("\n⚙️ Configuration:");
    println!("  Embedding:  {} @ {}", config.embedding_model.cyan(), config.embedding_endpoint);
    println!("  Generation: {} @ {}", config.generation_model.cyan(), config.generation_endpoint);
    println!("  Converter:  {:?} @ {}", config.conversion_backend, config.conversion_endpoint);
    println!(
        "  Headers:    {}",
        config.chunk_headers.iter().map(|h| h.marker.as_str()).collect::<Vec<_>>().join(" ")
    );
    match config.search {
        SearchKind::Similarity => println!("  Search:     similarity, k={}", config.retrieval_k),
        SearchKind::Mmr { fetch_k, lambda_mult } => println!(
            "  Search:     mmr, k={}, fetch_k={}, lambda={}",
            config.retrieval_k, fetch_k, lambda_mult
        ),
    }
    println!();
}
