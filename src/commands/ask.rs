use colored::Colorize;
use futures::StreamExt;
use std::io::Write;

use crate::database::ScoredChunk;
use crate::pipeline::RagSession;

pub async fn handle_question(session: &mut RagSession, question: &str) -> Result<(), String> {
    if question.is_empty() {
        return Err("Please enter a question.".to_string());
    }

    let (chunks, mut stream) = session.ask(question).await
        .map_err(|e| format!("Failed to answer: {}", e))?;

    print_relevant_chunks(&chunks);

    println!("{}", "💬 Generating answer...".bright_blue());
    let mut stdout = std::io::stdout();
    while let Some(fragment) = stream.next().await {
        match fragment {
            Ok(text) => {
                print!("{}", text.truecolor(255, 236, 179));
                let _ = stdout.flush();
            }
            Err(e) => {
                println!();
                println!("{}", format!("Generation interrupted: {}", e).red());
                break;
            }
        }
    }
    println!();

    session.finish_answer(&stream)
        .map_err(|e| format!("Answer incomplete: {}", e))?;

    let answer = stream.answer_so_far();
    println!("\n{}", "📝 Final Answer:".bold());
    println!("{}", answer);

    let input_tokens = question.split_whitespace().count();
    let response_tokens = answer.split_whitespace().count();
    println!(
        "\n📊 Tokens: 📥 Input: {} | 📤 Response: {} | 📈 Total: {}",
        input_tokens.to_string().cyan(),
        response_tokens.to_string().cyan(),
        (input_tokens + response_tokens).to_string().cyan()
    );
    println!();
    Ok(())
}

fn print_relevant_chunks(chunks: &[ScoredChunk]) {
    if chunks.is_empty() {
        println!("{}", "No relevant chunks found; answering without context.".yellow());
        return;
    }

    println!("\n{}", "🔎 Relevant Chunks Used for Answer:".bold());
    for (i, scored) in chunks.iter().enumerate() {
        println!("{}", format!("Chunk {} (distance {:.4}):", i + 1, scored.distance).cyan());
        println!("{}", scored.chunk.content);
        println!("---");
    }
}
