use pdf_rag_agent::api;
use pdf_rag_agent::commands::{handle_question, load_document, CommandFlow, CommandHandler};
use pdf_rag_agent::config::ConversionBackend;
use pdf_rag_agent::{Backends, RagConfig, RagSession};
use std::net::SocketAddr;
use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use rustyline::error::ReadlineError;
use rustyline::Editor;
use rustyline::history::DefaultHistory;
use tokio::net::TcpListener;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Ask questions about a PDF with a local RAG pipeline", long_about = None)]
struct Args {
    /// PDF to index before accepting questions
    #[arg(long)]
    pdf: Option<String>,

    /// Answer a single question about --pdf and exit
    #[arg(short, long, requires = "pdf")]
    question: Option<String>,

    #[arg(long)]
    api: bool,

    #[arg(long, default_value = "3000")]
    port: u16,

    /// docling or pdf-extract
    #[arg(long)]
    converter: Option<ConversionBackend>,

    #[arg(long)]
    embedding_model: Option<String>,

    #[arg(long)]
    generation_model: Option<String>,

    /// Ollama base URL used for both embeddings and generation
    #[arg(long)]
    ollama_url: Option<String>,

    #[arg(long)]
    docling_url: Option<String>,
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Initialize colored output
    colored::control::set_override(true);

    // Load environment variables
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = build_config(&args)?;
    let backends = Backends::from_config(&config)?;
    let session = RagSession::new(config, backends);

    if args.api {
        run_api_server(&args, session).await
    } else if let Some(question) = &args.question {
        run_single_question(&args, session, question).await
    } else {
        run_cli_mode(&args, session).await
    }
}

fn build_config(args: &Args) -> Result<RagConfig, BoxError> {
    let mut config = RagConfig::from_env()?;

    if let Some(converter) = args.converter {
        config.conversion_backend = converter;
    }
    if let Some(model) = &args.embedding_model {
        config.embedding_model = model.clone();
    }
    if let Some(model) = &args.generation_model {
        config.generation_model = model.clone();
    }
    if let Some(url) = &args.ollama_url {
        config.embedding_endpoint = url.clone();
        config.generation_endpoint = url.clone();
    }
    if let Some(url) = &args.docling_url {
        config.conversion_endpoint = url.clone();
    }

    config.validate()?;
    Ok(config)
}

async fn run_single_question(args: &Args, mut session: RagSession, question: &str) -> Result<(), BoxError> {
    if let Some(pdf) = &args.pdf {
        load_document(&mut session, pdf).await?;
    }
    handle_question(&mut session, question).await?;
    Ok(())
}

async fn run_cli_mode(args: &Args, session: RagSession) -> Result<(), BoxError> {
    let mut command_handler = CommandHandler::new(session);

    // Show initial help menu
    command_handler.handle_command("help").await?;

    if let Some(pdf) = &args.pdf {
        if let Err(e) = command_handler.handle_command(&format!("load {}", pdf)).await {
            println!("{}", e.red());
        }
    }

    let mut rl = Editor::<(), DefaultHistory>::new()?;

    loop {
        match rl.readline("👤 ") {
            Ok(line) => {
                let input = line.trim();
                let _ = rl.add_history_entry(input);

                match command_handler.handle_command(input).await {
                    Ok(CommandFlow::Exit) => break,
                    Ok(CommandFlow::Continue) => {}
                    Err(e) => println!("{}", e.red()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    log::info!("Session ended in stage {}", command_handler.session().stage());
    Ok(())
}

async fn run_api_server(args: &Args, mut session: RagSession) -> Result<(), BoxError> {
    let addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;

    if let Some(pdf) = &args.pdf {
        load_document(&mut session, pdf).await?;
    }

    let listener = TcpListener::bind(&addr).await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    log::info!("API server listening on {}", addr);
    println!("Ready to accept connections!");

    api::serve(listener, session, api::shutdown_signal())
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    log::info!("API server shut down gracefully");

    Ok(())
}
