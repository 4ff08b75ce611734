use crate::pipeline::RagSession;

mod ask;
mod document;
mod system;

/// Whether the REPL keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFlow {
    Continue,
    Exit,
}

pub struct CommandHandler {
    session: RagSession,
}

impl CommandHandler {
    pub fn new(session: RagSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &RagSession {
        &self.session
    }

    pub async fn handle_command(&mut self, input: &str) -> Result<CommandFlow, String> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(CommandFlow::Continue);
        }

        // Handle single-word commands first
        match input.to_lowercase().as_str() {
            "help" | "exit" | "quit" => return system::handle_command(input),
            "status" => {
                document::print_status(&self.session);
                return Ok(CommandFlow::Continue);
            }
            "config" => {
                system::print_config(self.session.config());
                return Ok(CommandFlow::Continue);
            }
            "chunks" => {
                document::print_chunks(&self.session);
                return Ok(CommandFlow::Continue);
            }
            "load" => {
                println!("Please specify a PDF to load.");
                println!("Usage: load <file_path>");
                return Ok(CommandFlow::Continue);
            }
            _ => {}
        }

        if let Some(path) = strip_command(input, "load") {
            document::load(&mut self.session, path).await?;
            return Ok(CommandFlow::Continue);
        }

        let question = strip_command(input, "ask").unwrap_or(input).trim();
        ask::handle_question(&mut self.session, question).await?;
        Ok(CommandFlow::Continue)
    }
}

/// The argument after a leading `command` word, matched case-insensitively.
fn strip_command<'a>(input: &'a str, command: &str) -> Option<&'a str> {
    let head = input.get(..command.len())?;
    let rest = &input[command.len()..];
    if head.eq_ignore_ascii_case(command) && rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

pub use ask::handle_question;
pub use document::load as load_document;
