pub mod chat;
pub mod embeddings;

pub use chat::OllamaChat;
pub use embeddings::OllamaEmbeddings;
