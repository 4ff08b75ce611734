pub mod chunker;
pub mod loader;

pub use chunker::{Chunk, Heading, MarkdownHeaderSplitter};
pub use loader::{DocumentLoader, TempUpload};
