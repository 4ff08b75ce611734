pub mod docstore;
pub mod flat_index;
pub mod mmr;
pub mod vector_db;

pub use docstore::InMemoryDocstore;
pub use flat_index::{FlatL2Index, IndexError};
pub use vector_db::{ScoredChunk, VectorStore, VectorStoreError};
