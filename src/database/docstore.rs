use std::collections::HashMap;
use uuid::Uuid;

use crate::document::Chunk;

/// Resolves index hits back to chunk content.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocstore {
    docs: HashMap<String, Chunk>,
}

impl InMemoryDocstore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, chunk: Chunk) -> String {
        let id = Uuid::new_v4().to_string();
        self.docs.insert(id.clone(), chunk);
        id
    }

    pub fn search(&self, id: &str) -> Option<&Chunk> {
        self.docs.get(id)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
