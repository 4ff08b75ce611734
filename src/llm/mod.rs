pub mod answer;
pub mod semantic_search;

pub use answer::{AnswerGenerator, AnswerStream, PROMPT_TEMPLATE};
pub use semantic_search::Retriever;
