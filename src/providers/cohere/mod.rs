pub mod chat;
pub mod rerank;

pub use chat::CohereProvider;
pub use rerank::CohereReranker;
