pub mod chat;
pub mod embeddings;

pub use chat::OciGenAiProvider;
pub use embeddings::OciEmbedder;
