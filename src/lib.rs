pub mod api;
pub mod citations;
pub mod config;
pub mod ingest;
pub mod providers;
pub mod rag;
pub mod store;

pub use citations::{annotate_answer, CitationError, CitationSpan};
pub use config::{AppConfig, Secrets};
pub use rag::{RagAnswer, RagChain};
