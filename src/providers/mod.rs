pub mod cohere;
pub mod oci;
pub mod traits;
pub mod utils;

pub use traits::{ChatMessage, ChatModel, ChatResponse, Embedder, GroundingDoc, Role, TokenStream};

/// The chat models selectable from the UI, aligned with the official ids.
pub fn available_models() -> Vec<&'static str> {
    vec![
        "cohere.command-r-16k",
        "cohere.command-r-plus",
        "meta.llama-3-70b-instruct",
    ]
}
