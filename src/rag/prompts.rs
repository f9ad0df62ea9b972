//! System prompts for the two LLM calls in the pipeline: condensing the
//! conversational question into a standalone one, and answering from the
//! retrieved context.

pub const CONTEXT_Q_SYSTEM_PROMPT: &str = "Given a chat history and the latest user question \
which might reference context in the chat history, formulate a standalone question \
which can be understood without the chat history. Do NOT answer the question, \
just reformulate it if needed and otherwise return it as is.";

pub const QA_SYSTEM_PROMPT: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know. \
Don't add sentences like: According to the provided context.";

/// Italian variant, kept for bilingual document sets.
pub const QA_SYSTEM_PROMPT_IT: &str = "Sei un assistente per task di domanda-risposta. \
Utilizza i frammenti seguenti di testo per rispondere alla domanda. \
Se non conosci la risposta, dici semplicemente che non conosci la risposta.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condense_prompt_forbids_answering() {
        assert!(CONTEXT_Q_SYSTEM_PROMPT.contains("Do NOT answer"));
    }

    #[test]
    fn qa_prompt_admits_ignorance() {
        assert!(QA_SYSTEM_PROMPT.contains("just say that you don't know"));
    }
}
