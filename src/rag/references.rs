//! Reference list formatting for the end of an answer.

use crate::store::RetrievedChunk;

pub const REFERENCES_HEADING: &str = "References:";

/// Format the reference list to append after the answer. Duplicate
/// (source, page) pairs appear exactly once, in first-seen order.
pub fn format_references(context: &[RetrievedChunk]) -> String {
    let mut list_ref: Vec<String> = Vec::new();

    for retrieved in context {
        let the_ref = format!(
            "- {}, pag: {}\n",
            retrieved.chunk.source, retrieved.chunk.page
        );
        if !list_ref.contains(&the_ref) {
            list_ref.push(the_ref);
        }
    }

    format!("\n\n{}\n\n{}", REFERENCES_HEADING, list_ref.join("\n"))
}

/// Answers go into the chat history without their reference list, so the
/// next condensed question is not polluted by file names.
pub fn strip_references(text: &str) -> String {
    match text.find("Reference") {
        Some(idx) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Chunk;

    fn retrieved(source: &str, page: u32) -> RetrievedChunk {
        RetrievedChunk {
            chunk: Chunk {
                text: "some passage".to_string(),
                source: source.to_string(),
                page,
            },
            score: 0.5,
        }
    }

    #[test]
    fn duplicates_appear_once_in_first_seen_order() {
        let context = vec![
            retrieved("b.pdf", 7),
            retrieved("a.pdf", 1),
            retrieved("b.pdf", 7),
            retrieved("a.pdf", 2),
        ];

        let refs = format_references(&context);

        assert_eq!(refs.matches("b.pdf, pag: 7").count(), 1);
        assert_eq!(refs.matches("a.pdf, pag: 1").count(), 1);
        // first-seen order preserved
        let b_pos = refs.find("b.pdf, pag: 7").unwrap();
        let a_pos = refs.find("a.pdf, pag: 1").unwrap();
        assert!(b_pos < a_pos);
    }

    #[test]
    fn same_source_different_pages_are_distinct() {
        let context = vec![retrieved("a.pdf", 1), retrieved("a.pdf", 2)];
        let refs = format_references(&context);
        assert!(refs.contains("a.pdf, pag: 1"));
        assert!(refs.contains("a.pdf, pag: 2"));
    }

    #[test]
    fn strip_removes_reference_block() {
        let text = "The answer is 42.\n\nReferences:\n\n- a.pdf, pag: 1\n";
        assert_eq!(strip_references(text), "The answer is 42.");
    }

    #[test]
    fn strip_leaves_plain_answers_alone() {
        let text = "No citations here.";
        assert_eq!(strip_references(text), text);
    }
}
