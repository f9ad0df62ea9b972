//! Maps a chat model's citation spans back onto the rendered answer text.
//!
//! Citation-capable models return byte intervals into their own answer
//! together with the grounding documents that support them. This module
//! splices highlight markers and document-id annotations into the answer
//! without corrupting the offsets of spans not yet processed.

use thiserror::Error;

/// A citation interval into the *original* answer string.
///
/// Offsets are half-open byte ranges `[start, end)`, 0-indexed, the same
/// convention the Cohere chat API uses for its `citations` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CitationSpan {
    pub start: usize,
    pub end: usize,
}

impl CitationSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CitationError {
    #[error("spans and doc_ids differ in length: {spans} vs {doc_ids}")]
    LengthMismatch { spans: usize, doc_ids: usize },
    #[error("citation span {start}..{end} is out of range for answer of length {len}")]
    OutOfRange {
        start: usize,
        end: usize,
        len: usize,
    },
    #[error("citation span boundary {offset} is not a character boundary")]
    NotCharBoundary { offset: usize },
    #[error("citation spans {first_start}..{first_end} and {second_start}..{second_end} overlap")]
    Overlap {
        first_start: usize,
        first_end: usize,
        second_start: usize,
        second_end: usize,
    },
}

const MARK_OPEN: &str = "<mark>";
const MARK_CLOSE: &str = "</mark>";

/// Wrap every cited span of `answer` in a highlight marker, followed by the
/// bracketed list of document ids supporting it.
///
/// `spans` and `doc_ids` are aligned by index. Spans may be given in any
/// order; splicing happens from the rightmost span leftward so earlier
/// insertions never invalidate pending offsets. Overlapping spans have no
/// sensible rendering and are rejected.
pub fn annotate_answer(
    answer: &str,
    spans: &[CitationSpan],
    doc_ids: &[Vec<String>],
) -> Result<String, CitationError> {
    if spans.len() != doc_ids.len() {
        return Err(CitationError::LengthMismatch {
            spans: spans.len(),
            doc_ids: doc_ids.len(),
        });
    }

    for span in spans {
        if span.start > span.end || span.end > answer.len() {
            return Err(CitationError::OutOfRange {
                start: span.start,
                end: span.end,
                len: answer.len(),
            });
        }
        for offset in [span.start, span.end] {
            if !answer.is_char_boundary(offset) {
                return Err(CitationError::NotCharBoundary { offset });
            }
        }
    }

    let mut pairs: Vec<(&CitationSpan, &Vec<String>)> = spans.iter().zip(doc_ids.iter()).collect();
    // rightmost span first
    pairs.sort_by(|a, b| b.0.start.cmp(&a.0.start));

    for window in pairs.windows(2) {
        let (right, left) = (window[0].0, window[1].0);
        if left.end > right.start {
            return Err(CitationError::Overlap {
                first_start: left.start,
                first_end: left.end,
                second_start: right.start,
                second_end: right.end,
            });
        }
    }

    let mut result = answer.to_string();

    for (span, ids) in pairs {
        let annotation = format!(" [{}]", ids.join(", "));
        result.insert_str(span.end, &annotation);
        result.insert_str(span.end, MARK_CLOSE);
        result.insert_str(span.start, MARK_OPEN);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn highlights_single_span() {
        let answer = "The sky is blue.";
        let out = annotate_answer(answer, &[CitationSpan::new(4, 7)], &[ids(&["1"])]).unwrap();

        assert_eq!(out, "The <mark>sky</mark> [1] is blue.");
    }

    #[test]
    fn zero_spans_returns_answer_unchanged() {
        let answer = "Nothing to cite here.";
        let out = annotate_answer(answer, &[], &[]).unwrap();
        assert_eq!(out, answer);
    }

    #[test]
    fn visible_text_is_preserved() {
        let answer = "Aspirin lowers fever and reduces inflammation in adults.";
        let spans = [CitationSpan::new(0, 7), CitationSpan::new(15, 20)];
        let doc_ids = [ids(&["1", "3"]), ids(&["2"])];

        let out = annotate_answer(answer, &spans, &doc_ids).unwrap();

        // Removing markers and annotations yields the original text
        let stripped = out
            .replace("<mark>", "")
            .replace("</mark>", "")
            .replace(" [1, 3]", "")
            .replace(" [2]", "");
        assert_eq!(stripped, answer);

        // Each highlighted substring equals the slice of the original answer
        assert!(out.contains("<mark>Aspirin</mark> [1, 3]"));
        assert!(out.contains("<mark>fever</mark> [2]"));
    }

    #[test]
    fn input_order_does_not_matter() {
        let answer = "Metformin treats type 2 diabetes in elderly patients.";
        let a = CitationSpan::new(0, 9);
        let b = CitationSpan::new(17, 32);
        let ids_a = ids(&["1"]);
        let ids_b = ids(&["2"]);

        let forward = annotate_answer(answer, &[a, b], &[ids_a.clone(), ids_b.clone()]).unwrap();
        let backward = annotate_answer(answer, &[b, a], &[ids_b, ids_a]).unwrap();

        assert_eq!(forward, backward);
    }

    #[test]
    fn out_of_range_span_is_rejected() {
        let answer = "short";
        let err = annotate_answer(answer, &[CitationSpan::new(10, 12)], &[ids(&["1"])]).unwrap_err();
        assert_eq!(
            err,
            CitationError::OutOfRange {
                start: 10,
                end: 12,
                len: 5
            }
        );
    }

    #[test]
    fn inverted_span_is_rejected() {
        let answer = "some answer";
        let err = annotate_answer(answer, &[CitationSpan::new(5, 2)], &[ids(&["1"])]).unwrap_err();
        assert!(matches!(err, CitationError::OutOfRange { .. }));
    }

    #[test]
    fn overlapping_spans_are_rejected() {
        let answer = "overlapping spans are not defined";
        let spans = [CitationSpan::new(0, 11), CitationSpan::new(5, 16)];
        let doc_ids = [ids(&["1"]), ids(&["2"])];

        let err = annotate_answer(answer, &spans, &doc_ids).unwrap_err();
        assert!(matches!(err, CitationError::Overlap { .. }));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = annotate_answer("text", &[CitationSpan::new(0, 4)], &[]).unwrap_err();
        assert_eq!(
            err,
            CitationError::LengthMismatch {
                spans: 1,
                doc_ids: 0
            }
        );
    }

    #[test]
    fn non_char_boundary_offset_is_rejected() {
        // 'è' is two bytes; offset 1 lands inside it
        let answer = "è una prova";
        let err = annotate_answer(answer, &[CitationSpan::new(1, 4)], &[ids(&["1"])]).unwrap_err();
        assert_eq!(err, CitationError::NotCharBoundary { offset: 1 });
    }

    #[test]
    fn adjacent_spans_are_allowed() {
        let answer = "abcdef";
        let spans = [CitationSpan::new(0, 3), CitationSpan::new(3, 6)];
        let doc_ids = [ids(&["1"]), ids(&["2"])];

        let out = annotate_answer(answer, &spans, &doc_ids).unwrap();
        assert_eq!(out, "<mark>abc</mark> [1]<mark>def</mark> [2]");
    }
}
