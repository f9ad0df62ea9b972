//! Recursive character text splitting with configurable size and overlap.

/// Splits text into chunks of at most `chunk_size` characters, recursively
/// descending through separators (paragraph, line, word) before falling back
/// to a hard cut. Consecutive chunks share `chunk_overlap` characters.
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        // overlap must leave room for new content in every chunk
        let chunk_overlap = chunk_overlap.min(chunk_size / 2);
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let pieces = self.split_recursive(text, 0);
        self.merge_with_overlap(pieces)
    }

    /// Break `text` into pieces no longer than chunk_size, trying coarser
    /// separators first.
    fn split_recursive<'a>(&self, text: &'a str, sep_index: usize) -> Vec<&'a str> {
        if text.chars().count() <= self.chunk_size {
            return if text.trim().is_empty() {
                Vec::new()
            } else {
                vec![text]
            };
        }

        if sep_index >= SEPARATORS.len() {
            return self.hard_split(text);
        }

        let sep = SEPARATORS[sep_index];
        let mut pieces = Vec::new();
        for part in text.split(sep) {
            if part.chars().count() > self.chunk_size {
                pieces.extend(self.split_recursive(part, sep_index + 1));
            } else if !part.trim().is_empty() {
                pieces.push(part);
            }
        }
        pieces
    }

    /// Last resort: cut at chunk_size characters, respecting char boundaries.
    fn hard_split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut pieces = Vec::new();
        let mut rest = text;
        while !rest.is_empty() {
            let cut = rest
                .char_indices()
                .nth(self.chunk_size)
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            let (head, tail) = rest.split_at(cut);
            pieces.push(head);
            rest = tail;
        }
        pieces
    }

    /// Pack pieces back into chunks close to chunk_size, carrying the tail of
    /// each finished chunk into the next one as overlap.
    fn merge_with_overlap(&self, pieces: Vec<&str>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for piece in pieces {
            let piece_len = piece.chars().count();
            if !current.is_empty() && current.chars().count() + 1 + piece_len > self.chunk_size {
                let overlap = self.overlap_tail(&current);
                chunks.push(std::mem::take(&mut current));
                // carry the overlap only when the next piece still fits
                // beside it, so the size bound holds for every chunk
                if overlap.chars().count() + 1 + piece_len <= self.chunk_size {
                    current = overlap;
                }
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(piece.trim_end());
        }

        if !current.trim().is_empty() {
            chunks.push(current);
        }

        chunks
    }

    fn overlap_tail(&self, chunk: &str) -> String {
        if self.chunk_overlap == 0 {
            return String::new();
        }
        let chars: Vec<char> = chunk.chars().collect();
        if chars.len() <= self.chunk_overlap {
            return chunk.to_string();
        }
        let tail: String = chars[chars.len() - self.chunk_overlap..].iter().collect();
        // start the overlap at a word boundary when there is one
        match tail.find(' ') {
            Some(pos) => tail[pos + 1..].to_string(),
            None => tail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let splitter = TextSplitter::new(100, 10);
        let chunks = splitter.split("a short paragraph");
        assert_eq!(chunks, vec!["a short paragraph".to_string()]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let splitter = TextSplitter::new(100, 10);
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("   \n\n  ").is_empty());
    }

    #[test]
    fn chunks_respect_size_limit() {
        let splitter = TextSplitter::new(50, 10);
        let text = "one two three four five six seven eight nine ten ".repeat(10);
        let chunks = splitter.split(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.chars().count() <= 50,
                "chunk too long: {} chars",
                chunk.chars().count()
            );
        }
    }

    #[test]
    fn size_limit_holds_after_overlap_carry() {
        // a near-full piece right after a flush must not ride on top of the
        // carried overlap
        let splitter = TextSplitter::new(30, 10);
        let text = format!("alpha beta gamma delta epsilon zeta {}", "y".repeat(29));
        let chunks = splitter.split(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.chars().count() <= 30,
                "chunk exceeds chunk_size: {} chars in {:?}",
                chunk.chars().count(),
                chunks
            );
        }
        assert!(chunks.last().unwrap().contains("yyy"));
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let splitter = TextSplitter::new(40, 0);
        let text = "first paragraph here\n\nsecond paragraph follows\n\nthird one";
        let chunks = splitter.split(text);

        assert!(chunks.iter().any(|c| c.contains("first paragraph")));
        for chunk in &chunks {
            assert!(!chunk.contains("\n\n"));
        }
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let splitter = TextSplitter::new(30, 10);
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let chunks = splitter.split(text);
        assert!(chunks.len() >= 2);

        // the head of each following chunk repeats words from the previous one
        for pair in chunks.windows(2) {
            let first_word = pair[1].split_whitespace().next().unwrap();
            assert!(
                pair[0].contains(first_word),
                "no overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn hard_split_handles_unbroken_text() {
        let splitter = TextSplitter::new(10, 0);
        let text = "x".repeat(35);
        let chunks = splitter.split(&text);

        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn hard_split_respects_char_boundaries() {
        let splitter = TextSplitter::new(5, 0);
        let text = "èèèèèèèèèèèè"; // multi-byte chars
        let chunks = splitter.split(text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 5));
        assert_eq!(chunks.concat(), text);
    }
}
