//! PDF loading and chunking: turns each document into an ordered sequence of
//! text chunks tagged with source file name and page number.

pub mod splitter;

pub use splitter::TextSplitter;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::path::Path;

/// The unit stored in the vector index: a bounded span of document text plus
/// source metadata. `source` carries the file name with the path stripped,
/// `page` is 1-based as displayed to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub page: u32,
}

/// Strip the directory part from a source reference.
pub fn remove_path_from_ref(ref_pathname: &str) -> String {
    Path::new(ref_pathname)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| ref_pathname.to_string())
}

/// Load a single PDF and split it into chunks, page by page.
pub fn load_pdf_and_split(path: &Path, splitter: &TextSplitter) -> Result<Vec<Chunk>> {
    let source = remove_path_from_ref(&path.to_string_lossy());

    let mut chunks = Vec::new();

    match lopdf::Document::load(path) {
        Ok(doc) => {
            for (&page_num, _) in doc.get_pages().iter() {
                let page_text = match doc.extract_text(&[page_num]) {
                    Ok(text) => text,
                    Err(e) => {
                        log::warn!("Could not extract page {} of {}: {}", page_num, source, e);
                        continue;
                    }
                };
                for text in splitter.split(&page_text) {
                    chunks.push(Chunk {
                        text,
                        source: source.clone(),
                        page: page_num,
                    });
                }
            }
        }
        Err(e) => {
            log::warn!("lopdf failed on {}: {}, falling back to flat extraction", source, e);
        }
    }

    // Some PDFs defeat per-page extraction; fall back to the whole document
    // as page 1 rather than losing the file.
    if chunks.is_empty() {
        let text = pdf_extract::extract_text(path)
            .with_context(|| format!("Failed to extract text from {}", source))?;
        for text in splitter.split(&text) {
            chunks.push(Chunk {
                text,
                source: source.clone(),
                page: 1,
            });
        }
    }

    log::info!("Loaded {} chunks from {}...", chunks.len(), source);

    Ok(chunks)
}

/// Load every PDF in `books_dir`, sorted by name, and split into chunks.
pub fn load_books_and_split(books_dir: &str, splitter: &TextSplitter) -> Result<Vec<Chunk>> {
    log::info!("Loading documents from {}...", books_dir);

    let mut books: Vec<_> = std::fs::read_dir(books_dir)
        .with_context(|| format!("Failed to read books dir {}", books_dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false)
        })
        .collect();
    books.sort();

    log::info!("Loading books:");
    for book in &books {
        log::info!("* {}", book.display());
    }

    let progress = ProgressBar::new(books.len() as u64);
    let mut docs = Vec::new();

    for book in &books {
        match load_pdf_and_split(book, splitter) {
            Ok(chunks) => docs.extend(chunks),
            Err(e) => log::error!("Skipping {}: {}", book.display(), e),
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    log::info!("Loaded {} chunks of text...", docs.len());

    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_directory_from_source() {
        assert_eq!(remove_path_from_ref("/data/books/manual.pdf"), "manual.pdf");
        assert_eq!(remove_path_from_ref("manual.pdf"), "manual.pdf");
        assert_eq!(remove_path_from_ref("books/sub/a b.pdf"), "a b.pdf");
    }

    #[test]
    fn missing_books_dir_is_an_error() {
        let splitter = TextSplitter::new(1000, 100);
        let result = load_books_and_split("/no/such/dir", &splitter);
        assert!(result.is_err());
    }

    #[test]
    fn empty_books_dir_yields_no_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let splitter = TextSplitter::new(1000, 100);
        let docs = load_books_and_split(dir.path().to_str().unwrap(), &splitter).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn non_pdf_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a pdf").unwrap();
        let splitter = TextSplitter::new(1000, 100);
        let docs = load_books_and_split(dir.path().to_str().unwrap(), &splitter).unwrap();
        assert!(docs.is_empty());
    }
}
