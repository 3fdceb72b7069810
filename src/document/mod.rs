//! Source document access.
//!
//! The pipeline reads page text and copies page ranges through the
//! [`SourceDocument`] trait, so the classification stages run the same way
//! against poppler-backed PDFs and in-memory fixtures.

mod poppler;

pub use poppler::{check_tools, PdfDocument};

use std::path::Path;

use thiserror::Error;

/// Errors that can occur while reading or writing documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: u32, total: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A multi-page document with an extractable text layer.
pub trait SourceDocument: Send + Sync {
    /// Number of physical pages.
    fn page_count(&self) -> u32;

    /// Text layer of a 1-based page.
    fn page_text(&self, page: u32) -> Result<String, DocumentError>;

    /// Copy the given 1-based pages, in the order given, into a new document
    /// at `dest`. Returns the number of pages written.
    fn copy_pages(&self, pages: &[u32], dest: &Path) -> Result<u32, DocumentError>;
}

/// In-memory document backend.
///
/// Pages are plain text; copies are written as text with form-feed page
/// breaks. Used by tests and for text-file inputs.
#[derive(Debug, Clone, Default)]
pub struct StaticDocument {
    pages: Vec<String>,
}

impl StaticDocument {
    pub fn new<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pages: pages.into_iter().map(Into::into).collect(),
        }
    }
}

impl SourceDocument for StaticDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_text(&self, page: u32) -> Result<String, DocumentError> {
        if page == 0 || page > self.page_count() {
            return Err(DocumentError::PageOutOfRange {
                page,
                total: self.page_count(),
            });
        }
        Ok(self.pages[(page - 1) as usize].clone())
    }

    fn copy_pages(&self, pages: &[u32], dest: &Path) -> Result<u32, DocumentError> {
        let mut chunks = Vec::with_capacity(pages.len());
        for &page in pages {
            chunks.push(self.page_text(page)?);
        }
        std::fs::write(dest, chunks.join("\x0c"))?;
        Ok(pages.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_document_page_text() {
        let doc = StaticDocument::new(["first", "second"]);
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.page_text(1).unwrap(), "first");
        assert!(matches!(
            doc.page_text(3),
            Err(DocumentError::PageOutOfRange { page: 3, total: 2 })
        ));
        assert!(doc.page_text(0).is_err());
    }

    #[test]
    fn test_static_document_copy_pages() {
        let doc = StaticDocument::new(["a", "b", "c"]);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.txt");
        let written = doc.copy_pages(&[3, 1], &dest).unwrap();
        assert_eq!(written, 2);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "c\x0ca");
    }
}
