//! Destination-bucket document splitting.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::document::{DocumentError, SourceDocument};
use crate::models::{Destination, SplitFile, StatementRecord};

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("Failed to write {destination} output: {source}")]
    Write {
        destination: &'static str,
        #[source]
        source: DocumentError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Groups finalized records by destination and writes one output document per
/// non-empty bucket.
pub struct DocumentSplitter {
    output_dir: PathBuf,
}

impl DocumentSplitter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    /// Copy each bucket's pages into its output document.
    ///
    /// Pages keep source order: records are visited in extraction order and
    /// each record's page run is already ascending. Declared pages outside
    /// the source document are logged and dropped, never fatal.
    pub fn split(
        &self,
        records: &[StatementRecord],
        document: &dyn SourceDocument,
    ) -> Result<BTreeMap<Destination, SplitFile>, SplitError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let total = document.page_count();

        let mut buckets: BTreeMap<Destination, Vec<u32>> = BTreeMap::new();
        for record in records {
            let Some(destination) = record.destination else {
                tracing::warn!(
                    "Statement for '{}' has no destination; skipping",
                    record.company_name
                );
                continue;
            };
            let pages = buckets.entry(destination).or_default();
            for &page in &record.pages {
                if page >= 1 && page <= total {
                    pages.push(page);
                } else {
                    tracing::warn!(
                        "Page {} of statement '{}' is outside the {}-page document; dropped",
                        page,
                        record.company_name,
                        total
                    );
                }
            }
        }

        let mut outputs = BTreeMap::new();
        for (destination, pages) in buckets {
            if pages.is_empty() {
                continue;
            }
            let path = self.output_dir.join(destination.file_name());
            let written = document
                .copy_pages(&pages, &path)
                .map_err(|source| SplitError::Write {
                    destination: destination.as_str(),
                    source,
                })?;
            tracing::info!("Wrote {} ({} pages)", path.display(), written);
            outputs.insert(destination, SplitFile { path, pages: written });
        }

        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::StaticDocument;

    fn record(pages: Vec<u32>, destination: Destination) -> StatementRecord {
        let total = pages.len() as u32;
        let mut record = StatementRecord::new(
            pages,
            "Test Co".to_string(),
            String::new(),
            1,
            total,
        );
        record.destination = Some(destination);
        record
    }

    fn document(pages: u32) -> StaticDocument {
        StaticDocument::new((1..=pages).map(|p| format!("page {}", p)))
    }

    #[test]
    fn test_split_groups_by_destination() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            record(vec![1], Destination::Dnm),
            record(vec![2, 3], Destination::NationalMulti),
            record(vec![4], Destination::Dnm),
        ];
        let splitter = DocumentSplitter::new(dir.path().to_path_buf());
        let outputs = splitter.split(&records, &document(4)).unwrap();

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[&Destination::Dnm].pages, 2);
        assert_eq!(outputs[&Destination::NationalMulti].pages, 2);
        assert!(dir.path().join("DNM.pdf").exists());
        assert!(dir.path().join("natioMulti.pdf").exists());
        assert!(!dir.path().join("Foreign.pdf").exists());

        // DNM bucket keeps source order across records.
        let dnm = std::fs::read_to_string(dir.path().join("DNM.pdf")).unwrap();
        assert_eq!(dnm, "page 1\x0cpage 4");
    }

    #[test]
    fn test_empty_buckets_produce_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let splitter = DocumentSplitter::new(dir.path().to_path_buf());
        let outputs = splitter.split(&[], &document(2)).unwrap();
        assert!(outputs.is_empty());
    }

    #[test]
    fn test_out_of_range_pages_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        // Declared pagination claims three pages but the document has two.
        let records = vec![record(vec![2, 3, 4], Destination::Foreign)];
        let splitter = DocumentSplitter::new(dir.path().to_path_buf());
        let outputs = splitter.split(&records, &document(2)).unwrap();
        assert_eq!(outputs[&Destination::Foreign].pages, 1);
    }

    #[test]
    fn test_written_pages_match_in_range_record_pages() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            record(vec![1, 2], Destination::NationalMulti),
            record(vec![3], Destination::Foreign),
            record(vec![4, 5], Destination::Dnm),
        ];
        let splitter = DocumentSplitter::new(dir.path().to_path_buf());
        let outputs = splitter.split(&records, &document(5)).unwrap();

        let in_range: u32 = records.iter().map(|r| r.pages.len() as u32).sum();
        let written: u32 = outputs.values().map(|f| f.pages).sum();
        assert_eq!(written, in_range);
    }
}
