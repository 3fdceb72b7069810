//! Statement boundary detection over source document pages.
//!
//! A statement's first page carries one of the start markers followed by the
//! end marker; continuation pages of a multi-page statement carry neither.
//! Page membership is reconstructed from the printed "Page X of Y"
//! annotation rather than by scanning forward.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::document::SourceDocument;
use crate::models::StatementRecord;

/// Markers that open a statement page in production print runs.
pub const DEFAULT_START_MARKERS: &[&str] = &[
    "914.949.9618",
    "302.703.8961",
    "www.unitedcorporate.com",
    "AR@UNITEDCORPORATE.COM",
];

pub const DEFAULT_END_MARKER: &str = "STATEMENT OF OPEN INVOICE(S)";

/// Lines excluded from the body text used for geography/email detection.
pub const DEFAULT_SKIP_LINES: &[&str] = &["Statement Date:", "Total Due:", "www.unitedcorporate.com"];

fn page_of_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)Page\s*(\d+)\s*of\s*(\d+)").expect("static pagination pattern compiles")
    })
}

fn total_due_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(.+?)\s+Total Due\s+\$").expect("static total-due pattern compiles")
    })
}

fn whitespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("static whitespace pattern compiles"))
}

/// Marker configuration for boundary detection.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub start_markers: Vec<String>,
    pub end_marker: String,
    pub skip_lines: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            start_markers: DEFAULT_START_MARKERS.iter().map(|m| m.to_string()).collect(),
            end_marker: DEFAULT_END_MARKER.to_string(),
            skip_lines: DEFAULT_SKIP_LINES.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// Walks document pages and emits one record per detected statement.
pub struct StatementExtractor {
    config: ExtractorConfig,
}

impl StatementExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Extract all statements, in order of first-page encounter.
    ///
    /// Unreadable pages are logged and skipped; they never abort the rest of
    /// the document. Every physical page belongs to at most one record.
    pub fn extract(&self, document: &dyn SourceDocument) -> Vec<StatementRecord> {
        let total = document.page_count();
        let mut consumed: HashSet<u32> = HashSet::new();
        let mut records = Vec::new();

        for page in 1..=total {
            if consumed.contains(&page) {
                continue;
            }
            let text = match document.page_text(page) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Skipping unreadable page {}: {}", page, e);
                    continue;
                }
            };
            if let Some(record) = self.parse_page(&text, page) {
                tracing::debug!(
                    "Extracted statement for '{}' on pages {:?}",
                    record.company_name,
                    record.pages
                );
                consumed.extend(record.pages.iter().copied());
                records.push(record);
            }
        }

        records
    }

    /// Parse one page; returns a record when the page is a statement start.
    fn parse_page(&self, text: &str, page_num: u32) -> Option<StatementRecord> {
        // Printed pagination; absent or degenerate annotations mean a
        // single-page statement. The cap guards against corrupt text layers
        // declaring absurd totals.
        const MAX_DECLARED_PAGES: u32 = 10_000;
        let (current, declared_total) = page_of_pattern()
            .captures(text)
            .and_then(|caps| {
                let current: u32 = caps[1].parse().ok()?;
                let total: u32 = caps[2].parse().ok()?;
                Some((current, total))
            })
            .filter(|&(current, total)| {
                current >= 1 && current <= total && total <= MAX_DECLARED_PAGES
            })
            .unwrap_or((1, 1));

        let start = self
            .config
            .start_markers
            .iter()
            .filter_map(|marker| text.find(marker.as_str()))
            .min()?;
        let end = text.find(&self.config.end_marker)?;
        if start >= end {
            return None;
        }

        let mut content = text[start..end].to_string();
        for marker in &self.config.start_markers {
            content = content.replace(marker, "");
        }

        let lines: Vec<&str> = content
            .lines()
            .map(str::trim)
            .filter(|line| {
                !line.is_empty()
                    && !self
                        .config
                        .skip_lines
                        .iter()
                        .any(|skip| line.contains(skip.as_str()))
            })
            .collect();
        if lines.is_empty() {
            return None;
        }

        let company_name = match total_due_pattern().captures(text) {
            Some(caps) => whitespace_pattern()
                .replace_all(caps[1].trim(), " ")
                .to_string(),
            None => lines[0].to_string(),
        };
        let body_text = lines[1..].join("\n");

        // The statement starts `current - 1` pages before this one.
        let first = page_num.checked_sub(current - 1)?;
        if first == 0 {
            return None;
        }
        let pages: Vec<u32> = (first..first + declared_total).collect();

        Some(StatementRecord::new(
            pages,
            company_name,
            body_text,
            current,
            declared_total,
        ))
    }
}
