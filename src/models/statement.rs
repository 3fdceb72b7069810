//! Statement records and the classification vocabulary.

use serde::{Deserialize, Serialize};

use crate::directory::MatchTier;

/// Coarse geography tag derived from statement body text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Geography {
    National,
    Foreign,
}

/// Output bucket a finalized statement is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Destination {
    #[serde(rename = "DNM")]
    Dnm,
    Foreign,
    NationalSingle,
    NationalMulti,
}

impl Destination {
    pub const ALL: [Destination; 4] = [
        Destination::Dnm,
        Destination::Foreign,
        Destination::NationalSingle,
        Destination::NationalMulti,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dnm => "DNM",
            Self::Foreign => "Foreign",
            Self::NationalSingle => "NationalSingle",
            Self::NationalMulti => "NationalMulti",
        }
    }

    /// Deterministic output file name for this bucket.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Dnm => "DNM.pdf",
            Self::Foreign => "Foreign.pdf",
            Self::NationalSingle => "natioSingle.pdf",
            Self::NationalMulti => "natioMulti.pdf",
        }
    }

    /// Parse either the canonical name or the output file stem.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DNM" | "dnm" => Some(Self::Dnm),
            "Foreign" | "foreign" => Some(Self::Foreign),
            "NationalSingle" | "natioSingle" => Some(Self::NationalSingle),
            "NationalMulti" | "natioMulti" => Some(Self::NationalMulti),
            _ => None,
        }
    }
}

/// Persisted outcome of a review question.
///
/// "Back" is a navigation input, not an outcome; a revisited question keeps
/// its previous answer until re-answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewAnswer {
    AcceptDnm,
    Reject,
    Skip,
}

/// One logical statement detected in the source document.
///
/// Created by the extractor with identity and text fields populated; the
/// classifier fills in geography, match data, and destination; the review
/// session may overwrite destination and record the reviewer's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementRecord {
    /// 1-based physical page numbers, a contiguous run in source order.
    pub pages: Vec<u32>,
    /// Company name as printed on the statement.
    pub company_name: String,
    /// Body text between the statement markers, minus skip-list lines.
    pub body_text: String,
    /// Position within the statement declared by the printed pagination.
    pub declared_page: u32,
    /// Total pages declared by the printed pagination.
    pub declared_total: u32,
    pub geography: Option<Geography>,
    pub tier: MatchTier,
    pub matched_name: Option<String>,
    /// Fuzzy similarity percentage (0-100, one decimal place).
    pub similarity: Option<f64>,
    pub needs_review: bool,
    pub destination: Option<Destination>,
    pub review_answer: Option<ReviewAnswer>,
}

impl StatementRecord {
    /// Create an unclassified record as emitted by the extractor.
    pub fn new(
        pages: Vec<u32>,
        company_name: String,
        body_text: String,
        declared_page: u32,
        declared_total: u32,
    ) -> Self {
        Self {
            pages,
            company_name,
            body_text,
            declared_page,
            declared_total,
            geography: None,
            tier: MatchTier::None,
            matched_name: None,
            similarity: None,
            needs_review: false,
            destination: None,
            review_answer: None,
        }
    }

    pub fn is_single_page(&self) -> bool {
        self.pages.len() == 1
    }

    /// First and last physical page, for display.
    pub fn page_span(&self) -> (u32, u32) {
        let first = self.pages.first().copied().unwrap_or(0);
        let last = self.pages.last().copied().unwrap_or(first);
        (first, last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_names() {
        assert_eq!(Destination::Dnm.file_name(), "DNM.pdf");
        assert_eq!(Destination::NationalSingle.file_name(), "natioSingle.pdf");
        assert_eq!(Destination::from_str("natioMulti"), Some(Destination::NationalMulti));
        assert_eq!(Destination::from_str("NationalMulti"), Some(Destination::NationalMulti));
        assert_eq!(Destination::from_str("bogus"), None);
    }

    #[test]
    fn test_destination_serializes_with_canonical_names() {
        assert_eq!(serde_json::to_string(&Destination::Dnm).unwrap(), "\"DNM\"");
        assert_eq!(
            serde_json::to_string(&Destination::NationalMulti).unwrap(),
            "\"NationalMulti\""
        );
    }

    #[test]
    fn test_review_answer_serialization() {
        assert_eq!(
            serde_json::to_string(&ReviewAnswer::AcceptDnm).unwrap(),
            "\"accept-dnm\""
        );
    }

    #[test]
    fn test_page_span() {
        let record = StatementRecord::new(vec![5, 6, 7], "Acme".into(), String::new(), 1, 3);
        assert_eq!(record.page_span(), (5, 7));
        assert!(!record.is_single_page());
    }
}
