//! Do-not-mail roster loading, name normalization, and lookup.
//!
//! The roster is loaded once per run and immutable afterwards, so a single
//! directory can be shared read-only across concurrent runs.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

use calamine::{open_workbook_auto, Data, Reader};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Similarity floor (0-1) below which fuzzy candidates are discarded.
pub const FUZZY_FLOOR: f64 = 0.6;

/// Errors that can occur while loading a roster.
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("Failed to read roster: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read roster workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Failed to read roster CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unsupported roster format: {0}")]
    UnsupportedFormat(String),

    #[error("Roster is empty after normalization")]
    Empty,
}

/// How strongly an extracted name corresponds to a roster entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchTier {
    Exact,
    NormalizedExact,
    Fuzzy,
    None,
}

/// Result of a directory lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub tier: MatchTier,
    /// The roster entry matched, in its original spelling.
    pub matched_name: Option<String>,
    /// Fuzzy similarity as a percentage (0-100, one decimal place).
    pub similarity: Option<f64>,
}

impl MatchResult {
    fn none() -> Self {
        Self {
            tier: MatchTier::None,
            matched_name: None,
            similarity: None,
        }
    }
}

/// Business-entity suffixes and connector words removed during normalization.
///
/// Entries containing a backslash are used as regex fragments verbatim;
/// everything else is escaped before being folded into the alternation.
const BUSINESS_SUFFIXES: &[&str] = &[
    // Corporations
    "inc",
    "incorporated",
    "incorporation",
    "corp",
    "corporation",
    // Limited liability companies
    "llc",
    r"l\.l\.c\.?",
    "limited liability company",
    // Limited companies
    "ltd",
    "limited",
    "ltda",
    // Partnerships
    "llp",
    r"l\.l\.p\.?",
    "limited liability partnership",
    "lp",
    r"l\.p\.?",
    "limited partnership",
    "gp",
    "general partnership",
    // Professional entities
    "pc",
    r"p\.c\.?",
    "professional corporation",
    "pa",
    r"p\.a\.?",
    "professional association",
    "pllc",
    r"p\.l\.l\.c\.?",
    "professional limited liability company",
    "plc",
    r"p\.l\.c\.?",
    "public limited company",
    "professional company",
    // General business
    "co",
    "company",
    "companies",
    "enterprise",
    "enterprises",
    "group",
    "groups",
    "holding",
    "holdings",
    "international",
    "intl",
    "global",
    "worldwide",
    "solutions",
    "services",
    "systems",
    "technologies",
    "tech",
    "industries",
    // Specific entity types
    "sc",
    r"s\.c\.?",
    "service corporation",
    "bc",
    r"b\.c\.?",
    "benefit corporation",
    "pbc",
    "public benefit corporation",
    "nonprofit",
    "non-profit",
    "foundation",
    "trust",
    "association",
    "assn",
    "society",
    "institute",
    "academy",
    "center",
    "centre",
    "organization",
    "org",
    // Regional variations
    "pty",
    "proprietary",
    "pvt",
    "private",
    "pub",
    "public",
    "joint venture",
    "jv",
    "partnership",
    "syndicate",
    "consortium",
    "cooperative",
    "coop",
    "co-op",
    // Financial
    "bank",
    "banking",
    "credit union",
    "mutual",
    "insurance",
    "ins",
    "realty",
    "real estate",
    "investment",
    "investments",
    "capital",
    "financial",
    "finance",
    // Connectors and renaming markers
    "the",
    "and",
    "&",
    "of",
    "dba",
    "d/b/a",
    "doing business as",
    "aka",
    "a/k/a",
    "also known as",
    "fka",
    "f/k/a",
    "formerly known as",
    "nka",
    "n/k/a",
    "now known as",
];

/// Single alternation over the whole suffix vocabulary so removal happens in
/// one pass, independent of suffix order.
fn suffix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let alternation = BUSINESS_SUFFIXES
            .iter()
            .map(|suffix| {
                if suffix.contains('\\') {
                    (*suffix).to_string()
                } else {
                    regex::escape(suffix)
                }
            })
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).expect("static suffix pattern compiles")
    })
}

fn separator_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[\s,.()\-_&]+").expect("static separator pattern compiles"))
}

/// Normalize a company name for comparison: lower-case, strip the suffix
/// vocabulary at word boundaries, then strip separators and whitespace.
///
/// Pure and idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let stripped = suffix_pattern().replace_all(&lowered, "");
    separator_pattern().replace_all(&stripped, "").trim().to_string()
}

/// The do-not-mail roster with precomputed indexes.
#[derive(Debug, Clone)]
pub struct CompanyDirectory {
    /// Authoritative roster, in source order, duplicates permitted.
    raw_names: Vec<String>,
    /// Exact-spelling index over `raw_names`.
    exact_index: HashSet<String>,
    /// Normalized name -> original name; last writer wins on collisions.
    normalized_index: HashMap<String, String>,
}

impl CompanyDirectory {
    /// Build a directory from raw roster entries.
    ///
    /// Blank entries are dropped. Fails with [`RosterError::Empty`] if no
    /// entry survives normalization.
    pub fn from_names<I>(names: I) -> Result<Self, RosterError>
    where
        I: IntoIterator<Item = String>,
    {
        let raw_names: Vec<String> = names
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        let exact_index: HashSet<String> = raw_names.iter().cloned().collect();

        let mut normalized_index = HashMap::new();
        for name in &raw_names {
            let key = normalize(name);
            if !key.is_empty() {
                normalized_index.insert(key, name.clone());
            }
        }

        if normalized_index.is_empty() {
            return Err(RosterError::Empty);
        }

        Ok(Self {
            raw_names,
            exact_index,
            normalized_index,
        })
    }

    /// Load a roster file, dispatching on extension.
    ///
    /// Spreadsheets go through calamine, `.csv` through the csv reader, and
    /// `.txt` is treated as one name per line.
    pub fn load(path: &Path, sheet: Option<&str>) -> Result<Self, RosterError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_lowercase();
        match extension.as_str() {
            "xlsx" | "xlsm" | "xls" | "ods" => Self::from_workbook(path, sheet),
            "csv" => Self::from_csv(path),
            "txt" => Self::from_txt(path),
            other => Err(RosterError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Load roster names from the first column of a spreadsheet.
    ///
    /// The production roster carries two header rows above the data and
    /// sometimes repeats the "Name" column label in the first data cell;
    /// both are skipped.
    pub fn from_workbook(path: &Path, sheet: Option<&str>) -> Result<Self, RosterError> {
        let mut workbook = open_workbook_auto(path)?;
        let sheet_name = match sheet {
            Some(name) => name.to_string(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or(RosterError::Empty)?,
        };
        let range = workbook.worksheet_range(&sheet_name)?;

        let mut names = Vec::new();
        for row in range.rows().skip(2) {
            let Some(cell) = row.first() else { continue };
            let value = match cell {
                Data::String(s) => s.trim().to_string(),
                Data::Int(i) => i.to_string(),
                Data::Float(f) => f.to_string(),
                _ => continue,
            };
            if value.is_empty() || value.to_lowercase().starts_with("name") {
                continue;
            }
            names.push(value);
        }
        Self::from_names(names)
    }

    /// Load roster names from the first column of a CSV file.
    pub fn from_csv(path: &Path) -> Result<Self, RosterError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;
        let mut names = Vec::new();
        for record in reader.records() {
            let record = record?;
            if let Some(field) = record.get(0) {
                names.push(field.to_string());
            }
        }
        Self::from_names(names)
    }

    /// Load a plain-text roster, one name per line.
    pub fn from_txt(path: &Path) -> Result<Self, RosterError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_names(content.lines().map(|line| line.to_string()))
    }

    /// Number of raw roster entries.
    pub fn len(&self) -> usize {
        self.raw_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_names.is_empty()
    }

    /// Number of distinct normalized keys.
    pub fn normalized_len(&self) -> usize {
        self.normalized_index.len()
    }

    /// Look up a company name: exact spelling, then normalized spelling, then
    /// the best fuzzy candidate at or above [`FUZZY_FLOOR`].
    pub fn lookup(&self, name: &str) -> MatchResult {
        if self.exact_index.contains(name) {
            return MatchResult {
                tier: MatchTier::Exact,
                matched_name: Some(name.to_string()),
                similarity: None,
            };
        }

        let normalized = normalize(name);
        if normalized.is_empty() {
            return MatchResult::none();
        }

        if let Some(original) = self.normalized_index.get(&normalized) {
            return MatchResult {
                tier: MatchTier::NormalizedExact,
                matched_name: Some(original.clone()),
                similarity: None,
            };
        }

        // Ties break lexicographically so the result is stable across runs.
        let mut best: Option<(&str, f64)> = None;
        for key in self.normalized_index.keys() {
            let score = strsim::normalized_levenshtein(&normalized, key);
            let better = match best {
                None => true,
                Some((best_key, best_score)) => {
                    score > best_score || (score == best_score && key.as_str() < best_key)
                }
            };
            if better {
                best = Some((key.as_str(), score));
            }
        }

        match best {
            Some((key, score)) if score >= FUZZY_FLOOR => MatchResult {
                tier: MatchTier::Fuzzy,
                matched_name: self.normalized_index.get(key).cloned(),
                similarity: Some((score * 1000.0).round() / 10.0),
            },
            _ => MatchResult::none(),
        }
    }
}
