//! Poppler-backed PDF access.
//!
//! Page text comes from `pdftotext`, page counts from `pdfinfo`, and page
//! copies go through `pdfseparate` + `pdfunite`.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use tempfile::TempDir;

use super::{DocumentError, SourceDocument};

/// Handle command output, extracting stdout on success or returning the
/// appropriate error.
fn handle_cmd_output(
    result: std::io::Result<std::process::Output>,
    tool_name: &str,
    error_prefix: &str,
) -> Result<String, DocumentError> {
    match result {
        Ok(output) => {
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(DocumentError::CommandFailed(format!(
                    "{}: {}",
                    error_prefix, stderr
                )))
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(DocumentError::ToolNotFound(tool_name.to_string()))
        }
        Err(e) => Err(DocumentError::Io(e)),
    }
}

/// Check command status, returning the appropriate error on failure.
fn check_cmd_status(
    result: std::io::Result<std::process::ExitStatus>,
    tool_name: &str,
    error_msg: &str,
) -> Result<(), DocumentError> {
    match result {
        Ok(s) if s.success() => Ok(()),
        Ok(_) => Err(DocumentError::CommandFailed(error_msg.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(DocumentError::ToolNotFound(tool_name.to_string()))
        }
        Err(e) => Err(DocumentError::Io(e)),
    }
}

/// Single-page files produced by `pdfseparate`, kept for the lifetime of the
/// temp dir so repeated bucket writes don't re-explode the source.
struct ExplodedPages {
    dir: TempDir,
}

impl ExplodedPages {
    fn page_path(&self, page: u32) -> PathBuf {
        self.dir.path().join(format!("page-{}.pdf", page))
    }
}

/// A PDF on disk, read through the poppler command-line tools.
pub struct PdfDocument {
    path: PathBuf,
    page_count: u32,
    exploded: Mutex<Option<ExplodedPages>>,
}

impl PdfDocument {
    /// Open a PDF, reading its page count via `pdfinfo`.
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let page_count = read_page_count(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            page_count,
            exploded: Mutex::new(None),
        })
    }

    fn check_page(&self, page: u32) -> Result<(), DocumentError> {
        if page == 0 || page > self.page_count {
            return Err(DocumentError::PageOutOfRange {
                page,
                total: self.page_count,
            });
        }
        Ok(())
    }

    /// Split the source into single-page files under a temp dir.
    fn explode(&self) -> Result<ExplodedPages, DocumentError> {
        let dir = TempDir::new()?;
        let pattern = dir.path().join("page-%d.pdf");
        let status = Command::new("pdfseparate")
            .arg(&self.path)
            .arg(&pattern)
            .status();
        check_cmd_status(
            status,
            "pdfseparate (install poppler-utils)",
            "pdfseparate failed to split PDF",
        )?;
        Ok(ExplodedPages { dir })
    }
}

fn read_page_count(path: &Path) -> Result<u32, DocumentError> {
    let output = Command::new("pdfinfo").arg(path).output();
    let stdout = handle_cmd_output(output, "pdfinfo (install poppler-utils)", "pdfinfo failed")?;
    for line in stdout.lines() {
        if let Some(rest) = line.strip_prefix("Pages:") {
            return rest.trim().parse().map_err(|_| {
                DocumentError::CommandFailed("pdfinfo reported an unparseable page count".to_string())
            });
        }
    }
    Err(DocumentError::CommandFailed(
        "pdfinfo reported no page count".to_string(),
    ))
}

impl SourceDocument for PdfDocument {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn page_text(&self, page: u32) -> Result<String, DocumentError> {
        self.check_page(page)?;
        let page_str = page.to_string();
        let output = Command::new("pdftotext")
            .args(["-layout", "-enc", "UTF-8", "-f", &page_str, "-l", &page_str])
            .arg(&self.path)
            .arg("-") // Output to stdout
            .output();

        handle_cmd_output(
            output,
            "pdftotext (install poppler-utils)",
            &format!("pdftotext failed on page {}", page),
        )
    }

    fn copy_pages(&self, pages: &[u32], dest: &Path) -> Result<u32, DocumentError> {
        if pages.is_empty() {
            return Ok(0);
        }
        for &page in pages {
            self.check_page(page)?;
        }

        let mut guard = self
            .exploded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let exploded = match &mut *guard {
            Some(exploded) => exploded,
            slot => slot.insert(self.explode()?),
        };

        let mut command = Command::new("pdfunite");
        for &page in pages {
            command.arg(exploded.page_path(page));
        }
        command.arg(dest);

        check_cmd_status(
            command.status(),
            "pdfunite (install poppler-utils)",
            "pdfunite failed to assemble output PDF",
        )?;
        Ok(pages.len() as u32)
    }
}

/// Check if the required poppler tools are available.
pub fn check_tools() -> Vec<(String, bool)> {
    ["pdftotext", "pdfinfo", "pdfseparate", "pdfunite"]
        .iter()
        .map(|tool| (tool.to_string(), which::which(tool).is_ok()))
        .collect()
}
