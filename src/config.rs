//! Runtime settings.
//!
//! Loaded from an optional TOML file, then overridden by `MAILSORT_*`
//! environment variables. Everything has a working default so the binary runs
//! without any configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::extract::{
    ExtractorConfig, DEFAULT_END_MARKER, DEFAULT_SKIP_LINES, DEFAULT_START_MARKERS,
};

/// Default settings file probed when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "mailsort.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where uploaded documents and rosters are stored.
    pub upload_dir: PathBuf,
    /// Where per-run output documents are written.
    pub results_dir: PathBuf,
    /// Server bind address.
    pub bind: String,
    /// Runs older than this are expired from the session store.
    pub session_ttl_minutes: u64,
    /// Worksheet holding the roster in spreadsheet files.
    pub roster_sheet: Option<String>,
    /// Statement boundary markers.
    pub start_markers: Vec<String>,
    pub end_marker: String,
    pub skip_lines: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            results_dir: PathBuf::from("results"),
            bind: "127.0.0.1:3030".to_string(),
            session_ttl_minutes: 60,
            roster_sheet: None,
            start_markers: DEFAULT_START_MARKERS.iter().map(|m| m.to_string()).collect(),
            end_marker: DEFAULT_END_MARKER.to_string(),
            skip_lines: DEFAULT_SKIP_LINES.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl Settings {
    /// Load settings: explicit file, else `mailsort.toml` if present, else
    /// defaults. Environment overrides apply last.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env();
        Ok(settings)
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("MAILSORT_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("MAILSORT_RESULTS_DIR") {
            self.results_dir = PathBuf::from(dir);
        }
        if let Ok(bind) = std::env::var("MAILSORT_BIND") {
            self.bind = bind;
        }
        if let Ok(ttl) = std::env::var("MAILSORT_SESSION_TTL_MINUTES") {
            if let Ok(minutes) = ttl.parse() {
                self.session_ttl_minutes = minutes;
            }
        }
        if let Ok(sheet) = std::env::var("MAILSORT_ROSTER_SHEET") {
            self.roster_sheet = Some(sheet);
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_minutes * 60)
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            start_markers: self.start_markers.clone(),
            end_marker: self.end_marker.clone(),
            skip_lines: self.skip_lines.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.bind, "127.0.0.1:3030");
        assert_eq!(settings.session_ttl_minutes, 60);
        assert_eq!(settings.extractor_config().end_marker, DEFAULT_END_MARKER);
    }

    #[test]
    fn test_from_file_with_partial_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mailsort.toml");
        std::fs::write(
            &path,
            "bind = \"0.0.0.0:8080\"\nsession_ttl_minutes = 5\nroster_sheet = \"10-2018\"\n",
        )
        .unwrap();
        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.bind, "0.0.0.0:8080");
        assert_eq!(settings.session_ttl(), Duration::from_secs(300));
        assert_eq!(settings.roster_sheet.as_deref(), Some("10-2018"));
        // Untouched fields keep their defaults.
        assert_eq!(settings.upload_dir, PathBuf::from("uploads"));
    }
}
