//! Run orchestration: extract, classify, review, split.
//!
//! One background worker per run performs extraction and finalization off the
//! caller's path. The worker owns the run's mutable state through its lock
//! while running; every other caller sees locked snapshots. Review calls are
//! serialized by the same per-run lock, so concurrent answers can never
//! interleave.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::classify::classify_all;
use crate::directory::CompanyDirectory;
use crate::document::SourceDocument;
use crate::extract::{ExtractorConfig, StatementExtractor};
use crate::models::{Destination, RunReport, RunStatus, SplitFile, StatementRecord, TimingMetrics};
use crate::review::{QuestionView, ReviewError, ReviewResponse, ReviewSession};
use crate::split::DocumentSplitter;
use crate::store::SessionStore;

/// Caller-facing protocol errors, each with a stable kind for transports.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Unknown run token")]
    UnknownRun,

    #[error("Run is not awaiting review")]
    RunNotAwaitingReview,

    #[error("Invalid response {0:?}: expected y, n, s, or p")]
    InvalidResponse(String),

    #[error("No previous question to go back to")]
    NoPreviousQuestion,

    #[error("Results are not ready")]
    ResultsNotReady,

    #[error("No output document for {0}")]
    NotFound(&'static str),

    #[error("Document has no extractable pages")]
    InvalidDocument,

    #[error("Roster is empty after normalization")]
    InvalidRoster,
}

impl RunError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownRun => "unknown_run",
            Self::RunNotAwaitingReview => "run_not_awaiting_review",
            Self::InvalidResponse(_) => "invalid_response",
            Self::NoPreviousQuestion => "no_previous_question",
            Self::ResultsNotReady => "results_not_ready",
            Self::NotFound(_) => "not_found",
            Self::InvalidDocument => "invalid_document",
            Self::InvalidRoster => "invalid_roster",
        }
    }
}

/// Locked snapshot of a run's externally visible state.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub questions_total: usize,
    pub questions_remaining: usize,
}

/// Mutable run state, owned by whichever caller holds the lock.
struct RunState {
    status: RunStatus,
    error: Option<String>,
    records: Vec<StatementRecord>,
    review: ReviewSession,
    outputs: BTreeMap<Destination, SplitFile>,
    timing: TimingMetrics,
}

impl RunState {
    fn new() -> Self {
        Self {
            status: RunStatus::Pending,
            error: None,
            records: Vec::new(),
            review: ReviewSession::default(),
            outputs: BTreeMap::new(),
            timing: TimingMetrics::default(),
        }
    }
}

/// One processing run: immutable inputs plus locked mutable state.
pub struct RunHandle {
    token: String,
    created_at: DateTime<Utc>,
    document: Box<dyn SourceDocument>,
    directory: Arc<CompanyDirectory>,
    output_dir: PathBuf,
    /// SHA-256 of the uploaded source document, when known.
    document_hash: Option<String>,
    state: Mutex<RunState>,
}

impl RunHandle {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn document_hash(&self) -> Option<&str> {
        self.document_hash.as_deref()
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Move to `status` unless the run already reached a terminal state.
    fn set_status(&self, status: RunStatus) {
        let mut state = self.lock_state();
        if !state.status.is_terminal() {
            state.status = status;
        }
    }

    fn fail(&self, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::error!("Run {} failed: {}", self.token, detail);
        let mut state = self.lock_state();
        if !state.status.is_terminal() {
            state.status = RunStatus::Failed;
            state.error = Some(detail);
        }
    }
}

/// Orchestrates pipeline stages for every run in a [`SessionStore`].
pub struct RunCoordinator {
    store: Arc<SessionStore>,
    results_dir: PathBuf,
    extractor_config: ExtractorConfig,
}

impl RunCoordinator {
    pub fn new(
        store: Arc<SessionStore>,
        results_dir: PathBuf,
        extractor_config: ExtractorConfig,
    ) -> Self {
        Self {
            store,
            results_dir,
            extractor_config,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Begin a run: validate inputs, register the handle, and spawn the
    /// extraction worker. Returns the opaque run token.
    pub fn start_run(
        &self,
        document: Box<dyn SourceDocument>,
        directory: Arc<CompanyDirectory>,
        document_hash: Option<String>,
    ) -> Result<String, RunError> {
        if directory.normalized_len() == 0 {
            return Err(RunError::InvalidRoster);
        }
        if document.page_count() == 0 {
            return Err(RunError::InvalidDocument);
        }

        let token = Uuid::new_v4().to_string();
        let handle = Arc::new(RunHandle {
            token: token.clone(),
            created_at: Utc::now(),
            document,
            directory,
            output_dir: self.results_dir.join(&token),
            document_hash,
            state: Mutex::new(RunState::new()),
        });
        self.store.insert(handle.clone());

        tracing::info!(
            "Run {} started ({} pages, {} roster entries)",
            token,
            handle.document.page_count(),
            handle.directory.len()
        );

        let config = self.extractor_config.clone();
        tokio::task::spawn_blocking(move || run_extraction(handle, config));

        Ok(token)
    }

    fn handle(&self, token: &str) -> Result<Arc<RunHandle>, RunError> {
        self.store.get(token).ok_or(RunError::UnknownRun)
    }

    /// Current status snapshot.
    pub fn status(&self, token: &str) -> Result<StatusView, RunError> {
        let handle = self.handle(token)?;
        let state = handle.lock_state();
        Ok(StatusView {
            status: state.status,
            error: state.error.clone(),
            questions_total: state.review.total(),
            questions_remaining: state.review.remaining(),
        })
    }

    /// The question under the review cursor, or `None` once the queue is
    /// exhausted.
    pub fn current_question(&self, token: &str) -> Result<Option<QuestionView>, RunError> {
        let handle = self.handle(token)?;
        let state = handle.lock_state();
        if !matches!(state.status, RunStatus::AwaitingReview | RunStatus::Reviewing) {
            return Err(RunError::RunNotAwaitingReview);
        }
        Ok(state.review.current(&state.records))
    }

    /// Apply one reviewer response. Completion of the queue (by exhaustion or
    /// skip-all) triggers finalization.
    pub fn answer_question(&self, token: &str, response: &str) -> Result<StatusView, RunError> {
        let handle = self.handle(token)?;
        let parsed = ReviewResponse::parse(response)
            .ok_or_else(|| RunError::InvalidResponse(response.to_string()))?;

        let mut state = handle.lock_state();
        if state.status != RunStatus::AwaitingReview {
            return Err(RunError::RunNotAwaitingReview);
        }
        state.status = RunStatus::Reviewing;

        let outcome = {
            let RunState { review, records, .. } = &mut *state;
            review.answer(parsed, records)
        };
        match outcome {
            Err(ReviewError::NoPreviousQuestion) => {
                state.status = RunStatus::AwaitingReview;
                return Err(RunError::NoPreviousQuestion);
            }
            Ok(()) => {}
        }

        if state.review.is_complete() {
            state.status = RunStatus::Finalizing;
            let view = StatusView {
                status: state.status,
                error: None,
                questions_total: state.review.total(),
                questions_remaining: 0,
            };
            drop(state);
            let worker = handle.clone();
            tokio::task::spawn_blocking(move || run_finalization(&worker));
            Ok(view)
        } else {
            state.status = RunStatus::AwaitingReview;
            Ok(StatusView {
                status: state.status,
                error: None,
                questions_total: state.review.total(),
                questions_remaining: state.review.remaining(),
            })
        }
    }

    /// Results summary; only available once the run completed.
    pub fn results(&self, token: &str) -> Result<RunReport, RunError> {
        let handle = self.handle(token)?;
        let state = handle.lock_state();
        if state.status != RunStatus::Completed {
            return Err(RunError::ResultsNotReady);
        }

        let mut destination_breakdown: BTreeMap<Destination, usize> = BTreeMap::new();
        for record in &state.records {
            if let Some(destination) = record.destination {
                *destination_breakdown.entry(destination).or_default() += 1;
            }
        }
        let page_counts = state
            .outputs
            .iter()
            .map(|(destination, file)| (*destination, file.pages))
            .collect();

        Ok(RunReport {
            document_sha256: handle.document_hash.clone(),
            statement_count: state.records.len(),
            destination_breakdown,
            page_counts,
            review: state.review.stats(&state.records),
            timing: state.timing.clone(),
        })
    }

    /// Path of one bucket's output document.
    pub fn output_document(&self, token: &str, destination: Destination) -> Result<PathBuf, RunError> {
        let handle = self.handle(token)?;
        let state = handle.lock_state();
        if state.status != RunStatus::Completed {
            return Err(RunError::ResultsNotReady);
        }
        state
            .outputs
            .get(&destination)
            .map(|file| file.path.clone())
            .ok_or(RunError::NotFound(destination.as_str()))
    }

    /// All written output documents for a completed run.
    pub fn output_documents(
        &self,
        token: &str,
    ) -> Result<BTreeMap<Destination, SplitFile>, RunError> {
        let handle = self.handle(token)?;
        let state = handle.lock_state();
        if state.status != RunStatus::Completed {
            return Err(RunError::ResultsNotReady);
        }
        Ok(state.outputs.clone())
    }
}

/// Extraction worker: runs on a blocking thread, owns the run until it either
/// parks in awaiting-review or finishes finalization.
fn run_extraction(handle: Arc<RunHandle>, config: ExtractorConfig) {
    handle.set_status(RunStatus::Extracting);
    let started = Instant::now();

    let extractor = StatementExtractor::new(config);
    let mut records = extractor.extract(handle.document.as_ref());
    if records.is_empty() {
        handle.fail("no statements found in document");
        return;
    }
    classify_all(&mut records, &handle.directory);
    let review = ReviewSession::new(&records);

    tracing::info!(
        "Run {}: extracted {} statements, {} need review",
        handle.token,
        records.len(),
        review.total()
    );

    let review_pending = !review.is_complete();
    {
        let mut state = handle.lock_state();
        if state.status.is_terminal() {
            return;
        }
        state.records = records;
        state.review = review;
        state.timing.extraction_secs = started.elapsed().as_secs_f64();
        state.status = if review_pending {
            RunStatus::AwaitingReview
        } else {
            RunStatus::Finalizing
        };
    }

    if !review_pending {
        run_finalization(&handle);
    }
}

/// Finalization worker: splits the source into bucket documents and completes
/// the run. Partial outputs are discarded on failure.
fn run_finalization(handle: &RunHandle) {
    let started = Instant::now();
    let records = {
        let state = handle.lock_state();
        if state.status.is_terminal() {
            return;
        }
        state.records.clone()
    };

    let splitter = DocumentSplitter::new(handle.output_dir.clone());
    match splitter.split(&records, handle.document.as_ref()) {
        Ok(outputs) => {
            let mut state = handle.lock_state();
            if state.status.is_terminal() {
                return;
            }
            state.outputs = outputs;
            state.timing.finalize_secs = started.elapsed().as_secs_f64();
            state.status = RunStatus::Completed;
            tracing::info!("Run {} completed", handle.token);
        }
        Err(e) => {
            let _ = std::fs::remove_dir_all(&handle.output_dir);
            handle.fail(format!("split failed: {}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::StaticDocument;
    use std::time::Duration;

    fn directory() -> Arc<CompanyDirectory> {
        Arc::new(
            CompanyDirectory::from_names(["Acme Incorporated", "Beta LLC"].map(String::from))
                .unwrap(),
        )
    }

    fn coordinator(results_dir: PathBuf) -> RunCoordinator {
        let store = Arc::new(SessionStore::new(Duration::from_secs(3600)));
        RunCoordinator::new(store, results_dir, ExtractorConfig::default())
    }

    async fn wait_for_status(
        coordinator: &RunCoordinator,
        token: &str,
        predicate: impl Fn(RunStatus) -> bool,
    ) -> StatusView {
        for _ in 0..200 {
            let view = coordinator.status(token).unwrap();
            if predicate(view.status) {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {} never reached the expected status", token);
    }

    fn statement_page(company: &str, body: &str) -> String {
        format!(
            "914.949.9618\nStatement Date: 05/31/2024\n{} 1 Main Street\n{}\n{} Total Due $100.00\nSTATEMENT OF OPEN INVOICE(S)\n",
            company, body, company
        )
    }

    #[tokio::test]
    async fn test_run_without_review_completes() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(dir.path().to_path_buf());
        let document = StaticDocument::new([statement_page("Acme Inc.", "New York NY 10001")]);

        let token = coordinator
            .start_run(Box::new(document), directory(), None)
            .unwrap();
        wait_for_status(&coordinator, &token, |s| s == RunStatus::Completed).await;

        let report = coordinator.results(&token).unwrap();
        assert_eq!(report.statement_count, 1);
        assert_eq!(report.destination_breakdown[&Destination::Dnm], 1);
        assert_eq!(report.page_counts[&Destination::Dnm], 1);
        assert_eq!(report.review.questions_total, 0);

        let path = coordinator.output_document(&token, Destination::Dnm).unwrap();
        assert!(path.exists());
        assert!(matches!(
            coordinator.output_document(&token, Destination::Foreign),
            Err(RunError::NotFound("Foreign"))
        ));
    }

    #[tokio::test]
    async fn test_review_flow_accept_routes_to_dnm() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(dir.path().to_path_buf());
        // One edit from "acme": fuzzy at 75%, flagged for review.
        let document = StaticDocument::new([statement_page("Akme Inc", "Reno NV 89501")]);

        let token = coordinator
            .start_run(Box::new(document), directory(), None)
            .unwrap();
        let view =
            wait_for_status(&coordinator, &token, |s| s == RunStatus::AwaitingReview).await;
        assert_eq!(view.questions_total, 1);

        assert!(matches!(
            coordinator.results(&token),
            Err(RunError::ResultsNotReady)
        ));

        let question = coordinator.current_question(&token).unwrap().unwrap();
        assert_eq!(question.company_name, "Akme Inc");
        assert_eq!(question.matched_name, "Acme Incorporated");
        assert_eq!(question.similarity, Some(75.0));
        assert!(!question.can_go_back);

        assert!(matches!(
            coordinator.answer_question(&token, "q"),
            Err(RunError::InvalidResponse(_))
        ));
        assert!(matches!(
            coordinator.answer_question(&token, "p"),
            Err(RunError::NoPreviousQuestion)
        ));

        let view = coordinator.answer_question(&token, "y").unwrap();
        assert_eq!(view.status, RunStatus::Finalizing);

        wait_for_status(&coordinator, &token, |s| s == RunStatus::Completed).await;
        let report = coordinator.results(&token).unwrap();
        assert_eq!(report.destination_breakdown[&Destination::Dnm], 1);
        assert_eq!(report.review.accepted, 1);

        // Terminal runs reject further answers.
        assert!(matches!(
            coordinator.answer_question(&token, "n"),
            Err(RunError::RunNotAwaitingReview)
        ));
    }

    #[tokio::test]
    async fn test_empty_document_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(dir.path().to_path_buf());
        let document = StaticDocument::new(Vec::<String>::new());
        assert!(matches!(
            coordinator.start_run(Box::new(document), directory(), None),
            Err(RunError::InvalidDocument)
        ));
    }

    #[tokio::test]
    async fn test_document_without_statements_fails() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(dir.path().to_path_buf());
        let document = StaticDocument::new(["no markers here", "nor here"]);

        let token = coordinator
            .start_run(Box::new(document), directory(), None)
            .unwrap();
        let view = wait_for_status(&coordinator, &token, |s| s == RunStatus::Failed).await;
        assert!(view.error.unwrap().contains("no statements"));
    }

    #[tokio::test]
    async fn test_store_expiry_forgets_runs() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::new(Duration::from_secs(0)));
        let coordinator = RunCoordinator::new(
            store.clone(),
            dir.path().to_path_buf(),
            ExtractorConfig::default(),
        );
        let document = StaticDocument::new([statement_page("Acme Inc.", "New York NY 10001")]);
        let token = coordinator
            .start_run(Box::new(document), directory(), None)
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.expire_stale(), 1);
        assert!(store.is_empty());
        assert!(matches!(
            coordinator.status(&token),
            Err(RunError::UnknownRun)
        ));
    }

    #[tokio::test]
    async fn test_unknown_run_token() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(dir.path().to_path_buf());
        assert!(matches!(
            coordinator.status("nope"),
            Err(RunError::UnknownRun)
        ));
        assert!(matches!(
            coordinator.current_question("nope"),
            Err(RunError::UnknownRun)
        ));
    }
}
