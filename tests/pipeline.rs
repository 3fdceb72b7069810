//! End-to-end pipeline tests: extract, classify, review, split.

use std::sync::Arc;
use std::time::Duration;

use mailsort::coordinator::{RunCoordinator, RunError};
use mailsort::directory::CompanyDirectory;
use mailsort::document::StaticDocument;
use mailsort::extract::ExtractorConfig;
use mailsort::models::{Destination, RunStatus};
use mailsort::store::SessionStore;

fn statement_page(company: &str, body: &str, paging: Option<(u32, u32)>) -> String {
    let paging_line = paging
        .map(|(current, total)| format!("Page {} of {}\n", current, total))
        .unwrap_or_default();
    format!(
        "914.949.9618\n{}Statement Date: 05/31/2024\n{} 1 Commerce Street\n{}\n{} Total Due $1,250.00\nSTATEMENT OF OPEN INVOICE(S)\nINV-1001 $1,250.00\n",
        paging_line, company, body, company
    )
}

fn roster() -> Arc<CompanyDirectory> {
    Arc::new(
        CompanyDirectory::from_names(["Acme Incorporated", "Beta LLC"].map(String::from)).unwrap(),
    )
}

fn coordinator(results_dir: &std::path::Path) -> RunCoordinator {
    let store = Arc::new(SessionStore::new(Duration::from_secs(3600)));
    RunCoordinator::new(store, results_dir.to_path_buf(), ExtractorConfig::default())
}

async fn wait_for(
    coordinator: &RunCoordinator,
    token: &str,
    predicate: impl Fn(RunStatus) -> bool,
) -> mailsort::coordinator::StatusView {
    for _ in 0..300 {
        let view = coordinator.status(token).unwrap();
        if predicate(view.status) {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run never reached the expected status");
}

#[tokio::test]
async fn end_to_end_routing_without_review() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(dir.path());

    // Three single-page statements: a normalized roster match, a domestic
    // company nowhere near the roster, and a foreign company.
    let document = StaticDocument::new([
        statement_page("Acme Inc.", "New York NY 10001", None),
        statement_page("Gamma Corp", "Austin TX 78701", None),
        statement_page("Lumiere SARL", "75002 Paris, France", None),
    ]);

    let token = coordinator
        .start_run(Box::new(document), roster(), None)
        .unwrap();
    wait_for(&coordinator, &token, |s| s == RunStatus::Completed).await;

    let report = coordinator.results(&token).unwrap();
    assert_eq!(report.statement_count, 3);
    assert_eq!(report.review.questions_total, 0);
    assert_eq!(report.destination_breakdown[&Destination::Dnm], 1);
    assert_eq!(report.destination_breakdown[&Destination::NationalSingle], 1);
    assert_eq!(report.destination_breakdown[&Destination::Foreign], 1);
    assert!(!report
        .destination_breakdown
        .contains_key(&Destination::NationalMulti));

    assert_eq!(report.page_counts[&Destination::Dnm], 1);
    assert_eq!(report.page_counts[&Destination::NationalSingle], 1);
    assert_eq!(report.page_counts[&Destination::Foreign], 1);

    let run_dir = dir.path().join(&token);
    assert!(run_dir.join("DNM.pdf").exists());
    assert!(run_dir.join("natioSingle.pdf").exists());
    assert!(run_dir.join("Foreign.pdf").exists());
    assert!(!run_dir.join("natioMulti.pdf").exists());

    // Each bucket holds exactly its statement's page.
    let dnm = std::fs::read_to_string(run_dir.join("DNM.pdf")).unwrap();
    assert!(dnm.contains("Acme Inc."));
    assert!(!dnm.contains("Gamma Corp"));
}

#[tokio::test]
async fn multi_page_statement_reconstruction() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(dir.path());

    // A three-page statement starting at physical page 5; its continuation
    // pages carry no markers of their own.
    let mut pages: Vec<String> = (1..=4)
        .map(|i| statement_page(&format!("Filler {} Co", i), "Reno NV 89501", None))
        .collect();
    pages.push(statement_page("Gamma Corp", "Dallas TX 75201", Some((1, 3))));
    pages.push("invoice continuation page".to_string());
    pages.push("invoice continuation page".to_string());
    let document = StaticDocument::new(pages);

    let token = coordinator
        .start_run(Box::new(document), roster(), None)
        .unwrap();
    wait_for(&coordinator, &token, |s| s == RunStatus::Completed).await;

    let report = coordinator.results(&token).unwrap();
    assert_eq!(report.statement_count, 5);
    assert_eq!(report.destination_breakdown[&Destination::NationalMulti], 1);
    assert_eq!(report.page_counts[&Destination::NationalMulti], 3);
    assert_eq!(report.page_counts[&Destination::NationalSingle], 4);

    // The multi-page bucket got pages 5-7 in order.
    let run_dir = dir.path().join(&token);
    let multi = std::fs::read_to_string(run_dir.join("natioMulti.pdf")).unwrap();
    let chunks: Vec<&str> = multi.split('\x0c').collect();
    assert_eq!(chunks.len(), 3);
    assert!(chunks[0].contains("Gamma Corp"));
    assert!(chunks[1].contains("continuation"));
}

#[tokio::test]
async fn review_flow_with_back_and_skip() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(dir.path());

    // Two fuzzy candidates below the auto-accept bar: "Akme" vs "Acme" (75%)
    // and "Betta" vs "Beta" (80%).
    let document = StaticDocument::new([
        statement_page("Akme Inc", "Reno NV 89501", None),
        statement_page("Betta LLC", "Reno NV 89501", None),
    ]);

    let token = coordinator
        .start_run(Box::new(document), roster(), None)
        .unwrap();
    let view = wait_for(&coordinator, &token, |s| s == RunStatus::AwaitingReview).await;
    assert_eq!(view.questions_total, 2);

    // Results are gated until the run completes.
    assert!(matches!(
        coordinator.results(&token),
        Err(RunError::ResultsNotReady)
    ));

    let first = coordinator.current_question(&token).unwrap().unwrap();
    assert_eq!(first.company_name, "Akme Inc");
    assert_eq!(first.matched_name, "Acme Incorporated");
    assert!(!first.can_go_back);

    // Reject, go back, accept instead.
    coordinator.answer_question(&token, "n").unwrap();
    let second = coordinator.current_question(&token).unwrap().unwrap();
    assert_eq!(second.company_name, "Betta LLC");
    assert!(second.can_go_back);

    coordinator.answer_question(&token, "p").unwrap();
    let revisited = coordinator.current_question(&token).unwrap().unwrap();
    assert_eq!(revisited.company_name, "Akme Inc");
    coordinator.answer_question(&token, "y").unwrap();

    // Skip the rest; the session completes in one step and finalizes.
    let view = coordinator.answer_question(&token, "s").unwrap();
    assert_eq!(view.status, RunStatus::Finalizing);
    wait_for(&coordinator, &token, |s| s == RunStatus::Completed).await;

    let report = coordinator.results(&token).unwrap();
    assert_eq!(report.review.questions_total, 2);
    assert_eq!(report.review.accepted, 1);
    assert_eq!(report.review.skipped, 1);
    // Reject was overwritten by the re-answer after going back.
    assert_eq!(report.review.rejected, 0);

    // Accepted statement lands in DNM; the skipped one keeps its classifier
    // destination.
    assert_eq!(report.destination_breakdown[&Destination::Dnm], 1);
    assert_eq!(report.destination_breakdown[&Destination::NationalSingle], 1);
}

#[tokio::test]
async fn roster_names_collapse_to_dnm_without_review() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(dir.path());

    // "Acme Inc." misses the exact roster spelling but collapses to the same
    // normalized key as "Acme Incorporated"; "Acme" matches directly.
    let document = StaticDocument::new([
        statement_page("Acme Inc.", "New York NY 10001", None),
        statement_page("Acme", "New York NY 10001", None),
    ]);

    let token = coordinator
        .start_run(Box::new(document), roster(), None)
        .unwrap();
    wait_for(&coordinator, &token, |s| s == RunStatus::Completed).await;

    let report = coordinator.results(&token).unwrap();
    assert_eq!(report.review.questions_total, 0);
    assert_eq!(report.destination_breakdown[&Destination::Dnm], 2);
    assert_eq!(report.page_counts[&Destination::Dnm], 2);
}
