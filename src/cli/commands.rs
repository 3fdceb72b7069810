//! CLI commands implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::{style, Term};
use indicatif::ProgressBar;

use crate::config::Settings;
use crate::coordinator::{RunCoordinator, RunError};
use crate::directory::CompanyDirectory;
use crate::document::{check_tools, PdfDocument};
use crate::models::{content_hash, RunStatus};
use crate::server;
use crate::store::SessionStore;

use super::helpers::{print_report, prompt_response};

#[derive(Parser)]
#[command(name = "mailsort")]
#[command(about = "Financial statement classification and mail routing")]
#[command(version)]
pub struct Cli {
    /// Settings file (defaults to mailsort.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a statement PDF against a do-not-mail roster
    Process {
        /// Source statement PDF
        pdf: PathBuf,
        /// Roster file (.xlsx, .csv, or .txt)
        roster: PathBuf,
        /// Output directory for the split documents
        #[arg(short, long, default_value = "results")]
        output_dir: PathBuf,
        /// Worksheet holding the roster (spreadsheets only)
        #[arg(long)]
        sheet: Option<String>,
    },

    /// Start the web server
    Serve {
        /// Address to bind to (default from settings)
        bind: Option<String>,
    },

    /// Check that the required poppler tools are installed
    Check,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Process {
            pdf,
            roster,
            output_dir,
            sheet,
        } => process(settings, pdf, roster, output_dir, sheet).await,
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| settings.bind.clone());
            server::serve(settings, &bind).await
        }
        Commands::Check => check(),
    }
}

/// Run the whole pipeline against local files, answering review questions on
/// the terminal.
async fn process(
    settings: Settings,
    pdf: PathBuf,
    roster: PathBuf,
    output_dir: PathBuf,
    sheet: Option<String>,
) -> anyhow::Result<()> {
    let sheet = sheet.or_else(|| settings.roster_sheet.clone());
    let directory = CompanyDirectory::load(&roster, sheet.as_deref())?;
    println!(
        "Loaded {} do-not-mail compan{} from {}",
        style(directory.len()).bold(),
        if directory.len() == 1 { "y" } else { "ies" },
        roster.display()
    );

    let hash = content_hash(&std::fs::read(&pdf)?);
    let document = PdfDocument::open(&pdf)?;

    let store = Arc::new(SessionStore::new(settings.session_ttl()));
    let coordinator = RunCoordinator::new(store, output_dir, settings.extractor_config());
    let token = coordinator.start_run(Box::new(document), Arc::new(directory), Some(hash))?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Extracting statements...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    loop {
        let status = coordinator.status(&token)?;
        match status.status {
            RunStatus::Pending | RunStatus::Extracting => {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            _ => break,
        }
    }
    spinner.finish_and_clear();

    let term = Term::stdout();
    loop {
        let status = coordinator.status(&token)?;
        match status.status {
            RunStatus::AwaitingReview => {
                let Some(question) = coordinator.current_question(&token)? else {
                    continue;
                };
                let response = prompt_response(&term, &question)?;
                match coordinator.answer_question(&token, &response) {
                    Ok(_) => {}
                    Err(RunError::NoPreviousQuestion) => {
                        println!("      {}", style("no previous question").yellow());
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            RunStatus::Pending
            | RunStatus::Extracting
            | RunStatus::Reviewing
            | RunStatus::Finalizing => {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            RunStatus::Completed => break,
            RunStatus::Failed => {
                anyhow::bail!(
                    "run failed: {}",
                    status.error.unwrap_or_else(|| "unknown error".to_string())
                );
            }
        }
    }

    let report = coordinator.results(&token)?;
    let outputs = coordinator.output_documents(&token)?;
    print_report(&report, &outputs);
    Ok(())
}

/// Report which poppler tools are installed.
fn check() -> anyhow::Result<()> {
    let mut all_found = true;
    for (tool, available) in check_tools() {
        let status = if available {
            style("found").green()
        } else {
            all_found = false;
            style("missing").red()
        };
        println!("{:>12}: {}", tool, status);
    }
    if !all_found {
        println!("\nInstall poppler-utils to process PDF documents.");
    }
    Ok(())
}
