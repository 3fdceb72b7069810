//! Interactive prompt and report rendering helpers.

use std::collections::BTreeMap;
use std::io;

use console::{style, Term};

use crate::models::{Destination, RunReport, SplitFile};
use crate::review::QuestionView;

/// Ask one review question on the terminal, returning the protocol character.
pub fn prompt_response(term: &Term, question: &QuestionView) -> io::Result<String> {
    println!();
    println!(
        "[{}/{}] {} looks like do-not-mail company {}",
        question.position,
        question.total,
        style(&question.company_name).bold(),
        style(&question.matched_name).bold(),
    );
    if let Some(similarity) = question.similarity {
        println!("      similarity: {:.1}%", similarity);
    }
    let hint = if question.can_go_back {
        "Treat as do-not-mail? [y]es / [n]o / [s]kip rest / [p]revious"
    } else {
        "Treat as do-not-mail? [y]es / [n]o / [s]kip rest"
    };
    println!("      {}", style(hint).dim());

    loop {
        let ch = term.read_char()?;
        match ch {
            'y' | 'n' | 's' | 'p' => return Ok(ch.to_string()),
            _ => println!("      {}", style("please answer y, n, s, or p").yellow()),
        }
    }
}

/// Render the run summary after completion.
pub fn print_report(report: &RunReport, outputs: &BTreeMap<Destination, SplitFile>) {
    println!();
    println!("{}", style("Processing complete").green().bold());
    println!("  statements found: {}", report.statement_count);

    for destination in Destination::ALL {
        let records = report
            .destination_breakdown
            .get(&destination)
            .copied()
            .unwrap_or(0);
        if records == 0 {
            continue;
        }
        let pages = report.page_counts.get(&destination).copied().unwrap_or(0);
        match outputs.get(&destination) {
            Some(file) => println!(
                "  {:>14}: {} statement(s), {} page(s) -> {}",
                destination.as_str(),
                records,
                pages,
                file.path.display()
            ),
            None => println!(
                "  {:>14}: {} statement(s), {} page(s)",
                destination.as_str(),
                records,
                pages
            ),
        }
    }

    if report.review.questions_total > 0 {
        println!(
            "  review: {} question(s), {} accepted, {} rejected, {} skipped",
            report.review.questions_total,
            report.review.accepted,
            report.review.rejected,
            report.review.skipped
        );
    }
    println!(
        "  extraction {:.2}s, split {:.2}s",
        report.timing.extraction_secs, report.timing.finalize_secs
    );
}
