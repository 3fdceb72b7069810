//! Interactive review of ambiguous fuzzy matches.
//!
//! The queue is fixed at session start; a cursor walks it forward and a
//! history stack of visited positions supports going back. One cursor per
//! run; callers serialize access.

use serde::Serialize;
use thiserror::Error;

use crate::models::{Destination, ReviewAnswer, ReviewStats, StatementRecord};

/// A reviewer's input for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewResponse {
    /// "y" - the fuzzy candidate is the company; route to DNM.
    Yes,
    /// "n" - not a match; the classifier's destination stands.
    No,
    /// "s" - skip every remaining question.
    SkipAll,
    /// "p" - go back to the previous question.
    Back,
}

impl ReviewResponse {
    /// Parse the single-character protocol used by callers.
    pub fn parse(response: &str) -> Option<Self> {
        match response {
            "y" => Some(Self::Yes),
            "n" => Some(Self::No),
            "s" => Some(Self::SkipAll),
            "p" => Some(Self::Back),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("No previous question to go back to")]
    NoPreviousQuestion,
}

/// Display data for the question under the cursor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionView {
    pub company_name: String,
    pub matched_name: String,
    pub similarity: Option<f64>,
    /// 1-based position in the queue.
    pub position: usize,
    pub total: usize,
    pub can_go_back: bool,
}

/// Sequential review state machine over the records flagged for review.
#[derive(Debug, Clone, Default)]
pub struct ReviewSession {
    /// Indices into the run's record list, in record order.
    queue: Vec<usize>,
    /// Invariant: `0 <= cursor <= queue.len()`; equal means complete.
    cursor: usize,
    history: Vec<usize>,
}

impl ReviewSession {
    /// Build the queue from the records needing review. Classification never
    /// adds records after this point.
    pub fn new(records: &[StatementRecord]) -> Self {
        let queue = records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.needs_review)
            .map(|(index, _)| index)
            .collect();
        Self {
            queue,
            cursor: 0,
            history: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.queue.len()
    }

    pub fn remaining(&self) -> usize {
        self.queue.len() - self.cursor
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.queue.len()
    }

    /// The question under the cursor, or `None` when the session is complete.
    pub fn current(&self, records: &[StatementRecord]) -> Option<QuestionView> {
        let index = *self.queue.get(self.cursor)?;
        let record = &records[index];
        Some(QuestionView {
            company_name: record.company_name.clone(),
            matched_name: record.matched_name.clone().unwrap_or_default(),
            similarity: record.similarity,
            position: self.cursor + 1,
            total: self.queue.len(),
            can_go_back: !self.history.is_empty(),
        })
    }

    /// Apply one reviewer response, mutating only destination and
    /// review_answer on the affected records.
    pub fn answer(
        &mut self,
        response: ReviewResponse,
        records: &mut [StatementRecord],
    ) -> Result<(), ReviewError> {
        match response {
            ReviewResponse::Yes => {
                if let Some(&index) = self.queue.get(self.cursor) {
                    self.history.push(self.cursor);
                    records[index].destination = Some(Destination::Dnm);
                    records[index].review_answer = Some(ReviewAnswer::AcceptDnm);
                    self.cursor += 1;
                }
                Ok(())
            }
            ReviewResponse::No => {
                if let Some(&index) = self.queue.get(self.cursor) {
                    self.history.push(self.cursor);
                    records[index].review_answer = Some(ReviewAnswer::Reject);
                    self.cursor += 1;
                }
                Ok(())
            }
            ReviewResponse::SkipAll => {
                for &index in &self.queue[self.cursor..] {
                    records[index].review_answer = Some(ReviewAnswer::Skip);
                }
                self.cursor = self.queue.len();
                Ok(())
            }
            ReviewResponse::Back => {
                let previous = self.history.pop().ok_or(ReviewError::NoPreviousQuestion)?;
                self.cursor = previous;
                Ok(())
            }
        }
    }

    /// Tally answers for reporting.
    pub fn stats(&self, records: &[StatementRecord]) -> ReviewStats {
        let mut stats = ReviewStats {
            questions_total: self.queue.len(),
            ..ReviewStats::default()
        };
        for &index in &self.queue {
            match records[index].review_answer {
                Some(ReviewAnswer::AcceptDnm) => stats.accepted += 1,
                Some(ReviewAnswer::Reject) => stats.rejected += 1,
                Some(ReviewAnswer::Skip) => stats.skipped += 1,
                None => {}
            }
        }
        stats
    }
}
