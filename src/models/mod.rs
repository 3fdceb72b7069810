//! Core data model: statement records and run bookkeeping.

mod run;
mod statement;

pub use run::{content_hash, ReviewStats, RunReport, RunStatus, SplitFile, TimingMetrics};
pub use statement::{Destination, Geography, ReviewAnswer, StatementRecord};
