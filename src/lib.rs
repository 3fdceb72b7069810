//! mailsort - financial statement classification and mail routing.
//!
//! Classifies scanned statement documents against a do-not-mail roster,
//! routes each statement into one of four output buckets, resolves ambiguous
//! fuzzy matches through a sequential human review, and splits the source
//! document into per-bucket output documents.

// Vocabulary enums use `from_str` methods that return Option<Self>,
// not Result<Self, Error> as std::str::FromStr requires.
#![allow(clippy::should_implement_trait)]

pub mod classify;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod directory;
pub mod document;
pub mod extract;
pub mod models;
pub mod review;
pub mod server;
pub mod split;
pub mod store;
