//! Duplicate detection and quarantine for image collections.
//!
//! Three resolution modes share one pipeline: sequential adjacent dedup for
//! frame sequences, cross-corpus overlap detection between a reference and
//! an evaluation set, and full-corpus clustering. Files judged redundant are
//! moved into a backup directory, never deleted, and every decision lands in
//! a plain-text audit report.

pub mod config;
pub mod core;
pub mod engine;
pub mod error;

pub use config::{Config, Mode, QuarantineAction};
pub use engine::{compare_pair, run, PairComparison, RunOutcome};
pub use error::EngineError;
