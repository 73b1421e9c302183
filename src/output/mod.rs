//! Run summary output.
//!
//! This module handles the machine-readable side of a run:
//! - The versioned summary schema
//! - Writing and reading it as pretty-printed JSON

pub mod json;
pub mod schema;

// Re-export main functions
pub use json::{read_summary, write_summary};
pub use schema::{AnalysisSummary, CommunicatorSummary, StepSummary};
