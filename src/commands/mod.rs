//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands orchestrate the library components and report with `anyhow`.

pub mod analyze;
pub mod bins;
pub mod call;
pub mod models;
pub mod utils;

// Re-export main command functions
pub use analyze::{execute_analyze, validate_args};
pub use bins::execute_bins;
pub use call::{execute_call, lookup_call, CallLookup};
pub use models::{AnalyzeArgs, BinsArgs, CallArgs};
pub use utils::{display_schema, display_version, validate_summary_file};
