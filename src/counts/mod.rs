//! Statistics over communication counters.
//!
//! This module turns decoded counter blocks into:
//! - Per-call statistics (sums, extrema, zero/non-zero distributions)
//! - Shared per-call data for a send/recv file pair
//! - Communicator-wide send/recv distributions

pub mod files;
pub mod loader;
pub mod send_recv;
pub mod stats;

// Re-export main types and functions
pub use files::{
    count_file_names, count_file_paths, find_count_files, parse_count_file_name, CountFiles,
};
pub use loader::{find_call, load_calls_data, read_blocks, CallData, CallsData, Data};
pub use send_recv::{gather_stats, SendRecvStats};
pub use stats::{analyze_counts, RankCounts, Statistics};
