//! Compact counter codec.
//!
//! This module handles the on-disk text encoding of counters:
//! - Run-length rank/call-ID notation
//! - Header/record framing of counter files
//! - Writing blocks back in the profiler's layout

pub mod notation;
pub mod reader;
pub mod writer;

// Re-export main types and functions
pub use notation::{compress_int_array, count_elements, decode_compressed_list};
pub use reader::{CountBlock, CountHeader, CountReader, CountRecord, ParserState};
pub use writer::write_block;
