//! A2A Analyzer
//!
//! Post-mortem analysis of the counters and timings written by an
//! alltoallv profiler: communication patterns, per-rank heat maps,
//! timing outliers, message-size bins and plots.
//!
//! This crate provides the core implementation for the
//! `a2a-analyzer` CLI tool.
//!
//! ## Getting Started
//!
//! ```bash
//! a2a-analyzer analyze --dir ./profiler-output --summary
//! a2a-analyzer call --dir ./profiler-output --call 42
//! ```

pub mod bins;
pub mod codec;
pub mod commands;
pub mod counts;
pub mod grouping;
pub mod maps;
pub mod output;
pub mod patterns;
pub mod pipeline;
pub mod plot;
pub mod timings;
pub mod utils;
