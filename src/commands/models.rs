use crate::utils::config::{DEFAULT_BINS, DEFAULT_PLOT_BATCH_SIZE, DEFAULT_SIZE_THRESHOLD};
use std::path::PathBuf;

/// Arguments for the analyze command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct AnalyzeArgs {
    /// Directory holding the profiler output
    pub dir: PathBuf,

    /// Where results go (defaults to `dir`)
    pub output_dir: Option<PathBuf>,

    /// Small/large message split in bytes, -1 to disable
    pub size_threshold: i64,

    /// Comma-separated bin thresholds
    pub bins: String,

    /// Steps to run in compact notation (all when absent)
    pub steps: Option<String>,

    /// Max number of plots rendered at once
    pub plot_batch_size: usize,

    /// Print a summary to stdout
    pub print_summary: bool,
}

impl Default for AnalyzeArgs {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            output_dir: None,
            size_threshold: DEFAULT_SIZE_THRESHOLD,
            bins: DEFAULT_BINS.to_string(),
            steps: None,
            plot_batch_size: DEFAULT_PLOT_BATCH_SIZE,
            print_summary: false,
        }
    }
}

/// Arguments for the bins command
#[derive(Debug, Clone)]
pub struct BinsArgs {
    /// Counter file to bin
    pub file: PathBuf,

    pub bins: String,

    /// Write bin files here, using `job`/`rank` in their names
    pub output_dir: Option<PathBuf>,

    /// Taken from the counter file name when absent
    pub job: Option<usize>,
    pub rank: Option<usize>,
}

impl Default for BinsArgs {
    fn default() -> Self {
        Self {
            file: PathBuf::new(),
            bins: DEFAULT_BINS.to_string(),
            output_dir: None,
            job: None,
            rank: None,
        }
    }
}

/// Arguments for the call command
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub dir: PathBuf,
    pub call: usize,

    /// Lead rank to look in; every communicator is searched when absent
    pub rank: Option<usize>,

    /// Small/large message split in bytes, `None` to disable
    pub size_threshold: Option<i64>,
}
