//! Configuration and constants for the analyzer.

use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current JSON summary schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

// Markers of the compact counter format, as written by the profiler
pub const HEADER_MARKER: &str = "# Raw counters";
pub const NUM_RANKS_PREFIX: &str = "Number of ranks: ";
pub const DATATYPE_SIZE_PREFIX: &str = "Datatype size: ";
pub const CALL_RANGE_PREFIX: &str = "Alltoallv calls ";
pub const COUNT_PREFIX: &str = "Count: ";
pub const COUNT_CALLS_SEPARATOR: &str = " calls - ";
pub const BEGIN_DATA_MARKER: &str = "BEGINNING DATA";
pub const END_DATA_MARKER: &str = "END DATA";
pub const RANK_LIST_PREFIX: &str = "Rank(s) ";

pub const SEND_COUNTERS_FILE_PREFIX: &str = "send-counters.";
pub const RECV_COUNTERS_FILE_PREFIX: &str = "recv-counters.";

/// Name of the profiled collective, used in file names and reports
pub const COLLECTIVE_NAME: &str = "alltoallv";

// Timing files
pub const FORMAT_VERSION_PREFIX: &str = "FORMAT_VERSION: ";
pub const DATA_FORMAT_VERSION: u32 = 0;
pub const CALL_ID_PREFIX: &str = "# Call ";
pub const EXEC_TIMINGS_TOKEN: &str = "_execution_times.rank";
pub const LATE_ARRIVAL_TIMINGS_TOKEN: &str = "_late_arrival_times.rank";

/// Messages of at most this many bytes are "small"
pub const DEFAULT_SIZE_THRESHOLD: i64 = 200;
pub const DEFAULT_BINS: &str = "200,1024,2048,4096";

/// Max relative gap between a group's mean and median
pub const MEAN_MEDIAN_DEVIATION: f64 = 0.1;

// Pattern classification ratios
pub const PATTERN_RATIO: usize = 100;
pub const N_TO_N_BAND: f64 = 0.1;

/// Upper bound on concurrently rendered plots
pub const DEFAULT_PLOT_BATCH_SIZE: usize = 8;

pub const SUMMARY_FILE_NAME: &str = "analysis-summary.json";
pub const MULTICOMM_HIGHLIGHTS_FILE_NAME: &str = "multicomm-highlights.md";

/// Analysis settings that can be read from a TOML file
///
/// Every field is optional in the file; CLI flags take precedence.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Size (bytes) separating small from large messages, -1 disables the split
    pub size_threshold: i64,

    /// Comma-separated bin thresholds
    pub bins: String,

    /// Comma-separated steps to run (all when absent)
    pub steps: Option<String>,

    /// Max number of plots rendered at once
    pub plot_batch_size: usize,

    /// Where results are written (input directory when absent)
    pub output_dir: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            size_threshold: DEFAULT_SIZE_THRESHOLD,
            bins: DEFAULT_BINS.to_string(),
            steps: None,
            plot_batch_size: DEFAULT_PLOT_BATCH_SIZE,
            output_dir: None,
        }
    }
}

impl AnalysisConfig {
    /// Size threshold as used by the statistics engine (`None` when disabled)
    pub fn threshold(&self) -> Option<i64> {
        (self.size_threshold != -1).then_some(self.size_threshold)
    }
}

/// Load analysis settings from a TOML file
///
/// # Arguments
/// * `path` - Path to the TOML configuration file
///
/// # Returns
/// Parsed AnalysisConfig
///
/// # Errors
/// * `ConfigError::Io` - If file cannot be read
/// * `ConfigError::Parse` - If TOML is invalid
/// * `ConfigError::Invalid` - If a value is out of range
///
/// # Example
/// ```ignore
/// let config = load_config("a2a.toml")?;
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<AnalysisConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: AnalysisConfig = toml::from_str(&contents)?;

    if config.plot_batch_size == 0 {
        return Err(ConfigError::Invalid(
            "plot_batch_size must be at least 1".to_string(),
        ));
    }
    if config.size_threshold < -1 {
        return Err(ConfigError::Invalid(format!(
            "size_threshold must be -1 or positive, got {}",
            config.size_threshold
        )));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "size_threshold = 512\nsteps = \"1,7\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.size_threshold, 512);
        assert_eq!(config.steps.as_deref(), Some("1,7"));
        assert_eq!(config.bins, DEFAULT_BINS);
        assert_eq!(config.plot_batch_size, DEFAULT_PLOT_BATCH_SIZE);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "plot_batch_size = 0").unwrap();

        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_disabled_threshold() {
        let config = AnalysisConfig {
            size_threshold: -1,
            ..Default::default()
        };
        assert_eq!(config.threshold(), None);
        assert_eq!(AnalysisConfig::default().threshold(), Some(200));
    }
}
