//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use crate::pipeline::Step;
use thiserror::Error;

/// Errors that can occur while decoding the compact counter format
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Invalid token `{token}` in compressed list `{list}`")]
    InvalidToken { token: String, list: String },
}

/// Errors that can occur while turning counter files into statistics
#[derive(Error, Debug)]
pub enum CountsError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Invalid counts format: {0}")]
    Format(String),

    #[error("Invalid datatype size: {0}")]
    InvalidDatatypeSize(i64),

    #[error("Call {call} not found in {file}")]
    NotFound { call: usize, file: String },

    #[error("Fatal: {0}")]
    Fatal(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl CountsError {
    /// Whether the caller may keep searching other files
    ///
    /// **Public** - a missing call is expected when data spans communicators
    pub fn is_not_found(&self) -> bool {
        matches!(self, CountsError::NotFound { .. })
    }
}

/// Errors raised by the grouping engine
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GroupingError {
    #[error("Internal grouping error: {0}")]
    Internal(String),
}

/// Errors that can occur while parsing timing files
#[derive(Error, Debug)]
pub enum TimingsError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid timing file {path}: {reason}")]
    Format { path: String, reason: String },

    #[error(transparent)]
    Grouping(#[from] GroupingError),
}

/// Errors that can occur while building or saving bins
#[derive(Error, Debug)]
pub enum BinsError {
    #[error("Invalid bin thresholds `{0}`")]
    InvalidThresholds(String),

    #[error(transparent)]
    Counts(#[from] CountsError),

    #[error("Failed to write bin file: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while building heat maps
#[derive(Error, Debug)]
pub enum MapsError {
    #[error("Failed to write heat map: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while generating plots
#[derive(Error, Debug)]
pub enum PlotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Renderer failed on {script}: {reason}")]
    RenderFailed { script: String, reason: String },

    #[error("Plot worker panicked")]
    WorkerPanicked,
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors surfaced by the step pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("step {step} requires results of step {required} which are undefined")]
    MissingResults { step: Step, required: Step },

    #[error("Invalid step list `{0}`")]
    InvalidSteps(String),

    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Counts(#[from] CountsError),

    #[error(transparent)]
    Timings(#[from] TimingsError),

    #[error(transparent)]
    Bins(#[from] BinsError),

    #[error(transparent)]
    Maps(#[from] MapsError),

    #[error(transparent)]
    Plot(#[from] PlotError),
}
