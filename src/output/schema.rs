//! JSON schema of the run summary.
//!
//! The schema is versioned so `validate` can reject summaries written by
//! an incompatible release.

use crate::patterns::Classification;
use crate::pipeline::{PlotStatus, Results};
use crate::timings::CallOutliers;
use crate::utils::config::SCHEMA_VERSION;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level structure of `analysis-summary.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Schema version for compatibility checking
    pub version: String,

    /// Timestamp when the summary was generated
    pub generated_at: String,

    /// Directory that was analyzed
    pub input_dir: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_num_calls: Option<usize>,

    /// Steps in execution order
    pub steps: Vec<StepSummary>,

    /// One entry per lead rank
    pub communicators: Vec<CommunicatorSummary>,

    /// Calls whose timings split into several groups
    pub outliers: Vec<CallOutliers>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub plots: Option<PlotStatus>,

    /// Path of the multi-communicator report, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub step: usize,
    pub label: String,
    pub duration_ms: f64,
}

/// Pattern counts of one communicator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicatorSummary {
    pub lead_rank: usize,
    pub num_calls: usize,
    pub patterns: usize,
    pub one_to_n: usize,
    pub n_to_n: usize,
    pub n_to_one: usize,
    pub empty: usize,
}

impl AnalysisSummary {
    /// Summarize the results of a pipeline run
    pub fn from_results(input_dir: &Path, results: &Results) -> Self {
        let steps = results
            .durations
            .iter()
            .map(|(step, duration)| StepSummary {
                step: step.number(),
                label: step.label().to_string(),
                duration_ms: duration.as_secs_f64() * 1000.0,
            })
            .collect();

        let communicators = results
            .counts
            .iter()
            .flat_map(|counts| {
                counts.patterns.iter().map(|(&lead_rank, patterns)| CommunicatorSummary {
                    lead_rank,
                    num_calls: counts.calls.get(&lead_rank).map_or(0, |c| c.len()),
                    patterns: patterns.all_patterns.len(),
                    one_to_n: patterns.bucket(Classification::OneToN).len(),
                    n_to_n: patterns.bucket(Classification::NToN).len(),
                    n_to_one: patterns.bucket(Classification::NToOne).len(),
                    empty: patterns.empty.len(),
                })
            })
            .collect();

        Self {
            version: SCHEMA_VERSION.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            input_dir: input_dir.display().to_string(),
            job_id: results.counts.as_ref().map(|c| c.job_id),
            total_num_calls: results.counts.as_ref().map(|c| c.total_num_calls),
            steps,
            communicators,
            outliers: results
                .timings
                .as_ref()
                .map(|t| t.outliers.clone())
                .unwrap_or_default(),
            plots: results.plots.as_ref().map(|p| p.status.clone()),
            highlights: results
                .sub_comms
                .as_ref()
                .and_then(|s| s.highlights.as_ref())
                .map(|p| p.display().to_string()),
        }
    }
}
