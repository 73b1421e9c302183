//! Step pipeline.
//!
//! Requested steps are expanded with their dependencies, then run one at
//! a time in ascending order. Each step stores a typed result that later
//! steps read; a missing result is reported as an error rather than
//! assumed.

pub mod step;
mod steps;

use crate::bins::{parse_thresholds, Bin};
use crate::counts::{CallsData, SendRecvStats};
use crate::maps::HeatMaps;
use crate::patterns::PatternsCollection;
use crate::plot::PlotRenderer;
use crate::timings::Timings;
use crate::utils::config::{DEFAULT_BINS, DEFAULT_PLOT_BATCH_SIZE, DEFAULT_SIZE_THRESHOLD};
use crate::utils::error::PipelineError;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

pub use step::{parse_steps, resolve, Step};

/// Settings of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Directory holding the counter and timing files
    pub input_dir: PathBuf,

    /// Directory receiving every generated file
    pub output_dir: PathBuf,

    pub size_threshold: Option<i64>,
    pub bin_thresholds: Vec<i64>,
    pub plot_batch_size: usize,

    /// Steps asked for, before dependency expansion
    pub steps: Vec<Step>,
}

impl PipelineOptions {
    /// All steps over `dir`, results written next to the inputs
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            input_dir: dir.clone(),
            output_dir: dir,
            size_threshold: Some(DEFAULT_SIZE_THRESHOLD),
            bin_thresholds: parse_thresholds(DEFAULT_BINS).unwrap_or_default(),
            plot_batch_size: DEFAULT_PLOT_BATCH_SIZE,
            steps: Step::ALL.to_vec(),
        }
    }
}

/// Step 1: counts, statistics and patterns per lead rank
#[derive(Debug, Clone, Default)]
pub struct CountsResults {
    pub job_id: usize,
    pub lead_ranks: Vec<usize>,

    /// Calls summed over every communicator
    pub total_num_calls: usize,

    pub calls: BTreeMap<usize, CallsData>,
    pub stats: BTreeMap<usize, SendRecvStats>,
    pub patterns: BTreeMap<usize, PatternsCollection>,
    pub reports: Vec<PathBuf>,
}

/// Step 2
#[derive(Debug, Clone, Default)]
pub struct SubCommsResults {
    /// Highlights report, when every communicator shows the same patterns
    pub highlights: Option<PathBuf>,
}

/// Step 5: per-rank averages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AverageResults {
    pub send: BTreeMap<usize, f64>,
    pub recv: BTreeMap<usize, f64>,
    pub exec: BTreeMap<usize, f64>,
    pub late: BTreeMap<usize, f64>,
}

/// Outcome of step 6
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotStatus {
    Rendered { images: usize },
    Skipped { reason: String },
}

#[derive(Debug, Clone)]
pub struct PlotResults {
    pub status: PlotStatus,
    pub images: Vec<PathBuf>,
}

/// Step 7
#[derive(Debug, Clone, Default)]
pub struct BinsResults {
    /// Lead rank → bins
    pub bins: BTreeMap<usize, Vec<Bin>>,
    pub files: Vec<PathBuf>,
}

/// Results of every step that ran
#[derive(Debug, Clone, Default)]
pub struct Results {
    pub counts: Option<CountsResults>,
    pub sub_comms: Option<SubCommsResults>,
    pub maps: Option<HeatMaps>,
    pub timings: Option<Timings>,
    pub averages: Option<AverageResults>,
    pub plots: Option<PlotResults>,
    pub bins: Option<BinsResults>,

    /// Steps in execution order with their duration
    pub durations: Vec<(Step, Duration)>,
}

/// Result of `required`, or the error naming both steps
fn require<T>(slot: &Option<T>, step: Step, required: Step) -> Result<&T, PipelineError> {
    slot.as_ref()
        .ok_or(PipelineError::MissingResults { step, required })
}

/// Dependency-ordered analysis over a directory of profiler output
pub struct Pipeline<'a> {
    options: PipelineOptions,
    renderer: &'a dyn PlotRenderer,
}

impl<'a> Pipeline<'a> {
    pub fn new(options: PipelineOptions, renderer: &'a dyn PlotRenderer) -> Self {
        Self { options, renderer }
    }

    /// Steps that will run, in order
    pub fn steps(&self) -> Vec<Step> {
        resolve(&self.options.steps)
    }

    /// Run every selected step
    ///
    /// **Public** - main entry point of the analysis
    ///
    /// # Errors
    /// The first step failure aborts the run. A missing plot renderer is
    /// not a failure; step 6 is then skipped.
    pub fn run(&self) -> Result<Results, PipelineError> {
        let steps = self.steps();
        std::fs::create_dir_all(&self.options.output_dir)?;

        let mut results = Results::default();
        for (idx, &step) in steps.iter().enumerate() {
            println!("* Step {}/{}: {}...", idx + 1, steps.len(), step.label());
            info!("Running step {} ({})", step, step.label());
            let start = Instant::now();

            self.run_step(step, &mut results)?;

            let elapsed = start.elapsed();
            println!("Step completed in {:?}", elapsed);
            results.durations.push((step, elapsed));
        }

        Ok(results)
    }

    fn run_step(&self, step: Step, results: &mut Results) -> Result<(), PipelineError> {
        let opts = &self.options;
        match step {
            Step::Counts => {
                results.counts = Some(steps::analyze_counts(opts)?);
            }
            Step::SubComms => {
                let counts = require(&results.counts, step, Step::Counts)?;
                results.sub_comms = Some(steps::compare_sub_comms(opts, counts)?);
            }
            Step::HeatMaps => {
                let counts = require(&results.counts, step, Step::Counts)?;
                results.maps = Some(steps::create_maps(opts, counts)?);
            }
            Step::Timings => {
                let counts = require(&results.counts, step, Step::Counts)?;
                results.timings = Some(steps::analyze_timings(opts, counts)?);
            }
            Step::Averages => {
                let timings = require(&results.timings, step, Step::Timings)?;
                let maps = require(&results.maps, step, Step::HeatMaps)?;
                let counts = require(&results.counts, step, Step::Counts)?;
                results.averages = Some(steps::compute_averages(counts, maps, timings));
            }
            Step::Plots => {
                let averages = require(&results.averages, step, Step::Averages)?;
                let timings = require(&results.timings, step, Step::Timings)?;
                let maps = require(&results.maps, step, Step::HeatMaps)?;
                results.plots =
                    Some(steps::generate_plots(opts, self.renderer, maps, timings, averages)?);
            }
            Step::Bins => {
                let counts = require(&results.counts, step, Step::Counts)?;
                results.bins = Some(steps::create_bins(opts, counts)?);
            }
        }
        Ok(())
    }
}
