//! Analysis steps and their dependencies.

use crate::codec::decode_compressed_list;
use crate::utils::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A numbered analysis step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Step {
    Counts = 1,
    SubComms = 2,
    HeatMaps = 3,
    Timings = 4,
    Averages = 5,
    Plots = 6,
    Bins = 7,
}

impl Step {
    pub const ALL: [Step; 7] = [
        Step::Counts,
        Step::SubComms,
        Step::HeatMaps,
        Step::Timings,
        Step::Averages,
        Step::Plots,
        Step::Bins,
    ];

    pub fn number(self) -> usize {
        self as usize
    }

    pub fn from_number(n: usize) -> Option<Step> {
        Step::ALL.into_iter().find(|s| s.number() == n)
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::Counts => "analyzing counts",
            Step::SubComms => "comparing sub-communicators",
            Step::HeatMaps => "creating heat maps",
            Step::Timings => "analyzing timings",
            Step::Averages => "computing per-rank averages",
            Step::Plots => "generating plots",
            Step::Bins => "creating bins",
        }
    }

    /// Steps whose results this one reads directly
    pub fn dependencies(self) -> &'static [Step] {
        match self {
            Step::Counts => &[],
            Step::SubComms | Step::HeatMaps | Step::Timings | Step::Bins => &[Step::Counts],
            Step::Averages => &[Step::Timings, Step::HeatMaps],
            Step::Plots => &[Step::Averages, Step::Timings, Step::HeatMaps],
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Parse a step list in compact notation, e.g. `1,3-5`
///
/// # Errors
/// * `PipelineError::InvalidSteps` - malformed list or unknown step number
pub fn parse_steps(list: &str) -> Result<Vec<Step>, PipelineError> {
    let invalid = || PipelineError::InvalidSteps(list.to_string());
    let numbers = decode_compressed_list(list).map_err(|_| invalid())?;
    if numbers.is_empty() {
        return Err(invalid());
    }
    numbers
        .into_iter()
        .map(|n| Step::from_number(n).ok_or_else(invalid))
        .collect()
}

/// Requested steps plus everything they depend on, ascending
pub fn resolve(requested: &[Step]) -> Vec<Step> {
    let mut selected = BTreeSet::new();
    let mut pending: Vec<Step> = requested.to_vec();
    while let Some(step) = pending.pop() {
        if selected.insert(step) {
            pending.extend_from_slice(step.dependencies());
        }
    }
    selected.into_iter().collect()
}
