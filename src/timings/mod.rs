//! Execution and late-arrival timings.
//!
//! Step 4 reads every timing file of the profiled collective, sums times
//! per rank and runs the grouping engine over each call to spot ranks
//! whose times stand apart from the rest.

pub mod parser;

use crate::grouping::{group_values, Engine};
use crate::utils::config::COLLECTIVE_NAME;
use crate::utils::error::{GroupingError, TimingsError};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use parser::{
    parse_timing_file, parse_timing_file_name, parse_timings, timing_file_name, TimingFile,
    TimingFileName, TimingKind, TimingStats,
};

/// A communicator, identified by its lead rank and ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommId {
    pub lead_rank: usize,
    pub comm_id: usize,
}

/// Call → time per rank
pub type CallTimes = BTreeMap<usize, Vec<f64>>;

/// A call whose per-rank times form more than one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallOutliers {
    pub comm: CommId,
    pub call: usize,
    pub kind: TimingKind,

    /// Ranks of each group, groups ordered by time
    pub groups: Vec<Vec<usize>>,
}

/// Everything step 4 produces
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timings {
    pub exec: BTreeMap<CommId, CallTimes>,
    pub late: BTreeMap<CommId, CallTimes>,

    /// Rank → execution time summed over every call and communicator
    pub total_exec: BTreeMap<usize, f64>,
    pub total_late: BTreeMap<usize, f64>,

    pub outliers: Vec<CallOutliers>,
}

impl Timings {
    pub fn is_empty(&self) -> bool {
        self.exec.is_empty() && self.late.is_empty()
    }

    /// Times of one call, by kind
    pub fn call(&self, kind: TimingKind, comm: CommId, call: usize) -> Option<&Vec<f64>> {
        let by_comm = match kind {
            TimingKind::Execution => &self.exec,
            TimingKind::LateArrival => &self.late,
        };
        by_comm.get(&comm)?.get(&call)
    }

    /// Times of one call of the communicator led by `lead_rank`
    ///
    /// The first communicator ID with data for that call wins.
    pub fn call_by_lead(
        &self,
        kind: TimingKind,
        lead_rank: usize,
        call: usize,
    ) -> Option<&Vec<f64>> {
        let by_comm = match kind {
            TimingKind::Execution => &self.exec,
            TimingKind::LateArrival => &self.late,
        };
        by_comm
            .iter()
            .filter(|(comm, _)| comm.lead_rank == lead_rank)
            .find_map(|(_, calls)| calls.get(&call))
    }
}

/// Timing files of the profiled collective in a directory
///
/// **Public** - sorted by name for a stable processing order
pub fn find_timing_files(dir: &Path) -> Result<Vec<(PathBuf, TimingFileName)>, TimingsError> {
    let entries = fs::read_dir(dir).map_err(|source| TimingsError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| TimingsError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        match parse_timing_file_name(&name) {
            Some(parsed) if parsed.collective == COLLECTIVE_NAME => {
                files.push((entry.path(), parsed));
            }
            Some(parsed) => debug!("Skipping {} timings in {}", parsed.collective, name),
            None => {}
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// Group one call's times, truncated to integers
///
/// **Public** - more than one group in the result means outliers
pub fn detect_outliers(times: &[f64]) -> Result<Engine, GroupingError> {
    let values: Vec<i64> = times.iter().map(|&t| t as i64).collect();
    group_values(&values)
}

/// Parse and analyze every timing file of a directory
///
/// **Public** - step 4 entry point
///
/// # Errors
/// * `TimingsError::Io` / `TimingsError::Format` - unreadable or malformed file
/// * `TimingsError::Grouping` - the grouping engine failed on a call
pub fn analyze_timings(dir: &Path) -> Result<Timings, TimingsError> {
    let files = find_timing_files(dir)?;
    info!("Found {} timing files in {}", files.len(), dir.display());

    let mut timings = Timings::default();
    for (path, name) in files {
        let file = parse_timing_file(&path)?;
        debug!(
            "{}: {} calls over {} ranks",
            path.display(),
            file.num_calls(),
            file.num_ranks
        );

        let comm = CommId {
            lead_rank: name.lead_rank,
            comm_id: name.comm_id,
        };
        let totals = match name.kind {
            TimingKind::Execution => &mut timings.total_exec,
            TimingKind::LateArrival => &mut timings.total_late,
        };
        for (&rank, &time) in &file.totals {
            *totals.entry(rank).or_insert(0.0) += time;
        }

        for (&call, times) in &file.calls {
            let engine = detect_outliers(times)?;
            if engine.has_outliers() {
                warn!(
                    "Call {} of communicator {}: {} {} time groups",
                    call,
                    comm.lead_rank,
                    engine.groups().len(),
                    name.kind
                );
                timings.outliers.push(CallOutliers {
                    comm,
                    call,
                    kind: name.kind,
                    groups: engine.groups().iter().map(|g| g.ids()).collect(),
                });
            }
        }

        let by_comm = match name.kind {
            TimingKind::Execution => &mut timings.exec,
            TimingKind::LateArrival => &mut timings.late,
        };
        by_comm.insert(comm, file.calls);
    }

    Ok(timings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_analyze_directory() {
        let dir = tempdir().unwrap();
        let exec = timing_file_name("alltoallv", TimingKind::Execution, 0, 0, 0);
        let late = timing_file_name("alltoallv", TimingKind::LateArrival, 0, 0, 0);
        let other = timing_file_name("alltoall", TimingKind::Execution, 0, 0, 0);
        fs::write(
            dir.path().join(exec),
            "FORMAT_VERSION: 0\n\n# Call 0\n1.0\n2.0\n3.0\n\n# Call 1\n10.0\n11.0\n100.0\n",
        )
        .unwrap();
        fs::write(dir.path().join(late), "FORMAT_VERSION: 0\n\n# Call 0\n0.5\n0.5\n0.5\n").unwrap();
        fs::write(dir.path().join(other), "not parsed").unwrap();

        let timings = analyze_timings(dir.path()).unwrap();
        let comm = CommId { lead_rank: 0, comm_id: 0 };

        assert_eq!(timings.exec[&comm].len(), 2);
        assert_eq!(timings.total_exec, BTreeMap::from([(0, 11.0), (1, 13.0), (2, 103.0)]));
        assert_eq!(timings.total_late, BTreeMap::from([(0, 0.5), (1, 0.5), (2, 0.5)]));
        assert_eq!(timings.call(TimingKind::LateArrival, comm, 0), Some(&vec![0.5, 0.5, 0.5]));

        assert_eq!(timings.outliers.len(), 1);
        assert_eq!(timings.outliers[0].call, 1);
        assert_eq!(timings.outliers[0].groups, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_homogeneous_times_have_no_outliers() {
        let engine = detect_outliers(&[5.2, 5.9, 5.1, 5.4]).unwrap();
        assert!(!engine.has_outliers());
    }
}
