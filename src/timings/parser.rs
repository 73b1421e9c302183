//! Timing file parser.
//!
//! A timing file starts with `FORMAT_VERSION: <n>` and a blank line, then
//! one block per call: a `# Call <id>` line followed by one time per rank,
//! in rank order, terminated by a blank line or the end of the file.

use crate::utils::config::{
    CALL_ID_PREFIX, DATA_FORMAT_VERSION, EXEC_TIMINGS_TOKEN, FORMAT_VERSION_PREFIX,
    LATE_ARRIVAL_TIMINGS_TOKEN,
};
use crate::utils::error::TimingsError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// What a timing file measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimingKind {
    /// Time spent inside the collective
    Execution,
    /// Time between a rank's arrival and the last rank's arrival
    LateArrival,
}

impl TimingKind {
    fn token(self) -> &'static str {
        match self {
            TimingKind::Execution => EXEC_TIMINGS_TOKEN,
            TimingKind::LateArrival => LATE_ARRIVAL_TIMINGS_TOKEN,
        }
    }
}

impl std::fmt::Display for TimingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimingKind::Execution => write!(f, "execution"),
            TimingKind::LateArrival => write!(f, "late arrival"),
        }
    }
}

/// Identity of a timing file, decoded from its name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingFileName {
    pub collective: String,
    pub kind: TimingKind,
    pub lead_rank: usize,
    pub comm_id: usize,
    pub job_id: usize,
}

/// `<collective>_execution_times.rank<L>_comm<C>_job<J>.md` and the
/// late-arrival equivalent
pub fn timing_file_name(
    collective: &str,
    kind: TimingKind,
    lead_rank: usize,
    comm_id: usize,
    job_id: usize,
) -> String {
    format!(
        "{}{}{}_comm{}_job{}.md",
        collective,
        kind.token(),
        lead_rank,
        comm_id,
        job_id
    )
}

/// Decode a timing file name, `None` when it is not one
pub fn parse_timing_file_name(name: &str) -> Option<TimingFileName> {
    let (kind, idx) = [TimingKind::Execution, TimingKind::LateArrival]
        .into_iter()
        .find_map(|kind| name.find(kind.token()).map(|idx| (kind, idx)))?;

    let collective = &name[..idx];
    let rest = &name[idx + kind.token().len()..];
    let rest = rest
        .strip_suffix(".md")
        .or_else(|| rest.strip_suffix(".dat"))
        .unwrap_or(rest);

    let mut tokens = rest.split('_');
    let lead_rank = tokens.next()?.parse().ok()?;
    let comm_id = tokens.next()?.strip_prefix("comm")?.parse().ok()?;
    let job_id = tokens.next()?.strip_prefix("job")?.parse().ok()?;
    if tokens.next().is_some() || collective.is_empty() {
        return None;
    }

    Some(TimingFileName {
        collective: collective.to_string(),
        kind,
        lead_rank,
        comm_id,
        job_id,
    })
}

/// Min/max/mean of one call's times
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl TimingStats {
    /// `None` for an empty series
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Some(Self { min, max, mean })
    }
}

/// Content of a timing file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingFile {
    pub format_version: u32,
    pub num_ranks: usize,

    /// Call → time per rank, in rank order
    pub calls: BTreeMap<usize, Vec<f64>>,

    /// Rank → time summed over every call
    pub totals: BTreeMap<usize, f64>,
}

impl TimingFile {
    pub fn num_calls(&self) -> usize {
        self.calls.len()
    }
}

/// Parse a timing file from any buffered reader
///
/// **Public** - `source` only labels errors
///
/// # Errors
/// * `TimingsError::Format` - bad version line, missing blank line, bad
///   call header, non-numeric time, or a call whose rank count differs
///   from the first call's
/// * `TimingsError::Io` - read failure
pub fn parse_timings<R: BufRead>(reader: R, source: &str) -> Result<TimingFile, TimingsError> {
    let format_err = |reason: String| TimingsError::Format {
        path: source.to_string(),
        reason,
    };
    let mut lines = reader.lines();
    let mut next_line = || -> Result<Option<String>, TimingsError> {
        lines.next().transpose().map_err(|source_err| TimingsError::Io {
            path: source.to_string(),
            source: source_err,
        })
    };

    let version_line = next_line()?.ok_or_else(|| format_err("empty file".to_string()))?;
    let format_version = version_line
        .trim_end()
        .strip_prefix(FORMAT_VERSION_PREFIX)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .ok_or_else(|| format_err("format version missing".to_string()))?;
    if format_version != DATA_FORMAT_VERSION {
        return Err(format_err(format!(
            "unsupported format version {} (expected {})",
            format_version, DATA_FORMAT_VERSION
        )));
    }
    match next_line()? {
        Some(line) if line.trim().is_empty() => {}
        Some(line) => {
            return Err(format_err(format!(
                "expected an empty line after the format version, got `{}`",
                line
            )))
        }
        None => return Err(format_err("truncated header".to_string())),
    }

    let mut file = TimingFile {
        format_version,
        ..Default::default()
    };

    while let Some(line) = next_line()? {
        if line.trim().is_empty() {
            continue;
        }
        let call: usize = line
            .trim_end()
            .strip_prefix(CALL_ID_PREFIX)
            .and_then(|id| id.trim().parse().ok())
            .ok_or_else(|| {
                format_err(format!("`{}` does not start with `{}`", line, CALL_ID_PREFIX))
            })?;

        let mut times = Vec::new();
        while let Some(line) = next_line()? {
            let line = line.trim();
            if line.is_empty() {
                break;
            }
            let time = line
                .parse::<f64>()
                .map_err(|_| format_err(format!("call {}: invalid time `{}`", call, line)))?;
            times.push(time);
        }

        if file.calls.is_empty() {
            file.num_ranks = times.len();
        } else if times.len() != file.num_ranks {
            return Err(format_err(format!(
                "inconsistent timing file, call {} has {} ranks instead of {}",
                call,
                times.len(),
                file.num_ranks
            )));
        }

        for (rank, time) in times.iter().enumerate() {
            *file.totals.entry(rank).or_insert(0.0) += time;
        }
        file.calls.insert(call, times);
    }

    Ok(file)
}

/// Parse a timing file from disk
pub fn parse_timing_file(path: &Path) -> Result<TimingFile, TimingsError> {
    let file = File::open(path).map_err(|source| TimingsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_timings(BufReader::new(file), &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_file_name_round_trip() {
        let name = timing_file_name("alltoallv", TimingKind::LateArrival, 1234, 5423, 57645);
        assert_eq!(name, "alltoallv_late_arrival_times.rank1234_comm5423_job57645.md");
        assert_eq!(
            parse_timing_file_name(&name),
            Some(TimingFileName {
                collective: "alltoallv".to_string(),
                kind: TimingKind::LateArrival,
                lead_rank: 1234,
                comm_id: 5423,
                job_id: 57645,
            })
        );
    }

    #[test]
    fn test_file_name_other_collective() {
        let parsed = parse_timing_file_name("alltoall_execution_times.rank3587_comm2452_job5384.md")
            .unwrap();
        assert_eq!(parsed.collective, "alltoall");
        assert_eq!(parsed.kind, TimingKind::Execution);
        assert_eq!((parsed.lead_rank, parsed.comm_id, parsed.job_id), (3587, 2452, 5384));

        assert!(parse_timing_file_name("send-counters.job0.rank0.txt").is_none());
        assert!(parse_timing_file_name("alltoallv_execution_times.rank0_job0.md").is_none());
    }

    #[test]
    fn test_parse_two_calls() {
        let text = "FORMAT_VERSION: 0\n\n# Call 0\n1.5\n2.0\n\n# Call 1\n0.5\n1.0\n";
        let file = parse_timings(text.as_bytes(), "test").unwrap();

        assert_eq!(file.num_ranks, 2);
        assert_eq!(file.num_calls(), 2);
        assert_eq!(file.calls[&0], vec![1.5, 2.0]);
        assert_eq!(file.totals, BTreeMap::from([(0, 2.0), (1, 3.0)]));
    }

    #[test]
    fn test_inconsistent_rank_count() {
        let text = "FORMAT_VERSION: 0\n\n# Call 0\n1.5\n2.0\n\n# Call 1\n0.5\n";
        assert!(matches!(
            parse_timings(text.as_bytes(), "test"),
            Err(TimingsError::Format { .. })
        ));
    }

    #[test]
    fn test_missing_version() {
        let text = "# Call 0\n1.0\n";
        assert!(parse_timings(text.as_bytes(), "test").is_err());
        let text = "FORMAT_VERSION: 0\n# Call 0\n1.0\n";
        assert!(parse_timings(text.as_bytes(), "test").is_err());
    }

    #[test]
    fn test_timing_stats() {
        let stats = TimingStats::from_values(&[1.0, 3.0, 2.0]).unwrap();
        assert_eq!((stats.min, stats.max, stats.mean), (1.0, 3.0, 2.0));
        assert!(TimingStats::from_values(&[]).is_none());
    }
}
