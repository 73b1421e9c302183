//! Naming and discovery of counter files.
//!
//! Counter files are named `send-counters.job<J>.rank<R>.txt` and
//! `recv-counters.job<J>.rank<R>.txt`, where `R` is the lead rank of the
//! communicator that produced them.

use crate::utils::config::{RECV_COUNTERS_FILE_PREFIX, SEND_COUNTERS_FILE_PREFIX};
use crate::utils::error::CountsError;
use log::debug;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Counter files found in a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountFiles {
    pub job_id: usize,

    /// Lead ranks, ascending
    pub lead_ranks: Vec<usize>,
}

impl CountFiles {
    /// Send and recv file paths for one lead rank
    pub fn paths(&self, dir: &Path, lead_rank: usize) -> (PathBuf, PathBuf) {
        count_file_paths(dir, self.job_id, lead_rank)
    }
}

/// Send and recv counter file names for a job/rank
pub fn count_file_names(job_id: usize, rank: usize) -> (String, String) {
    let suffix = format!("job{}.rank{}.txt", job_id, rank);
    (
        format!("{}{}", SEND_COUNTERS_FILE_PREFIX, suffix),
        format!("{}{}", RECV_COUNTERS_FILE_PREFIX, suffix),
    )
}

/// Send and recv counter file paths for a job/rank
pub fn count_file_paths(dir: &Path, job_id: usize, rank: usize) -> (PathBuf, PathBuf) {
    let (send, recv) = count_file_names(job_id, rank);
    (dir.join(send), dir.join(recv))
}

/// Extract `(job, rank)` from a counter file name
///
/// **Public** - returns `None` for names that do not follow the layout
pub fn parse_count_file_name(name: &str) -> Option<(usize, usize)> {
    let rest = name
        .strip_prefix(SEND_COUNTERS_FILE_PREFIX)
        .or_else(|| name.strip_prefix(RECV_COUNTERS_FILE_PREFIX))?;
    let rest = rest.strip_suffix(".txt")?;
    let (job, rank) = rest.split_once('.')?;
    let job = job.strip_prefix("job")?.parse().ok()?;
    let rank = rank.strip_prefix("rank")?.parse().ok()?;
    Some((job, rank))
}

/// Find all counter files of a directory and check their consistency
///
/// **Public** - entry point of step 1
///
/// # Errors
/// * `CountsError::Io` - directory cannot be read
/// * `CountsError::Fatal` - no files, one side missing, send/recv rank
///   sets differ, or files come from more than one job
pub fn find_count_files(dir: &Path) -> Result<CountFiles, CountsError> {
    let entries = fs::read_dir(dir).map_err(|source| CountsError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let mut send = BTreeSet::new();
    let mut recv = BTreeSet::new();

    for entry in entries {
        let entry = entry.map_err(|source| CountsError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(ids) = parse_count_file_name(&name) else {
            continue;
        };
        debug!("Found counter file {}", name);
        if name.starts_with(SEND_COUNTERS_FILE_PREFIX) {
            send.insert(ids);
        } else {
            recv.insert(ids);
        }
    }

    match (send.is_empty(), recv.is_empty()) {
        (true, true) => {
            return Err(CountsError::Fatal(format!(
                "no counter files found in {}",
                dir.display()
            )));
        }
        (true, false) => {
            return Err(CountsError::Fatal(format!(
                "no send counter files found in {}",
                dir.display()
            )));
        }
        (false, true) => {
            return Err(CountsError::Fatal(format!(
                "no receive counter files found in {}",
                dir.display()
            )));
        }
        (false, false) => {}
    }

    let send_jobs: BTreeSet<usize> = send.iter().map(|(job, _)| *job).collect();
    let recv_jobs: BTreeSet<usize> = recv.iter().map(|(job, _)| *job).collect();
    if send_jobs.len() != 1 || recv_jobs.len() > 1 {
        return Err(CountsError::Fatal(
            "more than one job detected through counter files; inconsistent data?".to_string(),
        ));
    }
    if send_jobs != recv_jobs {
        return Err(CountsError::Fatal(
            "send and receive counters seem to be from different jobs".to_string(),
        ));
    }

    let send_ranks: Vec<usize> = send.iter().map(|(_, rank)| *rank).collect();
    let recv_ranks: Vec<usize> = recv.iter().map(|(_, rank)| *rank).collect();
    if send_ranks != recv_ranks {
        return Err(CountsError::Fatal(
            "list of ranks logging send and receive counts differ, data likely to be corrupted"
                .to_string(),
        ));
    }

    // One job in both sets at this point
    let job_id = send_jobs.into_iter().next().unwrap_or_default();

    Ok(CountFiles {
        job_id,
        lead_ranks: send_ranks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_parse_count_file_name() {
        assert_eq!(
            parse_count_file_name("send-counters.job3.rank12.txt"),
            Some((3, 12))
        );
        assert_eq!(
            parse_count_file_name("recv-counters.job0.rank0.txt"),
            Some((0, 0))
        );
        assert_eq!(parse_count_file_name("send-counters.job3.txt"), None);
        assert_eq!(parse_count_file_name("heat-map-send.txt"), None);
    }

    #[test]
    fn test_find_count_files() {
        let dir = tempdir().unwrap();
        for rank in [4, 0] {
            let (send, recv) = count_file_paths(dir.path(), 7, rank);
            File::create(send).unwrap();
            File::create(recv).unwrap();
        }
        File::create(dir.path().join("notes.txt")).unwrap();

        let files = find_count_files(dir.path()).unwrap();
        assert_eq!(files.job_id, 7);
        assert_eq!(files.lead_ranks, vec![0, 4]);
    }

    #[test]
    fn test_mismatched_ranks_are_fatal() {
        let dir = tempdir().unwrap();
        let (send, _) = count_file_paths(dir.path(), 1, 0);
        File::create(send).unwrap();
        let (_, recv) = count_file_paths(dir.path(), 1, 2);
        File::create(recv).unwrap();

        assert!(matches!(
            find_count_files(dir.path()),
            Err(CountsError::Fatal(_))
        ));
    }

    #[test]
    fn test_missing_recv_side_is_reported() {
        let dir = tempdir().unwrap();
        let (send, _) = count_file_paths(dir.path(), 5, 0);
        File::create(send).unwrap();

        match find_count_files(dir.path()) {
            Err(CountsError::Fatal(msg)) => {
                assert!(msg.starts_with("no receive counter files"), "{}", msg)
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_mixed_jobs_are_fatal() {
        let dir = tempdir().unwrap();
        for job in [1, 2] {
            let (send, recv) = count_file_paths(dir.path(), job, 0);
            File::create(send).unwrap();
            File::create(recv).unwrap();
        }
        assert!(matches!(
            find_count_files(dir.path()),
            Err(CountsError::Fatal(_))
        ));
    }
}
